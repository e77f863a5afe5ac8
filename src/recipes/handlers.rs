use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use tracing::instrument;

use super::{
    attrs::{self, Attr, AttrKind},
    dto::{AttrRequest, RecipeDetail, RecipeListItem, RecipeRequest},
    filters::{AttrListQuery, RecipeFilter, RecipeListQuery},
    services::{self, WriteMode},
};
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    json::ValidJson,
    state::AppState,
};

pub fn attr_routes(kind: AttrKind) -> Router<AppState> {
    let base = format!("/recipe/{}", kind.table());
    Router::new()
        .route(&base, get(list_attrs).post(create_attr))
        .route(
            &format!("{base}/:id"),
            get(get_attr).put(update_attr).patch(update_attr).delete(delete_attr),
        )
        .layer(Extension(kind))
}

pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/recipe/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/recipe/recipes/:id",
            get(get_recipe)
                .put(put_recipe)
                .patch(patch_recipe)
                .delete(delete_recipe),
        )
}

// --- tags & ingredients ---

#[instrument(skip(state))]
pub async fn list_attrs(
    State(state): State<AppState>,
    Extension(kind): Extension<AttrKind>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<AttrListQuery>,
) -> AppResult<Json<Vec<Attr>>> {
    let assigned_only = q.assigned_only().map_err(AppError::Validation)?;
    let rows = attrs::list(&state.db, kind, user_id, assigned_only).await?;
    Ok(Json(rows))
}

#[instrument(skip(state, payload))]
pub async fn create_attr(
    State(state): State<AppState>,
    Extension(kind): Extension<AttrKind>,
    AuthUser(user_id): AuthUser,
    ValidJson(payload): ValidJson<AttrRequest>,
) -> AppResult<(StatusCode, Json<Attr>)> {
    let attr = services::save_attr(&state, kind, user_id, None, payload).await?;
    Ok((StatusCode::CREATED, Json(attr)))
}

#[instrument(skip(state))]
pub async fn get_attr(
    State(state): State<AppState>,
    Extension(kind): Extension<AttrKind>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Attr>> {
    let attr = attrs::get(&state.db, kind, user_id, id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(attr))
}

/// PUT and PATCH coincide: `name` is the only writable field.
#[instrument(skip(state, payload))]
pub async fn update_attr(
    State(state): State<AppState>,
    Extension(kind): Extension<AttrKind>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    ValidJson(payload): ValidJson<AttrRequest>,
) -> AppResult<Json<Attr>> {
    let attr = services::save_attr(&state, kind, user_id, Some(id), payload).await?;
    Ok(Json(attr))
}

#[instrument(skip(state))]
pub async fn delete_attr(
    State(state): State<AppState>,
    Extension(kind): Extension<AttrKind>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    if attrs::delete(&state.db, kind, user_id, id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

// --- recipes ---

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<RecipeListQuery>,
) -> AppResult<Json<Vec<RecipeListItem>>> {
    let filter = RecipeFilter::try_from(q).map_err(AppError::Validation)?;
    let items = services::list_recipes(&state, user_id, &filter).await?;
    Ok(Json(items))
}

#[instrument(skip(state, payload))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ValidJson(payload): ValidJson<RecipeRequest>,
) -> AppResult<(StatusCode, Json<RecipeDetail>)> {
    let recipe = services::create_recipe(&state, user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<RecipeDetail>> {
    Ok(Json(services::get_recipe(&state, user_id, id).await?))
}

#[instrument(skip(state, payload))]
pub async fn put_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    ValidJson(payload): ValidJson<RecipeRequest>,
) -> AppResult<Json<RecipeDetail>> {
    let recipe = services::update_recipe(&state, user_id, id, payload, WriteMode::Replace).await?;
    Ok(Json(recipe))
}

#[instrument(skip(state, payload))]
pub async fn patch_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    ValidJson(payload): ValidJson<RecipeRequest>,
) -> AppResult<Json<RecipeDetail>> {
    let recipe = services::update_recipe(&state, user_id, id, payload, WriteMode::Partial).await?;
    Ok(Json(recipe))
}

#[instrument(skip(state))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    services::delete_recipe(&state, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
