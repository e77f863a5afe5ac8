use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{error, info, instrument, warn};

use super::services::{check_image, remove_image, store_image};
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    recipes::{dto::RecipeImageResponse, repo},
    state::AppState,
};

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn image_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/recipe/recipes/:id/upload-image",
            post(upload_image).delete(delete_image),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

/// POST multipart with an `image` file field.
#[instrument(skip(state, mp))]
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    mut mp: Multipart,
) -> AppResult<Json<RecipeImageResponse>> {
    if repo::get(&state.db, user_id, id).await?.is_none() {
        return Err(AppError::NotFound);
    }

    let mut upload = None;
    loop {
        let field = match mp.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "malformed multipart body");
                return Err(AppError::field("image", e.body_text()));
            }
        };
        if field.name() == Some("image") {
            let data = field.bytes().await.map_err(|e| {
                warn!(error = %e, "image field unreadable");
                AppError::field("image", e.body_text())
            })?;
            upload = Some(data);
            break;
        }
    }
    let data = upload.ok_or_else(|| AppError::field("image", "No file was submitted."))?;
    let img = check_image(data).map_err(|msg| {
        warn!(recipe_id = id, "rejected non-image upload");
        AppError::field("image", msg)
    })?;

    let key = store_image(&state, img).await?;
    let previous = match repo::set_image(&state.db, user_id, id, Some(&key)).await {
        Ok(Some(previous)) => previous,
        Ok(None) => {
            // recipe vanished between the check and the write
            remove_image(&state, &key).await;
            return Err(AppError::NotFound);
        }
        Err(e) => {
            error!(error = %e, recipe_id = id, "set_image failed");
            remove_image(&state, &key).await;
            return Err(e.into());
        }
    };
    if let Some(old) = previous {
        remove_image(&state, &old).await;
    }

    info!(%user_id, recipe_id = id, key = %key, "recipe image uploaded");
    Ok(Json(RecipeImageResponse {
        id,
        image: Some(key),
    }))
}

#[instrument(skip(state))]
pub async fn delete_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let previous = repo::set_image(&state.db, user_id, id, None)
        .await?
        .ok_or(AppError::NotFound)?;
    if let Some(old) = previous {
        remove_image(&state, &old).await;
        info!(%user_id, recipe_id = id, "recipe image removed");
    }
    Ok(StatusCode::NO_CONTENT)
}
