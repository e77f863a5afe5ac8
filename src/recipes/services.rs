use std::collections::HashMap;

use anyhow::Context;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    attrs::{self, Attr, AttrKind},
    dto::{AttrRequest, RecipeDetail, RecipeListItem, RecipeRequest},
    filters::RecipeFilter,
    repo::{self, Recipe, RecipeRow},
};
use crate::{
    error::{AppError, AppResult, FieldErrors},
    images,
    state::AppState,
    users::services::{BLANK, MAX_NAME_LEN, REQUIRED},
};

pub const PRICE_MAX_DIGITS: u32 = 5;
pub const PRICE_DECIMAL_PLACES: u32 = 2;

/// How much of the entity a write replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    /// PUT: every field is required, absent relations are cleared.
    Replace,
    /// PATCH: only supplied fields change.
    Partial,
}

/// Validated recipe write. `None` leaves the stored value as is.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
    pub tags: Option<Vec<i64>>,
    pub ingredients: Option<Vec<i64>>,
}

pub fn validate_name(raw: Option<String>) -> Result<String, FieldErrors> {
    let Some(name) = raw else {
        return Err(FieldErrors::single("name", REQUIRED));
    };
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(FieldErrors::single("name", BLANK));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(FieldErrors::single(
            "name",
            format!("Ensure this field has no more than {MAX_NAME_LEN} characters."),
        ));
    }
    Ok(name)
}

fn check_price(price: Decimal) -> Option<String> {
    let whole_digits = PRICE_MAX_DIGITS - PRICE_DECIMAL_PLACES;
    if price.is_sign_negative() && !price.is_zero() {
        Some("Ensure this value is greater than or equal to 0.".into())
    } else if price.normalize().scale() > PRICE_DECIMAL_PLACES {
        Some(format!(
            "Ensure that there are no more than {PRICE_DECIMAL_PLACES} decimal places."
        ))
    } else if price.trunc() >= Decimal::from(10_i64.pow(whole_digits)) {
        Some(format!(
            "Ensure that there are no more than {PRICE_MAX_DIGITS} digits in total."
        ))
    } else {
        None
    }
}

fn dedup_ids(mut ids: Vec<i64>) -> Vec<i64> {
    ids.sort_unstable();
    ids.dedup();
    ids
}

pub fn validate_recipe(req: RecipeRequest, mode: WriteMode) -> Result<RecipeChanges, FieldErrors> {
    let full = mode != WriteMode::Partial;
    let mut errors = FieldErrors::new();
    let mut out = RecipeChanges::default();

    match req.title.map(|t| t.trim().to_string()) {
        Some(t) if t.is_empty() => errors.add("title", BLANK),
        Some(t) if t.chars().count() > MAX_NAME_LEN => errors.add(
            "title",
            format!("Ensure this field has no more than {MAX_NAME_LEN} characters."),
        ),
        Some(t) => out.title = Some(t),
        None if full => errors.add("title", REQUIRED),
        None => {}
    }

    match req.time_minutes {
        Some(m) if m < 0 => errors.add("time_minutes", "Ensure this value is greater than or equal to 0."),
        Some(m) => match i32::try_from(m) {
            Ok(m) => out.time_minutes = Some(m),
            Err(_) => errors.add("time_minutes", "Ensure this value is less than or equal to 2147483647."),
        },
        None if full => errors.add("time_minutes", REQUIRED),
        None => {}
    }

    match req.price {
        Some(p) => match check_price(p) {
            Some(msg) => errors.add("price", msg),
            None => out.price = Some(p.round_dp(PRICE_DECIMAL_PLACES)),
        },
        None if full => errors.add("price", REQUIRED),
        None => {}
    }

    match req.link.map(|l| l.trim().to_string()) {
        Some(l) if l.chars().count() > MAX_NAME_LEN => errors.add(
            "link",
            format!("Ensure this field has no more than {MAX_NAME_LEN} characters."),
        ),
        Some(l) => out.link = Some(l),
        None if full => out.link = Some(String::new()),
        None => {}
    }

    out.tags = req.tags.map(dedup_ids).or_else(|| full.then(Vec::new));
    out.ingredients = req.ingredients.map(dedup_ids).or_else(|| full.then(Vec::new));

    if errors.is_empty() {
        Ok(out)
    } else {
        Err(errors)
    }
}

/// Rejects related ids that are unknown or owned by someone else.
async fn check_owned(
    conn: &mut sqlx::PgConnection,
    user_id: Uuid,
    changes: &RecipeChanges,
) -> AppResult<()> {
    let mut errors = FieldErrors::new();
    for (kind, ids) in [
        (AttrKind::Tag, &changes.tags),
        (AttrKind::Ingredient, &changes.ingredients),
    ] {
        let Some(ids) = ids else { continue };
        let owned = attrs::owned_ids(&mut *conn, kind, user_id, ids).await?;
        for id in ids.iter().filter(|id| !owned.contains(*id)) {
            errors.add(kind.field(), format!("Invalid pk \"{id}\" - object does not exist."));
        }
    }
    if !errors.is_empty() {
        warn!(%user_id, "recipe write references foreign or missing ids");
    }
    errors.into_result()
}

pub async fn create_recipe(state: &AppState, user_id: Uuid, req: RecipeRequest) -> AppResult<RecipeDetail> {
    let changes = validate_recipe(req, WriteMode::Create).map_err(AppError::Validation)?;
    let mut tx = state.db.begin().await.context("begin tx")?;
    check_owned(&mut tx, user_id, &changes).await?;

    let row = RecipeRow {
        title: changes.title.as_deref().unwrap_or_default(),
        time_minutes: changes.time_minutes.unwrap_or_default(),
        price: changes.price.unwrap_or_default(),
        link: changes.link.as_deref().unwrap_or_default(),
    };
    let recipe = repo::insert(&mut tx, user_id, &row).await?;
    write_links(&mut tx, recipe.id, &changes).await?;
    tx.commit().await.context("commit tx")?;

    info!(%user_id, recipe_id = recipe.id, "recipe created");
    recipe_detail(state, recipe).await
}

pub async fn update_recipe(
    state: &AppState,
    user_id: Uuid,
    id: i64,
    req: RecipeRequest,
    mode: WriteMode,
) -> AppResult<RecipeDetail> {
    let changes = validate_recipe(req, mode).map_err(AppError::Validation)?;
    let mut tx = state.db.begin().await.context("begin tx")?;
    let current = repo::get_for_update(&mut tx, user_id, id)
        .await?
        .ok_or(AppError::NotFound)?;
    check_owned(&mut tx, user_id, &changes).await?;

    let row = RecipeRow {
        title: changes.title.as_deref().unwrap_or(&current.title),
        time_minutes: changes.time_minutes.unwrap_or(current.time_minutes),
        price: changes.price.unwrap_or(current.price),
        link: changes.link.as_deref().unwrap_or(&current.link),
    };
    let recipe = repo::update(&mut tx, id, &row).await?;
    write_links(&mut tx, id, &changes).await?;
    tx.commit().await.context("commit tx")?;

    info!(%user_id, recipe_id = id, ?mode, "recipe updated");
    recipe_detail(state, recipe).await
}

async fn write_links(conn: &mut sqlx::PgConnection, recipe_id: i64, changes: &RecipeChanges) -> AppResult<()> {
    if let Some(ids) = &changes.tags {
        attrs::replace_links(&mut *conn, AttrKind::Tag, recipe_id, ids).await?;
    }
    if let Some(ids) = &changes.ingredients {
        attrs::replace_links(&mut *conn, AttrKind::Ingredient, recipe_id, ids).await?;
    }
    Ok(())
}

pub async fn delete_recipe(state: &AppState, user_id: Uuid, id: i64) -> AppResult<()> {
    let recipe = repo::delete(&state.db, user_id, id)
        .await?
        .ok_or(AppError::NotFound)?;
    if let Some(key) = recipe.image {
        images::services::remove_image(state, &key).await;
    }
    info!(%user_id, recipe_id = id, "recipe deleted");
    Ok(())
}

pub async fn get_recipe(state: &AppState, user_id: Uuid, id: i64) -> AppResult<RecipeDetail> {
    let recipe = repo::get(&state.db, user_id, id)
        .await?
        .ok_or(AppError::NotFound)?;
    recipe_detail(state, recipe).await
}

pub async fn list_recipes(state: &AppState, user_id: Uuid, filter: &RecipeFilter) -> AppResult<Vec<RecipeListItem>> {
    let recipes = repo::list(&state.db, user_id, filter).await?;
    let ids: Vec<i64> = recipes.iter().map(|r| r.id).collect();
    let mut tags = group_links(attrs::links_for(&state.db, AttrKind::Tag, &ids).await?);
    let mut ingredients = group_links(attrs::links_for(&state.db, AttrKind::Ingredient, &ids).await?);

    let items = recipes
        .into_iter()
        .map(|r| {
            let ids_of = |v: Vec<Attr>| -> Vec<i64> { v.into_iter().map(|a| a.id).collect() };
            let t = ids_of(tags.remove(&r.id).unwrap_or_default());
            let i = ids_of(ingredients.remove(&r.id).unwrap_or_default());
            RecipeListItem::new(r, t, i)
        })
        .collect();
    Ok(items)
}

async fn recipe_detail(state: &AppState, recipe: Recipe) -> AppResult<RecipeDetail> {
    let ids = [recipe.id];
    let tags = attrs::links_for(&state.db, AttrKind::Tag, &ids).await?;
    let ingredients = attrs::links_for(&state.db, AttrKind::Ingredient, &ids).await?;
    let strip = |links: Vec<attrs::AttrLink>| -> Vec<Attr> {
        links
            .into_iter()
            .map(|l| Attr { id: l.id, name: l.name })
            .collect()
    };
    Ok(RecipeDetail::new(recipe, strip(tags), strip(ingredients)))
}

fn group_links(links: Vec<attrs::AttrLink>) -> HashMap<i64, Vec<Attr>> {
    let mut out: HashMap<i64, Vec<Attr>> = HashMap::new();
    for l in links {
        out.entry(l.recipe_id)
            .or_default()
            .push(Attr { id: l.id, name: l.name });
    }
    out
}

pub async fn save_attr(
    state: &AppState,
    kind: AttrKind,
    user_id: Uuid,
    id: Option<i64>,
    req: AttrRequest,
) -> AppResult<Attr> {
    let name = validate_name(req.name).map_err(AppError::Validation)?;
    let attr = match id {
        None => attrs::create(&state.db, kind, user_id, &name).await?,
        Some(id) => attrs::rename(&state.db, kind, user_id, id, &name)
            .await?
            .ok_or(AppError::NotFound)?,
    };
    info!(%user_id, kind = kind.table(), id = attr.id, "saved");
    Ok(attr)
}
