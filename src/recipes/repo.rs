use anyhow::Context;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::filters::RecipeFilter;

#[derive(Debug, Clone, FromRow)]
pub struct Recipe {
    pub id: i64,
    pub user_id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub image: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Scalar columns of a full write.
#[derive(Debug, Clone)]
pub struct RecipeRow<'a> {
    pub title: &'a str,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: &'a str,
}

const RECIPE_COLUMNS: &str = "id, user_id, title, time_minutes, price, link, image, created_at";

/// Caller's recipes, newest id first, narrowed by `filter`.
pub async fn list(db: &PgPool, user_id: Uuid, filter: &RecipeFilter) -> anyhow::Result<Vec<Recipe>> {
    let rows = sqlx::query_as::<_, Recipe>(&format!(
        r#"
        SELECT {RECIPE_COLUMNS}
          FROM recipes r
         WHERE r.user_id = $1
           AND ($2::bigint[] IS NULL OR EXISTS (
                SELECT 1 FROM recipe_tags rt
                 WHERE rt.recipe_id = r.id AND rt.tag_id = ANY($2)))
           AND ($3::bigint[] IS NULL OR EXISTS (
                SELECT 1 FROM recipe_ingredients ri
                 WHERE ri.recipe_id = r.id AND ri.ingredient_id = ANY($3)))
         ORDER BY r.id DESC
        "#
    ))
    .bind(user_id)
    .bind(filter.tags.as_deref())
    .bind(filter.ingredients.as_deref())
    .fetch_all(db)
    .await
    .context("list recipes")?;
    Ok(rows)
}

pub async fn get(db: &PgPool, user_id: Uuid, id: i64) -> anyhow::Result<Option<Recipe>> {
    let row = sqlx::query_as::<_, Recipe>(&format!(
        "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

/// Locks the row until the surrounding transaction ends.
pub async fn get_for_update(conn: &mut PgConnection, user_id: Uuid, id: i64) -> anyhow::Result<Option<Recipe>> {
    let row = sqlx::query_as::<_, Recipe>(&format!(
        "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1 AND user_id = $2 FOR UPDATE"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

pub async fn insert(conn: &mut PgConnection, user_id: Uuid, row: &RecipeRow<'_>) -> anyhow::Result<Recipe> {
    let recipe = sqlx::query_as::<_, Recipe>(&format!(
        r#"
        INSERT INTO recipes (user_id, title, time_minutes, price, link)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {RECIPE_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(row.title)
    .bind(row.time_minutes)
    .bind(row.price)
    .bind(row.link)
    .fetch_one(conn)
    .await
    .context("insert recipe")?;
    Ok(recipe)
}

pub async fn update(conn: &mut PgConnection, id: i64, row: &RecipeRow<'_>) -> anyhow::Result<Recipe> {
    let recipe = sqlx::query_as::<_, Recipe>(&format!(
        r#"
        UPDATE recipes
           SET title = $2, time_minutes = $3, price = $4, link = $5
         WHERE id = $1
        RETURNING {RECIPE_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(row.title)
    .bind(row.time_minutes)
    .bind(row.price)
    .bind(row.link)
    .fetch_one(conn)
    .await
    .context("update recipe")?;
    Ok(recipe)
}

/// Sets the image key and returns the one it replaced.
pub async fn set_image(
    db: &PgPool,
    user_id: Uuid,
    id: i64,
    image: Option<&str>,
) -> anyhow::Result<Option<Option<String>>> {
    let mut tx = db.begin().await.context("begin tx")?;
    let Some(current) = get_for_update(&mut tx, user_id, id).await? else {
        return Ok(None);
    };
    sqlx::query("UPDATE recipes SET image = $2 WHERE id = $1")
        .bind(id)
        .bind(image)
        .execute(&mut *tx)
        .await
        .context("update recipe image")?;
    tx.commit().await.context("commit tx")?;
    Ok(Some(current.image))
}

/// Removes the recipe and returns it; links cascade.
pub async fn delete(db: &PgPool, user_id: Uuid, id: i64) -> anyhow::Result<Option<Recipe>> {
    let row = sqlx::query_as::<_, Recipe>(&format!(
        "DELETE FROM recipes WHERE id = $1 AND user_id = $2 RETURNING {RECIPE_COLUMNS}"
    ))
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}
