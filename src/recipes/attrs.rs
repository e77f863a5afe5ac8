//! Tags and ingredients: name-only records owned by a user and linked to
//! recipes through a join table. Both share one table layout, so every query
//! here is parameterised by [`AttrKind`].

use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Tag,
    Ingredient,
}

impl AttrKind {
    pub fn table(self) -> &'static str {
        match self {
            Self::Tag => "tags",
            Self::Ingredient => "ingredients",
        }
    }

    pub fn link_table(self) -> &'static str {
        match self {
            Self::Tag => "recipe_tags",
            Self::Ingredient => "recipe_ingredients",
        }
    }

    pub fn link_column(self) -> &'static str {
        match self {
            Self::Tag => "tag_id",
            Self::Ingredient => "ingredient_id",
        }
    }

    /// Payload / query-string key naming a list of these ids.
    pub fn field(self) -> &'static str {
        self.table()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Attr {
    pub id: i64,
    pub name: String,
}

/// One row of a recipe's tag or ingredient set.
#[derive(Debug, Clone, FromRow)]
pub struct AttrLink {
    pub recipe_id: i64,
    pub id: i64,
    pub name: String,
}

/// Caller's entities, name descending. With `assigned_only`, only those linked
/// to at least one of the caller's recipes; `EXISTS` keeps each row once.
pub async fn list(
    db: &PgPool,
    kind: AttrKind,
    user_id: Uuid,
    assigned_only: bool,
) -> anyhow::Result<Vec<Attr>> {
    let sql = format!(
        r#"
        SELECT a.id, a.name
          FROM {table} a
         WHERE a.user_id = $1
           AND (NOT $2 OR EXISTS (
                SELECT 1
                  FROM {link} l
                  JOIN recipes r ON r.id = l.recipe_id
                 WHERE l.{col} = a.id
                   AND r.user_id = $1))
         ORDER BY a.name DESC, a.id DESC
        "#,
        table = kind.table(),
        link = kind.link_table(),
        col = kind.link_column(),
    );
    let rows = sqlx::query_as::<_, Attr>(&sql)
        .bind(user_id)
        .bind(assigned_only)
        .fetch_all(db)
        .await
        .with_context(|| format!("list {}", kind.table()))?;
    Ok(rows)
}

pub async fn get(db: &PgPool, kind: AttrKind, user_id: Uuid, id: i64) -> anyhow::Result<Option<Attr>> {
    let sql = format!(
        "SELECT id, name FROM {} WHERE id = $1 AND user_id = $2",
        kind.table()
    );
    let row = sqlx::query_as::<_, Attr>(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

pub async fn create(db: &PgPool, kind: AttrKind, user_id: Uuid, name: &str) -> anyhow::Result<Attr> {
    let sql = format!(
        "INSERT INTO {} (user_id, name) VALUES ($1, $2) RETURNING id, name",
        kind.table()
    );
    let row = sqlx::query_as::<_, Attr>(&sql)
        .bind(user_id)
        .bind(name)
        .fetch_one(db)
        .await
        .with_context(|| format!("insert into {}", kind.table()))?;
    Ok(row)
}

pub async fn rename(
    db: &PgPool,
    kind: AttrKind,
    user_id: Uuid,
    id: i64,
    name: &str,
) -> anyhow::Result<Option<Attr>> {
    let sql = format!(
        "UPDATE {} SET name = $3 WHERE id = $1 AND user_id = $2 RETURNING id, name",
        kind.table()
    );
    let row = sqlx::query_as::<_, Attr>(&sql)
        .bind(id)
        .bind(user_id)
        .bind(name)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

/// Returns whether a row was removed. Recipe links go with it (cascade).
pub async fn delete(db: &PgPool, kind: AttrKind, user_id: Uuid, id: i64) -> anyhow::Result<bool> {
    let sql = format!("DELETE FROM {} WHERE id = $1 AND user_id = $2", kind.table());
    let done = sqlx::query(&sql)
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(done.rows_affected() > 0)
}

/// Subset of `ids` that exist and belong to `user_id`.
pub async fn owned_ids<'e, E>(ex: E, kind: AttrKind, user_id: Uuid, ids: &[i64]) -> anyhow::Result<Vec<i64>>
where
    E: PgExecutor<'e>,
{
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT id FROM {} WHERE user_id = $1 AND id = ANY($2)",
        kind.table()
    );
    let rows: Vec<(i64,)> = sqlx::query_as(&sql)
        .bind(user_id)
        .bind(ids)
        .fetch_all(ex)
        .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Makes `ids` the complete set linked to `recipe_id`. Run inside a transaction.
pub async fn replace_links(
    conn: &mut PgConnection,
    kind: AttrKind,
    recipe_id: i64,
    ids: &[i64],
) -> anyhow::Result<()> {
    sqlx::query(&format!("DELETE FROM {} WHERE recipe_id = $1", kind.link_table()))
        .bind(recipe_id)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("clear {} links", kind.field()))?;

    if ids.is_empty() {
        return Ok(());
    }
    let sql = format!(
        "INSERT INTO {link} (recipe_id, {col}) SELECT $1, x FROM unnest($2::bigint[]) AS x",
        link = kind.link_table(),
        col = kind.link_column(),
    );
    sqlx::query(&sql)
        .bind(recipe_id)
        .bind(ids)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("insert {} links", kind.field()))?;
    Ok(())
}

/// All links for the given recipes, ordered by recipe then entity id.
pub async fn links_for(db: &PgPool, kind: AttrKind, recipe_ids: &[i64]) -> anyhow::Result<Vec<AttrLink>> {
    if recipe_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        r#"
        SELECT l.recipe_id, a.id, a.name
          FROM {link} l
          JOIN {table} a ON a.id = l.{col}
         WHERE l.recipe_id = ANY($1)
         ORDER BY l.recipe_id, a.id
        "#,
        link = kind.link_table(),
        table = kind.table(),
        col = kind.link_column(),
    );
    let rows = sqlx::query_as::<_, AttrLink>(&sql)
        .bind(recipe_ids)
        .fetch_all(db)
        .await?;
    Ok(rows)
}
