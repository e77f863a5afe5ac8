use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::attrs::Attr;
use super::repo::Recipe;

/// Body of tag / ingredient create and update.
#[derive(Debug, Default, Deserialize)]
pub struct AttrRequest {
    pub name: Option<String>,
}

/// Body of recipe create, PUT and PATCH. Absent keys stay `None`.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeRequest {
    pub title: Option<String>,
    pub time_minutes: Option<i64>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
    pub tags: Option<Vec<i64>>,
    pub ingredients: Option<Vec<i64>>,
}

/// Listing entry: related entities as ids.
#[derive(Debug, Serialize)]
pub struct RecipeListItem {
    pub id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub image: Option<String>,
    pub tags: Vec<i64>,
    pub ingredients: Vec<i64>,
}

/// Detail view: related entities nested.
#[derive(Debug, Serialize)]
pub struct RecipeDetail {
    pub id: i64,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub image: Option<String>,
    pub tags: Vec<Attr>,
    pub ingredients: Vec<Attr>,
}

impl RecipeListItem {
    pub fn new(r: Recipe, tags: Vec<i64>, ingredients: Vec<i64>) -> Self {
        Self {
            id: r.id,
            title: r.title,
            time_minutes: r.time_minutes,
            price: r.price,
            link: r.link,
            image: r.image,
            tags,
            ingredients,
        }
    }
}

impl RecipeDetail {
    pub fn new(r: Recipe, tags: Vec<Attr>, ingredients: Vec<Attr>) -> Self {
        Self {
            id: r.id,
            title: r.title,
            time_minutes: r.time_minutes,
            price: r.price,
            link: r.link,
            image: r.image,
            tags,
            ingredients,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecipeImageResponse {
    pub id: i64,
    pub image: Option<String>,
}
