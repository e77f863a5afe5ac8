pub mod attrs;
pub mod dto;
pub mod filters;
pub mod handlers;
pub mod repo;
pub mod services;

use crate::state::AppState;
use attrs::AttrKind;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::attr_routes(AttrKind::Tag))
        .merge(handlers::attr_routes(AttrKind::Ingredient))
        .merge(handlers::recipe_routes())
}

#[cfg(test)]
mod tests;
