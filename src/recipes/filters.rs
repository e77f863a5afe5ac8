use serde::Deserialize;

use super::attrs::AttrKind;
use crate::error::FieldErrors;

/// `?assigned_only=` on tag and ingredient listings.
#[derive(Debug, Default, Deserialize)]
pub struct AttrListQuery {
    pub assigned_only: Option<String>,
}

impl AttrListQuery {
    pub fn assigned_only(&self) -> Result<bool, FieldErrors> {
        match self.assigned_only.as_deref() {
            None => Ok(false),
            Some(raw) => parse_flag(raw).map_err(|msg| FieldErrors::single("assigned_only", msg)),
        }
    }
}

/// `?tags=1,2&ingredients=3` on the recipe listing.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeListQuery {
    pub tags: Option<String>,
    pub ingredients: Option<String>,
}

/// Parsed recipe filter. `None` means the parameter imposes nothing; inside one
/// list any id matches, across lists all must match.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tags: Option<Vec<i64>>,
    pub ingredients: Option<Vec<i64>>,
}

impl TryFrom<RecipeListQuery> for RecipeFilter {
    type Error = FieldErrors;

    fn try_from(q: RecipeListQuery) -> Result<Self, Self::Error> {
        let mut errors = FieldErrors::new();
        let mut parse = |raw: Option<String>, kind: AttrKind| match raw.as_deref().map(parse_id_list) {
            None | Some(Ok(None)) => None,
            Some(Ok(Some(ids))) => Some(ids),
            Some(Err(msg)) => {
                errors.add(kind.field(), msg);
                None
            }
        };
        let tags = parse(q.tags, AttrKind::Tag);
        let ingredients = parse(q.ingredients, AttrKind::Ingredient);
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Self { tags, ingredients })
    }
}

/// Parses `"1, 2,3"` into ids. A blank value disables the filter.
pub fn parse_id_list(raw: &str) -> Result<Option<Vec<i64>>, String> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let mut ids = raw
        .split(',')
        .map(|part| {
            let part = part.trim();
            part.parse::<i64>()
                .map_err(|_| format!("\"{part}\" is not a valid id."))
        })
        .collect::<Result<Vec<_>, _>>()?;
    ids.sort_unstable();
    ids.dedup();
    Ok(Some(ids))
}

pub fn parse_flag(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" | "" => Ok(false),
        other => Err(format!("\"{other}\" is not a valid boolean, use 0 or 1.")),
    }
}
