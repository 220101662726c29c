use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct IngredientSearch {
    pub name: Option<String>,
}

/// Tag as submitted through the `add-tag` command.
#[derive(Debug, Clone)]
pub struct NewTag {
    pub name: String,
    pub color: String,
    pub slug: String,
}
