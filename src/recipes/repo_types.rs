use sqlx::FromRow;

use crate::catalog::dto::Tag;

/// Recipe joined with its author and the caller-relative flags.
#[derive(Debug, Clone, FromRow)]
pub struct RecipeRow {
    pub id: i64,
    pub author_id: i64,
    pub name: String,
    pub image: String, // storage key
    pub text: String,
    pub cooking_time: i32,
    pub author_email: String,
    pub author_username: String,
    pub author_first_name: String,
    pub author_last_name: String,
    pub author_is_subscribed: bool,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct RecipeTagRow {
    pub recipe_id: i64,
    #[sqlx(flatten)]
    pub tag: Tag,
}

#[derive(Debug, Clone, FromRow)]
pub struct IngredientLineRow {
    pub recipe_id: i64,
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, FromRow)]
pub struct ShortRecipeRow {
    pub id: i64,
    pub author_id: i64,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

#[derive(Debug, Clone, FromRow)]
pub struct Ownership {
    pub author_id: i64,
    pub image: String,
}
