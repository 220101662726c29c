use serde::{Deserialize, Serialize};

use crate::catalog::dto::Tag;
use crate::images::DecodedImage;
use crate::pagination::PageParams;
use crate::users::dto::Profile;

// ---- write side ----

#[derive(Debug, Clone, Deserialize)]
pub struct IngredientAmount {
    pub id: i64,
    pub amount: i64,
}

/// Body of `POST /recipes` and `PATCH /recipes/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeWrite {
    pub ingredients: Vec<IngredientAmount>,
    #[serde(default)]
    pub tags: Vec<i64>,
    pub image: Option<String>,
    pub name: String,
    pub text: String,
    pub cooking_time: i64,
}

/// A [`RecipeWrite`] that passed validation, narrowed to storage types.
#[derive(Debug, Clone)]
pub struct ValidRecipe {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub tag_ids: Vec<i64>,
    pub ingredient_ids: Vec<i64>,
    pub amounts: Vec<i32>,
    pub image: Option<DecodedImage>,
}

// ---- read side ----

#[derive(Debug, Clone, Serialize)]
pub struct IngredientLine {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Serialize)]
pub struct RecipeRead {
    pub id: i64,
    pub tags: Vec<Tag>,
    pub author: Profile,
    pub ingredients: Vec<IngredientLine>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

/// Compact recipe used in favorite/cart responses and subscription previews.
#[derive(Debug, Clone, Serialize)]
pub struct RecipeShort {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

// ---- list filters ----

#[derive(Debug, Default, Deserialize)]
pub struct RecipeListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub author: Option<i64>,
    /// Comma-separated tag slugs; a recipe matches if it carries any of them.
    pub tags: Option<String>,
    pub is_favorited: Option<u8>,
    pub is_in_shopping_cart: Option<u8>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecipeFilter {
    pub author: Option<i64>,
    pub tags: Option<Vec<String>>,
    pub favorited_only: bool,
    pub in_cart_only: bool,
}

impl RecipeListQuery {
    pub fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            limit: self.limit,
        }
    }

    pub fn filter(&self) -> RecipeFilter {
        let tags: Vec<String> = self
            .tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        RecipeFilter {
            author: self.author,
            tags: (!tags.is_empty()).then_some(tags),
            favorited_only: self.is_favorited.unwrap_or(0) != 0,
            in_cart_only: self.is_in_shopping_cart.unwrap_or(0) != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_list_is_split_and_trimmed() {
        let q = RecipeListQuery {
            tags: Some("breakfast, dinner,,".into()),
            is_favorited: Some(1),
            ..Default::default()
        };
        let f = q.filter();
        assert_eq!(
            f.tags,
            Some(vec!["breakfast".to_string(), "dinner".to_string()])
        );
        assert!(f.favorited_only);
        assert!(!f.in_cart_only);
    }

    #[test]
    fn empty_query_filters_nothing() {
        assert_eq!(RecipeListQuery::default().filter(), RecipeFilter::default());
    }
}
