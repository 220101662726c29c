use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::auth::repo_types::User;
use crate::pagination::PageParams;
use crate::recipes::dto::RecipeShort;

/// Public view of a user, relative to the caller.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Profile {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl Profile {
    pub fn from_user(user: User, is_subscribed: bool) -> Self {
        Self {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            is_subscribed,
        }
    }
}

/// An author the caller follows, with a preview of their recipes.
#[derive(Debug, Serialize)]
pub struct Subscription {
    #[serde(flatten)]
    pub profile: Profile,
    pub recipes: Vec<RecipeShort>,
    pub recipes_count: i64,
}

#[derive(Debug, FromRow)]
pub struct SubscriptionRow {
    #[sqlx(flatten)]
    pub profile: Profile,
    pub recipes_count: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecipesLimit {
    pub recipes_limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub recipes_limit: Option<u32>,
}

impl SubscriptionsQuery {
    pub fn page_params(&self) -> PageParams {
        PageParams {
            page: self.page,
            limit: self.limit,
        }
    }
}
