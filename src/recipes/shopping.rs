//! Shopping list built from the recipes in a user's cart.

use std::collections::HashMap;

use sqlx::{FromRow, PgPool};

use crate::recipes::repo;

/// One ingredient line of one recipe in the cart.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CartLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingItem {
    pub label: String,
    pub total: i64,
}

/// Amounts summed per `(ingredient name, measurement unit)`. Groups keep the order in which
/// they first appear, so callers feed lines already sorted by the store.
#[derive(Debug, Default)]
pub struct ShoppingList {
    items: Vec<ShoppingItem>,
}

impl ShoppingList {
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut index: HashMap<(String, String), usize> = HashMap::new();
        let mut items: Vec<ShoppingItem> = Vec::new();
        for line in lines {
            let key = (line.name, line.measurement_unit);
            match index.get(&key) {
                Some(&pos) => items[pos].total += line.amount,
                None => {
                    items.push(ShoppingItem {
                        label: format!("{} ({})", key.0, key.1),
                        total: line.amount,
                    });
                    index.insert(key, items.len() - 1);
                }
            }
        }
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[ShoppingItem] {
        &self.items
    }

    /// One `"<name> (<unit>) - <total>"` line per item.
    pub fn render(&self) -> String {
        self.items()
            .iter()
            .map(|item| format!("{} - {}\n", item.label, item.total))
            .collect()
    }
}

pub async fn for_user(db: &PgPool, user_id: i64) -> Result<ShoppingList, sqlx::Error> {
    let lines = repo::cart_lines(db, user_id).await?;
    Ok(ShoppingList::from_lines(lines))
}
