use serde::{Deserialize, Serialize};

const MAX_LIMIT: i64 = 100;

/// `?page=&limit=` query, 1-based pages.
#[derive(Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageParams {
    /// Resolves to `(limit, offset)`, falling back to `default_limit` and clamping to sane bounds.
    pub fn resolve(&self, default_limit: i64) -> (i64, i64) {
        let limit = self.limit.unwrap_or(default_limit).clamp(1, MAX_LIMIT);
        let page = self.page.unwrap_or(1).max(1);
        (limit, (page - 1).saturating_mul(limit))
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub results: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page() {
        assert_eq!(PageParams::default().resolve(6), (6, 0));
    }

    #[test]
    fn offset_follows_page_number() {
        let p = PageParams {
            page: Some(3),
            limit: Some(10),
        };
        assert_eq!(p.resolve(6), (10, 20));
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let p = PageParams {
            page: Some(0),
            limit: Some(10_000),
        };
        assert_eq!(p.resolve(6), (MAX_LIMIT, 0));
    }

    #[test]
    fn huge_page_saturates_instead_of_overflowing() {
        let p = PageParams {
            page: Some(i64::MAX),
            limit: Some(10),
        };
        assert_eq!(p.resolve(6), (10, i64::MAX));
    }
}
