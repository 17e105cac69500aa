use serde::Deserialize;

use crate::envelope::Meta;

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

/// Raw `?page=&per_page=` values. Kept as strings so junk input falls back
/// to defaults instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    pub per_page: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub per_page: i64,
}

impl Page {
    pub fn from_query(query: &PageQuery) -> Self {
        let page = parse(query.page.as_deref()).unwrap_or(1).max(1);
        let per_page = parse(query.per_page.as_deref())
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        Self { page, per_page }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    pub fn meta(&self, total: i64) -> Meta {
        Meta {
            page: self.page,
            per_page: self.per_page,
            total,
            total_pages: (total + self.per_page - 1) / self.per_page,
        }
    }
}

fn parse(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<&str>, per_page: Option<&str>) -> PageQuery {
        PageQuery {
            page: page.map(str::to_string),
            per_page: per_page.map(str::to_string),
        }
    }

    #[test]
    fn test_defaults() {
        let page = Page::from_query(&PageQuery::default());
        assert_eq!(page, Page { page: 1, per_page: 20 });
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_clamping() {
        assert_eq!(Page::from_query(&query(Some("0"), Some("0"))), Page { page: 1, per_page: 1 });
        assert_eq!(
            Page::from_query(&query(Some("-4"), Some("500"))),
            Page { page: 1, per_page: 100 }
        );
        assert_eq!(
            Page::from_query(&query(Some("abc"), Some("x"))),
            Page { page: 1, per_page: 20 }
        );
    }

    #[test]
    fn test_offset_and_meta() {
        let page = Page::from_query(&query(Some("3"), Some("10")));
        assert_eq!(page.offset(), 20);

        let meta = page.meta(25);
        assert_eq!(meta.total_pages, 3);
        assert_eq!(Page::from_query(&PageQuery::default()).meta(0).total_pages, 0);
        assert_eq!(Page::from_query(&PageQuery::default()).meta(20).total_pages, 1);
    }
}
