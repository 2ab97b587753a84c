use serde::{Deserialize, Serialize};

use crate::error::{Error, HtmlError};

use super::{error::TypeError, form::Form};

/// Requested page, 1-based, with its size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Page {
    pub fn from_form(form: &Form, default_limit: i64, max_limit: i64) -> Result<Self, TypeError> {
        let page = form.get_number::<i64>("page")?.unwrap_or(1);
        let limit = form.get_number::<i64>("limit")?.unwrap_or(default_limit);

        if limit < 1 {
            return Err(TypeError::new("limit", "Ensure this value is greater than 0."));
        }
        let limit = limit.min(max_limit);

        // The offset must stay representable as a Postgres BIGINT.
        if page < 1 || (page - 1).checked_mul(limit).is_none() {
            return Err(TypeError::new("page", "Invalid page."));
        }

        Ok(Self { page, limit })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<i64>,
    pub previous: Option<i64>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    /// Builds the page from rows carrying a `COUNT(*) OVER()` total. An empty
    /// page past the first one does not exist.
    pub fn paginate(rows: Vec<T>, total_rows: i64, page: Page) -> Result<Self, Error> {
        if rows.is_empty() && page.page > 1 {
            return Err(HtmlError::NotFound.new("Invalid page."));
        }
        Ok(Self::from_rows(rows, total_rows, page))
    }

    pub fn from_rows(rows: Vec<T>, total_rows: i64, page: Page) -> Self {
        if rows.is_empty() {
            return Self::no_rows();
        }
        let page_count = (total_rows + page.limit - 1) / page.limit;

        let next = if page.page < page_count {
            Some(page.page + 1)
        } else {
            None
        };
        let previous = if page.page > 1 {
            Some((page.page - 1).min(page_count.max(1)))
        } else {
            None
        };

        Self {
            count: total_rows,
            next,
            previous,
            results: rows,
        }
    }

    pub fn no_rows() -> Self {
        Self {
            count: 0,
            next: None,
            previous: None,
            results: vec![],
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PageContext<U> {
        PageContext {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(page: i64, limit: i64) -> Page {
        Page { page, limit }
    }

    #[test]
    fn middle_page_links_both_ways() {
        let ctx = PageContext::from_rows(vec![1, 2], 6, page(2, 2));

        assert_eq!(ctx.count, 6);
        assert_eq!(ctx.next, Some(3));
        assert_eq!(ctx.previous, Some(1));
    }

    #[test]
    fn last_partial_page_has_no_next() {
        let ctx = PageContext::from_rows(vec![7], 7, page(4, 2));

        assert_eq!(ctx.next, None);
        assert_eq!(ctx.previous, Some(3));
    }

    #[test]
    fn empty_first_page() {
        let ctx: PageContext<i32> = PageContext::from_rows(vec![], 0, page(1, 6));

        assert_eq!(ctx.count, 0);
        assert!(ctx.results.is_empty());
        assert_eq!((ctx.next, ctx.previous), (None, None));
    }

    #[test]
    fn empty_page_past_the_first_is_not_found() {
        let result: Result<PageContext<i32>, _> = PageContext::paginate(vec![], 0, page(3, 6));

        assert_eq!(result.unwrap_err().code, 404);
    }

    #[test]
    fn page_reads_defaults_and_caps_limit() {
        let form = Form::from_pairs(vec![("limit".to_string(), "500".to_string())]);
        let parsed = Page::from_form(&form, 6, 100).unwrap();

        assert_eq!(parsed, page(1, 100));
        assert_eq!(parsed.offset(), 0);
    }

    #[test]
    fn page_with_unrepresentable_offset_is_rejected() {
        let form = Form::from_pairs(vec![("page".to_string(), i64::MAX.to_string())]);
        let error = Error::from(Page::from_form(&form, 6, 100).unwrap_err());

        assert_eq!(error.code, 400);
        assert_eq!(error.field.as_deref(), Some("page"));
    }

    #[test]
    fn page_rejects_zero() {
        let form = Form::from_pairs(vec![("page".to_string(), "0".to_string())]);

        assert!(Page::from_form(&form, 6, 100).is_err());
    }
}
