//! Pagination for list views.

use serde::{Deserialize, Serialize};

/// A normalized page request.
///
/// Pages are 1-based. Out-of-range values are clamped rather than rejected
/// since they come straight from query strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    /// Default page size for dashboard tables.
    pub const DEFAULT_PAGE_SIZE: u32 = 10;
    /// Largest page size a caller may request.
    pub const MAX_PAGE_SIZE: u32 = 100;

    /// Build a page request, clamping `page` to at least 1 and `page_size`
    /// to `1..=MAX_PAGE_SIZE`.
    #[must_use]
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(Self::DEFAULT_PAGE_SIZE)
                .clamp(1, Self::MAX_PAGE_SIZE),
        }
    }

    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of rows to skip.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        (self.page as u64 - 1) * self.page_size as u64
    }

    /// Number of rows to return.
    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.page_size as u64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the totals needed to render pagination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    /// Assemble a page from the rows fetched for `request` and the total count.
    #[must_use]
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        Self {
            items,
            page: request.page(),
            page_size: request.page_size(),
            total,
            total_pages: total.div_ceil(u64::from(request.page_size())),
        }
    }

    /// Slice an already-filtered collection into the requested page.
    #[must_use]
    pub fn from_vec(all: Vec<T>, request: PageRequest) -> Self {
        let total = all.len() as u64;
        let offset = usize::try_from(request.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(request.limit()).unwrap_or(usize::MAX);
        let items = all.into_iter().skip(offset).take(limit).collect();
        Self::new(items, request, total)
    }

    /// Transform the items of this page, keeping the totals.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamps() {
        let req = PageRequest::new(Some(0), Some(500));
        assert_eq!(req.page(), 1);
        assert_eq!(req.page_size(), PageRequest::MAX_PAGE_SIZE);

        let req = PageRequest::new(None, Some(0));
        assert_eq!(req.page_size(), 1);
    }

    #[test]
    fn test_offset() {
        let req = PageRequest::new(Some(3), Some(10));
        assert_eq!(req.offset(), 20);
        assert_eq!(req.limit(), 10);
    }

    #[test]
    fn test_from_vec_slices_and_counts() {
        let page = Page::from_vec((1..=25).collect::<Vec<_>>(), PageRequest::new(Some(3), None));
        assert_eq!(page.items, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.total, 25);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn test_empty_page_has_zero_pages() {
        let page: Page<i32> = Page::from_vec(Vec::new(), PageRequest::default());
        assert_eq!(page.total_pages, 0);
        assert!(page.items.is_empty());
    }
}
