//! Pagination arithmetic shared by the page and API handlers.

use serde::Serialize;
use weblog_web::Args;

const PAGE_SIZE: u64 = 10;

/// One page of a listing: computed from the total item count and a 1-based
/// page index, serialized into JSON payloads and template models alike.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub item_count: u64,
    pub page_index: u64,
    pub page_size: u64,
    pub page_count: u64,
    pub offset: u64,
    pub limit: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl Page {
    pub fn new(item_count: u64, page_index: u64) -> Self {
        let page_count = item_count.div_ceil(PAGE_SIZE);
        let page_index = if item_count == 0 { 1 } else { page_index.clamp(1, page_count) };
        let offset = PAGE_SIZE * (page_index - 1);
        Self {
            item_count,
            page_index,
            page_size: PAGE_SIZE,
            page_count,
            offset,
            limit: PAGE_SIZE,
            has_next: page_index < page_count,
            has_previous: page_index > 1,
        }
    }
}

/// Reads the 1-based `page` argument, tolerating junk.
pub fn page_index(args: &Args) -> u64 {
    args.string("page").parse().unwrap_or(1).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_page_of_many() {
        let page = Page::new(25, 1);
        assert_eq!(page.page_count, 3);
        assert_eq!(page.offset, 0);
        assert!(page.has_next);
        assert!(!page.has_previous);
    }

    #[test]
    fn last_page() {
        let page = Page::new(25, 3);
        assert_eq!(page.offset, 20);
        assert!(!page.has_next);
        assert!(page.has_previous);
    }

    #[test]
    fn out_of_range_index_clamps() {
        let page = Page::new(25, 99);
        assert_eq!(page.page_index, 3);
        let page = Page::new(25, 0);
        assert_eq!(page.page_index, 1);
    }

    #[test]
    fn empty_listing() {
        let page = Page::new(0, 1);
        assert_eq!(page.page_count, 0);
        assert_eq!(page.offset, 0);
        assert!(!page.has_next);
    }
}
