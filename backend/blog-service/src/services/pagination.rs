//! Fixed-size pagination shared by every feed and listing.
//!
//! Page numbers are 1-based. A missing or non-numeric page means the first
//! page; anything outside `1..=num_pages` clamps to the last page. An empty
//! listing still has one (empty) page.

use serde::{Deserialize, Serialize};

/// Page number as supplied by the caller, before clamping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest(Option<i64>);

impl PageRequest {
    pub fn first() -> Self {
        Self(None)
    }

    pub fn number(number: i64) -> Self {
        Self(Some(number))
    }

    /// Lenient parse of a `?page=` value.
    pub fn parse(raw: Option<&str>) -> Self {
        Self(raw.and_then(|value| value.trim().parse::<i64>().ok()))
    }
}

/// Query-string form of a page request, e.g. `?page=2`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl From<&PageQuery> for PageRequest {
    fn from(query: &PageQuery) -> Self {
        PageRequest::parse(query.page.as_deref())
    }
}

/// One slice of an ordered listing plus the metadata pagination controls need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
    pub page_size: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    page_size: usize,
}

impl Paginator {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    pub fn num_pages(&self, count: usize) -> usize {
        count.div_ceil(self.page_size).max(1)
    }

    /// Clamp a requested page number into the valid range for `count` items.
    pub fn resolve(&self, request: PageRequest, count: usize) -> usize {
        let last = self.num_pages(count);
        match request.0 {
            None => 1,
            Some(n) if n < 1 => last,
            Some(n) if n as u64 > last as u64 => last,
            Some(n) => n as usize,
        }
    }

    /// `(limit, offset)` of a resolved page.
    pub fn window(&self, number: usize) -> (i64, i64) {
        let offset = (number.saturating_sub(1)) * self.page_size;
        (self.page_size as i64, offset as i64)
    }

    pub fn page<T>(&self, items: Vec<T>, number: usize, count: usize) -> Page<T> {
        let num_pages = self.num_pages(count);
        Page {
            items,
            number,
            num_pages,
            count,
            page_size: self.page_size,
            has_next: number < num_pages,
            has_previous: number > 1,
        }
    }

    /// Slice an already materialized listing.
    pub fn paginate_vec<T>(&self, all: Vec<T>, request: PageRequest) -> Page<T> {
        let count = all.len();
        let number = self.resolve(request, count);
        let (limit, offset) = self.window(number);
        let items = all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        self.page(items, number, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirteen_items_split_ten_and_three() {
        let paginator = Paginator::new(10);
        let items: Vec<u32> = (0..13).collect();

        let first = paginator.paginate_vec(items.clone(), PageRequest::number(1));
        assert_eq!(first.len(), 10);
        assert!(first.has_next);
        assert!(!first.has_previous);

        let second = paginator.paginate_vec(items.clone(), PageRequest::number(2));
        assert_eq!(second.len(), 3);
        assert_eq!(second.items, vec![10, 11, 12]);
        assert!(!second.has_next);
        assert_eq!(second.num_pages, 2);
    }

    #[test]
    fn out_of_range_clamps_to_last_page() {
        let paginator = Paginator::new(10);
        let items: Vec<u32> = (0..13).collect();

        let last = paginator.paginate_vec(items.clone(), PageRequest::number(2));
        let beyond = paginator.paginate_vec(items.clone(), PageRequest::number(3));
        let negative = paginator.paginate_vec(items, PageRequest::number(-4));
        assert_eq!(beyond, last);
        assert_eq!(negative, last);
    }

    #[test]
    fn garbage_page_means_first_page() {
        assert_eq!(PageRequest::parse(Some("abc")), PageRequest::first());
        assert_eq!(PageRequest::parse(None), PageRequest::first());
        assert_eq!(PageRequest::parse(Some(" 2 ")), PageRequest::number(2));
        assert_eq!(Paginator::new(10).resolve(PageRequest::first(), 45), 1);
    }

    #[test]
    fn empty_listing_has_one_empty_page() {
        let paginator = Paginator::new(10);
        let page = paginator.paginate_vec(Vec::<u32>::new(), PageRequest::number(7));
        assert_eq!(page.number, 1);
        assert_eq!(page.num_pages, 1);
        assert!(page.is_empty());
    }

    #[test]
    fn window_offsets_follow_page_size() {
        let paginator = Paginator::new(10);
        assert_eq!(paginator.window(1), (10, 0));
        assert_eq!(paginator.window(3), (10, 20));
    }
}
