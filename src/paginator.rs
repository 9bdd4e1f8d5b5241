use crate::reminder::Pagination;
use std::fmt;

/// One entry of the page navigation bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    Page(u32),
    Ellipsis,
}

impl fmt::Display for PageItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageItem::Page(n) => write!(f, "{}", n),
            PageItem::Ellipsis => f.write_str("..."),
        }
    }
}

/// Pages to show around `current`: a window of `delta` on each side, with the first and
/// last page always present and a single ellipsis standing in for any gap wider than one.
pub fn visible_pages(current: u32, total: u32, delta: u32) -> Vec<PageItem> {
    let total = total.max(1);
    let current = current.clamp(1, total);
    let left = current.saturating_sub(delta).max(1);
    let right = current.saturating_add(delta).min(total);

    let mut items = Vec::new();
    if left > 1 {
        items.push(PageItem::Page(1));
        if left > 2 {
            items.push(PageItem::Ellipsis);
        }
    }

    items.extend((left..=right).map(PageItem::Page));

    if right < total {
        if right < total - 1 {
            items.push(PageItem::Ellipsis);
        }
        items.push(PageItem::Page(total));
    }
    items
}

/// Page to fetch for a jump to `page`, or None when it is out of range.
pub fn go_to_page(pagination: &Pagination, page: u32) -> Option<u32> {
    (page >= 1 && page <= pagination.total_pages).then_some(page)
}

pub fn next_page(pagination: &Pagination) -> Option<u32> {
    if pagination.has_next {
        go_to_page(pagination, pagination.current_page + 1)
    } else {
        None
    }
}

pub fn previous_page(pagination: &Pagination) -> Option<u32> {
    if pagination.has_previous {
        go_to_page(pagination, pagination.current_page.saturating_sub(1))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PageItem::{Ellipsis, Page};

    fn pagination(current_page: u32, total_pages: u32) -> Pagination {
        Pagination {
            current_page,
            total_pages,
            total_count: u64::from(total_pages) * 20,
            ..Pagination::default()
        }
        .normalized()
    }

    #[test]
    fn test_window_with_both_ellipses() {
        assert_eq!(
            visible_pages(5, 10, 2),
            vec![Page(1), Ellipsis, Page(3), Page(4), Page(5), Page(6), Page(7), Ellipsis, Page(10)]
        );
    }

    #[test]
    fn test_small_totals_have_no_ellipsis() {
        assert_eq!(visible_pages(1, 3, 2), vec![Page(1), Page(2), Page(3)]);
        assert_eq!(visible_pages(1, 1, 2), vec![Page(1)]);
        assert_eq!(visible_pages(1, 0, 2), vec![Page(1)]);
    }

    #[test]
    fn test_one_page_gap_is_shown_not_elided() {
        assert_eq!(
            visible_pages(4, 7, 2),
            vec![Page(1), Page(2), Page(3), Page(4), Page(5), Page(6), Page(7)]
        );
        assert_eq!(
            visible_pages(1, 8, 2),
            vec![Page(1), Page(2), Page(3), Ellipsis, Page(8)]
        );
    }

    #[test]
    fn test_go_to_page_bounds() {
        let p = pagination(2, 4);
        assert_eq!(go_to_page(&p, 0), None);
        assert_eq!(go_to_page(&p, 5), None);
        assert_eq!(go_to_page(&p, 4), Some(4));
    }

    #[test]
    fn test_next_and_previous_follow_flags() {
        assert_eq!(next_page(&pagination(1, 3)), Some(2));
        assert_eq!(previous_page(&pagination(1, 3)), None);
        assert_eq!(next_page(&pagination(3, 3)), None);
        assert_eq!(previous_page(&pagination(3, 3)), Some(2));
    }

    #[test]
    fn test_ellipsis_renders_as_dots() {
        assert_eq!(visible_pages(5, 10, 2)[1].to_string(), "...");
        assert_eq!(Page(4).to_string(), "4");
    }
}
