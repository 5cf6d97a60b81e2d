use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::message::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLimits {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

/// A 1-indexed page request whose size lies within the configured limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: usize,
    page_size: usize,
}

impl PageRequest {
    /// Validates raw caller input. Missing values take the defaults.
    pub fn new(
        page: Option<usize>,
        page_size: Option<usize>,
        limits: &PageLimits,
    ) -> Result<Self, SearchError> {
        let page = page.unwrap_or(1);
        let page_size = page_size.unwrap_or(limits.default_page_size);
        if page == 0 {
            return Err(SearchError::OutOfRange {
                field: "page",
                value: page,
                min: 1,
                max: usize::MAX,
            });
        }
        if page_size == 0 || page_size > limits.max_page_size {
            return Err(SearchError::OutOfRange {
                field: "page_size",
                value: page_size,
                min: 1,
                max: limits.max_page_size,
            });
        }
        Ok(Self { page, page_size })
    }

    /// Forces out-of-range input back into bounds instead of rejecting it.
    pub fn clamped(page: usize, page_size: usize, limits: &PageLimits) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, limits.max_page_size.max(1)),
        }
    }

    pub fn first(limits: &PageLimits) -> Self {
        Self::clamped(1, limits.default_page_size, limits)
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    /// Number of items before slicing.
    pub total: usize,
    pub total_pages: usize,
    pub page: usize,
    pub page_size: usize,
}

/// Case-insensitive substring filter over body, user name and user id.
///
/// An empty or missing query keeps every message. Order is preserved.
pub fn search<'a>(query: Option<&str>, messages: &'a [Message]) -> Vec<&'a Message> {
    let needle = match query {
        Some(q) if !q.is_empty() => q.to_lowercase(),
        _ => return messages.iter().collect(),
    };

    messages
        .iter()
        .filter(|msg| matches(msg, &needle))
        .collect()
}

/// `needle` must already be lowercase.
pub fn matches(msg: &Message, needle: &str) -> bool {
    msg.message.to_lowercase().contains(needle)
        || msg.user_name.to_lowercase().contains(needle)
        || msg.user_id.to_lowercase().contains(needle)
}

/// Slices one page out of `items`. Pages past the end are empty, not errors.
pub fn paginate<T>(items: &[T], request: PageRequest) -> Page<'_, T> {
    let page = request.page.max(1);
    let page_size = request.page_size.max(1);
    let total = items.len();
    let start = (page - 1).saturating_mul(page_size).min(total);
    let end = start.saturating_add(page_size).min(total);

    Page {
        items: &items[start..end],
        total,
        total_pages: total.div_ceil(page_size),
        page,
        page_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str, user_id: &str, user_name: &str, body: &str) -> Message {
        Message {
            id: id.into(),
            user_id: user_id.into(),
            user_name: user_name.into(),
            timestamp: "2024-10-21T07:28:00Z".into(),
            message: body.into(),
        }
    }

    fn sample() -> Vec<Message> {
        vec![
            msg("1", "u-alice", "Alice Martin", "Booking a table for Friday"),
            msg("2", "u-bob", "Bob Stone", "Need a PARIS hotel"),
            msg("3", "u-paris7", "Carla Diaz", "Flights please"),
            msg("4", "u-dan", "Dan Paris", "nothing relevant"),
            msg("5", "u-eve", "Eve Moss", "see you in paris next week"),
        ]
    }

    fn ids(found: &[&Message]) -> Vec<String> {
        found.iter().map(|m| m.id.clone()).collect()
    }

    #[test]
    fn empty_query_returns_everything_in_order() {
        let messages = sample();
        assert_eq!(ids(&search(None, &messages)), vec!["1", "2", "3", "4", "5"]);
        assert_eq!(search(Some(""), &messages).len(), messages.len());
    }

    #[test]
    fn matches_any_field_ignoring_case() {
        let messages = sample();
        // body, user_id and user_name hits, in fetch order
        assert_eq!(ids(&search(Some("Paris"), &messages)), vec!["2", "3", "4", "5"]);
    }

    #[test]
    fn user_id_only_match_is_returned() {
        let messages = sample();
        let found = search(Some("U-PARIS7"), &messages);
        assert_eq!(ids(&found), vec!["3"]);
        assert!(!found[0].message.to_lowercase().contains("paris"));
    }

    #[test]
    fn no_match_yields_empty() {
        let messages = sample();
        assert!(search(Some("zebra"), &messages).is_empty());
    }

    #[test]
    fn page_never_exceeds_page_size() {
        let items: Vec<usize> = (0..237).collect();
        let limits = PageLimits::default();
        for page_size in 1..=limits.max_page_size {
            let request = PageRequest::new(Some(1), Some(page_size), &limits).unwrap();
            let page = paginate(&items, request);
            assert!(page.items.len() <= page_size);
            assert_eq!(page.total_pages, items.len().div_ceil(page_size));
        }
    }

    #[test]
    fn pages_cover_all_items_once() {
        let items: Vec<usize> = (0..45).collect();
        let limits = PageLimits::default();
        let mut seen = Vec::new();
        let total_pages = paginate(&items, PageRequest::clamped(1, 20, &limits)).total_pages;
        assert_eq!(total_pages, 3);
        for page in 1..=total_pages {
            seen.extend_from_slice(paginate(&items, PageRequest::clamped(page, 20, &limits)).items);
        }
        assert_eq!(seen, items);
    }

    #[test]
    fn page_past_end_is_empty() {
        let items: Vec<usize> = (0..10).collect();
        let page = paginate(&items, PageRequest::clamped(5, 5, &PageLimits::default()));
        assert!(page.items.is_empty());
        assert_eq!(page.total, 10);
        assert_eq!(page.total_pages, 2);

        let far = paginate(&items, PageRequest::clamped(usize::MAX, 100, &PageLimits::default()));
        assert!(far.items.is_empty());
    }

    #[test]
    fn empty_input_has_zero_pages() {
        let items: Vec<usize> = Vec::new();
        let page = paginate(&items, PageRequest::first(&PageLimits::default()));
        assert_eq!(page.total_pages, 0);
        assert!(page.items.is_empty());
    }

    #[test]
    fn request_validation_and_clamping() {
        let limits = PageLimits::default();
        assert_eq!(
            PageRequest::new(Some(0), None, &limits),
            Err(SearchError::OutOfRange { field: "page", value: 0, min: 1, max: usize::MAX })
        );
        assert!(matches!(
            PageRequest::new(None, Some(101), &limits),
            Err(SearchError::OutOfRange { field: "page_size", .. })
        ));
        let defaulted = PageRequest::new(None, None, &limits).unwrap();
        assert_eq!((defaulted.page(), defaulted.page_size()), (1, 20));

        let clamped = PageRequest::clamped(0, 500, &limits);
        assert_eq!((clamped.page(), clamped.page_size()), (1, 100));
        let clamped = PageRequest::clamped(3, 0, &limits);
        assert_eq!((clamped.page(), clamped.page_size()), (3, 1));
    }
}
