//! Render-independent view over the guestbook's message list.
//!
//! The chain hands back messages in ascending inclusion order. The feed
//! reverses them for newest-first display, filters them by a free-text
//! query and reveals them `page_size` at a time.

pub use ethers::types::Address;
use serde::{Deserialize, Serialize};

/// Maximum message length enforced on the submission path.
pub const MAX_MESSAGE_LENGTH: usize = 280;

/// One recorded guestbook entry, as stored by the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestbookMessage {
    pub sender: Address,
    pub content: String,
    /// Seconds since the Unix epoch, set at inclusion.
    pub timestamp: u64,
}

impl GuestbookMessage {
    fn matches(&self, needle: &str) -> bool {
        self.content.to_lowercase().contains(needle)
            || format!("{:#x}", self.sender).contains(needle)
    }
}

/// Visible slice of the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedView<'a> {
    pub visible: Vec<&'a GuestbookMessage>,
    pub has_more: bool,
}

/// Which placeholder to show when nothing is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EmptyState {
    NoMessages,
    NoMatches,
}

impl EmptyState {
    pub fn message(self) -> &'static str {
        match self {
            EmptyState::NoMessages => "No messages yet.",
            EmptyState::NoMatches => "No messages match your search.",
        }
    }
}

impl FeedView<'_> {
    /// `total` is the length of the unfiltered message list.
    pub fn empty_state(&self, total: usize) -> Option<EmptyState> {
        if !self.visible.is_empty() {
            None
        } else if total == 0 {
            Some(EmptyState::NoMessages)
        } else {
            Some(EmptyState::NoMatches)
        }
    }
}

/// Reverses the chain's ascending list into display order.
pub fn newest_first(mut messages: Vec<GuestbookMessage>) -> Vec<GuestbookMessage> {
    messages.reverse();
    messages
}

/// Derives the visible messages for `query` with `page_count` pages of
/// `page_size` revealed. Order is preserved from `messages`.
pub fn derive_view<'a>(
    messages: &'a [GuestbookMessage],
    query: &str,
    page_count: usize,
    page_size: usize,
) -> FeedView<'a> {
    let filtered: Vec<&GuestbookMessage> = if query.trim().is_empty() {
        messages.iter().collect()
    } else {
        let needle = query.to_lowercase();
        messages.iter().filter(|m| m.matches(&needle)).collect()
    };

    let limit = page_count.saturating_mul(page_size);
    let has_more = filtered.len() > limit;
    let visible = filtered.into_iter().take(limit).collect();

    FeedView { visible, has_more }
}

/// Search text plus reveal depth for one viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedState {
    query: String,
    page_count: usize,
}

impl Default for FeedState {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedState {
    pub fn new() -> Self {
        Self {
            query: String::new(),
            page_count: 1,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// Every new query starts again from the first page.
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.page_count = 1;
    }

    pub fn load_more(&mut self) {
        self.page_count = self.page_count.saturating_add(1);
    }

    pub fn view<'a>(&self, messages: &'a [GuestbookMessage], page_size: usize) -> FeedView<'a> {
        derive_view(messages, &self.query, self.page_count, page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(sender_byte: u8, content: &str, timestamp: u64) -> GuestbookMessage {
        GuestbookMessage {
            sender: Address::repeat_byte(sender_byte),
            content: content.to_string(),
            timestamp,
        }
    }

    fn numbered(n: usize) -> Vec<GuestbookMessage> {
        (0..n)
            .map(|i| message(1, &format!("message {i}"), 1_700_000_000 + i as u64))
            .collect()
    }

    #[test]
    fn test_empty_list() {
        let view = derive_view(&[], "", 1, 10);
        assert!(view.visible.is_empty());
        assert!(!view.has_more);
        assert_eq!(view.empty_state(0), Some(EmptyState::NoMessages));
    }

    #[test]
    fn test_first_page_of_25() {
        let messages = numbered(25);
        let view = derive_view(&messages, "", 1, 10);
        assert_eq!(view.visible.len(), 10);
        assert!(view.has_more);
        assert_eq!(view.visible[0].content, "message 0");
    }

    #[test]
    fn test_three_pages_reveal_all_25() {
        let messages = numbered(25);
        let view = derive_view(&messages, "", 3, 10);
        assert_eq!(view.visible.len(), 25);
        assert!(!view.has_more);
    }

    #[test]
    fn test_exact_page_boundary_has_no_more() {
        let messages = numbered(20);
        let view = derive_view(&messages, "", 2, 10);
        assert_eq!(view.visible.len(), 20);
        assert!(!view.has_more);
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let messages = vec![message(1, "Hello GM", 1), message(2, "wagmi", 2)];
        let view = derive_view(&messages, "hello", 1, 10);
        assert_eq!(view.visible.len(), 1);
        assert_eq!(view.visible[0].content, "Hello GM");

        // Plain substring match, so "wagmi" counts too.
        let view = derive_view(&messages, "GM", 1, 10);
        assert_eq!(view.visible.len(), 2);
    }

    #[test]
    fn test_filter_matches_sender() {
        let messages = vec![message(0xab, "first", 1), message(0x01, "second", 2)];
        let view = derive_view(&messages, "0xABAB", 1, 10);
        assert_eq!(view.visible.len(), 1);
        assert_eq!(view.visible[0].content, "first");
    }

    #[test]
    fn test_whitespace_query_keeps_everything() {
        let messages = numbered(3);
        let view = derive_view(&messages, "   ", 1, 10);
        assert_eq!(view.visible.len(), 3);
    }

    #[test]
    fn test_no_matches_is_distinguished_from_no_messages() {
        let messages = numbered(5);
        let view = derive_view(&messages, "nothing like this", 1, 10);
        assert!(view.visible.is_empty());
        assert!(!view.has_more);
        assert_eq!(view.empty_state(messages.len()), Some(EmptyState::NoMatches));
    }

    #[test]
    fn test_filtered_results_paginate() {
        let mut messages = numbered(30);
        for m in messages.iter_mut().step_by(2) {
            m.content.push_str(" gm");
        }
        let view = derive_view(&messages, "gm", 1, 10);
        assert_eq!(view.visible.len(), 10);
        assert!(view.has_more);
        let view = derive_view(&messages, "gm", 2, 10);
        assert_eq!(view.visible.len(), 15);
        assert!(!view.has_more);
    }

    #[test]
    fn test_derive_view_is_pure() {
        let messages = numbered(12);
        let snapshot = messages.clone();
        let first = derive_view(&messages, "message 1", 1, 10);
        let second = derive_view(&messages, "message 1", 1, 10);
        assert_eq!(first, second);
        assert_eq!(messages, snapshot);
    }

    #[test]
    fn test_huge_page_count_saturates() {
        let messages = numbered(3);
        let view = derive_view(&messages, "", usize::MAX, 10);
        assert_eq!(view.visible.len(), 3);
        assert!(!view.has_more);
    }

    #[test]
    fn test_newest_first_reverses() {
        let ordered = newest_first(numbered(3));
        let stamps: Vec<u64> = ordered.iter().map(|m| m.timestamp).collect();
        assert_eq!(stamps, vec![1_700_000_002, 1_700_000_001, 1_700_000_000]);
    }

    #[test]
    fn test_set_query_resets_page() {
        let messages = numbered(25);
        let mut state = FeedState::new();
        state.load_more();
        state.load_more();
        assert_eq!(state.view(&messages, 10).visible.len(), 25);

        state.set_query("message");
        assert_eq!(state.page_count(), 1);
        let view = state.view(&messages, 10);
        assert_eq!(view.visible.len(), 10);
        assert!(view.has_more);
    }

    #[test]
    fn test_sender_search_uses_full_hex() {
        let sender: Address = "0xB71C596aC966125d03960A43c762E86e51040F9B".parse().unwrap();
        let messages = vec![GuestbookMessage {
            sender,
            content: "gm".to_string(),
            timestamp: 1,
        }];
        // The middle of the address, which an abbreviated rendering would drop.
        assert_eq!(derive_view(&messages, "966125d039", 1, 10).visible.len(), 1);
        assert_eq!(derive_view(&messages, "0xB71C596A", 1, 10).visible.len(), 1);
    }
}
