//! Detail page: reading time, view state and content resolution

mod resolver;

use crate::content::{PostDetail, Section};

pub use resolver::{
    fetch_detail, DetailResolver, EagerResolver, OnDemandResolver, DEFAULT_MAX_ENTRIES,
};

/// Default reading speed
pub const WORDS_PER_MINUTE: usize = 200;

/// What a detail route currently shows
#[derive(Debug, Clone, PartialEq)]
pub enum DetailView {
    /// Content is not available yet; render the placeholder
    Loading,
    /// Content resolved
    Ready(Box<PostDetail>),
    /// Terminal: the identifier will never resolve
    NotFound,
}

impl DetailView {
    /// `Ready` and `NotFound` never change again
    pub fn is_terminal(&self) -> bool {
        !matches!(self, DetailView::Loading)
    }

    pub fn detail(&self) -> Option<&PostDetail> {
        match self {
            DetailView::Ready(detail) => Some(detail),
            _ => None,
        }
    }
}

/// Number of whitespace-separated words in a fragment
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Estimated reading time in whole minutes, from the word counts taken
/// when the sections were normalized.
///
/// Each section is rounded up on its own and the per-section minutes are
/// summed, so two sections of 201 words read in 4 minutes while a single
/// section of 402 words reads in 3.
pub fn estimate_reading_time(sections: &[Section], words_per_minute: usize) -> usize {
    let words_per_minute = words_per_minute.max(1);
    sections
        .iter()
        .map(|section| section.words.div_ceil(words_per_minute))
        .sum()
}
