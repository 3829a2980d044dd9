//! Listing page state: pre-rendered first page plus "load more" pagination

use thiserror::Error;

use crate::config::ContentConfig;
use crate::content::{PostSummary, QueryResponse, RawRecord};
use crate::service::{self, ContentService, ServiceError};

/// Why a "load more" request did not extend the listing
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("no more pages to load")]
    Exhausted,

    #[error("a page is already being loaded")]
    InFlight,

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Posts shown on the listing page and the cursor to the next page.
///
/// `posts` only ever grows at the end, in the order pages arrive. The cursor
/// is replaced by every successful fetch and left alone by failed ones, so a
/// failed request can simply be retried.
#[derive(Debug, Clone, Default)]
pub struct ListingView {
    posts: Vec<PostSummary>,
    cursor: Option<String>,
    in_flight: bool,
    last_error: Option<String>,
}

impl ListingView {
    pub fn new(posts: Vec<PostSummary>, cursor: Option<String>) -> Self {
        Self {
            posts,
            cursor,
            in_flight: false,
            last_error: None,
        }
    }

    /// Initialize from the build-time query. A failed query still produces
    /// a page: no posts and nothing to load.
    pub fn from_prerender(result: service::Result<QueryResponse>) -> Self {
        match result {
            Ok(response) => Self::new(normalize_batch(&response.results), response.next_page),
            Err(e) => {
                tracing::warn!("Pre-rendering the listing failed, rendering it empty: {}", e);
                Self::default()
            }
        }
    }

    /// Query the first page and initialize from it
    pub async fn prerender<S: ContentService + ?Sized>(service: &S, config: &ContentConfig) -> Self {
        let result = service
            .query_by_type(&config.document_type, &config.fetch, config.page_size)
            .await;
        Self::from_prerender(result)
    }

    /// An empty listing positioned at `cursor`; loading from it yields
    /// exactly the page the cursor points at
    pub fn resume(cursor: String) -> Self {
        Self::new(Vec::new(), Some(cursor))
    }

    pub fn posts(&self) -> &[PostSummary] {
        &self.posts
    }

    pub fn into_posts(self) -> Vec<PostSummary> {
        self.posts
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Whether the "load more" control is shown at all
    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }

    /// Whether the "load more" control is enabled right now
    pub fn can_load_more(&self) -> bool {
        self.cursor.is_some() && !self.in_flight
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    /// Message of the last failed request, cleared by the next success
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Claim the next page. Marks the request in flight and hands out the
    /// cursor to fetch; a second call before [`finish_load`](Self::finish_load)
    /// is rejected.
    pub fn begin_load(&mut self) -> Result<String, LoadError> {
        if self.in_flight {
            return Err(LoadError::InFlight);
        }
        let cursor = self.cursor.clone().ok_or(LoadError::Exhausted)?;
        self.in_flight = true;
        Ok(cursor)
    }

    /// Apply the outcome of the request started by `begin_load`.
    ///
    /// Returns how many posts were appended.
    pub fn finish_load(
        &mut self,
        outcome: service::Result<QueryResponse>,
    ) -> Result<usize, LoadError> {
        self.in_flight = false;
        match outcome {
            Ok(response) => {
                let batch = normalize_batch(&response.results);
                let appended = batch.len();
                self.posts.extend(batch);
                self.cursor = response.next_page;
                self.last_error = None;
                Ok(appended)
            }
            Err(e) => {
                tracing::warn!("Loading more posts failed: {}", e);
                self.last_error = Some(e.to_string());
                Err(LoadError::Service(e))
            }
        }
    }

    /// Fetch the next page and append it
    pub async fn load_more<S: ContentService + ?Sized>(
        &mut self,
        service: &S,
    ) -> Result<usize, LoadError> {
        let cursor = self.begin_load()?;
        let outcome = service.fetch_page(&cursor).await;
        self.finish_load(outcome)
    }
}

/// Normalize a page of raw records, keeping their order
pub fn normalize_batch(records: &[RawRecord]) -> Vec<PostSummary> {
    records
        .iter()
        .filter_map(|record| {
            let summary = PostSummary::from_record(record);
            if summary.is_none() {
                tracing::warn!("Skipping record without an identifier");
            }
            summary
        })
        .collect()
}
