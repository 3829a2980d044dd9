//! Content service backed by a local JSON file

use async_trait::async_trait;
use std::fs;
use std::path::Path;

use super::{ContentService, Result, ServiceError};
use crate::content::{QueryResponse, RawRecord};

const CURSOR_PREFIX: &str = "fixture:";

/// Serves a fixed list of records, paginated in memory.
///
/// The file holds a JSON array of raw records in the same shape the HTTP
/// API returns. Cursors look like `fixture:2`.
#[derive(Debug, Clone)]
pub struct FixtureContentService {
    records: Vec<RawRecord>,
    page_size: usize,
}

impl FixtureContentService {
    pub fn new(records: Vec<RawRecord>, page_size: usize) -> Self {
        Self {
            records,
            page_size: page_size.max(1),
        }
    }

    /// Load records from a JSON file
    pub fn load<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let records: Vec<RawRecord> = serde_json::from_str(&content)?;
        tracing::debug!("Loaded {} fixture records", records.len());
        Ok(Self::new(records, page_size))
    }

    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    fn total_pages(&self) -> usize {
        self.records.len().div_ceil(self.page_size).max(1)
    }

    fn page(&self, page: usize) -> QueryResponse {
        let total_pages = self.total_pages();
        let start = (page - 1) * self.page_size;
        let end = (start + self.page_size).min(self.records.len());
        let results = if start < end {
            self.records[start..end].to_vec()
        } else {
            Vec::new()
        };

        QueryResponse {
            next_page: (page < total_pages).then(|| format!("{}{}", CURSOR_PREFIX, page + 1)),
            results,
            page: Some(page as u64),
            total_pages: Some(total_pages as u64),
            total_results_size: Some(self.records.len() as u64),
        }
    }
}

#[async_trait]
impl ContentService for FixtureContentService {
    async fn query_by_type(
        &self,
        _document_type: &str,
        _fetch: &[String],
        page_size: usize,
    ) -> Result<QueryResponse> {
        if page_size != self.page_size {
            tracing::debug!(
                "Fixture page size is {}, ignoring requested {}",
                self.page_size,
                page_size
            );
        }
        Ok(self.page(1))
    }

    async fn fetch_page(&self, cursor: &str) -> Result<QueryResponse> {
        let page = cursor
            .strip_prefix(CURSOR_PREFIX)
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|n| *n >= 1 && *n <= self.total_pages())
            .ok_or_else(|| ServiceError::InvalidCursor(cursor.to_string()))?;
        Ok(self.page(page))
    }

    async fn get_by_uid(&self, _document_type: &str, uid: &str) -> Result<Option<RawRecord>> {
        Ok(self
            .records
            .iter()
            .find(|r| r.uid.as_deref() == Some(uid))
            .cloned())
    }
}
