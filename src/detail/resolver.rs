//! Detail resolvers: eager (build time) and on-demand (serve time)

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::DetailView;
use crate::content::PostDetail;
use crate::service::{self, ContentService};

/// Turns an identifier into what its detail route should show
#[async_trait]
pub trait DetailResolver: Send + Sync {
    async fn resolve(&self, uid: &str) -> DetailView;
}

/// Look up and normalize one post
pub async fn fetch_detail<S: ContentService + ?Sized>(
    service: &S,
    document_type: &str,
    uid: &str,
    sanitize: bool,
) -> service::Result<Option<PostDetail>> {
    let record = service.get_by_uid(document_type, uid).await?;
    let detail = record.as_ref().and_then(PostDetail::from_record);
    Ok(match detail {
        Some(detail) if sanitize => Some(detail.sanitized()),
        other => other,
    })
}

/// Resolves every identifier known at build time before anything is served.
///
/// Identifiers that could not be fetched resolve to `Loading` so the
/// on-demand path can pick them up later.
#[derive(Debug, Default)]
pub struct EagerResolver {
    details: HashMap<String, PostDetail>,
}

impl EagerResolver {
    pub async fn prefetch<S: ContentService + ?Sized>(
        service: &S,
        document_type: &str,
        uids: &[String],
        sanitize: bool,
    ) -> Self {
        let mut details = HashMap::new();
        for uid in uids {
            match fetch_detail(service, document_type, uid, sanitize).await {
                Ok(Some(detail)) => {
                    details.insert(uid.clone(), detail);
                }
                Ok(None) => {
                    tracing::warn!("Post {} listed but not found, deferring", uid);
                }
                Err(e) => {
                    tracing::warn!("Failed to fetch post {}: {}, deferring", uid, e);
                }
            }
        }
        tracing::debug!("Prefetched {}/{} posts", details.len(), uids.len());
        Self { details }
    }

    pub fn len(&self) -> usize {
        self.details.len()
    }

    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }
}

#[async_trait]
impl DetailResolver for EagerResolver {
    async fn resolve(&self, uid: &str) -> DetailView {
        match self.details.get(uid) {
            Some(detail) => DetailView::Ready(Box::new(detail.clone())),
            None => DetailView::Loading,
        }
    }
}

/// Identifiers remembered by default before terminal states get evicted
pub const DEFAULT_MAX_ENTRIES: usize = 1024;

/// Resolves identifiers lazily, one at a time, with a timeout.
///
/// Each identifier moves from absent to `Loading` to a terminal state and is
/// not fetched again while it is remembered. At most `max_entries` terminal
/// states are kept; `NotFound` entries go first, then `Ready` ones. Entries
/// still `Loading` are never evicted.
pub struct OnDemandResolver {
    service: Arc<dyn ContentService>,
    document_type: String,
    timeout: Duration,
    sanitize: bool,
    max_entries: usize,
    states: RwLock<HashMap<String, DetailView>>,
}

impl OnDemandResolver {
    pub fn new(
        service: Arc<dyn ContentService>,
        document_type: &str,
        timeout: Duration,
        sanitize: bool,
    ) -> Self {
        Self {
            service,
            document_type: document_type.to_string(),
            timeout,
            sanitize,
            max_entries: DEFAULT_MAX_ENTRIES,
            states: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    /// Number of identifiers currently remembered
    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    /// Current state, `None` if nobody asked for this identifier yet
    pub async fn status(&self, uid: &str) -> Option<DetailView> {
        self.states.read().await.get(uid).cloned()
    }

    /// Claim the resolution of `uid`. Returns `true` for exactly one caller;
    /// that caller must follow up with [`complete`](Self::complete).
    pub async fn begin(&self, uid: &str) -> bool {
        let mut states = self.states.write().await;
        if states.contains_key(uid) {
            return false;
        }
        if states.len() >= self.max_entries {
            evict(&mut states, self.max_entries);
        }
        states.insert(uid.to_string(), DetailView::Loading);
        true
    }

    /// Fetch `uid` and store the terminal state
    pub async fn complete(&self, uid: &str) -> DetailView {
        let lookup = fetch_detail(
            self.service.as_ref(),
            &self.document_type,
            uid,
            self.sanitize,
        );
        let view = match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(Some(detail))) => DetailView::Ready(Box::new(detail)),
            Ok(Ok(None)) => {
                tracing::info!("Post {} not found", uid);
                DetailView::NotFound
            }
            Ok(Err(e)) => {
                tracing::warn!("Failed to resolve post {}: {}", uid, e);
                DetailView::NotFound
            }
            Err(_) => {
                tracing::warn!(
                    "Resolving post {} timed out after {:?}",
                    uid,
                    self.timeout
                );
                DetailView::NotFound
            }
        };

        self.states
            .write()
            .await
            .insert(uid.to_string(), view.clone());
        view
    }
}

/// Make room for one more entry, dropping `NotFound` before `Ready`
fn evict(states: &mut HashMap<String, DetailView>, max_entries: usize) {
    let before = states.len();
    states.retain(|_, view| *view != DetailView::NotFound);
    if states.len() >= max_entries {
        states.retain(|_, view| !view.is_terminal());
    }
    tracing::debug!("Evicted {} resolved posts", before - states.len());
}

#[async_trait]
impl DetailResolver for OnDemandResolver {
    async fn resolve(&self, uid: &str) -> DetailView {
        if let Some(view) = self.status(uid).await {
            return view;
        }
        if self.begin(uid).await {
            self.complete(uid).await
        } else {
            self.status(uid).await.unwrap_or(DetailView::Loading)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{QueryResponse, RawFragment, RawPostData, RawRecord, RawSection};
    use crate::detail::{estimate_reading_time, WORDS_PER_MINUTE};
    use crate::service::{FixtureContentService, ServiceError};

    fn post(uid: &str, words: usize) -> RawRecord {
        RawRecord {
            uid: Some(uid.to_string()),
            first_publication_date: Some("2021-03-25T19:25:28+0000".to_string()),
            data: RawPostData {
                title: format!("Post {}", uid),
                content: vec![
                    RawSection {
                        heading: "Um".to_string(),
                        body: vec![RawFragment {
                            text: vec!["lorem"; words].join(" "),
                        }],
                    },
                    RawSection {
                        heading: "Dois".to_string(),
                        body: vec![RawFragment {
                            text: "<p onclick=\"x()\">ipsum</p>".to_string(),
                        }],
                    },
                ],
                ..Default::default()
            },
        }
    }

    struct BrokenService;

    #[async_trait]
    impl ContentService for BrokenService {
        async fn query_by_type(&self, _: &str, _: &[String], _: usize) -> service::Result<QueryResponse> {
            Err(ServiceError::NotConfigured("offline".to_string()))
        }
        async fn fetch_page(&self, _: &str) -> service::Result<QueryResponse> {
            Err(ServiceError::NotConfigured("offline".to_string()))
        }
        async fn get_by_uid(&self, _: &str, _: &str) -> service::Result<Option<RawRecord>> {
            Err(ServiceError::NotConfigured("offline".to_string()))
        }
    }

    struct SlowService;

    #[async_trait]
    impl ContentService for SlowService {
        async fn query_by_type(&self, _: &str, _: &[String], _: usize) -> service::Result<QueryResponse> {
            Ok(QueryResponse::default())
        }
        async fn fetch_page(&self, _: &str) -> service::Result<QueryResponse> {
            Ok(QueryResponse::default())
        }
        async fn get_by_uid(&self, _: &str, uid: &str) -> service::Result<Option<RawRecord>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Some(post(uid, 1)))
        }
    }

    #[tokio::test]
    async fn test_fetch_detail_sanitizes() {
        let service = FixtureContentService::new(vec![post("a", 3)], 10);
        let detail = fetch_detail(&service, "post", "a", true).await.unwrap().unwrap();
        assert_eq!(detail.sections[1].body[0], "<p>ipsum</p>");

        let raw = fetch_detail(&service, "post", "a", false).await.unwrap().unwrap();
        assert_eq!(raw.sections[1].body[0], "<p onclick=\"x()\">ipsum</p>");
    }

    #[tokio::test]
    async fn test_reading_time_ignores_sanitize_flag() {
        let mut record = post("lead", 1);
        record.data.content = vec![RawSection {
            heading: "Um".to_string(),
            body: vec![RawFragment {
                text: format!("<p class=\"lead\">{}</p>", vec!["palavra"; 200].join(" ")),
            }],
        }];
        let service = FixtureContentService::new(vec![record], 10);

        let clean = fetch_detail(&service, "post", "lead", true).await.unwrap().unwrap();
        let raw = fetch_detail(&service, "post", "lead", false).await.unwrap().unwrap();
        assert_ne!(clean.sections[0].body, raw.sections[0].body);
        assert_eq!(estimate_reading_time(&raw.sections, WORDS_PER_MINUTE), 2);
        assert_eq!(estimate_reading_time(&clean.sections, WORDS_PER_MINUTE), 2);
    }

    #[tokio::test]
    async fn test_eager_resolver() {
        let service = FixtureContentService::new(vec![post("a", 3), post("b", 3)], 10);
        let uids = vec!["a".to_string(), "ghost".to_string()];
        let resolver = EagerResolver::prefetch(&service, "post", &uids, true).await;

        assert_eq!(resolver.len(), 1);
        assert!(matches!(resolver.resolve("a").await, DetailView::Ready(_)));
        assert_eq!(resolver.resolve("ghost").await, DetailView::Loading);
        assert_eq!(resolver.resolve("b").await, DetailView::Loading);
    }

    #[tokio::test]
    async fn test_eager_resolver_service_down() {
        let uids = vec!["a".to_string()];
        let resolver = EagerResolver::prefetch(&BrokenService, "post", &uids, true).await;
        assert!(resolver.is_empty());
        assert_eq!(resolver.resolve("a").await, DetailView::Loading);
    }

    #[tokio::test]
    async fn test_on_demand_placeholder_then_content() {
        let service = Arc::new(FixtureContentService::new(vec![post("late", 250)], 10));
        let resolver = OnDemandResolver::new(service, "post", Duration::from_secs(5), true);

        assert_eq!(resolver.status("late").await, None);
        assert!(resolver.begin("late").await);
        assert_eq!(resolver.status("late").await, Some(DetailView::Loading));
        assert!(!resolver.begin("late").await);

        let view = resolver.complete("late").await;
        let detail = view.detail().unwrap();
        assert_eq!(detail.uid, "late");
        assert_eq!(estimate_reading_time(&detail.sections, WORDS_PER_MINUTE), 3);
        assert_eq!(resolver.resolve("late").await, view);
    }

    #[tokio::test]
    async fn test_on_demand_not_found_is_terminal() {
        let service = Arc::new(FixtureContentService::new(Vec::new(), 10));
        let resolver = OnDemandResolver::new(service, "post", Duration::from_secs(5), true);

        assert_eq!(resolver.resolve("missing").await, DetailView::NotFound);
        assert!(!resolver.begin("missing").await);
        assert_eq!(resolver.status("missing").await, Some(DetailView::NotFound));
    }

    #[tokio::test]
    async fn test_on_demand_errors_are_terminal() {
        let resolver =
            OnDemandResolver::new(Arc::new(BrokenService), "post", Duration::from_secs(5), true);
        assert_eq!(resolver.resolve("a").await, DetailView::NotFound);
    }

    #[tokio::test]
    async fn test_on_demand_state_is_bounded() {
        let service = Arc::new(FixtureContentService::new(vec![post("real", 3)], 10));
        let resolver = OnDemandResolver::new(service, "post", Duration::from_secs(5), true)
            .with_max_entries(3);

        assert!(matches!(resolver.resolve("real").await, DetailView::Ready(_)));
        assert!(resolver.begin("pending").await);
        assert_eq!(resolver.resolve("ghost-1").await, DetailView::NotFound);
        assert_eq!(resolver.len().await, 3);

        // Full: the miss is dropped first, the pending claim survives
        assert_eq!(resolver.resolve("ghost-2").await, DetailView::NotFound);
        assert_eq!(resolver.len().await, 3);
        assert_eq!(resolver.status("ghost-1").await, None);
        assert_eq!(resolver.status("pending").await, Some(DetailView::Loading));
        assert!(resolver.status("real").await.is_some());

        assert_eq!(resolver.status("ghost-2").await, Some(DetailView::NotFound));
    }

    #[tokio::test]
    async fn test_on_demand_evicts_ready_when_no_misses_left() {
        let service = Arc::new(FixtureContentService::new(vec![post("real", 3)], 10));
        let resolver = OnDemandResolver::new(service, "post", Duration::from_secs(5), true)
            .with_max_entries(2);

        assert!(matches!(resolver.resolve("real").await, DetailView::Ready(_)));
        assert!(resolver.begin("pending").await);

        assert_eq!(resolver.resolve("ghost").await, DetailView::NotFound);
        assert_eq!(resolver.status("real").await, None);
        assert_eq!(resolver.status("pending").await, Some(DetailView::Loading));
        assert_eq!(resolver.len().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_demand_timeout() {
        let resolver =
            OnDemandResolver::new(Arc::new(SlowService), "post", Duration::from_secs(1), true);
        assert_eq!(resolver.resolve("slow").await, DetailView::NotFound);
    }
}
