//! Prismic-style REST API client

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::OnceCell;

use super::{ContentService, Result, ServiceError};
use crate::content::{QueryResponse, RawRecord};

/// Client for a Prismic REST API v2 repository
pub struct HttpContentService {
    client: Client,
    endpoint: Url,
    access_token: Option<String>,
    master_ref: OnceCell<String>,
}

#[derive(Debug, Deserialize)]
struct ApiInfo {
    #[serde(default)]
    refs: Vec<ApiRef>,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(rename = "isMasterRef", default)]
    is_master_ref: bool,
}

impl HttpContentService {
    /// Create a client for `endpoint`, e.g. `https://repo.cdn.prismic.io/api/v2`
    pub fn new(endpoint: &str, access_token: Option<String>, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint.trim_end_matches('/'))
            .map_err(|e| ServiceError::NotConfigured(format!("invalid endpoint: {}", e)))?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("cms-blog-rs/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            access_token: access_token.filter(|t| !t.is_empty()),
            master_ref: OnceCell::new(),
        })
    }

    /// The master ref every search must be pinned to
    async fn master_ref(&self) -> Result<&str> {
        let reference = self
            .master_ref
            .get_or_try_init(|| async {
                let mut url = self.endpoint.clone();
                self.authorize(&mut url);
                let info: ApiInfo = self.get_json(url).await?;
                let master: Result<String> = info
                    .refs
                    .into_iter()
                    .find(|r| r.is_master_ref)
                    .map(|r| r.reference)
                    .ok_or_else(|| {
                        ServiceError::NotConfigured("repository has no master ref".to_string())
                    });
                master
            })
            .await?;
        Ok(reference.as_str())
    }

    fn search_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        let path = format!("{}/documents/search", url.path().trim_end_matches('/'));
        url.set_path(&path);
        url
    }

    fn authorize(&self, url: &mut Url) {
        if let Some(token) = &self.access_token {
            let has_token = url.query_pairs().any(|(k, _)| k == "access_token");
            if !has_token {
                url.query_pairs_mut().append_pair("access_token", token);
            }
        }
    }

    /// Cursors are absolute URLs handed out by the same repository
    fn cursor_url(&self, cursor: &str) -> Result<Url> {
        let url = Url::parse(cursor).map_err(|_| ServiceError::InvalidCursor(cursor.to_string()))?;
        if url.scheme() != self.endpoint.scheme() || url.host_str() != self.endpoint.host_str() {
            return Err(ServiceError::InvalidCursor(cursor.to_string()));
        }
        Ok(url)
    }

    async fn search(&self, query: &str, fetch: &[String], page_size: usize) -> Result<QueryResponse> {
        let master_ref = self.master_ref().await?.to_string();
        let mut url = self.search_url();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("ref", &master_ref);
            pairs.append_pair("q", query);
            if !fetch.is_empty() {
                pairs.append_pair("fetch", &fetch.join(","));
            }
            pairs.append_pair("pageSize", &page_size.max(1).to_string());
        }
        self.authorize(&mut url);
        self.get_json(url).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        tracing::debug!("GET {}", redact(&url));
        let response = self.client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                url: redact(&url),
            });
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl ContentService for HttpContentService {
    async fn query_by_type(
        &self,
        document_type: &str,
        fetch: &[String],
        page_size: usize,
    ) -> Result<QueryResponse> {
        let query = format!(r#"[[at(document.type,"{}")]]"#, escape_predicate(document_type));
        self.search(&query, fetch, page_size).await
    }

    async fn fetch_page(&self, cursor: &str) -> Result<QueryResponse> {
        let mut url = self.cursor_url(cursor)?;
        self.authorize(&mut url);
        self.get_json(url).await
    }

    async fn get_by_uid(&self, document_type: &str, uid: &str) -> Result<Option<RawRecord>> {
        let query = format!(
            r#"[[at(my.{}.uid,"{}")]]"#,
            escape_predicate(document_type),
            escape_predicate(uid)
        );
        let response = self.search(&query, &[], 1).await?;
        Ok(response.results.into_iter().next())
    }
}

fn escape_predicate(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// URL with the access token masked, for logs and errors
fn redact(url: &Url) -> String {
    let mut masked = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if k == "access_token" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), v)
        })
        .collect();
    if pairs.is_empty() {
        return masked.to_string();
    }
    masked.query_pairs_mut().clear().extend_pairs(pairs);
    masked.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(token: Option<&str>) -> HttpContentService {
        HttpContentService::new(
            "https://spacetraveling.cdn.prismic.io/api/v2/",
            token.map(String::from),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_search_url() {
        let s = service(None);
        assert_eq!(
            s.search_url().as_str(),
            "https://spacetraveling.cdn.prismic.io/api/v2/documents/search"
        );
    }

    #[test]
    fn test_cursor_must_match_repository() {
        let s = service(None);
        assert!(s
            .cursor_url("https://spacetraveling.cdn.prismic.io/api/v2/documents/search?page=2")
            .is_ok());
        assert!(matches!(
            s.cursor_url("http://169.254.169.254/latest"),
            Err(ServiceError::InvalidCursor(_))
        ));
        assert!(matches!(
            s.cursor_url("not a url"),
            Err(ServiceError::InvalidCursor(_))
        ));
    }

    #[test]
    fn test_authorize_appends_token_once() {
        let s = service(Some("secret"));
        let mut url = s
            .cursor_url("https://spacetraveling.cdn.prismic.io/api/v2/documents/search?page=2")
            .unwrap();
        s.authorize(&mut url);
        s.authorize(&mut url);
        assert_eq!(url.query_pairs().filter(|(k, _)| k == "access_token").count(), 1);
    }

    #[test]
    fn test_redact() {
        let url = Url::parse("https://x.io/api?page=2&access_token=secret").unwrap();
        let redacted = redact(&url);
        assert!(!redacted.contains("secret"));
        assert!(redacted.contains("page=2"));
    }

    #[test]
    fn test_escape_predicate() {
        assert_eq!(escape_predicate(r#"a"b"#), r#"a\"b"#);
    }

    #[test]
    fn test_invalid_endpoint() {
        assert!(HttpContentService::new("::", None, Duration::from_secs(1)).is_err());
    }
}
