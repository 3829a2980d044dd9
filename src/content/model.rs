//! Wire shapes returned by the content service

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize};

/// One page of a query against the content service
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueryResponse {
    /// Continuation cursor; `None` when this is the last page
    pub next_page: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub results: Vec<RawRecord>,
    pub page: Option<u64>,
    pub total_pages: Option<u64>,
    pub total_results_size: Option<u64>,
}

/// A document as stored in the content service
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawRecord {
    pub uid: Option<String>,
    pub first_publication_date: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub data: RawPostData,
}

/// Document fields of a post
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawPostData {
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub subtitle: String,
    #[serde(deserialize_with = "null_as_default")]
    pub author: String,
    #[serde(deserialize_with = "null_as_default")]
    pub banner: RawImage,
    #[serde(deserialize_with = "null_as_default")]
    pub content: Vec<RawSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawImage {
    pub url: Option<String>,
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawSection {
    #[serde(deserialize_with = "null_as_default")]
    pub heading: String,
    #[serde(deserialize_with = "null_as_default")]
    pub body: Vec<RawFragment>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RawFragment {
    #[serde(deserialize_with = "null_as_default")]
    pub text: String,
}

/// The service sends `null` for empty fields; treat it like a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse a publication timestamp.
///
/// Accepts RFC 3339 and the `2021-03-25T19:25:28+0000` form the service emits.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z"))
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_query_response() {
        let json = r#"{
            "page": 1,
            "next_page": "https://example.cdn.prismic.io/api/v2/documents/search?page=2",
            "results": [{
                "uid": "como-utilizar-hooks",
                "first_publication_date": "2021-03-15T19:25:28+0000",
                "data": { "title": "Como utilizar Hooks", "subtitle": "Pensando em sincronização", "author": "Joseph Oliveira" }
            }]
        }"#;
        let response: QueryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.page, Some(1));
        assert!(response.next_page.is_some());
        assert_eq!(response.results.len(), 1);
        let record = &response.results[0];
        assert_eq!(record.uid.as_deref(), Some("como-utilizar-hooks"));
        assert_eq!(record.data.author, "Joseph Oliveira");
        assert!(record.data.content.is_empty());
    }

    #[test]
    fn test_nulls_become_defaults() {
        let json = r#"{
            "uid": "x",
            "first_publication_date": null,
            "data": {
                "title": null,
                "banner": null,
                "content": [{ "heading": null, "body": [{ "text": null }] }]
            }
        }"#;
        let record: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.first_publication_date, None);
        assert_eq!(record.data.title, "");
        assert_eq!(record.data.banner.url, None);
        assert_eq!(record.data.content[0].heading, "");
        assert_eq!(record.data.content[0].body[0].text, "");
    }

    #[test]
    fn test_null_next_page() {
        let response: QueryResponse =
            serde_json::from_str(r#"{"next_page": null, "results": []}"#).unwrap();
        assert_eq!(response.next_page, None);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let a = parse_timestamp("2021-03-25T19:25:28+0000").unwrap();
        assert_eq!((a.year(), a.month(), a.day()), (2021, 3, 25));
        assert_eq!(a.hour(), 19);

        let b = parse_timestamp("2021-03-25T19:25:28Z").unwrap();
        assert_eq!(a, b);

        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
