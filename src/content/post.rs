//! Post models normalized from raw records

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::model::{parse_timestamp, RawRecord};
use super::sanitize::sanitize_html;
use crate::detail::count_words;

/// A post as shown on the listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    /// Unique identifier (route key)
    pub uid: String,

    /// First publication date, if the service reported one
    pub first_publication_date: Option<DateTime<FixedOffset>>,

    /// Post title
    pub title: String,

    /// Post subtitle
    pub subtitle: String,

    /// Author name
    pub author: String,
}

impl PostSummary {
    /// Normalize a raw record. Records without an identifier cannot be
    /// routed to and yield `None`.
    pub fn from_record(record: &RawRecord) -> Option<Self> {
        let uid = record.uid.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
        Some(Self {
            uid: uid.to_string(),
            first_publication_date: record
                .first_publication_date
                .as_deref()
                .and_then(parse_timestamp),
            title: record.data.title.clone(),
            subtitle: record.data.subtitle.clone(),
            author: record.data.author.clone(),
        })
    }

    /// Route of the detail page
    pub fn path(&self) -> String {
        post_path(&self.uid)
    }
}

/// A titled block of body fragments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub heading: String,
    /// Rich-text markup, in source order
    pub body: Vec<String>,
    /// Words in the body as the content service delivered it. Sanitizing
    /// the fragments afterwards leaves this untouched.
    #[serde(default)]
    pub words: usize,
}

impl Section {
    pub fn new(heading: impl Into<String>, body: Vec<String>) -> Self {
        let words = body.iter().map(|f| count_words(f)).sum();
        Self {
            heading: heading.into(),
            body,
            words,
        }
    }
}

/// A full post as shown on the detail page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDetail {
    pub uid: String,
    pub first_publication_date: Option<DateTime<FixedOffset>>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub banner_url: String,
    pub sections: Vec<Section>,
}

impl PostDetail {
    /// Normalize a raw record, keeping section and fragment order
    pub fn from_record(record: &RawRecord) -> Option<Self> {
        let summary = PostSummary::from_record(record)?;
        let sections = record
            .data
            .content
            .iter()
            .map(|section| {
                Section::new(
                    section.heading.clone(),
                    section.body.iter().map(|f| f.text.clone()).collect(),
                )
            })
            .collect();

        Some(Self {
            uid: summary.uid,
            first_publication_date: summary.first_publication_date,
            title: summary.title,
            subtitle: summary.subtitle,
            author: summary.author,
            banner_url: record.data.banner.url.clone().unwrap_or_default(),
            sections,
        })
    }

    /// Run every body fragment through the allow-list sanitizer
    pub fn sanitized(mut self) -> Self {
        for section in &mut self.sections {
            for fragment in &mut section.body {
                *fragment = sanitize_html(fragment);
            }
        }
        self
    }

    pub fn path(&self) -> String {
        post_path(&self.uid)
    }
}

/// Detail route for an identifier, e.g. `post/como-utilizar-hooks/`
pub fn post_path(uid: &str) -> String {
    let encoded = percent_encoding::utf8_percent_encode(uid, percent_encoding::NON_ALPHANUMERIC)
        .to_string()
        // Keep slugs readable
        .replace("%2D", "-")
        .replace("%5F", "_");
    format!("post/{}/", encoded)
}

/// Whether an identifier can be used as an output directory name.
///
/// Identifiers are slugs in the content service; anything else (path
/// separators, dots, upper case) is rejected before touching the filesystem.
pub fn is_routable_uid(uid: &str) -> bool {
    !uid.is_empty() && slug::slugify(uid) == uid
}
