//! Built-in theme templates using the Tera template engine
//!
//! Every template is embedded in the binary, so a generated site needs
//! nothing but the content service.

use anyhow::Result;
use serde::Serialize;
use std::collections::HashMap;
use tera::{Context, Tera};

use crate::config::SiteConfig;
use crate::content::{PostDetail, PostSummary, Section};
use crate::detail::estimate_reading_time;
use crate::helpers::{self, full_url_for, url_for, DateFormatter};

/// Template renderer with the embedded theme
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a new renderer with all theme templates loaded.
    ///
    /// Autoescaping stays on for `.html` templates; sanitized body fragments
    /// are marked `safe` where they are inserted.
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("theme/layout.html")),
            ("index.html", include_str!("theme/index.html")),
            ("post.html", include_str!("theme/post.html")),
            ("loading.html", include_str!("theme/loading.html")),
            ("not_found.html", include_str!("theme/not_found.html")),
            // Partials
            (
                "partials/summaries.html",
                include_str!("theme/partials/summaries.html"),
            ),
            (
                "partials/summary.html",
                include_str!("theme/partials/summary.html"),
            ),
            (
                "partials/post_info.html",
                include_str!("theme/partials/post_info.html"),
            ),
        ])?;

        tera.register_filter("strip_html", strip_html_filter);
        tera.register_filter("truncate_chars", truncate_chars_filter);

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }
}

/// Tera filter: strip HTML tags
fn strip_html_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("strip_html", "value", String, value);
    Ok(tera::Value::String(helpers::strip_html(&s)))
}

/// Tera filter: truncate by character count
fn truncate_chars_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("truncate_chars", "value", String, value);
    let length = match args.get("length") {
        Some(val) => tera::try_get_value!("truncate_chars", "length", usize, val),
        None => 150,
    };
    let omission = match args.get("omission") {
        Some(val) => tera::try_get_value!("truncate_chars", "omission", String, val),
        None => "...".to_string(),
    };

    Ok(tera::Value::String(helpers::truncate(
        s.trim(),
        length,
        Some(&omission),
    )))
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct ConfigData {
    pub title: String,
    pub description: String,
    pub language: String,
    pub url: String,
    pub root: String,
}

impl ConfigData {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            title: config.title.clone(),
            description: config.description.clone(),
            language: config.language.clone(),
            url: config.url.clone(),
            root: url_for(config, "/"),
        }
    }
}

/// One entry of the listing page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryData {
    pub uid: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    /// Locale-formatted date, empty when the post has none
    pub date: String,
    pub datetime: String,
    pub href: String,
}

impl SummaryData {
    pub fn new(post: &PostSummary, dates: &DateFormatter, config: &SiteConfig) -> Self {
        Self {
            uid: post.uid.clone(),
            title: post.title.clone(),
            subtitle: post.subtitle.clone(),
            author: post.author.clone(),
            date: dates.format(post.first_publication_date.as_ref()),
            datetime: dates.datetime_attr(post.first_publication_date.as_ref()),
            href: url_for(config, &post.path()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailData {
    pub uid: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub date: String,
    pub datetime: String,
    pub href: String,
    pub permalink: String,
    pub banner_url: String,
    /// Whole minutes
    pub reading_time: usize,
    pub sections: Vec<Section>,
}

impl DetailData {
    pub fn new(post: &PostDetail, dates: &DateFormatter, config: &SiteConfig) -> Self {
        Self {
            uid: post.uid.clone(),
            title: post.title.clone(),
            subtitle: post.subtitle.clone(),
            author: post.author.clone(),
            date: dates.format(post.first_publication_date.as_ref()),
            datetime: dates.datetime_attr(post.first_publication_date.as_ref()),
            href: url_for(config, &post.path()),
            permalink: full_url_for(config, &post.path()),
            banner_url: post.banner_url.clone(),
            reading_time: estimate_reading_time(
                &post.sections,
                config.reading.words_per_minute,
            ),
            sections: post.sections.clone(),
        }
    }

    /// Text for the description meta tag: the subtitle, or else the
    /// first body fragment
    pub fn description(&self) -> String {
        if !self.subtitle.trim().is_empty() {
            return self.subtitle.clone();
        }
        self.sections
            .iter()
            .flat_map(|s| s.body.iter())
            .next()
            .cloned()
            .unwrap_or_default()
    }
}
