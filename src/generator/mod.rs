//! Generator module - pre-renders the listing and detail pages using the
//! built-in Tera templates

use anyhow::{Context as _, Result};
use chrono::Datelike;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tera::Context;

use crate::config::SiteConfig;
use crate::content::{is_routable_uid, post_path, PostDetail, PostSummary};
use crate::detail::{DetailResolver, DetailView, EagerResolver};
use crate::helpers::{meta_generator, url_for, DateFormatter};
use crate::i18n::I18n;
use crate::listing::ListingView;
use crate::service::ContentService;
use crate::templates::{ConfigData, DetailData, SummaryData, TemplateRenderer};
use crate::Blog;

/// Identifiers whose detail page was fully rendered at build time
pub const PRERENDERED_MANIFEST: &str = "prerendered.json";

/// What a generation run produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateReport {
    /// Posts on the pre-rendered listing page
    pub listed: usize,
    /// Detail pages rendered with content
    pub prerendered: Vec<String>,
    /// Detail pages left as placeholders for on-demand generation
    pub deferred: Vec<String>,
}

/// Static site generator using Tera templates
pub struct Generator {
    config: SiteConfig,
    public_dir: PathBuf,
    renderer: TemplateRenderer,
    i18n: I18n,
    dates: DateFormatter,
}

impl Generator {
    /// Create a new generator
    pub fn new(blog: &Blog) -> Result<Self> {
        let renderer = TemplateRenderer::new()?;

        let mut i18n = I18n::new(&blog.config.language);
        i18n.load_languages(blog.base_dir.join(&blog.config.i18n_dir))?;

        Ok(Self {
            config: blog.config.clone(),
            public_dir: blog.public_dir.clone(),
            renderer,
            i18n,
            dates: DateFormatter::from_config(&blog.config),
        })
    }

    pub fn public_dir(&self) -> &Path {
        &self.public_dir
    }

    /// Generate the entire site.
    ///
    /// Content service failures never abort the build: the listing falls
    /// back to an empty page and posts that cannot be fetched get the
    /// loading placeholder.
    pub async fn generate<S: ContentService + ?Sized>(&self, service: &S) -> Result<GenerateReport> {
        fs::create_dir_all(&self.public_dir)?;

        let listing = ListingView::prerender(service, &self.config.content).await;
        let uids = self.collect_uids(service, &listing).await;

        let resolver = EagerResolver::prefetch(
            service,
            &self.config.content.document_type,
            &uids,
            self.config.sanitize,
        )
        .await;

        let mut report = GenerateReport {
            listed: listing.posts().len(),
            ..Default::default()
        };

        for uid in &uids {
            let html = match resolver.resolve(uid).await {
                DetailView::Ready(detail) => {
                    report.prerendered.push(uid.clone());
                    self.render_detail(&detail)?
                }
                _ => {
                    report.deferred.push(uid.clone());
                    self.render_placeholder(uid)?
                }
            };
            self.write_detail(uid, &html)?;
        }

        self.write_page("index.html", &self.render_listing(&listing)?)?;
        self.write_page("404.html", &self.render_not_found()?)?;
        self.write_page(
            PRERENDERED_MANIFEST,
            &serde_json::to_string_pretty(&report.prerendered)?,
        )?;

        tracing::info!(
            "Listed {} posts, pre-rendered {} detail pages, deferred {}",
            report.listed,
            report.prerendered.len(),
            report.deferred.len()
        );

        Ok(report)
    }

    /// Identifiers to pre-render: the first listing page, plus further pages
    /// up to `content.prerender_pages`
    async fn collect_uids<S: ContentService + ?Sized>(
        &self,
        service: &S,
        listing: &ListingView,
    ) -> Vec<String> {
        let mut walker = listing.clone();
        for _ in 1..self.config.content.prerender_pages.max(1) {
            if !walker.has_more() {
                break;
            }
            if walker.load_more(service).await.is_err() {
                break;
            }
        }

        let mut seen = HashSet::new();
        walker
            .posts()
            .iter()
            .filter_map(|post| {
                if !is_routable_uid(&post.uid) {
                    tracing::warn!("Skipping post with unroutable identifier {:?}", post.uid);
                    return None;
                }
                seen.insert(post.uid.clone()).then(|| post.uid.clone())
            })
            .collect()
    }

    /// Create a base context with common variables
    fn create_base_context(&self) -> Context {
        let mut context = Context::new();
        context.insert("config", &ConfigData::from_config(&self.config));
        context.insert("t", &self.i18n.get_all_translations());
        context.insert("generator", &meta_generator());
        context.insert("current_year", &chrono::Utc::now().year());
        context
    }

    pub fn summary_data(&self, posts: &[PostSummary]) -> Vec<SummaryData> {
        posts
            .iter()
            .map(|post| SummaryData::new(post, &self.dates, &self.config))
            .collect()
    }

    /// The listing page; the "load more" control only appears with a cursor
    pub fn render_listing(&self, listing: &ListingView) -> Result<String> {
        let mut context = self.create_base_context();
        context.insert("posts", &self.summary_data(listing.posts()));
        context.insert("next_cursor", &listing.cursor());
        context.insert("api_url", &url_for(&self.config, "api/posts"));
        self.renderer.render("index.html", &context)
    }

    /// Markup for a batch of summaries, appended by the "load more" control
    pub fn render_summaries(&self, posts: &[PostSummary]) -> Result<String> {
        let mut context = self.create_base_context();
        context.insert("posts", &self.summary_data(posts));
        self.renderer.render("partials/summaries.html", &context)
    }

    pub fn render_detail(&self, post: &PostDetail) -> Result<String> {
        let data = DetailData::new(post, &self.dates, &self.config);
        let mut context = self.create_base_context();
        context.insert("description", &data.description());
        context.insert("post", &data);
        self.renderer.render("post.html", &context)
    }

    /// Page shown while a post is being generated. It reloads itself until
    /// `placeholder_max_attempts` runs out, then moves on to the not-found page.
    pub fn render_placeholder(&self, uid: &str) -> Result<String> {
        let mut context = self.create_base_context();
        context.insert("uid", uid);
        context.insert(
            "refresh_secs",
            &self.config.server.placeholder_refresh_secs.max(1),
        );
        context.insert(
            "max_attempts",
            &self.config.server.placeholder_max_attempts.max(1),
        );
        context.insert("not_found_url", &url_for(&self.config, "404.html"));
        self.renderer.render("loading.html", &context)
    }

    pub fn render_not_found(&self) -> Result<String> {
        self.renderer
            .render("not_found.html", &self.create_base_context())
    }

    /// Render whatever a detail route currently shows
    pub fn render_view(&self, uid: &str, view: &DetailView) -> Result<String> {
        match view {
            DetailView::Ready(detail) => self.render_detail(detail),
            DetailView::Loading => self.render_placeholder(uid),
            DetailView::NotFound => self.render_not_found(),
        }
    }

    /// Write a detail page to `post/<uid>/index.html`
    pub fn write_detail(&self, uid: &str, html: &str) -> Result<PathBuf> {
        if !is_routable_uid(uid) {
            anyhow::bail!("Refusing to write page for identifier {:?}", uid);
        }
        self.write_page(&format!("{}index.html", post_path(uid)), html)
    }

    fn write_page(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let output_path = self.public_dir.join(relative);
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create dir {:?}", parent))?;
        }
        fs::write(&output_path, content)
            .with_context(|| format!("Failed to write {:?}", output_path))?;
        tracing::debug!("Generated: {:?}", output_path);
        Ok(output_path)
    }
}

/// Read the build-time manifest; a missing or unreadable one means nothing
/// was pre-rendered
pub fn read_manifest(public_dir: &Path) -> HashSet<String> {
    let path = public_dir.join(PRERENDERED_MANIFEST);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(_) => return HashSet::new(),
    };
    match serde_json::from_str::<Vec<String>>(&content) {
        Ok(uids) => uids.into_iter().collect(),
        Err(e) => {
            tracing::warn!("Ignoring malformed {:?}: {}", path, e);
            HashSet::new()
        }
    }
}
