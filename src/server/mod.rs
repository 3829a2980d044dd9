//! Preview server: static files, the "load more" endpoint and on-demand
//! generation of detail pages

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::content::is_routable_uid;
use crate::detail::{DetailView, OnDemandResolver};
use crate::generator::{read_manifest, Generator};
use crate::listing::{ListingView, LoadError};
use crate::service::{ContentService, ServiceError};
use crate::templates::SummaryData;
use crate::Blog;

/// Server state
pub struct ServerState {
    generator: Generator,
    service: Arc<dyn ContentService>,
    resolver: OnDemandResolver,
    /// Identifiers with a complete page on disk
    prerendered: HashSet<String>,
}

impl ServerState {
    pub fn new(blog: &Blog, service: Arc<dyn ContentService>) -> Result<Self> {
        let generator = Generator::new(blog)?;
        let prerendered = read_manifest(generator.public_dir());
        tracing::debug!("{} pre-rendered posts on disk", prerendered.len());

        let resolver = OnDemandResolver::new(
            service.clone(),
            &blog.config.content.document_type,
            blog.config.server.on_demand_timeout(),
            blog.config.sanitize,
        )
        .with_max_entries(blog.config.server.on_demand_max_entries);

        Ok(Self {
            generator,
            service,
            resolver,
            prerendered,
        })
    }
}

/// One page of the listing as returned by `/api/posts`
#[derive(Debug, Serialize)]
pub struct PostsPage {
    pub next_cursor: Option<String>,
    /// Rendered summaries, ready to append to the listing
    pub html: String,
    pub posts: Vec<SummaryData>,
}

#[derive(Debug, Deserialize)]
pub struct PostsQuery {
    pub cursor: Option<String>,
}

/// Build the router
pub fn router(state: Arc<ServerState>) -> Router {
    let public_dir = state.generator.public_dir().to_path_buf();
    let static_files = ServeDir::new(&public_dir)
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new(public_dir.join("404.html")));

    Router::new()
        .route("/api/posts", get(posts_handler))
        .route("/post/:uid", get(post_handler))
        .route("/post/:uid/", get(post_handler))
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the preview server
pub async fn start(
    blog: &Blog,
    service: Arc<dyn ContentService>,
    ip: &str,
    port: u16,
    open: bool,
) -> Result<()> {
    let state = Arc::new(ServerState::new(blog, service)?);
    let app = router(state);

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    let url = format!("http://{}:{}", ip, port);
    println!("Server running at {}", url);
    println!("Press Ctrl+C to stop.");

    if open {
        if let Err(e) = open_browser(&url) {
            tracing::warn!("Failed to open browser: {}", e);
        }
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// `GET /api/posts?cursor=..`: the page a cursor points at
async fn posts_handler(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<PostsQuery>,
) -> Response {
    let Some(cursor) = query.cursor.filter(|c| !c.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "missing cursor");
    };

    let mut listing = ListingView::resume(cursor);
    if let Err(e) = listing.load_more(state.service.as_ref()).await {
        return load_error_response(&e);
    }

    match state.generator.render_summaries(listing.posts()) {
        Ok(html) => Json(PostsPage {
            next_cursor: listing.cursor().map(str::to_string),
            html,
            posts: state.generator.summary_data(listing.posts()),
        })
        .into_response(),
        Err(e) => {
            tracing::error!("Failed to render summaries: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "render failed")
        }
    }
}

/// `GET /post/<uid>/`: the pre-rendered page, or on-demand generation
async fn post_handler(
    State(state): State<Arc<ServerState>>,
    Path(uid): Path<String>,
) -> Response {
    if !is_routable_uid(&uid) {
        return render_view(&state, &uid, &DetailView::NotFound);
    }

    if state.prerendered.contains(&uid) {
        let path = state
            .generator
            .public_dir()
            .join(crate::content::post_path(&uid))
            .join("index.html");
        match tokio::fs::read_to_string(&path).await {
            Ok(html) => return Html(html).into_response(),
            Err(e) => tracing::warn!("Pre-rendered page {:?} unreadable: {}", path, e),
        }
    }

    let view = match state.resolver.status(&uid).await {
        Some(view) => view,
        None => {
            if state.resolver.begin(&uid).await {
                spawn_generation(state.clone(), uid.clone());
            }
            DetailView::Loading
        }
    };

    render_view(&state, &uid, &view)
}

/// Resolve `uid` in the background and persist the page once it is ready
fn spawn_generation(state: Arc<ServerState>, uid: String) {
    tokio::spawn(async move {
        tracing::info!("Generating post {} on demand", uid);
        if let DetailView::Ready(detail) = state.resolver.complete(&uid).await {
            let written = state
                .generator
                .render_detail(&detail)
                .and_then(|html| state.generator.write_detail(&uid, &html));
            match written {
                Ok(path) => tracing::info!("Generated: {:?}", path),
                Err(e) => tracing::warn!("Failed to write post {}: {}", uid, e),
            }
        }
    });
}

fn render_view(state: &ServerState, uid: &str, view: &DetailView) -> Response {
    let html = match state.generator.render_view(uid, view) {
        Ok(html) => html,
        Err(e) => {
            tracing::error!("Failed to render post {}: {}", uid, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Server error").into_response();
        }
    };

    match view {
        DetailView::Ready(_) => Html(html).into_response(),
        DetailView::Loading => (
            [(header::CACHE_CONTROL, "no-store")],
            Html(html),
        )
            .into_response(),
        DetailView::NotFound => (StatusCode::NOT_FOUND, Html(html)).into_response(),
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// A bad cursor is the caller's fault; anything else is the upstream's
fn load_error_response(error: &LoadError) -> Response {
    let (status, retry) = match error {
        LoadError::Service(ServiceError::InvalidCursor(_)) => (StatusCode::BAD_REQUEST, false),
        LoadError::Service(e) => (StatusCode::BAD_GATEWAY, e.is_transient()),
        LoadError::Exhausted | LoadError::InFlight => (StatusCode::BAD_REQUEST, false),
    };
    let body = serde_json::json!({ "error": error.to_string(), "retry": retry });
    (status, Json(body)).into_response()
}

/// Open a URL in the default browser
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open").arg(url).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open").arg(url).spawn()?;
    }

    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/c", "start", url])
            .spawn()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::content::{RawFragment, RawPostData, RawRecord, RawSection};
    use crate::service::FixtureContentService;
    use std::time::Duration;

    fn post(uid: &str, words: usize) -> RawRecord {
        RawRecord {
            uid: Some(uid.to_string()),
            first_publication_date: Some("2021-03-15T19:25:28+0000".to_string()),
            data: RawPostData {
                title: format!("Título {}", uid),
                content: vec![RawSection {
                    heading: "Seção".to_string(),
                    body: vec![RawFragment {
                        text: vec!["palavra"; words].join(" "),
                    }],
                }],
                ..Default::default()
            },
        }
    }

    fn state(dir: &std::path::Path, records: Vec<RawRecord>, page_size: usize) -> Arc<ServerState> {
        let blog = Blog::with_config(dir.to_path_buf(), SiteConfig::default());
        let service = Arc::new(FixtureContentService::new(records, page_size));
        Arc::new(ServerState::new(&blog, service).unwrap())
    }

    async fn body(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_posts_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), vec![post("a", 1), post("b", 1), post("c", 1)], 2);

        let query = PostsQuery {
            cursor: Some("fixture:2".to_string()),
        };
        let response = posts_handler(State(state), Query(query)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let page: serde_json::Value = serde_json::from_str(&body(response).await).unwrap();
        assert_eq!(page["next_cursor"], serde_json::Value::Null);
        assert_eq!(page["posts"][0]["uid"], "c");
        assert!(page["html"].as_str().unwrap().contains("Título c"));
    }

    #[tokio::test]
    async fn test_posts_endpoint_errors() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), vec![post("a", 1)], 2);

        let missing = posts_handler(State(state.clone()), Query(PostsQuery { cursor: None })).await;
        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

        let bad = PostsQuery {
            cursor: Some("bogus".to_string()),
        };
        let response = posts_handler(State(state), Query(bad)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body(response).await.contains("invalid cursor"));
    }

    #[test]
    fn test_upstream_failure_is_bad_gateway() {
        let error = LoadError::Service(ServiceError::Status {
            status: 503,
            url: "https://repo.cdn.prismic.io/api/v2".to_string(),
        });
        assert_eq!(load_error_response(&error).status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_on_demand_placeholder_then_post() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), vec![post("novo", 250)], 2);

        let first = post_handler(State(state.clone()), Path("novo".to_string())).await;
        assert_eq!(first.status(), StatusCode::OK);
        assert!(body(first).await.contains("Carregando..."));

        for _ in 0..100 {
            if matches!(state.resolver.status("novo").await, Some(view) if view.is_terminal()) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let second = post_handler(State(state.clone()), Path("novo".to_string())).await;
        assert_eq!(second.status(), StatusCode::OK);
        let html = body(second).await;
        assert!(html.contains("Título novo"));
        assert!(html.contains("2 min"));
    }

    #[tokio::test]
    async fn test_unknown_post_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), Vec::new(), 2);

        let first = post_handler(State(state.clone()), Path("fantasma".to_string())).await;
        assert!(body(first).await.contains("Carregando..."));

        for _ in 0..100 {
            if state.resolver.status("fantasma").await == Some(DetailView::NotFound) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let second = post_handler(State(state), Path("fantasma".to_string())).await;
        assert_eq!(second.status(), StatusCode::NOT_FOUND);
        assert!(body(second).await.contains("Post não encontrado"));
    }

    #[tokio::test]
    async fn test_invalid_uid_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path(), Vec::new(), 2);
        let response = post_handler(State(state), Path("..%2Fetc".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_prerendered_page_served_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let blog = Blog::with_config(dir.path().to_path_buf(), SiteConfig::default());
        let service = Arc::new(FixtureContentService::new(vec![post("pronto", 10)], 2));
        Generator::new(&blog)
            .unwrap()
            .generate(service.as_ref())
            .await
            .unwrap();

        let state = Arc::new(ServerState::new(&blog, service).unwrap());
        let response = post_handler(State(state.clone()), Path("pronto".to_string())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body(response).await.contains("Título pronto"));
        assert_eq!(state.resolver.status("pronto").await, None);
    }
}
