//! List site content

use anyhow::Result;
use std::collections::HashSet;
use walkdir::WalkDir;

use crate::content::PostSummary;
use crate::helpers::DateFormatter;
use crate::listing::ListingView;
use crate::service::ContentService;
use crate::Blog;

/// List site content by type
pub async fn run(blog: &Blog, content_type: &str) -> Result<()> {
    match content_type {
        "post" | "posts" => {
            let service = blog.content_service()?;
            let posts = all_posts(service.as_ref(), blog).await?;
            let dates = DateFormatter::from_config(&blog.config);
            println!("Posts ({}):", posts.len());
            for post in posts {
                let date = dates.format(post.first_publication_date.as_ref());
                println!(
                    "  {:<12} {} - {} [{}]",
                    if date.is_empty() { "-" } else { date.as_str() },
                    post.title,
                    post.author,
                    post.uid
                );
            }
        }
        "route" | "routes" => {
            let routes = routes(blog);
            println!("Routes ({}):", routes.len());
            for route in routes {
                println!("  {}", route);
            }
        }
        _ => {
            anyhow::bail!("Unknown type: {}. Available: post, route", content_type);
        }
    }

    Ok(())
}

/// Walk every listing page until the cursor runs out, or comes back around
pub async fn all_posts<S: ContentService + ?Sized>(
    service: &S,
    blog: &Blog,
) -> Result<Vec<PostSummary>> {
    let first = service
        .query_by_type(
            &blog.config.content.document_type,
            &blog.config.content.fetch,
            blog.config.content.page_size,
        )
        .await?;
    let mut listing = ListingView::from_prerender(Ok(first));
    let mut seen = HashSet::new();
    while let Some(cursor) = listing.cursor() {
        if !seen.insert(cursor.to_string()) {
            tracing::warn!("Cursor {} was already visited, stopping", cursor);
            break;
        }
        listing.load_more(service).await?;
    }
    Ok(listing.into_posts())
}

/// Generated pages, relative to the public directory
pub fn routes(blog: &Blog) -> Vec<String> {
    let mut routes: Vec<String> = WalkDir::new(&blog.public_dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(&blog.public_dir)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    routes.sort();
    routes
}
