//! Generate static files

use anyhow::Result;

use crate::generator::{GenerateReport, Generator};
use crate::Blog;

/// Generate the static site from the configured content service
pub async fn run(blog: &Blog) -> Result<()> {
    run_with_report(blog).await.map(|_| ())
}

pub async fn run_with_report(blog: &Blog) -> Result<GenerateReport> {
    let start = std::time::Instant::now();

    let service = blog.content_service()?;
    let generator = Generator::new(blog)?;
    let report = generator.generate(service.as_ref()).await?;

    for uid in &report.deferred {
        tracing::warn!("Post {} will be generated on demand", uid);
    }

    let duration = start.elapsed();
    tracing::info!("Generated in {:.2}s", duration.as_secs_f64());

    Ok(report)
}
