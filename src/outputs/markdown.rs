//! Markdown post generation for the static site.
//!
//! # Output Structure
//!
//! ```text
//! posts_dir/
//! └── 2025-05-06-brief.md
//! ```
//!
//! The file starts with a YAML front-matter block (`title`, `date`,
//! `layout`, optional `excerpt`) followed by one `##` section per group, in
//! group order.

use std::error::Error;
use std::fmt::Write;
use tokio::fs;
use tracing::{info, instrument};

use crate::config::PostSettings;
use crate::models::Digest;
use crate::utils::{ensure_writable_dir, slugify_title};

/// Quote a value for a YAML front-matter line.
fn yaml_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Path of the post for `digest`: `{posts_dir}/{date}-{slug}.md`.
pub fn post_path(digest: &Digest, post: &PostSettings) -> String {
    let slug = slugify_title(&post.slug);
    let slug = if slug.is_empty() { "brief".to_string() } else { slug };
    format!(
        "{}/{}-{}.md",
        post.posts_dir.trim_end_matches('/'),
        digest.issue_date.format("%Y-%m-%d"),
        slug
    )
}

/// Render the complete post, front matter included.
pub fn render_post(digest: &Digest, post: &PostSettings) -> String {
    let date = digest.issue_date.format("%Y-%m-%d").to_string();
    let mut md = String::new();

    writeln!(md, "---").unwrap();
    writeln!(md, "title: {}", yaml_quote(&format!("{}: {}", post.title, date))).unwrap();
    writeln!(md, "date: {date}").unwrap();
    writeln!(md, "layout: {}", post.layout).unwrap();
    if let Some(excerpt) = &post.excerpt {
        writeln!(md, "excerpt: {}", yaml_quote(excerpt)).unwrap();
    }
    writeln!(md, "---").unwrap();

    for section in &digest.sections {
        writeln!(md).unwrap();
        writeln!(md, "## {}", section.section_title).unwrap();
        writeln!(md).unwrap();
        writeln!(md, "{}", section.body.trim_end()).unwrap();
    }

    md
}

/// Write the post to its dated path, creating the directory if needed.
///
/// Returns the path written.
#[instrument(level = "info", skip_all, fields(posts_dir = %post.posts_dir))]
pub async fn write_post(digest: &Digest, post: &PostSettings) -> Result<String, Box<dyn Error>> {
    ensure_writable_dir(&post.posts_dir).await?;
    let path = post_path(digest, post);
    let md = render_post(digest, post);
    fs::write(&path, md).await?;
    info!(path = %path, sections = digest.sections.len(), "Wrote Markdown post");
    Ok(path)
}
