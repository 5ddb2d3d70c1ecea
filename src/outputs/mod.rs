//! Output generation for the digest.
//!
//! # Submodules
//!
//! - [`markdown`]: Renders the digest as a dated Markdown post with front matter
//! - [`json`]: Optionally writes the same digest as JSON
//!
//! # Output Structure
//!
//! ```text
//! posts_dir/
//! └── 2025-05-06-brief.md
//!
//! json_output_dir/
//! └── 2025-05-06.json
//! ```

pub mod json;
pub mod markdown;
