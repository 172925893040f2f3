use std::path::Path;

use crate::error::{ServerError, ServerResult};

/// Shown to every client before authentication unless a banner file is configured.
pub const BANNER: &str = include_str!("../banner.txt");

/// Reads the banner once at startup; it is immutable afterwards.
pub fn load_banner(path: Option<&Path>) -> ServerResult<String> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path).map_err(|source| ServerError::Banner {
            path: path.to_path_buf(),
            source,
        })?,
        None => BANNER.to_string(),
    };

    Ok(banner_line(&raw))
}

/// The banner as sent on the wire: the text followed by one newline.
pub fn banner_line(raw: &str) -> String {
    format!("{raw}\n")
}
