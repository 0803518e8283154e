//! Blocklist parsing and loading
//!
//! Lists are line-oriented: a bare domain, a hosts-file style
//! `0.0.0.0 domain` pair, or a `#` comment. The loader fetches each
//! configured list (HTTP(S) URL or local path) and feeds the blocker as it
//! goes; lists are independent, so a dead mirror is logged and skipped.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::source::Blocker;

/// Parse one blocklist line into a blocked name
pub fn parse_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let mut fields = line.split_whitespace();
    let first = fields.next()?;
    let name = match fields.next() {
        // hosts-file form: sink address, then the name
        Some(second) if first.parse::<std::net::IpAddr>().is_ok() => second,
        _ => first,
    };

    let name = name.trim_end_matches('.');
    if name.is_empty() {
        return None;
    }
    Some(name.to_ascii_lowercase())
}

/// Blocked names of a whole list body
pub fn parse_body(body: &str) -> impl Iterator<Item = String> + '_ {
    body.lines().filter_map(parse_line)
}

/// Fetch every configured list and feed the blocker
pub async fn load_into(blocker: Arc<Blocker>, lists: Vec<String>) {
    for list in lists {
        match fetch(&list).await {
            Ok(body) => {
                let before = blocker.len().await;
                blocker.extend(parse_body(&body)).await;
                info!(
                    "loaded {} blocked names from {}",
                    blocker.len().await - before,
                    list
                );
            }
            Err(err) => warn!("skipping blocklist {}: {}", list, err),
        }
    }
}

async fn fetch(source: &str) -> Result<String> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let response = reqwest::get(source)
            .await
            .map_err(|e| Error::Transport(format!("fetching {source} failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "{source} returned {}",
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("reading {source} failed: {e}")))
    } else {
        Ok(tokio::fs::read_to_string(source).await?)
    }
}
