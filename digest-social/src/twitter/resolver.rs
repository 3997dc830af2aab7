//! Account resolution helpers shared by both backends.
use std::collections::HashSet;
use std::path::Path;

use crate::error::SocialError;
use crate::twitter::model::normalize_handle;

/// One handle per line; blank lines and `#` comments are ignored and a
/// leading `@` is dropped.
pub fn parse_handle_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.trim_start_matches('@').trim().to_string())
        .filter(|handle| !handle.is_empty())
        .collect()
}

pub async fn load_handle_list(path: &Path) -> Result<Vec<String>, SocialError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SocialError::HandleList {
            path: path.to_path_buf(),
            source,
        })?;
    let handles = parse_handle_list(&text);
    tracing::info!(path = %path.display(), count = handles.len(), "resolver.handle_list.loaded");
    Ok(handles)
}

/// Deduplicate case-insensitively, keep upstream order, and cap at `max`.
///
/// An empty result is fatal: sending a digest for nobody would hide a
/// misconfigured seed handle or credential.
pub fn bound_accounts(
    handles: Vec<String>,
    max: usize,
    origin: &str,
) -> Result<Vec<String>, SocialError> {
    let mut seen = HashSet::new();
    let mut unique: Vec<String> = handles
        .into_iter()
        .filter(|h| seen.insert(normalize_handle(h)))
        .collect();

    if unique.is_empty() {
        return Err(SocialError::NoAccounts {
            origin: origin.to_string(),
        });
    }
    if unique.len() > max {
        tracing::info!(
            origin,
            resolved = unique.len(),
            kept = max,
            "resolver.truncated"
        );
        unique.truncate(max);
    }
    Ok(unique)
}
