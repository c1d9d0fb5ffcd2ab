//! Deterministic identifiers and file fingerprints.

use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::error::Result;

/// 12-hex-char podcast id derived from the RSS URL.
pub fn podcast_id_from_rss(rss_url: &str) -> String {
    let digest = md5::compute(rss_url.as_bytes());
    hex::encode(digest.0)[..12].to_string()
}

/// 16-hex-char episode id derived from the mp3 URL.
pub fn episode_id_from_mp3(mp3_url: &str) -> String {
    let digest = md5::compute(mp3_url.as_bytes());
    hex::encode(digest.0)[..16].to_string()
}

/// Hostname component of an RSS URL, or empty when unparseable.
pub fn hostname_from_rss(rss_url: &str) -> String {
    url::Url::parse(rss_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

/// Hash of metadata parquet file sizes and mtimes, used to detect data
/// changes and invalidate the index cache.
pub fn metadata_fingerprint(meta_dir: &Path) -> Result<String> {
    let mut parts: Vec<String> = Vec::new();
    let mut names: Vec<_> = std::fs::read_dir(meta_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|n| n.ends_with(".parquet"))
                .unwrap_or(false)
        })
        .collect();
    names.sort_by_key(|e| e.file_name());
    for entry in names {
        let meta = entry.metadata()?;
        let mtime_ns = meta
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        parts.push(format!(
            "{}:{}:{}",
            entry.file_name().to_string_lossy(),
            meta.len(),
            mtime_ns
        ));
    }
    let digest = md5::compute(parts.join("|").as_bytes());
    Ok(hex::encode(digest.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn podcast_id_is_first_12_hex_of_md5() {
        // md5("http://example.com/rss") = 32 hex chars; id is the prefix.
        let id = podcast_id_from_rss("http://example.com/rss");
        assert_eq!(id.len(), 12);
        let full = hex::encode(md5::compute("http://example.com/rss".as_bytes()).0);
        assert_eq!(id, full[..12]);
    }

    #[test]
    fn episode_id_is_first_16_hex_of_md5() {
        let id = episode_id_from_mp3("http://x/1.mp3");
        assert_eq!(id.len(), 16);
        let full = hex::encode(md5::compute("http://x/1.mp3".as_bytes()).0);
        assert_eq!(id, full[..16]);
    }

    #[test]
    fn ids_are_stable_across_calls() {
        assert_eq!(
            podcast_id_from_rss("https://feeds.example.org/show"),
            podcast_id_from_rss("https://feeds.example.org/show")
        );
    }

    #[test]
    fn hostname_extraction() {
        assert_eq!(
            hostname_from_rss("https://feeds.example.org/show/rss"),
            "feeds.example.org"
        );
        assert_eq!(hostname_from_rss("not a url"), "");
    }
}
