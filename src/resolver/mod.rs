use crate::types::SourceRecord;
use anyhow::Result;

pub mod decode;
pub mod rank;

pub use decode::{OBFUSCATION_PREFIX, decode_source_url, substitute};
pub use rank::QualityRank;

const INDIRECTION_MARKER: &str = "apivtwo";
const HLS_SUFFIX: &str = ".m3u8";

/// The one conditional network call the resolver makes. Injected so the
/// expansion step is testable without a network.
pub trait LinkFetcher {
    async fn fetch_links(&self, url: &str) -> Result<Vec<String>>;
}

/// What the caller should do with the ranked candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Playback {
    /// A progressive-download URL a player can consume directly.
    Direct(String),
    /// Every candidate is an HLS manifest; hand this one to an external
    /// player instead of embedding it.
    ExternalPlayer(String),
}

#[derive(Debug, Default)]
pub struct Resolution {
    /// All usable URLs, best rank first.
    pub urls: Vec<String>,
    /// `None` means no playable source was found, as opposed to an
    /// upstream failure, which surfaces as an `Err` before this is built.
    pub playback: Option<Playback>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Turns raw provider records into ranked, directly usable URLs.
///
/// Decode failures and indirection-fetch failures skip the one record
/// involved; they never abort the batch.
pub async fn resolve_sources(
    records: &[SourceRecord],
    fetcher: &impl LinkFetcher,
    trusted_hosts: &[String],
) -> Resolution {
    let mut candidates: Vec<String> = Vec::new();

    for record in records {
        let decoded = match decode_source_url(&record.url) {
            Ok(decoded) => decoded,
            Err(err) => {
                eprintln!("Skipping source '{}': {err}", record.name);
                continue;
            }
        };

        if decoded.contains(INDIRECTION_MARKER) {
            match fetcher.fetch_links(&decoded).await {
                Ok(links) => candidates.extend(links),
                Err(err) => {
                    eprintln!("Skipping indirection source '{}': {err}", record.name);
                }
            }
        } else {
            candidates.push(decoded);
        }
    }

    candidates.retain(|url| !url.is_empty());
    rank::sort_by_rank(&mut candidates, trusted_hosts);

    let playback = select_playback(&candidates);
    Resolution {
        urls: candidates,
        playback,
    }
}

fn select_playback(ranked: &[String]) -> Option<Playback> {
    if ranked.is_empty() {
        return None;
    }
    match ranked.iter().find(|url| !url.ends_with(HLS_SUFFIX)) {
        Some(direct) => Some(Playback::Direct(direct.clone())),
        None => Some(Playback::ExternalPlayer(ranked[0].clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    struct StubFetcher {
        links: Vec<String>,
    }

    impl LinkFetcher for StubFetcher {
        async fn fetch_links(&self, _url: &str) -> Result<Vec<String>> {
            Ok(self.links.clone())
        }
    }

    struct FailingFetcher;

    impl LinkFetcher for FailingFetcher {
        async fn fetch_links(&self, url: &str) -> Result<Vec<String>> {
            bail!("connection refused for {url}");
        }
    }

    fn record(url: &str) -> SourceRecord {
        SourceRecord {
            name: "test".to_string(),
            url: url.to_string(),
            kind: String::new(),
            priority: 0.0,
            downloads: None,
        }
    }

    fn no_trusted() -> Vec<String> {
        Vec::new()
    }

    #[tokio::test]
    async fn empty_input_yields_empty_resolution() {
        let resolution = resolve_sources(&[], &StubFetcher { links: vec![] }, &no_trusted()).await;
        assert!(resolution.is_empty());
        assert_eq!(resolution.playback, None);
    }

    #[tokio::test]
    async fn prefers_highest_resolution_non_manifest_url() {
        let records = vec![
            record("https://mirror.example/a_720p.mp4"),
            record("https://mirror.example/a_1080p.mp4"),
            record("https://x.example/a.m3u8"),
        ];
        let resolution =
            resolve_sources(&records, &StubFetcher { links: vec![] }, &no_trusted()).await;
        assert_eq!(resolution.urls[0], "https://mirror.example/a_1080p.mp4");
        assert_eq!(
            resolution.playback,
            Some(Playback::Direct(
                "https://mirror.example/a_1080p.mp4".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn all_manifest_candidates_fall_back_to_external_player() {
        let records = vec![
            record("https://x.example/a_720p.m3u8"),
            record("https://x.example/a_1080p.m3u8"),
        ];
        let resolution =
            resolve_sources(&records, &StubFetcher { links: vec![] }, &no_trusted()).await;
        assert_eq!(
            resolution.playback,
            Some(Playback::ExternalPlayer(
                "https://x.example/a_1080p.m3u8".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn expands_indirection_records_into_their_links() {
        // "--" + hex("/apivtwo/") decodes to an indirection endpoint.
        let records = vec![record("--175948514e4c4f5717")];
        let fetcher = StubFetcher {
            links: vec![
                "https://cdn.example/ep_480p.mp4".to_string(),
                "https://cdn.example/ep_1080p.mp4".to_string(),
            ],
        };
        let resolution = resolve_sources(&records, &fetcher, &no_trusted()).await;
        assert_eq!(
            resolution.urls,
            vec![
                "https://cdn.example/ep_1080p.mp4",
                "https://cdn.example/ep_480p.mp4",
            ]
        );
    }

    #[tokio::test]
    async fn failed_indirection_does_not_abort_the_batch() {
        let records = vec![
            record("--175948514e4c4f5717"),
            record("https://mirror.example/a_720p.mp4"),
        ];
        let resolution = resolve_sources(&records, &FailingFetcher, &no_trusted()).await;
        assert_eq!(resolution.urls, vec!["https://mirror.example/a_720p.mp4"]);
        assert_eq!(
            resolution.playback,
            Some(Playback::Direct(
                "https://mirror.example/a_720p.mp4".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn malformed_records_are_skipped_not_fatal() {
        let records = vec![
            record("--090"), // odd length
            record("https://mirror.example/a_480p.mp4"),
        ];
        let resolution =
            resolve_sources(&records, &StubFetcher { links: vec![] }, &no_trusted()).await;
        assert_eq!(resolution.urls, vec!["https://mirror.example/a_480p.mp4"]);
    }

    #[tokio::test]
    async fn empty_links_from_indirection_are_dropped() {
        let records = vec![record("--175948514e4c4f5717")];
        let fetcher = StubFetcher {
            links: vec![String::new()],
        };
        let resolution = resolve_sources(&records, &fetcher, &no_trusted()).await;
        assert!(resolution.is_empty());
        assert_eq!(resolution.playback, None);
    }

    #[tokio::test]
    async fn trusted_mirror_outranks_resolution_tags() {
        let records = vec![
            record("https://mirror.example/a_1080p.mp4"),
            record("https://tools.fast4speed.rsvp/video"),
        ];
        let trusted = vec!["fast4speed.rsvp".to_string()];
        let resolution = resolve_sources(&records, &StubFetcher { links: vec![] }, &trusted).await;
        assert_eq!(resolution.urls[0], "https://tools.fast4speed.rsvp/video");
    }
}
