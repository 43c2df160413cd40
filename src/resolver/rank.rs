use url::Url;

/// Playability rank for a candidate URL, ascending: `TrustedMirror` beats
/// everything, `Empty` loses to everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QualityRank {
    TrustedMirror,
    FullHd,
    Hd,
    Sd,
    Unranked,
    Empty,
}

pub fn rank_url(url: &str, trusted_hosts: &[String]) -> QualityRank {
    if url.is_empty() {
        return QualityRank::Empty;
    }
    if is_trusted_host(url, trusted_hosts) {
        return QualityRank::TrustedMirror;
    }
    if url.contains("1080p") {
        QualityRank::FullHd
    } else if url.contains("720p") {
        QualityRank::Hd
    } else if url.contains("480p") {
        QualityRank::Sd
    } else {
        QualityRank::Unranked
    }
}

/// Stable sort, so equal-rank candidates keep their discovery order.
pub fn sort_by_rank(urls: &mut [String], trusted_hosts: &[String]) {
    urls.sort_by_key(|url| rank_url(url, trusted_hosts));
}

fn is_trusted_host(url: &str, trusted_hosts: &[String]) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    trusted_hosts
        .iter()
        .any(|trusted| host == trusted || host.ends_with(&format!(".{trusted}")))
}
