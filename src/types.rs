use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Translation {
    Sub,
    Dub,
}

impl Translation {
    pub fn as_str(self) -> &'static str {
        match self {
            Translation::Sub => "sub",
            Translation::Dub => "dub",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Translation::Sub => "Sub",
            Translation::Dub => "Dub",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ShowInfo {
    pub id: String,
    pub title: String,
    pub available_eps: EpisodeCounts,
}

#[derive(Debug, Clone, Default)]
pub struct EpisodeCounts {
    pub sub: usize,
    pub dub: usize,
}

/// One provider's offered link for an episode, exactly as the catalog API
/// returns it. `url` may still carry the `--` obfuscation prefix.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceRecord {
    #[serde(rename = "sourceName")]
    #[serde(default)]
    pub name: String,
    #[serde(rename = "sourceUrl")]
    pub url: String,
    #[serde(rename = "type")]
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub priority: f64,
    #[serde(default)]
    pub downloads: Option<DownloadInfo>,
}

impl SourceRecord {
    pub fn download_url(&self) -> Option<&str> {
        self.downloads
            .as_ref()
            .map(|d| d.download_url.as_str())
            .filter(|u| !u.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadInfo {
    #[serde(rename = "downloadUrl")]
    #[serde(default)]
    pub download_url: String,
}
