use anyhow::{Context, Result, anyhow, bail};
use tokio::process::Command;

use crate::settings::Settings;
use crate::providers::allanime::ALLANIME_REFERER;

const WEB_PLAYER_URL: &str = "https://allanime.day/player";

pub fn detect_player(settings: &Settings) -> String {
    settings
        .player
        .clone()
        .filter(|val| !val.trim().is_empty())
        .unwrap_or_else(|| "mpv".to_string())
}

pub async fn launch_player(
    settings: &Settings,
    url: &str,
    title: &str,
    episode: &str,
) -> Result<()> {
    let player = detect_player(settings);
    let mut cmd = Command::new(&player);
    let media_title = format!("{title} - Episode {episode}");
    cmd.arg("--quiet");
    cmd.arg("--terminal=no");
    cmd.arg(format!("--force-media-title={media_title}"));
    cmd.arg(format!("--referrer={ALLANIME_REFERER}"));
    cmd.arg(format!("--http-header-fields=Referer: {ALLANIME_REFERER}"));
    cmd.arg(url);

    let status = match cmd.status().await {
        Ok(status) => status,
        Err(err) => {
            if err.kind() == std::io::ErrorKind::NotFound {
                return Err(anyhow!(
                    "Player '{}' not found. Install mpv or set STREMO_PLAYER to a valid command.",
                    player
                ));
            }
            return Err(anyhow!(err).context(format!("failed to launch player '{player}'")));
        }
    };

    if !status.success() {
        bail!("player exited with status {status}");
    }
    Ok(())
}

/// HLS manifests go to the provider's web player instead of being handed
/// to the local player directly.
pub fn external_player_url(manifest_url: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(manifest_url.as_bytes()).collect();
    format!("{WEB_PLAYER_URL}?url={encoded}")
}

pub fn open_external_player(manifest_url: &str) -> Result<()> {
    let target = external_player_url(manifest_url);
    println!("Only HLS manifests were found; opening the web player:\n  {target}");
    open::that(&target).context("failed to open the web player in a browser")
}
