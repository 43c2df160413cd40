use std::cmp::Ordering;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use tokio::process::Command;
use tokio::time::timeout;

const SCRAPER_TIMEOUT: Duration = Duration::from_secs(60);

/// Alternate candidate producer that shells out to an ani-cli style
/// scraper script and parses its console output.
pub struct ScraperBackend {
    command: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScraperShow {
    pub id: String,
    pub title: String,
    pub episodes: usize,
}

impl ScraperBackend {
    pub fn new(command: &str) -> Result<Self> {
        let command = shlex::split(command)
            .ok_or_else(|| anyhow!("unparseable scraper command: {command}"))?;
        if command.is_empty() {
            bail!("scraper command is empty");
        }
        Ok(Self { command })
    }

    pub async fn search(&self, query: &str) -> Result<Vec<ScraperShow>> {
        let (stdout, _) = self.run(&[query]).await?;
        Ok(parse_search_output(&stdout))
    }

    /// The scraper has no clean list-episodes command; asking it to select
    /// an invalid index makes it print the episode list on stderr.
    pub async fn fetch_episodes(&self, show_id: &str) -> Result<Vec<String>> {
        let (_, stderr) = self
            .run(&["-S", "invalid_index", "--no-detach", show_id])
            .await?;
        Ok(parse_episode_list(&stderr))
    }

    /// Runs the scraper in download mode without detaching, then mines the
    /// combined output for the direct link it resolved.
    pub async fn resolve_episode(&self, show_id: &str, episode: &str) -> Result<Option<String>> {
        let (stdout, stderr) = self
            .run(&[
                "-d",
                "-e",
                episode,
                "--no-detach",
                "--exit-after-play",
                "--logview",
                show_id,
            ])
            .await?;
        let combined = format!("{stdout}\n{stderr}");
        Ok(extract_direct_link(&combined))
    }

    async fn run(&self, args: &[&str]) -> Result<(String, String)> {
        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                anyhow!("scraper '{}' not found; check the configured command", self.command[0])
            } else {
                anyhow!(err).context(format!("failed to run scraper '{}'", self.command[0]))
            }
        })?;

        let output = timeout(SCRAPER_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| {
                anyhow!(
                    "scraper timed out after {}s; it was killed",
                    SCRAPER_TIMEOUT.as_secs()
                )
            })?
            .context("failed to collect scraper output")?;

        Ok((
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ))
    }
}

/// Search output lines look like `ID\tTITLE (N episodes)`.
pub fn parse_search_output(stdout: &str) -> Vec<ScraperShow> {
    let line_re = Regex::new(r"^(\S+)\t(.+) \((\d+) episodes\)$").expect("valid regex");
    stdout
        .lines()
        .filter_map(|line| {
            let caps = line_re.captures(line.trim_end())?;
            Some(ScraperShow {
                id: caps[1].to_string(),
                title: caps[2].to_string(),
                episodes: caps[3].parse().unwrap_or(0),
            })
        })
        .collect()
}

/// Episode listings are bare decimal numbers, one per stderr line.
pub fn parse_episode_list(stderr: &str) -> Vec<String> {
    let ep_re = Regex::new(r"^\s*([0-9.]+)\s*$").expect("valid regex");
    let mut episodes: Vec<String> = stderr
        .lines()
        .filter_map(|line| ep_re.captures(line).map(|caps| caps[1].to_string()))
        .collect();
    episodes.sort_by(|a, b| {
        let l = a.parse::<f32>().unwrap_or(0.0);
        let r = b.parse::<f32>().unwrap_or(0.0);
        l.partial_cmp(&r).unwrap_or(Ordering::Equal)
    });
    episodes.dedup();
    episodes
}

/// Mines scraper output for a playable link. Progressive mp4 wins over an
/// HLS manifest, which wins over the Yt and wixmp repackager forms.
pub fn extract_direct_link(output: &str) -> Option<String> {
    let mp4_re = Regex::new(r"(https?://[^\s]+\.mp4)").expect("valid regex");
    if let Some(caps) = mp4_re.captures(output) {
        return Some(caps[1].to_string());
    }

    let m3u8_re = Regex::new(r"(https?://[^\s]+\.m3u8)").expect("valid regex");
    if let Some(caps) = m3u8_re.captures(output) {
        return Some(caps[1].to_string());
    }

    let yt_re = Regex::new(r"Yt >(https?://[^\s]+)").expect("valid regex");
    if let Some(caps) = yt_re.captures(output) {
        return Some(caps[1].to_string());
    }

    let repackager_re = Regex::new(r"repackager\.wixmp\.com/([^>\s]*)").expect("valid regex");
    if let Some(caps) = repackager_re.captures(output) {
        return Some(format!("https://repackager.wixmp.com/{}", &caps[1]));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_search_lines_and_skips_noise() {
        let stdout = "fetching results...\n\
                      abc123\tFrieren: Beyond Journey's End (28 episodes)\n\
                      xyz789\tSpy x Family (37 episodes)\n\
                      done\n";
        let shows = parse_search_output(stdout);
        assert_eq!(shows.len(), 2);
        assert_eq!(shows[0].id, "abc123");
        assert_eq!(shows[0].title, "Frieren: Beyond Journey's End");
        assert_eq!(shows[0].episodes, 28);
        assert_eq!(shows[1].id, "xyz789");
    }

    #[test]
    fn parses_episode_numbers_sorted_and_deduped() {
        let stderr = "selecting episode\n  10\n  2\n 2 \n  1.5\nnot-an-episode\n";
        assert_eq!(parse_episode_list(stderr), vec!["1.5", "2", "10"]);
    }

    #[test]
    fn prefers_mp4_over_manifest_links() {
        let output = "master.m3u8 >https://cdn.example/stream/master.m3u8\n\
                      640 >https://cdn.example/video_720p.mp4\n";
        assert_eq!(
            extract_direct_link(output).as_deref(),
            Some("https://cdn.example/video_720p.mp4")
        );
    }

    #[test]
    fn falls_back_to_manifest_then_yt_then_repackager() {
        let manifest_only = "master.m3u8 >https://cdn.example/stream/master.m3u8";
        assert_eq!(
            extract_direct_link(manifest_only).as_deref(),
            Some("https://cdn.example/stream/master.m3u8")
        );

        let yt_only = "Yt >https://youtu.example/watch?v=abc";
        assert_eq!(
            extract_direct_link(yt_only).as_deref(),
            Some("https://youtu.example/watch?v=abc")
        );

        let repackager_only = "repackager.wixmp.com/video.example/path,480p,/mp4/file.mp4.urlset";
        assert_eq!(
            extract_direct_link(repackager_only).as_deref(),
            Some("https://repackager.wixmp.com/video.example/path,480p,/mp4/file.mp4.urlset")
        );
    }

    #[test]
    fn returns_none_when_no_link_present() {
        assert_eq!(extract_direct_link("no links in this log"), None);
    }

    #[test]
    fn rejects_empty_scraper_command() {
        assert!(ScraperBackend::new("").is_err());
        assert!(ScraperBackend::new("   ").is_err());
    }

    #[test]
    fn splits_scraper_command_with_quoting() {
        let backend = ScraperBackend::new("/opt/tools/ani-cli --vlc").unwrap();
        assert_eq!(backend.command, vec!["/opt/tools/ani-cli", "--vlc"]);
    }
}
