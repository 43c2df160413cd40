use std::cmp::Ordering;
use std::path::Path;

use anyhow::{Result, bail};
use chrono::Utc;
use clap::Parser;
use dialoguer::Select;

mod history;
mod player;
mod providers;
mod resolver;
mod scraper;
mod settings;
mod types;

use settings::Settings;
use history::{History, HistoryEntry, history_path, theme};
use providers::{CatalogProvider, allanime::AllAnimeClient};
use resolver::{LinkFetcher, Playback, decode_source_url, resolve_sources};
use scraper::ScraperBackend;
use types::{EpisodeCounts, ShowInfo, SourceRecord, Translation};

#[derive(Debug, Parser)]
#[command(
    name = "stremo",
    about = "Search AllAnime and stream episodes into mpv.",
    version
)]
struct Cli {
    #[arg(long)]
    dub: bool,

    #[arg(long)]
    history: bool,

    /// Print the decoded source list for the chosen episode instead of
    /// playing it.
    #[arg(long)]
    sources: bool,

    /// Resolve through the external scraper script instead of the catalog
    /// API.
    #[arg(long)]
    scraper: bool,

    /// Write a default config file and exit.
    #[arg(long)]
    init_config: bool,

    #[arg(short = 'e', long, value_name = "EPISODE")]
    episode: Option<String>,

    #[arg(value_name = "QUERY")]
    query: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let result = run().await;
    if let Err(err) = &result {
        eprintln!("error: {err:?}");
    }
    result
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.init_config {
        let path = Settings::write_default()?;
        println!("Wrote default config to {}", path.display());
        return Ok(());
    }

    let settings = Settings::load()?;
    let history_mode =
        cli.history || (cli.query.len() == 1 && cli.query[0].eq_ignore_ascii_case("history"));
    let history_path = history_path()?;
    let mut history = History::load(&history_path)?;

    let translation = if cli.dub {
        Translation::Dub
    } else {
        Translation::Sub
    };

    if cli.scraper {
        return run_scraper_flow(&cli, &settings, translation, &mut history, &history_path).await;
    }
    run_catalog_flow(
        &cli,
        &settings,
        translation,
        history_mode,
        &mut history,
        &history_path,
    )
    .await
}

async fn run_catalog_flow(
    cli: &Cli,
    settings: &Settings,
    translation: Translation,
    history_mode: bool,
    history: &mut History,
    history_path: &Path,
) -> Result<()> {
    let client = AllAnimeClient::new()?;

    if history_mode {
        if let Some(entry) = history.select_entry()? {
            let show = ShowInfo {
                id: entry.show_id.clone(),
                title: entry.show_title.clone(),
                available_eps: EpisodeCounts::default(),
            };
            let preferred_episode = Some(entry.episode.clone());
            let entry_translation = entry.translation;
            play_show(
                cli,
                settings,
                &client,
                history,
                history_path,
                entry_translation,
                show,
                preferred_episode,
            )
            .await?;
        }
        return Ok(());
    }

    if cli.query.is_empty() {
        println!("No query provided. Use `stremo <name>` or `stremo --history`.");
        return Ok(());
    }

    let query = cli.query.join(" ");
    let shows = client.search_shows(&query, translation).await?;
    if shows.is_empty() {
        bail!("No results for \"{}\" ({})", query, translation.label());
    }

    let options: Vec<String> = shows
        .iter()
        .map(|s| {
            let count = match translation {
                Translation::Sub => s.available_eps.sub,
                Translation::Dub => s.available_eps.dub,
            };
            format!("{} [{} episodes]", s.title, count)
        })
        .collect();
    let selection = Select::with_theme(&theme())
        .with_prompt("Select a show (Esc to cancel)")
        .items(&options)
        .default(0)
        .interact_opt()?;
    let Some(idx) = selection else {
        println!("Cancelled.");
        return Ok(());
    };
    let show = shows[idx].clone();
    play_show(
        cli,
        settings,
        &client,
        history,
        history_path,
        translation,
        show,
        cli.episode.clone(),
    )
    .await
}

async fn play_show(
    cli: &Cli,
    settings: &Settings,
    client: &(impl CatalogProvider + LinkFetcher),
    history: &mut History,
    history_path: &Path,
    translation: Translation,
    show: ShowInfo,
    prefer_episode: Option<String>,
) -> Result<()> {
    let episodes = client.fetch_episodes(&show.id, translation).await?;
    if episodes.is_empty() {
        bail!(
            "No {} episodes available for {}",
            translation.label(),
            show.title
        );
    }

    let latest_available = episodes
        .iter()
        .max_by(|a, b| compare_episode_labels(a, b))
        .cloned()
        .unwrap_or_else(|| String::from("1"));
    println!(
        "Found {} {} episodes. Latest available: {}.",
        episodes.len(),
        translation.label(),
        latest_available
    );

    let last_watched = history.last_episode(&show.id, translation);
    if let Some(prev) = &last_watched {
        println!("Last watched {} episode: {}.", translation.label(), prev);
    }

    // Determine starting episode and whether to skip the selection dialog on
    // the first iteration (when the caller provides a valid --episode flag).
    let (mut current_episode, mut skip_selection) = match &prefer_episode {
        Some(ep) if episodes.contains(ep) => (ep.clone(), true),
        Some(ep) => {
            println!(
                "Episode '{}' does not exist for '{}'. Showing episode list.",
                ep, show.title
            );
            (
                last_watched
                    .clone()
                    .unwrap_or_else(|| latest_available.clone()),
                false,
            )
        }
        None => (
            last_watched
                .clone()
                .unwrap_or_else(|| latest_available.clone()),
            false,
        ),
    };

    loop {
        let default_idx = episodes
            .iter()
            .position(|ep| ep == &current_episode)
            .or_else(|| episodes.iter().position(|ep| ep == &latest_available))
            .unwrap_or(0);

        let idx = if skip_selection {
            skip_selection = false; // only skip once
            default_idx
        } else {
            let selection = Select::with_theme(&theme())
                .with_prompt("Episode to play (Enter to select, Esc to cancel)")
                .items(&episodes)
                .default(default_idx)
                .interact_opt()?;
            let Some(i) = selection else {
                println!("Exiting playback loop.");
                return Ok(());
            };
            i
        };

        let chosen = episodes[idx].clone();
        let auto_advance = idx == default_idx;

        println!("Fetching sources for episode {}...", chosen);
        let records = match client.fetch_sources(&show.id, translation, &chosen).await {
            Ok(records) => records,
            Err(err) => {
                println!("Error fetching sources: {}", err);
                continue;
            }
        };

        if cli.sources {
            print_source_table(&records);
            return Ok(());
        }

        let resolution = resolve_sources(&records, client, &settings.trusted_hosts).await;
        let next_candidate = next_episode_label(&chosen, &episodes);

        match &resolution.playback {
            None => {
                println!(
                    "No playable source found for episode {chosen}. Try another episode or rerun later."
                );
                current_episode = latest_available.clone();
                continue;
            }
            Some(Playback::Direct(url)) => {
                player::launch_player(settings, url, &show.title, &chosen).await?;
            }
            Some(Playback::ExternalPlayer(manifest)) => {
                player::open_external_player(manifest)?;
            }
        }

        history.upsert(HistoryEntry {
            show_id: show.id.clone(),
            show_title: show.title.clone(),
            episode: chosen.clone(),
            translation,
            watched_at: Utc::now(),
        });
        history.save(history_path)?;

        match (auto_advance, next_candidate) {
            (true, Some(next)) => current_episode = next,
            (true, None) => {
                println!("No further episodes found. Exiting.");
                return Ok(());
            }
            (false, candidate) => current_episode = candidate.unwrap_or(chosen),
        }
    }
}

async fn run_scraper_flow(
    cli: &Cli,
    settings: &Settings,
    translation: Translation,
    history: &mut History,
    history_path: &Path,
) -> Result<()> {
    if cli.query.is_empty() {
        println!("No query provided. Use `stremo --scraper <name>`.");
        return Ok(());
    }

    let backend = ScraperBackend::new(&settings.scraper_command)?;
    let query = cli.query.join(" ");
    let shows = backend.search(&query).await?;
    if shows.is_empty() {
        bail!("No scraper results for \"{query}\"");
    }

    let options: Vec<String> = shows
        .iter()
        .map(|s| format!("{} [{} episodes]", s.title, s.episodes))
        .collect();
    let selection = Select::with_theme(&theme())
        .with_prompt("Select a show (Esc to cancel)")
        .items(&options)
        .default(0)
        .interact_opt()?;
    let Some(idx) = selection else {
        println!("Cancelled.");
        return Ok(());
    };
    let show = shows[idx].clone();

    let episodes = backend.fetch_episodes(&show.id).await?;
    if episodes.is_empty() {
        bail!("Scraper reported no episodes for {}", show.title);
    }

    let last_watched = history.last_episode(&show.id, translation);
    loop {
        let default_idx = cli
            .episode
            .as_ref()
            .or(last_watched.as_ref())
            .and_then(|ep| episodes.iter().position(|e| e == ep))
            .unwrap_or(0);
        let selection = Select::with_theme(&theme())
            .with_prompt("Episode to play (Enter to select, Esc to cancel)")
            .items(&episodes)
            .default(default_idx)
            .interact_opt()?;
        let Some(idx) = selection else {
            println!("Exiting playback loop.");
            return Ok(());
        };
        let chosen = episodes[idx].clone();

        println!("Resolving episode {} through the scraper...", chosen);
        match backend.resolve_episode(&show.id, &chosen).await? {
            Some(url) if url.ends_with(".m3u8") => player::open_external_player(&url)?,
            Some(url) => player::launch_player(settings, &url, &show.title, &chosen).await?,
            None => {
                println!("Could not extract a direct video link for episode {chosen}.");
                continue;
            }
        }

        history.upsert(HistoryEntry {
            show_id: show.id.clone(),
            show_title: show.title.clone(),
            episode: chosen,
            translation,
            watched_at: Utc::now(),
        });
        history.save(history_path)?;
    }
}

fn print_source_table(records: &[SourceRecord]) {
    if records.is_empty() {
        println!("No sources returned for this episode.");
        return;
    }
    for record in records {
        match decode_source_url(&record.url) {
            Ok(url) => {
                println!(
                    "{:<12} {:<8} priority {:>5.1}  {}",
                    record.name, record.kind, record.priority, url
                );
                if let Some(download) = record.download_url() {
                    println!("{:<12} {:<8} download       {}", "", "", download);
                }
            }
            Err(err) => {
                println!("{:<12} {:<8} (undecodable: {err})", record.name, record.kind);
            }
        }
    }
}

fn compare_episode_labels(left: &str, right: &str) -> Ordering {
    let l = parse_episode_key(left);
    let r = parse_episode_key(right);
    l.partial_cmp(&r).unwrap_or(Ordering::Equal)
}

fn parse_episode_key(label: &str) -> f32 {
    label.parse::<f32>().unwrap_or(0.0)
}

fn sorted_episode_labels(episodes: &[String]) -> Vec<String> {
    let mut sorted = episodes.to_vec();
    sorted.sort_by(|a, b| compare_episode_labels(a, b));
    sorted.dedup();
    sorted
}

fn next_episode_label(current: &str, episodes: &[String]) -> Option<String> {
    let sorted = sorted_episode_labels(episodes);
    let pos = sorted.iter().position(|ep| ep == current)?;
    sorted.get(pos + 1).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_episode_follows_numeric_order() {
        let episodes: Vec<String> = ["1", "2", "10", "3"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(next_episode_label("2", &episodes).as_deref(), Some("3"));
        assert_eq!(next_episode_label("3", &episodes).as_deref(), Some("10"));
        assert_eq!(next_episode_label("10", &episodes), None);
    }

    #[test]
    fn episode_labels_compare_as_floats() {
        assert_eq!(compare_episode_labels("2", "10"), Ordering::Less);
        assert_eq!(compare_episode_labels("1.5", "1.5"), Ordering::Equal);
        assert_eq!(compare_episode_labels("12", "3"), Ordering::Greater);
    }
}
