use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use futures::StreamExt;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::wrappers::UnboundedReceiverStream;

use music_fetcher::{
    config::Config,
    lastfm::LastFmClient,
    logging::setup_logging,
    services::fetch::{
        AlbumRequest, ExpectedTrack, FetchService, ProgressEvent, ProgressSink, TrackOrdering,
        TrackRequest,
    },
    soulseek::{PreferredFormat, SoulseekSession},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "MUSIC_FETCHER_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Console log level
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// File log level
    #[arg(long, default_value = "debug", global = true)]
    log_file_level: log::LevelFilter,

    /// Path to log file
    #[arg(long, env = "MUSIC_FETCHER_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find and download a single track
    Track {
        #[arg(short, long)]
        artist: String,

        #[arg(short, long)]
        title: String,

        /// Album the track is on; looked up on Last.fm when omitted
        #[arg(long)]
        album: Option<String>,

        /// Preferred container: any, flac, mp3, wav or another extension
        #[arg(short, long)]
        format: Option<PreferredFormat>,

        /// Download directory (defaults to the configured one)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Save under {artist}/{album}
        #[arg(long)]
        organize: bool,
    },
    /// Find and download a whole album from a single peer
    Album {
        #[arg(short, long)]
        artist: String,

        #[arg(short = 'l', long)]
        album: String,

        /// Expected track name, in order; repeat for each track.
        /// Fetched from Last.fm when omitted
        #[arg(short, long = "track")]
        tracks: Vec<String>,

        #[arg(short, long)]
        format: Option<PreferredFormat>,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        organize: bool,
    },
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

async fn print_progress(rx: UnboundedReceiver<ProgressEvent>) {
    let mut events = UnboundedReceiverStream::new(rx);
    let mut last: Option<ProgressEvent> = None;
    while let Some(event) = events.next().await {
        // Transfers repeat the same state many times
        if last.as_ref() == Some(&event) {
            continue;
        }
        println!("[{:>3}%] {}", event.percent, event.label);
        last = Some(event);
    }
}

async fn connect(config: &Config) -> Result<FetchService<SoulseekSession, SoulseekSession>> {
    let session = SoulseekSession::connect(&config.session_config()?)
        .await
        .wrap_err("Failed to connect to SoulSeek")?;
    Ok(FetchService::new(
        session.clone(),
        session,
        config.fetch_options()?,
    ))
}

async fn lookup_album(config: &Config, artist: &str, title: &str) -> String {
    let Some(api_key) = config.lastfm_api_key() else {
        return String::new();
    };
    match LastFmClient::new(api_key).track_album(artist, title).await {
        Ok(Some(album)) => {
            log::info!("Last.fm: '{}' is on '{}'", title, album);
            album
        }
        Ok(None) => String::new(),
        Err(e) => {
            log::warn!("Last.fm album lookup failed: {}", e);
            String::new()
        }
    }
}

async fn expected_tracks(
    config: &Config,
    artist: &str,
    album: &str,
    tracks: Vec<String>,
) -> Result<Vec<ExpectedTrack>> {
    let names = if !tracks.is_empty() {
        tracks
    } else {
        let api_key = config.lastfm_api_key().ok_or_else(|| {
            eyre!("No expected tracks: pass --track or configure a Last.fm API key")
        })?;
        LastFmClient::new(api_key)
            .album_tracks(artist, album)
            .await
            .wrap_err("Failed to fetch the album track list from Last.fm")?
    };
    if names.is_empty() {
        return Err(eyre!("No track list found for '{}' by '{}'", album, artist));
    }
    Ok(names.into_iter().map(|name| ExpectedTrack { name }).collect())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_logging(args.log_level, args.log_file.clone(), args.log_file_level)?;

    log::debug!("Music fetcher starting");

    if let Commands::Config(config_commands) = &args.command {
        match config_commands {
            ConfigCommands::CreateDefault => {
                log::debug!("Creating default config");
                let path = match &args.config {
                    Some(path) => {
                        Config::create_default_at(path)?;
                        path.clone()
                    }
                    None => Config::create_default()?,
                };
                println!("{}", path.display());
            }
            ConfigCommands::Path => match args.config.clone().or_else(Config::config_path) {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        }
        return Ok(());
    }

    log::debug!("Loading configuration");
    let config = match &args.config {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    }
    .wrap_err("Failed to load music-fetcher config")?;

    match args.command {
        Commands::Track {
            artist,
            title,
            album,
            format,
            output,
            organize,
        } => {
            let album = match album {
                Some(album) => album,
                None => lookup_album(&config, &artist, &title).await,
            };
            let request = TrackRequest {
                artist,
                title,
                album,
                preferred_format: format.unwrap_or_else(|| config.preferred_format.clone()),
                download_dir: output.unwrap_or_else(|| config.download_directory_path()),
                organize: organize || config.organize,
            };

            let service = connect(&config).await?;
            let (sink, rx) = ProgressSink::channel();
            let printer = tokio::spawn(print_progress(rx));
            let result = service.find_and_download_track(&request, &sink).await;
            drop(sink);
            printer.await?;

            let download = result.wrap_err_with(|| {
                format!("Could not download '{}' by '{}'", request.title, request.artist)
            })?;
            if download.already_present {
                println!("Already downloaded: {}", download.path.display());
            } else {
                println!(
                    "Downloaded {} from {}",
                    download.path.display(),
                    download.source_candidate.peer_id
                );
            }
        }
        Commands::Album {
            artist,
            album,
            tracks,
            format,
            output,
            organize,
        } => {
            let expected_tracks = expected_tracks(&config, &artist, &album, tracks).await?;
            let request = AlbumRequest {
                artist,
                album,
                expected_tracks,
                preferred_format: format.unwrap_or_else(|| config.preferred_format.clone()),
                download_dir: output.unwrap_or_else(|| config.download_directory_path()),
                organize: organize || config.organize,
            };

            let service = connect(&config).await?;
            let (sink, rx) = ProgressSink::channel();
            let printer = tokio::spawn(print_progress(rx));
            let result = service.find_and_download_album(&request, &sink).await;
            drop(sink);
            printer.await?;

            let download = result.wrap_err_with(|| {
                format!("Could not download '{}' by '{}'", request.album, request.artist)
            })?;
            println!(
                "Downloaded {}/{} tracks from {} into {}",
                download.succeeded,
                download.total,
                download.source_candidate.peer_id,
                download.directory.display()
            );
            for track in &download.tracks {
                println!("  {:>2}. {}", track.track_index + 1, track.title);
            }
            if download.ordering == TrackOrdering::Unverified {
                println!("Track order follows file names and may not match the album.");
            }
        }
        Commands::Config(_) => {}
    }

    Ok(())
}
