use anyhow::Context;
use app_core::{Reader, ReaderConfig};
use clap::{Parser, Subcommand, ValueEnum};
use networking::{NetworkMonitor, NetworkState};
use std::path::PathBuf;
use storage::models::{ChapterQuery, Narrator, NewBookmark, Place};
use storage::ColorMode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "quran-reader")]
#[command(about = "Offline-first Quran reader backed by the equran.id corpus", long_about = None)]
struct Args {
    /// Data directory (defaults to QURAN_READER_DATA_DIR or ./.quran-reader)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Corpus API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Recitation audio host
    #[arg(long, global = true)]
    audio_url: Option<String>,

    /// Freshness window in hours
    #[arg(long, global = true)]
    freshness_hours: Option<u64>,

    /// Treat the network as unavailable and serve cached data only
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the chapter list, or refresh chapters older than the freshness window
    Sync,

    /// List cached chapters
    List {
        /// Only chapters revealed at this place
        #[arg(long, value_enum)]
        place: Option<PlaceArg>,

        /// Match transliterated name, meaning, or chapter number
        #[arg(long)]
        search: Option<String>,
    },

    /// Show a chapter's verses
    Read {
        /// Chapter number
        chapter: u32,

        /// Show only this verse
        #[arg(long)]
        verse: Option<u32>,
    },

    /// Show a chapter's commentary
    Tafsir {
        /// Chapter number
        chapter: u32,

        /// Show only this verse
        #[arg(long)]
        verse: Option<u32>,
    },

    /// Manage bookmarks
    Bookmark {
        #[command(subcommand)]
        action: BookmarkAction,
    },

    /// Show or change the color mode
    Theme {
        #[command(subcommand)]
        action: Option<ThemeAction>,

        /// Whether the system currently prefers a dark appearance
        #[arg(long, global = true)]
        system_dark: bool,
    },

    /// Show or select the narrator
    Narrator {
        /// Narrator id (01-05) to select
        id: Option<String>,
    },

    /// Print the recitation URL for a chapter or verse with the selected narrator
    Audio {
        /// Chapter number
        chapter: u32,

        /// Verse number
        verse: Option<u32>,
    },

    /// Show or set the playback volume (0-100)
    Volume {
        /// New volume percentage
        percent: Option<u8>,
    },
}

#[derive(Subcommand, Debug)]
enum BookmarkAction {
    /// Bookmark a chapter or a verse
    Add {
        /// Chapter number
        chapter: u32,

        /// Verse number; omit to bookmark the whole chapter
        verse: Option<u32>,

        /// Display title
        #[arg(long)]
        title: Option<String>,
    },

    /// List bookmarks, newest first
    List,

    /// Remove a bookmark by id
    Remove {
        /// Bookmark id
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum ThemeAction {
    /// Flip between light and dark
    Toggle,

    /// Follow the system appearance again
    System,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PlaceArg {
    Mekah,
    Madinah,
}

impl From<PlaceArg> for Place {
    fn from(place: PlaceArg) -> Self {
        match place {
            PlaceArg::Mekah => Place::Mecca,
            PlaceArg::Madinah => Place::Medina,
        }
    }
}

fn reader_config(args: &Args) -> anyhow::Result<ReaderConfig> {
    let mut config = ReaderConfig::from_env()?;

    if let Some(dir) = &args.data_dir {
        config = config.data_dir(dir);
    }
    if let Some(url) = &args.api_url {
        config = config.api_url(url);
    }
    if let Some(url) = &args.audio_url {
        config = config.audio_url(url);
    }
    if let Some(hours) = args.freshness_hours {
        config = config.freshness_hours(hours)?;
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quran_reader=info,app_core=info,storage=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = reader_config(&args)?;

    let monitor = if args.offline {
        NetworkMonitor::with_state(NetworkState::Offline)
    } else {
        let monitor = NetworkMonitor::new();
        let state = monitor.probe(&config.api.base_url).await;
        tracing::info!("Network is {}", state);
        monitor
    };

    let reader = Reader::open_with_monitor(config, monitor)
        .await
        .context("failed to open reader data")?;

    let outcome = run(&reader, args.command).await;
    reader.close().await?;
    outcome
}

async fn run(reader: &Reader, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Sync => {
            let report = reader.sync_now().await?;
            if report.initialized > 0 {
                println!("Downloaded {} chapters", report.initialized);
            } else if report.offline {
                println!("Offline: using cached data");
            } else {
                println!("Refreshed {} chapters", report.refreshed.len());
            }
        }

        Command::List { place, search } => {
            let mut query = ChapterQuery::all();
            if let Some(place) = place {
                query = query.place(place.into());
            }
            if let Some(term) = search {
                query = query.search(term);
            }

            let chapters = reader.chapters(&query).await?;
            if chapters.is_empty() && query == ChapterQuery::all() {
                println!("No chapters cached yet. Run `quran-reader sync` first.");
            }
            for chapter in chapters {
                println!(
                    "{:>3}. {} ({}) - {} - {} verses, {}",
                    chapter.number,
                    chapter.name_latin,
                    chapter.name,
                    chapter.meaning,
                    chapter.verse_count,
                    chapter.place
                );
            }
        }

        Command::Read { chapter, verse } => {
            let loaded = reader.load_chapter(chapter).await?;
            println!("{} - {}", loaded.chapter.name_latin, loaded.chapter.meaning);
            let bookmarks = reader.bookmarks();
            for v in loaded.verses.iter().filter(|v| verse.map_or(true, |n| v.number == n)) {
                let marker = if bookmarks.is_bookmarked(chapter, Some(v.number)).await? {
                    "*"
                } else {
                    " "
                };
                println!("{}[{}] {}", marker, v.number, v.text_arabic);
                println!("     {}", v.text_latin);
                println!("     {}", v.translation);
            }
        }

        Command::Tafsir { chapter, verse } => {
            let loaded = reader.load_commentary(chapter).await?;
            println!("Tafsir {}", loaded.chapter.name_latin);
            for entry in loaded.entries.iter().filter(|e| verse.map_or(true, |n| e.verse == n)) {
                println!("[{}] {}", entry.verse, entry.text);
            }
        }

        Command::Bookmark { action } => match action {
            BookmarkAction::Add { chapter, verse, title } => {
                let title = title.unwrap_or_else(|| match verse {
                    Some(v) => format!("Surah {} Ayat {}", chapter, v),
                    None => format!("Surah {}", chapter),
                });
                let bookmark = reader
                    .bookmarks()
                    .add_bookmark(NewBookmark { chapter, verse, title })
                    .await?;
                println!("Bookmark {} saved", bookmark.id);
            }
            BookmarkAction::List => {
                for bookmark in reader.bookmarks().bookmarks().await? {
                    let location = match bookmark.verse {
                        Some(v) => format!("{}:{}", bookmark.chapter, v),
                        None => bookmark.chapter.to_string(),
                    };
                    println!("{:>4}  {:<8} {}", bookmark.id, location, bookmark.title);
                }
            }
            BookmarkAction::Remove { id } => {
                reader.bookmarks().remove_bookmark(id).await?;
                println!("Bookmark {} removed", id);
            }
        },

        Command::Theme { action, system_dark } => {
            let preferences = reader.preferences();
            match action {
                Some(ThemeAction::Toggle) => {
                    preferences.toggle_dark_mode(system_dark)?;
                }
                Some(ThemeAction::System) => preferences.set_color_mode(ColorMode::System)?,
                None => {}
            }
            let dark = preferences.is_dark_mode(system_dark)?;
            println!(
                "{} mode ({:?})",
                if dark { "Dark" } else { "Light" },
                preferences.color_mode()?
            );
        }

        Command::Narrator { id } => {
            let preferences = reader.preferences();
            if let Some(id) = id {
                let narrator: Narrator = id.parse().map_err(anyhow::Error::msg)?;
                preferences.set_narrator(narrator)?;
            }
            let selected = preferences.narrator()?;
            for narrator in Narrator::ALL {
                let marker = if narrator == selected { "*" } else { " " };
                println!("{} {} {}", marker, narrator.id(), narrator.display_name());
            }
        }

        Command::Audio { chapter, verse } => {
            let narrator = reader.preferences().narrator()?;
            let host = &reader.config().audio;
            let url = match verse {
                Some(v) => host.verse_url(narrator, chapter, v),
                None => host.chapter_url(narrator, chapter),
            };
            println!("{}", url);
        }

        Command::Volume { percent } => {
            let preferences = reader.preferences();
            if let Some(percent) = percent {
                preferences.set_volume(f32::from(percent) / 100.0)?;
            }
            let volume = preferences.volume()?;
            println!("Volume {:.0}%", volume * 100.0);
        }
    }

    Ok(())
}
