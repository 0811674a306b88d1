use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use comicshelf::blobs::FsBlobStore;
use comicshelf::config::{Cli, Command, Config};
use comicshelf::content::{ContentRepository, SqliteContentRepository};
use comicshelf::local::{
    device_id, percent_complete, FileKv, KvStore, Preferences, ProgressStore, ReadingStats,
};
use comicshelf::reader::{Reader, ReaderOptions, ReaderSession};
use comicshelf::state::AppState;
use comicshelf::{db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    match cli.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Read { chapter_id } => read(config, chapter_id).await,
        Command::DeviceId => {
            let kv = FileKv::open(config.local_path());
            println!("{}", device_id(Some(&kv as &dyn KvStore)));
            Ok(())
        }
        Command::Stats => {
            stats(config);
            Ok(())
        }
        Command::HashAdminKey { key } => {
            let hash = bcrypt::hash(&key, bcrypt::DEFAULT_COST)?;
            println!("[admin]\nkey_hash = \"{}\"", hash);
            Ok(())
        }
    }
}

fn open_repo(config: &Config) -> anyhow::Result<Arc<dyn ContentRepository>> {
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;
    Ok(Arc::new(SqliteContentRepository::new(pool)))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let repo = open_repo(&config)?;

    // Ensure blob directory exists
    std::fs::create_dir_all(config.blobs_path())?;
    let blobs = FsBlobStore::new(config.blobs_path(), config.public_base_url());
    tracing::info!(
        "Blobs stored under {} and served from {}",
        blobs.root().display(),
        config.public_base_url()
    );
    if config.admin.key_hash.is_none() {
        tracing::warn!("No admin key configured, admin routes are closed");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = AppState {
        config,
        repo,
        blobs: Arc::new(blobs),
    };
    let app = routes::app(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn local_profile(config: &Config) -> (ProgressStore, Preferences) {
    let kv: Arc<dyn KvStore> = Arc::new(FileKv::open(config.local_path()));
    (ProgressStore::new(kv.clone()), Preferences::new(kv))
}

const READ_HELP: &str =
    "n next | p prev | j <page> jump | m mode | d direction | c comments | say <text> | ] next chapter | [ prev chapter | q quit";

/// Terminal reader over the local library.
async fn read(config: Config, chapter_id: String) -> anyhow::Result<()> {
    let repo = open_repo(&config)?;
    let (store, prefs) = local_profile(&config);
    let options = ReaderOptions {
        ui_idle: Duration::from_millis(config.reader.ui_idle_ms),
        resume: true,
    };

    let mut reader = Reader::loading(chapter_id)
        .load(repo.clone(), store.clone(), options, Instant::now())
        .await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", READ_HELP);
    loop {
        let session = match &mut reader {
            Reader::Ready(session) => session,
            Reader::NotFound { chapter_id } => {
                anyhow::bail!("Chapter {} not found", chapter_id);
            }
            Reader::Loading { .. } => anyhow::bail!("Chapter did not load"),
        };
        print_position(session);

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let now = Instant::now();
        let line = line.trim();
        let (cmd, arg) = line.split_once(' ').unwrap_or((line, ""));

        let target = match cmd {
            "n" => {
                if session.next(now).is_none() {
                    println!("(last page)");
                }
                None
            }
            "p" => {
                if session.prev(now).is_none() {
                    println!("(first page)");
                }
                None
            }
            "j" => {
                match arg.trim().parse::<usize>() {
                    Ok(n) if n >= 1 => {
                        session.jump(n - 1, now);
                    }
                    _ => println!("usage: j <page number>"),
                }
                None
            }
            "m" => {
                println!("mode: {:?}", session.toggle_mode(now));
                None
            }
            "d" => {
                println!("direction: {:?}", session.toggle_direction(now));
                None
            }
            "c" => {
                for comment in session.comments().await? {
                    println!("[{}] {}: {}", comment.created_at, comment.username, comment.message);
                }
                None
            }
            "say" => {
                match session.post_comment(&prefs, arg).await {
                    Ok(comment) => println!("posted as {}", comment.username),
                    Err(e) => println!("{}", e),
                }
                None
            }
            "]" => session.next_chapter().map(|c| c.id.clone()),
            "[" => session.prev_chapter().map(|c| c.id.clone()),
            "q" => break,
            _ => {
                println!("{}", READ_HELP);
                None
            }
        };

        if let Some(next_id) = target {
            reader = Reader::loading(next_id)
                .load(repo.clone(), store.clone(), options, Instant::now())
                .await
                .context("loading chapter")?;
        }
    }

    Ok(())
}

fn print_position(session: &ReaderSession) {
    let chapter = session.chapter();
    match session.current_page() {
        Some(page) => println!(
            "{} (ch. {}) page {}/{}: {}",
            chapter.title,
            chapter.chapter_number,
            session.page_index() + 1,
            session.pages().len(),
            page.image_url
        ),
        None => println!("{} (ch. {}) has no pages", chapter.title, chapter.chapter_number),
    }
}

fn stats(config: Config) {
    let (store, prefs) = local_profile(&config);
    let stats = ReadingStats::from_store(&store);

    println!("device:   {}", store.device());
    println!(
        "user:     {}",
        prefs.username().unwrap_or_else(|| "Reader".to_string())
    );
    println!("theme:    {}", prefs.theme());
    println!(
        "started {} | ongoing {} | completed {} | {}% done",
        stats.started,
        stats.ongoing,
        stats.completed,
        stats.completion_percent()
    );
    println!("chapters read: {}", stats.chapters_read);

    for (comic_id, entry) in store.comic_progress_map() {
        println!(
            "  {} chapter {}/{} ({}%)",
            comic_id,
            entry.last_chapter,
            entry.total_chapters,
            percent_complete(Some(&entry))
        );
    }
    if prefs.continue_enabled() {
        if let Some(pointer) = store.continue_pointer() {
            println!(
                "continue: chapter {} at page {}",
                pointer.chapter_id,
                pointer.page_index + 1
            );
        }
    }

    let badges = stats.unlocked_badges();
    if badges.is_empty() {
        println!("badges: none yet");
    }
    for badge in badges {
        println!("badge: {} - {}", badge.title, badge.description);
    }
}
