use std::path::PathBuf;

use clap::Parser;
use eyre::Result;
use log::{debug, info};

use tubepost::config::Config;
use tubepost::server::AppState;

mod cli;

use cli::{Cli, Command};

fn setup_logging() -> Result<()> {
    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("tubepost.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tubepost")
        .join("logs")
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    let cli = Cli::parse();

    // Load config file (non-fatal if missing/invalid)
    let mut config = Config::load().unwrap_or_default();

    // CLI flags take priority
    if let Some(dir) = cli.posts_dir.clone() {
        config.posts_dir = Some(dir);
    }

    if cli.verbose {
        let config_path = tubepost::config::config_path();
        if config_path.exists() {
            eprintln!("Config: {}", config_path.display());
        }
        eprintln!("Posts: {}", config.posts_dir().display());
        eprintln!("Logs: {}", log_dir().join("tubepost.log").display());
    }

    match cli.command {
        Command::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind = Some(bind);
            }
            let bind = config.bind();
            let state = AppState::from_config(&config)?;
            eprintln!("Serving on http://{bind}");
            tubepost::server::serve(state, &bind).await?;
        }
        Command::Generate {
            url,
            provider,
            publish,
            output,
        } => {
            let state = AppState::from_config(&config)?;
            let summarizer = state.summarizer(provider.as_deref());
            debug!("Using provider {}", summarizer.provider());

            let post = tubepost::generate::generate_post(
                state.source.as_ref(),
                &summarizer,
                &url,
                state.summary_concurrency,
            )
            .await?;

            if cli.verbose {
                eprintln!(
                    "Video: {}\nProvider: {}\nCaptions: {}{}\nTimestamps: {}\nSections: {}\nDescription: {}",
                    post.video_id,
                    post.meta.ai_provider,
                    post.meta.captions_count,
                    if post.meta.used_mock_data { " (example data)" } else { "" },
                    post.meta.timestamps_count,
                    post.meta.groups_count,
                    post.description,
                );
            }

            if let Some(ref path) = output {
                std::fs::write(path, &post.markdown)?;
                if cli.verbose {
                    eprintln!("Output written to: {}", path.display());
                }
            } else {
                println!("{}", post.markdown);
            }

            if publish {
                let filename = state
                    .store
                    .publish(&post.markdown, &post.video_id, Some(&post.description))?;
                eprintln!("Published: {}", state.store.dir().join(filename).display());
            }
        }
        Command::Posts => {
            let store = tubepost::posts::PostStore::new(config.posts_dir());
            for post in store.list()? {
                println!("{}  {}  {}", post.date, post.video_id, post.title);
            }
        }
    }

    Ok(())
}
