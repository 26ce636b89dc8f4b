use anyhow::{bail, Context, Result};
use clap::Parser;
use clip_bot::bot::telegram::{self, TelegramMessenger};
use clip_bot::{spawn_sweeper, Config, Dispatcher, Ffmpeg, Pipeline, ScratchDir, Sessions};
use std::sync::Arc;
use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Parser)]
#[command(version, about = "Telegram bot for video samples, audio trimming and audio merging")]
struct Args {
    /// Configuration file (extension optional)
    #[arg(long, default_value = "config/clip-bot")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    if cfg.telegram.token.is_empty() {
        bail!(
            "No bot token configured. Build with CLIP_BOT_TOKEN set or provide CLIP_BOT__TELEGRAM__TOKEN"
        );
    }

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let bot = Bot::new(&cfg.telegram.token);
    let me = bot
        .get_me()
        .await
        .context("Failed to initialize Telegram transport")?;
    info!(
        "Authorized on account {}",
        me.user.username.as_deref().unwrap_or("<unnamed>")
    );

    let scratch_dir = cfg.scratch_dir();
    tokio::fs::create_dir_all(&scratch_dir)
        .await
        .with_context(|| format!("Failed to create scratch dir {}", scratch_dir.display()))?;
    info!("Scratch files go to {}", scratch_dir.display());

    let messenger = Arc::new(TelegramMessenger::new(bot.clone()));
    let pipeline = Pipeline::new(
        messenger.clone(),
        ScratchDir::new(scratch_dir, messenger.clone()),
        Arc::new(Ffmpeg::new(cfg.media.ffmpeg_path.clone())),
        cfg.jobs.max_concurrent,
    )
    .with_sample_secs(cfg.media.sample_secs);

    let sessions = Sessions::new();
    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(
        sessions.clone(),
        cfg.sessions.sweep_interval(),
        cfg.sessions.max_age(),
        shutdown.clone(),
    );

    let dispatcher = Dispatcher::new(messenger, sessions, pipeline);
    telegram::run(bot, Arc::clone(&dispatcher)).await;

    info!("Shutting down");
    shutdown.cancel();
    dispatcher.shutdown().await;
    sweeper.await.context("Session sweeper panicked")?;

    Ok(())
}
