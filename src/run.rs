//! The event loop
//!
//! One cooperative loop on a current-thread runtime. The only wake-up sources
//! are inbound bridge messages, control signals and the session's next
//! deadline; every handler runs to completion before the loop waits again.

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::PathBuf;
use std::time::Instant;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bridge::{self, BridgeReply, BridgeWriter, Inbound};
use crate::config::{JsonFileStore, load_settings, save_settings};
use crate::constants;
use crate::overlay::{ContentMeasure, Outbox, TextMeasurer};
use crate::session::{Action, Session};
use crate::signals;

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub settings_path: PathBuf,
    /// Replay a recorded frame stream instead of reading stdin
    pub input: Option<PathBuf>,
    pub seed: Option<u64>,
    pub font: Option<String>,
}

pub async fn run(options: RunOptions) -> Result<()> {
    let store = JsonFileStore::new(&options.settings_path);
    info!(path = %store.path().display(), "Using settings store");
    let settings = load_settings(&store).await;

    let measurer = TextMeasurer::load(options.font.as_deref());
    let rng = match options.seed {
        Some(seed) => {
            info!(seed, "Using fixed layout seed");
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };
    let mut session = Session::new(settings.clone(), Outbox::new(), measurer, rng)?;

    let mut writer = BridgeWriter::new(tokio::io::stdout());
    writer.send(&BridgeReply::SettingsLoaded { settings }).await?;
    writer.flush().await?;

    let (inbound_tx, mut inbound) = mpsc::channel(constants::bridge::INBOUND_QUEUE);
    let _reader = match &options.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open replay input {}", path.display()))?;
            info!(path = %path.display(), "Replaying recorded input");
            bridge::spawn_reader(file, inbound_tx)
        }
        None => bridge::spawn_reader(tokio::io::stdin(), inbound_tx),
    };

    let (control_tx, mut control) = mpsc::channel(8);
    let _signals = signals::spawn_listener(control_tx)
        .inspect_err(|e| warn!(error = ?e, "Signal handling disabled"))
        .ok();

    session.start(Instant::now());

    loop {
        flush_render(&mut session, &mut writer).await?;

        let deadline = session.next_deadline();
        let action = tokio::select! {
            received = inbound.recv() => match received {
                Some(Inbound::Message(message)) => session.handle_message(message, Instant::now()),
                Some(Inbound::Closed) | None => Action::Shutdown,
            },
            Some(command) = control.recv() => session.handle_control(command, Instant::now()),
            _ = sleep_until(deadline) => {
                session.tick(Instant::now());
                Action::None
            }
        };

        match action {
            Action::None => {}
            Action::Pong => {
                writer.send(&BridgeReply::Pong).await?;
                writer.flush().await?;
            }
            Action::Persist(settings) => save_settings(&store, &settings).await,
            Action::Shutdown => break,
        }
    }

    flush_render(&mut session, &mut writer).await?;
    info!(visible = session.overlay().len(), state = ?session.ingest_state(), "Shutting down");
    Ok(())
}

async fn flush_render<M, W>(session: &mut Session<Outbox, M>, writer: &mut BridgeWriter<W>) -> Result<()>
where
    M: ContentMeasure,
    W: AsyncWrite + Unpin,
{
    let commands = session.surface_mut().drain();
    if commands.is_empty() {
        return Ok(());
    }
    debug!(count = commands.len(), "Sending render commands");
    for command in commands {
        writer.send(&BridgeReply::Render(command)).await?;
    }
    writer.flush().await
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
