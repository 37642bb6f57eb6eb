use anyhow::Result;
use std::thread;
use tokio::sync::mpsc::Sender;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// SIGHUP: drop everything and locate the chat again
    Reinitialize,
    /// SIGINT / SIGTERM
    Shutdown,
}

/// Spawn a background thread that turns process signals into `Control` commands
#[cfg(unix)]
pub fn spawn_listener(sender: Sender<Control>) -> Result<thread::JoinHandle<()>> {
    use anyhow::Context;
    use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGHUP, SIGINT, SIGTERM]).context("Failed to register signal handlers")?;

    let handle = thread::spawn(move || {
        info!("Signal listener started");
        for signal in signals.forever() {
            let command = match signal {
                SIGHUP => Control::Reinitialize,
                _ => Control::Shutdown,
            };
            debug!(signal, command = ?command, "Received signal");
            if sender.blocking_send(command).is_err() || command == Control::Shutdown {
                break;
            }
        }
    });
    Ok(handle)
}

#[cfg(not(unix))]
pub fn spawn_listener(_sender: Sender<Control>) -> Result<thread::JoinHandle<()>> {
    info!("Signal handling unavailable on this platform");
    Ok(thread::spawn(|| {}))
}
