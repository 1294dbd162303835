mod config;
mod dispatch;
mod event;
mod hook;
mod hotkey;
mod key;
mod logging;
mod modules;
mod overlay;
mod paths;
mod platform;
mod ring_buffer;
mod workers;

use anyhow::Context;
use tokio::sync::mpsc;

use crate::dispatch::Dispatcher;
use crate::event::DaemonEvent;
use crate::hook::KeyPipeline;
use crate::modules::ModuleContext;
use crate::overlay::OverlayHost;
use crate::workers::Worker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Configuration ─────────────────────────────────────────────────────────
    let config_path = paths::config_file_path()?;
    let config = config::load_or_default(&config_path)?;
    logging::init(config.debug_logging);
    tracing::info!(
        config = %config_path.display(),
        "keyhud v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    // ── Overlay host ──────────────────────────────────────────────────────────
    let overlay = OverlayHost::spawn(platform::topology()).context("Failed to start overlay host")?;

    // ── Modules ───────────────────────────────────────────────────────────────
    let system = platform::System::default();
    let ctx = ModuleContext {
        worker: Worker::Runtime(tokio::runtime::Handle::current()),
        overlay: overlay.handle(),
        collaborators: &system,
    };
    let dispatcher = match modules::build(&config.effective_modules(), &ctx) {
        Ok(modules) => Dispatcher::new(modules),
        Err(e) => {
            overlay.stop();
            return Err(e.context("Failed to set up modules"));
        }
    };
    tracing::info!(modules = dispatcher.len(), "dispatch chain ready");

    // ── Keyboard hook ─────────────────────────────────────────────────────────
    let (event_tx, mut event_rx) = mpsc::channel::<DaemonEvent>(8);
    let hook = match hook::start(KeyPipeline::new(dispatcher), event_tx.clone()) {
        Ok(hook) => hook,
        Err(e) => {
            overlay.stop();
            return Err(e.context("Failed to install keyboard hook"));
        }
    };

    // Graceful shutdown on Ctrl+C.
    {
        let tx = event_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(DaemonEvent::Shutdown).await;
            }
        });
    }

    // ── Event loop ────────────────────────────────────────────────────────────
    while let Some(evt) = event_rx.recv().await {
        match evt {
            DaemonEvent::HookExited => {
                tracing::error!("keyboard hook stopped unexpectedly; exiting");
                break;
            }
            DaemonEvent::Shutdown => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    hook.stop();
    overlay.stop();
    Ok(())
}
