//! Application orchestrator: wires input, scheduler and terminal output.

use std::path::PathBuf;

use docdrop_upload::{UploadEvent, UploadScheduler, collect_sources};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::render;

/// Uploads `paths` and prints the results. Fails if any file failed.
pub async fn run(paths: Vec<PathBuf>, config: Config) -> anyhow::Result<()> {
    let sources = tokio::task::spawn_blocking(move || collect_sources(&paths)).await??;
    if sources.is_empty() {
        tracing::info!("nothing to upload");
        return Ok(());
    }

    let scheduler = UploadScheduler::new(&config.upload)?;
    let mut events = scheduler
        .take_events()
        .ok_or_else(|| anyhow::anyhow!("scheduler events already taken"))?;

    tokio::spawn(read_commands(scheduler.clone()));

    println!("Press Enter to pause or resume.");
    scheduler.submit(sources);

    let interrupted = tokio::select! {
        _ = print_events(&scheduler, &mut events) => false,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted, in-flight uploads are abandoned");
            true
        }
    };

    let snapshot = scheduler.snapshot();
    println!();
    println!("{}", render::render_table(&snapshot));

    if interrupted {
        anyhow::bail!("interrupted with {} file(s) unfinished", snapshot.summary.remaining());
    }
    if snapshot.summary.failed > 0 {
        anyhow::bail!("{} file(s) failed to upload", snapshot.summary.failed);
    }
    Ok(())
}

/// Prints announcements and progress until the batch finishes.
///
/// Events can be dropped when the buffer is full, so idleness is also
/// checked on the scheduler itself.
async fn print_events(scheduler: &UploadScheduler, events: &mut mpsc::Receiver<UploadEvent>) {
    loop {
        tokio::select! {
            biased;
            event = events.recv() => match event {
                Some(event) => {
                    if print_event(scheduler, event) {
                        break;
                    }
                }
                None => break,
            },
            _ = scheduler.wait_idle() => {
                while let Ok(event) = events.try_recv() {
                    print_event(scheduler, event);
                }
                break;
            }
        }
    }
}

/// Prints one event. Returns `true` once the batch has finished.
fn print_event(scheduler: &UploadScheduler, event: UploadEvent) -> bool {
    if let Some(text) = event.announcement() {
        println!("{text}");
    }
    match event {
        UploadEvent::Failed { key, error } => {
            tracing::debug!(file = %key, %error, "failure detail");
            println!("{}", render::status_line(&scheduler.snapshot()));
        }
        UploadEvent::Completed { .. } => {
            println!("{}", render::status_line(&scheduler.snapshot()));
        }
        UploadEvent::BatchFinished { .. } => return true,
        _ => {}
    }
    false
}

/// Toggles pause on each stdin line (`pause`/`resume` are also accepted).
async fn read_commands(scheduler: UploadScheduler) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match line.trim() {
                "pause" | "p" => {
                    scheduler.pause();
                }
                "resume" | "r" => {
                    scheduler.resume();
                }
                "" => {
                    scheduler.toggle_pause();
                }
                other => println!("unknown command {other:?}, use pause or resume"),
            },
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "stdin closed");
                break;
            }
        }
    }
}
