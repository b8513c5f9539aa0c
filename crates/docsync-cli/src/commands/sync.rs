//! Sync command handlers
//!
//! `push` syncs one file immediately, `watch` follows a file and syncs it
//! after every save, and `retry` pushes the snapshot left in the durable
//! pending slot by an earlier failure.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch as watch_channel};
use tracing::{debug, warn};

use docsync_core::{
    ConflictChoice, DocumentIdentity, StateStore, SyncCoordinator, SyncEvent, SyncStatus,
};

use super::Engine;
use crate::documents::{modified_time, TrackedDocument};
use crate::output::{truncate, Output};

const NAME_WIDTH: usize = 48;

/// Sync one file now
pub async fn push(
    engine: &Engine,
    file: &Path,
    resolve: Option<ConflictChoice>,
    output: &Output,
) -> Result<()> {
    engine.require_ready()?;

    let tracked = engine.index.track(file)?;
    let doc = tracked.snapshot()?;

    let mut settings = engine.config.sync_settings();
    if let Some(choice) = resolve {
        settings.conflict_policy = choice.into();
    }
    let coordinator = engine.coordinator(settings);
    let mut events = take_events(&coordinator)?;

    output.message(&format!("Pushing {}...", tracked.path.display()));
    coordinator.perform_sync(doc).await;
    drain_events(engine, &mut events, output)?;

    report(
        &coordinator,
        &tracked.identity,
        &tracked.path.display().to_string(),
        output,
    )
}

/// Push the snapshot held in the durable pending slot
pub async fn retry(engine: &Engine, output: &Output) -> Result<()> {
    engine.require_ready()?;

    let Some(pending) = engine.state.pending_snapshot()? else {
        output.message("Nothing pending");
        return Ok(());
    };
    let label = engine
        .index
        .get(&pending.identity)?
        .map(|tracked| tracked.path.display().to_string())
        .unwrap_or_else(|| pending.identity_name.clone());

    let coordinator = engine.coordinator(engine.config.sync_settings());
    let mut events = take_events(&coordinator)?;

    output.message(&format!("Retrying {}...", label));
    coordinator.resume_pending().await;
    drain_events(engine, &mut events, output)?;

    report(&coordinator, &pending.identity, &label, output)
}

/// Follow a file and sync it after every save until interrupted
///
/// Conflicts are resolved by typing `local`, `remote` or `both` on stdin.
pub async fn watch(engine: &Engine, file: &Path, interval_ms: u64, output: &Output) -> Result<()> {
    engine.require_ready()?;

    let tracked = engine.index.track(file)?;
    let coordinator = engine.coordinator(engine.config.sync_settings());
    let mut events = take_events(&coordinator)?;

    let target = engine.config.remote_dir.clone().unwrap_or_default();
    let (online_tx, online_rx) = watch_channel::channel(target.is_dir());
    let listener = coordinator.spawn_connectivity_listener(online_rx);
    coordinator.resume_pending().await;

    let mut last_seen = modified_time(&tracked.path)?;
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(50)));
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    output.message(&format!(
        "Watching {} (Ctrl-C to stop)",
        tracked.path.display()
    ));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let reachable = target.is_dir();
                online_tx.send_if_modified(|online| {
                    if *online == reachable {
                        return false;
                    }
                    *online = reachable;
                    true
                });

                match modified_time(&tracked.path) {
                    Ok(modified) if modified != last_seen => {
                        last_seen = modified;
                        let current = engine
                            .index
                            .get(&tracked.identity)?
                            .unwrap_or_else(|| tracked.clone());
                        if coordinator.queue_sync(&current.snapshot()?) {
                            debug!("Queued {} after save", current.path.display());
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!("{:#}", e),
                }
            }
            Some(event) = events.recv() => {
                handle_event(engine, &event, output)?;
                if let SyncEvent::RemotePulled { identity, .. } = &event {
                    if *identity == tracked.identity {
                        // Our own write is not a new save
                        last_seen = modified_time(&tracked.path)?;
                    }
                }
            }
            line = stdin.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => resolve_from_input(&coordinator, line.trim(), output),
                    Ok(None) | Err(_) => stdin_open = false,
                }
            }
            _ = &mut shutdown => break,
        }
    }

    output.message("Stopping...");
    coordinator.flush().await;
    drain_events(engine, &mut events, output)?;
    listener.abort();

    Ok(())
}

fn take_events(coordinator: &SyncCoordinator) -> Result<mpsc::UnboundedReceiver<SyncEvent>> {
    coordinator
        .take_events()
        .context("Sync event stream already taken")
}

fn drain_events(
    engine: &Engine,
    events: &mut mpsc::UnboundedReceiver<SyncEvent>,
    output: &Output,
) -> Result<()> {
    while let Ok(event) = events.try_recv() {
        handle_event(engine, &event, output)?;
    }
    Ok(())
}

/// Apply an engine event to the tracked files
pub fn handle_event(engine: &Engine, event: &SyncEvent, output: &Output) -> Result<()> {
    match event {
        SyncEvent::StatusChanged { identity, status } => {
            debug!("Status of {:?}: {}", identity, status);
        }
        SyncEvent::Synced {
            identity,
            remote_id,
        } => {
            if !engine.index.bind(identity, remote_id)? {
                debug!("Synced untracked document {}", identity);
            }
        }
        SyncEvent::ConflictDetected(info) => {
            output.warning(&format!(
                "Conflict on {}: saved locally {}, changed remotely {}",
                truncate(&info.identity_name, NAME_WIDTH),
                info.local_saved_at.format("%Y-%m-%d %H:%M:%S"),
                info.remote_modified_time.format("%Y-%m-%d %H:%M:%S"),
            ));
        }
        SyncEvent::RemotePulled {
            identity, content, ..
        } => {
            let Some(tracked) = engine.index.get(identity)? else {
                debug!("Pulled untracked document {}", identity);
                return Ok(());
            };
            fs::write(&tracked.path, content)
                .with_context(|| format!("Failed to write {}", tracked.path.display()))?;
            output.message(&format!(
                "Replaced {} with the remote copy",
                tracked.path.display()
            ));
        }
        SyncEvent::Forked { original, fork } => {
            let Some(tracked) = engine.index.get(original)? else {
                warn!("Forked untracked document {}", original);
                return Ok(());
            };
            let path = tracked.path.with_file_name(&fork.identity_name);
            fs::write(&path, &fork.content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            let path = path
                .canonicalize()
                .with_context(|| format!("Failed to resolve {}", path.display()))?;

            output.message(&format!("Kept local changes in {}", path.display()));
            engine.index.save(&TrackedDocument {
                identity: fork.identity.clone(),
                path,
                remote_id: None,
            })?;
        }
        SyncEvent::Error { identity, message } => match identity {
            Some(identity) => output.warning(&format!("Sync of {} failed: {}", identity, message)),
            None => output.warning(&format!("Sync failed: {}", message)),
        },
    }
    Ok(())
}

fn resolve_from_input(coordinator: &SyncCoordinator, line: &str, output: &Output) {
    if line.is_empty() {
        return;
    }
    let choice = match line.parse::<ConflictChoice>() {
        Ok(choice) => choice,
        Err(e) => {
            output.warning(&e.to_string());
            return;
        }
    };
    let Some(conflict) = coordinator.pending_conflicts().into_iter().next() else {
        output.warning("No conflict is waiting for a decision");
        return;
    };
    match coordinator.resolve_conflict(&conflict.identity, choice) {
        Ok(()) => output.message(&format!(
            "Resolving {} with '{}'",
            truncate(&conflict.identity_name, NAME_WIDTH),
            choice
        )),
        Err(e) => output.warning(&e.to_string()),
    }
}

fn report(
    coordinator: &SyncCoordinator,
    identity: &DocumentIdentity,
    label: &str,
    output: &Output,
) -> Result<()> {
    match coordinator.document_status(identity) {
        SyncStatus::Synced | SyncStatus::Idle => {
            output.success(&format!("Synced {}", label));
            Ok(())
        }
        SyncStatus::Conflict => bail!(
            "{} changed both locally and remotely. Choose which copy to keep:\n  \
             docsync push {} --resolve local|remote|both",
            label,
            label
        ),
        SyncStatus::Offline => bail!(
            "Target is unreachable. The snapshot of {} is kept; push it later with:\n  \
             docsync retry",
            label
        ),
        SyncStatus::Error => bail!(
            "Sync of {} failed. The snapshot is kept; push it later with:\n  \
             docsync retry",
            label
        ),
        SyncStatus::Syncing => bail!("Sync of {} is still in progress", label),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use docsync_core::Config;
    use tempfile::TempDir;

    fn engine(temp_dir: &TempDir) -> Engine {
        let config = Config {
            data_dir: temp_dir.path().join("data"),
            sync_enabled: true,
            remote_dir: Some(temp_dir.path().join("remote")),
            ..Config::default()
        };
        let engine = Engine::open(&config).unwrap();
        engine.connection.initialize(true, true);
        engine
    }

    fn write_file(temp_dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = temp_dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_push_binds_document() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("remote")).unwrap();
        let engine = engine(&temp_dir);
        let file = write_file(&temp_dir, "notes.md", "hello");
        let output = Output::new(OutputFormat::Quiet);

        push(&engine, &file, None, &output).await.unwrap();

        let tracked = engine.index.track(&file).unwrap();
        assert!(tracked.remote_id.is_some());
        assert!(engine.state.pending_snapshot().unwrap().is_none());

        // A second push updates the same remote object
        fs::write(&file, "hello again").unwrap();
        push(&engine, &file, None, &output).await.unwrap();
        assert_eq!(engine.index.track(&file).unwrap().remote_id, tracked.remote_id);
    }

    #[tokio::test]
    async fn test_push_to_unreachable_target_keeps_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine(&temp_dir);
        let file = write_file(&temp_dir, "notes.md", "hello");
        let output = Output::new(OutputFormat::Quiet);

        let err = push(&engine, &file, None, &output).await.unwrap_err();
        assert!(err.to_string().contains("unreachable"));

        let pending = engine.state.pending_snapshot().unwrap().unwrap();
        assert_eq!(pending.content, b"hello");

        // Target comes back
        fs::create_dir_all(temp_dir.path().join("remote")).unwrap();
        retry(&engine, &output).await.unwrap();

        assert!(engine.state.pending_snapshot().unwrap().is_none());
        assert!(engine.index.track(&file).unwrap().remote_id.is_some());
    }

    #[tokio::test]
    async fn test_retry_with_nothing_pending() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine(&temp_dir);
        retry(&engine, &Output::new(OutputFormat::Quiet))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_push_requires_ready() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine(&temp_dir);
        engine.connection.initialize(false, false);
        let file = write_file(&temp_dir, "notes.md", "hello");

        let err = push(&engine, &file, None, &Output::new(OutputFormat::Quiet))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Not signed in"));
    }

    #[test]
    fn test_forked_event_writes_conflict_copy() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine(&temp_dir);
        let file = write_file(&temp_dir, "notes.md", "mine");
        let tracked = engine.index.track(&file).unwrap();
        let fork = tracked.snapshot().unwrap().fork();

        handle_event(
            &engine,
            &SyncEvent::Forked {
                original: tracked.identity.clone(),
                fork: fork.clone(),
            },
            &Output::new(OutputFormat::Quiet),
        )
        .unwrap();

        let copy = temp_dir.path().join(&fork.identity_name);
        assert_eq!(fs::read_to_string(&copy).unwrap(), "mine");
        let indexed = engine.index.get(&fork.identity).unwrap().unwrap();
        assert_eq!(indexed.path, copy.canonicalize().unwrap());
    }

    #[test]
    fn test_remote_pulled_event_overwrites_file() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine(&temp_dir);
        let file = write_file(&temp_dir, "notes.md", "mine");
        let tracked = engine.index.track(&file).unwrap();

        handle_event(
            &engine,
            &SyncEvent::RemotePulled {
                identity: tracked.identity.clone(),
                remote_id: docsync_core::RemoteId::new("r-1"),
                content: b"theirs".to_vec(),
                modified_time: chrono::Utc::now(),
            },
            &Output::new(OutputFormat::Quiet),
        )
        .unwrap();

        assert_eq!(fs::read_to_string(&file).unwrap(), "theirs");
    }
}
