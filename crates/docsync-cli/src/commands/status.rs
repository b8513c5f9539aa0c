//! Status command handler

use anyhow::{Context, Result};

use docsync_core::StateStore;

use super::Engine;
use crate::output::{Output, OutputFormat};

/// Show status information
pub fn show(engine: &Engine, output: &Output) -> Result<()> {
    let config = &engine.config;
    let state = engine.connection.state();
    let reachable = config.remote_dir.as_ref().map(|dir| dir.is_dir());
    let pending = engine
        .state
        .pending_snapshot()
        .context("Failed to read the pending snapshot")?;

    match output.format {
        OutputFormat::Json => {
            let pending_json = pending.as_ref().map(|doc| {
                serde_json::json!({
                    "identity": doc.identity,
                    "name": doc.identity_name,
                    "saved_at": doc.local_saved_at,
                    "remote_id": doc.remote_id,
                    "size": doc.content.len(),
                })
            });
            println!(
                "{}",
                serde_json::json!({
                    "connection": state,
                    "sync_enabled": config.sync_enabled,
                    "remote_dir": config.remote_dir,
                    "remote_reachable": reachable,
                    "data_dir": config.data_dir,
                    "pending": pending_json,
                    "sync": config.sync,
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", state);
        }
        OutputFormat::Human => {
            println!("docsync Status");
            println!("==============");
            println!();
            println!("Connection: {}", state);
            println!();
            println!("Sync:");
            println!(
                "  Status: {}",
                if config.sync_enabled {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            match (&config.remote_dir, reachable) {
                (Some(dir), Some(true)) => println!("  Target: {}", dir.display()),
                (Some(dir), _) => println!("  Target: {} (unreachable)", dir.display()),
                (None, _) => println!("  Target: (not set)"),
            }
            println!(
                "  Debounce: {}ms, conflict threshold: {}ms, attempts: {}",
                config.sync.debounce_ms,
                config.sync.conflict_threshold_ms,
                config.sync.max_attempts
            );
            println!();
            println!("Storage:");
            println!("  Location: {}", config.data_dir.display());
            println!();
            match pending {
                Some(doc) => {
                    println!("Pending snapshot:");
                    println!("  Document: {} ({})", doc.identity_name, doc.identity);
                    println!(
                        "  Saved:    {}",
                        doc.local_saved_at.format("%Y-%m-%d %H:%M:%S UTC")
                    );
                    println!();
                    println!("Run 'docsync retry' to push it.");
                }
                None => println!("Pending snapshot: none"),
            }
        }
    }

    Ok(())
}
