//! Status command handler

use anyhow::Result;

use chainlist_core::{abbreviate_identity, Backend, Config, Outcome, SyncError};

use crate::backend;
use crate::output::{Output, OutputFormat};

/// Show backend, identity and list status
///
/// Connection problems are reported, not returned as errors.
pub async fn show(config: &Config, output: &Output) -> Result<()> {
    let sync = backend::synchronizer(config)?;
    let connection: Result<(), SyncError> = match sync.connect().await {
        Ok(Outcome::Unrefreshed(e)) | Err(e) => Err(e),
        Ok(_) => Ok(()),
    };

    let view = sync.view();
    let snapshot = &view.snapshot;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "backend": config.backend,
                    "rpc_url": (config.backend == Backend::Rpc).then_some(&config.rpc_url),
                    "contract_address": config.contract_address,
                    "connected": view.connected,
                    "identity": view.identity,
                    "error": connection.as_ref().err().map(|e| e.to_string()),
                    "list": {
                        "version": snapshot.version(),
                        "fetched_at": snapshot.fetched_at(),
                        "active": view.active_count,
                        "completed": view.completed_count,
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", view.identity.as_deref().unwrap_or("disconnected"));
        }
        OutputFormat::Human => {
            println!("chainlist Status");
            println!("================");
            println!();
            println!("Backend:");
            println!("  Type:     {}", config.backend);
            match config.backend {
                Backend::Local => {
                    println!("  Ledger:   {}", config.ledger_path().display());
                }
                Backend::Rpc => {
                    println!("  Node:     {}", config.rpc_url);
                    println!(
                        "  Contract: {}",
                        config.contract_address.as_deref().unwrap_or("(not set)")
                    );
                }
            }
            println!();
            println!("Identity:");
            match (&view.identity, &connection) {
                (Some(identity), _) => println!("  Account:  {}", abbreviate_identity(identity)),
                (None, Err(e)) => println!("  Not connected: {}", e),
                (None, Ok(())) => println!("  Not connected"),
            }
            if let (Some(_), Err(e)) = (&view.identity, &connection) {
                println!("  Warning:  {}", e);
            }
            println!();
            println!("List:");
            println!("  Active:    {}", view.active_count);
            println!("  Completed: {}", view.completed_count);
            if let Some(fetched_at) = snapshot.fetched_at() {
                println!(
                    "  Read at:   {}",
                    fetched_at.format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
        }
    }

    Ok(())
}
