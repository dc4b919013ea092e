//! # Example: bootstrap
//!
//! Boots a pretend cluster node the way an agent would:
//! write config, launch the master, then launch a worker.
//!
//! Shows how to:
//! - Queue a control step and external commands on an [`Orchestrator`].
//! - Attach the built-in [`LogWriter`] and a `tracing` subscriber.
//! - Turn the sequence outcome into the process exit code.
//!
//! ## Flow
//! ```text
//! write-config (ActionStep) ──► master (sh) ──► worker (sh)
//!                                 └─ exits non-zero? sequence fails, worker never starts
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example bootstrap
//! MASTER_EXIT=3 cargo run --example bootstrap
//! ```

use std::sync::Arc;

use seqvisor::{ActionStep, Config, LogWriter, Orchestrator, ProviderRole, Subscribe, command_line};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let master_exit = std::env::var("MASTER_EXIT").unwrap_or_else(|_| "0".to_string());
    let cfg = Config::default().with_property("cluster.name", "demo");

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let orch = Orchestrator::builder(cfg.clone())
        .with_name("bootstrap")
        .with_subscribers(subs)
        .with_roles(vec![ProviderRole::new("master", 1), ProviderRole::new("worker", 2)])
        .build();

    let cluster = cfg.get_or("cluster.name", "unnamed").to_string();
    let write_config = ActionStep::from_fn("write-config", orch.bus().clone(), move |_ctx: CancellationToken| {
        let cluster = cluster.clone();
        async move {
            tracing::info!(cluster = %cluster, "rendering site configuration");
            Ok(())
        }
    });
    orch.queue(write_config.into())?;

    for role in ["master", "worker"] {
        if !orch.is_supported_role(role) {
            continue;
        }
        let script = match role {
            "master" => format!("echo master up; sleep 1; exit {master_exit}"),
            _ => "echo worker up; sleep 1".to_string(),
        };
        let argv = ["sh".to_string(), "-c".to_string(), script];
        tracing::info!(role, command = %command_line(&argv), "queueing");
        orch.queue_command(role, [("ROLE", role)], argv)?;
    }

    let code = orch.run().await?;
    for (key, value) in orch.status() {
        println!("{key:<20} {value}");
    }
    std::process::exit(code);
}
