// src/main.rs

use advisor::config::AdvisorConfig;
use advisor::convergence::{ConvergenceServer, ReplicaAgent, publish_version};
use advisor::resolver;
use advisor::snapshot::{ArtifactFetcher, ModuleStream, SnapshotStore};
use advisor::{Error, UpdatesRequest};
use anyhow::{Context, Result};
use chrono::DateTime;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

mod cli;

use cli::{Cli, Commands, View};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = AdvisorConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Convergence { bind } => {
            let mut server_config = config.convergence.to_server_config();
            if let Some(bind) = bind {
                server_config.bind_addr = bind;
            }
            let server = ConvergenceServer::new(server_config);
            server.run().await?;
            Ok(())
        }

        Commands::Replica {
            server,
            dump,
            remote_url,
        } => {
            let dump_path = dump.unwrap_or_else(|| config.cache.dump_path.clone());
            let remote_url = remote_url.unwrap_or_else(|| config.cache.remote_url.clone());
            let server_addr = server.unwrap_or_else(|| config.replica.server_addr.clone());

            let store = Arc::new(SnapshotStore::new());
            // A missing snapshot at startup leaves the replica "not
            // ready"; it loads one on the first refresh round.
            match store.load_from(&dump_path) {
                Ok(version) => {
                    info!("Serving snapshot version {}", version.to_rfc3339());
                }
                Err(e) => warn!("No snapshot loaded at startup: {}", e),
            }

            let fetcher = Arc::new(ArtifactFetcher::new(remote_url, dump_path)?);
            let agent = ReplicaAgent::new(server_addr, store, fetcher)
                .with_reconnect_delay(Duration::from_secs(config.replica.reconnect_delay_secs));
            agent.run().await?;
            Ok(())
        }

        Commands::Fetch { remote_url, dump } => {
            let dump_path = dump.unwrap_or_else(|| config.cache.dump_path.clone());
            let remote_url = remote_url.unwrap_or_else(|| config.cache.remote_url.clone());

            let store = SnapshotStore::new();
            let fetcher = ArtifactFetcher::new(remote_url, dump_path)?;
            let outcome = store.refresh(&fetcher).await?;
            println!("{outcome:?}");
            Ok(())
        }

        Commands::Resolve {
            packages,
            dump,
            repositories,
            releasever,
            basearch,
            modules,
            security_only,
            latest_only,
            view,
        } => {
            let dump_path = dump.unwrap_or_else(|| config.cache.dump_path.clone());
            let request = UpdatesRequest {
                packages,
                repositories: (!repositories.is_empty()).then_some(repositories),
                releasever,
                basearch,
                modules: (!modules.is_empty()).then(|| {
                    modules
                        .into_iter()
                        .map(|(module, stream)| ModuleStream { module, stream })
                        .collect()
                }),
                security_only,
                latest_only,
            };
            resolve_and_print(&dump_path, &request, view)
        }

        Commands::Notify { server, version } => {
            let server_addr = server.unwrap_or_else(|| config.replica.server_addr.clone());
            let version = DateTime::parse_from_rfc3339(&version)
                .context("version must be an RFC 3339 timestamp")?
                .to_utc();
            publish_version(&server_addr, version).await?;
            info!("Announced snapshot version {}", version.to_rfc3339());
            Ok(())
        }
    }
}

fn resolve_and_print(dump_path: &Path, request: &UpdatesRequest, view: View) -> Result<()> {
    let store = SnapshotStore::new();
    store.load_from(dump_path)?;
    let snapshot = store.current().ok_or(Error::NotReady)?;
    store.metrics().record_query();

    let rendered = match view {
        View::Updates => serde_json::to_string_pretty(&resolver::updates(&snapshot, request))?,
        View::Vulnerabilities => {
            serde_json::to_string_pretty(&resolver::vulnerabilities(&snapshot, request))?
        }
        View::Patches => serde_json::to_string_pretty(&resolver::patches(&snapshot, request))?,
    };
    println!("{rendered}");
    Ok(())
}
