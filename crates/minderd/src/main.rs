//! minderd - The minder background service
//!
//! This is the main entry point for the minderd service.
//! It wires together all the components:
//! - Configuration loading (profiles, items, limits, device credentials)
//! - Usage ledger
//! - Sync bus server
//!
//! Sessions themselves run on the surfaces; the daemon is the single
//! authority for recorded usage and the fan-out point for sync events.

use anyhow::{Context, Result};
use clap::Parser;
use minder_api::{
    API_VERSION, ClientInfo, Command, ErrorCode, ErrorInfo, Frame, Response, ResponsePayload,
    SyncEvent,
};
use minder_config::{Catalog, load_config};
use minder_ledger::{Ledger, SqliteLedger};
use minder_sync::{ServerMessage, SyncServer};
use minder_util::{ClientId, RateLimiter, default_config_path};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// minderd - Screen-time ledger and sync service
#[derive(Parser, Debug)]
#[command(name = "minderd")]
#[command(about = "Screen-time ledger and sync service", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/minderd/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set MINDER_SOCKET env var)
    #[arg(short, long, env = "MINDER_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set MINDER_DATA_DIR env var)
    #[arg(short, long, env = "MINDER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Main service state
struct Service {
    catalog: Arc<Catalog>,
    ledger: Arc<dyn Ledger>,
    sync: Arc<SyncServer>,
    rate_limiter: RateLimiter,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        // Load configuration
        let catalog = load_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(
            config_path = %args.config.display(),
            profile_count = catalog.profiles.len(),
            item_count = catalog.items.len(),
            "Configuration loaded"
        );

        // Determine paths
        let socket_path = args
            .socket
            .clone()
            .unwrap_or_else(|| catalog.service.socket_path.clone());

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| catalog.service.data_dir.clone());

        // Create data directory
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        // Initialize ledger
        let db_path = data_dir.join("ledger.db");
        let ledger: Arc<dyn Ledger> = Arc::new(
            SqliteLedger::open(&db_path)
                .with_context(|| format!("Failed to open ledger {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Ledger initialized");

        // Initialize sync server
        let mut sync = SyncServer::new(&socket_path);
        sync.start().await?;

        info!(socket_path = %socket_path.display(), "Sync server started");

        // Rate limiter: 30 requests per second per client
        let rate_limiter = RateLimiter::new(30, Duration::from_secs(1));

        Ok(Self {
            catalog: Arc::new(catalog),
            ledger,
            sync: Arc::new(sync),
            rate_limiter,
        })
    }

    async fn run(self) -> Result<()> {
        let sync = self.sync.clone();
        let mut messages = sync
            .take_message_receiver()
            .await
            .expect("Message receiver should be available");

        let catalog = self.catalog.clone();
        let ledger = self.ledger.clone();
        let rate_limiter = Arc::new(Mutex::new(self.rate_limiter));

        // Spawn accept task
        let sync_accept = sync.clone();
        tokio::spawn(async move {
            if let Err(e) = sync_accept.run().await {
                error!(error = %e, "Sync server error");
            }
        });

        // Set up signal handlers
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                Some(msg) = messages.recv() => {
                    Self::handle_message(&catalog, &ledger, &sync, &rate_limiter, msg).await;
                }
            }
        }

        info!("Shutting down minderd");
        sync.shutdown();
        info!("Shutdown complete");

        Ok(())
    }

    async fn handle_message(
        catalog: &Arc<Catalog>,
        ledger: &Arc<dyn Ledger>,
        sync: &Arc<SyncServer>,
        rate_limiter: &Arc<Mutex<RateLimiter>>,
        msg: ServerMessage,
    ) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                // Rate limiting
                {
                    let mut limiter = rate_limiter.lock().await;
                    if !limiter.check(&client_id) {
                        let response = Response::error(
                            request.request_id,
                            ErrorInfo::new(ErrorCode::RateLimited, "Too many requests"),
                        );
                        let _ = sync.send_response(&client_id, response).await;
                        return;
                    }
                }

                if request.api_version != API_VERSION {
                    let response = Response::error(
                        request.request_id,
                        ErrorInfo::new(
                            ErrorCode::InvalidRequest,
                            format!("Unsupported API version {}", request.api_version),
                        ),
                    );
                    let _ = sync.send_response(&client_id, response).await;
                    return;
                }

                let response = Self::handle_command(
                    catalog,
                    ledger,
                    sync,
                    &client_id,
                    request.request_id,
                    request.command,
                )
                .await;

                let _ = sync.send_response(&client_id, response).await;
            }

            ServerMessage::ClientConnected { client_id } => {
                debug!(client_id = %client_id, "Client connected, awaiting Hello");
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");

                let mut limiter = rate_limiter.lock().await;
                limiter.remove_client(&client_id);
            }
        }
    }

    async fn handle_command(
        catalog: &Arc<Catalog>,
        ledger: &Arc<dyn Ledger>,
        sync: &Arc<SyncServer>,
        client_id: &ClientId,
        request_id: u64,
        command: Command,
    ) -> Response {
        // Hello is the only command an unauthenticated connection may send
        if let Command::Hello { device_token } = &command {
            return match catalog.resolve_token(device_token) {
                Some(cred) => {
                    info!(
                        client_id = %client_id,
                        device_id = %cred.device_id,
                        role = ?cred.role,
                        "Device authenticated"
                    );
                    sync.authenticate(
                        client_id,
                        ClientInfo {
                            client_id: client_id.clone(),
                            device_id: cred.device_id.clone(),
                            role: cred.role,
                        },
                    )
                    .await;
                    Response::success(request_id, ResponsePayload::Authenticated { role: cred.role })
                }
                None => {
                    warn!(client_id = %client_id, "Unknown device token rejected");
                    Response::error(
                        request_id,
                        ErrorInfo::new(
                            ErrorCode::CredentialRejected,
                            "Unknown or revoked device token",
                        ),
                    )
                }
            };
        }

        let Some(info) = sync.client_info(client_id).await else {
            return Response::error(
                request_id,
                ErrorInfo::new(ErrorCode::PermissionDenied, "Hello required"),
            );
        };

        let today = minder_util::now().date_naive();

        match command {
            Command::Hello { .. } => unreachable!("handled above"),

            Command::GetUsage {
                profile_id,
                item_id,
            } => {
                if catalog.profile(&profile_id).is_none() {
                    return Response::error(
                        request_id,
                        ErrorInfo::new(ErrorCode::ProfileNotFound, "Unknown profile"),
                    );
                }
                if catalog.item(&item_id).is_none() {
                    return Response::error(
                        request_id,
                        ErrorInfo::new(ErrorCode::ItemNotFound, "Unknown item"),
                    );
                }

                let limits = catalog.limit_set(&profile_id, &item_id);
                match ledger.snapshot(&profile_id, &item_id, limits, today) {
                    Ok(snapshot) => {
                        Response::success(request_id, ResponsePayload::Usage(snapshot))
                    }
                    Err(e) => Response::error(
                        request_id,
                        ErrorInfo::new(ErrorCode::LedgerError, e.to_string()),
                    ),
                }
            }

            Command::AppendSegment {
                profile_id,
                segment,
            } => {
                if !info.role.can_record_usage() {
                    return Response::error(
                        request_id,
                        ErrorInfo::new(
                            ErrorCode::PermissionDenied,
                            "This surface does not record usage",
                        ),
                    );
                }
                if catalog.profile(&profile_id).is_none() {
                    return Response::error(
                        request_id,
                        ErrorInfo::new(ErrorCode::ProfileNotFound, "Unknown profile"),
                    );
                }

                match ledger.append_segment(&profile_id, &segment) {
                    Ok(recorded) => {
                        if recorded {
                            debug!(
                                profile_id = %profile_id,
                                item_id = %segment.item_id,
                                secs = segment.duration_seconds,
                                "Segment recorded"
                            );
                            // Every ledger write invalidates derived views
                            sync.broadcast(Frame::new(SyncEvent::Refresh));
                        }
                        Response::success(request_id, ResponsePayload::Appended { recorded })
                    }
                    Err(e) => Response::error(
                        request_id,
                        ErrorInfo::new(ErrorCode::LedgerError, e.to_string()),
                    ),
                }
            }

            Command::GrantBonus {
                profile_id,
                minutes,
            } => {
                if !info.role.can_grant_bonus() {
                    return Response::error(
                        request_id,
                        ErrorInfo::new(ErrorCode::PermissionDenied, "Admin role required"),
                    );
                }
                if catalog.profile(&profile_id).is_none() {
                    return Response::error(
                        request_id,
                        ErrorInfo::new(ErrorCode::ProfileNotFound, "Unknown profile"),
                    );
                }

                match ledger.grant_bonus(&profile_id, minutes) {
                    Ok(()) => {
                        info!(profile_id = %profile_id, minutes, "Bonus granted");
                        sync.broadcast(Frame::new(SyncEvent::Refresh));
                        Response::success(request_id, ResponsePayload::Granted)
                    }
                    Err(e) => Response::error(
                        request_id,
                        ErrorInfo::new(ErrorCode::LedgerError, e.to_string()),
                    ),
                }
            }

            Command::Publish { event } => {
                if !info.role.can_publish() {
                    return Response::error(
                        request_id,
                        ErrorInfo::new(ErrorCode::PermissionDenied, "Admin role required"),
                    );
                }

                // Targeted events pass through verbatim; recipients filter
                sync.broadcast(Frame::new(event));
                Response::success(request_id, ResponsePayload::Published)
            }

            Command::Subscribe => Response::success(
                request_id,
                ResponsePayload::Subscribed {
                    client_id: client_id.clone(),
                },
            ),

            Command::Ping => Response::success(request_id, ResponsePayload::Pong),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "minderd starting");

    let service = Service::new(&args).await?;
    service.run().await
}
