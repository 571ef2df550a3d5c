//! Notisync agent
//!
//! Runs one notification session against the configured backend and logs
//! what changes until interrupted.

use std::collections::HashSet;

use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use notisync_core::config::{AppConfig, LogFormat};
use notisync_core::error::AppError;
use notisync_core::types::id::AlertId;
use notisync_core::types::token::SessionToken;
use notisync_realtime::{ConnectionState, NotificationSession, SessionSnapshot, build_transport};
use notisync_source::SourceManager;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        error!("Agent error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from `config/default.toml`, the file named by
/// `NOTISYNC_CONFIG`, and the environment
fn load_configuration() -> Result<AppConfig, AppError> {
    let path = std::env::var("NOTISYNC_CONFIG").ok();
    AppConfig::load(path.as_deref())
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    info!("Starting Notisync agent v{}", env!("CARGO_PKG_VERSION"));
    info!(
        source = %config.source.provider,
        transport = %config.realtime.transport,
        polling = config.polling.enabled,
        "Session configuration"
    );

    let token = SessionToken::new(config.auth.token.clone());
    let source = SourceManager::new(&config, token.clone())?.source();
    let transport = build_transport(&config.realtime)?;
    let session = NotificationSession::from_config(&config, source, transport, token)?;

    let mut snapshots = session.watch();
    session.connect().await?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut reporter = Reporter::default();
    let mut expired = false;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                reporter.report(&snapshot);
                if snapshot.auth_expired {
                    expired = true;
                    break;
                }
            }
        }
    }

    session.disconnect().await;
    info!("Notisync agent stopped");

    if expired {
        return Err(AppError::authentication(
            "Session token rejected; supply a fresh NOTISYNC__AUTH__TOKEN and restart",
        ));
    }
    Ok(())
}

/// Logs the parts of each snapshot that changed since the last one.
#[derive(Debug, Default)]
struct Reporter {
    unread: Option<usize>,
    state: Option<ConnectionState>,
    exhausted: bool,
    alerts: HashSet<AlertId>,
    errors: usize,
}

impl Reporter {
    fn report(&mut self, snapshot: &SessionSnapshot) {
        if self.unread != Some(snapshot.unread_count) {
            info!(
                unread = snapshot.unread_count,
                total = snapshot.notifications.len(),
                "Unread count changed"
            );
            self.unread = Some(snapshot.unread_count);
        }

        let status = snapshot.connection;
        if self.state != Some(status.state) || self.exhausted != status.exhausted {
            if status.exhausted {
                warn!(attempts = status.attempt, "Channel gave up reconnecting; polling continues");
            } else {
                info!(state = %status.state, attempt = status.attempt, "Channel state changed");
            }
            self.state = Some(status.state);
            self.exhausted = status.exhausted;
        }

        for alert in &snapshot.alerts {
            if self.alerts.insert(alert.id) {
                info!(
                    notification_id = %alert.notification_id,
                    priority = alert.priority.as_str(),
                    title = %alert.title,
                    "ALERT"
                );
            }
        }
        self.alerts
            .retain(|id| snapshot.alerts.iter().any(|a| a.id == *id));

        if snapshot.errors.len() > self.errors {
            for surfaced in &snapshot.errors[self.errors..] {
                warn!(operation = %surfaced.operation, kind = %surfaced.kind, "{}", surfaced.message);
            }
        }
        self.errors = snapshot.errors.len();
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
