//! Bot startup and the main event loop.

use crate::config::Config;
use crate::error::Result;
use crate::handlers::EventRouter;
use crate::onebot::{BotApi, Event, EventStream, HttpBotApi};
use crate::store::{JsonDataStore, MaintenanceIntervals};
use crate::types::Data;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const EVENT_QUEUE_SIZE: usize = 256;
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// `info` level and may come from `.env`, which is loaded first.
pub fn init_tracing() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter(log_filter()).init();
}

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Handle events from `events` until `shutdown` resolves or the channel
/// closes.
///
/// Queued events are dispatched before `shutdown` is looked at. On the way out
/// the receiver is dropped, so the producer stops, and every handler still
/// running is awaited.
pub async fn serve<F>(router: Arc<EventRouter>, mut events: mpsc::Receiver<Event>, shutdown: F)
where
    F: Future<Output = ()>,
{
    let mut handlers = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            event = events.recv() => {
                let Some(event) = event else {
                    warn!("event stream ended");
                    break;
                };
                let router = Arc::clone(&router);
                handlers.spawn(async move { router.handle(event).await });
            }
            Some(finished) = handlers.join_next(), if !handlers.is_empty() => {
                if let Err(e) = finished {
                    warn!("event handler task failed: {}", e);
                }
            }
            _ = &mut shutdown => {
                info!("shutdown requested");
                break;
            }
        }
    }

    drop(events);
    if !handlers.is_empty() {
        info!(pending = handlers.len(), "waiting for running handlers");
    }
    while let Some(finished) = handlers.join_next().await {
        if let Err(e) = finished {
            warn!("event handler task failed: {}", e);
        }
    }
}

/// Run the bot until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the data file or HTTP
/// client cannot be set up. Runtime failures of single events are logged.
pub async fn run() -> Result<()> {
    let config = Config::from_env()?;
    info!(
        audit_group = config.audit_group_id,
        main_groups = ?config.main_group_ids,
        data_file = %config.data_file,
        "starting bot"
    );

    let store = Arc::new(JsonDataStore::open(&config.data_file).await?);
    info!(users = store.user_count().await, "user data loaded");

    let http_client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
    let api: Arc<dyn BotApi> = Arc::new(HttpBotApi::new(
        http_client,
        &config.onebot_api_url,
        config.onebot_access_token.clone(),
    ));

    // Separate signals: the store flushes only after the handlers are done.
    let (stream_shutdown, _) = broadcast::channel::<()>(1);
    let (store_shutdown, _) = broadcast::channel::<()>(1);
    let maintenance = store.spawn_maintenance(MaintenanceIntervals::default(), store_shutdown.subscribe());

    let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_SIZE);
    let stream = EventStream::new(&config.onebot_ws_url, config.onebot_access_token.clone())
        .spawn(event_tx, stream_shutdown.subscribe());

    let data = Arc::new(Data::new(config, store.clone(), api));
    let router = Arc::new(EventRouter::new(data)?);

    serve(router, event_rx, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl-C: {}", e);
        }
    })
    .await;

    let _ = stream_shutdown.send(());
    if let Err(e) = stream.await {
        warn!("event stream task failed: {}", e);
    }

    let _ = store_shutdown.send(());
    if let Err(e) = maintenance.await {
        warn!("maintenance task failed: {}", e);
    }

    info!("bot stopped");
    Ok(())
}
