//! Notification consumer and reconnect logic. Direct analogue of
//! `_get_listener` / `_reconnect_listener` / `_subscribe_to_updates` /
//! `_update_consumer` in `db_manager.py`, built on `sqlx::postgres::PgListener`
//! in place of asyncpg's termination-listener callback.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tokio::sync::{mpsc, Mutex};

use crate::error::Result;
use crate::session::SessionEvent;
use crate::store::identity::ServerIdentity;
use crate::store::ops;

/// How long the reconnect loop sleeps between failed reacquisition attempts.
/// Named for parity with `DB_UNAVAILABLE_SLEEP_PERIOD` in the original.
pub const DB_UNAVAILABLE_SLEEP: Duration = Duration::from_secs(2);

/// How long a single `recv()` call blocks before the loop checks whether a
/// subscribe/unsubscribe is waiting on the same connection's lock. asyncpg's
/// callback-driven listener doesn't need this; a polling timeout is the
/// idiomatic stand-in for a single shared connection doing both LISTEN
/// management and notification delivery over `sqlx::PgListener`.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateType {
    GameStatus,
    Chat,
    OpponentConnected,
}

fn channels_for(key: &str) -> [String; 3] {
    [
        format!("game_status_{key}"),
        format!("chat_{key}"),
        format!("opponent_connected_{key}"),
    ]
}

fn parse_channel(channel: &str) -> Option<(UpdateType, &str)> {
    if let Some(key) = channel.strip_prefix("game_status_") {
        Some((UpdateType::GameStatus, key))
    } else if let Some(key) = channel.strip_prefix("opponent_connected_") {
        Some((UpdateType::OpponentConnected, key))
    } else if let Some(key) = channel.strip_prefix("chat_") {
        Some((UpdateType::Chat, key))
    } else {
        None
    }
}

/// Owns the dedicated pub/sub connection and the per-key registry the rest
/// of the store gateway subscribes/unsubscribes through. Cloned cheaply
/// (everything inside is `Arc`-wrapped); the dispatch task holds its own
/// clone.
#[derive(Clone)]
pub struct ListenerHandle {
    conn: Arc<Mutex<PgListener>>,
    registry: Arc<Mutex<HashSet<String>>>,
    pool: PgPool,
}

impl ListenerHandle {
    async fn connect(pool: &PgPool) -> Result<PgListener> {
        Ok(PgListener::connect_with(pool).await?)
    }

    pub async fn subscribe(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.lock().await;
        for channel in channels_for(key) {
            conn.listen(&channel).await?;
        }
        drop(conn);
        self.registry.lock().await.insert(key.to_string());
        Ok(())
    }

    /// Removes this server's in-process LISTEN registration for `key`'s
    /// three channels. Idempotent — unlisten on a channel we're not
    /// subscribed to is a no-op as far as the caller is concerned.
    pub async fn unsubscribe(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.lock().await;
        for channel in channels_for(key) {
            let _ = conn.unlisten(&channel).await;
        }
        drop(conn);
        self.registry.lock().await.remove(key);
        Ok(())
    }
}

/// Starts the dedicated listener connection and its dispatch task. Returns a
/// handle the rest of the store gateway uses to (un)subscribe keys.
pub async fn spawn(
    pool: PgPool,
    identity: ServerIdentity,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> Result<ListenerHandle> {
    let listener = ListenerHandle::connect(&pool).await?;
    let handle = ListenerHandle {
        conn: Arc::new(Mutex::new(listener)),
        registry: Arc::new(Mutex::new(HashSet::new())),
        pool,
    };

    let task_handle = handle.clone();
    tokio::spawn(async move {
        dispatch_loop(task_handle, identity, events).await;
    });

    Ok(handle)
}

async fn dispatch_loop(handle: ListenerHandle, identity: ServerIdentity, events: mpsc::UnboundedSender<SessionEvent>) {
    loop {
        let notification = {
            let mut conn = handle.conn.lock().await;
            tokio::time::timeout(POLL_INTERVAL, conn.recv()).await
        };

        let notification = match notification {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "listener connection lost, attempting to reacquire");
                reconnect(&handle, &identity).await;
                continue;
            }
            Err(_timeout) => continue,
        };

        let channel = notification.channel().to_string();
        let payload = notification.payload().to_string();
        let Some((update, key)) = parse_channel(&channel) else {
            tracing::warn!(channel, "notification on unrecognized channel");
            continue;
        };

        if !handle.registry.lock().await.contains(key) {
            tracing::warn!(key, "dropping notification for key no longer registered locally");
            continue;
        }

        if let Err(e) = handle_notification(&handle.pool, &events, update, key, &payload).await {
            tracing::error!(error = %e, key, "failed to process notification");
        }
    }
}

async fn handle_notification(
    pool: &PgPool,
    events: &mpsc::UnboundedSender<SessionEvent>,
    update: UpdateType,
    key: &str,
    payload: &str,
) -> Result<()> {
    let event = match update {
        UpdateType::GameStatus => {
            let Some((game, time_played, _version)) = ops::get_game_status(pool, key).await? else {
                return Ok(());
            };
            SessionEvent::GameStatus { key: key.to_string(), game, time_played }
        }
        UpdateType::Chat => {
            let since = if payload.is_empty() { None } else { payload.parse::<i64>().ok() };
            let messages = ops::get_chat_updates(pool, key, since).await?;
            SessionEvent::Chat {
                key: key.to_string(),
                thread: crate::chat::ChatThread { thread: messages, is_complete: since.is_none() },
            }
        }
        UpdateType::OpponentConnected => {
            let connected = if payload.is_empty() {
                ops::get_opponent_connected(pool, key).await?
            } else {
                payload == "true"
            };
            SessionEvent::OpponentConnected { key: key.to_string(), connected }
        }
    };

    let _ = events.send(event);
    Ok(())
}

async fn reconnect(handle: &ListenerHandle, identity: &ServerIdentity) {
    loop {
        match ListenerHandle::connect(&handle.pool).await {
            Ok(new_conn) => {
                *handle.conn.lock().await = new_conn;
                break;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to reacquire listener connection, retrying");
                tokio::time::sleep(DB_UNAVAILABLE_SLEEP).await;
            }
        }
    }

    let registered: Vec<String> = handle.registry.lock().await.iter().cloned().collect();
    {
        let mut conn = handle.conn.lock().await;
        for key in &registered {
            for channel in channels_for(key) {
                if let Err(e) = conn.listen(&channel).await {
                    tracing::error!(error = %e, key, "failed to resubscribe channel after reconnect");
                }
            }
        }
    }

    if let Err(e) = ops::trigger_update_all_for_identity(&handle.pool, identity).await {
        tracing::error!(error = %e, "failed to trigger update-all after listener reconnect");
    }
    tracing::info!("successfully reacquired listener connection and resubscribed");
}
