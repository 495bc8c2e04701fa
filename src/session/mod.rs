//! Per-connection state and the notification dispatcher. Replaces the
//! Python original's per-update-type callback closures (`_game_status_
//! callback`, `_chat_callback`, `_opponent_connected_callback`) with a
//! single tagged-union channel per spec.md §9 DESIGN NOTES: the store
//! gateway's notification consumer sends `SessionEvent`s into one channel
//! per registered socket, and that socket's own task applies the cache
//! mutation and renders the outgoing frame — preserving "a ClientSession is
//! exclusively owned by the socket handler" (spec.md §3 Ownership) even
//! though the event is produced elsewhere.

pub mod handlers;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::chat::ChatThread;
use crate::rules::{Color, Game};
use crate::store::StoreGateway;

/// A resolved notification, ready to be applied to whichever socket owns
/// `key`. Produced by `store::listener`'s dispatch loop, consumed by the
/// socket task registered for `key`.
#[derive(Debug)]
pub enum SessionEvent {
    GameStatus { key: String, game: Game, time_played: f64 },
    Chat { key: String, thread: ChatThread },
    OpponentConnected { key: String, connected: bool },
}

pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// In-memory per-connection state. See module doc: owned exclusively by the
/// socket task that holds it.
pub struct ClientSession {
    pub key: String,
    pub color: Color,
    pub game: Game,
    pub time_played: f64,
    pub chat_thread: ChatThread,
    pub opponent_connected: bool,
}

impl ClientSession {
    pub fn new(key: String, color: Color, game: Game, time_played: f64) -> Self {
        ClientSession {
            key,
            color,
            game,
            time_played,
            chat_thread: ChatThread::empty_complete(),
            opponent_connected: false,
        }
    }
}

/// Bidirectional `key <-> socket` index. Holds only enough to route a
/// `SessionEvent` to the right socket's channel; the Game/ChatThread/etc.
/// caches themselves live on each socket's own `ClientSession`.
#[derive(Default)]
struct Registry {
    sockets: HashMap<String, EventSender>,
}

pub struct SessionManager {
    store: Arc<StoreGateway>,
    registry: RwLock<Registry>,
}

impl SessionManager {
    pub fn new(store: Arc<StoreGateway>) -> Self {
        SessionManager { store, registry: RwLock::new(Registry::default()) }
    }

    pub fn store(&self) -> &StoreGateway {
        &self.store
    }

    pub async fn register(&self, key: String, sender: EventSender) {
        self.registry.write().await.sockets.insert(key, sender);
    }

    pub async fn unregister(&self, key: &str) {
        self.registry.write().await.sockets.remove(key);
    }

    pub async fn is_registered(&self, key: &str) -> bool {
        self.registry.read().await.sockets.contains_key(key)
    }

    /// Drains resolved notifications from the store gateway and forwards
    /// each to the socket owning its key. Entries whose key is no longer
    /// registered are dropped with a warning, per spec.md §4.1 — this can
    /// happen legitimately when unsubscribe races a just-arrived
    /// notification during a reconnect.
    pub async fn run_dispatcher(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            let key = match &event {
                SessionEvent::GameStatus { key, .. } => key,
                SessionEvent::Chat { key, .. } => key,
                SessionEvent::OpponentConnected { key, .. } => key,
            };
            let sender = self.registry.read().await.sockets.get(key).cloned();
            match sender {
                Some(sender) => {
                    let _ = sender.send(event);
                }
                None => tracing::warn!(key, "dropping notification for key with no registered socket"),
            }
        }
    }
}
