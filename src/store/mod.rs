//! The store gateway: the only component that issues database queries. See
//! spec §4.1 for the full operation contract; this module is a thin,
//! typed front door over `ops` (the stored-procedure calls) and `listener`
//! (the pub/sub fan-in), matching the shape of `db_manager.py`'s `DbManager`.

pub mod identity;
pub mod keygen;
pub mod listener;
pub mod ops;

pub use identity::ServerIdentity;
pub use ops::JoinOutcome as JoinResult;

use sqlx::PgPool;
use tokio::sync::mpsc;

use crate::error::{Result, ServerError};
use crate::protocol::KeyPair;
use crate::rules::{Color, Game};
use crate::session::SessionEvent;
use crate::store::listener::ListenerHandle;

/// Two-step construction per spec.md §9 DESIGN NOTES: `new` is a pure
/// constructor, `open` performs the startup sequence (§4.1) — acquiring the
/// listener connection, reading `ServerIdentity`, optional DDL, cleanup, and
/// starting the notification consumer.
pub struct StoreGateway {
    pool: PgPool,
    identity: ServerIdentity,
    listener: ListenerHandle,
}

impl StoreGateway {
    /// Pure constructor: just assembles the struct from already-acquired
    /// parts. Holds no `await` point and cannot fail.
    pub fn new(pool: PgPool, identity: ServerIdentity, listener: ListenerHandle) -> Self {
        StoreGateway { pool, identity, listener }
    }

    /// Performs the full startup sequence from spec.md §4.1 — reading
    /// `ServerIdentity`, optional DDL, cleanup, and starting the listener's
    /// notification consumer — then hands the assembled parts to `new`.
    pub async fn open(
        pool: PgPool,
        machine_id_path: &str,
        run_db_setup: bool,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Self> {
        let identity = ServerIdentity::load(machine_id_path)
            .map_err(|e| ServerError::Protocol(format!("failed to establish server identity: {e}")))?;

        if run_db_setup {
            ops::run_setup(&pool).await?;
        }

        ops::do_cleanup(&pool, &identity).await?;

        let listener = listener::spawn(pool.clone(), identity, events).await?;

        Ok(Self::new(pool, identity, listener))
    }

    pub fn identity(&self) -> ServerIdentity {
        self.identity
    }

    /// Generates two fresh keys (and, for any AI-driven color, a fresh
    /// secret), persists the game and both `PlayerKey` rows in one
    /// transaction, and — for the creator's color only — subscribes this
    /// server's listener to the new key's three channels before returning,
    /// closing the join-race window spec.md §4.1 calls out.
    pub async fn write_new_game(
        &self,
        game: &Game,
        creator_color: Option<Color>,
        ai_colors: &[Color],
        unsubscribe_key: Option<&str>,
    ) -> Result<KeyPair> {
        if let Some(creator) = creator_color {
            if ai_colors.contains(&creator) {
                return Err(ServerError::Protocol(
                    "a color cannot be both the creator's and AI-driven".into(),
                ));
            }
        }

        let white_key = keygen::alphanum_key();
        let black_key = keygen::alphanum_key();
        let white_ai_secret = ai_colors.contains(&Color::White).then(keygen::alphanum_key);
        let black_ai_secret = ai_colors.contains(&Color::Black).then(keygen::alphanum_key);

        let data = serde_json::to_value(game).expect("Game always serializes");
        ops::new_game(
            &self.pool,
            &self.identity,
            ops::NewGameArgs {
                data,
                white_key: &white_key,
                black_key: &black_key,
                white_ai_secret: white_ai_secret.as_deref(),
                black_ai_secret: black_ai_secret.as_deref(),
                unsubscribe_key,
                creator_color,
            },
        )
        .await?;

        if let Some(key) = unsubscribe_key {
            self.listener.unsubscribe(key).await?;
        }

        if let Some(creator) = creator_color {
            let creator_key = match creator {
                Color::White => &white_key,
                Color::Black => &black_key,
            };
            self.listener.subscribe(creator_key).await?;
        }

        Ok(KeyPair {
            white: white_key,
            black: black_key,
            white_ai_secret,
            black_ai_secret,
        })
    }

    /// On success, subscribes this server's listener to `key`'s three
    /// channels before returning — the caller's `TriggerUpdateAll` call
    /// right after will then reach a registered key.
    pub async fn join_game(
        &self,
        key: &str,
        unsubscribe_key: Option<&str>,
        ai_secret: Option<&str>,
    ) -> Result<JoinResult> {
        let outcome = ops::join_game(&self.pool, &self.identity, key, unsubscribe_key, ai_secret).await?;

        if let Some(old_key) = unsubscribe_key {
            self.listener.unsubscribe(old_key).await?;
        }
        if matches!(outcome, JoinResult::Success { .. }) {
            self.listener.subscribe(key).await?;
        }

        Ok(outcome)
    }

    /// Authoritative read used when a session has no cached state to fall
    /// back on yet (e.g. immediately after `join_game`, before the
    /// `trigger_update_all`-driven notification lands).
    pub async fn read_game_status(&self, key: &str) -> Result<Option<(Game, f64, i64)>> {
        ops::get_game_status(&self.pool, key).await
    }

    pub async fn trigger_update_all(&self, key: &str) -> Result<()> {
        ops::trigger_update_all(&self.pool, key).await
    }

    pub async fn write_game(&self, key: &str, game: &Game, expected_version: i64) -> Result<Option<f64>> {
        ops::write_game(&self.pool, key, game, expected_version).await
    }

    pub async fn write_chat(&self, key: &str, timestamp: f64, message: &str) -> Result<bool> {
        ops::write_chat(&self.pool, key, timestamp, message).await
    }

    /// Retries forever on storage failure — this is the one operation that
    /// may not fail, per spec.md §4.1, since failing leaks ownership of a
    /// key until server restart.
    pub async fn unsubscribe(&self, key: &str) -> bool {
        loop {
            match ops::unsubscribe(&self.pool, &self.identity, key).await {
                Ok(released) => {
                    let _ = self.listener.unsubscribe(key).await;
                    return released;
                }
                Err(e) => {
                    tracing::error!(error = %e, key, "unsubscribe failed, retrying");
                    tokio::time::sleep(listener::DB_UNAVAILABLE_SLEEP).await;
                }
            }
        }
    }
}
