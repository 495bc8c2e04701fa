//! Thin wrappers around the stored procedures/functions in `sql/`. Each
//! function here issues exactly the `CALL`/`SELECT * FROM` invocation
//! `db_manager.py` makes for the same operation; no business logic lives
//! here beyond decoding rows into domain types.

use sqlx::{PgPool, Row};

use crate::chat::ChatMessage;
use crate::error::Result;
use crate::rules::{Color, Game};
use crate::store::identity::ServerIdentity;

pub async fn run_setup(pool: &PgPool) -> Result<()> {
    let mut tx = pool.begin().await?;
    for script in [
        include_str!("../../sql/tables.sql"),
        include_str!("../../sql/indices.sql"),
        include_str!("../../sql/functions.sql"),
        include_str!("../../sql/procedures.sql"),
    ] {
        for statement in split_statements(script) {
            sqlx::query(&statement).execute(&mut *tx).await?;
        }
    }
    tx.commit().await?;
    Ok(())
}

/// Splits a script into standalone statements. Every dollar-quoted
/// function/procedure body is terminated by `$$;` on its own line, so each
/// split on that delimiter (with the delimiter re-appended) is one complete
/// `CREATE ... AS $$ ... $$;` statement; whatever remains after the last
/// one (all of a plain DDL script, or nothing, for a script with no
/// dollar-quoted bodies) is split on `;` instead.
fn split_statements(script: &str) -> Vec<String> {
    let mut parts: Vec<&str> = script.split("$$;").collect();
    let trailing = parts.pop().unwrap_or("");

    let mut statements: Vec<String> = parts.into_iter().map(|p| format!("{p}$$;")).collect();
    statements.extend(trailing.split(';').map(str::to_string));

    statements
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

pub async fn do_cleanup(pool: &PgPool, identity: &ServerIdentity) -> Result<()> {
    sqlx::query("CALL do_cleanup($1)")
        .bind(identity.as_hex())
        .execute(pool)
        .await?;
    Ok(())
}

pub struct NewGameArgs<'a> {
    pub data: serde_json::Value,
    pub white_key: &'a str,
    pub black_key: &'a str,
    pub white_ai_secret: Option<&'a str>,
    pub black_ai_secret: Option<&'a str>,
    pub unsubscribe_key: Option<&'a str>,
    pub creator_color: Option<Color>,
}

pub async fn new_game(pool: &PgPool, identity: &ServerIdentity, args: NewGameArgs<'_>) -> Result<()> {
    let creator_color = args.creator_color.map(|c| match c {
        Color::White => "white",
        Color::Black => "black",
    });
    sqlx::query("CALL new_game($1, $2, $3, $4, $5, $6, $7, $8)")
        .bind(args.data)
        .bind(args.white_key)
        .bind(args.black_key)
        .bind(args.white_ai_secret)
        .bind(args.black_ai_secret)
        .bind(args.unsubscribe_key)
        .bind(identity.as_hex())
        .bind(creator_color)
        .execute(pool)
        .await?;
    Ok(())
}

pub enum JoinOutcome {
    Dne,
    InUse,
    AiOnly,
    Success {
        white_key: String,
        black_key: String,
        opponent_ai_secret: Option<String>,
    },
}

pub async fn join_game(
    pool: &PgPool,
    identity: &ServerIdentity,
    key: &str,
    unsubscribe_key: Option<&str>,
    ai_secret: Option<&str>,
) -> Result<JoinOutcome> {
    let row = sqlx::query("SELECT * FROM join_game($1, $2, $3, $4)")
        .bind(key)
        .bind(identity.as_hex())
        .bind(unsubscribe_key)
        .bind(ai_secret)
        .fetch_one(pool)
        .await?;

    let result: String = row.try_get("result")?;
    Ok(match result.as_str() {
        "dne" => JoinOutcome::Dne,
        "in_use" => JoinOutcome::InUse,
        "ai_only" => JoinOutcome::AiOnly,
        "success" => JoinOutcome::Success {
            white_key: row.try_get("white_key")?,
            black_key: row.try_get("black_key")?,
            opponent_ai_secret: row.try_get("opponent_ai_secret")?,
        },
        other => unreachable!("join_game returned unknown result {other}"),
    })
}

/// Notifies a single key's three channels. See spec.md §4.1 `TriggerUpdateAll`.
pub async fn trigger_update_all(pool: &PgPool, key: &str) -> Result<()> {
    sqlx::query("CALL trigger_update_all($1)")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(())
}

/// Notifies every key this server's identity currently manages. Used only by
/// the listener's reconnect path, which has no single key to scope to.
pub async fn trigger_update_all_for_identity(pool: &PgPool, identity: &ServerIdentity) -> Result<()> {
    sqlx::query("CALL trigger_update_all_for_identity($1)")
        .bind(identity.as_hex())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn write_game(
    pool: &PgPool,
    key: &str,
    game: &Game,
    expected_version: i64,
) -> Result<Option<f64>> {
    let data = serde_json::to_value(game).expect("Game always serializes");
    let row = sqlx::query("SELECT write_game($1, $2, $3) AS time_played")
        .bind(key)
        .bind(data)
        .bind(expected_version)
        .fetch_one(pool)
        .await?;
    Ok(row.try_get("time_played")?)
}

/// `color` is not sent to the database — `write_chat` derives it from the
/// `player_key` row matching `key`, so forging a chat message under another
/// color is impossible even with a valid key for the wrong socket.
pub async fn write_chat(pool: &PgPool, key: &str, timestamp: f64, message: &str) -> Result<bool> {
    let row = sqlx::query("SELECT write_chat($1, $2, $3) AS wrote")
        .bind(timestamp)
        .bind(message)
        .bind(key)
        .fetch_one(pool)
        .await?;
    Ok(row.try_get("wrote")?)
}

pub async fn unsubscribe(pool: &PgPool, identity: &ServerIdentity, key: &str) -> Result<bool> {
    let row = sqlx::query("SELECT unsubscribe($1, $2) AS released")
        .bind(key)
        .bind(identity.as_hex())
        .fetch_one(pool)
        .await?;
    Ok(row.try_get("released")?)
}

pub async fn get_game_status(pool: &PgPool, key: &str) -> Result<Option<(Game, f64, i64)>> {
    let row = sqlx::query("SELECT * FROM get_game_status($1)")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    let Some(row) = row else { return Ok(None) };
    let data: serde_json::Value = row.try_get("data")?;
    let game: Game = serde_json::from_value(data).expect("stored Game blob always deserializes");
    let time_played: f64 = row.try_get("time_played")?;
    let version: i64 = row.try_get("version")?;
    Ok(Some((game, time_played, version)))
}

pub async fn get_chat_updates(pool: &PgPool, key: &str, since: Option<i64>) -> Result<Vec<ChatMessage>> {
    let rows = sqlx::query("SELECT * FROM get_chat_updates($1, $2)")
        .bind(key)
        .bind(since)
        .fetch_all(pool)
        .await?;
    rows.into_iter()
        .map(|row| {
            let color_str: String = row.try_get("color")?;
            let color = if color_str == "white" { Color::White } else { Color::Black };
            Ok(ChatMessage {
                id: row.try_get("id")?,
                timestamp: row.try_get("ts")?,
                color,
                message: row.try_get("message")?,
            })
        })
        .collect()
}

pub async fn get_opponent_connected(pool: &PgPool, key: &str) -> Result<bool> {
    let row = sqlx::query("SELECT get_opponent_connected($1) AS connected")
        .bind(key)
        .fetch_one(pool)
        .await?;
    Ok(row.try_get("connected")?)
}
