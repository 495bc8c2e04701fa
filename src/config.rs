use std::env;

/// Process-wide configuration, collected once at startup and handed down as
/// an `Arc<Config>` extension, the same pattern the teacher uses for its
/// `PgPool`/`SessionState` extensions.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub machine_id_path: String,
    pub origin_suffix: String,
    pub ai_server_url: String,
    pub port: u16,
    pub run_db_setup: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            machine_id_path: env::var("MACHINE_ID_PATH")
                .unwrap_or_else(|_| "/etc/machine-id".to_string()),
            origin_suffix: env::var("ORIGIN_SUFFIX").unwrap_or_default(),
            ai_server_url: env::var("AI_SERVER_URL")
                .unwrap_or_else(|_| "http://localhost:1918".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8888),
            run_db_setup: env::var("RUN_DB_SETUP")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}
