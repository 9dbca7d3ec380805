// src/config.rs

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use dotenvy::dotenv;

use crate::exam::marking::MarkingScheme;

/// Default time budget per question when a test series has no explicit duration.
pub const DEFAULT_SECONDS_PER_QUESTION: u32 = 120;

/// How many wrong options a lifeline hides.
pub const LIFELINE_ELIMINATIONS: usize = 2;

/// Period of the session countdown.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Prefix of attempt ids synthesised when persistence fails.
pub const LOCAL_ATTEMPT_PREFIX: &str = "local";

/// Total time a session may spend paused. After that the countdown resumes.
pub const MAX_PAUSE_SECONDS: u32 = 30 * 60;

/// How long a finished session's result stays in memory once its attempt is stored.
pub const FINISHED_RETENTION: Duration = Duration::from_secs(15 * 60);

/// Retention for results whose attempt could not be stored.
pub const UNSAVED_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Period of the finished-session sweep.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. When absent the server keeps everything in memory.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub rust_log: String,
    pub marking_scheme: MarkingScheme,
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let marking_scheme = match env::var("MARKING_SCHEME") {
            Ok(name) => MarkingScheme::from_name(&name).unwrap_or_else(|| {
                tracing::warn!("Unknown MARKING_SCHEME '{}', falling back to flat", name);
                MarkingScheme::FLAT
            }),
            Err(_) => MarkingScheme::FLAT,
        };

        let bind_addr = env::var("BIND_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        Self {
            database_url,
            jwt_secret,
            rust_log,
            marking_scheme,
            bind_addr,
        }
    }
}
