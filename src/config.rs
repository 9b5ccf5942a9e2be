use chrono::Duration;
use zeroize::Zeroizing;

use crate::auth::issuer::MIN_SECRET_LEN;
use crate::middleware::auth_gate::BypassPaths;

const PLACEHOLDER_SECRET: &str = "CHANGE_ME_64_CHAR_HEX_SECRET";

/// Prefixes exempt from the auth gate unless `SMARTROUTE_AUTH_BYPASS` overrides them.
pub const DEFAULT_BYPASS: [&str; 3] = ["/api/v1/auth", "/healthz", "/readyz"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Raw HMAC key for token signing. Zeroed on drop.
    pub jwt_secret: Zeroizing<Vec<u8>>,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub bypass: BypassPaths,
    pub log_format: LogFormat,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("bypass", &self.bypass)
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let secret_hex = std::env::var("SMARTROUTE_JWT_SECRET")
        .unwrap_or_else(|_| PLACEHOLDER_SECRET.into());

    let jwt_secret = if secret_hex == PLACEHOLDER_SECRET {
        if is_production() {
            anyhow::bail!(
                "SMARTROUTE_JWT_SECRET is still the insecure placeholder. \
                 Set a 64-char hex secret (see `smartroute gen-secret`) before running in production."
            );
        }
        eprintln!("⚠️  SMARTROUTE_JWT_SECRET is not set — using an insecure development secret.");
        Zeroizing::new(PLACEHOLDER_SECRET.repeat(2).into_bytes())
    } else {
        parse_secret(&secret_hex)?
    };

    Ok(Config {
        port: std::env::var("SMARTROUTE_PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .unwrap_or(8080),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/smartroute".into()),
        jwt_secret,
        access_ttl: Duration::seconds(env_secs("SMARTROUTE_ACCESS_TTL_SECS", 86_400)?),
        refresh_ttl: Duration::seconds(env_secs("SMARTROUTE_REFRESH_TTL_SECS", 604_800)?),
        bypass: parse_bypass(std::env::var("SMARTROUTE_AUTH_BYPASS").ok().as_deref()),
        log_format: match std::env::var("SMARTROUTE_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        },
    })
}

fn is_production() -> bool {
    std::env::var("SMARTROUTE_ENV")
        .or_else(|_| std::env::var("RUST_ENV"))
        .map(|v| v == "production")
        .unwrap_or(false)
}

fn env_secs(key: &str, default: i64) -> anyhow::Result<i64> {
    let secs = match std::env::var(key) {
        Ok(v) => v
            .parse::<i64>()
            .map_err(|_| anyhow::anyhow!("{} must be an integer number of seconds", key))?,
        Err(_) => default,
    };
    if secs <= 0 {
        anyhow::bail!("{} must be positive, got {}", key, secs);
    }
    Ok(secs)
}

/// Decode the hex signing secret. At least 32 bytes (64 hex chars).
pub fn parse_secret(hex_str: &str) -> anyhow::Result<Zeroizing<Vec<u8>>> {
    let bytes = Zeroizing::new(
        hex::decode(hex_str.trim())
            .map_err(|e| anyhow::anyhow!("SMARTROUTE_JWT_SECRET must be hex: {}", e))?,
    );
    if bytes.len() < MIN_SECRET_LEN {
        anyhow::bail!(
            "SMARTROUTE_JWT_SECRET must be at least {} hex chars ({} bytes), got {} bytes",
            MIN_SECRET_LEN * 2,
            MIN_SECRET_LEN,
            bytes.len()
        );
    }
    Ok(bytes)
}

/// Comma-separated prefixes; unset or blank falls back to [`DEFAULT_BYPASS`].
pub fn parse_bypass(raw: Option<&str>) -> BypassPaths {
    let prefixes: Vec<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    if prefixes.is_empty() {
        BypassPaths::new(DEFAULT_BYPASS)
    } else {
        BypassPaths::new(prefixes)
    }
}
