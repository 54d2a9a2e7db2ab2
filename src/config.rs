use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use secrecy::SecretString;

/// Connection details for one upstream API and the client-credentials pair
/// used to obtain its bearer tokens.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// OAuth2 token endpoint for the client-credentials grant.
    pub token_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub scope: Option<String>,
}

impl UpstreamConfig {
    pub fn new(
        base_url: impl Into<String>,
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            scope: None,
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Load `{PREFIX}_BASE_URL`, `{PREFIX}_TOKEN_URL`, `{PREFIX}_CLIENT_ID`,
    /// `{PREFIX}_CLIENT_SECRET` and the optional `{PREFIX}_SCOPE`.
    fn from_env(prefix: &str) -> Result<Self> {
        let var = |suffix: &str| {
            let key = format!("{prefix}_{suffix}");
            std::env::var(&key)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{key} is required"))
        };

        let mut upstream = Self::new(
            validate_url(prefix, "BASE_URL", var("BASE_URL")?)?,
            validate_url(prefix, "TOKEN_URL", var("TOKEN_URL")?)?,
            var("CLIENT_ID")?,
            var("CLIENT_SECRET")?,
        );
        upstream.scope = std::env::var(format!("{prefix}_SCOPE"))
            .ok()
            .filter(|s| !s.trim().is_empty());
        Ok(upstream)
    }
}

/// Application configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // ── Server ──────────────────────────────────────────────────────────
    pub host: String,
    pub port: u16,

    // ── Cursor store ────────────────────────────────────────────────────
    /// PostgreSQL connection string. Cursors are kept in memory when unset.
    pub database_url: Option<String>,
    /// Lower bound of the first window for a job that has never run.
    pub default_start_date: DateTime<Utc>,

    // ── Scheduling ──────────────────────────────────────────────────────
    pub sync_interval_secs: u64,
    /// Upper bound on a single job run. `0` disables the limit.
    pub run_timeout_secs: u64,

    // ── Outbound HTTP ───────────────────────────────────────────────────
    pub http_timeout_secs: u64,
    /// Token-bucket budget for calls to NPWD.
    pub npwd_requests_per_second: u32,
    pub npwd_max_parallelism: usize,

    // ── Upstreams ───────────────────────────────────────────────────────
    pub npwd: UpstreamConfig,
    pub rrepw: UpstreamConfig,
    pub organisations: UpstreamConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8430".into())
                .parse()
                .context("Invalid PORT")?,

            database_url: std::env::var("DATABASE_URL").ok(),
            default_start_date: parse_start_date(
                &std::env::var("SYNC_DEFAULT_START_DATE")
                    .unwrap_or_else(|_| "2024-01-01T00:00:00Z".into()),
            )
            .context("Invalid SYNC_DEFAULT_START_DATE")?,

            sync_interval_secs: parse_env("SYNC_INTERVAL_SECS", 900)?,
            run_timeout_secs: parse_env("SYNC_RUN_TIMEOUT_SECS", 600)?,

            http_timeout_secs: parse_env("HTTP_TIMEOUT_SECS", 30)?,
            npwd_requests_per_second: parse_env("NPWD_REQUESTS_PER_SECOND", 10)?,
            npwd_max_parallelism: parse_env("NPWD_MAX_PARALLELISM", 10)?,

            npwd: UpstreamConfig::from_env("NPWD")?,
            rrepw: UpstreamConfig::from_env("RREPW")?,
            organisations: UpstreamConfig::from_env("ORGS")?,
        })
    }
}

/// Upstream URLs must be absolute http(s) URLs.
fn validate_url(prefix: &str, suffix: &str, raw: String) -> Result<String> {
    let parsed = url::Url::parse(&raw).with_context(|| format!("Invalid {prefix}_{suffix}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("{prefix}_{suffix} must be an http(s) URL, got {raw:?}");
    }
    Ok(raw)
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().with_context(|| format!("Invalid {key}")),
        Err(_) => Ok(default),
    }
}

/// Accepts a full RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_start_date(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("expected RFC 3339 or YYYY-MM-DD, got {raw:?}"))?;
    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
}
