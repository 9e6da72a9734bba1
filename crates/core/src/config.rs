//! Environment-driven configuration.
//!
//! Every key can be overridden per profile: with `SENTINEL_PROFILE=prod`,
//! `PG_HOST` is read as `PROD_PG_HOST` first and `PG_HOST` second. Empty
//! values count as unset.

use std::env;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Load `.env` if present.
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Key lookup with an optional `{PROFILE}_` prefix.
struct ProfiledEnv<'a> {
    profile: &'a str,
}

impl ProfiledEnv<'_> {
    fn raw(key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    fn get(&self, key: &str) -> Option<String> {
        if !self.profile.is_empty() {
            if let Some(v) = Self::raw(&format!("{}_{key}", self.profile)) {
                return Some(v);
            }
        }
        Self::raw(key)
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    /// Parsed value; unparsable input falls back to `default` with a warning.
    fn parsed<T: FromStr>(&self, key: &str, default: T) -> T {
        match self.get(key) {
            None => default,
            Some(v) => v.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(key, value = %v, "unparsable config value; using default");
                default
            }),
        }
    }

    fn opt_parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    /// `false`, `0`, `no` and `off` are false; anything else set is true.
    fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).map(|v| {
            !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no" | "off")
        })
    }

    fn list(&self, key: &str, default: &str) -> Vec<String> {
        self.string(key, default)
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Upper-cased profile name; empty for the default profile.
    pub profile: String,
    pub postgres: PostgresConfig,
    pub edgar: EdgarConfig,
    pub analyst: AnalystConfig,
    pub universe: UniverseConfig,
    pub macro_indicators: MacroConfig,
    pub ingest: IngestConfig,
    pub supervisor: SupervisorConfig,
    pub notify: NotifyConfig,
}

impl Config {
    /// Profile from `SENTINEL_PROFILE`. Call [`load_dotenv`] first.
    pub fn from_env() -> Self {
        Self::for_profile(&ProfiledEnv::raw("SENTINEL_PROFILE").unwrap_or_default())
    }

    pub fn for_profile(profile: &str) -> Self {
        let profile = profile.trim().to_uppercase();
        let vars = ProfiledEnv { profile: &profile };
        Self {
            postgres: PostgresConfig::load(&vars),
            edgar: EdgarConfig::load(&vars),
            analyst: AnalystConfig::load(&vars),
            universe: UniverseConfig::load(&vars),
            macro_indicators: MacroConfig::load(&vars),
            ingest: IngestConfig::load(&vars),
            supervisor: SupervisorConfig::load(&vars),
            notify: NotifyConfig::load(&vars),
            profile,
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() {
            "default"
        } else {
            &self.profile
        }
    }

    /// Startup log line. Never includes secrets.
    pub fn log_summary(&self) {
        tracing::info!(
            profile = self.profile_label(),
            pg_host = %self.postgres.host,
            pg_database = %self.postgres.database,
            edgar_forms = %self.edgar.form_types.join(","),
            analyst = self.analyst.is_configured(),
            universe_size = self.universe.size,
            macro_indicators = self.macro_indicators.is_configured(),
            catchup_gap_days = self.ingest.catchup_gap_days,
            stuck_minutes = self.supervisor.stuck_minutes,
            webhook = self.notify.webhook_url.is_some(),
            email = self.notify.email_configured(),
            "configuration loaded"
        );
    }

    /// The configuration as JSON with credentials, API keys and webhook
    /// URLs reduced to booleans.
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "postgres": {
                "host": self.postgres.host,
                "port": self.postgres.port,
                "database": self.postgres.database,
                "ssl_mode": self.postgres.ssl_mode,
                "max_connections": self.postgres.max_connections,
                "credentials": self.postgres.is_configured(),
            },
            "edgar": self.edgar,
            "analyst": {
                "api_url": self.analyst.api_url,
                "api_key": self.analyst.api_key.is_some(),
                "request_delay_ms": self.analyst.request_delay_ms,
            },
            "universe": self.universe,
            "macro_indicators": self.macro_indicators,
            "ingest": self.ingest,
            "supervisor": self.supervisor,
            "notify": {
                "webhook": self.notify.webhook_url.is_some(),
                "email": self.notify.email_configured(),
                "smtp_host": self.notify.smtp_host,
                "smtp_auth": self.notify.smtp_username.is_some(),
                "email_to": self.notify.email_to,
            },
        })
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn load(env: &ProfiledEnv) -> Self {
        Self {
            host: env.string("PG_HOST", "localhost"),
            port: env.parsed("PG_PORT", 5432),
            database: env.string("PG_DATABASE", "sentinel"),
            username: env.get("PG_USERNAME"),
            password: env.get("PG_PASSWORD"),
            ssl_mode: env.string("PG_SSL_MODE", "prefer"),
            max_connections: env.parsed("PG_MAX_CONNECTIONS", 5),
        }
    }

    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.username.as_deref().unwrap_or("postgres"),
            self.password.as_deref().unwrap_or(""),
            self.host,
            self.port,
            self.database,
            self.ssl_mode
        )
    }

    pub fn is_configured(&self) -> bool {
        self.username.is_some()
    }
}

// ── SEC EDGAR ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgarConfig {
    /// SEC rejects requests without a descriptive User-Agent naming a contact.
    pub user_agent: String,
    pub data_url: String,
    pub archive_url: String,
    /// Pause between consecutive requests; SEC allows at most 10 per second.
    pub request_delay_ms: u64,
    pub form_types: Vec<String>,
    /// Look-back of a "recent" fetch, in days.
    pub recent_days: u32,
}

impl EdgarConfig {
    fn load(env: &ProfiledEnv) -> Self {
        Self {
            user_agent: env.string("EDGAR_USER_AGENT", "filing-sentinel admin@example.com"),
            data_url: env.string("EDGAR_DATA_URL", "https://data.sec.gov"),
            archive_url: env.string("EDGAR_ARCHIVE_URL", "https://www.sec.gov/Archives"),
            request_delay_ms: env.parsed("EDGAR_REQUEST_DELAY_MS", 150),
            form_types: env.list("EDGAR_FORM_TYPES", "10-K,10-Q,8-K"),
            recent_days: env.parsed("EDGAR_RECENT_DAYS", 2),
        }
    }
}

// ── Analyst data provider ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalystConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub request_delay_ms: u64,
}

impl AnalystConfig {
    fn load(env: &ProfiledEnv) -> Self {
        Self {
            api_url: env.get("ANALYST_API_URL"),
            api_key: env.get("ANALYST_API_KEY"),
            request_delay_ms: env.parsed("ANALYST_REQUEST_DELAY_MS", 100),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_url.is_some()
    }
}

// ── Tracked companies ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseConfig {
    /// SEC ticker to CIK listing, ordered by market value.
    pub tickers_url: String,
    /// How many of the largest listed issuers to track.
    pub size: usize,
    /// Explicit tickers to track instead of the top `size`.
    pub tickers: Vec<String>,
}

impl UniverseConfig {
    fn load(env: &ProfiledEnv) -> Self {
        Self {
            tickers_url: env.string("UNIVERSE_TICKERS_URL", "https://www.sec.gov/files/company_tickers.json"),
            size: env.parsed("UNIVERSE_SIZE", 500),
            tickers: env.list("UNIVERSE_TICKERS", ""),
        }
    }
}

// ── Macro indicators ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroConfig {
    /// Base of a daily price-history API, `{price_url}/{symbol}`.
    pub price_url: Option<String>,
    pub dollar_symbol: String,
    /// Equity index used as a GDP-sentiment proxy.
    pub equity_symbol: String,
    pub request_delay_ms: u64,
}

impl MacroConfig {
    fn load(env: &ProfiledEnv) -> Self {
        Self {
            price_url: env.get("MACRO_PRICE_URL"),
            dollar_symbol: env.string("MACRO_DOLLAR_SYMBOL", "DX-Y.NYB"),
            equity_symbol: env.string("MACRO_EQUITY_SYMBOL", "SPY"),
            request_delay_ms: env.parsed("MACRO_REQUEST_DELAY_MS", 250),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.price_url.is_some()
    }
}

// ── Ingestion ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Newest stored filing older than this many days switches on catch-up mode.
    pub catchup_gap_days: u32,
    /// Upper bound on how far a catch-up backfill reaches.
    pub catchup_max_days: u32,
}

impl IngestConfig {
    fn load(env: &ProfiledEnv) -> Self {
        let defaults = Self::default();
        Self {
            catchup_gap_days: env.parsed("INGEST_CATCHUP_GAP_DAYS", defaults.catchup_gap_days),
            catchup_max_days: env.parsed("INGEST_CATCHUP_MAX_DAYS", defaults.catchup_max_days),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            catchup_gap_days: 2,
            catchup_max_days: 30,
        }
    }
}

// ── Supervisor ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    pub stuck_minutes: u32,
    pub filings_max_age_hours: u32,
    pub analyst_max_age_hours: u32,
    pub macro_max_age_hours: u32,
    pub failure_window: u32,
    /// Fraction of failed runs in the window above which an alert fires.
    pub failure_threshold: f64,
}

impl SupervisorConfig {
    fn load(env: &ProfiledEnv) -> Self {
        let d = Self::default();
        Self {
            stuck_minutes: env.parsed("SUPERVISOR_STUCK_MINUTES", d.stuck_minutes),
            filings_max_age_hours: env.parsed("SUPERVISOR_FILINGS_MAX_AGE_HOURS", d.filings_max_age_hours),
            analyst_max_age_hours: env.parsed("SUPERVISOR_ANALYST_MAX_AGE_HOURS", d.analyst_max_age_hours),
            macro_max_age_hours: env.parsed("SUPERVISOR_MACRO_MAX_AGE_HOURS", d.macro_max_age_hours),
            failure_window: env.parsed("SUPERVISOR_FAILURE_WINDOW", d.failure_window),
            failure_threshold: env.parsed("SUPERVISOR_FAILURE_THRESHOLD", d.failure_threshold),
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            stuck_minutes: 10,
            filings_max_age_hours: 30,
            analyst_max_age_hours: 48,
            macro_max_age_hours: 48,
            failure_window: 10,
            failure_threshold: 0.5,
        }
    }
}

// ── Alert channels ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_tls: Option<bool>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub email_from: Option<String>,
    pub email_to: Vec<String>,
}

impl NotifyConfig {
    fn load(env: &ProfiledEnv) -> Self {
        Self {
            webhook_url: env.get("ALERT_WEBHOOK_URL"),
            smtp_host: env.get("SMTP_HOST"),
            smtp_port: env.opt_parsed("SMTP_PORT"),
            smtp_tls: env.flag("SMTP_TLS"),
            smtp_username: env.get("SMTP_USERNAME"),
            smtp_password: env.get("SMTP_PASSWORD"),
            email_from: env.get("ALERT_EMAIL_FROM"),
            email_to: env.list("ALERT_EMAIL_TO", ""),
        }
    }

    pub fn email_configured(&self) -> bool {
        self.smtp_host.is_some() && self.email_from.is_some() && !self.email_to.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own profile prefix so parallel tests never share keys.

    #[test]
    fn profile_prefix_wins_over_plain_key() {
        env::set_var("CFGA_PG_HOST", "db.internal");
        env::set_var("CFGA_PG_PORT", "6543");
        let pg = PostgresConfig::load(&ProfiledEnv { profile: "CFGA" });
        assert_eq!(pg.host, "db.internal");
        assert_eq!(pg.port, 6543);
        env::remove_var("CFGA_PG_HOST");
        env::remove_var("CFGA_PG_PORT");
    }

    #[test]
    fn lists_trim_and_skip_blanks() {
        env::set_var("CFGB_EDGAR_FORM_TYPES", " 10-K , 8-K,, ");
        let edgar = EdgarConfig::load(&ProfiledEnv { profile: "CFGB" });
        assert_eq!(edgar.form_types, vec!["10-K", "8-K"]);
        env::remove_var("CFGB_EDGAR_FORM_TYPES");
    }

    #[test]
    fn bad_numbers_fall_back_and_flags_parse() {
        env::set_var("CFGC_SUPERVISOR_FAILURE_THRESHOLD", "lots");
        env::set_var("CFGC_SUPERVISOR_STUCK_MINUTES", " 15 ");
        env::set_var("CFGC_SMTP_TLS", "Off");
        let vars = ProfiledEnv { profile: "CFGC" };

        let sup = SupervisorConfig::load(&vars);
        assert_eq!(sup.failure_threshold, 0.5);
        assert_eq!(sup.stuck_minutes, 15);
        assert_eq!(NotifyConfig::load(&vars).smtp_tls, Some(false));

        env::remove_var("CFGC_SUPERVISOR_FAILURE_THRESHOLD");
        env::remove_var("CFGC_SUPERVISOR_STUCK_MINUTES");
        env::remove_var("CFGC_SMTP_TLS");
    }

    #[test]
    fn feed_sections_default_to_unconfigured() {
        env::set_var("CFGE_UNIVERSE_TICKERS", "aapl, MSFT");
        env::set_var("CFGE_UNIVERSE_SIZE", "50");
        let vars = ProfiledEnv { profile: "CFGE" };

        let universe = UniverseConfig::load(&vars);
        assert_eq!(universe.tickers, vec!["aapl", "MSFT"]);
        assert_eq!(universe.size, 50);
        assert!(universe.tickers_url.ends_with("company_tickers.json"));

        let macro_cfg = MacroConfig::load(&ProfiledEnv { profile: "CFGE_UNSET" });
        assert_eq!(macro_cfg.equity_symbol, "SPY");
        if env::var("MACRO_PRICE_URL").is_err() {
            assert!(!macro_cfg.is_configured());
        }

        env::remove_var("CFGE_UNIVERSE_TICKERS");
        env::remove_var("CFGE_UNIVERSE_SIZE");
    }

    #[test]
    fn supervisor_defaults() {
        let cfg = SupervisorConfig::default();
        assert_eq!(cfg.stuck_minutes, 10);
        assert_eq!(cfg.filings_max_age_hours, 30);
        assert_eq!(cfg.analyst_max_age_hours, 48);
        assert_eq!(cfg.macro_max_age_hours, 48);
        assert_eq!(cfg.failure_window, 10);
    }

    #[test]
    fn redacted_summary_hides_secrets() {
        env::set_var("CFGD_PG_PASSWORD", "hunter2");
        env::set_var("CFGD_ANALYST_API_KEY", "sk-live-123");
        env::set_var("CFGD_SMTP_PASSWORD", "mailpw");
        env::set_var("CFGD_ALERT_WEBHOOK_URL", "https://hooks.example.com/T0/secret-path");
        let summary = Config::for_profile("cfgd").redacted_summary().to_string();

        assert!(summary.contains("\"profile\":\"CFGD\""));
        for secret in ["hunter2", "sk-live-123", "mailpw", "secret-path"] {
            assert!(!summary.contains(secret), "{secret} leaked");
        }

        for key in ["PG_PASSWORD", "ANALYST_API_KEY", "SMTP_PASSWORD", "ALERT_WEBHOOK_URL"] {
            env::remove_var(format!("CFGD_{key}"));
        }
    }
}
