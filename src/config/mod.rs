use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_SHARE_URL: &str = "https://api.whatsapp.com/send";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// `{data_dir}/config.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// Override the analysis/pricing service base URL.
    api_base_url: Option<String>,
    /// Identity service base URL. Omit to run without authentication
    /// (every protected command then redirects to login).
    identity_url: Option<String>,
    /// Public API key sent to the identity service alongside user tokens.
    identity_api_key: Option<String>,
    /// Message-composition target for sharing proposals.
    share_url: Option<String>,
    /// Log level filter string, e.g. "debug", "info,finportal=trace" (default: "info").
    log: Option<String>,
    /// Log output format: "pretty" (default, human-readable) | "json".
    log_format: Option<String>,
    /// Per-request HTTP timeout in seconds (default: 10).
    http_timeout_secs: Option<u64>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("config.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse config.toml — using defaults");
            None
        }
    }
}

// ─── PortalConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub data_dir: PathBuf,
    /// Analysis/pricing service base URL (FINPORTAL_API_URL env var,
    /// default: http://127.0.0.1:5000).
    pub api_base_url: String,
    /// Identity service base URL (FINPORTAL_IDENTITY_URL env var).
    /// None means no identity service is configured.
    pub identity_url: Option<String>,
    /// Public API key for the identity service (FINPORTAL_IDENTITY_KEY env var).
    pub identity_api_key: Option<String>,
    /// Message-composition target (FINPORTAL_SHARE_URL env var,
    /// default: https://api.whatsapp.com/send).
    pub share_url: String,
    pub log: String,
    /// Log output format: "pretty" (default) | "json".
    pub log_format: String,
    /// Per-request HTTP timeout in seconds.
    pub http_timeout_secs: u64,
}

impl PortalConfig {
    /// Build config from CLI/env args + optional TOML file.
    ///
    /// Priority (highest to lowest):
    ///   1. CLI / env — passed as `Some(value)` from clap
    ///   2. TOML file at `{data_dir}/config.toml`
    ///   3. Built-in defaults
    pub fn new(
        data_dir: Option<PathBuf>,
        api_base_url: Option<String>,
        log: Option<String>,
    ) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // Load TOML as the lowest-priority override layer
        let toml = load_toml(&data_dir).unwrap_or_default();

        let api_base_url = api_base_url
            .or(std::env::var("FINPORTAL_API_URL").ok().filter(|s| !s.is_empty()))
            .or(toml.api_base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let identity_url = std::env::var("FINPORTAL_IDENTITY_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.identity_url);

        let identity_api_key = std::env::var("FINPORTAL_IDENTITY_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.identity_api_key);

        let share_url = std::env::var("FINPORTAL_SHARE_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.share_url)
            .unwrap_or_else(|| DEFAULT_SHARE_URL.to_string());

        let log = log.or(toml.log).unwrap_or_else(|| "info".to_string());

        let log_format = std::env::var("FINPORTAL_LOG_FORMAT")
            .ok()
            .filter(|s| !s.is_empty())
            .or(toml.log_format)
            .unwrap_or_else(|| "pretty".to_string());

        let http_timeout_secs = toml
            .http_timeout_secs
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS);

        Self {
            data_dir,
            api_base_url,
            identity_url,
            identity_api_key,
            share_url,
            log,
            log_format,
            http_timeout_secs,
        }
    }
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/finportal
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("finportal");
        }
    }
    #[cfg(target_os = "linux")]
    {
        // $XDG_DATA_HOME/finportal or ~/.local/share/finportal
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("finportal");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("finportal");
        }
    }
    #[cfg(target_os = "windows")]
    {
        // %APPDATA%\finportal
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("finportal");
        }
    }
    // Fallback
    PathBuf::from(".finportal")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_layer_fills_gaps() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "api_base_url = \"https://api.example.test\"\nhttp_timeout_secs = 3\n",
        )
        .unwrap();

        let cfg = PortalConfig::new(Some(dir.path().to_path_buf()), None, None);
        assert_eq!(cfg.api_base_url, "https://api.example.test");
        assert_eq!(cfg.http_timeout_secs, 3);
        assert_eq!(cfg.share_url, DEFAULT_SHARE_URL);
    }

    #[test]
    fn cli_beats_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "api_base_url = \"https://toml.example.test\"\n",
        )
        .unwrap();

        let cfg = PortalConfig::new(
            Some(dir.path().to_path_buf()),
            Some("https://cli.example.test".to_string()),
            None,
        );
        assert_eq!(cfg.api_base_url, "https://cli.example.test");
    }

    #[test]
    fn defaults_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PortalConfig::new(Some(dir.path().to_path_buf()), None, None);
        assert_eq!(cfg.api_base_url, DEFAULT_API_BASE_URL);
        assert!(cfg.identity_url.is_none());
        assert_eq!(cfg.log, "info");
    }
}
