use std::path::PathBuf;

use tracing::{info, warn};

pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
/// Valid bcrypt work factors.
const PASSWORD_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub url: String,
    pub anon_key: String,
    /// Admin key for identity changes; the anon key is used when absent.
    pub service_key: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimbioConfig {
    /// `None` runs the daemon local-only.
    pub remote: Option<RemoteConfig>,
    /// Workspace opened at startup, before any `workspace.select`.
    pub workspace: Option<PathBuf>,
    /// bcrypt work factor for stored passwords; `None` uses `bcrypt::DEFAULT_COST`.
    pub password_cost: Option<u32>,
}

impl SimbioConfig {
    /// Reads `SIMBIO_*` variables from the process environment (after `.env`).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let remote = match (get("SIMBIO_REMOTE_URL"), get("SIMBIO_REMOTE_KEY")) {
            (Some(url), Some(anon_key)) => {
                let timeout_secs = match get("SIMBIO_REMOTE_TIMEOUT_SECS") {
                    Some(raw) => raw.parse::<u64>().ok().filter(|v| *v > 0).unwrap_or_else(|| {
                        warn!(value = %raw, "invalid SIMBIO_REMOTE_TIMEOUT_SECS, using default");
                        DEFAULT_TIMEOUT_SECS
                    }),
                    None => DEFAULT_TIMEOUT_SECS,
                };
                Some(RemoteConfig {
                    url,
                    anon_key,
                    service_key: get("SIMBIO_REMOTE_SERVICE_KEY"),
                    timeout_secs,
                })
            }
            (Some(_), None) => {
                warn!("SIMBIO_REMOTE_URL set without SIMBIO_REMOTE_KEY; running local-only");
                None
            }
            _ => None,
        };

        let password_cost = get("SIMBIO_PASSWORD_COST").and_then(|raw| {
            let cost = raw.parse::<u32>().ok().filter(|c| PASSWORD_COST_RANGE.contains(c));
            if cost.is_none() {
                warn!(value = %raw, "invalid SIMBIO_PASSWORD_COST, using default");
            }
            cost
        });

        Self {
            remote,
            workspace: get("SIMBIO_WORKSPACE").map(PathBuf::from),
            password_cost,
        }
    }

    pub fn password_cost(&self) -> u32 {
        self.password_cost.unwrap_or(bcrypt::DEFAULT_COST)
    }
}

/// Loads `.env` from the working directory if present. Existing variables win.
pub fn load_env_file() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => Some(path),
        Err(e) if e.not_found() => None,
        Err(e) => {
            // Logging is not up yet at this point.
            eprintln!("simbiod: ignoring unreadable .env: {e}");
            None
        }
    }
}

pub fn log_summary(config: &SimbioConfig, env_file: Option<&PathBuf>) {
    if let Some(path) = env_file {
        info!("loaded environment from: {}", path.display());
    }
    match &config.remote {
        Some(r) => info!(url = %r.url, timeout_secs = r.timeout_secs, "remote store configured"),
        None => info!("no remote store configured; pushes will be skipped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn remote_needs_url_and_key() {
        let cfg = SimbioConfig::from_lookup(lookup(&[("SIMBIO_REMOTE_URL", "https://x.example")]));
        assert_eq!(cfg.remote, None);

        let cfg = SimbioConfig::from_lookup(lookup(&[
            ("SIMBIO_REMOTE_URL", "https://x.example"),
            ("SIMBIO_REMOTE_KEY", "anon"),
        ]));
        let remote = cfg.remote.expect("remote");
        assert_eq!(remote.anon_key, "anon");
        assert_eq!(remote.service_key, None);
        assert_eq!(remote.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn bad_timeout_falls_back_and_workspace_is_read() {
        let cfg = SimbioConfig::from_lookup(lookup(&[
            ("SIMBIO_REMOTE_URL", "https://x.example"),
            ("SIMBIO_REMOTE_KEY", "anon"),
            ("SIMBIO_REMOTE_SERVICE_KEY", "svc"),
            ("SIMBIO_REMOTE_TIMEOUT_SECS", "soon"),
            ("SIMBIO_WORKSPACE", "/tmp/simbio-ws"),
        ]));
        let remote = cfg.remote.expect("remote");
        assert_eq!(remote.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(remote.service_key.as_deref(), Some("svc"));
        assert_eq!(cfg.workspace, Some(PathBuf::from("/tmp/simbio-ws")));
    }

    #[test]
    fn password_cost_is_bounded() {
        let cfg = SimbioConfig::from_lookup(lookup(&[("SIMBIO_PASSWORD_COST", "5")]));
        assert_eq!(cfg.password_cost(), 5);

        let cfg = SimbioConfig::from_lookup(lookup(&[("SIMBIO_PASSWORD_COST", "2")]));
        assert_eq!(cfg.password_cost, None);
        assert_eq!(cfg.password_cost(), bcrypt::DEFAULT_COST);
    }
}
