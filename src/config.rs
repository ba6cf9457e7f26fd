use std::{
    env,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    time::Duration,
};

const DEFAULT_SMOKE_PROMPT: &str = "Write a Rust function that reverses a string.";
const DEFAULT_PORT: u16 = 11434;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend_bin: String,
    pub backend_args: Vec<String>,
    /// `OLLAMA_HOST` exactly as the operator set it, handed to the backing service untouched.
    pub backend_host: Option<String>,
    pub backend_url: String,
    pub models_file: PathBuf,
    pub data_dir: Option<PathBuf>,
    pub ready_max_attempts: u32,
    pub ready_interval: Duration,
    pub request_timeout: Duration,
    pub smoke_prompt: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend_bin = lookup("OLLAMA_BIN").unwrap_or_else(|| "ollama".to_string());

        let backend_host = lookup("OLLAMA_HOST").filter(|v| !v.trim().is_empty());
        let backend_url = client_url(backend_host.as_deref().unwrap_or_default());

        let models_file = PathBuf::from(
            lookup("MODELS_FILE").unwrap_or_else(|| "/models.txt".to_string()),
        );
        let data_dir = lookup("OLLAMA_MODELS")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let ready_max_attempts = lookup("READY_MAX_RETRIES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        let ready_interval = lookup("READY_INTERVAL_SECS")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(1));
        let request_timeout = lookup("REQUEST_TIMEOUT_SECS")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Duration::from_secs(5));

        let smoke_prompt =
            lookup("SMOKE_PROMPT").unwrap_or_else(|| DEFAULT_SMOKE_PROMPT.to_string());

        Ok(Self {
            backend_bin,
            backend_args: vec!["serve".to_string()],
            backend_host,
            backend_url,
            models_file,
            data_dir,
            ready_max_attempts,
            ready_interval,
            request_timeout,
            smoke_prompt,
        })
    }
}

/// Where a client reaches a server bound to `raw`.
///
/// Accepts `host`, `host:port`, `[v6]:port` and an optional scheme. A missing
/// host or port takes the server's defaults, and a wildcard bind address is
/// reached over loopback.
fn client_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    let (scheme, rest) = match trimmed.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("http", trimmed),
    };

    let (host, port) = split_host_port(rest);
    let host = match host.parse::<IpAddr>() {
        Ok(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST).to_string(),
        Ok(IpAddr::V6(ip)) => format!("[{ip}]"),
        Ok(IpAddr::V4(ip)) => ip.to_string(),
        Err(_) if host.is_empty() => Ipv4Addr::LOCALHOST.to_string(),
        Err(_) => host.to_string(),
    };
    format!("{scheme}://{host}:{port}")
}

fn split_host_port(rest: &str) -> (&str, u16) {
    if let Ok(addr) = rest.parse::<SocketAddr>() {
        // Keep the textual host so v6 brackets are rebuilt in one place.
        let host = rest.rsplit_once(':').map_or(rest, |(host, _)| host);
        return (host.trim_start_matches('[').trim_end_matches(']'), addr.port());
    }
    if rest.parse::<IpAddr>().is_ok() {
        return (rest, DEFAULT_PORT);
    }
    let unbracketed = rest.trim_start_matches('[').trim_end_matches(']');
    if unbracketed.parse::<IpAddr>().is_ok() {
        return (unbracketed, DEFAULT_PORT);
    }
    match rest.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host, port),
            Err(_) => (rest, DEFAULT_PORT),
        },
        None => (rest, DEFAULT_PORT),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]);
        assert_eq!(config.backend_bin, "ollama");
        assert_eq!(config.backend_args, vec!["serve"]);
        assert_eq!(config.backend_host, None);
        assert_eq!(config.backend_url, "http://127.0.0.1:11434");
        assert_eq!(config.models_file, PathBuf::from("/models.txt"));
        assert_eq!(config.data_dir, None);
        assert_eq!(config.ready_max_attempts, 30);
        assert_eq!(config.ready_interval, Duration::from_secs(1));
    }

    #[test]
    fn overrides_are_honoured() {
        let config = config_from(&[
            ("MODELS_FILE", "/etc/preload/models.txt"),
            ("OLLAMA_MODELS", "/data/models"),
            ("READY_MAX_RETRIES", "5"),
            ("READY_INTERVAL_SECS", "2"),
        ]);
        assert_eq!(config.models_file, PathBuf::from("/etc/preload/models.txt"));
        assert_eq!(config.data_dir, Some(PathBuf::from("/data/models")));
        assert_eq!(config.ready_max_attempts, 5);
        assert_eq!(config.ready_interval, Duration::from_secs(2));
    }

    #[test]
    fn unparsable_numbers_fall_back_to_defaults() {
        let config = config_from(&[
            ("READY_MAX_RETRIES", "lots"),
            ("REQUEST_TIMEOUT_SECS", "-1"),
        ]);
        assert_eq!(config.ready_max_attempts, 30);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn bare_wildcard_host_keeps_raw_value_for_the_server() {
        let config = config_from(&[("OLLAMA_HOST", "0.0.0.0")]);
        assert_eq!(config.backend_host.as_deref(), Some("0.0.0.0"));
        assert_eq!(config.backend_url, "http://127.0.0.1:11434");
    }

    #[test]
    fn hostnames_are_kept() {
        let config = config_from(&[("OLLAMA_HOST", "localhost:11500")]);
        assert_eq!(config.backend_host.as_deref(), Some("localhost:11500"));
        assert_eq!(config.backend_url, "http://localhost:11500");

        assert_eq!(client_url("ollama.internal"), "http://ollama.internal:11434");
    }

    #[test]
    fn scheme_port_and_v6_forms() {
        assert_eq!(client_url("http://0.0.0.0:11500/"), "http://127.0.0.1:11500");
        assert_eq!(client_url("https://models.example:443"), "https://models.example:443");
        assert_eq!(client_url("[::]:11434"), "http://127.0.0.1:11434");
        assert_eq!(client_url("[::1]:8080"), "http://[::1]:8080");
        assert_eq!(client_url("::1"), "http://[::1]:11434");
        assert_eq!(client_url(":11600"), "http://127.0.0.1:11600");
    }
}
