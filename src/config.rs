//! Service configuration, read once from the environment at startup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "BloomIQ";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Extensions accepted by `/predict`, lower-case.
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_UPLOAD_DIR: &str = "./temp_uploads";
const DEFAULT_MODEL_DIR: &str = "../models";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

const DEFAULT_ROBOFLOW_WORKSPACE: &str = "moh-s15o3";
const DEFAULT_ROBOFLOW_WORKFLOW_ID: &str = "custom-workflow";
const DEFAULT_ROBOFLOW_API_URL: &str = "https://serverless.roboflow.com";

const DEFAULT_KEEP_ALIVE_URL: &str = "https://bloomiq.onrender.com";
const DEFAULT_KEEP_ALIVE_INTERVAL_SECS: u64 = 600;

/// Default `tracing` filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,bloomiq_lib=debug"
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Which detector backend the server runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorBackend {
    /// Roboflow hosted workflow API.
    Roboflow,
    /// Local flower/fruit ONNX models (`onnx-detector` feature).
    Onnx,
}

impl std::str::FromStr for DetectorBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "roboflow" | "remote" => Ok(Self::Roboflow),
            "onnx" | "local" | "yolo" => Ok(Self::Onnx),
            other => Err(format!("unknown detector backend '{other}'")),
        }
    }
}

impl std::fmt::Display for DetectorBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Roboflow => write!(f, "roboflow"),
            Self::Onnx => write!(f, "onnx"),
        }
    }
}

/// Roboflow workflow coordinates.
#[derive(Debug, Clone)]
pub struct RoboflowConfig {
    pub api_key: String,
    pub workspace: String,
    pub workflow_id: String,
    pub api_url: String,
}

impl RoboflowConfig {
    /// API key with everything but the last four characters hidden.
    pub fn masked_api_key(&self) -> String {
        let tail: String = self
            .api_key
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("{}{}", "*".repeat(10), tail)
    }
}

impl Default for RoboflowConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            workspace: DEFAULT_ROBOFLOW_WORKSPACE.into(),
            workflow_id: DEFAULT_ROBOFLOW_WORKFLOW_ID.into(),
            api_url: DEFAULT_ROBOFLOW_API_URL.into(),
        }
    }
}

/// Full server configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub backend: DetectorBackend,
    pub upload_dir: PathBuf,
    pub model_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub roboflow: RoboflowConfig,
}

impl ServiceConfig {
    /// Build from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = parse_var(&lookup, "BLOOMIQ_BIND_ADDR", DEFAULT_BIND_ADDR)?;
        let backend = parse_var(&lookup, "BLOOMIQ_DETECTOR", "roboflow")?;
        let max_upload_bytes = parse_var(
            &lookup,
            "BLOOMIQ_MAX_UPLOAD_BYTES",
            &DEFAULT_MAX_UPLOAD_BYTES.to_string(),
        )?;

        let upload_dir = lookup("BLOOMIQ_UPLOAD_DIR")
            .unwrap_or_else(|| DEFAULT_UPLOAD_DIR.into())
            .into();
        let model_dir = lookup("BLOOMIQ_MODEL_DIR")
            .unwrap_or_else(|| DEFAULT_MODEL_DIR.into())
            .into();

        let defaults = RoboflowConfig::default();
        let roboflow = RoboflowConfig {
            api_key: lookup("ROBOFLOW_API_KEY").unwrap_or(defaults.api_key),
            workspace: lookup("ROBOFLOW_WORKSPACE").unwrap_or(defaults.workspace),
            workflow_id: lookup("ROBOFLOW_WORKFLOW_ID").unwrap_or(defaults.workflow_id),
            api_url: lookup("ROBOFLOW_API_URL").unwrap_or(defaults.api_url),
        };

        Ok(Self {
            bind_addr,
            backend,
            upload_dir,
            model_dir,
            max_upload_bytes,
            roboflow,
        })
    }

    pub fn flower_model_path(&self) -> PathBuf {
        self.model_dir.join("flower_model.onnx")
    }

    pub fn fruit_model_path(&self) -> PathBuf {
        self.model_dir.join("fruit_model.onnx")
    }

    /// Generic detector used when a trained model file is missing.
    pub fn fallback_model_path(&self) -> PathBuf {
        self.model_dir.join("yolov8n.onnx")
    }
}

/// Keep-alive pinger configuration.
#[derive(Debug, Clone)]
pub struct KeepAliveConfig {
    pub backend_url: String,
    pub interval: Duration,
    pub request_timeout: Duration,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_KEEP_ALIVE_URL.into(),
            interval: Duration::from_secs(DEFAULT_KEEP_ALIVE_INTERVAL_SECS),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl KeepAliveConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let secs: u64 = parse_var(
            &lookup,
            "KEEP_ALIVE_INTERVAL_SECS",
            &DEFAULT_KEEP_ALIVE_INTERVAL_SECS.to_string(),
        )?;
        if secs == 0 {
            return Err(ConfigError::InvalidValue {
                var: "KEEP_ALIVE_INTERVAL_SECS",
                value: "0".into(),
                reason: "interval must be at least one second".into(),
            });
        }
        let backend_url = lookup("KEEP_ALIVE_URL")
            .unwrap_or(defaults.backend_url)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            backend_url,
            interval: Duration::from_secs(secs),
            request_timeout: defaults.request_timeout,
        })
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value = lookup(var).unwrap_or_else(|| default.to_string());
    value.parse::<T>().map_err(|e| ConfigError::InvalidValue {
        var,
        value: value.clone(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_environment_empty() {
        let cfg = ServiceConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg.bind_addr.port(), 8000);
        assert_eq!(cfg.backend, DetectorBackend::Roboflow);
        assert_eq!(cfg.upload_dir, PathBuf::from("./temp_uploads"));
        assert_eq!(cfg.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(cfg.roboflow.workspace, "moh-s15o3");
        assert_eq!(cfg.roboflow.workflow_id, "custom-workflow");
        assert_eq!(cfg.roboflow.api_url, "https://serverless.roboflow.com");
        assert!(cfg.roboflow.api_key.is_empty());
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = ServiceConfig::from_lookup(lookup_from(&[
            ("BLOOMIQ_BIND_ADDR", "127.0.0.1:9100"),
            ("BLOOMIQ_DETECTOR", "onnx"),
            ("BLOOMIQ_MODEL_DIR", "/srv/models"),
            ("ROBOFLOW_API_KEY", "secret-key-1234"),
        ]))
        .unwrap();
        assert_eq!(cfg.bind_addr.to_string(), "127.0.0.1:9100");
        assert_eq!(cfg.backend, DetectorBackend::Onnx);
        assert_eq!(
            cfg.flower_model_path(),
            PathBuf::from("/srv/models/flower_model.onnx")
        );
        assert_eq!(
            cfg.fruit_model_path(),
            PathBuf::from("/srv/models/fruit_model.onnx")
        );
        assert_eq!(cfg.roboflow.api_key, "secret-key-1234");
    }

    #[test]
    fn invalid_backend_is_rejected() {
        let err = ServiceConfig::from_lookup(lookup_from(&[("BLOOMIQ_DETECTOR", "tensorflow")]))
            .unwrap_err();
        assert!(err.to_string().contains("BLOOMIQ_DETECTOR"));
    }

    #[test]
    fn invalid_bind_addr_is_rejected() {
        assert!(
            ServiceConfig::from_lookup(lookup_from(&[("BLOOMIQ_BIND_ADDR", "not-an-addr")]))
                .is_err()
        );
    }

    #[test]
    fn api_key_is_masked() {
        let rf = RoboflowConfig {
            api_key: "abcdefgh1234".into(),
            ..RoboflowConfig::default()
        };
        assert_eq!(rf.masked_api_key(), "**********1234");
        assert!(!rf.masked_api_key().contains("abcd"));
    }

    #[test]
    fn keep_alive_defaults() {
        let cfg = KeepAliveConfig::from_lookup(|_| None).unwrap();
        assert_eq!(cfg.backend_url, "https://bloomiq.onrender.com");
        assert_eq!(cfg.interval, Duration::from_secs(600));
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn keep_alive_trims_trailing_slash_and_rejects_zero_interval() {
        let cfg = KeepAliveConfig::from_lookup(lookup_from(&[
            ("KEEP_ALIVE_URL", "http://localhost:8000/"),
            ("KEEP_ALIVE_INTERVAL_SECS", "60"),
        ]))
        .unwrap();
        assert_eq!(cfg.backend_url, "http://localhost:8000");
        assert_eq!(cfg.interval, Duration::from_secs(60));

        assert!(
            KeepAliveConfig::from_lookup(lookup_from(&[("KEEP_ALIVE_INTERVAL_SECS", "0")]))
                .is_err()
        );
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
        assert_eq!(APP_NAME, "BloomIQ");
    }
}
