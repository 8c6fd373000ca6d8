//! Runtime configuration: TOML file defaults, then CLI/env overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sima_iot_core::aggregate::DEFAULT_RATE_WINDOW_MS;
use sima_iot_core::buffer::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_FLAT_CAPACITY};
use sima_iot_core::{BufferConfig, ChannelKind, ConfigError, ResourceId};

use crate::cli::MonitorOpts;

pub const DEFAULT_RESOURCE_ID: &str = "P-001";
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_REPORT_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// WebSocket base URL. `None` means every connect fails over.
    pub stream_url: Option<String>,
    /// Replay a recorded capture instead of connecting to `stream_url`.
    pub replay_file: Option<PathBuf>,
    pub replay_interval_ms: u64,
    /// Bound on establishing the live subscription; elapsing fails over.
    pub connect_timeout_ms: u64,
    pub resource_id: String,
    pub channels: Vec<ChannelKind>,
    pub channel_capacity: usize,
    pub flat_capacity: usize,
    pub tick_interval_ms: u64,
    /// Simulator seed. Random per failover when absent.
    pub seed: Option<u64>,
    pub rate_window_ms: u64,
    /// Periodic report interval; 0 disables the report.
    pub report_interval_ms: u64,
    pub export_dir: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stream_url: None,
            replay_file: None,
            replay_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            resource_id: DEFAULT_RESOURCE_ID.to_string(),
            channels: ChannelKind::DEFAULT_ENABLED.to_vec(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            flat_capacity: DEFAULT_FLAT_CAPACITY,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            seed: None,
            rate_window_ms: DEFAULT_RATE_WINDOW_MS,
            report_interval_ms: DEFAULT_REPORT_INTERVAL_MS,
            export_dir: PathBuf::from("."),
        }
    }
}

impl RuntimeConfig {
    /// Load from `path`, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read config {}: {e}", path.display()))?;
        Self::from_toml(&text)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {e}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Flags and environment win over the file.
    pub fn apply_overrides(&mut self, opts: &MonitorOpts) {
        if let Some(url) = &opts.stream_url {
            self.stream_url = Some(url.clone());
        }
        if let Some(path) = &opts.replay_file {
            self.replay_file = Some(path.clone());
        }
        if let Some(id) = &opts.resource {
            self.resource_id = id.clone();
        }
        if !opts.channels.is_empty() {
            self.channels = opts.channels.clone();
        }
        if let Some(n) = opts.channel_capacity {
            self.channel_capacity = n;
        }
        if let Some(n) = opts.flat_capacity {
            self.flat_capacity = n;
        }
        if let Some(ms) = opts.connect_timeout_ms {
            self.connect_timeout_ms = ms;
        }
        if let Some(ms) = opts.tick_interval_ms {
            self.tick_interval_ms = ms;
        }
        if opts.seed.is_some() {
            self.seed = opts.seed;
        }
        if let Some(ms) = opts.rate_window_ms {
            self.rate_window_ms = ms;
        }
        if let Some(ms) = opts.report_interval_ms {
            self.report_interval_ms = ms;
        }
        if let Some(dir) = &opts.export_dir {
            self.export_dir = dir.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.buffer_config().validate()?;
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration("tick_interval_ms"));
        }
        if self.rate_window_ms == 0 {
            return Err(ConfigError::ZeroDuration("rate_window_ms"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration("connect_timeout_ms"));
        }
        if self.replay_file.is_some() && self.replay_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration("replay_interval_ms"));
        }
        Ok(())
    }

    pub fn buffer_config(&self) -> BufferConfig {
        BufferConfig {
            channel_capacity: self.channel_capacity,
            flat_capacity: self.flat_capacity,
        }
    }

    pub fn resource(&self) -> ResourceId {
        ResourceId::new(self.resource_id.clone())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn replay_interval(&self) -> Duration {
        Duration::from_millis(self.replay_interval_ms)
    }

    pub fn report_interval(&self) -> Option<Duration> {
        (self.report_interval_ms > 0).then(|| Duration::from_millis(self.report_interval_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = RuntimeConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.channel_capacity, 180);
        assert_eq!(cfg.flat_capacity, 300);
        assert_eq!(cfg.tick_interval_ms, 1000);
        assert_eq!(cfg.rate_window_ms, 60_000);
        assert_eq!(cfg.connect_timeout(), Duration::from_secs(5));
        assert_eq!(
            cfg.channels,
            vec![ChannelKind::Temp, ChannelKind::Humid, ChannelKind::Light]
        );
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = RuntimeConfig::from_toml(
            r#"
            stream_url = "ws://localhost:8080/api/iot/stream"
            resource_id = "site-7"
            channels = ["temp", "co2"]
            seed = 42
            "#,
        )
        .expect("parse");
        assert_eq!(
            cfg.stream_url.as_deref(),
            Some("ws://localhost:8080/api/iot/stream")
        );
        assert_eq!(cfg.resource(), ResourceId::new("site-7"));
        assert_eq!(cfg.channels, vec![ChannelKind::Temp, ChannelKind::Co2]);
        assert_eq!(cfg.seed, Some(42));
        assert_eq!(cfg.channel_capacity, 180);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(RuntimeConfig::from_toml("bogus = 1").is_err());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = RuntimeConfig {
            channel_capacity: 0,
            ..RuntimeConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroChannelCapacity));

        cfg.channel_capacity = 400;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::FlatCapacityTooSmall { flat: 300, channel: 400 })
        ));

        cfg.channel_capacity = 10;
        cfg.tick_interval_ms = 0;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::ZeroDuration("tick_interval_ms"))
        );

        cfg.tick_interval_ms = 1000;
        cfg.rate_window_ms = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroDuration("rate_window_ms")));

        cfg.rate_window_ms = 60_000;
        cfg.connect_timeout_ms = 0;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::ZeroDuration("connect_timeout_ms"))
        );
    }

    #[test]
    fn overrides_win_over_file() {
        let mut cfg = RuntimeConfig::from_toml("resource_id = \"from-file\"\nseed = 1").expect("parse");
        let opts = MonitorOpts {
            resource: Some("from-flag".into()),
            seed: Some(9),
            channels: vec![ChannelKind::Noise],
            ..MonitorOpts::default()
        };
        cfg.apply_overrides(&opts);
        assert_eq!(cfg.resource_id, "from-flag");
        assert_eq!(cfg.seed, Some(9));
        assert_eq!(cfg.channels, vec![ChannelKind::Noise]);
        assert_eq!(cfg.tick_interval_ms, 1000);
    }

    #[test]
    fn load_without_path_is_default() {
        let cfg = RuntimeConfig::load(None).expect("load");
        assert_eq!(cfg, RuntimeConfig::default());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("sima-iot.toml");
        std::fs::write(&path, "report_interval_ms = 0\n").expect("write");
        let cfg = RuntimeConfig::load(Some(&path)).expect("load");
        assert_eq!(cfg.report_interval(), None);
    }
}
