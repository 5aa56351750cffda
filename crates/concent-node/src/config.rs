use anyhow::{Context, Result};
use concent_types::ProtocolTimes;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node: NodeSettings,
    pub protocol: ProtocolConfig,
    pub authentication: AuthenticationConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSettings {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Protocol version this service speaks, `major.minor.patch`.
    pub version: String,
    pub concent_messaging_time: i64,
    pub minimum_upload_rate: u64,
    pub download_leadin_time: i64,
    pub force_acceptance_time: i64,
    pub verification_time_multiplier: f64,
    pub verifier_threads: u32,
    pub custom_protocol_times: bool,
}

impl From<ProtocolConfig> for ProtocolTimes {
    fn from(config: ProtocolConfig) -> Self {
        ProtocolTimes {
            concent_messaging_time: config.concent_messaging_time,
            minimum_upload_rate: config.minimum_upload_rate,
            download_leadin_time: config.download_leadin_time,
            force_acceptance_time: config.force_acceptance_time,
            verification_time_multiplier: config.verification_time_multiplier,
            verifier_threads: config.verifier_threads,
            custom_protocol_times: config.custom_protocol_times,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationConfig {
    /// How far into the future a message timestamp may lie, seconds.
    pub max_future_drift: i64,
    /// Maximum accepted message age, seconds.
    pub max_message_age: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often the deadline sweep runs, seconds.
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty", "compact" or "json".
    pub format: String,
    pub file_output: Option<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let times = ProtocolTimes::default();
        Self {
            node: NodeSettings {
                name: "concent".to_string(),
            },
            protocol: ProtocolConfig {
                version: "2.18.1".to_string(),
                concent_messaging_time: times.concent_messaging_time,
                minimum_upload_rate: times.minimum_upload_rate,
                download_leadin_time: times.download_leadin_time,
                force_acceptance_time: times.force_acceptance_time,
                verification_time_multiplier: times.verification_time_multiplier,
                verifier_threads: times.verifier_threads,
                custom_protocol_times: times.custom_protocol_times,
            },
            authentication: AuthenticationConfig {
                max_future_drift: 300,
                max_message_age: 14_400,
            },
            scheduler: SchedulerConfig {
                poll_interval_secs: 5,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
                file_output: None,
            },
        }
    }
}

impl NodeConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }
}
