use crate::device::LinkOptions;
use crate::modbus::{CONFIG_COMMAND, SENSORS_COMMAND};
use crate::prelude::*;

use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub inverters: Vec<Inverter>,

    #[serde(default = "Config::default_loglevel")]
    pub loglevel: String,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "Config::default_queue_min_delay", rename = "queue_min_delay_ms")]
    pub queue_min_delay: Duration,

    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "Config::default_poll_interval", rename = "poll_interval_ms")]
    pub poll_interval: Duration,
}

// Inverter {{{
#[serde_as]
#[derive(Clone, Debug, Deserialize)]
pub struct Inverter {
    pub name: String,

    #[serde(default = "Config::default_enabled")]
    pub enabled: bool,

    pub endpoint: String,

    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(default, rename = "timeout_ms")]
    pub timeout: Option<Duration>,

    #[serde(default = "Config::default_unit_id")]
    pub unit_id: u8,

    pub commands: Option<Vec<String>>,

    #[serde(default = "Config::default_enabled")]
    pub line_feed_terminator: bool,
}

impl Inverter {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn endpoint(&self) -> Result<Endpoint> {
        self.endpoint.parse()
    }

    pub fn link_options(&self) -> LinkOptions {
        LinkOptions {
            timeout: self.timeout,
            unit_id: self.unit_id,
            line_feed_terminator: self.line_feed_terminator,
        }
    }

    /// Commands polled each cycle. Modbus devices default to the raw register
    /// blocks, everything else to the three ASCII telemetry queries.
    pub fn commands(&self) -> Vec<String> {
        if let Some(commands) = &self.commands {
            return commands.clone();
        }

        match self.endpoint().map(|e| e.family()) {
            Ok(ProtocolFamily::Modbus) => vec![SENSORS_COMMAND.to_string(), CONFIG_COMMAND.to_string()],
            _ => ["QPIGS", "QPIGS2", "QPIRI"].iter().map(|c| c.to_string()).collect(),
        }
    }
} // }}}

pub struct ConfigWrapper {
    config: Arc<Mutex<Config>>,
}

impl Clone for ConfigWrapper {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
        }
    }
}

impl ConfigWrapper {
    pub fn new(file: String) -> Result<Self> {
        let config = Config::new(file)?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            config: Arc::new(Mutex::new(config)),
        }
    }

    fn config(&self) -> MutexGuard<'_, Config> {
        self.config.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn inverters(&self) -> Vec<Inverter> {
        self.config().inverters.clone()
    }

    pub fn enabled_inverters(&self) -> Vec<Inverter> {
        self.inverters().into_iter().filter(|i| i.enabled()).collect()
    }

    pub fn inverter_with_name(&self, name: &str) -> Option<Inverter> {
        self.inverters().into_iter().find(|i| i.name() == name)
    }

    pub fn loglevel(&self) -> String {
        self.config().loglevel.clone()
    }

    pub fn queue_min_delay(&self) -> Duration {
        self.config().queue_min_delay
    }

    pub fn poll_interval(&self) -> Duration {
        self.config().poll_interval
    }
}

impl Config {
    pub fn new(file: String) -> Result<Self> {
        info!("Reading configuration from {}", file);
        let config = Self::load(&file)?;
        config.log_summary();
        Ok(config)
    }

    /// Reads and validates `file` without logging, for use before the
    /// logger exists.
    pub fn load(file: &str) -> Result<Self> {
        let content = std::fs::read_to_string(file)
            .map_err(|err| file_error_with_source!(err, "error reading {}", file))?;
        Self::from_yaml(&content)
    }

    pub fn log_summary(&self) {
        let config = self;
        info!("Configuration loaded successfully:");
        info!(
            "  Inverters: {} configured, {} enabled",
            config.inverters.len(),
            config.inverters.iter().filter(|i| i.enabled).count()
        );
        for (i, inv) in config.inverters.iter().enumerate() {
            info!("    Inverter[{}]: {}", i, inv.name);
            info!("      Enabled: {}", inv.enabled);
            info!("      Endpoint: {}", inv.endpoint);
            if let Some(timeout) = inv.timeout {
                info!("      Timeout: {}ms", timeout.as_millis());
            }
            info!("      Unit ID: {}", inv.unit_id);
            info!("      Commands: {}", inv.commands().join(", "));
        }
        info!("  Queue Min Delay: {}ms", config.queue_min_delay.as_millis());
        info!("  Poll Interval: {}ms", config.poll_interval.as_millis());
        info!("  Log Level: {}", config.loglevel);
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.inverters.is_empty() {
            bail!("at least one inverter must be configured");
        }
        if self.poll_interval.is_zero() {
            bail!("poll_interval_ms must be greater than 0");
        }

        let mut names = HashSet::new();
        for (i, inv) in self.inverters.iter().enumerate() {
            if inv.name.is_empty() {
                bail!("inverter[{}].name cannot be empty", i);
            }
            if !names.insert(inv.name.as_str()) {
                bail!("inverter[{}].name {} is used twice", i, inv.name);
            }
            if inv.endpoint.trim().is_empty() {
                bail!("inverter[{}].endpoint cannot be empty", i);
            }
            inv.endpoint()
                .map_err(|e| file_error!("inverter[{}].endpoint: {}", i, e))?;
            if !(1..=247).contains(&inv.unit_id) {
                bail!("inverter[{}].unit_id must be between 1 and 247", i);
            }
            if inv.timeout.map_or(false, |t| t.is_zero()) {
                bail!("inverter[{}].timeout_ms must be greater than 0", i);
            }
            if inv.commands.as_ref().map_or(false, |c| c.is_empty()) {
                bail!("inverter[{}].commands cannot be an empty list", i);
            }
        }

        Ok(())
    }

    fn default_enabled() -> bool {
        true
    }

    fn default_loglevel() -> String {
        "info".to_string()
    }

    fn default_queue_min_delay() -> Duration {
        crate::queue::DEFAULT_MIN_DELAY
    }

    fn default_poll_interval() -> Duration {
        Duration::from_secs(10)
    }

    fn default_unit_id() -> u8 {
        crate::transport::modbus::DEFAULT_UNIT_ID
    }
}
