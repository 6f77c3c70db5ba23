use clap::Parser;

/// inverter-link - talk to Voltronic and Modbus solar inverters
#[derive(Debug, Parser)]
#[clap(author, version)]
pub struct Options {
    /// Config file to read
    #[clap(short = 'c', long = "config", default_value = "config.yaml")]
    pub config_file: String,

    /// Optional runtime limit in seconds
    #[clap(short = 't', long = "time")]
    pub runtime: Option<u64>,

    /// Talk to this endpoint directly instead of polling the config
    /// (`/dev/ttyUSB0`, `tcp://host:port` or `modbus://host:port`)
    #[clap(short = 'e', long = "endpoint")]
    pub endpoint: Option<String>,

    /// One-shot query, e.g. QPIGS
    #[clap(long = "command", requires = "endpoint", conflicts_with = "setting")]
    pub command: Option<String>,

    /// One-shot setting write, e.g. output_source_priority=SBU
    #[clap(long = "set", requires = "endpoint")]
    pub setting: Option<String>,

    /// Modbus unit id for --endpoint
    #[clap(long = "unit-id", default_value_t = 1)]
    pub unit_id: u8,
}

impl Options {
    pub fn new() -> Self {
        Self::parse()
    }

    /// True when the run is a single command or write against `endpoint`.
    pub fn is_one_shot(&self) -> bool {
        self.command.is_some() || self.setting.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = Options::parse_from(["inverter-link"]);
        assert_eq!(options.config_file, "config.yaml");
        assert_eq!(options.runtime, None);
        assert_eq!(options.unit_id, 1);
        assert!(!options.is_one_shot());
    }

    #[test]
    fn one_shot() {
        let options = Options::parse_from([
            "inverter-link",
            "--endpoint",
            "tcp://10.0.0.2:8899",
            "--command",
            "QPIGS",
        ]);
        assert!(options.is_one_shot());
        assert_eq!(options.command.as_deref(), Some("QPIGS"));
    }

    #[test]
    fn command_needs_endpoint() {
        assert!(Options::try_parse_from(["inverter-link", "--command", "QPIGS"]).is_err());
        assert!(Options::try_parse_from([
            "inverter-link",
            "-e",
            "/dev/ttyUSB0",
            "--command",
            "QPIGS",
            "--set",
            "battery_type=AGM"
        ])
        .is_err());
    }
}
