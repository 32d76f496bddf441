use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;

quick_error! {
    #[derive(Debug)]
    pub enum ConfigError {
        Io(err: io::Error) {
            from()
            display("config read error: {}", err)
            cause(err)
        }
        Parse(err: toml::de::Error) {
            from()
            display("config parse error: {}", err)
            cause(err)
        }
    }
}

/// machine settings, loaded from a toml document. missing keys keep their defaults
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct MachineConfig {
    /// disables the wall clock timer and seeds the BIOS tick counter with 0
    pub deterministic: bool,

    /// interval of the INT 08 timer tick
    pub timer_interval_ms: u64,

    /// logs each executed instruction with log::trace!
    pub trace: bool,

    /// SS:SP of a fresh session stack
    pub stack_segment: u16,
    pub stack_top: u16,

    /// segment the CLI loads programs into
    pub code_segment: u16,
    /// offset used by Machine::load_executable, also the initial IP
    pub code_offset: u16,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            deterministic: false,
            timer_interval_ms: 55,
            trace: false,
            stack_segment: 0x085F,
            stack_top: 0xFFFE,
            code_segment: 0x085F,
            code_offset: 0x0100,
        }
    }
}

impl MachineConfig {
    pub fn deterministic() -> Self {
        MachineConfig {
            deterministic: true,
            ..MachineConfig::default()
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    pub fn timer_interval(&self) -> Duration {
        Duration::from_millis(self.timer_interval_ms)
    }
}
