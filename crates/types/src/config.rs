//! Application and engine configuration types.
//!
//! The configuration file is JSON. Every section is optional; the built-in
//! units and history resolutions are always present and entries with the same
//! name in the file replace them.

use crate::attr::{AttrFlags, AttrKind};
use crate::error::ConfigError;
use crate::history::SampleWidth;
use crate::unit::UnitVariant;
use serde::{Deserialize, Serialize};

/// Name of the group interfaces are reported into
pub const DEFAULT_GROUP: &str = "intf";

/// Lower bound for the number of sweeps an unrefreshed element survives
pub const MIN_LIFECYCLES: i64 = 2;

fn default_version() -> u32 {
    1
}

fn default_interval() -> f64 {
    1.0
}

fn default_variance() -> f64 {
    0.1
}

fn default_lifetime() -> f64 {
    30.0
}

fn default_history_size() -> usize {
    60
}

/// Application-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Version of the config format
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub settings: EngineSettings,
    /// Additional or overriding unit definitions
    #[serde(default)]
    pub units: Vec<UnitConfig>,
    /// Additional or overriding history resolutions
    #[serde(default)]
    pub histories: Vec<HistoryConfig>,
    #[serde(default)]
    pub attrs: Vec<AttrConfig>,
    /// Per element overrides
    #[serde(default)]
    pub elements: Vec<ElementConfig>,
    /// Input module selection, e.g. `dummy:num=3;randomize`
    #[serde(default)]
    pub input: Option<String>,
    /// Output module selection, e.g. `ascii:diagram=details`
    #[serde(default)]
    pub output: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            settings: EngineSettings::default(),
            units: Vec::new(),
            histories: Vec::new(),
            attrs: Vec::new(),
            elements: Vec::new(),
            input: None,
            output: None,
        }
    }
}

impl AppConfig {
    /// Built-in units merged with the configured ones.
    ///
    /// A configured variant replaces the built-in variant of the same unit.
    pub fn effective_units(&self) -> Vec<UnitConfig> {
        let mut units = builtin_units();

        for unit in &self.units {
            match units.iter_mut().find(|u| u.name == unit.name) {
                Some(existing) => {
                    for variant in &unit.variants {
                        existing.variants.retain(|v| v.variant != variant.variant);
                        existing.variants.push(variant.clone());
                    }
                }
                None => units.push(unit.clone()),
            }
        }

        units
    }

    /// Built-in history resolutions merged with the configured ones.
    pub fn effective_histories(&self) -> Vec<HistoryConfig> {
        let mut histories = builtin_histories();

        for history in &self.histories {
            match histories.iter_mut().find(|h| h.name == history.name) {
                Some(existing) => *existing = history.clone(),
                None => histories.push(history.clone()),
            }
        }

        histories
    }

    /// Check everything that can be checked without the engine's registries
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.settings.validate()?;

        for unit in &self.units {
            unit.validate()?;
        }

        for history in &self.histories {
            if history.size == 0 {
                return Err(ConfigError::EmptyHistory(history.name.clone()));
            }
        }

        Ok(())
    }
}

/// Timing and presentation settings of the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Seconds between two read passes
    #[serde(default = "default_interval")]
    pub read_interval: f64,
    /// Seconds a rate is computed over
    #[serde(default = "default_interval")]
    pub rate_interval: f64,
    /// Tolerated rate interval deviation, as a fraction of `rate_interval`
    #[serde(default = "default_variance")]
    pub variance: f64,
    /// Tolerated history interval deviation
    #[serde(default = "default_variance")]
    pub history_variance: f64,
    /// Seconds an element survives without being reported
    #[serde(default = "default_lifetime")]
    pub lifetime: f64,
    /// Admit every element regardless of policy and hide overrides
    #[serde(default)]
    pub show_all: bool,
    /// Fixed unit exponent (0 = base unit); dynamic when unset
    #[serde(default)]
    pub unit_exp: Option<u32>,
    #[serde(default)]
    pub use_si: bool,
    #[serde(default)]
    pub use_bit: bool,
    /// Element admission policy, e.g. `eth*,!eth1`
    #[serde(default)]
    pub policy: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            read_interval: default_interval(),
            rate_interval: default_interval(),
            variance: default_variance(),
            history_variance: default_variance(),
            lifetime: default_lifetime(),
            show_all: false,
            unit_exp: None,
            use_si: false,
            use_bit: false,
            policy: String::new(),
        }
    }
}

impl EngineSettings {
    /// Absolute rate variance in seconds
    pub fn rate_variance(&self) -> f64 {
        self.variance * self.rate_interval
    }

    /// Number of sweeps an element survives without a lifesign
    pub fn base_lifecycles(&self) -> i64 {
        let cycles = (self.lifetime / self.read_interval).floor();
        (cycles as i64).max(MIN_LIFECYCLES)
    }

    /// The variant tables should be taken from
    pub fn unit_variant(&self) -> UnitVariant {
        if self.use_bit {
            UnitVariant::Bit
        } else if self.use_si {
            UnitVariant::Si
        } else {
            UnitVariant::Default
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("read_interval", self.read_interval),
            ("rate_interval", self.rate_interval),
            ("history_variance", self.history_variance),
        ];

        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::InvalidSetting { name, value });
            }
        }

        let non_negative = [("variance", self.variance), ("lifetime", self.lifetime)];

        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::InvalidSetting { name, value });
            }
        }

        Ok(())
    }
}

/// Divisor table of one unit variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitVariantConfig {
    pub variant: UnitVariant,
    /// Divisors in ascending order
    pub div: Vec<f64>,
    /// Label for each divisor
    pub txt: Vec<String>,
}

impl UnitVariantConfig {
    fn new(variant: UnitVariant, div: &[f64], txt: &[&str]) -> Self {
        Self {
            variant,
            div: div.to_vec(),
            txt: txt.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Unit definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitConfig {
    pub name: String,
    #[serde(default)]
    pub variants: Vec<UnitVariantConfig>,
}

impl UnitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.variants.iter().any(|v| v.div.len() != v.txt.len()) {
            return Err(ConfigError::DivisorMismatch(self.name.clone()));
        }
        Ok(())
    }
}

/// History resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub name: String,
    /// Seconds per sample; 0 means "same as the read interval"
    #[serde(default = "default_interval")]
    pub interval: f64,
    /// Number of samples kept
    #[serde(default = "default_history_size")]
    pub size: usize,
    #[serde(default, rename = "type")]
    pub width: SampleWidth,
}

impl HistoryConfig {
    fn new(name: &str, interval: f64) -> Self {
        Self {
            name: name.to_string(),
            interval,
            size: default_history_size(),
            width: SampleWidth::Bits64,
        }
    }

    pub fn resolved_interval(&self, read_interval: f64) -> f64 {
        if self.interval == 0.0 {
            read_interval
        } else {
            self.interval
        }
    }
}

/// Attribute definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttrConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub unit: String,
    #[serde(default, rename = "type")]
    pub kind: AttrKind,
    /// Always collect history
    #[serde(default)]
    pub history: bool,
    #[serde(default)]
    pub ignore_overflows: bool,
}

impl AttrConfig {
    pub fn flags(&self) -> AttrFlags {
        let mut flags = AttrFlags::empty();
        if self.history {
            flags.insert(AttrFlags::FORCE_HISTORY);
        }
        if self.ignore_overflows {
            flags.insert(AttrFlags::IGNORE_OVERFLOWS);
        }
        flags
    }
}

/// Static per element override
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementConfig {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Explicit override of the policy: `Some(true)` always admits,
    /// `Some(false)` always hides, `None` leaves the decision to the policy
    #[serde(default)]
    pub show: Option<bool>,
    /// Capacity in bytes per second for both directions
    #[serde(default)]
    pub max: u64,
    #[serde(default)]
    pub rxmax: u64,
    #[serde(default)]
    pub txmax: u64,
}

impl ElementConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            show: None,
            max: 0,
            rxmax: 0,
            txmax: 0,
        }
    }

    pub fn rx_max(&self) -> u64 {
        if self.rxmax != 0 {
            self.rxmax
        } else {
            self.max
        }
    }

    pub fn tx_max(&self) -> u64 {
        if self.txmax != 0 {
            self.txmax
        } else {
            self.max
        }
    }
}

/// Units every installation knows about
pub fn builtin_units() -> Vec<UnitConfig> {
    let binary = [1.0, 1024.0, 1048576.0, 1073741824.0, 1099511627776.0];
    let decimal = [1.0, 1e3, 1e6, 1e9, 1e12];
    let bits = [0.125, 125.0, 125000.0, 125000000.0, 125000000000.0];
    let bit_labels = ["b", "Kb", "Mb", "Gb", "Tb"];

    vec![
        UnitConfig {
            name: "byte".to_string(),
            variants: vec![
                UnitVariantConfig::new(
                    UnitVariant::Default,
                    &binary,
                    &["B", "KiB", "MiB", "GiB", "TiB"],
                ),
                UnitVariantConfig::new(UnitVariant::Si, &decimal, &["B", "KB", "MB", "GB", "TB"]),
                UnitVariantConfig::new(UnitVariant::Bit, &bits, &bit_labels),
            ],
        },
        UnitConfig {
            name: "bit".to_string(),
            variants: UnitVariant::ALL
                .iter()
                .map(|v| UnitVariantConfig::new(*v, &decimal, &bit_labels))
                .collect(),
        },
        UnitConfig {
            name: "number".to_string(),
            variants: vec![UnitVariantConfig::new(
                UnitVariant::Default,
                &decimal,
                &["", "K", "M", "G", "T"],
            )],
        },
        UnitConfig {
            name: "percent".to_string(),
            variants: vec![UnitVariantConfig::new(UnitVariant::Default, &[1.0], &["%"])],
        },
    ]
}

/// Second, minute, hour and day resolutions, 60 samples each
pub fn builtin_histories() -> Vec<HistoryConfig> {
    vec![
        HistoryConfig::new("second", 1.0),
        HistoryConfig::new("minute", 60.0),
        HistoryConfig::new("hour", 3600.0),
        HistoryConfig::new("day", 86400.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.version, 1);
        assert_eq!(config.settings.read_interval, 1.0);
        assert_eq!(config.settings.lifetime, 30.0);
        assert_eq!(config.effective_histories().len(), 4);
        assert_eq!(config.effective_units().len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_history_override_replaces_builtin() {
        let json = r#"{ "histories": [
            { "name": "second", "interval": 0.5, "size": 120, "type": "16bit" },
            { "name": "week", "interval": 604800 }
        ] }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        let histories = config.effective_histories();

        assert_eq!(histories.len(), 5);
        assert_eq!(histories[0].size, 120);
        assert_eq!(histories[0].width, SampleWidth::Bits16);
        assert_eq!(histories[4].name, "week");
        assert_eq!(histories[4].size, 60);
    }

    #[test]
    fn test_unit_variant_override() {
        let json = r#"{ "units": [
            { "name": "number", "variants": [
                { "variant": "si", "div": [1, 1000], "txt": ["", "k"] }
            ] }
        ] }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        let units = config.effective_units();
        let number = units.iter().find(|u| u.name == "number").unwrap();

        assert_eq!(number.variants.len(), 2);
        assert!(number.variants.iter().any(|v| v.variant == UnitVariant::Si));
    }

    #[test]
    fn test_divisor_mismatch_rejected() {
        let unit = UnitConfig {
            name: "broken".to_string(),
            variants: vec![UnitVariantConfig::new(UnitVariant::Default, &[1.0, 2.0], &["x"])],
        };
        assert_eq!(
            unit.validate(),
            Err(ConfigError::DivisorMismatch("broken".to_string()))
        );
    }

    #[test]
    fn test_invalid_read_interval() {
        let settings = EngineSettings {
            read_interval: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidSetting { name: "read_interval", .. })
        ));
    }

    #[test]
    fn test_base_lifecycles() {
        let mut settings = EngineSettings::default();
        assert_eq!(settings.base_lifecycles(), 30);

        settings.lifetime = 1.0;
        assert_eq!(settings.base_lifecycles(), MIN_LIFECYCLES);
    }

    #[test]
    fn test_element_config_max() {
        let json = r#"{ "name": "eth0", "max": 1000, "txmax": 50 }"#;
        let config: ElementConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.show, None);
        assert_eq!(config.rx_max(), 1000);
        assert_eq!(config.tx_max(), 50);
    }

    #[test]
    fn test_attr_config_flags() {
        let json = r#"{ "name": "bytes", "unit": "byte", "type": "counter", "history": true }"#;
        let config: AttrConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.kind, AttrKind::Counter);
        assert!(config.flags().contains(AttrFlags::FORCE_HISTORY));
        assert!(!config.flags().contains(AttrFlags::IGNORE_OVERFLOWS));
    }
}
