//! Unit registry and human readable value scaling.
//!
//! A unit has up to three divisor tables (default, SI, bit). When a value is
//! formatted the table of the active variant is used if the unit has one,
//! otherwise the default table.

use bwmon_types::{ConfigError, EngineSettings, UnitConfig, UnitVariant};

/// Handle of a registered unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitId(usize);

/// One divisor step of a unit
#[derive(Debug, Clone, PartialEq)]
pub struct Fraction {
    pub divisor: f64,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct Unit {
    name: String,
    variants: [Vec<Fraction>; 3],
}

impl Unit {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Divisor table for `variant`, falling back to the default table
    pub fn fractions(&self, variant: UnitVariant) -> &[Fraction] {
        let table = &self.variants[variant.index()];
        if table.is_empty() {
            &self.variants[UnitVariant::Default.index()]
        } else {
            table
        }
    }
}

/// A value divided down to a readable magnitude
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scaled<'a> {
    pub value: f64,
    pub label: &'a str,
    /// Suggested number of decimal places
    pub precision: usize,
}

#[derive(Debug, Clone, Default)]
pub struct UnitRegistry {
    units: Vec<Unit>,
    variant: UnitVariant,
    exponent: Option<u32>,
}

impl UnitRegistry {
    pub fn new(variant: UnitVariant, exponent: Option<u32>) -> Self {
        Self {
            units: Vec::new(),
            variant,
            exponent,
        }
    }

    /// Build a registry from unit definitions, using the variant and exponent
    /// selected in `settings`.
    pub fn from_configs(
        configs: &[UnitConfig],
        settings: &EngineSettings,
    ) -> Result<Self, ConfigError> {
        let mut registry = Self::new(settings.unit_variant(), settings.unit_exp);

        for config in configs {
            config.validate()?;
            let id = registry.add(&config.name);
            for variant in &config.variants {
                let fractions = variant
                    .div
                    .iter()
                    .zip(&variant.txt)
                    .map(|(divisor, label)| Fraction {
                        divisor: *divisor,
                        label: label.clone(),
                    })
                    .collect();
                registry.set_fractions(id, variant.variant, fractions);
            }
        }

        Ok(registry)
    }

    /// Register a unit, returning the existing handle if the name is taken.
    pub fn add(&mut self, name: &str) -> UnitId {
        if let Some(id) = self.lookup(name) {
            return id;
        }

        self.units.push(Unit {
            name: name.to_string(),
            variants: Default::default(),
        });
        UnitId(self.units.len() - 1)
    }

    /// Replace the divisor table of one variant. Entries are kept sorted by
    /// ascending divisor.
    pub fn set_fractions(&mut self, id: UnitId, variant: UnitVariant, mut fractions: Vec<Fraction>) {
        fractions.sort_by(|a, b| a.divisor.total_cmp(&b.divisor));
        self.units[id.0].variants[variant.index()] = fractions;
    }

    pub fn lookup(&self, name: &str) -> Option<UnitId> {
        self.units.iter().position(|u| u.name == name).map(UnitId)
    }

    pub fn get(&self, id: UnitId) -> &Unit {
        &self.units[id.0]
    }

    pub fn variant(&self) -> UnitVariant {
        self.variant
    }

    pub fn set_variant(&mut self, variant: UnitVariant) {
        self.variant = variant;
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Pick the divisor for `hint`.
    ///
    /// With a fixed exponent the n-th divisor of the table is used (clamped
    /// to the table), otherwise the largest divisor not exceeding `hint`.
    pub fn divisor(&self, hint: f64, id: UnitId) -> (f64, &str) {
        let fractions = self.get(id).fractions(self.variant);

        let chosen = match self.exponent {
            Some(exp) => fractions
                .get(exp as usize)
                .or_else(|| fractions.last()),
            None => fractions
                .iter()
                .rev()
                .find(|f| hint >= f.divisor)
                .or_else(|| fractions.first()),
        };

        match chosen {
            Some(f) => (f.divisor, f.label.as_str()),
            None => (1.0, ""),
        }
    }

    pub fn value_to_str(&self, value: f64, id: UnitId) -> Scaled<'_> {
        let (divisor, label) = self.divisor(value, id);
        let scaled = value / divisor;

        let precision = if divisor == 1.0 || scaled.fract() == 0.0 {
            0
        } else {
            2
        };

        Scaled {
            value: scaled,
            label,
            precision,
        }
    }

    /// Format a byte count, e.g. `"1.50MiB"`
    pub fn bytes_to_str(&self, bytes: u64) -> String {
        self.format_named(bytes as f64, "byte")
    }

    /// Format a bit count, e.g. `"10Mb"`
    pub fn bits_to_str(&self, bits: u64) -> String {
        self.format_named(bits as f64, "bit")
    }

    fn format_named(&self, value: f64, unit: &str) -> String {
        match self.lookup(unit) {
            Some(id) => {
                let s = self.value_to_str(value, id);
                format!("{:.*}{}", s.precision, s.value, s.label)
            }
            None => format!("{}", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bwmon_types::config::builtin_units;

    fn registry(settings: &EngineSettings) -> UnitRegistry {
        UnitRegistry::from_configs(&builtin_units(), settings).unwrap()
    }

    #[test]
    fn test_dynamic_divisor() {
        let units = registry(&EngineSettings::default());
        let byte = units.lookup("byte").unwrap();

        assert_eq!(units.divisor(512.0, byte), (1.0, "B"));
        assert_eq!(units.divisor(2048.0, byte), (1024.0, "KiB"));
        assert_eq!(units.divisor(3.0 * 1048576.0, byte), (1048576.0, "MiB"));
        // Below the smallest divisor the base unit is kept
        assert_eq!(units.divisor(0.0, byte), (1.0, "B"));
    }

    #[test]
    fn test_fixed_exponent() {
        let settings = EngineSettings {
            unit_exp: Some(1),
            ..Default::default()
        };
        let units = registry(&settings);
        let byte = units.lookup("byte").unwrap();

        assert_eq!(units.divisor(5.0, byte), (1024.0, "KiB"));

        let settings = EngineSettings {
            unit_exp: Some(42),
            ..Default::default()
        };
        let units = registry(&settings);
        assert_eq!(units.divisor(5.0, byte), (1099511627776.0, "TiB"));
    }

    #[test]
    fn test_variant_fallback() {
        let settings = EngineSettings {
            use_si: true,
            ..Default::default()
        };
        let units = registry(&settings);

        let byte = units.lookup("byte").unwrap();
        assert_eq!(units.divisor(2000.0, byte), (1e3, "KB"));

        // number has no SI table, the default one is used
        let number = units.lookup("number").unwrap();
        assert_eq!(units.divisor(2000.0, number), (1e3, "K"));
    }

    #[test]
    fn test_value_to_str() {
        let units = registry(&EngineSettings::default());
        let byte = units.lookup("byte").unwrap();

        let s = units.value_to_str(1536.0, byte);
        assert_eq!(s.label, "KiB");
        assert_eq!(s.value, 1.5);
        assert_eq!(s.precision, 2);

        let s = units.value_to_str(100.0, byte);
        assert_eq!(s.precision, 0);

        assert_eq!(units.bytes_to_str(2048), "2KiB");
        assert_eq!(units.bits_to_str(10_000_000), "10Mb");
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut units = UnitRegistry::default();
        let a = units.add("byte");
        let b = units.add("byte");
        assert_eq!(a, b);
        assert_eq!(units.len(), 1);
    }
}
