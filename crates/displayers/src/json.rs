//! JSON output
//!
//! Writes one document per tick: an array of groups, each listing its
//! elements with the totals of every attribute. Documents are followed by a
//! newline and a configurable separator character.

use anyhow::{anyhow, Result};
use bwmon_core::{Element, Engine, Flow, Module, Scaled};
use serde_json::{json, Map, Value};
use std::io::Write as _;

pub struct JsonDisplayer {
    separator: char,
    quit_after: Option<u64>,
}

impl JsonDisplayer {
    pub fn new() -> Self {
        Self {
            separator: '\n',
            quit_after: None,
        }
    }

    /// Build the document for the current state of the engine
    pub fn render(&self, engine: &Engine) -> Value {
        let graph = engine.graph();
        let groups: Vec<Value> = graph
            .groups()
            .iter()
            .map(|group| {
                let elements: Vec<Value> = graph
                    .group_elements(group.id())
                    .into_iter()
                    .filter_map(|id| graph.get(id))
                    .map(|element| element_value(engine, element))
                    .collect();
                json!({ "name": group.name(), "elements": elements })
            })
            .collect();
        Value::Array(groups)
    }
}

impl Default for JsonDisplayer {
    fn default() -> Self {
        Self::new()
    }
}

/// `[value, unit]`, rounded to the precision the unit suggests
fn scaled_value(s: Scaled<'_>) -> Value {
    let number = if s.precision == 0 {
        Value::from(s.value.round() as u64)
    } else {
        let factor = 10f64.powi(s.precision as i32);
        Value::from((s.value * factor).round() / factor)
    };
    json!([number, s.label])
}

fn element_value(engine: &Engine, element: &Element) -> Value {
    let mut map = Map::new();
    map.insert("name".to_string(), json!(element.name()));
    if element.ident() != 0 {
        map.insert("id".to_string(), json!(element.ident()));
    }
    if let Some(parent) = element.parent().and_then(|p| engine.element(p)) {
        map.insert("parent".to_string(), json!(parent.name()));
    }

    for attr in element.attributes() {
        let Some(def) = engine.attr_defs().lookup_by_id(attr.id()) else {
            continue;
        };
        let units = engine.units();
        let rx = units.value_to_str(attr.rx().total() as f64, def.unit());
        let tx = units.value_to_str(attr.tx().total() as f64, def.unit());
        map.insert(
            def.name().to_string(),
            json!({
                "desc": def.description(),
                "rx": scaled_value(rx),
                "tx": scaled_value(tx),
            }),
        );
    }

    Value::Object(map)
}

impl Module for JsonDisplayer {
    fn name(&self) -> &str {
        "json"
    }

    fn description(&self) -> &str {
        "JSON output (options: quitafter, uschar)"
    }

    fn parse_opt(&mut self, key: &str, value: Option<&str>) -> Result<()> {
        match key.to_ascii_lowercase().as_str() {
            "uschar" => {
                self.separator = value
                    .and_then(|v| v.chars().next())
                    .ok_or_else(|| anyhow!("Option '{}' requires a character", key))?;
            }
            "quitafter" => {
                let value = value.ok_or_else(|| anyhow!("Option '{}' requires a value", key))?;
                let count: i64 = value
                    .parse()
                    .map_err(|e| anyhow!("Invalid value '{}' for option '{}': {}", value, key, e))?;
                self.quit_after = u64::try_from(count).ok().filter(|n| *n > 0);
            }
            _ => return Err(anyhow!("Unknown option '{}' for module json", key)),
        }
        Ok(())
    }

    fn poll(&mut self, engine: &mut Engine) -> Result<Flow> {
        let text = serde_json::to_string_pretty(&self.render(engine))?;

        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}{}", text, self.separator)?;
        stdout.flush()?;

        if let Some(remaining) = self.quit_after.as_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bwmon_core::{AppConfig, AttrFlags, AttrKind, DEFAULT_GROUP};
    use std::time::Instant;

    #[test]
    fn test_render_document() {
        let mut engine = Engine::from_config(&AppConfig::default()).unwrap();
        let bytes = engine
            .register_attr("bytes", "Bytes", "byte", AttrKind::Counter, AttrFlags::empty())
            .unwrap();
        let group = engine.lookup_group(DEFAULT_GROUP, true).unwrap();

        engine.begin_tick(Instant::now());
        let eth0 = engine.lookup_or_create(group, "eth0", 0, None, true).unwrap();
        let vlan = engine.lookup_or_create(group, "eth0.7", 7, Some(eth0), true).unwrap();
        engine.report_update(eth0, bytes, Some(3000), Some(512), true);
        engine.notify_update(eth0, None);
        engine.report_update(vlan, bytes, Some(100), Some(0), true);
        engine.notify_update(vlan, None);

        let doc = JsonDisplayer::new().render(&engine);
        let elements = &doc[0]["elements"];

        assert_eq!(doc[0]["name"], "intf");
        assert_eq!(elements[0]["name"], "eth0");
        assert!(elements[0].get("id").is_none());
        assert_eq!(elements[0]["bytes"]["desc"], "Bytes");
        assert_eq!(elements[0]["bytes"]["rx"], json!([2.93, "KiB"]));
        assert_eq!(elements[0]["bytes"]["tx"], json!([512, "B"]));
        assert_eq!(elements[1]["id"], 7);
        assert_eq!(elements[1]["parent"], "eth0");
    }

    #[test]
    fn test_empty_engine() {
        let engine = Engine::from_config(&AppConfig::default()).unwrap();
        assert_eq!(JsonDisplayer::new().render(&engine), json!([]));
    }

    #[test]
    fn test_parse_opt() {
        let mut json = JsonDisplayer::new();
        json.parse_opt("uschar", Some(";")).unwrap();
        json.parse_opt("quitafter", Some("-1")).unwrap();

        assert_eq!(json.separator, ';');
        assert_eq!(json.quit_after, None);
        assert!(json.parse_opt("quitafter", Some("soon")).is_err());
        assert!(json.parse_opt("pretty", None).is_err());
    }
}
