//! Network interface input module
//!
//! Reads per interface byte, packet and error counters through `sysinfo`
//! and reports them into the interface group.

use anyhow::{anyhow, Result};
use bwmon_core::{AttrFlags, AttrId, AttrKind, AttrMapEntry, Engine, Flow, Module, DEFAULT_GROUP};
use log::{debug, info};
use sysinfo::Networks;

const BYTES: usize = 0;
const PACKETS: usize = 1;
const ERRORS: usize = 2;

/// Network interface input module
pub struct NetworkSource {
    networks: Option<Networks>,
    attrs: [AttrMapEntry; 3],
}

impl NetworkSource {
    pub fn new() -> Self {
        Self {
            networks: None,
            attrs: [
                AttrMapEntry::new("bytes", "Bytes", "byte", AttrKind::Counter)
                    .with_flags(AttrFlags::TRUE_64BIT),
                AttrMapEntry::new("packets", "Packets", "number", AttrKind::Counter)
                    .with_flags(AttrFlags::TRUE_64BIT),
                AttrMapEntry::new("errors", "Errors", "number", AttrKind::Counter)
                    .with_flags(AttrFlags::TRUE_64BIT),
            ],
        }
    }

    fn attr(&self, index: usize) -> Option<AttrId> {
        self.attrs[index].id
    }
}

impl Default for NetworkSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for NetworkSource {
    fn name(&self) -> &str {
        "sysinfo"
    }

    fn description(&self) -> &str {
        "Network interface statistics of the local system"
    }

    fn is_default(&self) -> bool {
        true
    }

    fn probe(&mut self) -> bool {
        sysinfo::IS_SUPPORTED_SYSTEM
    }

    fn init(&mut self, engine: &mut Engine) -> Result<()> {
        if engine.load_attr_map(&mut self.attrs) > 0 {
            return Err(anyhow!("sysinfo: failed to register attributes"));
        }

        let networks = Networks::new_with_refreshed_list();
        info!("sysinfo: found {} network interfaces", networks.len());
        self.networks = Some(networks);
        Ok(())
    }

    fn poll(&mut self, engine: &mut Engine) -> Result<Flow> {
        let (Some(bytes), Some(packets), Some(errors)) =
            (self.attr(BYTES), self.attr(PACKETS), self.attr(ERRORS))
        else {
            return Ok(Flow::Continue);
        };

        let Some(networks) = self.networks.as_mut() else {
            return Ok(Flow::Continue);
        };
        // Picks up interfaces that appeared since the last read as well
        networks.refresh_list();

        let Some(group) = engine.lookup_group(DEFAULT_GROUP, true) else {
            return Ok(Flow::Continue);
        };

        let mut names: Vec<&String> = networks.keys().collect();
        names.sort();

        for name in names {
            let Some(data) = networks.get(name.as_str()) else {
                continue;
            };
            let Some(id) = engine.lookup_or_create(group, name, 0, None, true) else {
                continue;
            };

            if engine.element_mut(id).is_some_and(|e| e.take_created()) {
                debug!("sysinfo: new interface {}", name);
                engine.set_key_attrs(id, "bytes", "packets")?;
                engine.set_usage_attr(id, "bytes")?;
                if let Some(element) = engine.element_mut(id) {
                    element.update_info("Address", &data.mac_address().to_string());
                }
            }

            engine.report_update(
                id,
                bytes,
                Some(data.total_received()),
                Some(data.total_transmitted()),
                true,
            );
            engine.report_update(
                id,
                packets,
                Some(data.total_packets_received()),
                Some(data.total_packets_transmitted()),
                true,
            );
            engine.report_update(
                id,
                errors,
                Some(data.total_errors_on_received()),
                Some(data.total_errors_on_transmitted()),
                true,
            );

            engine.notify_update(id, None);
            engine.mark_seen(id, 1);
        }

        Ok(Flow::Continue)
    }

    fn shutdown(&mut self, _engine: &mut Engine) {
        self.networks = None;
    }
}
