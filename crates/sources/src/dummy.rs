//! Synthetic statistics generator
//!
//! Produces a constant or random traffic flow for a configurable number of
//! devices spread over several groups. Useful for trying out output modules
//! without real interfaces.

use anyhow::{anyhow, Result};
use bwmon_core::{AttrKind, AttrMapEntry, Engine, EngineError, Flow, Module, DEFAULT_GROUP};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Upper bound for the number of devices per group
const MAX_DEVICES: usize = 32;

const BYTES: usize = 0;
const PACKETS: usize = 1;

/// Raw rx/tx counters of one device
#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    bytes: [u64; 2],
    packets: [u64; 2],
}

pub struct DummySource {
    rx_bytes: u64,
    tx_bytes: u64,
    rx_packets: u64,
    tx_packets: u64,
    devices: usize,
    groups: usize,
    randomize: bool,
    mtu: u64,
    max_pps: u64,
    rng: StdRng,
    counters: Vec<Counters>,
    attrs: [AttrMapEntry; 2],
}

impl DummySource {
    pub fn new() -> Self {
        Self {
            rx_bytes: 1_000_000_000,
            tx_bytes: 80_000_000,
            rx_packets: 1000,
            tx_packets: 800,
            devices: 5,
            groups: 2,
            randomize: false,
            mtu: 1540,
            max_pps: 100_000,
            rng: StdRng::from_entropy(),
            counters: Vec::new(),
            attrs: [
                AttrMapEntry::new("bytes", "Bytes", "byte", AttrKind::Counter),
                AttrMapEntry::new("packets", "Packets", "number", AttrKind::Counter),
            ],
        }
    }

    fn group_name(index: usize) -> String {
        if index == 0 {
            DEFAULT_GROUP.to_string()
        } else {
            format!("group{:02}", index)
        }
    }

    /// Advance the counters of one device by one tick
    fn step(&mut self, index: usize) -> Counters {
        let (rx_packets, tx_packets, rx_bytes, tx_bytes) = if self.randomize {
            let rx = random_below(&mut self.rng, self.max_pps);
            let tx = random_below(&mut self.rng, self.max_pps);
            let rx_size = random_below(&mut self.rng, self.mtu);
            let tx_size = random_below(&mut self.rng, self.mtu);
            (rx, tx, rx * rx_size, tx * tx_size)
        } else {
            (self.rx_packets, self.tx_packets, self.rx_bytes, self.tx_bytes)
        };

        let c = &mut self.counters[index];
        c.packets[0] = c.packets[0].wrapping_add(rx_packets);
        c.packets[1] = c.packets[1].wrapping_add(tx_packets);
        c.bytes[0] = c.bytes[0].wrapping_add(rx_bytes);
        c.bytes[1] = c.bytes[1].wrapping_add(tx_bytes);
        *c
    }
}

impl Default for DummySource {
    fn default() -> Self {
        Self::new()
    }
}

fn random_below(rng: &mut StdRng, bound: u64) -> u64 {
    if bound == 0 {
        0
    } else {
        rng.gen_range(0..bound)
    }
}

fn parse_num(key: &str, value: Option<&str>) -> Result<u64> {
    let value = value.ok_or_else(|| anyhow!("Option '{}' requires a value", key))?;
    value
        .parse()
        .map_err(|e| anyhow!("Invalid value '{}' for option '{}': {}", value, key, e))
}

impl Module for DummySource {
    fn name(&self) -> &str {
        "dummy"
    }

    fn description(&self) -> &str {
        "Statistic generator (options: rxb, txb, rxp, txp, num, numgroups, randomize, seed, mtu, maxpps)"
    }

    fn parse_opt(&mut self, key: &str, value: Option<&str>) -> Result<()> {
        match key.to_ascii_lowercase().as_str() {
            "rxb" => self.rx_bytes = parse_num(key, value)?,
            "txb" => self.tx_bytes = parse_num(key, value)?,
            "rxp" => self.rx_packets = parse_num(key, value)?,
            "txp" => self.tx_packets = parse_num(key, value)?,
            "num" => self.devices = parse_num(key, value)? as usize,
            "numgroups" => self.groups = parse_num(key, value)? as usize,
            "randomize" => self.randomize = true,
            "seed" => self.rng = StdRng::seed_from_u64(parse_num(key, value)?),
            "mtu" => self.mtu = parse_num(key, value)?,
            "maxpps" => self.max_pps = parse_num(key, value)?,
            _ => return Err(anyhow!("Unknown option '{}' for module dummy", key)),
        }
        Ok(())
    }

    fn probe(&mut self) -> bool {
        if self.devices >= MAX_DEVICES {
            warn!("dummy: num must be in range 0..{}", MAX_DEVICES);
            return false;
        }
        true
    }

    fn init(&mut self, engine: &mut Engine) -> Result<()> {
        if engine.load_attr_map(&mut self.attrs) > 0 {
            return Err(anyhow!("dummy: failed to register attributes"));
        }

        for index in 1..self.groups {
            let name = Self::group_name(index);
            match engine.graph_mut().headers_mut().derive(&name, &name, DEFAULT_GROUP) {
                Ok(()) | Err(EngineError::HeaderExists(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        self.counters = vec![Counters::default(); self.groups * self.devices];
        debug!(
            "dummy: {} devices in {} groups, randomize={}",
            self.devices, self.groups, self.randomize
        );
        Ok(())
    }

    fn poll(&mut self, engine: &mut Engine) -> Result<Flow> {
        let (Some(bytes), Some(packets)) = (self.attrs[BYTES].id, self.attrs[PACKETS].id) else {
            return Ok(Flow::Continue);
        };

        for g in 0..self.groups {
            let Some(group) = engine.lookup_group(&Self::group_name(g), true) else {
                continue;
            };

            for n in 0..self.devices {
                let name = format!("dummy{}", n);
                let Some(id) = engine.lookup_or_create(group, &name, 0, None, true) else {
                    continue;
                };

                if engine.element_mut(id).is_some_and(|e| e.take_created()) {
                    engine.set_key_attrs(id, "bytes", "packets")?;
                    engine.set_usage_attr(id, "bytes")?;
                }

                if engine.element(id).is_some_and(|e| e.is_updated()) {
                    continue;
                }

                let c = self.step(g * self.devices + n);
                engine.report_update(id, bytes, Some(c.bytes[0]), Some(c.bytes[1]), true);
                engine.report_update(id, packets, Some(c.packets[0]), Some(c.packets[1]), true);
                engine.notify_update(id, None);
                engine.mark_seen(id, 1);
            }
        }

        Ok(Flow::Continue)
    }
}
