//! Per element attribute state.

use crate::attr_def::{AttrDef, AttrId};
use crate::history::{Direction, History, HistoryDefId, HistoryDefRegistry};
use crate::rate::{usage, Overflow, RateSample};
use bwmon_types::{AttrFlags, AttrKind, EngineSettings};
use log::trace;
use std::time::Instant;

/// Runtime state bits of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttrStatus(u8);

impl AttrStatus {
    pub const HISTORY: Self = Self(0x01);
    pub const RX_SEEN: Self = Self(0x02);
    pub const TX_SEEN: Self = Self(0x04);
    pub const COUNTER_64BIT: Self = Self(0x08);

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

/// One tracked statistic of an element
#[derive(Debug, Clone)]
pub struct Attribute {
    id: AttrId,
    kind: AttrKind,
    flags: AttrFlags,
    status: AttrStatus,
    rx: RateSample,
    tx: RateSample,
    last_update: Option<Instant>,
    histories: Vec<History>,
}

impl Attribute {
    pub(crate) fn new(def: &AttrDef) -> Self {
        Self {
            id: def.id(),
            kind: def.kind(),
            flags: def.flags(),
            status: AttrStatus::default(),
            rx: RateSample::default(),
            tx: RateSample::default(),
            last_update: None,
            histories: Vec::new(),
        }
    }

    pub fn id(&self) -> AttrId {
        self.id
    }

    pub fn kind(&self) -> AttrKind {
        self.kind
    }

    pub fn flags(&self) -> AttrFlags {
        self.flags
    }

    pub fn status(&self) -> AttrStatus {
        self.status
    }

    pub fn rx(&self) -> &RateSample {
        &self.rx
    }

    pub fn tx(&self) -> &RateSample {
        &self.tx
    }

    pub fn sample(&self, dir: Direction) -> &RateSample {
        match dir {
            Direction::Rx => &self.rx,
            Direction::Tx => &self.tx,
        }
    }

    pub fn has_rx(&self) -> bool {
        self.status.contains(AttrStatus::RX_SEEN)
    }

    pub fn has_tx(&self) -> bool {
        self.status.contains(AttrStatus::TX_SEEN)
    }

    pub fn is_collecting_history(&self) -> bool {
        self.status.contains(AttrStatus::HISTORY)
    }

    pub fn last_update(&self) -> Option<Instant> {
        self.last_update
    }

    pub fn histories(&self) -> &[History] {
        &self.histories
    }

    pub fn history(&self, def: HistoryDefId) -> Option<&History> {
        self.histories.iter().find(|h| h.def_id() == def)
    }

    /// Store a raw reading
    pub(crate) fn set_raw(&mut self, rx: Option<u64>, tx: Option<u64>, is_64bit: bool, now: Instant) {
        if is_64bit {
            self.status.insert(AttrStatus::COUNTER_64BIT);
        }

        if let Some(value) = rx {
            self.rx.set_current(value);
            self.status.insert(AttrStatus::RX_SEEN);
        }

        if let Some(value) = tx {
            self.tx.set_current(value);
            self.status.insert(AttrStatus::TX_SEEN);
        }

        if rx.is_some() || tx.is_some() {
            self.last_update = Some(now);
        }
    }

    /// Attach one history per definition. Does nothing if already collecting.
    pub fn start_collecting_history(&mut self, defs: &HistoryDefRegistry, settings: &EngineSettings) {
        if self.is_collecting_history() {
            return;
        }

        trace!("Starting history collection for attribute {}", self.id);
        self.histories = defs.iter().map(|def| History::new(def, settings)).collect();
        self.status.insert(AttrStatus::HISTORY);
    }

    /// Make the reported totals start over from zero
    pub fn reset_counter(&mut self) {
        if self.kind == AttrKind::Counter {
            self.rx.reset();
            self.tx.reset();
        }
    }

    fn overflow(&self) -> Overflow {
        if self.flags.contains(AttrFlags::IGNORE_OVERFLOWS) {
            Overflow::Ignore
        } else if self.flags.contains(AttrFlags::TRUE_64BIT)
            || self.status.contains(AttrStatus::COUNTER_64BIT)
        {
            Overflow::Wrap64
        } else {
            Overflow::Wrap32
        }
    }

    /// Recompute totals and rates, then feed the histories
    pub(crate) fn recompute(&mut self, now: Instant, settings: &EngineSettings) {
        match self.kind {
            AttrKind::Counter => {
                let overflow = self.overflow();
                self.rx.calc_counter(overflow, now, settings);
                self.tx.calc_counter(overflow, now, settings);
            }
            AttrKind::Rate | AttrKind::Percent => {
                self.rx.calc_direct(now);
                self.tx.calc_direct(now);
            }
        }

        let (rx, tx) = (self.rx.raw_total(), self.tx.raw_total());
        for history in &mut self.histories {
            history.update(self.kind, rx, tx, now, settings.read_interval);
        }
    }

    /// Usage in percent of the given capacities
    pub fn calc_usage(&self, rx_max: u64, tx_max: u64, rate_interval: f64) -> (Option<f64>, Option<f64>) {
        if self.kind == AttrKind::Percent {
            return (Some(self.rx.total() as f64), Some(self.tx.total() as f64));
        }

        (
            usage(self.rx.rate(), rx_max, rate_interval),
            usage(self.tx.rate(), tx_max, rate_interval),
        )
    }
}
