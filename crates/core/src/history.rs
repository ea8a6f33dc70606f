//! Multi-resolution history ring buffers.
//!
//! Each [`HistoryDef`] describes one resolution (interval, capacity, sample
//! width). An attribute collecting history owns one [`History`] per
//! definition, each holding an rx and a tx ring of per-second values.

use bwmon_types::{AttrKind, ConfigError, EngineSettings, HistoryConfig, SampleWidth};
use log::trace;
use std::time::Instant;

/// Tolerance used when comparing the read interval with a history interval
const INTERVAL_EPSILON: f64 = 1e-9;

/// Handle of a history definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HistoryDefId(usize);

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryDef {
    id: HistoryDefId,
    name: String,
    size: usize,
    width: SampleWidth,
    interval: f64,
}

impl HistoryDef {
    pub fn id(&self) -> HistoryDefId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn width(&self) -> SampleWidth {
        self.width
    }

    /// Seconds per sample
    pub fn interval(&self) -> f64 {
        self.interval
    }
}

/// Registry of history definitions with a selection cursor
#[derive(Debug, Clone, Default)]
pub struct HistoryDefRegistry {
    defs: Vec<HistoryDef>,
    current: Option<HistoryDefId>,
}

impl HistoryDefRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from config entries. An interval of 0 resolves to
    /// the read interval.
    pub fn from_configs(
        configs: &[HistoryConfig],
        settings: &EngineSettings,
    ) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for config in configs {
            if config.size == 0 {
                return Err(ConfigError::EmptyHistory(config.name.clone()));
            }
            registry.define(
                &config.name,
                config.resolved_interval(settings.read_interval),
                config.size,
                config.width,
            );
        }
        Ok(registry)
    }

    /// Add a definition. An existing name returns the existing definition.
    pub fn define(
        &mut self,
        name: &str,
        interval: f64,
        size: usize,
        width: SampleWidth,
    ) -> HistoryDefId {
        if let Some(def) = self.lookup(name) {
            return def.id;
        }

        let id = HistoryDefId(self.defs.len());
        self.defs.push(HistoryDef {
            id,
            name: name.to_string(),
            size: size.max(1),
            width,
            interval,
        });
        id
    }

    pub fn lookup(&self, name: &str) -> Option<&HistoryDef> {
        self.defs.iter().find(|d| d.name == name)
    }

    pub fn get(&self, id: HistoryDefId) -> Option<&HistoryDef> {
        self.defs.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryDef> {
        self.defs.iter()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn select_first(&mut self) -> Option<HistoryDefId> {
        self.current = self.defs.first().map(|d| d.id);
        self.current
    }

    pub fn select_last(&mut self) -> Option<HistoryDefId> {
        self.current = self.defs.last().map(|d| d.id);
        self.current
    }

    /// Move to the next definition, wrapping to the first
    pub fn select_next(&mut self) -> Option<HistoryDefId> {
        match self.current {
            Some(HistoryDefId(i)) if i + 1 < self.defs.len() => {
                self.current = Some(HistoryDefId(i + 1));
                self.current
            }
            _ => self.select_first(),
        }
    }

    /// Move to the previous definition, wrapping to the last
    pub fn select_prev(&mut self) -> Option<HistoryDefId> {
        match self.current {
            Some(HistoryDefId(i)) if i > 0 && i < self.defs.len() => {
                self.current = Some(HistoryDefId(i - 1));
                self.current
            }
            _ => self.select_last(),
        }
    }

    /// The selected definition, selecting the first one if none is
    pub fn current(&mut self) -> Option<&HistoryDef> {
        if self.current.is_none() {
            self.select_first();
        }
        self.current.and_then(|id| self.defs.get(id.0))
    }
}

/// Direction of traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Rx,
    Tx,
}

/// Packed sample storage
#[derive(Debug, Clone)]
enum Ring {
    U8(Box<[u8]>),
    U16(Box<[u16]>),
    U32(Box<[u32]>),
    U64(Box<[u64]>),
}

impl Ring {
    fn new(width: SampleWidth, capacity: usize) -> Self {
        match width {
            SampleWidth::Bits8 => Ring::U8(vec![u8::MAX; capacity].into_boxed_slice()),
            SampleWidth::Bits16 => Ring::U16(vec![u16::MAX; capacity].into_boxed_slice()),
            SampleWidth::Bits32 => Ring::U32(vec![u32::MAX; capacity].into_boxed_slice()),
            SampleWidth::Bits64 => Ring::U64(vec![u64::MAX; capacity].into_boxed_slice()),
        }
    }

    fn get(&self, index: usize) -> Option<u64> {
        match self {
            Ring::U8(d) => d.get(index).map(|v| *v as u64),
            Ring::U16(d) => d.get(index).map(|v| *v as u64),
            Ring::U32(d) => d.get(index).map(|v| *v as u64),
            Ring::U64(d) => d.get(index).copied(),
        }
    }

    /// `value` must already fit the width
    fn set(&mut self, index: usize, value: u64) {
        match self {
            Ring::U8(d) => d[index] = value as u8,
            Ring::U16(d) => d[index] = value as u16,
            Ring::U32(d) => d[index] = value as u32,
            Ring::U64(d) => d[index] = value,
        }
    }
}

/// One direction of a history
#[derive(Debug, Clone, Default)]
struct Store {
    data: Option<Ring>,
    prev_total: Option<u64>,
}

impl Store {
    fn write(&mut self, index: usize, capacity: usize, width: SampleWidth, value: Option<u64>) {
        if self.data.is_none() {
            // Nothing to remember yet
            if value.is_none() {
                return;
            }
            self.data = Some(Ring::new(width, capacity));
        }

        if let Some(ring) = self.data.as_mut() {
            let raw = match value {
                Some(v) => v.min(width.max_value()),
                None => width.sentinel(),
            };
            ring.set(index, raw);
        }
    }

    fn record(
        &mut self,
        index: usize,
        capacity: usize,
        width: SampleWidth,
        kind: AttrKind,
        total: u64,
        elapsed: f64,
    ) {
        let value = match kind {
            AttrKind::Counter => self.prev_total.map(|prev| {
                let delta = total.wrapping_sub(prev);
                if elapsed > 0.0 {
                    (delta as f64 / elapsed) as u64
                } else {
                    delta
                }
            }),
            AttrKind::Rate | AttrKind::Percent => Some(total),
        };

        self.prev_total = Some(total);
        self.write(index, capacity, width, value);
    }

    fn get(&self, index: usize, width: SampleWidth) -> Option<u64> {
        self.data
            .as_ref()
            .and_then(|ring| ring.get(index))
            .filter(|v| *v != width.sentinel())
    }
}

/// Ring buffer pair of one attribute at one resolution
#[derive(Debug, Clone)]
pub struct History {
    def: HistoryDefId,
    interval: f64,
    capacity: usize,
    width: SampleWidth,
    index: usize,
    last_update: Option<Instant>,
    min_interval: f64,
    max_interval: f64,
    rx: Store,
    tx: Store,
}

impl History {
    pub fn new(def: &HistoryDef, settings: &EngineSettings) -> Self {
        Self {
            def: def.id,
            interval: def.interval,
            capacity: def.size,
            width: def.width,
            index: 0,
            last_update: None,
            min_interval: def.interval - settings.read_interval / 2.0,
            max_interval: def.interval / settings.history_variance,
            rx: Store::default(),
            tx: Store::default(),
        }
    }

    pub fn def_id(&self) -> HistoryDefId {
        self.def
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn width(&self) -> SampleWidth {
        self.width
    }

    /// Slot the next sample is written to, which is also the oldest sample
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn last_update(&self) -> Option<Instant> {
        self.last_update
    }

    /// Whether any known sample was ever stored for `dir`
    pub fn has_data(&self, dir: Direction) -> bool {
        self.store(dir).data.is_some()
    }

    /// Sample at ring slot `index`, `None` if unknown
    pub fn sample(&self, dir: Direction, index: usize) -> Option<u64> {
        self.store(dir).get(index, self.width)
    }

    /// All samples from oldest to newest
    pub fn samples(&self, dir: Direction) -> impl Iterator<Item = Option<u64>> + '_ {
        let store = self.store(dir);
        (0..self.capacity).map(move |n| store.get((self.index + n) % self.capacity, self.width))
    }

    /// Most recently stored sample
    pub fn latest(&self, dir: Direction) -> Option<u64> {
        let index = (self.index + self.capacity - 1) % self.capacity;
        self.sample(dir, index)
    }

    fn store(&self, dir: Direction) -> &Store {
        match dir {
            Direction::Rx => &self.rx,
            Direction::Tx => &self.tx,
        }
    }

    /// Feed the current totals of the owning attribute
    pub fn update(
        &mut self,
        kind: AttrKind,
        rx_total: u64,
        tx_total: u64,
        now: Instant,
        read_interval: f64,
    ) {
        let elapsed = match self.last_update {
            Some(last) => now.saturating_duration_since(last).as_secs_f64(),
            None if kind == AttrKind::Counter => {
                self.set_baseline(rx_total, tx_total, now);
                return;
            }
            None => 0.0,
        };

        if read_interval > self.interval + INTERVAL_EPSILON {
            // Reads are coarser than this resolution, the samples in between
            // can not be reconstructed.
            let half = self.interval / 2.0;
            if elapsed >= half {
                let missing = ((elapsed - half) / self.interval).floor() as usize + 1;
                self.backfill(missing);
            }
            self.set_baseline(rx_total, tx_total, now);
            return;
        }

        if (read_interval - self.interval).abs() > INTERVAL_EPSILON {
            if self.last_update.is_none() {
                self.set_baseline(rx_total, tx_total, now);
                return;
            }

            if elapsed < self.min_interval {
                return;
            }

            if elapsed > self.max_interval {
                let gaps = ((elapsed / self.interval).floor() as usize)
                    .saturating_sub(1)
                    .max(1);
                trace!("History gap of {:.1}s, {} unknown samples", elapsed, gaps);
                self.backfill(gaps);
            }
        }

        self.rx
            .record(self.index, self.capacity, self.width, kind, rx_total, elapsed);
        self.tx
            .record(self.index, self.capacity, self.width, kind, tx_total, elapsed);
        self.advance(1);
        self.last_update = Some(now);
    }

    fn set_baseline(&mut self, rx_total: u64, tx_total: u64, now: Instant) {
        self.rx.prev_total = Some(rx_total);
        self.tx.prev_total = Some(tx_total);
        self.last_update = Some(now);
    }

    /// Write `count` unknown samples
    fn backfill(&mut self, count: usize) {
        let writes = count.min(self.capacity);
        for _ in 0..writes {
            self.rx.write(self.index, self.capacity, self.width, None);
            self.tx.write(self.index, self.capacity, self.width, None);
            self.advance(1);
        }
        self.advance(count - writes);
    }

    fn advance(&mut self, steps: usize) {
        self.index = (self.index + steps % self.capacity) % self.capacity;
    }
}
