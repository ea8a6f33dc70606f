//! Text graph of a history
//!
//! Renders the newest samples of a [`History`] as a fixed-height block of
//! characters, newest sample in the leftmost column. Each row has a scale
//! value; a column is filled up to the highest row whose scale (minus half
//! a step) the sample reaches.

use bwmon_core::{Direction, History, UnitId, UnitRegistry};

/// Characters and dimensions of a graph
#[derive(Debug, Clone, PartialEq)]
pub struct GraphStyle {
    pub foreground: char,
    pub background: char,
    /// Marks samples too small to reach the first row
    pub noise: char,
    pub unknown: char,
    pub height: usize,
    /// Number of columns, capped at the history capacity. `None` uses the
    /// whole history.
    pub width: Option<usize>,
}

impl Default for GraphStyle {
    fn default() -> Self {
        Self {
            foreground: '*',
            background: ' ',
            noise: '.',
            unknown: '?',
            height: 6,
            width: None,
        }
    }
}

/// Rendered rows of one direction
#[derive(Debug, Clone, PartialEq)]
pub struct GraphTable {
    /// Row 0 is the bottom row
    pub rows: Vec<String>,
    /// Scale of each row, already divided by the unit divisor
    pub scale: Vec<f64>,
    pub unit: String,
}

impl GraphTable {
    fn blank(style: &GraphStyle, width: usize) -> Self {
        Self {
            rows: vec![style.background.to_string().repeat(width); style.height],
            scale: vec![0.0; style.height],
            unit: String::new(),
        }
    }

    fn fill(
        history: &History,
        dir: Direction,
        unit: UnitId,
        units: &UnitRegistry,
        style: &GraphStyle,
        width: usize,
    ) -> Self {
        if !history.has_data(dir) {
            return Self::blank(style, width);
        }

        let capacity = history.capacity();
        // Newest first
        let values: Vec<Option<u64>> = (1..=width)
            .map(|back| history.sample(dir, (history.index() + capacity - back) % capacity))
            .collect();

        let max = values.iter().flatten().copied().max().unwrap_or(0);
        let step = max as f64 / style.height as f64;
        let half_step = step / 2.0;
        let mut scale: Vec<f64> = (1..=style.height).map(|i| i as f64 * step).collect();

        let mut grid = vec![vec![style.background; width]; style.height];
        for (col, value) in values.iter().enumerate() {
            match value {
                None => {
                    for row in grid.iter_mut() {
                        row[col] = style.unknown;
                    }
                }
                Some(v) if *v > 0 => {
                    let v = *v as f64;
                    grid[0][col] = style.noise;
                    for (row, threshold) in grid.iter_mut().zip(&scale) {
                        if v >= threshold - half_step {
                            row[col] = style.foreground;
                        }
                    }
                }
                Some(_) => {}
            }
        }

        let reference = ((style.height / 3) * 2).min(style.height - 1);
        let (divisor, label) = units.divisor(scale[reference], unit);
        for s in scale.iter_mut() {
            *s /= divisor;
        }

        Self {
            rows: grid.into_iter().map(|row| row.into_iter().collect()).collect(),
            scale,
            unit: label.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    pub rx: GraphTable,
    pub tx: GraphTable,
}

impl Graph {
    pub fn from_history(
        history: &History,
        unit: UnitId,
        units: &UnitRegistry,
        style: &GraphStyle,
    ) -> Self {
        let style = GraphStyle {
            height: style.height.max(1),
            ..style.clone()
        };
        let width = style
            .width
            .filter(|w| *w > 0)
            .unwrap_or(history.capacity())
            .min(history.capacity());

        Self {
            rx: GraphTable::fill(history, Direction::Rx, unit, units, &style, width),
            tx: GraphTable::fill(history, Direction::Tx, unit, units, &style, width),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bwmon_core::{AppConfig, AttrKind, EngineSettings, HistoryDefRegistry, SampleWidth};
    use std::time::{Duration, Instant};

    fn setup(rates: &[u64]) -> (History, UnitRegistry, UnitId) {
        let settings = EngineSettings::default();
        let config = AppConfig::default();
        let units = UnitRegistry::from_configs(&config.effective_units(), &settings).unwrap();
        let unit = units.lookup("number").unwrap();

        let mut defs = HistoryDefRegistry::new();
        let id = defs.define("second", 1.0, 8, SampleWidth::Bits64);
        let mut history = History::new(defs.get(id).unwrap(), &settings);

        let start = Instant::now();
        for (n, rate) in rates.iter().enumerate() {
            history.update(AttrKind::Rate, *rate, 0, start + Duration::from_secs(n as u64), 1.0);
        }
        (history, units, unit)
    }

    #[test]
    fn test_empty_history_is_blank() {
        let (history, units, unit) = setup(&[]);
        let graph = Graph::from_history(&history, unit, &units, &GraphStyle::default());

        assert_eq!(graph.rx.rows.len(), 6);
        assert!(graph.rx.rows.iter().all(|r| r == "        "));
    }

    #[test]
    fn test_columns_newest_first() {
        let (history, units, unit) = setup(&[600, 300, 0]);
        let style = GraphStyle {
            height: 3,
            width: Some(4),
            ..Default::default()
        };
        let graph = Graph::from_history(&history, unit, &units, &style);

        // newest (0), 300, 600, never written
        assert_eq!(graph.rx.rows[2], "  *?");
        assert_eq!(graph.rx.rows[1], " **?");
        assert_eq!(graph.rx.rows[0], " **?");
        assert_eq!(graph.rx.scale, vec![200.0, 400.0, 600.0]);
    }

    #[test]
    fn test_scale_uses_unit_divisor() {
        let (history, units, unit) = setup(&[6000]);
        let style = GraphStyle {
            height: 3,
            width: Some(1),
            ..Default::default()
        };
        let graph = Graph::from_history(&history, unit, &units, &style);

        assert_eq!(graph.rx.unit, "K");
        assert_eq!(graph.rx.scale, vec![2.0, 4.0, 6.0]);
        // tx only ever saw zero
        assert_eq!(graph.tx.rows[0], " ");
    }
}
