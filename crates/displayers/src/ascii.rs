//! Plain text output
//!
//! Prints every group once per tick as a rate list, a totals listing or a
//! text graph of one history resolution. Meant for scripting, e.g.
//! `-o 'ascii:diagram=graph;quitafter=10'`.

use crate::graph::{Graph, GraphStyle, GraphTable};
use anyhow::{anyhow, Result};
use bwmon_core::{AttrId, Attribute, Element, Engine, Flow, Group, Module};
use std::fmt::{self, Write as _};
use std::io::Write as _;

const MAX_INDENT: usize = 15;
const X_AXIS: &str = "         1   5   10   15   20   25   30   35   40   45   50   55   60";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Diagram {
    List,
    Details,
    Graph,
}

pub struct AsciiDisplayer {
    diagram: Diagram,
    style: GraphStyle,
    history: String,
    quit_after: Option<u64>,
}

impl AsciiDisplayer {
    pub fn new() -> Self {
        Self {
            diagram: Diagram::List,
            style: GraphStyle::default(),
            history: "second".to_string(),
            quit_after: None,
        }
    }

    /// Render one full pass over all groups
    pub fn render(&self, engine: &Engine, out: &mut impl fmt::Write) -> fmt::Result {
        let graph = engine.graph();
        for group in graph.groups() {
            self.render_header(group, out)?;
            for id in graph.group_elements(group.id()) {
                let Some(element) = graph.get(id) else {
                    continue;
                };
                match self.diagram {
                    Diagram::List => render_list(engine, element, out)?,
                    Diagram::Details => render_details(engine, element, out)?,
                    Diagram::Graph => self.render_graphs(engine, element, out)?,
                }
            }
        }
        Ok(())
    }

    fn render_header(&self, group: &Group, out: &mut impl fmt::Write) -> fmt::Result {
        let header = group.header();
        if self.diagram != Diagram::List {
            return writeln!(out, "{}", header.title);
        }

        let [c0, c1, c2, c3] = &header.columns;
        writeln!(
            out,
            "{:<37}{:>10} {:>11}      %{:>10} {:>11}      %",
            header.title, c0, c1, c2, c3
        )
    }

    fn render_graphs(
        &self,
        engine: &Engine,
        element: &Element,
        out: &mut impl fmt::Write,
    ) -> fmt::Result {
        for attr in element.attributes() {
            if !attr.is_collecting_history() {
                continue;
            }
            let Some(def) = engine.attr_defs().lookup_by_id(attr.id()) else {
                continue;
            };

            for history in attr.histories() {
                let matches = engine
                    .history_defs()
                    .get(history.def_id())
                    .is_some_and(|h| h.name().eq_ignore_ascii_case(&self.history));
                if !matches {
                    continue;
                }

                let graph = Graph::from_history(history, def.unit(), engine.units(), &self.style);
                writeln!(out, "Interface: {}", element.name())?;
                writeln!(out, "Attribute: {}", def.description())?;
                render_table(&graph.rx, "RX", out)?;
                render_table(&graph.tx, "TX", out)?;
            }
        }
        Ok(())
    }
}

impl Default for AsciiDisplayer {
    fn default() -> Self {
        Self::new()
    }
}

/// Scaled rate of both directions, `(value, precision, label)`
fn rates(engine: &Engine, attr: &Attribute) -> [(f64, usize, String); 2] {
    let Some(def) = engine.attr_defs().lookup_by_id(attr.id()) else {
        return Default::default();
    };
    [attr.rx().rate(), attr.tx().rate()].map(|rate| {
        let s = engine.units().value_to_str(rate, def.unit());
        (s.value, s.precision, s.label.to_string())
    })
}

fn key_rates(engine: &Engine, element: &Element, key: Option<AttrId>) -> [(f64, usize, String); 2] {
    key.and_then(|id| element.attribute(id))
        .map(|attr| rates(engine, attr))
        .unwrap_or_default()
}

fn usage(value: Option<f64>) -> String {
    match value {
        Some(u) => format!("{:2.0}%", u),
        None => "   ".to_string(),
    }
}

fn render_list(engine: &Engine, element: &Element, out: &mut impl fmt::Write) -> fmt::Result {
    let [rx1, tx1] = key_rates(engine, element, element.major_attr());
    let [rx2, tx2] = key_rates(engine, element, element.minor_attr());

    let mut name = " ".repeat((element.level() as usize).min(MAX_INDENT));
    name.push_str(element.name());
    if let Some(description) = element.description() {
        write!(name, " ({})", description)?;
    }

    writeln!(
        out,
        "  {:<36} {:8.*}{:<3} {:8.*}{:<3} {}  {:8.*}{:<3} {:8.*}{:<3} {}",
        name,
        rx1.1,
        rx1.0,
        rx1.2,
        rx2.1,
        rx2.0,
        rx2.2,
        usage(element.rx_usage()),
        tx1.1,
        tx1.0,
        tx1.2,
        tx2.1,
        tx2.0,
        tx2.2,
        usage(element.tx_usage()),
    )
}

fn render_details(engine: &Engine, element: &Element, out: &mut impl fmt::Write) -> fmt::Result {
    write!(out, " {}", element.name())?;
    if element.ident() != 0 {
        write!(out, " ({})", element.ident())?;
    }
    writeln!(out)?;

    for attr in element.attributes() {
        let Some(def) = engine.attr_defs().lookup_by_id(attr.id()) else {
            continue;
        };
        let rx = engine.units().value_to_str(attr.rx().total() as f64, def.unit());
        let tx = engine.units().value_to_str(attr.tx().total() as f64, def.unit());
        writeln!(
            out,
            "  {:<36} {:12.*}{:<3} {:12.*}{:<3}",
            def.description(),
            rx.precision,
            rx.value,
            rx.label,
            tx.precision,
            tx.value,
            tx.label
        )?;
    }

    writeln!(out)
}

fn render_table(table: &GraphTable, label: &str, out: &mut impl fmt::Write) -> fmt::Result {
    writeln!(out, "{}   {}", label, table.unit)?;
    for (row, scale) in table.rows.iter().zip(&table.scale).rev() {
        writeln!(out, "{:8.2} {}", scale, row)?;
    }
    writeln!(out, "{}", X_AXIS)
}

fn first_char(key: &str, value: Option<&str>) -> Result<char> {
    value
        .and_then(|v| v.chars().next())
        .ok_or_else(|| anyhow!("Option '{}' requires a character", key))
}

fn required<'a>(key: &str, value: Option<&'a str>) -> Result<&'a str> {
    value.ok_or_else(|| anyhow!("Option '{}' requires a value", key))
}

impl Module for AsciiDisplayer {
    fn name(&self) -> &str {
        "ascii"
    }

    fn description(&self) -> &str {
        "Plain text output (options: diagram, fgchar, bgchar, nchar, uchar, height, xunit, quitafter)"
    }

    fn is_default(&self) -> bool {
        true
    }

    fn parse_opt(&mut self, key: &str, value: Option<&str>) -> Result<()> {
        match key.to_ascii_lowercase().as_str() {
            "diagram" => {
                let value = required(key, value)?;
                self.diagram = match value.chars().next().map(|c| c.to_ascii_lowercase()) {
                    Some('l') => Diagram::List,
                    Some('g') => Diagram::Graph,
                    Some('d') => Diagram::Details,
                    _ => return Err(anyhow!("Unknown diagram type '{}'", value)),
                };
            }
            "fgchar" => self.style.foreground = first_char(key, value)?,
            "bgchar" => self.style.background = first_char(key, value)?,
            "nchar" => self.style.noise = first_char(key, value)?,
            "uchar" => self.style.unknown = first_char(key, value)?,
            "xunit" => self.history = required(key, value)?.to_string(),
            "height" => {
                let value = required(key, value)?;
                self.style.height = value
                    .parse::<usize>()
                    .ok()
                    .filter(|h| *h > 0)
                    .ok_or_else(|| anyhow!("Invalid graph height '{}'", value))?;
            }
            "quitafter" => {
                let value = required(key, value)?;
                let count: i64 = value
                    .parse()
                    .map_err(|e| anyhow!("Invalid value '{}' for option '{}': {}", value, key, e))?;
                self.quit_after = u64::try_from(count).ok().filter(|n| *n > 0);
            }
            _ => return Err(anyhow!("Unknown option '{}' for module ascii", key)),
        }
        Ok(())
    }

    fn poll(&mut self, engine: &mut Engine) -> Result<Flow> {
        let mut text = String::new();
        self.render(engine, &mut text)?;

        let mut stdout = std::io::stdout().lock();
        stdout.write_all(text.as_bytes())?;
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
    use std::time::{Duration, Instant};

    /// Engine with one interface that moved 1000 bytes and 10 packets per
    /// second for three seconds
    fn engine() -> Engine {
        let mut engine = Engine::from_config(&AppConfig::default()).unwrap();
        let bytes = engine
            .register_attr("bytes", "Bytes", "byte", AttrKind::Counter, AttrFlags::empty())
            .unwrap();
        let packets = engine
            .register_attr("packets", "Packets", "number", AttrKind::Counter, AttrFlags::empty())
            .unwrap();
        let group = engine.lookup_group(DEFAULT_GROUP, true).unwrap();

        let start = Instant::now();
        for tick in 0..3u64 {
            engine.begin_tick(start + Duration::from_secs(tick));
            let id = engine.lookup_or_create(group, "eth0", 0, None, true).unwrap();
            if engine.element_mut(id).unwrap().take_created() {
                engine.set_key_attrs(id, "bytes", "packets").unwrap();
            }
            engine.report_update(id, bytes, Some(1000 * (tick + 1)), Some(0), true);
            engine.report_update(id, packets, Some(10 * (tick + 1)), Some(0), true);
            engine.notify_update(id, None);
            engine.mark_seen(id, 1);
            engine.end_tick();
        }
        engine
    }

    fn render(displayer: &AsciiDisplayer, engine: &Engine) -> String {
        let mut text = String::new();
        displayer.render(engine, &mut text).unwrap();
        text
    }

    #[test]
    fn test_list() {
        let engine = engine();
        let text = render(&AsciiDisplayer::new(), &engine);
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Interfaces "));
        assert!(lines[0].contains("RX bps"));
        assert!(lines[1].starts_with("  eth0 "));
        assert!(lines[1].contains("    1000B  "));
        assert!(lines[1].contains("      10   "));
    }

    #[test]
    fn test_details() {
        let engine = engine();
        let mut displayer = AsciiDisplayer::new();
        displayer.parse_opt("diagram", Some("details")).unwrap();
        let text = render(&displayer, &engine);

        assert!(text.starts_with("Interfaces\n eth0\n"));
        let bytes = text.lines().find(|l| l.contains("Bytes")).unwrap();
        assert!(bytes.contains("2.93KiB"));
        assert!(text.lines().any(|l| l.contains("Packets")));
    }

    #[test]
    fn test_graph() {
        let engine = engine();
        let mut displayer = AsciiDisplayer::new();
        displayer.parse_opt("diagram", Some("graph")).unwrap();
        let text = render(&displayer, &engine);

        assert!(text.contains("Interface: eth0\nAttribute: Bytes\nRX   B\n"));
        assert!(text.contains(" 1000.00 **?"));
        assert!(text.contains("Attribute: Packets"));
        assert!(text.lines().filter(|l| *l == X_AXIS).count() == 4);
    }

    #[test]
    fn test_graph_unknown_resolution_prints_nothing() {
        let engine = engine();
        let mut displayer = AsciiDisplayer::new();
        displayer.parse_opt("diagram", Some("g")).unwrap();
        displayer.parse_opt("xunit", Some("fortnight")).unwrap();

        assert_eq!(render(&displayer, &engine), "Interfaces\n");
    }

    #[test]
    fn test_parse_opt() {
        let mut displayer = AsciiDisplayer::new();
        displayer.parse_opt("fgchar", Some("#")).unwrap();
        displayer.parse_opt("height", Some("10")).unwrap();
        displayer.parse_opt("quitafter", Some("2")).unwrap();

        assert_eq!(displayer.style.foreground, '#');
        assert_eq!(displayer.style.height, 10);
        assert_eq!(displayer.quit_after, Some(2));
        assert!(displayer.parse_opt("diagram", Some("pie")).is_err());
        assert!(displayer.parse_opt("height", Some("0")).is_err());
        assert!(displayer.parse_opt("fgchar", None).is_err());
        assert!(displayer.parse_opt("yunit", Some("bit")).is_err());
    }

    #[test]
    fn test_quit_after() {
        let mut engine = Engine::from_config(&AppConfig::default()).unwrap();
        let mut displayer = AsciiDisplayer::new();
        displayer.parse_opt("quitafter", Some("2")).unwrap();

        assert_eq!(displayer.poll(&mut engine).unwrap(), Flow::Continue);
        assert_eq!(displayer.poll(&mut engine).unwrap(), Flow::Quit);
    }
}
