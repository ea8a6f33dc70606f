//! Templated text output
//!
//! Expands a template once per element of every group. The template is
//! plain text with `$(placeholder)` fields and C style escapes, e.g.
//! `'$(element:name)\t$(attr:rx:bytes)\t$(attr:tx:bytes)\n'`.
//!
//! Placeholders:
//! - `group:nelements`, `group:name`, `group:title`
//! - `element:name`, `element:description`, `element:nattrs`,
//!   `element:lifecycles`, `element:level`, `element:parent`, `element:id`,
//!   `element:rxusage`, `element:txusage`, `element:haschilds`
//! - `attr:rx:<attr>`, `attr:tx:<attr>` (totals),
//!   `attr:rxrate:<attr>`, `attr:txrate:<attr>` (rates)

use anyhow::{anyhow, Result};
use bwmon_core::{Element, Engine, Flow, Group, Module};
use log::warn;
use std::fmt::{self, Write as _};
use std::io::Write as _;

const DEFAULT_TEMPLATE: &str =
    "$(element:name) $(attr:rx:bytes) $(attr:tx:bytes) $(attr:rx:packets) $(attr:tx:packets)\\n";

/// Written in place of fields that can not be resolved
const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Text(String),
    Field(String),
}

/// Split a template into literal text and placeholders
fn parse_template(template: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '$' if chars.peek() == Some(&'(') => {
                chars.next();
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some(')') => break,
                        Some(c) => field.push(c),
                        None if field.is_empty() => {
                            return Err(anyhow!("Unexpected end of format string"))
                        }
                        None => return Err(anyhow!("Missing ')' in format string")),
                    }
                }
                if !text.is_empty() {
                    tokens.push(Token::Text(std::mem::take(&mut text)));
                }
                tokens.push(Token::Field(field));
            }
            '\\' => {
                let escaped = match chars.peek() {
                    Some('n') => Some('\n'),
                    Some('t') => Some('\t'),
                    Some('r') => Some('\r'),
                    Some('v') => Some('\x0b'),
                    Some('b') => Some('\x08'),
                    Some('f') => Some('\x0c'),
                    Some('a') => Some('\x07'),
                    _ => None,
                };
                match escaped {
                    Some(e) => {
                        chars.next();
                        text.push(e);
                    }
                    None => text.push('\\'),
                }
            }
            c => text.push(c),
        }
    }

    if !text.is_empty() {
        tokens.push(Token::Text(text));
    }
    Ok(tokens)
}

/// Case-insensitive `prefix:` strip
fn strip_field<'a>(field: &'a str, prefix: &str) -> Option<&'a str> {
    let head = field.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &field[prefix.len()..])
}

fn usage(value: Option<f64>) -> String {
    format!("{:2.0}", value.unwrap_or(0.0))
}

fn group_field(group: &Group, name: &str) -> Option<String> {
    match name.to_ascii_lowercase().as_str() {
        "nelements" => Some(group.element_count().to_string()),
        "name" => Some(group.name().to_string()),
        "title" => Some(group.header().title.clone()),
        _ => None,
    }
}

fn element_field(engine: &Engine, element: &Element, name: &str) -> Option<String> {
    let value = match name.to_ascii_lowercase().as_str() {
        "name" => element.name().to_string(),
        "description" | "desc" => element.description().unwrap_or_default().to_string(),
        "nattrs" => element.attribute_ids().len().to_string(),
        "lifecycles" => element.lifecycles().to_string(),
        "level" => element.level().to_string(),
        "parent" => element
            .parent()
            .and_then(|p| engine.element(p))
            .map(|p| p.name().to_string())
            .unwrap_or_default(),
        "id" => element.ident().to_string(),
        "rxusage" => usage(element.rx_usage()),
        "txusage" => usage(element.tx_usage()),
        "haschilds" => u8::from(!element.children().is_empty()).to_string(),
        _ => return None,
    };
    Some(value)
}

fn attr_field(engine: &Engine, element: &Element, spec: &str) -> Option<String> {
    let Some((kind, name)) = spec.split_once(':') else {
        warn!("format: invalid attribute field '{}'", spec);
        return None;
    };
    let Some(id) = engine.attr_defs().id_of(name) else {
        warn!("format: undefined attribute '{}'", name);
        return None;
    };
    let attr = element.attribute(id)?;

    match kind.to_ascii_lowercase().as_str() {
        "rx" => Some(attr.rx().total().to_string()),
        "tx" => Some(attr.tx().total().to_string()),
        "rxrate" => Some(format!("{:.2}", attr.rx().rate())),
        "txrate" => Some(format!("{:.2}", attr.tx().rate())),
        _ => {
            warn!("format: unknown attribute field '{}'", kind);
            None
        }
    }
}

fn resolve(engine: &Engine, group: &Group, element: &Element, field: &str) -> String {
    let value = if let Some(name) = strip_field(field, "group:") {
        group_field(group, name)
    } else if let Some(name) = strip_field(field, "element:") {
        element_field(engine, element, name)
    } else if let Some(spec) = strip_field(field, "attr:") {
        return attr_field(engine, element, spec).unwrap_or_else(|| UNKNOWN.to_string());
    } else {
        None
    };

    value.unwrap_or_else(|| {
        warn!("format: unknown field '{}'", field);
        UNKNOWN.to_string()
    })
}

pub struct FormatDisplayer {
    tokens: Vec<Token>,
    to_stderr: bool,
    quit_after: Option<u64>,
}

impl FormatDisplayer {
    pub fn new() -> Self {
        Self {
            tokens: parse_template(DEFAULT_TEMPLATE).unwrap_or_default(),
            to_stderr: false,
            quit_after: None,
        }
    }

    /// Expand the template for every element of every group
    pub fn render(&self, engine: &Engine, out: &mut impl fmt::Write) -> fmt::Result {
        let graph = engine.graph();
        for group in graph.groups() {
            for id in graph.group_elements(group.id()) {
                let Some(element) = graph.get(id) else {
                    continue;
                };
                for token in &self.tokens {
                    match token {
                        Token::Text(text) => out.write_str(text)?,
                        Token::Field(field) => {
                            out.write_str(&resolve(engine, group, element, field))?
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for FormatDisplayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for FormatDisplayer {
    fn name(&self) -> &str {
        "format"
    }

    fn description(&self) -> &str {
        "Templated text output (options: fmt, stderr, quitafter)"
    }

    fn parse_opt(&mut self, key: &str, value: Option<&str>) -> Result<()> {
        match key.to_ascii_lowercase().as_str() {
            "fmt" => {
                let value = value.ok_or_else(|| anyhow!("Option '{}' requires a value", key))?;
                self.tokens = parse_template(value)?;
            }
            "stderr" => self.to_stderr = true,
            "quitafter" => {
                let value = value.ok_or_else(|| anyhow!("Option '{}' requires a value", key))?;
                let count: i64 = value
                    .parse()
                    .map_err(|e| anyhow!("Invalid value '{}' for option '{}': {}", value, key, e))?;
                self.quit_after = u64::try_from(count).ok().filter(|n| *n > 0);
            }
            _ => return Err(anyhow!("Unknown option '{}' for module format", key)),
        }
        Ok(())
    }

    fn poll(&mut self, engine: &mut Engine) -> Result<Flow> {
        let mut text = String::new();
        self.render(engine, &mut text)?;

        if self.to_stderr {
            let mut stderr = std::io::stderr().lock();
            stderr.write_all(text.as_bytes())?;
            stderr.flush()?;
        } else {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }

        if let Some(remaining) = self.quit_after.as_mut() {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }
}
