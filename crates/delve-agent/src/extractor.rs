//! Call extraction — turns free-form model output into invocations.
//!
//! Strategies run in order and the first one that yields anything wins:
//!
//! 1. [`strict_line`]: a whole line is one `{"name": .., "arguments": {..}}` object.
//! 2. [`balanced_scan`]: the same shape anywhere in the text, found by brace matching.
//! 3. [`loose_alias`]: `{"name": .., "<alias>": ..}` with the alias field moved
//!    under `arguments`.
//!
//! The loose strategy can read a call out of prose that merely looks like
//! JSON. That false positive is accepted.

use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::trace;

use delve_core::types::{Arguments, Invocation};

use crate::tools::ToolRegistry;

/// Top-level keys the loose strategy treats as the single argument.
pub const DEFAULT_ALIAS_KEYS: &[&str] = &["query", "url", "goal", "code"];

/// Legacy spelling of `name`, accepted by the loose strategy only.
const LEGACY_NAME_KEY: &str = "tool_code";

/// A pure extraction strategy over the whole text.
type Strategy = fn(&str, &[String]) -> Vec<Invocation>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("strict_line", strict_line),
    ("balanced_scan", balanced_scan),
    ("loose_alias", loose_alias),
];

// ─────────────────────────────────────────────
// CallExtractor
// ─────────────────────────────────────────────

/// Extracts invocations from raw model output. Never fails.
#[derive(Clone, Debug)]
pub struct CallExtractor {
    alias_keys: Vec<String>,
}

impl CallExtractor {
    /// Extractor with the default alias keys only.
    pub fn new() -> Self {
        Self {
            alias_keys: DEFAULT_ALIAS_KEYS.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Extractor whose alias keys also include every capability's first
    /// required parameter.
    pub fn for_registry(registry: &ToolRegistry) -> Self {
        let mut extractor = Self::new();
        for key in registry.primary_argument_keys() {
            if !extractor.alias_keys.contains(&key) {
                extractor.alias_keys.push(key);
            }
        }
        extractor
    }

    pub fn alias_keys(&self) -> &[String] {
        &self.alias_keys
    }

    /// Invocations found in `text`, left to right, duplicates removed.
    pub fn extract(&self, text: &str) -> Vec<Invocation> {
        for (label, strategy) in STRATEGIES {
            let found = strategy(text, &self.alias_keys);
            if !found.is_empty() {
                trace!(strategy = *label, found = found.len(), "extraction strategy matched");
                return dedup(found);
            }
        }
        Vec::new()
    }
}

impl Default for CallExtractor {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────
// Strategies
// ─────────────────────────────────────────────

/// Lines that are, once trimmed, exactly one well-formed call object.
pub fn strict_line(text: &str, _aliases: &[String]) -> Vec<Invocation> {
    text.lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{') && line.ends_with('}'))
        .filter_map(|line| parse_object(line).and_then(|obj| well_formed(&obj)))
        .collect()
}

/// Well-formed call objects anywhere in the text, including multi-line ones.
pub fn balanced_scan(text: &str, _aliases: &[String]) -> Vec<Invocation> {
    scan_objects(text, well_formed)
}

/// Call objects that carry their single argument at the top level.
pub fn loose_alias(text: &str, aliases: &[String]) -> Vec<Invocation> {
    scan_objects(text, |obj| loosely_formed(obj, aliases))
}

// ─────────────────────────────────────────────
// Candidate rules
// ─────────────────────────────────────────────

/// `{"name": "<string>", "arguments": {..}}`.
fn well_formed(obj: &Map<String, Value>) -> Option<Invocation> {
    let Some(name) = obj.get("name").and_then(Value::as_str) else {
        trace!("candidate dropped: no string name");
        return None;
    };
    match obj.get("arguments") {
        Some(Value::Object(args)) => Some(Invocation::new(name, to_arguments(args))),
        Some(_) => {
            trace!(tool = %name, "candidate dropped: arguments is not an object");
            None
        }
        None => {
            trace!(tool = %name, "candidate dropped: no arguments");
            None
        }
    }
}

fn loosely_formed(obj: &Map<String, Value>, aliases: &[String]) -> Option<Invocation> {
    let name = obj
        .get("name")
        .or_else(|| obj.get(LEGACY_NAME_KEY))
        .and_then(Value::as_str)?;

    match obj.get("arguments") {
        Some(Value::Object(args)) => return Some(Invocation::new(name, to_arguments(args))),
        Some(_) => {
            trace!(tool = %name, "loose candidate dropped: arguments is not an object");
            return None;
        }
        None => {}
    }

    let Some((key, value)) = aliases
        .iter()
        .find_map(|key| obj.get(key).map(|v| (key, v)))
    else {
        trace!(tool = %name, "loose candidate dropped: no argument-carrying key");
        return None;
    };

    let mut arguments = Arguments::new();
    arguments.insert(key.clone(), value.clone());
    Some(Invocation::new(name, arguments))
}

// ─────────────────────────────────────────────
// Scanning helpers
// ─────────────────────────────────────────────

fn parse_object(span: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(span) {
        Ok(Value::Object(obj)) => Some(obj),
        Ok(_) => None,
        Err(e) => {
            trace!(error = %e, "candidate dropped: not valid JSON");
            None
        }
    }
}

fn to_arguments(args: &Map<String, Value>) -> Arguments {
    args.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

/// Try every balanced span in start order. A span that `accept` takes moves
/// the scan past its end; a rejected span lets the spans nested in it be tried.
fn scan_objects<F>(text: &str, accept: F) -> Vec<Invocation>
where
    F: Fn(&Map<String, Value>) -> Option<Invocation>,
{
    let mut found = Vec::new();
    let mut resume = 0;

    for (start, end) in brace_spans(text) {
        if start < resume {
            continue;
        }
        let Some(invocation) = parse_object(&text[start..=end]).and_then(|obj| accept(&obj)) else {
            continue;
        };
        found.push(invocation);
        resume = end + 1;
    }
    found
}

/// Every balanced `{..}` span as `(start, end)` byte indices, sorted by start.
///
/// One pass with a stack of open braces. Quotes only open a string inside a
/// brace, so prose quotes before an object do not hide it, and a raw newline
/// closes a string since a JSON string cannot contain one. Braces that never
/// close produce no span.
fn brace_spans(text: &str) -> Vec<(usize, usize)> {
    let mut open = Vec::new();
    let mut spans = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in text.as_bytes().iter().enumerate() {
        if in_string {
            match b {
                b'\n' => {
                    in_string = false;
                    escaped = false;
                }
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' if !open.is_empty() => in_string = true,
            b'{' => open.push(i),
            b'}' => {
                if let Some(start) = open.pop() {
                    spans.push((start, i));
                }
            }
            _ => {}
        }
    }

    spans.sort_unstable_by_key(|&(start, _)| start);
    spans
}

fn dedup(invocations: Vec<Invocation>) -> Vec<Invocation> {
    let mut seen = HashSet::new();
    invocations
        .into_iter()
        .filter(|inv| {
            let fresh = seen.insert(inv.canonical_key());
            if !fresh {
                trace!(tool = %inv.name, "duplicate invocation dropped");
            }
            fresh
        })
        .collect()
}
