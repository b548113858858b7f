use super::fetch::OutputFileFetcher;
use super::selector::output_file_url;
use super::shape::{is_report_shaped, Report};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::rc::Rc;

pub const MAX_RECURSION_DEPTH: usize = 10;

/// Wrapper keys probed, in order, once the more specific rules found nothing.
pub const NESTED_RESULT_KEYS: &[&str] = &[
    "result", "output", "data", "response", "message", "messages", "content", "value",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionNote {
    DepthLimitReached { depth: usize },
    FetchFailed { url: String, reason: String },
    FetchedFileUnparsed { url: String },
}

impl std::fmt::Display for ExtractionNote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DepthLimitReached { depth } => {
                write!(f, "max recursion depth reached at depth {depth}")
            }
            Self::FetchFailed { url, reason } => {
                write!(f, "output file fetch failed for {url}: {reason}")
            }
            Self::FetchedFileUnparsed { url } => {
                write!(f, "output file {url} did not contain parseable json")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub report: Option<Report>,
    pub notes: Vec<ExtractionNote>,
}

#[derive(Debug, Clone)]
pub struct ReportExtractor<F> {
    fetcher: F,
}

impl<F: OutputFileFetcher> ReportExtractor<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Depth-first search for the first shape-accepted object in `payload`.
    /// Absence of a report is an ordinary outcome, never an error.
    pub fn extract(&self, payload: &Value) -> Extraction {
        let mut pass = ExtractionPass {
            fetcher: &self.fetcher,
            visited: HashSet::new(),
            fetched_urls: HashSet::new(),
            retained: Vec::new(),
            notes: Vec::new(),
        };
        let report = pass.search(payload, 0).and_then(Report::from_value);
        Extraction {
            report,
            notes: pass.notes,
        }
    }
}

struct ExtractionPass<'f, F> {
    fetcher: &'f F,
    visited: HashSet<usize>,
    fetched_urls: HashSet<String>,
    // Parsed and fetched values stay alive for the whole pass so the
    // address-keyed visited set never sees a reused allocation.
    retained: Vec<Rc<Value>>,
    notes: Vec<ExtractionNote>,
}

impl<F: OutputFileFetcher> ExtractionPass<'_, F> {
    fn search(&mut self, value: &Value, depth: usize) -> Option<Value> {
        if depth > MAX_RECURSION_DEPTH {
            self.note_depth_limit(depth);
            return None;
        }

        if is_report_shaped(value) {
            return Some(value.clone());
        }

        match value {
            Value::String(text) => self.search_text(text, depth),
            Value::Array(items) => items.iter().find_map(|item| self.search(item, depth + 1)),
            Value::Object(map) => self.search_object(map, depth),
            _ => None,
        }
    }

    fn search_text(&mut self, text: &str, depth: usize) -> Option<Value> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Some(direct) = parse_json(trimmed) {
            if let Some(found) = self.search_owned(direct, depth + 1) {
                return Some(found);
            }
        }

        let parsed_block = fenced_block(trimmed).and_then(parse_json)?;
        self.search_owned(parsed_block, depth + 1)
    }

    fn search_owned(&mut self, value: Value, depth: usize) -> Option<Value> {
        let value = Rc::new(value);
        self.retained.push(Rc::clone(&value));
        self.search(&value, depth)
    }

    fn search_object(&mut self, map: &Map<String, Value>, depth: usize) -> Option<Value> {
        let address = map as *const Map<String, Value> as usize;
        if !self.visited.insert(address) {
            return None;
        }

        if let Some(items) = map.get("content").and_then(Value::as_array) {
            if let Some(found) = self.search_output_files(items, depth) {
                return Some(found);
            }
            if let Some(found) = self.search_text_items(items, depth) {
                return Some(found);
            }
        }

        for key in NESTED_RESULT_KEYS {
            if let Some(nested) = map.get(*key) {
                if let Some(found) = self.search(nested, depth + 1) {
                    return Some(found);
                }
            }
        }

        None
    }

    fn search_output_files(&mut self, items: &[Value], depth: usize) -> Option<Value> {
        for item in items {
            if item.get("type").and_then(Value::as_str) != Some("output_file") {
                continue;
            }

            let inline = ["json", "data"]
                .iter()
                .filter_map(|key| item.get(*key))
                .find(|value| !value.is_null());
            if let Some(inline) = inline {
                if is_report_shaped(inline) {
                    return Some(inline.clone());
                }
            }

            let Some(url) = output_file_url(item) else {
                continue;
            };
            let Some(file_data) = self.fetch_output_file(url) else {
                continue;
            };
            let found = if is_report_shaped(&file_data) {
                Some(file_data)
            } else {
                self.search_owned(file_data, depth + 1)
            };
            if found.is_some() {
                return found;
            }
        }
        None
    }

    fn search_text_items(&mut self, items: &[Value], depth: usize) -> Option<Value> {
        for item in items {
            if item.is_object() && is_report_shaped(item) {
                return Some(item.clone());
            }
            for candidate in text_candidates(item) {
                if let Some(found) = self.search_text(&candidate, depth + 1) {
                    return Some(found);
                }
            }
        }
        None
    }

    fn fetch_output_file(&mut self, url: &str) -> Option<Value> {
        if !self.fetched_urls.insert(url.to_string()) {
            return None;
        }

        match self.fetcher.fetch(url) {
            Ok(file) => {
                let parsed = if file.declares_json() {
                    serde_json::from_str(&file.body).ok()
                } else {
                    parse_json(file.body.trim())
                };
                if parsed.is_none() {
                    self.notes.push(ExtractionNote::FetchedFileUnparsed {
                        url: url.to_string(),
                    });
                }
                parsed
            }
            Err(err) => {
                self.notes.push(ExtractionNote::FetchFailed {
                    url: url.to_string(),
                    reason: err.to_string(),
                });
                None
            }
        }
    }

    fn note_depth_limit(&mut self, depth: usize) {
        if !self
            .notes
            .iter()
            .any(|note| matches!(note, ExtractionNote::DepthLimitReached { .. }))
        {
            self.notes.push(ExtractionNote::DepthLimitReached { depth });
        }
    }
}

fn parse_json(text: &str) -> Option<Value> {
    serde_json::from_str(text).ok()
}

/// Interior of the first fenced code block, with an optional `json` tag.
pub fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let mut rest = &text[start + 3..];
    if rest
        .get(..4)
        .is_some_and(|tag| tag.eq_ignore_ascii_case("json"))
    {
        rest = &rest[4..];
    }
    let rest = rest.trim_start();
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

fn text_candidates(item: &Value) -> Vec<String> {
    let mut candidates = Vec::new();
    if let Some(plain) = item.as_str() {
        candidates.push(plain.to_string());
    }

    if let Some(text) = item.get("text") {
        if let Some(plain) = text.as_str() {
            candidates.push(plain.to_string());
        } else if let Some(value) = text.get("value").and_then(Value::as_str) {
            candidates.push(value.to_string());
        } else if let Some(lines) = text.get("content").and_then(Value::as_array) {
            candidates.push(
                lines
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join("\n"),
            );
        }
    }

    for key in ["value", "content", "output"] {
        if let Some(plain) = item.get(key).and_then(Value::as_str) {
            candidates.push(plain.to_string());
        }
    }

    candidates.retain(|candidate| !candidate.is_empty());
    candidates
}
