/*!
 * Parser for externally produced translation replies.
 *
 * Replies are expected as lines of `<Sheet!A1, original> -> translated`, but
 * chat models and humans wrap lines, drop brackets and swap arrows. The
 * primary pass matches the strict grammar across the whole reply, then
 * revisits any entry opening it skipped (an original containing `>`, a
 * translation on the next line) so that nothing is dropped silently. Only
 * when the strict grammar finds nothing does the line-oriented fallback pass
 * run, which glues wrapped lines back onto their entry and accepts looser
 * separators.
 *
 * Sheet names may be quoted as `'My Sheet'!A1` with `''` for an embedded
 * quote; quoted names may hold commas and angle brackets.
 */

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use crate::document::CellAddress;
use crate::translation::TranslationEntry;

/// Sheet-qualified address, quoted or bare
const SHEET_ADDRESS: &str = r"(?:'(?:[^'\n]|'')+'|[^<>,\s'][^<>,\n]*?)![$]?[A-Za-z]{1,3}[$]?\d+";

/// `<Sheet!A1, original> -> translated`; the original may span lines
static STRICT_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"<\s*({SHEET_ADDRESS})\s*,\s*([^>]*)>\s*->[ \t]*([^\n<]+)")).unwrap()
});

/// `<Sheet!A1,` wherever it appears
static ENTRY_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"<\s*{SHEET_ADDRESS}\s*,")).unwrap());

/// A line opening a new entry: optional `<`, then a sheet-qualified address
static ENTRY_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^<?\s*{SHEET_ADDRESS}(?:[\s,>:→-]|$)")).unwrap());

/// The address at the very start of an entry body
static LEADING_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^{SHEET_ADDRESS}")).unwrap());

/// `>` closing an original, then the arrow
static CLOSE_ARROW: Lazy<Regex> = Lazy::new(|| Regex::new(r">\s*(?:->|→)").unwrap());

/// Which pass produced a reconciliation result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePass {
    Primary,
    Fallback,
}

impl fmt::Display for ReconcilePass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Parsed reply: translations by address plus bookkeeping
#[derive(Debug, Clone)]
pub struct ReconciliationOutcome {
    /// Final translation per address; later duplicates win
    pub translations: BTreeMap<CellAddress, String>,
    /// Entries in address order, one per key of `translations`
    pub entries: Vec<TranslationEntry>,
    /// Entries that parsed, duplicates included
    pub parsed: usize,
    /// Entries dropped as unparseable
    pub discarded: usize,
    pub pass: ReconcilePass,
}

impl ReconciliationOutcome {
    pub fn len(&self) -> usize {
        self.translations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.translations.is_empty()
    }
}

/// Accumulates entries, last write per address wins
#[derive(Default)]
struct Collector {
    by_address: BTreeMap<CellAddress, (String, String)>,
    parsed: usize,
    discarded: usize,
}

impl Collector {
    fn accept(&mut self, address: CellAddress, original: &str, translated: &str) {
        self.parsed += 1;
        self.by_address
            .insert(address, (original.trim().to_string(), translated.trim().to_string()));
    }

    fn discard(&mut self, entry: &str, reason: &str) {
        self.discarded += 1;
        warn!("Discarding reply entry ({}): {}", reason, preview(entry));
    }

    fn finish(self, pass: ReconcilePass) -> ReconciliationOutcome {
        let mut translations = BTreeMap::new();
        let mut entries = Vec::with_capacity(self.by_address.len());
        for (address, (original, translated)) in self.by_address {
            translations.insert(address.clone(), translated.clone());
            entries.push(TranslationEntry::new(address, original, translated));
        }
        ReconciliationOutcome {
            translations,
            entries,
            parsed: self.parsed,
            discarded: self.discarded,
            pass,
        }
    }
}

/// Parse a reply into an address -> translation map
pub fn reconcile(reply: &str) -> ReconciliationOutcome {
    let primary = primary_pass(reply);
    if primary.parsed > 0 {
        debug!("Primary pass matched {} entr(ies)", primary.parsed);
        return primary.finish(ReconcilePass::Primary);
    }
    debug!("Primary pass matched nothing, trying line-oriented fallback");
    fallback_pass(reply).finish(ReconcilePass::Fallback)
}

/// A strict match or an entry opening the strict grammar stepped over
enum Piece<'r> {
    Strict(Captures<'r>),
    Skipped(&'r str),
}

fn primary_pass(reply: &str) -> Collector {
    let mut collector = Collector::default();
    // An original swallowing the next entry's opening means the entry before
    // it never closed; both are left to recovery
    let strict: Vec<Captures<'_>> = STRICT_ENTRY
        .captures_iter(reply)
        .filter(|captures| !ENTRY_OPEN.is_match(&captures[2]))
        .collect();
    if strict.is_empty() {
        return collector;
    }

    let spans: Vec<Range<usize>> = strict
        .iter()
        .filter_map(|captures| captures.get(0))
        .map(|whole| whole.range())
        .collect();
    let mut pieces: Vec<(usize, Piece<'_>)> = skipped_entries(reply, &spans)
        .into_iter()
        .map(|(start, segment)| (start, Piece::Skipped(segment)))
        .collect();
    pieces.extend(strict.into_iter().map(|captures| {
        let start = captures.get(0).map_or(0, |whole| whole.start());
        (start, Piece::Strict(captures))
    }));
    // Reply order decides which duplicate wins
    pieces.sort_by_key(|(start, _)| *start);

    for (_, piece) in pieces {
        match piece {
            Piece::Strict(captures) => accept_strict(&captures, &mut collector),
            Piece::Skipped(segment) => recover_skipped(segment, &mut collector),
        }
    }
    collector
}

fn accept_strict(captures: &Captures<'_>, collector: &mut Collector) {
    let whole = &captures[0];
    let translated = captures[3].trim();
    if translated.is_empty() {
        collector.discard(whole, "empty translation");
        return;
    }
    match CellAddress::parse(&captures[1]) {
        Ok(address) => {
            let original = captures[2].replace(['\r', '\n'], " ");
            collector.accept(address, &original, translated);
        }
        Err(_) => collector.discard(whole, "bad address"),
    }
}

/// Entry openings outside every strict match, each running up to the next
/// opening or strict match
fn skipped_entries<'r>(reply: &'r str, spans: &[Range<usize>]) -> Vec<(usize, &'r str)> {
    let openings: Vec<usize> = ENTRY_OPEN.find_iter(reply).map(|m| m.start()).collect();
    openings
        .iter()
        .enumerate()
        .filter(|(_, start)| !spans.iter().any(|span| span.contains(*start)))
        .map(|(index, &start)| {
            let next_opening = openings.get(index + 1).copied().unwrap_or(reply.len());
            let next_match = spans
                .iter()
                .map(|span| span.start)
                .filter(|&span_start| span_start > start)
                .min()
                .unwrap_or(reply.len());
            (start, &reply[start..next_opening.min(next_match)])
        })
        .collect()
}

/// Parse a `<Sheet!A1, original> -> translated` entry the strict grammar
/// could not, taking the last `>` before the arrow as the end of the original
/// and the first non-empty line after it as the translation
fn recover_skipped(segment: &str, collector: &mut Collector) {
    let body = segment.trim_start();
    let body = body.strip_prefix('<').unwrap_or(body).trim_start();
    let Some((address, rest)) = split_address(body) else {
        collector.discard(segment, "bad address");
        return;
    };
    let Some(close) = CLOSE_ARROW.find(rest) else {
        collector.discard(segment, "no separator");
        return;
    };
    let translated = rest[close.end()..]
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default();
    if translated.is_empty() {
        collector.discard(segment, "empty translation");
        return;
    }
    let original = strip_comma(&rest[..close.start()]).replace(['\r', '\n'], " ");
    debug!("Recovered entry for {} outside the strict grammar", address);
    collector.accept(address, &original, translated);
}

fn fallback_pass(reply: &str) -> Collector {
    let mut collector = Collector::default();
    let mut current: Option<String> = None;

    for line in reply.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if ENTRY_START.is_match(line) {
            if let Some(entry) = current.take() {
                close_entry(&entry, &mut collector);
            }
            current = Some(line.to_string());
        } else if let Some(entry) = current.as_mut() {
            entry.push(' ');
            entry.push_str(line);
        } else {
            debug!("Skipping reply preamble: {}", preview(line));
        }
    }
    if let Some(entry) = current.take() {
        close_entry(&entry, &mut collector);
    }
    collector
}

/// Split a logical entry at its separator and record it
fn close_entry(entry: &str, collector: &mut Collector) {
    let body = entry.trim();
    let bracketed = body.starts_with('<');
    let body = body.strip_prefix('<').unwrap_or(body).trim_start();
    let Some((address, rest)) = split_address(body) else {
        collector.discard(entry, "bad address");
        return;
    };
    let Some((left, right)) = split_separator(rest) else {
        collector.discard(entry, "no separator");
        return;
    };
    let translated = right.trim();
    if translated.is_empty() {
        collector.discard(entry, "empty translation");
        return;
    }

    let left = left.trim_end();
    let left = match left.rfind('>') {
        Some(end) if bracketed => &left[..end],
        _ => left,
    };
    collector.accept(address, strip_comma(left), translated);
}

/// Peel the sheet-qualified address off the front of an entry body
fn split_address(body: &str) -> Option<(CellAddress, &str)> {
    let found = LEADING_ADDRESS.find(body)?;
    let address = CellAddress::parse(found.as_str()).ok()?;
    Some((address, &body[found.end()..]))
}

/// The original text after its address, without the leading comma
fn strip_comma(text: &str) -> &str {
    let text = text.trim();
    text.strip_prefix(',').unwrap_or(text).trim()
}

/// `->`, then `→`, then the first `:` only when neither arrow is present
fn split_separator(entry: &str) -> Option<(&str, &str)> {
    entry
        .split_once("->")
        .or_else(|| entry.split_once('→'))
        .or_else(|| entry.split_once(':'))
}

fn preview(text: &str) -> String {
    text.chars().take(60).collect()
}
