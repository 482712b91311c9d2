//! Pattern compilation and budgeted matching
//!
//! Compilation maps a [`Pattern`]'s flag set onto `RegexBuilder`; the
//! `regex` crate executes in linear time, so the per-pattern wall-clock
//! budget is enforced by checking a deadline between successive matches
//! rather than by aborting a runaway backtracker. A `size_limit` at
//! compile time caps pathological pattern blowup.
//!
//! On timeout the matcher reports [`MatchOutcome::TimedOut`]; the
//! enclosing rule is skipped for that scan, never failed fatally.

use raxe_core::{Error, Match, Pattern, Result};
use regex::{Regex, RegexBuilder};
use std::time::{Duration, Instant};

/// Maximum compiled-program size per pattern (bytes)
const COMPILE_SIZE_LIMIT: usize = 10 * (1 << 20);

/// Number of characters of surrounding context captured per match
const CONTEXT_CHARS: usize = 40;

/// A compiled, executable pattern
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    regex: Regex,
    timeout: Duration,
}

/// Outcome of a budgeted match pass
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// All non-overlapping matches, in document order
    Matches(Vec<Match>),
    /// The wall-clock budget was exceeded before the pass finished
    TimedOut,
}

impl CompiledPattern {
    /// Compile a pattern, honoring its flag set
    ///
    /// Pure: equal patterns compile to interchangeable matchers, so
    /// results are cacheable by `(source, flags)`.
    pub fn compile(pattern: &Pattern) -> Result<Self> {
        let regex = RegexBuilder::new(&pattern.source)
            .case_insensitive(pattern.flags.case_insensitive)
            .multi_line(pattern.flags.multiline)
            .dot_matches_new_line(pattern.flags.dot_all)
            .ignore_whitespace(pattern.flags.verbose)
            .size_limit(COMPILE_SIZE_LIMIT)
            .build()
            .map_err(|e| Error::pattern_compile("<unbound>", e.to_string()))?;

        Ok(Self {
            regex,
            timeout: pattern.timeout(),
        })
    }

    /// Compile with the owning rule's id attached to any error
    pub fn compile_for_rule(pattern: &Pattern, rule_id: &str) -> Result<Self> {
        Self::compile(pattern).map_err(|e| match e {
            Error::PatternCompile { reason, .. } => Error::pattern_compile(rule_id, reason),
            other => other,
        })
    }

    /// Find all non-overlapping matches within the pattern's own budget
    pub fn find_all(&self, text: &str) -> MatchOutcome {
        self.find_all_within(text, self.timeout)
    }

    /// Find all non-overlapping matches within an explicit budget
    ///
    /// Matches are returned in document order with named captures and up
    /// to 40 characters of context on each side, clipped at the text
    /// boundaries.
    pub fn find_all_within(&self, text: &str, budget: Duration) -> MatchOutcome {
        let deadline = Instant::now() + budget;
        let mut matches = Vec::new();

        for caps in self.regex.captures_iter(text) {
            if Instant::now() >= deadline {
                return MatchOutcome::TimedOut;
            }

            let whole = caps.get(0).expect("group 0 is always present");
            let mut m = Match::new(whole.start(), whole.end(), whole.as_str());

            for name in self.regex.capture_names().flatten() {
                if let Some(group) = caps.name(name) {
                    m.captures
                        .insert(name.to_string(), group.as_str().to_string());
                }
            }

            let before = context_before(text, whole.start());
            let after = context_after(text, whole.end());
            matches.push(m.with_context(before, after));
        }

        MatchOutcome::Matches(matches)
    }

    /// Whether the pattern matches anywhere, without extraction
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

fn context_before(text: &str, start: usize) -> Option<String> {
    if start == 0 {
        return None;
    }
    let prefix = &text[..start];
    let chars: Vec<char> = prefix.chars().rev().take(CONTEXT_CHARS).collect();
    Some(chars.into_iter().rev().collect())
}

fn context_after(text: &str, end: usize) -> Option<String> {
    if end >= text.len() {
        return None;
    }
    let window: String = text[end..].chars().take(CONTEXT_CHARS).collect();
    Some(window)
}
