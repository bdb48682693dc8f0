//! Candidate extraction from recognized label text
//!
//! Identifiers are standalone runs of 9 or 10 digits. When a frame contains
//! any 10-digit run, 9-digit runs in the same frame are ignored; 9-digit
//! runs are accepted only when no 10-digit run exists. PO numbers are digit
//! runs following a `PO #` label. The two lists are extracted independently,
//! so a PO value of identifier length also appears as an identifier.

use once_cell::sync::Lazy;
use regex::Regex;

use super::Candidates;

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[0-9]{9,10}\b").unwrap());

static PO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bp\.?\s*o\.?\s*#\s*([0-9]+)").unwrap());

/// Preferred identifier length
const PREFERRED_LEN: usize = 10;

/// Stateless extractor bounded to a batch cap
#[derive(Debug, Clone)]
pub struct CandidateExtractor {
    cap: usize,
}

impl CandidateExtractor {
    pub fn new(cap: usize) -> Self {
        Self { cap }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Extract identifiers and PO numbers from one frame
    ///
    /// Zero matches yields empty lists, never an error.
    pub fn extract(&self, text: &str) -> Candidates {
        let mut po_numbers: Vec<String> = Vec::new();
        for caps in PO_RE.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                push_unique(&mut po_numbers, m.as_str(), self.cap);
            }
        }

        let runs: Vec<&str> = IDENTIFIER_RE.find_iter(text).map(|m| m.as_str()).collect();

        let prefer_long = runs.iter().any(|r| r.len() == PREFERRED_LEN);

        let mut identifiers: Vec<String> = Vec::new();
        for run in runs {
            if prefer_long && run.len() != PREFERRED_LEN {
                continue;
            }
            push_unique(&mut identifiers, run, self.cap);
        }

        Candidates {
            identifiers,
            po_numbers,
        }
    }
}

fn push_unique(list: &mut Vec<String>, value: &str, cap: usize) {
    if list.len() < cap && !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}
