//! Entity-overlap matching against prior-context text.
//!
//! Decides whether a phrase extracted from an agent response already
//! appeared somewhere in the conversation so far. Digit-free phrases use a
//! plain case-insensitive substring check; numeric phrases compare parsed
//! values so that "23", "23.0" and "$23.00" ground each other, with a
//! proximity requirement when a currency symbol is involved.

use regex::Regex;
use std::sync::LazyLock;

static CURRENCY_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[$€£¥]+").unwrap());
static LEADING_NON_DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[^\d]+").unwrap());
static TRAILING_NON_NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9.]+$").unwrap());
static NUMERIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(\.\d+)?").unwrap());
static SUBWORD_SPLIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[&$ \-.,]+").unwrap());

/// Whether `entity` matches within a single line, case-insensitively, with
/// numeric equivalence and currency-symbol awareness.
pub fn entity_matches_line(entity: &str, line: &str) -> bool {
    let ent = entity.trim().to_lowercase();
    let line = line.to_lowercase();

    // No digits: plain substring check.
    if !ent.chars().any(|c| c.is_ascii_digit()) {
        return line.contains(&ent);
    }

    // A leading currency symbol must at minimum appear somewhere in the line.
    let symbol = CURRENCY_PREFIX.find(&ent).map(|m| m.as_str().to_string());
    if let Some(sym) = &symbol {
        if !line.contains(sym.as_str()) {
            return false;
        }
    }

    // Strip currency/unit decoration to get the bare number: "$23.00" -> "23.00",
    // "45.7 kg" -> "45.7". Unparsable values fall back to the substring check.
    let stripped = LEADING_NON_DIGIT.replace(&ent, "");
    let stripped = TRAILING_NON_NUMERIC.replace(&stripped, "");
    let ent_value: f64 = match stripped.parse() {
        Ok(v) => v,
        Err(_) => return line.contains(&ent),
    };

    for m in NUMERIC.find_iter(&line) {
        let Ok(found) = m.as_str().parse::<f64>() else { continue };
        if (ent_value - found).abs() >= 1e-9 {
            continue;
        }
        match &symbol {
            // The symbol must sit within the 3 characters preceding the number.
            Some(sym) => {
                let prefix: Vec<char> = line[..m.start()].chars().collect();
                let window: String =
                    prefix[prefix.len().saturating_sub(3)..].iter().collect();
                if window.contains(sym.as_str()) {
                    return true;
                }
            }
            None => return true,
        }
    }

    false
}

/// Whether `entity` matches in any of the context lines.
pub fn entity_in_context(entity: &str, context_lines: &[String]) -> bool {
    context_lines.iter().any(|line| entity_matches_line(entity, line))
}

/// Outcome of matching one extracted entity against the context pool.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    /// 1.0 for a whole-phrase match, otherwise matched/total subwords.
    pub degree: f64,
    /// Phrase or subwords found in context.
    pub matched: Vec<String>,
    /// Subwords not found in context.
    pub unmatched: Vec<String>,
}

/// Match a phrase against the context, falling back to per-subword matching
/// when the whole phrase is not found. Subwords are split on `& $ - . ,`
/// and whitespace.
pub fn match_degree(entity: &str, context_lines: &[String]) -> MatchOutcome {
    let phrase = entity.trim().to_lowercase();

    if entity_in_context(&phrase, context_lines) {
        return MatchOutcome { degree: 1.0, matched: vec![phrase], unmatched: vec![] };
    }

    let subwords: Vec<&str> =
        SUBWORD_SPLIT.split(&phrase).filter(|w| !w.is_empty()).collect();
    if subwords.is_empty() {
        return MatchOutcome { degree: 0.0, matched: vec![], unmatched: vec![] };
    }

    let mut matched = Vec::new();
    let mut unmatched = Vec::new();
    for subword in &subwords {
        if entity_in_context(subword, context_lines) {
            matched.push(subword.to_string());
        } else {
            unmatched.push(subword.to_string());
        }
    }

    MatchOutcome { degree: matched.len() as f64 / subwords.len() as f64, matched, unmatched }
}
