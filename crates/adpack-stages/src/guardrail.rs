//! Claim guardrail: deterministic, offline rewriting of absolute marketing claims.
//!
//! Two passes over one piece of copy:
//! 1. Superlatives and guarantees (French and English) are replaced through a
//!    fixed substitution table. Matching is case-insensitive, on word
//!    boundaries, longest term first; the leading capital of the matched text
//!    carries over to the replacement.
//! 2. Numeric claims (percentages, currency amounts, multipliers) are flagged
//!    as requiring evidence. They are never rewritten.
//!
//! No replacement contains a trigger term, so running the guardrail on its
//! own output changes nothing.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use adpack_core::copy::ClaimOutcome;

/// Trigger term and its softened replacement.
static SUBSTITUTIONS: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    let mut table = vec![
        // fr
        ("meilleures", "excellentes"),
        ("meilleure", "excellente"),
        ("meilleurs", "excellents"),
        ("meilleur", "excellent"),
        ("garanties", "conçues pour"),
        ("garantie", "conçue pour"),
        ("garantis", "conçus pour"),
        ("garanti", "conçu pour"),
        ("uniques", "rares"),
        ("unique", "rare"),
        ("miracles", "remarquables"),
        ("miracle", "remarquable"),
        ("miraculeux", "remarquable"),
        ("miraculeuse", "remarquable"),
        ("révolutionnaires", "innovants"),
        ("révolutionnaire", "innovant"),
        ("parfaite", "soignée"),
        ("parfait", "soigné"),
        ("numéro un", "reconnu"),
        ("numéro 1", "reconnu"),
        ("n° 1", "reconnu"),
        ("n°1", "reconnu"),
        // en
        ("best", "excellent"),
        ("guaranteed", "designed to"),
        ("guarantees", "commitments"),
        ("guarantee", "commitment"),
        ("revolutionary", "innovative"),
        ("miraculous", "remarkable"),
        ("perfect", "great"),
        ("number one", "leading"),
        ("#1", "leading"),
    ];
    // Longest first so `meilleures` wins over `meilleur`.
    table.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));
    table
});

const CURRENCY_SIGNS: [char; 3] = ['€', '$', '£'];
const CURRENCY_WORDS: [&str; 6] = ["euros", "euro", "eur", "dollars", "dollar", "usd"];
const MULTIPLIER_WORDS: [&str; 2] = ["fois", "times"];

/// One matched term in a piece of copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimFinding {
    /// The text as it appeared in the input (or in the rewritten text for flags).
    pub term: String,
    pub outcome: ClaimOutcome,
    pub replacement: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRewrite {
    pub text: String,
    pub modified: bool,
    pub findings: Vec<ClaimFinding>,
}

impl ClaimRewrite {
    /// All finding reasons joined, or `None` for clean copy.
    pub fn reason(&self) -> Option<String> {
        if self.findings.is_empty() {
            None
        } else {
            Some(
                self.findings
                    .iter()
                    .map(|f| f.reason.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        }
    }

    pub fn count(&self, outcome: ClaimOutcome) -> usize {
        self.findings.iter().filter(|f| f.outcome == outcome).count()
    }
}

/// Rewrite absolute claims and flag numeric ones. Total: never fails.
pub fn rewrite_claim(text: &str) -> ClaimRewrite {
    let mut out = String::with_capacity(text.len() + 16);
    let mut findings = Vec::new();
    let mut prev: Option<char> = None;
    let mut pos = 0;

    while pos < text.len() {
        let rest = &text[pos..];

        if !prev.is_some_and(is_word_char) {
            if let Some((len, term, replacement)) = find_substitution(rest) {
                let matched = &rest[..len];
                let replacement = match_case(matched, replacement);
                out.push_str(&replacement);
                findings.push(ClaimFinding {
                    term: matched.to_string(),
                    outcome: ClaimOutcome::Rewritten,
                    replacement: Some(replacement),
                    reason: format!("absolute claim '{term}' softened"),
                });
                prev = matched.chars().last();
                pos += len;
                continue;
            }
        }

        let Some(c) = rest.chars().next() else { break };
        out.push(c);
        prev = Some(c);
        pos += c.len_utf8();
    }

    findings.extend(numeric_flags(&out));
    let modified = out != text;
    ClaimRewrite {
        text: out,
        modified,
        findings,
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn chars_eq_ci(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Byte length of `term` matched at the start of `hay`, case-insensitively.
/// A space in the term matches any single whitespace character.
fn match_prefix(hay: &str, term: &str) -> Option<usize> {
    let mut chars = hay.char_indices();
    for t in term.chars() {
        let (_, h) = chars.next()?;
        let ok = if t == ' ' {
            h.is_whitespace()
        } else {
            chars_eq_ci(h, t)
        };
        if !ok {
            return None;
        }
    }
    Some(chars.next().map(|(i, _)| i).unwrap_or(hay.len()))
}

fn find_substitution(rest: &str) -> Option<(usize, &'static str, &'static str)> {
    SUBSTITUTIONS.iter().find_map(|&(term, replacement)| {
        let end = match_prefix(rest, term)?;
        if rest[end..].chars().next().is_some_and(is_word_char) {
            None
        } else {
            Some((end, term, replacement))
        }
    })
}

fn match_case(matched: &str, replacement: &str) -> String {
    let letters: Vec<char> = matched.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() > 1 && letters.iter().all(|c| c.is_uppercase()) {
        return replacement.to_uppercase();
    }
    match matched.chars().next() {
        Some(c) if c.is_uppercase() => {
            let mut rc = replacement.chars();
            match rc.next() {
                Some(first) => first.to_uppercase().chain(rc).collect(),
                None => String::new(),
            }
        }
        _ => replacement.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumericClaim {
    Percentage,
    Currency,
    Multiplier,
}

impl NumericClaim {
    fn reason(self) -> &'static str {
        match self {
            NumericClaim::Percentage => "percentage claim requires evidence",
            NumericClaim::Currency => "monetary claim requires evidence",
            NumericClaim::Multiplier => "multiplier claim requires evidence",
        }
    }
}

fn is_multiplier_sign(c: char) -> bool {
    matches!(c, 'x' | 'X' | '×')
}

fn is_gap(c: char) -> bool {
    matches!(c, ' ' | '\u{a0}' | '\u{202f}')
}

fn numeric_flags(text: &str) -> Vec<ClaimFinding> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let byte_at = |i: usize| chars.get(i).map(|&(b, _)| b).unwrap_or(text.len());
    let char_at = |i: usize| chars.get(i).map(|&(_, c)| c);
    let mut findings = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if !chars[i].1.is_ascii_digit() {
            i += 1;
            continue;
        }

        // extent of the number, allowing 1.5 and 1,5
        let mut j = i + 1;
        while let Some(c) = char_at(j) {
            let decimal =
                matches!(c, '.' | ',') && char_at(j + 1).is_some_and(|n| n.is_ascii_digit());
            if c.is_ascii_digit() || decimal {
                j += 1;
            } else {
                break;
            }
        }

        let before = if i > 0 { char_at(i - 1) } else { None };
        let before2 = if i > 1 { char_at(i - 2) } else { None };
        let prefix_multiplier = before.is_some_and(is_multiplier_sign)
            && !before2.is_some_and(is_word_char);
        if before.is_some_and(is_word_char) && !prefix_multiplier {
            // part of an identifier such as `mp4`
            i = j;
            continue;
        }

        let mut start = i;
        let mut end = j;
        let mut kind = None;

        if before.is_some_and(|c| CURRENCY_SIGNS.contains(&c)) {
            start = i - 1;
            kind = Some(NumericClaim::Currency);
        } else if prefix_multiplier && !char_at(j).is_some_and(is_word_char) {
            start = i - 1;
            kind = Some(NumericClaim::Multiplier);
        }

        if kind.is_none() {
            let k = if char_at(j).is_some_and(is_gap) { j + 1 } else { j };
            match char_at(k) {
                Some('%') => {
                    end = k + 1;
                    kind = Some(NumericClaim::Percentage);
                }
                Some(c) if CURRENCY_SIGNS.contains(&c) => {
                    end = k + 1;
                    kind = Some(NumericClaim::Currency);
                }
                Some(c) if k == j
                    && is_multiplier_sign(c)
                    && !char_at(k + 1).is_some_and(is_word_char) =>
                {
                    end = k + 1;
                    kind = Some(NumericClaim::Multiplier);
                }
                Some(c) if c.is_alphabetic() => {
                    let mut w = k;
                    while char_at(w).is_some_and(char::is_alphabetic) {
                        w += 1;
                    }
                    let word = text[byte_at(k)..byte_at(w)].to_lowercase();
                    if CURRENCY_WORDS.contains(&word.as_str()) {
                        end = w;
                        kind = Some(NumericClaim::Currency);
                    } else if MULTIPLIER_WORDS.contains(&word.as_str()) {
                        end = w;
                        kind = Some(NumericClaim::Multiplier);
                    }
                }
                _ => {}
            }
        }

        if let Some(kind) = kind {
            findings.push(ClaimFinding {
                term: text[byte_at(start)..byte_at(end)].to_string(),
                outcome: ClaimOutcome::Flagged,
                replacement: None,
                reason: kind.reason().to_string(),
            });
        }
        i = end.max(j);
    }

    findings
}
