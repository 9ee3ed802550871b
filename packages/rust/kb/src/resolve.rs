//! Source-type label resolution.
//!
//! Labels proposed by the upstream extractor are untyped text
//! ("Business income", "salary", "Sale of company"). Resolution goes
//! through an explicit enumerated-variant resolver: exact match on the
//! canonical name, then an alias table, then a bounded fuzzy fallback
//! (normalized Levenshtein similarity against every known name). Below
//! the configured threshold the label fails with `UnknownSourceType` —
//! the candidate is surfaced unresolved, never silently dropped and
//! never given a fabricated type.

use std::sync::LazyLock;

use regex::Regex;
use sowtrace_shared::{Result, SourceType, SowTraceError};

/// Alias table: normalized label → source type. Canonical names and
/// human labels are matched before this table is consulted.
const ALIASES: &[(&str, SourceType)] = &[
    ("salary", SourceType::EmploymentIncome),
    ("wages", SourceType::EmploymentIncome),
    ("employment", SourceType::EmploymentIncome),
    ("salaried employment", SourceType::EmploymentIncome),
    ("business", SourceType::BusinessIncome),
    ("business profits", SourceType::BusinessIncome),
    ("self employment", SourceType::BusinessIncome),
    ("sole trader income", SourceType::BusinessIncome),
    ("dividends", SourceType::BusinessDividends),
    ("dividend income", SourceType::BusinessDividends),
    ("shareholder dividends", SourceType::BusinessDividends),
    ("sale of company", SourceType::SaleOfBusiness),
    ("business sale", SourceType::SaleOfBusiness),
    ("company sale", SourceType::SaleOfBusiness),
    ("sale of shares", SourceType::SaleOfBusiness),
    ("asset sale", SourceType::SaleOfAsset),
    ("sale of assets", SourceType::SaleOfAsset),
    ("property sale", SourceType::SaleOfProperty),
    ("real estate sale", SourceType::SaleOfProperty),
    ("sale of real estate", SourceType::SaleOfProperty),
    ("sale of home", SourceType::SaleOfProperty),
    ("bequest", SourceType::Inheritance),
    ("legacy", SourceType::Inheritance),
    ("inherited wealth", SourceType::Inheritance),
    ("donation", SourceType::Gift),
    ("family gift", SourceType::Gift),
    ("gifted funds", SourceType::Gift),
    ("divorce", SourceType::DivorceSettlement),
    ("divorce payout", SourceType::DivorceSettlement),
    ("matrimonial settlement", SourceType::DivorceSettlement),
    ("lottery", SourceType::LotteryWinnings),
    ("lottery win", SourceType::LotteryWinnings),
    ("gambling winnings", SourceType::LotteryWinnings),
    ("insurance", SourceType::InsurancePayout),
    ("insurance claim", SourceType::InsurancePayout),
    ("life insurance payout", SourceType::InsurancePayout),
];

/// Collapse a label to its comparison form: lowercase, alphanumeric
/// runs separated by single spaces.
fn normalize_label(label: &str) -> String {
    static NON_ALNUM_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid regex"));

    let lower = label.to_lowercase();
    NON_ALNUM_RE
        .replace_all(&lower, " ")
        .trim()
        .to_string()
}

/// Every name a type answers to, in normalized form.
fn known_names() -> impl Iterator<Item = (String, SourceType)> {
    let canonical = SourceType::ALL
        .iter()
        .flat_map(|t| [(normalize_label(t.name()), *t), (normalize_label(t.label()), *t)]);
    let aliases = ALIASES.iter().map(|(name, t)| ((*name).to_string(), *t));
    canonical.chain(aliases)
}

/// Resolve a proposed type label to one of the 11 source types.
///
/// `threshold` bounds the fuzzy fallback: the best normalized
/// similarity must reach it, otherwise `UnknownSourceType` is returned
/// carrying the closest candidate for the human reviewer.
pub fn resolve_type_label(label: &str, threshold: f64) -> Result<SourceType> {
    let normalized = normalize_label(label);
    if normalized.is_empty() {
        return Err(SowTraceError::UnknownSourceType {
            label: label.to_string(),
            closest: None,
        });
    }

    // Exact match on canonical names, labels, and aliases.
    for (name, t) in known_names() {
        if name == normalized {
            return Ok(t);
        }
    }

    // Bounded fuzzy fallback.
    let mut best: Option<(f64, String, SourceType)> = None;
    for (name, t) in known_names() {
        let sim = similarity(&normalized, &name);
        if best.as_ref().is_none_or(|(b, _, _)| sim > *b) {
            best = Some((sim, name, t));
        }
    }

    match best {
        Some((sim, name, t)) if sim >= threshold => {
            tracing::debug!(label, matched = %t, via = %name, similarity = sim, "fuzzy-resolved type label");
            Ok(t)
        }
        Some((sim, name, _)) => {
            tracing::debug!(label, closest = %name, similarity = sim, "unresolved type label");
            Err(SowTraceError::UnknownSourceType {
                label: label.to_string(),
                closest: Some(name),
            })
        }
        None => Err(SowTraceError::UnknownSourceType {
            label: label.to_string(),
            closest: None,
        }),
    }
}

/// Normalized Levenshtein similarity in [0,1]: 1.0 for identical
/// strings, 0.0 for entirely different ones.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (levenshtein(a, b) as f64) / (max_len as f64)
}

/// Classic two-row Levenshtein over chars.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}
