//! Core domain types for SowTrace structuring runs.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SourceType
// ---------------------------------------------------------------------------

/// The closed set of source-of-wealth kinds recognized by the engine.
///
/// Dynamic type labels from the upstream extractor are untyped text and
/// must be mapped onto these variants through the kb crate's resolver;
/// there is no twelfth kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    EmploymentIncome,
    BusinessIncome,
    BusinessDividends,
    SaleOfBusiness,
    SaleOfAsset,
    SaleOfProperty,
    Inheritance,
    Gift,
    DivorceSettlement,
    LotteryWinnings,
    InsurancePayout,
}

impl SourceType {
    /// All eleven kinds, in declaration order.
    pub const ALL: [SourceType; 11] = [
        SourceType::EmploymentIncome,
        SourceType::BusinessIncome,
        SourceType::BusinessDividends,
        SourceType::SaleOfBusiness,
        SourceType::SaleOfAsset,
        SourceType::SaleOfProperty,
        SourceType::Inheritance,
        SourceType::Gift,
        SourceType::DivorceSettlement,
        SourceType::LotteryWinnings,
        SourceType::InsurancePayout,
    ];

    /// Canonical snake_case name, matching the KB document keys and the
    /// output contract's `source_type` values.
    pub fn name(self) -> &'static str {
        match self {
            SourceType::EmploymentIncome => "employment_income",
            SourceType::BusinessIncome => "business_income",
            SourceType::BusinessDividends => "business_dividends",
            SourceType::SaleOfBusiness => "sale_of_business",
            SourceType::SaleOfAsset => "sale_of_asset",
            SourceType::SaleOfProperty => "sale_of_property",
            SourceType::Inheritance => "inheritance",
            SourceType::Gift => "gift",
            SourceType::DivorceSettlement => "divorce_settlement",
            SourceType::LotteryWinnings => "lottery_winnings",
            SourceType::InsurancePayout => "insurance_payout",
        }
    }

    /// Short id code used as the `source_id` prefix (e.g. `EMP-1`).
    pub fn code(self) -> &'static str {
        match self {
            SourceType::EmploymentIncome => "EMP",
            SourceType::BusinessIncome => "BIZ",
            SourceType::BusinessDividends => "DIV",
            SourceType::SaleOfBusiness => "SOB",
            SourceType::SaleOfAsset => "SOA",
            SourceType::SaleOfProperty => "SOP",
            SourceType::Inheritance => "INH",
            SourceType::Gift => "GFT",
            SourceType::DivorceSettlement => "DVC",
            SourceType::LotteryWinnings => "LTW",
            SourceType::InsurancePayout => "INS",
        }
    }

    /// Human-readable label for question rendering and CLI output.
    pub fn label(self) -> &'static str {
        match self {
            SourceType::EmploymentIncome => "employment income",
            SourceType::BusinessIncome => "business income",
            SourceType::BusinessDividends => "business dividends",
            SourceType::SaleOfBusiness => "sale of business",
            SourceType::SaleOfAsset => "sale of asset",
            SourceType::SaleOfProperty => "sale of property",
            SourceType::Inheritance => "inheritance",
            SourceType::Gift => "gift",
            SourceType::DivorceSettlement => "divorce settlement",
            SourceType::LotteryWinnings => "lottery winnings",
            SourceType::InsurancePayout => "insurance payout",
        }
    }

    /// Look up a kind by its canonical snake_case name.
    pub fn from_name(name: &str) -> Option<SourceType> {
        SourceType::ALL.iter().copied().find(|t| t.name() == name)
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// SourceId
// ---------------------------------------------------------------------------

/// Engine-assigned stable identifier for a source record within one run.
///
/// Format: `<type code>-<n>` with a monotonic per-run counter (`EMP-1`,
/// `GFT-2`). Lexicographic `Ord` on the rendered form is the tie-break
/// rule for merge survivorship.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub String);

impl SourceId {
    /// Render the nth id for a source type.
    pub fn new(source_type: SourceType, n: u32) -> Self {
        Self(format!("{}-{n}", source_type.code()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Field values and missing-field classification
// ---------------------------------------------------------------------------

/// A typed, coerced field value.
///
/// Serializes untagged so the report JSON carries plain values
/// (`50000.0`, `"2021-03-14"`, `"pending"`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    /// A value drawn from an enumerated option list (e.g. buyer/seller
    /// role, sale status).
    Choice(String),
}

impl FieldValue {
    /// Render the value for identity comparison and question templates.
    pub fn render(&self) -> String {
        match self {
            FieldValue::Text(s) | FieldValue::Choice(s) => s.clone(),
            FieldValue::Number(n) => {
                if n.fract() == 0.0 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            FieldValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

/// Why a required field is absent from a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingReason {
    /// The field should exist but was not captured from the narrative.
    NotStated,
    /// The field legitimately does not apply given the record's other
    /// attributes (e.g. no buyer while a sale is still pending).
    NotApplicable,
}

/// One entry of a record's `missing_fields` list. Exact output contract
/// shape: `{"field_name": ..., "reason": "not_stated"|"not_applicable"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingField {
    pub field_name: String,
    pub reason: MissingReason,
}

/// A field-level merge conflict: both values are retained here and the
/// field is withdrawn from `extracted_fields`, never silently
/// overwritten. The scorer counts the field as missing/not_stated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldConflict {
    pub field_name: String,
    pub values: Vec<FieldValue>,
}

// ---------------------------------------------------------------------------
// Chain links
// ---------------------------------------------------------------------------

/// The resolved state of a "requires originating source" link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ChainLink {
    /// Back-reference to another record in the same run.
    Internal(SourceId),
    /// The originating party's source of wealth does not exist as a
    /// record in this run. The engine never fabricates one.
    ExternalUnresolved {
        /// Described originating party, when the narrative named one.
        party: Option<String>,
    },
}

impl ChainLink {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ChainLink::Internal(_))
    }
}

// ---------------------------------------------------------------------------
// SourceRecord
// ---------------------------------------------------------------------------

/// Canonical unit of engine output. Created by the normalizer, refined
/// by deduplication and chain resolution, finalized by the scorer.
/// Lives for one run; never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRecord {
    pub source_id: SourceId,
    pub source_type: SourceType,
    /// Narrative excerpt the candidate was extracted from, passed
    /// through for reviewer context.
    pub description: Option<String>,
    /// Coerced field values. BTreeMap keeps report output and identity
    /// comparison deterministic.
    pub extracted_fields: BTreeMap<String, FieldValue>,
    pub missing_fields: Vec<MissingField>,
    pub completeness_score: f64,
    pub derived_from: Option<ChainLink>,
    /// Owner identifier for joint-holder disambiguation and chain party
    /// matching.
    pub origin_party: Option<String>,
    /// Field-level merge conflicts (dual retention).
    pub conflicts: Vec<FieldConflict>,
    /// Human-readable provenance notes (merges, dropped edges).
    pub provenance: Vec<String>,
}

impl SourceRecord {
    /// Fresh skeleton as produced by the normalizer: empty missing
    /// fields and a zero score, filled by the later stages.
    pub fn skeleton(source_id: SourceId, source_type: SourceType) -> Self {
        Self {
            source_id,
            source_type,
            description: None,
            extracted_fields: BTreeMap::new(),
            missing_fields: Vec::new(),
            completeness_score: 0.0,
            derived_from: None,
            origin_party: None,
            conflicts: Vec::new(),
            provenance: Vec::new(),
        }
    }

    /// True when the chain requirement (if any) ended unresolved.
    pub fn chain_unresolved(&self) -> bool {
        matches!(self.derived_from, Some(ChainLink::ExternalUnresolved { .. }))
    }
}

// ---------------------------------------------------------------------------
// RawCandidate (upstream extractor output; never mutated here)
// ---------------------------------------------------------------------------

/// Character span within the narrative the candidate was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeSpan {
    pub start: usize,
    pub end: usize,
}

/// One raw candidate source as proposed by the upstream extraction
/// call: an untyped field map plus a proposed type label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCandidate {
    /// Proposed source-type label (free text from the extractor).
    pub proposed_type: String,
    /// Untyped field values as extracted from the narrative.
    #[serde(default)]
    pub fields: BTreeMap<String, serde_json::Value>,
    /// Narrative excerpt supporting the candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Span reference back into the narrative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative_span: Option<NarrativeSpan>,
    /// Which holder this wealth belongs to (joint accounts, chain
    /// party matching).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_party: Option<String>,
}

// ---------------------------------------------------------------------------
// Account holder & case metadata (passed through unmodified)
// ---------------------------------------------------------------------------

/// Account holder kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolderType {
    Individual,
    Joint,
}

/// The account holder the narrative concerns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountHolder {
    pub name: String,
    #[serde(rename = "type")]
    pub holder_type: HolderType,
    /// Per-holder identifier used to attribute sources in joint
    /// accounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder_id: Option<String>,
}

/// Case-level metadata, emitted verbatim in the report's `metadata`
/// block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseMetadata {
    pub case_id: String,
    pub account_holder: AccountHolder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_stated_net_worth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}
