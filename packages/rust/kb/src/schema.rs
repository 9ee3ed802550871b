//! Schema types for source-of-wealth definitions.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use sowtrace_shared::{Result, SourceType, SowTraceError};

// ---------------------------------------------------------------------------
// Field specifications
// ---------------------------------------------------------------------------

/// Declared data type of a field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum FieldType {
    Text,
    Number,
    Date,
    /// Enumerated value (e.g. buyer/seller role, sale status).
    Choice { options: Vec<String> },
}

/// One declared field of a source type.
#[derive(Debug, Clone, Serialize)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
}

/// Declares a field inapplicable when another field holds a given
/// value (compared on the rendered form, case-insensitively).
///
/// Example: `buyer` is inapplicable while `sale_status` equals
/// `pending` — the sale has no buyer yet.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicabilityRule {
    /// Field the rule governs.
    pub field: String,
    /// Field whose value is inspected.
    pub when_field: String,
    /// Value of `when_field` that makes `field` inapplicable.
    pub equals: String,
}

/// Marks a source type as requiring an originating source (inheritance
/// needs the deceased's SOW, a gift the donor's, a divorce settlement
/// the former spouse's).
#[derive(Debug, Clone, Serialize)]
pub struct ChainRequirement {
    /// The required field that represents the originating source
    /// (e.g. `donor_original_source`).
    pub link_field: String,
    /// Field naming the originating party (e.g. `donor_name`).
    pub party_field: String,
    /// Source types an originating record may have.
    pub parent_types: Vec<SourceType>,
}

// ---------------------------------------------------------------------------
// SourceTypeDefinition
// ---------------------------------------------------------------------------

/// Full definition of one of the 11 source-of-wealth kinds.
#[derive(Debug, Clone, Serialize)]
pub struct SourceTypeDefinition {
    pub source_type: SourceType,
    pub required: Vec<FieldSpec>,
    pub optional: Vec<FieldSpec>,
    pub applicability: Vec<ApplicabilityRule>,
    /// Fields compared when deciding whether two records describe the
    /// same real-world entity (dedup and chain matching).
    pub identifying_fields: Vec<String>,
    pub chain: Option<ChainRequirement>,
}

impl SourceTypeDefinition {
    /// Look up a declared field, required first.
    pub fn field_spec(&self, name: &str) -> Option<&FieldSpec> {
        self.required
            .iter()
            .chain(self.optional.iter())
            .find(|f| f.name == name)
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|f| f.name == name)
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.field_spec(name).is_some()
    }

    /// Applicability rules governing a given field.
    pub fn rules_for(&self, field: &str) -> impl Iterator<Item = &ApplicabilityRule> {
        self.applicability.iter().filter(move |r| r.field == field)
    }
}

// ---------------------------------------------------------------------------
// KnowledgeBase
// ---------------------------------------------------------------------------

/// Validated, immutable set of definitions for all 11 source types.
///
/// Process-wide read-only configuration: build once at startup, pass
/// by reference into every stage.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeBase {
    definitions: BTreeMap<SourceType, SourceTypeDefinition>,
}

impl KnowledgeBase {
    /// Build and validate a knowledge base. Fails with
    /// `InvalidKnowledgeBase` on the first violation: a missing type,
    /// a duplicate field name within a type, or a rule/identifying/
    /// chain reference to an undeclared field.
    pub fn new(definitions: Vec<SourceTypeDefinition>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for def in definitions {
            validate_definition(&def)?;
            let type_name = def.source_type.name();
            if map.insert(def.source_type, def).is_some() {
                return Err(SowTraceError::invalid_kb(format!(
                    "duplicate definition for source type '{type_name}'"
                )));
            }
        }

        for t in SourceType::ALL {
            if !map.contains_key(&t) {
                return Err(SowTraceError::invalid_kb(format!(
                    "missing definition for source type '{}'",
                    t.name()
                )));
            }
        }

        Ok(Self { definitions: map })
    }

    /// Definition for a source type. All 11 are guaranteed present
    /// after construction.
    pub fn definition(&self, source_type: SourceType) -> &SourceTypeDefinition {
        &self.definitions[&source_type]
    }

    pub fn definitions(&self) -> impl Iterator<Item = &SourceTypeDefinition> {
        self.definitions.values()
    }
}

fn validate_definition(def: &SourceTypeDefinition) -> Result<()> {
    let type_name = def.source_type.name();

    let mut seen = BTreeSet::new();
    for spec in def.required.iter().chain(def.optional.iter()) {
        if !seen.insert(spec.name.as_str()) {
            return Err(SowTraceError::invalid_kb(format!(
                "{type_name}: duplicate field name '{}'",
                spec.name
            )));
        }
        if let FieldType::Choice { options } = &spec.field_type {
            if options.is_empty() {
                return Err(SowTraceError::invalid_kb(format!(
                    "{type_name}: choice field '{}' has no options",
                    spec.name
                )));
            }
        }
    }

    for rule in &def.applicability {
        for referenced in [rule.field.as_str(), rule.when_field.as_str()] {
            if !def.is_declared(referenced) {
                return Err(SowTraceError::invalid_kb(format!(
                    "{type_name}: applicability rule references undeclared field '{referenced}'"
                )));
            }
        }
    }

    for field in &def.identifying_fields {
        if !def.is_declared(field) {
            return Err(SowTraceError::invalid_kb(format!(
                "{type_name}: identifying field '{field}' is not declared"
            )));
        }
    }

    if let Some(chain) = &def.chain {
        if !def.is_required(&chain.link_field) {
            return Err(SowTraceError::invalid_kb(format!(
                "{type_name}: chain link field '{}' must be a required field",
                chain.link_field
            )));
        }
        if !def.is_declared(&chain.party_field) {
            return Err(SowTraceError::invalid_kb(format!(
                "{type_name}: chain party field '{}' is not declared",
                chain.party_field
            )));
        }
        if chain.parent_types.is_empty() {
            return Err(SowTraceError::invalid_kb(format!(
                "{type_name}: chain requirement lists no parent types"
            )));
        }
    }

    Ok(())
}
