//! Knowledge base document parsing.
//!
//! The KB document is a JSON mapping from each of the 11 source-type
//! names to its field definitions:
//!
//! ```json
//! {
//!   "gift": {
//!     "required_fields": [{"name": "donor_name", "type": "text"}],
//!     "optional_fields": [{"name": "jurisdiction", "type": "text"}],
//!     "applicability_rules": [],
//!     "identifying_fields": ["donor_name"],
//!     "chain": {
//!       "link_field": "donor_original_source",
//!       "party_field": "donor_name",
//!       "parent_types": ["business_income"]
//!     }
//!   }
//! }
//! ```
//!
//! Parsing is strict: unknown type names, unknown field data types, and
//! structural violations all fail fast with `InvalidKnowledgeBase`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use sowtrace_shared::{Result, SourceType, SowTraceError};

use crate::schema::{
    ApplicabilityRule, ChainRequirement, FieldSpec, FieldType, KnowledgeBase,
    SourceTypeDefinition,
};

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TypeDoc {
    #[serde(default)]
    required_fields: Vec<FieldDoc>,
    #[serde(default)]
    optional_fields: Vec<FieldDoc>,
    #[serde(default)]
    applicability_rules: Vec<RuleDoc>,
    #[serde(default)]
    identifying_fields: Vec<String>,
    #[serde(default)]
    chain: Option<ChainDoc>,
}

#[derive(Debug, Deserialize)]
struct FieldDoc {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default)]
    options: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RuleDoc {
    field: String,
    not_applicable_when: ConditionDoc,
}

#[derive(Debug, Deserialize)]
struct ConditionDoc {
    field: String,
    equals: String,
}

#[derive(Debug, Deserialize)]
struct ChainDoc {
    link_field: String,
    party_field: String,
    parent_types: Vec<String>,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse and validate a KB document from JSON text.
pub fn parse_kb_document(json: &str) -> Result<KnowledgeBase> {
    let doc: BTreeMap<String, TypeDoc> = serde_json::from_str(json)
        .map_err(|e| SowTraceError::invalid_kb(format!("malformed KB document: {e}")))?;

    let mut definitions = Vec::with_capacity(doc.len());
    for (type_name, type_doc) in doc {
        let source_type = SourceType::from_name(&type_name).ok_or_else(|| {
            SowTraceError::invalid_kb(format!("unknown source type name '{type_name}'"))
        })?;
        definitions.push(convert_definition(source_type, type_doc)?);
    }

    KnowledgeBase::new(definitions)
}

/// Load and validate a KB document from a file path.
pub fn load_kb_from_path(path: &Path) -> Result<KnowledgeBase> {
    let content = std::fs::read_to_string(path).map_err(|e| SowTraceError::io(path, e))?;
    let kb = parse_kb_document(&content)?;
    tracing::info!(path = %path.display(), "loaded knowledge base document");
    Ok(kb)
}

fn convert_definition(source_type: SourceType, doc: TypeDoc) -> Result<SourceTypeDefinition> {
    let required = doc
        .required_fields
        .into_iter()
        .map(|f| convert_field(source_type, f))
        .collect::<Result<Vec<_>>>()?;
    let optional = doc
        .optional_fields
        .into_iter()
        .map(|f| convert_field(source_type, f))
        .collect::<Result<Vec<_>>>()?;

    let applicability = doc
        .applicability_rules
        .into_iter()
        .map(|r| ApplicabilityRule {
            field: r.field,
            when_field: r.not_applicable_when.field,
            equals: r.not_applicable_when.equals,
        })
        .collect();

    let chain = match doc.chain {
        Some(c) => {
            let parent_types = c
                .parent_types
                .iter()
                .map(|name| {
                    SourceType::from_name(name).ok_or_else(|| {
                        SowTraceError::invalid_kb(format!(
                            "{}: chain parent type '{name}' is not a known source type",
                            source_type.name()
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Some(ChainRequirement {
                link_field: c.link_field,
                party_field: c.party_field,
                parent_types,
            })
        }
        None => None,
    };

    Ok(SourceTypeDefinition {
        source_type,
        required,
        optional,
        applicability,
        identifying_fields: doc.identifying_fields,
        chain,
    })
}

fn convert_field(source_type: SourceType, doc: FieldDoc) -> Result<FieldSpec> {
    let field_type = match doc.field_type.as_str() {
        "text" => FieldType::Text,
        "number" => FieldType::Number,
        "date" => FieldType::Date,
        "choice" => FieldType::Choice {
            options: doc.options.unwrap_or_default(),
        },
        other => {
            return Err(SowTraceError::invalid_kb(format!(
                "{}: field '{}' has unknown data type '{other}'",
                source_type.name(),
                doc.name
            )));
        }
    };

    Ok(FieldSpec {
        name: doc.name,
        field_type,
    })
}
