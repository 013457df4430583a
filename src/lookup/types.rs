//! Data model for the standards lookup operations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::oracle::{GroundingSource, SchemaDescriptor, SchemaNode};

/// Lifecycle status of a published standard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StandardStatus {
    Active,
    Superseded,
    Withdrawn,
    Proposed,
}

/// Key analytical figures of merit reported for a standard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodParameters {
    pub analyte: String,
    /// Method detection limit; not every listing reports one
    #[serde(default)]
    pub mdl: String,
    #[serde(default)]
    pub lod: String,
    /// Maximum residue limit, where regulation defines one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mrl: Option<String>,
    pub instrument: String,
    pub technique: String,
}

/// A standard returned by the grounded search operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticalStandard {
    pub id: String,
    /// Designation, e.g. "ISO 11885" or "EPA 200.8"
    pub code: String,
    pub title: String,
    /// Issuing body, e.g. "ISO", "EPA", "AOAC", "TCVN"
    pub organization: String,
    pub status: StandardStatus,
    pub last_update: String,
    pub matrix: String,
    pub parameters: MethodParameters,
    pub summary: String,
    /// Condensed practitioner briefing
    pub two_minute_read: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

/// Search hits plus the citation sources the grounded reply carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub standards: Vec<AnalyticalStandard>,
    pub sources: Vec<GroundingSource>,
}

/// A section rendered in both working languages of the lab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BilingualText {
    pub en: String,
    pub vi: String,
}

impl BilingualText {
    fn schema_node() -> SchemaNode {
        SchemaNode::object(
            SchemaDescriptor::new()
                .required_string("en")
                .required_string("vi"),
        )
    }
}

/// Full per-section technical breakdown of a single standard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedMethod {
    pub overview: BilingualText,
    pub sample_prep: BilingualText,
    pub instrumentation: BilingualText,
    pub performance: BilingualText,
    pub pitfalls: BilingualText,
    pub lab_notes: BilingualText,
    pub compliance: BilingualText,
    pub selection: BilingualText,
}

impl DetailedMethod {
    /// Wire-level keys of the eight sections, in presentation order.
    pub const SECTION_KEYS: [&'static str; 8] = [
        "overview",
        "samplePrep",
        "instrumentation",
        "performance",
        "pitfalls",
        "labNotes",
        "compliance",
        "selection",
    ];

    /// Response schema: every section required, each bilingual.
    pub fn response_schema() -> SchemaDescriptor {
        Self::SECTION_KEYS
            .iter()
            .fold(SchemaDescriptor::new(), |schema, key| {
                schema.required_field(*key, BilingualText::schema_node())
            })
    }
}

/// One attribute row of a comparison table, keyed by standard code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub attribute: String,
    pub values: BTreeMap<String, String>,
}

/// Side-by-side comparison of several standards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    pub comparison_table: Vec<ComparisonRow>,
    pub expert_insight: String,
}

impl ComparisonResult {
    /// Response schema for a comparison of the given codes.
    ///
    /// Each row's `values` object requires exactly the requested codes,
    /// so a reply that drops one of them fails conformance.
    pub fn response_schema(codes: &[String]) -> SchemaDescriptor {
        let values = codes
            .iter()
            .fold(SchemaDescriptor::new(), |schema, code| {
                schema.required_string(code.clone())
            });
        let row = SchemaDescriptor::new()
            .required_string("attribute")
            .required_field("values", SchemaNode::object(values));
        SchemaDescriptor::new()
            .required_field("comparisonTable", SchemaNode::array(SchemaNode::object(row)))
            .required_string("expertInsight")
    }
}
