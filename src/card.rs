//! Domain model for laboratory method cards.
//!
//! Wire names are camelCase to match the oracle payloads; the nine
//! section keys are the contract shared by the draft and review stages.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::oracle::{SchemaDescriptor, SchemaNode};

/// User-supplied parameters for a method-card generation run.
///
/// Immutable once submitted to the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParameters {
    /// Target analyte (required)
    pub analyte: String,
    /// Chemical group/class (optional)
    #[serde(default)]
    pub chemical_group: String,
    /// Sample matrix (required)
    pub matrix: String,
    /// Analytical technique (optional)
    #[serde(default)]
    pub technique: String,
    /// Reference standards to anchor on (optional)
    #[serde(default)]
    pub reference_standards: String,
}

impl GenerationParameters {
    /// Create parameters with the two required fields.
    pub fn new(analyte: impl Into<String>, matrix: impl Into<String>) -> Self {
        Self {
            analyte: analyte.into(),
            chemical_group: String::new(),
            matrix: matrix.into(),
            technique: String::new(),
            reference_standards: String::new(),
        }
    }

    pub fn with_chemical_group(mut self, group: impl Into<String>) -> Self {
        self.chemical_group = group.into();
        self
    }

    pub fn with_technique(mut self, technique: impl Into<String>) -> Self {
        self.technique = technique.into();
        self
    }

    pub fn with_reference_standards(mut self, standards: impl Into<String>) -> Self {
        self.reference_standards = standards.into();
        self
    }

    /// Check the required fields. Called before any external call.
    pub fn validate(&self) -> Result<()> {
        if self.analyte.trim().is_empty() {
            return Err(Error::validation("analyte is required"));
        }
        if self.matrix.trim().is_empty() {
            return Err(Error::validation("matrix is required"));
        }
        Ok(())
    }
}

/// The nine mandatory sections of a method card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSections {
    /// 1. Method overview: principle and chemical relevance
    pub overview: String,
    /// 2. Sample preparation: extraction and cleanup
    pub sample_prep: String,
    /// 3. Instrumentation: column, mobile phases, detection
    pub instrumentation: String,
    /// 4. Typical performance: LOD, LOQ, recovery, RSD
    pub performance: String,
    /// 5. Common pitfalls and troubleshooting
    pub pitfalls: String,
    /// 6. Laboratory notes and productivity tips
    pub lab_notes: String,
    /// 7. Applicability and method selection
    pub selection: String,
    /// 8. Quality and compliance criteria
    pub compliance: String,
    /// 9. Technical liability disclaimer
    pub disclaimer: String,
}

impl CardSections {
    /// The nine section keys as they appear on the wire, in order.
    pub const KEYS: [&'static str; 9] = [
        "overview",
        "samplePrep",
        "instrumentation",
        "performance",
        "pitfalls",
        "labNotes",
        "selection",
        "compliance",
        "disclaimer",
    ];
}

/// A structured technical document describing an analytical method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodCard {
    pub title: String,
    pub analytes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chemical_group: Option<String>,
    pub matrix: String,
    pub technique: String,
    pub reference_standards: String,
    pub sections: CardSections,
}

impl MethodCard {
    /// Response schema for a complete method card.
    ///
    /// All nine section fields are mandatory; absence of any one is a
    /// schema violation.
    pub fn response_schema() -> SchemaDescriptor {
        let sections = CardSections::KEYS
            .iter()
            .fold(SchemaDescriptor::new(), |schema, key| {
                schema.required_string(*key)
            });

        SchemaDescriptor::new()
            .required_string("title")
            .required_string("analytes")
            .string("chemicalGroup")
            .required_string("matrix")
            .required_string("technique")
            .required_string("referenceStandards")
            .required_field("sections", SchemaNode::object(sections))
    }
}

/// Risk attached to a single audit issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Auditor confidence in the finalized card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// A single technical gap found during QC review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QcIssue {
    pub description: String,
    /// Section the issue applies to
    pub section: String,
    pub risk: RiskLevel,
}

/// Audit report produced by the QC/finalize stage, paired 1:1 with the
/// card it audited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QcReport {
    #[serde(default)]
    pub issues: Vec<QcIssue>,
    pub suggestions: String,
    pub is_ready: bool,
    pub confidence: Confidence,
}

impl QcReport {
    /// Response schema for the audit report.
    pub fn response_schema() -> SchemaDescriptor {
        SchemaDescriptor::new()
            .required_field(
                "issues",
                SchemaNode::array(SchemaNode::object(
                    SchemaDescriptor::new()
                        .required_string("description")
                        .required_string("section")
                        .required_field("risk", SchemaNode::string_enum(&["Low", "Medium", "High"])),
                )),
            )
            .required_string("suggestions")
            .required_field("isReady", SchemaNode::boolean())
            .required_field(
                "confidence",
                SchemaNode::string_enum(&["Low", "Medium", "High"]),
            )
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub(crate) fn sample_card() -> MethodCard {
        MethodCard {
            title: "Pesticide residues in fruit by LC-MS/MS".to_string(),
            analytes: "Pesticide".to_string(),
            chemical_group: Some("Organophosphates".to_string()),
            matrix: "Fruit".to_string(),
            technique: "LC-MS/MS".to_string(),
            reference_standards: "SANTE 11312/2021".to_string(),
            sections: CardSections {
                overview: "o".to_string(),
                sample_prep: "s".to_string(),
                instrumentation: "i".to_string(),
                performance: "p".to_string(),
                pitfalls: "f".to_string(),
                lab_notes: "l".to_string(),
                selection: "sel".to_string(),
                compliance: "c".to_string(),
                disclaimer: "d".to_string(),
            },
        }
    }
}
