//! Request and response types for the generative oracle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::schema::SchemaDescriptor;

/// A single schema-constrained generation request.
///
/// The role instruction is a persistent behavioral directive, distinct
/// from the per-call prompt body; the schema (when present) declares the
/// response as structured data rather than free text.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Model to use (overrides the client default if set)
    pub model: Option<String>,
    /// Per-call prompt body
    pub prompt: String,
    /// Persistent role/system instruction
    pub role_instruction: Option<String>,
    /// Declared response shape; free text when absent
    pub schema: Option<SchemaDescriptor>,
    /// Request grounding via web search (search-style calls)
    pub grounded_search: bool,
}

impl GenerationRequest {
    /// Create a request with the given prompt body.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            model: None,
            prompt: prompt.into(),
            role_instruction: None,
            schema: None,
            grounded_search: false,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_role_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.role_instruction = Some(instruction.into());
        self
    }

    pub fn with_schema(mut self, schema: SchemaDescriptor) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Enable grounded web search for this call.
    ///
    /// Grounding and a response schema are mutually exclusive on the
    /// wire; the client sends whichever is set and grounding wins.
    pub fn with_grounded_search(mut self) -> Self {
        self.grounded_search = true;
        self
    }
}

/// A citation source extracted from the oracle's grounding metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    /// Page title, when available
    pub title: Option<String>,
    /// Resolvable reference URI
    pub uri: String,
}

/// Raw oracle reply: the text payload plus any grounding sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleResponse {
    /// Raw text payload (JSON when a schema was declared)
    pub text: String,
    /// Citation sources; entries without a resolvable uri are already
    /// dropped by the client
    pub sources: Vec<GroundingSource>,
    /// Model that produced the reply
    pub model: String,
    /// Response timestamp
    pub timestamp: DateTime<Utc>,
}

impl OracleResponse {
    /// Build a response stamped with the current time.
    pub fn new(text: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sources: Vec::new(),
            model: model.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_sources(mut self, sources: Vec<GroundingSource>) -> Self {
        self.sources = sources;
        self
    }
}
