//! Standards lookup: grounded search, per-standard detail, comparison.
//!
//! Three independent single-shot operations. None of them touches
//! workflow state, so they may run concurrently with an active run or
//! with each other. Each failure is local to its caller.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::{Error, Result, Stage};
use crate::oracle::{
    GenerationRequest, GenerativeOracle, ParsePolicy, StructuredClient,
};

pub mod types;

pub use types::{
    AnalyticalStandard, BilingualText, ComparisonResult, ComparisonRow, DetailedMethod,
    MethodParameters, SearchResult, StandardStatus,
};

/// Client for the three lookup operations.
pub struct LookupClient {
    client: StructuredClient,
    model: Option<String>,
}

impl LookupClient {
    pub fn new(oracle: Arc<dyn GenerativeOracle>) -> Self {
        Self {
            client: StructuredClient::new(oracle),
            model: None,
        }
    }

    pub fn with_policy(mut self, policy: ParsePolicy) -> Self {
        self.client = self.client.with_policy(policy);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Grounded search for standards matching a free-text query.
    ///
    /// The reply is not schema-constrained on the wire (grounding and a
    /// response schema are mutually exclusive), so the listing is parsed
    /// best-effort under the configured policy. Citation sources without
    /// a resolvable reference have already been dropped by the transport.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<SearchResult> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::validation("search query must not be empty"));
        }

        let prompt = format!(
            "Find analytical standards for: \"{query}\". Return a JSON list of objects \
             with fields: id, code, title, organization, status, lastUpdate, matrix, \
             parameters {{ analyte, lod, instrument, technique }}, summary, twoMinuteRead."
        );
        let request = self.apply_model(GenerationRequest::new(prompt).with_grounded_search());

        let response = self
            .client
            .oracle()
            .generate(request)
            .await
            .map_err(|e| e.in_stage(Stage::Search))?;

        let standards = self
            .parse_listing(&response.text)
            .map_err(|e| e.in_stage(Stage::Search))?;
        debug!(
            hits = standards.len(),
            sources = response.sources.len(),
            "search completed"
        );

        Ok(SearchResult {
            standards,
            sources: response.sources,
        })
    }

    /// Full bilingual technical breakdown for one standard.
    #[instrument(skip(self, title))]
    pub async fn detail(&self, code: &str, title: &str) -> Result<DetailedMethod> {
        if code.trim().is_empty() {
            return Err(Error::validation("standard code must not be empty"));
        }

        let prompt = format!(
            "Provide technical breakdown for standard: {code} - {title}.\n\
             Return JSON with sections: overview, samplePrep, instrumentation, \
             performance, pitfalls, labNotes, compliance, selection.\n\
             Each section must have {{ en, vi }} strings."
        );
        let request = self.apply_model(
            GenerationRequest::new(prompt).with_schema(DetailedMethod::response_schema()),
        );

        self.client
            .generate(request)
            .await
            .map_err(|e| e.in_stage(Stage::Detail))
    }

    /// Side-by-side comparison of the given standard codes.
    ///
    /// Every row of the resulting table carries a value for each
    /// requested code; a reply that omits one fails conformance.
    #[instrument(skip(self))]
    pub async fn compare(&self, codes: &[String]) -> Result<ComparisonResult> {
        if codes.is_empty() {
            return Err(Error::validation(
                "comparison requires at least one standard code",
            ));
        }

        let prompt = format!(
            "Compare technical specs of: {}. Return JSON with comparisonTable \
             (array of {{attribute, values: {{ [code]: string }}}}) and expertInsight string.",
            codes.join(", ")
        );
        let request = self.apply_model(
            GenerationRequest::new(prompt).with_schema(ComparisonResult::response_schema(codes)),
        );

        self.client
            .generate(request)
            .await
            .map_err(|e| e.in_stage(Stage::Compare))
    }

    fn apply_model(&self, request: GenerationRequest) -> GenerationRequest {
        match &self.model {
            Some(model) => request.with_model(model.clone()),
            None => request,
        }
    }

    fn parse_listing(&self, text: &str) -> Result<Vec<AnalyticalStandard>> {
        match serde_json::from_str::<Vec<AnalyticalStandard>>(text.trim()) {
            Ok(standards) => Ok(standards),
            Err(e) => match self.client.policy() {
                ParsePolicy::Strict => Err(Error::schema_violation(format!(
                    "search payload is not a standards listing: {e}"
                ))),
                ParsePolicy::LenientDefaults => Ok(Vec::new()),
            },
        }
    }
}
