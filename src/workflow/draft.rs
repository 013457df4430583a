//! Draft stage: parameters in, high-density draft card out.

use tracing::{debug, instrument};

use crate::card::{GenerationParameters, MethodCard};
use crate::error::{Result, Stage};
use crate::oracle::{GenerationRequest, StructuredClient};

/// Persona and document structure for draft generation. The nine-section
/// layout is non-negotiable; the response schema enforces it.
const DRAFT_ROLE_INSTRUCTION: &str = "\
You are a Senior Application Engineer in an ISO 17025 accredited laboratory.
Generate a comprehensive 9-section Method Card.
Sections:
1. Method Overview: Principle and chemical relevance.
2. Sample Preparation: Detailed extraction and cleanup (summary but technical).
3. Instrumentation: Column details, mobile phases, and detection logic.
4. Performance: Expected LOD, LOQ, Recovery, and RSD ranges.
5. Pitfalls: Critical failures and matrix effects.
6. Lab Notes: Professional experience and productivity tips.
7. Selection: When to choose this method vs others.
8. Compliance: Specific quality criteria (SANTE, EPA, etc.).
9. Disclaimer: Standard technical liability notice.";

/// Placeholder tokens for blank optional parameters. The oracle never
/// receives an ambiguous empty string.
const CHEMICAL_GROUP_PLACEHOLDER: &str = "N/A";
const TECHNIQUE_PLACEHOLDER: &str = "Standard Analytical Technique";
const STANDARDS_PLACEHOLDER: &str = "Relevant ISO/AOAC/EPA";

/// First stage of the pipeline: produce a draft method card from
/// user-supplied parameters.
#[derive(Clone)]
pub struct DraftStage {
    client: StructuredClient,
    model: Option<String>,
}

impl DraftStage {
    pub fn new(client: StructuredClient) -> Self {
        Self {
            client,
            model: None,
        }
    }

    /// Override the model used for draft calls.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Generate a draft card. Content plausibility is the review stage's
    /// job; the parsed card is returned unchanged.
    #[instrument(skip_all, fields(analyte = %params.analyte, matrix = %params.matrix))]
    pub async fn run(&self, params: &GenerationParameters) -> Result<MethodCard> {
        let mut request = GenerationRequest::new(build_prompt(params))
            .with_role_instruction(DRAFT_ROLE_INSTRUCTION)
            .with_schema(MethodCard::response_schema());
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }

        let card: MethodCard = self
            .client
            .generate(request)
            .await
            .map_err(|e| e.in_stage(Stage::Draft))?;

        debug!(title = %card.title, "draft card generated");
        Ok(card)
    }
}

fn or_placeholder<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        placeholder
    } else {
        trimmed
    }
}

fn build_prompt(params: &GenerationParameters) -> String {
    format!(
        "Generate a HIGH-DETAIL Laboratory Method Card.\n\
         Analyte: {}\n\
         Chemical group: {}\n\
         Matrix: {}\n\
         Technique: {}\n\
         Standards: {}\n\n\
         Requirements:\n\
         - Provide high technical density.\n\
         - Include specific extraction solvents, cleanup sorbents (e.g., C18, PSA), and column types (e.g., C18, HILIC).\n\
         - Focus on practical troubleshooting and 'insider' lab tips.\n\
         - Language: Vietnamese.",
        params.analyte.trim(),
        or_placeholder(&params.chemical_group, CHEMICAL_GROUP_PLACEHOLDER),
        params.matrix.trim(),
        or_placeholder(&params.technique, TECHNIQUE_PLACEHOLDER),
        or_placeholder(&params.reference_standards, STANDARDS_PLACEHOLDER),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::fixtures::sample_card;
    use crate::error::Error;
    use crate::oracle::mock::MockOracle;
    use std::sync::Arc;

    fn stage(oracle: Arc<MockOracle>) -> DraftStage {
        DraftStage::new(StructuredClient::new(oracle))
    }

    #[test]
    fn test_prompt_substitutes_placeholders_for_blank_optionals() {
        let prompt = build_prompt(&GenerationParameters::new("Pesticide", "Fruit"));
        assert!(prompt.contains("Analyte: Pesticide"));
        assert!(prompt.contains("Matrix: Fruit"));
        assert!(prompt.contains("Chemical group: N/A"));
        assert!(prompt.contains("Technique: Standard Analytical Technique"));
        assert!(prompt.contains("Standards: Relevant ISO/AOAC/EPA"));
    }

    #[test]
    fn test_prompt_uses_provided_optionals() {
        let params = GenerationParameters::new("Pb", "Drinking water")
            .with_chemical_group("Heavy metals")
            .with_technique("ICP-MS")
            .with_reference_standards("EPA 200.8");
        let prompt = build_prompt(&params);
        assert!(prompt.contains("Chemical group: Heavy metals"));
        assert!(prompt.contains("Technique: ICP-MS"));
        assert!(prompt.contains("Standards: EPA 200.8"));
    }

    #[tokio::test]
    async fn test_run_returns_parsed_card_unchanged() {
        let payload = serde_json::to_string(&sample_card()).unwrap();
        let oracle = Arc::new(MockOracle::new().with_response(payload));
        let card = stage(oracle.clone())
            .run(&GenerationParameters::new("Pesticide", "Fruit"))
            .await
            .unwrap();

        assert_eq!(card, sample_card());
        let request = &oracle.requests()[0];
        assert!(request.schema.is_some());
        assert!(request
            .role_instruction
            .as_deref()
            .unwrap()
            .contains("ISO 17025"));
    }

    #[tokio::test]
    async fn test_missing_section_is_draft_stage_schema_violation() {
        let mut value = serde_json::to_value(sample_card()).unwrap();
        value["sections"]
            .as_object_mut()
            .unwrap()
            .remove("disclaimer");
        let oracle = Arc::new(MockOracle::new().with_response(value.to_string()));

        let err = stage(oracle)
            .run(&GenerationParameters::new("Pesticide", "Fruit"))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Draft));
        assert!(matches!(
            err,
            Error::Stage { source, .. } if matches!(*source, Error::SchemaViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_is_attributed_to_draft_stage() {
        let oracle = Arc::new(MockOracle::new().with_transport_failure("connection reset"));
        let err = stage(oracle)
            .run(&GenerationParameters::new("Pesticide", "Fruit"))
            .await
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Draft));
    }
}
