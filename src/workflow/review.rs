//! QC/finalize stage: audit the draft and emit a corrected final card.

use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::card::{MethodCard, QcReport};
use crate::error::{Result, Stage};
use crate::oracle::{GenerationRequest, SchemaDescriptor, SchemaNode, StructuredClient};

/// Lead-auditor persona. The oracle must return both the audit report and
/// a complete corrected card, never a patch.
const REVIEW_ROLE_INSTRUCTION: &str = "\
You are an ISO 17025 Lead Auditor and Method Validation Expert.
1. Audit the draft for technical gaps (e.g., missing pH adjustments, matrix matching).
2. Create a concise QC Report.
3. Fix and enrich the Method Card to ensure it provides MAXIMUM value to a lab technician.
Ensure the Final version is robust, highly technical, and strictly formatted.
Language: Vietnamese.";

/// The finalized card paired with the audit that produced it.
///
/// The pairing is structural: a report is never observable without its
/// corresponding finalized card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewedCard {
    pub report: QcReport,
    pub card: MethodCard,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewResponse {
    qc_report: QcReport,
    final_card: MethodCard,
}

/// Second stage of the pipeline: review a draft card and finalize it.
#[derive(Clone)]
pub struct ReviewStage {
    client: StructuredClient,
    model: Option<String>,
}

impl ReviewStage {
    pub fn new(client: StructuredClient) -> Self {
        Self {
            client,
            model: None,
        }
    }

    /// Override the model used for review calls.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Audit and finalize a draft. The returned card supersedes the draft
    /// entirely; callers do not merge them.
    #[instrument(skip_all, fields(title = %draft.title))]
    pub async fn run(&self, draft: &MethodCard) -> Result<ReviewedCard> {
        let draft_json = serde_json::to_string(draft).map_err(|e| {
            crate::error::Error::from(e).in_stage(Stage::Review)
        })?;

        let mut request = GenerationRequest::new(format!(
            "Review and finalize this expert Method Card: {draft_json}"
        ))
        .with_role_instruction(REVIEW_ROLE_INSTRUCTION)
        .with_schema(Self::response_schema());
        if let Some(model) = &self.model {
            request = request.with_model(model.clone());
        }

        let response: ReviewResponse = self
            .client
            .generate(request)
            .await
            .map_err(|e| e.in_stage(Stage::Review))?;

        if !response.qc_report.is_ready {
            warn!(
                issues = response.qc_report.issues.len(),
                "auditor marked finalized card as not ready"
            );
        }
        debug!(
            issues = response.qc_report.issues.len(),
            confidence = ?response.qc_report.confidence,
            "review complete"
        );

        Ok(ReviewedCard {
            report: response.qc_report,
            card: response.final_card,
        })
    }

    /// Response schema: `qcReport` and `finalCard` as required top-level
    /// siblings. A missing `finalCard` fails the stage.
    fn response_schema() -> SchemaDescriptor {
        SchemaDescriptor::new()
            .required_field("qcReport", SchemaNode::object(QcReport::response_schema()))
            .required_field("finalCard", SchemaNode::object(MethodCard::response_schema()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::fixtures::sample_card;
    use crate::card::CardSections;
    use crate::error::Error;
    use crate::oracle::mock::MockOracle;
    use serde_json::json;
    use std::sync::Arc;

    fn review_payload() -> String {
        let mut final_card = serde_json::to_value(sample_card()).unwrap();
        final_card["title"] = json!("Pesticide residues in fruit by LC-MS/MS (finalized)");
        json!({
            "qcReport": {
                "issues": [
                    {"description": "no matrix-matched calibration", "section": "performance", "risk": "Medium"}
                ],
                "suggestions": "add matrix matching",
                "isReady": true,
                "confidence": "High"
            },
            "finalCard": final_card
        })
        .to_string()
    }

    fn stage(oracle: Arc<MockOracle>) -> ReviewStage {
        ReviewStage::new(StructuredClient::new(oracle))
    }

    #[tokio::test]
    async fn test_run_returns_report_and_final_card() {
        let oracle = Arc::new(MockOracle::new().with_response(review_payload()));
        let reviewed = stage(oracle).run(&sample_card()).await.unwrap();

        assert!(reviewed.report.is_ready);
        assert_eq!(reviewed.report.issues.len(), 1);
        // The finalized card supersedes the draft.
        assert_ne!(reviewed.card.title, sample_card().title);
    }

    #[tokio::test]
    async fn test_prompt_embeds_full_draft_with_all_nine_section_keys() {
        let oracle = Arc::new(MockOracle::new().with_response(review_payload()));
        stage(oracle.clone()).run(&sample_card()).await.unwrap();

        let prompt = &oracle.requests()[0].prompt;
        assert!(prompt.starts_with("Review and finalize this expert Method Card:"));
        for key in CardSections::KEYS {
            assert!(prompt.contains(&format!("\"{key}\"")), "missing {key}");
        }
    }

    #[tokio::test]
    async fn test_missing_final_card_fails_the_stage() {
        let payload = json!({
            "qcReport": {
                "issues": [],
                "suggestions": "",
                "isReady": false,
                "confidence": "Low"
            }
        })
        .to_string();
        let oracle = Arc::new(MockOracle::new().with_response(payload));

        let err = stage(oracle).run(&sample_card()).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Review));
        assert!(err.to_string().contains("finalCard"));
    }

    #[tokio::test]
    async fn test_oracle_rejection_is_attributed_to_review_stage() {
        let oracle = Arc::new(MockOracle::new().with_rejection(429, "quota exceeded"));
        let err = stage(oracle).run(&sample_card()).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Review));
        assert!(matches!(
            err,
            Error::Stage { source, .. }
                if matches!(*source, Error::OracleRejection { status: 429, .. })
        ));
    }
}
