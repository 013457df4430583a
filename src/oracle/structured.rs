//! Typed wrapper over the generative oracle.
//!
//! [`StructuredClient`] turns one oracle call into a typed value:
//! generate, parse the JSON payload, conform it against the declared
//! schema under the configured [`ParsePolicy`], then deserialize.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};

use super::client::GenerativeOracle;
use super::schema::ParsePolicy;
use super::types::GenerationRequest;

/// Schema-validating client over an opaque oracle.
#[derive(Clone)]
pub struct StructuredClient {
    oracle: Arc<dyn GenerativeOracle>,
    policy: ParsePolicy,
}

impl StructuredClient {
    /// Create a client with the strict parse policy.
    pub fn new(oracle: Arc<dyn GenerativeOracle>) -> Self {
        Self {
            oracle,
            policy: ParsePolicy::Strict,
        }
    }

    /// Override the parse policy.
    pub fn with_policy(mut self, policy: ParsePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The configured parse policy.
    pub fn policy(&self) -> ParsePolicy {
        self.policy
    }

    /// Shared handle to the underlying oracle.
    pub fn oracle(&self) -> Arc<dyn GenerativeOracle> {
        Arc::clone(&self.oracle)
    }

    /// Issue a schema-constrained call and deserialize the reply.
    ///
    /// The request must carry a non-empty prompt and a schema; both are
    /// checked before any external call is made.
    pub async fn generate<T: DeserializeOwned>(&self, request: GenerationRequest) -> Result<T> {
        if request.prompt.trim().is_empty() {
            return Err(Error::validation("prompt body must be non-empty"));
        }
        let schema = request
            .schema
            .clone()
            .ok_or_else(|| Error::Config("structured call requires a response schema".into()))?;

        let response = self.oracle.generate(request).await?;
        debug!(
            model = %response.model,
            bytes = response.text.len(),
            "structured payload received"
        );

        let conformed = schema.conform(&response.text, self.policy)?;
        Ok(serde_json::from_value(conformed)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::mock::MockOracle;
    use crate::oracle::schema::SchemaDescriptor;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        ready: bool,
        summary: String,
    }

    fn verdict_schema() -> SchemaDescriptor {
        SchemaDescriptor::new()
            .required_field("ready", crate::oracle::schema::SchemaNode::boolean())
            .required_string("summary")
    }

    #[tokio::test]
    async fn test_generate_parses_typed_value() {
        let oracle = Arc::new(MockOracle::new().with_response(
            r#"{"ready": true, "summary": "fit for use"}"#,
        ));
        let client = StructuredClient::new(oracle.clone());

        let verdict: Verdict = client
            .generate(GenerationRequest::new("review this").with_schema(verdict_schema()))
            .await
            .unwrap();

        assert_eq!(
            verdict,
            Verdict {
                ready: true,
                summary: "fit for use".to_string()
            }
        );
        assert_eq!(oracle.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected_before_any_call() {
        let oracle = Arc::new(MockOracle::new().with_response("{}"));
        let client = StructuredClient::new(oracle.clone());

        let result: Result<Verdict> = client
            .generate(GenerationRequest::new("   ").with_schema(verdict_schema()))
            .await;

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(oracle.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_schema_is_config_error() {
        let oracle = Arc::new(MockOracle::new().with_response("{}"));
        let client = StructuredClient::new(oracle.clone());

        let result: Result<Verdict> = client.generate(GenerationRequest::new("review")).await;

        assert!(matches!(result, Err(Error::Config(_))));
        assert_eq!(oracle.call_count(), 0);
    }

    #[tokio::test]
    async fn test_strict_policy_rejects_malformed_payload() {
        let oracle = Arc::new(MockOracle::new().with_response("this is not json"));
        let client = StructuredClient::new(oracle);

        let result: Result<Verdict> = client
            .generate(GenerationRequest::new("review this").with_schema(verdict_schema()))
            .await;

        assert!(matches!(result, Err(Error::SchemaViolation(_))));
    }

    #[tokio::test]
    async fn test_lenient_policy_fills_optional_fields() {
        #[derive(Debug, Deserialize)]
        struct Notes {
            summary: String,
            #[serde(default)]
            notes: String,
        }

        let oracle = Arc::new(MockOracle::new().with_response(r#"{"summary": "ok"}"#));
        let client =
            StructuredClient::new(oracle).with_policy(ParsePolicy::LenientDefaults);

        let schema = SchemaDescriptor::new().required_string("summary").string("notes");
        let notes: Notes = client
            .generate(GenerationRequest::new("summarize").with_schema(schema))
            .await
            .unwrap();

        assert_eq!(notes.summary, "ok");
        assert_eq!(notes.notes, "");
    }
}
