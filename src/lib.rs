//! # methodcard-core
//!
//! Orchestration core for generating, auditing, and looking up analytical
//! method cards through a schema-constrained generative oracle.
//!
//! ## Core Components
//!
//! - **Oracle**: structured-generation client, response schemas, Gemini transport
//! - **Card**: method card and QC report data model
//! - **Workflow**: two-stage draft / review coordinator with observable state
//! - **Lookup**: grounded standards search, detail fetch, and comparison
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use methodcard_core::{
//!     ClientConfig, GeminiClient, GenerationParameters, MethodCardWorkflow, WorkflowConfig,
//! };
//!
//! let oracle = Arc::new(GeminiClient::new(ClientConfig::new(api_key))?);
//! let workflow = MethodCardWorkflow::new(oracle, WorkflowConfig::default());
//!
//! let params = GenerationParameters::new("Aflatoxin B1", "Peanut butter");
//! let completed = workflow.submit(params).await?;
//! println!("{} (ready: {})", completed.card.title, completed.report.is_ready);
//! ```

pub mod card;
pub mod error;
pub mod lookup;
pub mod oracle;
pub mod workflow;

// Re-exports for convenience
pub use card::{
    CardSections, Confidence, GenerationParameters, MethodCard, QcIssue, QcReport, RiskLevel,
};
pub use error::{Error, Result, Stage};
pub use lookup::{
    AnalyticalStandard, BilingualText, ComparisonResult, ComparisonRow, DetailedMethod,
    LookupClient, MethodParameters, SearchResult, StandardStatus,
};
pub use oracle::{
    ClientConfig, GeminiClient, GenerationRequest, GenerativeOracle, GroundingSource,
    OracleResponse, ParsePolicy, SchemaDescriptor, SchemaNode, StructuredClient,
};
pub use workflow::{
    CancelToken, CompletedRun, DraftStage, MethodCardWorkflow, ReviewStage, ReviewedCard,
    WorkflowConfig, WorkflowEvent, WorkflowRun, WorkflowStep,
};
