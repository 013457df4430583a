//! The structured generation client: one opaque oracle call, a declared
//! response shape, and a typed result.

mod client;
#[cfg(test)]
pub mod mock;
pub mod schema;
mod structured;
pub mod types;

pub use client::{ClientConfig, GeminiClient, GenerativeOracle};
pub use schema::{ParsePolicy, SchemaDescriptor, SchemaNode};
pub use structured::StructuredClient;
pub use types::{GenerationRequest, GroundingSource, OracleResponse};
