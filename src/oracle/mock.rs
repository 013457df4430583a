//! A scripted oracle for testing.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::error::{Error, Result};

use super::client::GenerativeOracle;
use super::types::{GenerationRequest, GroundingSource, OracleResponse};

enum Scripted {
    Reply {
        text: String,
        sources: Vec<GroundingSource>,
    },
    Transport(String),
    Rejection {
        status: u16,
        message: String,
    },
}

/// A mock oracle that replays scripted responses in order and records
/// every request it receives.
///
/// When the script is exhausted the last entry is replayed; an empty
/// script fails every call.
pub struct MockOracle {
    script: Vec<Scripted>,
    requests: Mutex<Vec<GenerationRequest>>,
    delay: Option<std::time::Duration>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self {
            script: Vec::new(),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Delay every reply, to simulate oracle latency.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Script a successful text reply.
    pub fn with_response(mut self, text: impl Into<String>) -> Self {
        self.script.push(Scripted::Reply {
            text: text.into(),
            sources: Vec::new(),
        });
        self
    }

    /// Script a successful reply carrying grounding sources.
    pub fn with_grounded_response(
        mut self,
        text: impl Into<String>,
        sources: Vec<GroundingSource>,
    ) -> Self {
        self.script.push(Scripted::Reply {
            text: text.into(),
            sources,
        });
        self
    }

    /// Script a transport failure.
    pub fn with_transport_failure(mut self, message: impl Into<String>) -> Self {
        self.script.push(Scripted::Transport(message.into()));
        self
    }

    /// Script an explicit oracle-side rejection.
    pub fn with_rejection(mut self, status: u16, message: impl Into<String>) -> Self {
        self.script.push(Scripted::Rejection {
            status,
            message: message.into(),
        });
        self
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerativeOracle for MockOracle {
    async fn generate(&self, request: GenerationRequest) -> Result<OracleResponse> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len() - 1
        };

        let entry = self
            .script
            .get(index)
            .or_else(|| self.script.last())
            .ok_or_else(|| Error::transport("mock oracle has no scripted responses"))?;

        match entry {
            Scripted::Reply { text, sources } => {
                Ok(OracleResponse::new(text.clone(), "mock").with_sources(sources.clone()))
            }
            Scripted::Transport(message) => Err(Error::transport(message.clone())),
            Scripted::Rejection { status, message } => {
                Err(Error::oracle_rejection(*status, message.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_replay_and_recording() {
        let oracle = MockOracle::new()
            .with_response("first")
            .with_transport_failure("down");

        let first = oracle
            .generate(GenerationRequest::new("one"))
            .await
            .unwrap();
        assert_eq!(first.text, "first");

        let second = oracle.generate(GenerationRequest::new("two")).await;
        assert!(matches!(second, Err(Error::Transport(_))));

        // Exhausted script replays the last entry.
        let third = oracle.generate(GenerationRequest::new("three")).await;
        assert!(matches!(third, Err(Error::Transport(_))));

        assert_eq!(oracle.call_count(), 3);
        assert_eq!(oracle.requests()[1].prompt, "two");
    }
}
