use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{GenerationError, GenerationProvider, GenerationRequest};

/// Deterministic provider that replays queued responses in order.
///
/// Used by tests and offline demos. A hanging provider never resolves, which
/// lets callers exercise cancellation.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<String, GenerationError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    hang: bool,
}

impl ScriptedProvider {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            ..Self::default()
        }
    }

    pub fn failing(error: GenerationError) -> Self {
        let provider = Self::default();
        provider.push_error(error);
        provider
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    pub fn push_response(&self, response: impl Into<String>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Ok(response.into()));
        }
    }

    pub fn push_error(&self, error: GenerationError) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Err(error));
        }
    }

    /// Every request received so far, in call order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        if self.hang {
            std::future::pending::<()>().await;
        }
        let next = self
            .responses
            .lock()
            .map_err(|_| GenerationError::Provider("script lock poisoned".into()))?
            .pop_front();
        next.unwrap_or_else(|| Err(GenerationError::Provider("script exhausted".into())))
    }
}
