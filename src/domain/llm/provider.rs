use async_trait::async_trait;
use std::fmt::Debug;

use super::{LlmRequest, LlmResponse};
use crate::domain::DomainError;

/// Trait for chat-completion providers (OpenAI-compatible endpoints, test doubles)
#[async_trait]
pub trait LlmProvider: Send + Sync + Debug {
    /// Send a chat completion request
    async fn chat(&self, model: &str, request: LlmRequest) -> Result<LlmResponse, DomainError>;

    /// Get the provider name
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::domain::llm::Message;

    /// Scripted LLM provider.
    ///
    /// Queued replies are consumed in order; once the queue is empty the fixed
    /// reply (or error) is used. Every received request is captured.
    #[derive(Debug)]
    pub struct MockLlmProvider {
        name: &'static str,
        queue: Mutex<VecDeque<Result<String, String>>>,
        fixed: Option<Result<String, String>>,
        delay: Option<Duration>,
        calls: AtomicUsize,
        requests: Mutex<Vec<LlmRequest>>,
    }

    impl MockLlmProvider {
        pub fn new(name: &'static str) -> Self {
            Self {
                name,
                queue: Mutex::new(VecDeque::new()),
                fixed: None,
                delay: None,
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Reply with this content whenever the queue is empty
        pub fn with_content(mut self, content: impl Into<String>) -> Self {
            self.fixed = Some(Ok(content.into()));
            self
        }

        /// Fail whenever the queue is empty
        pub fn with_error(mut self, error: impl Into<String>) -> Self {
            self.fixed = Some(Err(error.into()));
            self
        }

        /// Queue one successful reply
        pub fn then_content(self, content: impl Into<String>) -> Self {
            self.queue.lock().unwrap().push_back(Ok(content.into()));
            self
        }

        /// Queue one failure
        pub fn then_error(self, error: impl Into<String>) -> Self {
            self.queue.lock().unwrap().push_back(Err(error.into()));
            self
        }

        /// Sleep before answering
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn requests(&self) -> Vec<LlmRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlmProvider {
        async fn chat(&self, model: &str, request: LlmRequest) -> Result<LlmResponse, DomainError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request);

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let next = self.queue.lock().unwrap().pop_front();
            let reply = next
                .or_else(|| self.fixed.clone())
                .unwrap_or_else(|| Err("No mock response configured".to_string()));

            match reply {
                Ok(content) => Ok(LlmResponse::new(
                    format!("mock-{}", self.call_count()),
                    model.to_string(),
                    Message::assistant(content),
                )
                .with_usage(crate::domain::llm::Usage::new(10, 5))),
                Err(error) => Err(DomainError::provider(self.name, error)),
            }
        }

        fn provider_name(&self) -> &'static str {
            self.name
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_queue_then_fixed() {
            let provider = MockLlmProvider::new("mock")
                .then_content("first")
                .then_error("boom")
                .with_content("fixed");

            let first = provider.chat("m", LlmRequest::builder().user("q").build()).await;
            assert_eq!(first.unwrap().content(), Some("first"));

            let second = provider.chat("m", LlmRequest::builder().user("q").build()).await;
            assert!(second.is_err());

            let third = provider.chat("m", LlmRequest::builder().user("q").build()).await;
            assert_eq!(third.unwrap().content(), Some("fixed"));
            assert_eq!(provider.call_count(), 3);
            assert_eq!(provider.requests().len(), 3);
        }

        #[tokio::test]
        async fn test_unconfigured_mock_fails() {
            let provider = MockLlmProvider::new("mock");
            let result = provider.chat("m", LlmRequest::builder().user("q").build()).await;
            assert!(result.is_err());
        }
    }
}
