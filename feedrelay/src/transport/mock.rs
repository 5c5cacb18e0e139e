//! Scripted transport for unit tests.

use super::{HttpResponse, HttpTransport};
use crate::error::FetchError;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Scripted = Result<HttpResponse, FetchError>;

#[derive(Default)]
struct MockState {
    queue: VecDeque<Scripted>,
    fallback: Option<Scripted>,
    calls: Vec<(String, Vec<(String, String)>, Duration)>,
}

/// Mock transport that replays queued responses in order, then repeats a
/// fallback response once the queue is drained.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    delay: Duration,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer with `response`.
    pub fn always(response: Scripted) -> Self {
        let mock = Self::new();
        mock.state.lock().unwrap().fallback = Some(response);
        mock
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push(&self, response: Scripted) -> &Self {
        self.state.lock().unwrap().queue.push_back(response);
        self
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|(url, _, _)| url.clone())
            .collect()
    }

    pub fn last_headers(&self) -> Vec<(String, String)> {
        self.state
            .lock()
            .unwrap()
            .calls
            .last()
            .map(|(_, h, _)| h.clone())
            .unwrap_or_default()
    }

    pub fn last_timeout(&self) -> Option<Duration> {
        self.state.lock().unwrap().calls.last().map(|(_, _, t)| *t)
    }
}

impl HttpTransport for MockTransport {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> Result<HttpResponse, FetchError> {
        let scripted = {
            let mut state = self.state.lock().unwrap();
            state
                .calls
                .push((url.to_string(), headers.to_vec(), timeout));
            state
                .queue
                .pop_front()
                .or_else(|| state.fallback.clone())
                .unwrap_or_else(|| Err(FetchError::transport("no scripted response")))
        };

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        scripted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_then_fallback() {
        let mock = MockTransport::always(Ok(HttpResponse::json("{\"n\":0}")));
        mock.push(Ok(HttpResponse::text(500, "boom")));

        let first = mock.get("http://a", &[], Duration::from_secs(1)).await.unwrap();
        assert_eq!(first.status, 500);

        let second = mock.get("http://b", &[], Duration::from_secs(1)).await.unwrap();
        assert_eq!(second.status, 200);

        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.urls(), vec!["http://a", "http://b"]);
    }

    #[tokio::test]
    async fn test_empty_script_errors() {
        let mock = MockTransport::new();
        assert!(mock.get("http://a", &[], Duration::from_secs(1)).await.is_err());
    }
}
