//! Rolling summarization over a [`TurnBuffer`]

use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

use crate::buffer::{Coverage, NewTurn, Turn, TurnBuffer};
use crate::config::SummaryConfig;
use crate::error::{MnemeError, Result};
use crate::llm::{LLMProvider, LLMRequest, Message};

/// The raw turns selected for the next summary
#[derive(Debug, Clone)]
pub struct SummaryWindow {
    /// Selected rows in position order
    pub turns: Vec<Turn>,
    /// Range the summary will record
    pub coverage: Coverage,
}

/// What a summarization pass appended
#[derive(Debug, Clone)]
pub struct SummaryOutcome {
    /// Range recorded on the new summary row
    pub coverage: Coverage,
    /// Position of the summary row
    pub position: u64,
    /// Summary text
    pub text: String,
    /// Whether the local fallback replaced the model reply
    pub used_fallback: bool,
    /// Rows evicted by appending the summary
    pub evicted: Vec<Turn>,
}

/// Compresses the oldest unsummarized window of raw turns into one summary row.
///
/// Stateless with respect to the conversation: everything it needs is read
/// from the buffer's rows and their coverage annotations.
#[derive(Debug)]
pub struct RollingSummarizer {
    config: SummaryConfig,
    warned_capacity: AtomicUsize,
    clamp_warnings: AtomicUsize,
}

impl RollingSummarizer {
    /// Create a summarizer.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the window size is 0.
    pub fn new(config: SummaryConfig) -> Result<Self> {
        if config.window_size == 0 {
            return Err(MnemeError::InvalidArgument(
                "summary window_size must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            config,
            warned_capacity: AtomicUsize::new(usize::MAX),
            clamp_warnings: AtomicUsize::new(0),
        })
    }

    /// Configured window size
    pub fn window_size(&self) -> usize {
        self.config.window_size
    }

    pub fn config(&self) -> &SummaryConfig {
        &self.config
    }

    /// Window size after clamping to `capacity - 1`, leaving room for the
    /// summary row next to its raw turns.
    ///
    /// Warns the first time a clamp is needed and again whenever the capacity
    /// being clamped against differs from the last one warned about. Repeated
    /// calls with an unchanged capacity stay quiet.
    pub fn effective_window_size(&self, capacity: usize) -> usize {
        let limit = capacity.saturating_sub(1);
        if self.config.window_size <= limit {
            return self.config.window_size;
        }

        let previous = self.warned_capacity.swap(capacity, Ordering::Relaxed);
        if previous != capacity {
            self.clamp_warnings.fetch_add(1, Ordering::Relaxed);
            warn!(
                requested = self.config.window_size,
                clamped = limit,
                capacity,
                "summary window larger than capacity allows, clamping"
            );
        }
        limit
    }

    /// Highest position covered by any summary row still in the buffer
    pub fn last_covered(buffer: &TurnBuffer) -> u64 {
        buffer
            .turns()
            .iter()
            .filter_map(Turn::coverage)
            .map(|c| c.covered_through)
            .max()
            .unwrap_or(0)
    }

    /// Select the next window, or `None` if fewer than a full window of
    /// unsummarized raw turns is available.
    pub fn plan(&self, buffer: &TurnBuffer) -> Option<SummaryWindow> {
        let size = self.effective_window_size(buffer.capacity());
        if size == 0 {
            debug!(capacity = buffer.capacity(), "capacity leaves no room for summaries");
            return None;
        }

        let last_covered = Self::last_covered(buffer);
        let eligible: Vec<Turn> = buffer
            .turns()
            .iter()
            .filter(|t| t.is_raw() && !t.is_summary() && t.position > last_covered)
            .take(size)
            .cloned()
            .collect();

        if eligible.len() < size {
            debug!(
                eligible = eligible.len(),
                needed = size,
                last_covered,
                "not enough unsummarized turns"
            );
            return None;
        }

        let coverage = Coverage {
            covered_from: eligible[0].position,
            covered_through: eligible[eligible.len() - 1].position,
            window_size: size,
        };
        Some(SummaryWindow {
            turns: eligible,
            coverage,
        })
    }

    /// Messages sent to the model for a window
    pub fn build_messages(&self, window: &SummaryWindow) -> Vec<Message> {
        let mut messages = Vec::with_capacity(window.turns.len() + 2);
        messages.push(Message::system(self.config.prompt.clone()));
        messages.push(Message::user(self.config.instruction.clone()));
        messages.extend(window.turns.iter().map(Turn::to_message));
        messages
    }

    /// Deterministic local summary used when the model cannot be reached
    pub fn fallback_text(&self, window: &SummaryWindow) -> String {
        window
            .turns
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(&self.config.fallback_separator)
    }

    /// Append at most one summary row.
    ///
    /// Model failures and empty replies are absorbed: the fallback text is
    /// used instead and the outcome reports `used_fallback`.
    pub async fn summarize(
        &self,
        buffer: &mut TurnBuffer,
        provider: &dyn LLMProvider,
    ) -> Option<SummaryOutcome> {
        let window = self.plan(buffer)?;

        let (text, used_fallback) = match self.invoke(provider, &window).await {
            Ok(text) => (text, false),
            Err(e) => {
                warn!(
                    error = %e,
                    covered_from = window.coverage.covered_from,
                    covered_through = window.coverage.covered_through,
                    "summarizer failed, using local fallback"
                );
                (self.fallback_text(&window), true)
            }
        };

        let appended = buffer.append_turn(NewTurn::summary(text.clone(), window.coverage));
        debug!(
            position = appended.position,
            covered_from = window.coverage.covered_from,
            covered_through = window.coverage.covered_through,
            used_fallback,
            "appended summary row"
        );

        Some(SummaryOutcome {
            coverage: window.coverage,
            position: appended.position,
            text,
            used_fallback,
            evicted: appended.evicted,
        })
    }

    #[cfg(test)]
    fn clamp_warnings(&self) -> usize {
        self.clamp_warnings.load(Ordering::Relaxed)
    }

    async fn invoke(&self, provider: &dyn LLMProvider, window: &SummaryWindow) -> Result<String> {
        let request = LLMRequest::new(self.build_messages(window));
        let response = provider
            .generate_request(&request)
            .await
            .map_err(|e| MnemeError::ExternalFailure(e.to_string()))?;

        let text = response.to_text();
        if text.trim().is_empty() {
            return Err(MnemeError::ExternalFailure(
                "summarizer returned an empty reply".to_string(),
            ));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{EchoProvider, LLMResponse, MessageRole, StubLLMProvider};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every request and replies with a fixed string
    struct RecordingProvider {
        reply: String,
        requests: Mutex<Vec<LLMRequest>>,
    }

    impl RecordingProvider {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for RecordingProvider {
        async fn generate_request(&self, request: &LLMRequest) -> Result<LLMResponse> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(LLMResponse::text(self.reply.clone()))
        }
    }

    fn summarizer(window: usize) -> RollingSummarizer {
        RollingSummarizer::new(SummaryConfig::with_window(window).with_prompt("compress"))
            .unwrap()
    }

    fn fill(buffer: &mut TurnBuffer, pairs: usize) {
        for i in 0..pairs {
            buffer.append(MessageRole::User, format!("u{}", i));
            buffer.append(MessageRole::Assistant, format!("a{}", i));
        }
    }

    #[test]
    fn test_zero_window_rejected() {
        let result = RollingSummarizer::new(SummaryConfig::with_window(0));
        assert!(matches!(result, Err(MnemeError::InvalidArgument(_))));
    }

    #[test]
    fn test_effective_window_clamps() {
        let summarizer = summarizer(8);
        assert_eq!(summarizer.effective_window_size(6), 5);
        assert_eq!(summarizer.effective_window_size(20), 8);
        assert_eq!(summarizer.effective_window_size(1), 0);
        assert_eq!(summarizer.effective_window_size(0), 0);
    }

    #[test]
    fn test_clamp_warns_once_per_capacity_change() {
        let summarizer = summarizer(8);
        assert_eq!(summarizer.clamp_warnings(), 0);

        summarizer.effective_window_size(6);
        summarizer.effective_window_size(6);
        assert_eq!(summarizer.clamp_warnings(), 1);

        // No clamp needed, nothing to report and the last warning stands
        assert_eq!(summarizer.effective_window_size(20), 8);
        summarizer.effective_window_size(6);
        assert_eq!(summarizer.clamp_warnings(), 1);

        summarizer.effective_window_size(4);
        assert_eq!(summarizer.clamp_warnings(), 2);

        // Going back to an earlier capacity is a new change
        summarizer.effective_window_size(6);
        assert_eq!(summarizer.clamp_warnings(), 3);
    }

    #[test]
    fn test_plan_needs_full_window() {
        let summarizer = summarizer(4);
        let mut buffer = TurnBuffer::new(10);
        buffer.append(MessageRole::User, "q");
        buffer.append(MessageRole::Assistant, "a");
        buffer.append(MessageRole::System, "note");
        buffer.append(MessageRole::Tool, "result");
        buffer.append(MessageRole::User, "q2");
        assert!(summarizer.plan(&buffer).is_none());

        buffer.append(MessageRole::Assistant, "a2");
        let window = summarizer.plan(&buffer).expect("full window");
        let positions: Vec<u64> = window.turns.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![1, 2, 5, 6]);
        assert_eq!(window.coverage.covered_from, 1);
        assert_eq!(window.coverage.covered_through, 6);
        assert_eq!(window.coverage.window_size, 4);
    }

    #[tokio::test]
    async fn test_summarize_appends_annotated_row() {
        let summarizer = summarizer(4);
        let provider = RecordingProvider::new("short recap");
        let mut buffer = TurnBuffer::new(10);
        fill(&mut buffer, 2);

        let outcome = summarizer
            .summarize(&mut buffer, &provider)
            .await
            .expect("summary appended");

        assert!(!outcome.used_fallback);
        assert_eq!(outcome.text, "short recap");
        assert_eq!(outcome.position, 5);

        let row = buffer.turns().last().unwrap();
        assert!(row.is_summary());
        assert_eq!(row.role, MessageRole::System);
        assert_eq!(
            row.coverage(),
            Some(Coverage {
                covered_from: 1,
                covered_through: 4,
                window_size: 4
            })
        );

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let messages = &requests[0].messages;
        assert_eq!(messages.len(), 6);
        assert_eq!(messages[0], Message::system("compress"));
        assert_eq!(messages[1].role, MessageRole::User);
        assert_eq!(messages[2], Message::user("u0"));
        assert_eq!(messages[5], Message::assistant("a1"));
    }

    #[tokio::test]
    async fn test_summaries_are_not_repeated() {
        let summarizer = summarizer(4);
        let provider = EchoProvider::new();
        let mut buffer = TurnBuffer::new(20);
        fill(&mut buffer, 2);

        assert!(summarizer.summarize(&mut buffer, &provider).await.is_some());
        assert!(summarizer.summarize(&mut buffer, &provider).await.is_none());
        assert_eq!(buffer.len(), 5);

        fill(&mut buffer, 2);
        let second = summarizer.summarize(&mut buffer, &provider).await.unwrap();
        assert_eq!(second.coverage.covered_from, 6);
        assert_eq!(second.coverage.covered_through, 9);
        assert_eq!(RollingSummarizer::last_covered(&buffer), 9);
    }

    #[tokio::test]
    async fn test_fallback_on_failure() {
        let summarizer = RollingSummarizer::new(
            SummaryConfig::with_window(2).with_fallback_separator(" | "),
        )
        .unwrap();
        let mut buffer = TurnBuffer::new(5);
        buffer.append(MessageRole::User, "hello");
        buffer.append(MessageRole::Assistant, "hi there");

        let outcome = summarizer
            .summarize(&mut buffer, &StubLLMProvider)
            .await
            .unwrap();
        assert!(outcome.used_fallback);
        assert_eq!(outcome.text, "hello | hi there");
        assert_eq!(buffer.turns().last().unwrap().text, "hello | hi there");
    }

    #[tokio::test]
    async fn test_empty_reply_uses_fallback() {
        let summarizer = summarizer(2);
        let provider = RecordingProvider::new("   ");
        let mut buffer = TurnBuffer::new(5);
        fill(&mut buffer, 1);

        let outcome = summarizer.summarize(&mut buffer, &provider).await.unwrap();
        assert!(outcome.used_fallback);
        assert_eq!(outcome.text, "u0\na0");
    }
}
