//! Core chat session management.
//!
//! This module provides the `ChatSession` struct, which owns the history, the
//! model catalog and the current model selection, and drives one exchange at a
//! time against the server.

use std::path::Path;
use std::time::Instant;

use futures::StreamExt;
use time::Date;

use crate::chat::config::ChatConfig;
use crate::error::{Error, Result};
use crate::exchange::{Exchange, pair_exchanges, remove_indices};
use crate::history::{GroupedHistory, HistoryStore, flatten};
use crate::observability::{STREAM_DURATION, STREAM_INTERRUPTS};
use crate::types::{ChatMessage, ChatTurn, Timestamp};
use crate::utils::time::format_date;
use crate::{Ollama, Renderer};

/// How often a running stream checks the renderer's interrupt flag.
const INTERRUPT_POLL: std::time::Duration = std::time::Duration::from_millis(50);

/// A chat session over one history file.
///
/// All state a front-end reads or changes lives here and is reached through
/// methods; nothing is global.  Failures of the catalog, the stream or the
/// history file are reported through the renderer or returned, and never end
/// the session.
pub struct ChatSession {
    client: Ollama,
    store: HistoryStore,
    history: GroupedHistory,
    catalog: Vec<String>,
    model: Option<String>,
    request_count: u64,
    failed_requests: u64,
    interrupted_requests: u64,
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// The selected model, if any.
    pub model: Option<String>,
    /// Number of models in the last fetched catalog.
    pub catalog_size: usize,
    /// Number of days with a history bucket.
    pub day_count: usize,
    /// Number of turns across all days.
    pub turn_count: usize,
    /// Completion requests made this session.
    pub total_requests: u64,
    /// Requests that ended with an error.
    pub failed_requests: u64,
    /// Requests the user interrupted.
    pub interrupted_requests: u64,
}

impl ChatSession {
    /// Creates a new chat session with the given client and configuration.
    ///
    /// The history is not read until [`ChatSession::load_history`].
    pub fn new(client: Ollama, config: ChatConfig) -> Self {
        Self {
            client,
            store: HistoryStore::new(config.history_path),
            history: GroupedHistory::new(),
            catalog: Vec::new(),
            model: config.model,
            request_count: 0,
            failed_requests: 0,
            interrupted_requests: 0,
        }
    }

    /// Loads the history file, replacing the in-memory history.
    ///
    /// An unreadable or malformed file is reported and the session continues
    /// with an empty history.
    pub fn load_history(&mut self, renderer: &mut dyn Renderer) {
        match self.store.load() {
            Ok(history) => self.history = history,
            Err(err) => {
                renderer.print_error(&format!("Failed to load chat history: {err}"));
                self.history = GroupedHistory::new();
            }
        }
    }

    /// Re-fetches the model catalog.
    ///
    /// On failure the catalog is empty and a warning is shown.  When no model
    /// is selected yet, the first catalog entry becomes the selection.
    pub async fn refresh_models(&mut self, renderer: &mut dyn Renderer) -> &[String] {
        match self.client.list_models().await {
            Ok(models) => self.catalog = models,
            Err(err) => {
                self.catalog.clear();
                renderer.print_warning(&format!("Error fetching models: {err}"));
            }
        }
        if self.catalog.is_empty() {
            renderer.print_warning("No models available. Please check the Ollama server.");
        }
        if self.model.is_none() {
            self.model = self.catalog.first().cloned();
        }
        &self.catalog
    }

    /// The last fetched model catalog.
    pub fn models(&self) -> &[String] {
        &self.catalog
    }

    /// The selected model, if any.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Selects a model by 1-based catalog number or by name.
    ///
    /// A name may omit a `:latest` tag.  Names missing from the catalog are
    /// accepted with a warning, since the server decides what it can run.
    pub fn select_model(&mut self, selector: &str, renderer: &mut dyn Renderer) -> Result<String> {
        let selector = selector.trim();
        if selector.is_empty() {
            return Err(Error::validation(
                "model name must not be empty",
                Some("model".to_string()),
            ));
        }

        let name = if let Ok(number) = selector.parse::<usize>() {
            number
                .checked_sub(1)
                .and_then(|idx| self.catalog.get(idx))
                .cloned()
                .ok_or_else(|| {
                    Error::validation(
                        format!(
                            "no model numbered {number}; the catalog has {} entries",
                            self.catalog.len()
                        ),
                        Some("model".to_string()),
                    )
                })?
        } else if let Some(known) = self
            .catalog
            .iter()
            .find(|m| *m == selector || m.strip_suffix(":latest") == Some(selector))
        {
            known.clone()
        } else {
            if !self.catalog.is_empty() {
                renderer.print_warning(&format!("{selector} is not in the model list"));
            }
            selector.to_string()
        };

        self.model = Some(name.clone());
        Ok(name)
    }

    /// Sends a user message and streams the response.
    ///
    /// This method:
    /// 1. Records the user turn (memory and disk)
    /// 2. Sends only this message to the server
    /// 3. Renders fragments as they arrive
    /// 4. Records whatever text arrived as the assistant turn
    ///
    /// The assistant turn is recorded even when the stream fails or is
    /// interrupted, so partial replies are kept.  An interrupt is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an error if no model is selected (nothing is recorded then) or
    /// if the request or stream failed.
    pub async fn send_streaming(
        &mut self,
        user_input: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<()> {
        let Some(model) = self.model.clone() else {
            return Err(Error::validation(
                "no model selected; use /models and /model <name>",
                Some("model".to_string()),
            ));
        };

        let user_turn = ChatTurn::user(self.next_timestamp(), user_input);
        self.record(user_turn, renderer);

        let messages = [ChatMessage::user(user_input)];
        let mut response = String::new();
        let started = Instant::now();
        let outcome = self
            .stream_response(&model, &messages, &mut response, renderer)
            .await;
        STREAM_DURATION.add(started.elapsed().as_secs_f64());
        self.request_count += 1;

        match &outcome {
            Ok(()) => renderer.finish_response(),
            Err(err) if err.is_interrupted() => {
                STREAM_INTERRUPTS.click();
                self.interrupted_requests += 1;
                renderer.print_interrupted();
            }
            Err(err) => {
                self.failed_requests += 1;
                tracing::warn!(model = %model, error = %err, kept = response.len(), "chat stream failed");
                if !response.is_empty() {
                    renderer.finish_response();
                }
            }
        }

        let reply = ChatTurn::assistant(self.next_timestamp(), response);
        self.record(reply, renderer);

        match outcome {
            Err(err) if err.is_interrupted() => Ok(()),
            other => other,
        }
    }

    async fn stream_response(
        &self,
        model: &str,
        messages: &[ChatMessage],
        response: &mut String,
        renderer: &mut dyn Renderer,
    ) -> Result<()> {
        let mut stream = self.client.stream_chat(model, messages).await?;
        loop {
            let next = tokio::select! {
                item = stream.next() => item,
                () = interrupt_requested(&*renderer) => {
                    return Err(Error::interrupted("response stopped by user"));
                }
            };
            match next {
                Some(Ok(fragment)) => {
                    renderer.print_text(&fragment);
                    response.push_str(&fragment);
                }
                Some(Err(err)) => return Err(err),
                None => return Ok(()),
            }
        }
    }

    /// Deletes exchange `number` (1-based, as listed) from `date`.
    ///
    /// Both halves of the exchange are removed and the whole history is
    /// rewritten.  Returns the removed turns.
    pub fn delete_exchange(&mut self, date: Date, number: usize) -> Result<Vec<ChatTurn>> {
        let turns = self
            .history
            .bucket_mut(date)
            .ok_or_else(|| no_history_on(date))?;
        let exchange = number
            .checked_sub(1)
            .and_then(|idx| pair_exchanges(turns).get(idx).copied())
            .ok_or_else(|| {
                Error::validation(
                    format!("no exchange {number} on {}", format_date(date)),
                    Some("number".to_string()),
                )
            })?;
        let removed = remove_indices(turns, &exchange.indices());
        self.rewrite()?;
        Ok(removed)
    }

    /// Deletes turn `number` (1-based) from `date` and rewrites the history.
    pub fn delete_turn(&mut self, date: Date, number: usize) -> Result<ChatTurn> {
        let turns = self
            .history
            .bucket_mut(date)
            .ok_or_else(|| no_history_on(date))?;
        let idx = number
            .checked_sub(1)
            .filter(|idx| *idx < turns.len())
            .ok_or_else(|| {
                Error::validation(
                    format!("no turn {number} on {}", format_date(date)),
                    Some("number".to_string()),
                )
            })?;
        let removed = turns.remove(idx);
        self.rewrite()?;
        Ok(removed)
    }

    /// The date-grouped history.
    pub fn history(&self) -> &GroupedHistory {
        &self.history
    }

    /// Dates with history, in the order they were first seen.
    pub fn dates(&self) -> Vec<Date> {
        self.history.dates().collect()
    }

    /// The turns recorded on `date`.
    pub fn turns(&self, date: Date) -> &[ChatTurn] {
        self.history.turns(date)
    }

    /// The exchanges recorded on `date`, in order.
    pub fn exchanges(&self, date: Date) -> Vec<Exchange> {
        pair_exchanges(self.history.turns(date))
    }

    /// Today's local date.
    pub fn today() -> Date {
        Timestamp::now().date()
    }

    /// The history file location.
    pub fn history_path(&self) -> &Path {
        self.store.path()
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            model: self.model.clone(),
            catalog_size: self.catalog.len(),
            day_count: self.history.day_count(),
            turn_count: self.history.turn_count(),
            total_requests: self.request_count,
            failed_requests: self.failed_requests,
            interrupted_requests: self.interrupted_requests,
        }
    }

    fn record(&mut self, turn: ChatTurn, renderer: &mut dyn Renderer) {
        if let Err(err) = self.store.append(&turn) {
            renderer.print_error(&format!("Failed to save chat history: {err}"));
        }
        self.history.push(turn);
    }

    fn rewrite(&mut self) -> Result<()> {
        let flat = flatten(&self.history);
        self.store.save_all(&flat)
    }

    // Turns must not go backwards in time even if the clock does.
    fn next_timestamp(&self) -> Timestamp {
        let now = Timestamp::now();
        self.history
            .latest()
            .map_or(now, |latest| latest.max(now))
    }
}

async fn interrupt_requested(renderer: &dyn Renderer) {
    while !renderer.should_interrupt() {
        tokio::time::sleep(INTERRUPT_POLL).await;
    }
}

fn no_history_on(date: Date) -> Error {
    Error::validation(
        format!("no history on {}", format_date(date)),
        Some("date".to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Speaker;
    use time::macros::date;

    #[derive(Default)]
    struct RecordingRenderer {
        text: String,
        errors: Vec<String>,
        warnings: Vec<String>,
    }

    impl Renderer for RecordingRenderer {
        fn print_text(&mut self, text: &str) {
            self.text.push_str(text);
        }

        fn print_error(&mut self, error: &str) {
            self.errors.push(error.to_string());
        }

        fn print_warning(&mut self, warning: &str) {
            self.warnings.push(warning.to_string());
        }

        fn print_info(&mut self, _: &str) {}

        fn print_turn(&mut self, _: &str, _: &str, _: &str) {}

        fn finish_response(&mut self) {}
    }

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    // Nothing listens on the discard port, so requests fail fast.
    fn offline_client() -> Ollama {
        Ollama::new(Some("http://127.0.0.1:9".to_string())).unwrap()
    }

    fn session_with(dir: &tempfile::TempDir, turns: &[ChatTurn]) -> ChatSession {
        let path = dir.path().join("chat_history.json");
        HistoryStore::new(&path).save_all(turns).unwrap();
        let config = ChatConfig::new().with_history_path(path);
        let mut session = ChatSession::new(offline_client(), config);
        let mut renderer = RecordingRenderer::default();
        session.load_history(&mut renderer);
        assert!(renderer.errors.is_empty());
        session
    }

    fn hi_hello_bye() -> Vec<ChatTurn> {
        vec![
            ChatTurn::user(ts("12-03-2025 10:00:00"), "hi"),
            ChatTurn::assistant(ts("12-03-2025 10:00:02"), "hello"),
            ChatTurn::user(ts("12-03-2025 10:05:00"), "bye"),
        ]
    }

    #[test]
    fn new_session_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = ChatConfig::new().with_history_path(dir.path().join("none.json"));
        let mut session = ChatSession::new(offline_client(), config);
        session.load_history(&mut RecordingRenderer::default());
        assert!(session.history().is_empty());
        assert!(session.model().is_none());
        assert_eq!(session.stats().turn_count, 0);
    }

    #[test]
    fn malformed_history_is_reported_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat_history.json");
        std::fs::write(&path, "{oops").unwrap();
        let mut session =
            ChatSession::new(offline_client(), ChatConfig::new().with_history_path(&path));
        let mut renderer = RecordingRenderer::default();
        session.load_history(&mut renderer);
        assert_eq!(renderer.errors.len(), 1);
        assert!(session.history().is_empty());
    }

    #[test]
    fn exchanges_for_a_day() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_with(&dir, &hi_hello_bye());
        assert_eq!(session.dates(), vec![date!(2025 - 03 - 12)]);
        let exchanges = session.exchanges(date!(2025 - 03 - 12));
        assert_eq!(exchanges.len(), 2);
        assert_eq!(exchanges[0].indices(), vec![0, 1]);
        assert_eq!(exchanges[1].indices(), vec![2]);
    }

    #[test]
    fn delete_exchange_removes_both_halves() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_with(&dir, &hi_hello_bye());
        let day = date!(2025 - 03 - 12);

        let removed = session.delete_exchange(day, 1).unwrap();
        assert_eq!(removed.len(), 2);

        let remaining = vec![ChatTurn::user(ts("12-03-2025 10:05:00"), "bye")];
        assert_eq!(session.turns(day), remaining.as_slice());
        let on_disk = HistoryStore::new(session.history_path()).read_turns().unwrap();
        assert_eq!(on_disk, remaining);
    }

    #[test]
    fn deleting_last_exchange_leaves_empty_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_with(&dir, &hi_hello_bye()[2..]);
        let day = date!(2025 - 03 - 12);
        session.delete_exchange(day, 1).unwrap();
        assert!(session.turns(day).is_empty());
        assert_eq!(session.history().day_count(), 1);
        assert!(
            HistoryStore::new(session.history_path())
                .read_turns()
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn delete_keeps_other_days_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut turns = vec![
            ChatTurn::user(ts("11-03-2025 22:00:00"), "yesterday"),
            ChatTurn::assistant(ts("11-03-2025 22:00:01"), "noted"),
        ];
        turns.extend(hi_hello_bye());
        let mut session = session_with(&dir, &turns);

        session.delete_exchange(date!(2025 - 03 - 12), 2).unwrap();

        let texts: Vec<String> = HistoryStore::new(session.history_path())
            .read_turns()
            .unwrap()
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(texts, vec!["yesterday", "noted", "hi", "hello"]);
    }

    #[test]
    fn delete_single_turn() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_with(&dir, &hi_hello_bye());
        let day = date!(2025 - 03 - 12);
        let removed = session.delete_turn(day, 2).unwrap();
        assert_eq!(removed.text, "hello");
        assert_eq!(session.turns(day).len(), 2);
        // The reply is gone, so "hi" and "bye" are now separate exchanges.
        assert_eq!(session.exchanges(day).len(), 2);
        assert_eq!(session.exchanges(day)[0].indices(), vec![0]);
    }

    #[test]
    fn out_of_range_deletes_write_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_with(&dir, &hi_hello_bye());
        let before = std::fs::read_to_string(session.history_path()).unwrap();

        let day = date!(2025 - 03 - 12);
        assert!(session.delete_exchange(day, 3).unwrap_err().is_validation());
        assert!(session.delete_exchange(day, 0).unwrap_err().is_validation());
        assert!(session.delete_turn(day, 4).unwrap_err().is_validation());
        assert!(
            session
                .delete_exchange(date!(2020 - 01 - 01), 1)
                .unwrap_err()
                .is_validation()
        );

        assert_eq!(std::fs::read_to_string(session.history_path()).unwrap(), before);
        assert_eq!(session.history().turn_count(), 3);
    }

    #[test]
    fn select_model_by_number_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_with(&dir, &[]);
        session.catalog = vec!["llama3.2:latest".to_string(), "mistral:7b".to_string()];
        let mut renderer = RecordingRenderer::default();

        assert_eq!(session.select_model("2", &mut renderer).unwrap(), "mistral:7b");
        assert_eq!(
            session.select_model("llama3.2", &mut renderer).unwrap(),
            "llama3.2:latest"
        );
        assert!(renderer.warnings.is_empty());

        assert!(session.select_model("3", &mut renderer).unwrap_err().is_validation());
        assert_eq!(session.model(), Some("llama3.2:latest"));

        assert_eq!(
            session.select_model("phi4", &mut renderer).unwrap(),
            "phi4"
        );
        assert_eq!(renderer.warnings.len(), 1);
    }

    #[tokio::test]
    async fn catalog_failure_is_empty_and_warned() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_with(&dir, &[]);
        let mut renderer = RecordingRenderer::default();
        let models = session.refresh_models(&mut renderer).await;
        assert!(models.is_empty());
        assert!(!renderer.warnings.is_empty());
        assert!(session.model().is_none());
    }

    #[tokio::test]
    async fn send_without_model_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_with(&dir, &[]);
        let mut renderer = RecordingRenderer::default();
        let err = session
            .send_streaming("hello?", &mut renderer)
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn failed_request_still_records_both_turns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat_history.json");
        let config = ChatConfig::new()
            .with_history_path(&path)
            .with_model("llama3.2");
        let mut session = ChatSession::new(offline_client(), config);
        let mut renderer = RecordingRenderer::default();
        session.load_history(&mut renderer);

        let err = session
            .send_streaming("anyone there?", &mut renderer)
            .await
            .unwrap_err();
        assert!(err.is_connection() || err.is_timeout(), "{err:?}");

        let stored = HistoryStore::new(&path).read_turns().unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].speaker, Speaker::User);
        assert_eq!(stored[0].text, "anyone there?");
        assert_eq!(stored[1].speaker, Speaker::Assistant);
        assert_eq!(stored[1].text, "");
        assert!(stored[0].timestamp <= stored[1].timestamp);
        assert_eq!(session.stats().failed_requests, 1);
    }

    #[tokio::test]
    async fn new_turns_never_precede_stored_ones() {
        let dir = tempfile::tempdir().unwrap();
        let future = ts("01-01-2099 12:00:00");
        let mut session = session_with(&dir, &[ChatTurn::user(future, "from a fast clock")]);
        session.model = Some("llama3.2".to_string());
        let mut renderer = RecordingRenderer::default();

        assert!(session.send_streaming("now", &mut renderer).await.is_err());

        let flat = flatten(session.history());
        assert_eq!(flat.len(), 3);
        assert_eq!(flat[0].text, "from a fast clock");
        assert_eq!(flat[1].text, "now");
        assert_eq!(flat[2].speaker, Speaker::Assistant);
        assert!(flat[1].timestamp >= future);
        assert!(flat[2].timestamp >= flat[1].timestamp);

        let stored = HistoryStore::new(session.history_path()).read_turns().unwrap();
        assert_eq!(stored, flat);
    }
}
