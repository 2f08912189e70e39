// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock data source with scripted history, participants and failures.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use recap_core::RecapError;
use recap_core::traits::adapter::PluginAdapter;
use recap_core::traits::source::{DataSource, SourceSession};
use recap_core::types::{AdapterType, HealthStatus, HistoryPage, Participant, Record, Target};

/// Counters shared by the source and every session it opened.
#[derive(Debug, Default)]
struct Counters {
    opened: AtomicU32,
    closed: AtomicU32,
    fetches: AtomicU32,
}

/// A data source backed by in-memory fixtures.
///
/// History is served one configured page per fetch, using the page index as
/// the cursor. Scripted errors are returned, in order, before any page.
pub struct MockDataSource {
    targets: HashMap<String, Target>,
    history: HashMap<String, Vec<Vec<String>>>,
    participants: HashMap<String, Vec<Participant>>,
    open_errors: Arc<Mutex<VecDeque<RecapError>>>,
    fetch_errors: Arc<Mutex<VecDeque<RecapError>>>,
    participant_errors: Arc<Mutex<VecDeque<RecapError>>>,
    counters: Arc<Counters>,
}

impl MockDataSource {
    pub fn new() -> Self {
        Self {
            targets: HashMap::new(),
            history: HashMap::new(),
            participants: HashMap::new(),
            open_errors: Arc::new(Mutex::new(VecDeque::new())),
            fetch_errors: Arc::new(Mutex::new(VecDeque::new())),
            participant_errors: Arc::new(Mutex::new(VecDeque::new())),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Resolve `raw_input` (compared trimmed) to `target`.
    pub fn with_target(mut self, raw_input: &str, target: Target) -> Self {
        self.targets.insert(raw_input.trim().to_string(), target);
        self
    }

    /// Serve `pages` of record texts for `target_id`, newest page first.
    pub fn with_history(mut self, target_id: &str, pages: Vec<Vec<&str>>) -> Self {
        let pages = pages
            .into_iter()
            .map(|page| page.into_iter().map(str::to_string).collect())
            .collect();
        self.history.insert(target_id.to_string(), pages);
        self
    }

    pub fn with_participants(mut self, target_id: &str, participants: Vec<Participant>) -> Self {
        self.participants.insert(target_id.to_string(), participants);
        self
    }

    /// Fail the next `open_session` calls with `errors`, in order.
    pub fn with_open_errors(self, errors: Vec<RecapError>) -> Self {
        Self {
            open_errors: Arc::new(Mutex::new(errors.into())),
            ..self
        }
    }

    /// Fail the next history fetches with `errors`, in order.
    pub fn with_fetch_errors(self, errors: Vec<RecapError>) -> Self {
        Self {
            fetch_errors: Arc::new(Mutex::new(errors.into())),
            ..self
        }
    }

    /// Fail the next participant listings with `errors`, in order.
    pub fn with_participant_errors(self, errors: Vec<RecapError>) -> Self {
        Self {
            participant_errors: Arc::new(Mutex::new(errors.into())),
            ..self
        }
    }

    /// Sessions opened so far.
    pub fn sessions_opened(&self) -> u32 {
        self.counters.opened.load(Ordering::SeqCst)
    }

    /// Sessions closed so far.
    pub fn sessions_closed(&self) -> u32 {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// History fetch calls so far, failed ones included.
    pub fn fetch_calls(&self) -> u32 {
        self.counters.fetches.load(Ordering::SeqCst)
    }
}

impl Default for MockDataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockDataSource {
    fn name(&self) -> &str {
        "mock-source"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::DataSource
    }

    async fn health_check(&self) -> Result<HealthStatus, RecapError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), RecapError> {
        Ok(())
    }
}

#[async_trait]
impl DataSource for MockDataSource {
    async fn resolve(&self, raw_input: &str) -> Result<Target, RecapError> {
        self.targets
            .get(raw_input.trim())
            .cloned()
            .ok_or_else(|| RecapError::TargetInvalid {
                input: raw_input.trim().to_string(),
                reason: "no such chat".into(),
            })
    }

    async fn open_session(
        &self,
        _credentials: Option<&str>,
    ) -> Result<Box<dyn SourceSession>, RecapError> {
        if let Some(err) = self.open_errors.lock().await.pop_front() {
            return Err(err);
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            history: self.history.clone(),
            participants: self.participants.clone(),
            fetch_errors: self.fetch_errors.clone(),
            participant_errors: self.participant_errors.clone(),
            counters: self.counters.clone(),
            closed: false,
        }))
    }
}

struct MockSession {
    history: HashMap<String, Vec<Vec<String>>>,
    participants: HashMap<String, Vec<Participant>>,
    fetch_errors: Arc<Mutex<VecDeque<RecapError>>>,
    participant_errors: Arc<Mutex<VecDeque<RecapError>>>,
    counters: Arc<Counters>,
    closed: bool,
}

#[async_trait]
impl SourceSession for MockSession {
    async fn fetch_history_page(
        &mut self,
        target_id: &str,
        cursor: Option<&str>,
    ) -> Result<HistoryPage, RecapError> {
        self.counters.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fetch_errors.lock().await.pop_front() {
            return Err(err);
        }

        let pages = self.history.get(target_id).map(Vec::as_slice).unwrap_or(&[]);
        let index: usize = match cursor {
            None => 0,
            Some(c) => c
                .parse()
                .map_err(|_| RecapError::Internal(format!("bad cursor {c}")))?,
        };
        let Some(page) = pages.get(index) else {
            return Ok(HistoryPage::default());
        };
        let records = page
            .iter()
            .enumerate()
            .map(|(i, text)| Record {
                id: format!("{index}-{i}"),
                text: text.clone(),
            })
            .collect();
        let next_cursor = (index + 1 < pages.len()).then(|| (index + 1).to_string());
        Ok(HistoryPage {
            records,
            next_cursor,
        })
    }

    async fn list_participants(
        &mut self,
        target_id: &str,
    ) -> Result<Vec<Participant>, RecapError> {
        if let Some(err) = self.participant_errors.lock().await.pop_front() {
            return Err(err);
        }
        Ok(self.participants.get(target_id).cloned().unwrap_or_default())
    }

    async fn close(&mut self) -> Result<(), RecapError> {
        if !self.closed {
            self.closed = true;
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
