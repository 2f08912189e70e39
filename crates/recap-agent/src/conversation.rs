// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation state machine.
//!
//! Per user: `IDLE -> AWAITING_PROMPT -> DISPATCHED`. A message from a user
//! with a live pending conversation is that request's prompt (or the cancel
//! token); any other message names a new target. All state lives in the
//! store, so turns for the same user may run concurrently: only one of them
//! can attach the prompt.

use std::sync::Arc;

use recap_config::model::ConversationConfig;
use recap_core::types::{PendingConversation, Request, RequestStatus};
use recap_core::{DataSource, RecapError, StateStore};
use recap_ledger::RequestLedger;
use tracing::{debug, info, warn};

use crate::dispatcher::JobDispatcher;
use crate::reply::ConversationReply;

/// Result of a prompt-stage message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptOutcome {
    Cancelled { request_id: String },
    Queued { request_id: String, job_id: String },
}

/// Front-end conversation logic over the shared store.
pub struct ConversationMachine {
    store: Arc<dyn StateStore>,
    ledger: RequestLedger,
    source: Arc<dyn DataSource>,
    dispatcher: JobDispatcher,
    config: ConversationConfig,
}

impl ConversationMachine {
    pub fn new(
        store: Arc<dyn StateStore>,
        ledger: RequestLedger,
        source: Arc<dyn DataSource>,
        dispatcher: JobDispatcher,
        config: ConversationConfig,
    ) -> Self {
        Self {
            store,
            ledger,
            source,
            dispatcher,
            config,
        }
    }

    fn is_cancel(&self, text: &str) -> bool {
        text.trim()
            .eq_ignore_ascii_case(self.config.cancel_token.trim())
    }

    /// Resolve `raw_input` to a target and open a request awaiting its prompt.
    ///
    /// Any earlier pending conversation of the user is superseded.
    pub async fn submit_target(
        &self,
        user_id: &str,
        raw_input: &str,
    ) -> Result<Request, RecapError> {
        let raw = raw_input.trim();
        if raw.is_empty() {
            return Err(RecapError::TargetInvalid {
                input: String::new(),
                reason: "empty input".into(),
            });
        }

        let target = self.source.resolve(raw).await?;
        let request = Request::new(user_id, &target);
        self.ledger.create(&request).await?;

        let pending =
            PendingConversation::new(user_id, &request.request_id, self.config.pending_ttl());
        self.store.put_pending(&pending).await?;

        info!(
            user_id,
            request_id = %request.request_id,
            target_id = %target.id,
            expires_at = %pending.expires_at,
            "awaiting prompt"
        );
        Ok(request)
    }

    /// Treat `raw_input` as the prompt (or cancellation) for the user's
    /// pending request.
    pub async fn submit_prompt(
        &self,
        user_id: &str,
        raw_input: &str,
    ) -> Result<PromptOutcome, RecapError> {
        let pending = self
            .store
            .get_pending(user_id)
            .await?
            .ok_or(RecapError::NoPendingRequest)?;
        let request_id = pending.request_id;

        if self.is_cancel(raw_input) {
            self.store.delete_pending(user_id, &request_id).await?;
            if !self.ledger.cancel_pending(&request_id).await? {
                debug!(request_id = %request_id, "cancel arrived after dispatch");
                return Err(RecapError::NoPendingRequest);
            }
            return Ok(PromptOutcome::Cancelled { request_id });
        }

        let prompt = self.validate_prompt(raw_input)?;

        if !self.ledger.attach_prompt(&request_id, prompt).await? {
            // A concurrent turn attached its prompt first.
            debug!(request_id = %request_id, "prompt already attached");
            return Err(RecapError::NoPendingRequest);
        }
        self.store.delete_pending(user_id, &request_id).await?;

        let request = self.ledger.get(&request_id).await?;
        let job_id = match self.dispatcher.enqueue(&request).await {
            Ok(job_id) => job_id,
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "dispatch failed");
                if let Err(advance_err) = self
                    .ledger
                    .advance(&request_id, RequestStatus::Failed, Some("dispatch failed"))
                    .await
                {
                    warn!(request_id = %request_id, error = %advance_err, "could not mark request failed");
                }
                return Err(e);
            }
        };
        self.ledger
            .advance(&request_id, RequestStatus::Queued, None)
            .await?;

        Ok(PromptOutcome::Queued { request_id, job_id })
    }

    fn validate_prompt<'a>(&self, raw_input: &'a str) -> Result<&'a str, RecapError> {
        let prompt = raw_input.trim();
        let chars = prompt.chars().count();
        if chars < self.config.min_prompt_chars {
            return Err(RecapError::PromptInvalid(format!(
                "it must be at least {} characters",
                self.config.min_prompt_chars
            )));
        }
        if chars > self.config.max_prompt_chars {
            return Err(RecapError::PromptInvalid(format!(
                "it must be at most {} characters, got {chars}",
                self.config.max_prompt_chars
            )));
        }
        Ok(prompt)
    }

    /// The persisted record of `request_id`, or of the user's latest request.
    ///
    /// Requests of other users are reported as not found.
    pub async fn status(
        &self,
        user_id: &str,
        request_id: Option<&str>,
    ) -> Result<Request, RecapError> {
        let request = match request_id {
            Some(id) => self.ledger.get(id).await?,
            None => self
                .ledger
                .latest_for_user(user_id)
                .await?
                .ok_or_else(|| RecapError::RequestNotFound("(latest)".into()))?,
        };
        if request.user_id != user_id {
            return Err(RecapError::RequestNotFound(request.request_id));
        }
        Ok(request)
    }

    /// Route one inbound message and produce the reply for the actor.
    ///
    /// Never fails: errors become [`ConversationReply::Error`] with the
    /// actor-facing message, and store failures are logged and reported
    /// generically.
    pub async fn handle_message(&self, user_id: &str, text: &str) -> ConversationReply {
        match self.route(user_id, text).await {
            Ok(reply) => reply,
            Err(e) => {
                if e.is_conversational() {
                    debug!(user_id, error = %e, "conversation error");
                } else {
                    warn!(user_id, error = %e, "turn failed");
                }
                ConversationReply::Error(e.user_message())
            }
        }
    }

    async fn route(&self, user_id: &str, text: &str) -> Result<ConversationReply, RecapError> {
        let trimmed = text.trim();
        let mut words = trimmed.split_whitespace();
        // Group chats address commands as `/status@BotName`.
        let command = words.next().map(|w| w.split('@').next().unwrap_or(w));
        match command {
            Some("/start") | Some("/help") => {
                return Ok(ConversationReply::Help {
                    cancel_token: self.config.cancel_token.clone(),
                });
            }
            Some("/status") => {
                let request = self.status(user_id, words.next()).await?;
                return Ok(ConversationReply::Status(Box::new(request)));
            }
            _ => {}
        }

        if self.is_cancel(trimmed) || self.store.get_pending(user_id).await?.is_some() {
            return Ok(match self.submit_prompt(user_id, trimmed).await? {
                PromptOutcome::Cancelled { request_id } => {
                    ConversationReply::Cancelled { request_id }
                }
                PromptOutcome::Queued { request_id, job_id } => {
                    ConversationReply::Queued { request_id, job_id }
                }
            });
        }

        let request = self.submit_target(user_id, trimmed).await?;
        Ok(ConversationReply::TargetAccepted {
            request_id: request.request_id,
            target_title: request.target_title,
            ttl_secs: self.config.pending_ttl_secs,
            cancel_token: self.config.cancel_token.clone(),
        })
    }
}
