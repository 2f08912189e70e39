// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Front-end side of the recap orchestrator.
//!
//! - [`ConversationMachine`] turns actor messages into requests and prompts
//! - [`JobDispatcher`] persists jobs and hands them to the work queue
//! - [`EventRelay`] applies worker progress to the ledger and notifies actors
//! - [`FrontendLoop`] drives conversation turns off the chat channel

pub mod conversation;
pub mod dispatcher;
pub mod frontend;
pub mod relay;
pub mod reply;
pub mod shutdown;

pub use conversation::{ConversationMachine, PromptOutcome};
pub use dispatcher::{JobDispatcher, job_id_for};
pub use frontend::FrontendLoop;
pub use relay::EventRelay;
pub use reply::ConversationReply;
pub use shutdown::{drain_tasks, install_signal_handler};
