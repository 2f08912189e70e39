// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the recap collaborators.
//!
//! Every boundary the orchestration core talks across (state store, work
//! queue, data source, summarizer, channel, delivery, file store) is a trait
//! here. Adapters extend [`PluginAdapter`] and use `#[async_trait]` for
//! dynamic dispatch compatibility.

pub mod adapter;
pub mod channel;
pub mod delivery;
pub mod files;
pub mod queue;
pub mod source;
pub mod store;
pub mod summarizer;

pub use adapter::PluginAdapter;
pub use channel::ChannelAdapter;
pub use delivery::DeliveryAdapter;
pub use files::FileStore;
pub use queue::WorkQueue;
pub use source::{DataSource, SourceSession};
pub use store::{EventStream, StateStore};
pub use summarizer::Summarizer;
