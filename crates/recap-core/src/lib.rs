// SPDX-FileCopyrightText: 2026 Recap Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the recap job orchestrator.
//!
//! This crate provides the error taxonomy, the domain types (requests, jobs,
//! progress events) and the adapter traits every collaborator implements.
//! The front-end and worker crates depend only on these definitions.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{ErrorKind, RecapError};
pub use types::{AdapterType, HealthStatus, MessageId, RequestStatus, Stage};

// Re-export all adapter traits at crate root.
pub use traits::{
    ChannelAdapter, DataSource, DeliveryAdapter, EventStream, FileStore, PluginAdapter,
    SourceSession, StateStore, Summarizer, WorkQueue,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_type_round_trips() {
        use std::str::FromStr;

        let variants = [
            AdapterType::Channel,
            AdapterType::Delivery,
            AdapterType::Storage,
            AdapterType::DataSource,
            AdapterType::Summarizer,
        ];
        for variant in &variants {
            let s = variant.to_string();
            let parsed = AdapterType::from_str(&s).expect("should parse back");
            assert_eq!(*variant, parsed);
        }
    }

    #[test]
    fn health_status_variants() {
        let healthy = HealthStatus::Healthy;
        assert_ne!(HealthStatus::Degraded("slow".into()), healthy);
        assert_ne!(HealthStatus::Unhealthy("down".into()), healthy);
    }

    #[test]
    fn all_traits_are_exported() {
        // Compiles only if every trait is reachable through the public API
        // and remains object safe.
        fn _assert_plugin_adapter(_: &dyn PluginAdapter) {}
        fn _assert_channel(_: &dyn ChannelAdapter) {}
        fn _assert_delivery(_: &dyn DeliveryAdapter) {}
        fn _assert_store(_: &dyn StateStore) {}
        fn _assert_queue(_: &dyn WorkQueue) {}
        fn _assert_source(_: &dyn DataSource) {}
        fn _assert_session(_: &dyn SourceSession) {}
        fn _assert_summarizer(_: &dyn Summarizer) {}
        fn _assert_files(_: &dyn FileStore) {}
    }
}
