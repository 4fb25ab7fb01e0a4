//! Application services layer.
//!
//! This module contains the business logic services that orchestrate
//! between the API layer and infrastructure (room/, provider/).

pub mod advance_scheduler;
pub mod catalog;
pub mod device_binder;
pub mod queue_advancer;
pub mod queue_editor;
pub mod room_registrar;
pub mod token_manager;

pub use advance_scheduler::AdvanceScheduler;
pub use catalog::Catalog;
pub use device_binder::DeviceBinder;
pub use queue_advancer::{select_next, AdvanceOutcome, QueueAdvancer};
pub use queue_editor::QueueEditor;
pub use room_registrar::RoomRegistrar;
pub use token_manager::{token_expiry, TokenManager};

use serde::Serialize;

/// Outcome reported at boundaries that must not propagate faults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    pub ok: bool,
    pub message: String,
}

impl OperationResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_result_serializes_flat() {
        let json = serde_json::to_value(OperationResult::ok("Song played")).unwrap();
        assert_eq!(json, serde_json::json!({"ok": true, "message": "Song played"}));
        assert!(!OperationResult::failed("nope").ok);
    }
}
