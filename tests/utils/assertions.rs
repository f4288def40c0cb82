use std::time::Duration;

use sketchroom::{RoomEvent, Session};

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Waits briefly for the next event, panicking with `context` if none
/// arrives.
pub async fn expect_event(session: &mut Session, context: &str) -> RoomEvent {
    tokio::time::timeout(Duration::from_secs(1), session.next_event())
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {context}"))
        .unwrap_or_else(|| panic!("event stream closed while waiting for {context}"))
}

/// Asserts that no event arrives within a short grace period.
pub async fn expect_no_event(session: &mut Session, context: &str) {
    match tokio::time::timeout(Duration::from_millis(100), session.next_event()).await {
        Err(_) => {}
        Ok(None) => {}
        Ok(Some(event)) => panic!("unexpected event ({context}): {event:?}"),
    }
}
