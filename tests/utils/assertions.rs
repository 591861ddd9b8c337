//! Test assertion helpers - fluent API for verifying published events
#![allow(dead_code)] // Test utilities may not all be used in every test

use std::time::Duration;

use neurobeacon::EngineEvent;

use super::setup::TestSetup;

// ============================================================================
// Assertion Helpers
// ============================================================================

pub struct EventAssertion<'a> {
    setup: &'a TestSetup,
}

impl<'a> EventAssertion<'a> {
    pub fn for_setup(setup: &'a TestSetup) -> Self {
        Self { setup }
    }

    /// Waits until at least `count` events of the type have been recorded, then returns them
    pub async fn received(self, event_type: &str, count: usize) -> Vec<EngineEvent> {
        let mut matching = Vec::new();
        for _ in 0..100 {
            matching = self
                .setup
                .recorder
                .events()
                .await
                .into_iter()
                .filter(|event| event.event_type() == event_type)
                .collect();
            if matching.len() >= count {
                return matching;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {} {} events, got {}",
            count,
            event_type,
            matching.len()
        );
    }

    /// Asserts no event of the type has been recorded
    pub async fn none_of(self, event_type: &str) {
        tokio::task::yield_now().await;
        let events = self.setup.recorder.events().await;
        assert!(
            events.iter().all(|event| event.event_type() != event_type),
            "unexpected {} event",
            event_type
        );
    }
}
