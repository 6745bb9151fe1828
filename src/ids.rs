//! Identifiers for messages the upstream payload left without one.
//!
//! Mapping functions take an [`IdSource`] so their output is reproducible in
//! tests; production code uses random UUIDs.

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of generated identifiers.
pub trait IdSource: Send + Sync {
    /// Next identifier, prefixed (e.g. `msg_...`).
    fn next_id(&self, prefix: &str) -> String;
}

/// Random v4 UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}_{}", uuid::Uuid::new_v4().simple())
    }
}

/// Monotonic counter, deterministic for a fresh instance.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdSource for SequentialIds {
    fn next_id(&self, prefix: &str) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}_{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_ids_count_up() {
        let ids = SequentialIds::new();
        assert_eq!(ids.next_id("msg"), "msg_0");
        assert_eq!(ids.next_id("artifact"), "artifact_1");
    }

    #[test]
    fn random_ids_are_unique() {
        let ids = RandomIds;
        assert_ne!(ids.next_id("msg"), ids.next_id("msg"));
        assert!(ids.next_id("msg").starts_with("msg_"));
    }
}
