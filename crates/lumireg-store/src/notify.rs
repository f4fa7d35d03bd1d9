//! Post-commit change notifications.
//!
//! After a committed range update the store tells its listeners which
//! dataset changed so a downstream materialized-summary cache can refresh
//! itself. Listeners run strictly after commit — a notification never
//! refers to state that could still roll back.

use lumireg_core::model::{RunNumber, Version};

/// A committed change to one dataset's lumisections or attributes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DatasetChanged {
    /// The run the dataset belongs to.
    pub run: RunNumber,
    /// The dataset name.
    pub dataset: String,
    /// The highest version the committed operation wrote.
    pub version: Version,
}

/// Receiver of dataset-changed notifications.
///
/// Implementations must be cheap or hand off to their own queue; the store
/// calls them synchronously after commit.
pub trait ChangeListener: Send {
    /// Called once per committed operation that changed `change.dataset`.
    fn dataset_changed(&self, change: &DatasetChanged);
}

/// Collects notifications into a shared vector. Test support.
#[derive(Debug, Clone, Default)]
pub struct CollectingListener {
    changes: std::sync::Arc<std::sync::Mutex<Vec<DatasetChanged>>>,
}

impl CollectingListener {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything collected so far.
    ///
    /// # Panics
    ///
    /// Panics if a previous holder of the lock panicked.
    #[must_use]
    pub fn collected(&self) -> Vec<DatasetChanged> {
        self.changes.lock().expect("listener lock poisoned").clone()
    }
}

impl ChangeListener for CollectingListener {
    fn dataset_changed(&self, change: &DatasetChanged) {
        self.changes
            .lock()
            .expect("listener lock poisoned")
            .push(change.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_records_in_order() {
        let listener = CollectingListener::new();
        listener.dataset_changed(&DatasetChanged {
            run: 355_001,
            dataset: "online".into(),
            version: 1,
        });
        listener.dataset_changed(&DatasetChanged {
            run: 355_001,
            dataset: "online".into(),
            version: 2,
        });

        let collected = listener.collected();
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].version, 1);
        assert_eq!(collected[1].version, 2);
    }
}
