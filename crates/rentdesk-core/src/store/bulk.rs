use std::collections::HashSet;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkOperation {
    MarkRead,
    Delete,
    Update,
}

/// Selection set plus the multi-item action in flight.
///
/// `operation` is set before the network call and cleared when it finishes,
/// whatever the outcome. There is no mid-flight progress: 0 while running,
/// 100 after success.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOperationState<E> {
    pub selected: Vec<String>,
    pub operation: Option<BulkOperation>,
    pub progress: u8,
    pub results: Vec<E>,
}

impl<E> Default for BulkOperationState<E> {
    fn default() -> Self {
        Self {
            selected: Vec::new(),
            operation: None,
            progress: 0,
            results: Vec::new(),
        }
    }
}

impl<E> BulkOperationState<E> {
    pub fn is_running(&self) -> bool {
        self.operation.is_some()
    }

    pub fn begin(&mut self, operation: BulkOperation) {
        self.operation = Some(operation);
        self.progress = 0;
        self.results.clear();
    }

    pub fn complete(&mut self, results: Vec<E>) {
        self.operation = None;
        self.progress = 100;
        self.results = results;
    }

    pub fn fail(&mut self) {
        self.operation = None;
    }

    // ===== Selection =====

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.iter().any(|s| s == id)
    }

    pub fn toggle(&mut self, id: &str) {
        match self.selected.iter().position(|s| s == id) {
            Some(index) => {
                self.selected.remove(index);
            }
            None => self.selected.push(id.to_string()),
        }
    }

    pub fn set_selected(&mut self, ids: Vec<String>) {
        let mut seen = HashSet::new();
        self.selected = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
    }

    pub fn deselect(&mut self, ids: &[String]) {
        self.selected.retain(|id| !ids.contains(id));
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_success_and_failure() {
        let mut bulk: BulkOperationState<u32> = BulkOperationState::default();
        bulk.begin(BulkOperation::Delete);
        assert!(bulk.is_running());
        assert_eq!(bulk.progress, 0);

        bulk.complete(vec![1, 2]);
        assert_eq!(bulk.operation, None);
        assert_eq!(bulk.progress, 100);
        assert_eq!(bulk.results, vec![1, 2]);

        bulk.begin(BulkOperation::Update);
        assert!(bulk.results.is_empty());
        bulk.fail();
        assert_eq!(bulk.operation, None);
        assert_eq!(bulk.progress, 0);
    }

    #[test]
    fn test_selection_is_independent_of_operation() {
        let mut bulk: BulkOperationState<u32> = BulkOperationState::default();
        bulk.begin(BulkOperation::MarkRead);

        bulk.toggle("a");
        bulk.toggle("b");
        bulk.toggle("a");
        assert_eq!(bulk.selected, vec!["b".to_string()]);

        bulk.set_selected(vec!["x".into(), "y".into(), "x".into()]);
        assert_eq!(bulk.selected.len(), 2);
        bulk.deselect(&["x".to_string()]);
        assert!(!bulk.is_selected("x"));
        bulk.clear_selection();
        assert!(bulk.selected.is_empty());
        assert!(bulk.is_running());
    }
}
