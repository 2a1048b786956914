//! Retry queue for failed section downloads.
//!
//! Failures are replayed once, in the order they first failed, after the
//! main pass finishes. Whatever still fails is reported, never retried
//! again in the same run.

use super::task::DownloadTask;

#[derive(Debug)]
pub struct RetryQueue {
    items: Vec<DownloadTask>,
    max_retries: u8,
}

impl RetryQueue {
    pub fn new(max_retries: u8) -> Self {
        Self {
            items: Vec::new(),
            max_retries,
        }
    }

    pub fn push(&mut self, task: DownloadTask) {
        self.items.push(task);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Take every task that still has retry budget, preserving failure
    /// order. Tasks that have exhausted their attempts (initial attempt plus
    /// `max_retries`) are dropped here and must already have been reported.
    pub fn drain_eligible(&mut self) -> Vec<DownloadTask> {
        let items = std::mem::take(&mut self.items);
        items
            .into_iter()
            .filter(|task| u32::from(task.attempts) < u32::from(self.max_retries) + 1)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::task::DownloadTask;

    fn task(id: &str, attempts: u8) -> DownloadTask {
        let mut t = DownloadTask::new(vec![id.to_string()], None, id, ".docx");
        t.attempts = attempts;
        t
    }

    #[test]
    fn drain_preserves_failure_order() {
        let mut queue = RetryQueue::new(1);
        queue.push(task("b", 1));
        queue.push(task("a", 1));
        queue.push(task("c", 1));
        let drained = queue.drain_eligible();
        let ids: Vec<&str> = drained.iter().map(|t| t.node_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn exhausted_tasks_are_not_replayed() {
        let mut queue = RetryQueue::new(1);
        queue.push(task("spent", 2));
        queue.push(task("fresh", 1));
        let drained = queue.drain_eligible();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].node_id, "fresh");
    }

    #[test]
    fn zero_retries_drains_nothing() {
        let mut queue = RetryQueue::new(0);
        queue.push(task("x", 1));
        assert!(queue.drain_eligible().is_empty());
    }
}
