//! Per-agent priority work queue.
//!
//! Multi-producer, single-consumer: any number of tasks may `enqueue`,
//! exactly one worker `dequeue`s. Items are ordered by (priority class,
//! insertion order); strict priority, FIFO within a class. Enqueue never
//! blocks and the queue is unbounded; dequeue waits up to a timeout so the
//! consumer can observe shutdown between attempts.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;

use crate::domain::{Priority, WorkItem};

struct Entry {
    priority: Priority,
    seq: u64,
    item: WorkItem,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

struct QueueState {
    heap: BinaryHeap<Reverse<Entry>>,
    next_seq: u64,
}

/// Concurrent priority queue owned by one agent.
pub struct PriorityWorkQueue {
    state: Mutex<QueueState>,
    notify: Notify,
}

impl PriorityWorkQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                heap: BinaryHeap::new(),
                next_seq: 0,
            }),
            notify: Notify::new(),
        }
    }

    /// Add an item. Never blocks.
    pub fn enqueue(&self, item: WorkItem) {
        {
            let mut state = self.state.lock().expect("queue lock poisoned");
            let seq = state.next_seq;
            state.next_seq += 1;
            state.heap.push(Reverse(Entry {
                priority: item.priority,
                seq,
                item,
            }));
        }
        self.notify.notify_one();
    }

    /// Pop the best item if one is available.
    pub fn try_dequeue(&self) -> Option<WorkItem> {
        let mut state = self.state.lock().expect("queue lock poisoned");
        state.heap.pop().map(|Reverse(entry)| entry.item)
    }

    /// Wait up to `timeout` for an item. Returns `None` on timeout.
    pub async fn dequeue(&self, timeout: Duration) -> Option<WorkItem> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(item) = self.try_dequeue() {
                return Some(item);
            }
            let notified = self.notify.notified();
            match tokio::time::timeout_at(deadline, notified).await {
                Ok(_) => continue,
                Err(_) => return self.try_dequeue(),
            }
        }
    }

    /// Current queue depth.
    pub fn depth(&self) -> usize {
        self.state.lock().expect("queue lock poisoned").heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depth() == 0
    }
}

impl Default for PriorityWorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn item(payload: &str, priority: Priority) -> WorkItem {
        WorkItem::new(payload, vec![], priority)
    }

    #[test]
    fn test_empty_queue() {
        let q = PriorityWorkQueue::new();
        assert!(q.is_empty());
        assert!(q.try_dequeue().is_none());
    }

    #[test]
    fn test_fifo_within_class() {
        let q = PriorityWorkQueue::new();
        q.enqueue(item("a", Priority::Medium));
        q.enqueue(item("b", Priority::Medium));
        q.enqueue(item("c", Priority::Medium));

        assert_eq!(q.try_dequeue().unwrap().payload, "a");
        assert_eq!(q.try_dequeue().unwrap().payload, "b");
        assert_eq!(q.try_dequeue().unwrap().payload, "c");
    }

    #[test]
    fn test_priority_before_fifo() {
        let q = PriorityWorkQueue::new();
        q.enqueue(item("low", Priority::Low));
        q.enqueue(item("high", Priority::High));
        q.enqueue(item("medium", Priority::Medium));

        assert_eq!(q.try_dequeue().unwrap().payload, "high");
        assert_eq!(q.try_dequeue().unwrap().payload, "medium");
        assert_eq!(q.try_dequeue().unwrap().payload, "low");
    }

    #[test]
    fn test_interleaved_classes_class_ordered_then_fifo() {
        let q = PriorityWorkQueue::new();
        q.enqueue(item("m1", Priority::Medium));
        q.enqueue(item("u1", Priority::Urgent));
        q.enqueue(item("l1", Priority::Low));
        q.enqueue(item("u2", Priority::Urgent));
        q.enqueue(item("h1", Priority::High));
        q.enqueue(item("m2", Priority::Medium));

        let order: Vec<String> = std::iter::from_fn(|| q.try_dequeue())
            .map(|i| i.payload)
            .collect();
        assert_eq!(order, vec!["u1", "u2", "h1", "m1", "m2", "l1"]);
    }

    #[test]
    fn test_depth_tracks_contents() {
        let q = PriorityWorkQueue::new();
        assert_eq!(q.depth(), 0);
        q.enqueue(item("a", Priority::Low));
        q.enqueue(item("b", Priority::High));
        assert_eq!(q.depth(), 2);
        q.try_dequeue();
        assert_eq!(q.depth(), 1);
    }

    #[tokio::test]
    async fn test_dequeue_times_out_when_empty() {
        let q = PriorityWorkQueue::new();
        let got = q.dequeue(Duration::from_millis(50)).await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_dequeue_returns_already_queued() {
        let q = PriorityWorkQueue::new();
        q.enqueue(item("ready", Priority::High));
        let got = q.dequeue(Duration::from_millis(50)).await;
        assert_eq!(got.unwrap().payload, "ready");
    }

    #[tokio::test]
    async fn test_dequeue_wakes_on_concurrent_enqueue() {
        let q = Arc::new(PriorityWorkQueue::new());
        let producer = q.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.enqueue(item("late", Priority::Low));
        });

        let got = q.dequeue(Duration::from_secs(2)).await;
        assert_eq!(got.unwrap().payload, "late");
    }

    #[tokio::test]
    async fn test_multi_producer_single_consumer() {
        let q = Arc::new(PriorityWorkQueue::new());
        let mut handles = Vec::new();
        for p in 0..4 {
            let producer = q.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..10 {
                    producer.enqueue(item(&format!("p{}-{}", p, i), Priority::Medium));
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let mut count = 0;
        while q.dequeue(Duration::from_millis(20)).await.is_some() {
            count += 1;
        }
        assert_eq!(count, 40);
    }
}
