//! Priority-partitioned task queue.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use taskgrid_core::{JobKey, Priority};

use crate::error::{QueueError, QueueResult};

/// One pending task-run request.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub key: JobKey,
    pub priority: Priority,
    /// Submission timestamp supplied by the caller (Unix millis).
    pub submit_time: u64,
    /// When the engine accepted the request, on the engine's clock.
    pub enqueued_at: Instant,
}

impl QueueItem {
    pub fn new(key: JobKey, priority: Priority, submit_time: u64, enqueued_at: Instant) -> Self {
        Self {
            key,
            priority,
            submit_time,
            enqueued_at,
        }
    }
}

/// Owned, serializable copy of one partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSnapshot {
    pub priority: Priority,
    pub tasks: Vec<QueuedTask>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedTask {
    pub key: JobKey,
    pub submit_time: u64,
}

/// Pending tasks grouped by priority.
///
/// Partitions are stored under their natural ascending key and read back
/// in reverse, so numerically larger priorities come out first. A
/// partition is dropped as soon as its last item leaves.
#[derive(Debug, Default)]
pub struct TaskQueueStore {
    partitions: BTreeMap<Priority, VecDeque<QueueItem>>,
    /// (priority, key) pairs currently queued, for duplicate detection.
    index: HashSet<(Priority, JobKey)>,
}

impl TaskQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a task at its priority.
    ///
    /// With `at_head` the item goes in front of every item already waiting
    /// at that priority; otherwise it is appended. A key that already sits
    /// in the same partition is left where it is and `false` is returned.
    pub fn enqueue(&mut self, item: QueueItem, at_head: bool) -> bool {
        let slot = (item.priority, item.key.clone());
        if self.index.contains(&slot) {
            debug!(
                job = %item.key.job,
                task = item.key.task,
                priority = item.priority,
                "task already queued at this priority, ignoring"
            );
            return false;
        }
        self.index.insert(slot);

        debug!(
            job = %item.key.job,
            task = item.key.task,
            priority = item.priority,
            at_head,
            "task queued"
        );

        let partition = self.partitions.entry(item.priority).or_default();
        if at_head {
            partition.push_front(item);
        } else {
            partition.push_back(item);
        }
        true
    }

    /// Number of items waiting at `priority`. Unknown priorities hold zero.
    pub fn count_queued(&self, priority: Priority) -> usize {
        self.partitions.get(&priority).map_or(0, VecDeque::len)
    }

    pub fn total_queued(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, priority: Priority, key: &JobKey) -> bool {
        self.index.contains(&(priority, key.clone()))
    }

    /// Partitions from highest to lowest priority, each front-to-back.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (Priority, &VecDeque<QueueItem>)> + '_ {
        self.partitions.iter().rev().map(|(p, items)| (*p, items))
    }

    /// Every queued item in dispatch order.
    pub fn items(&self) -> impl Iterator<Item = &QueueItem> + '_ {
        self.iter().flat_map(|(_, items)| items.iter())
    }

    /// Remove a dispatched item.
    pub fn dequeue(&mut self, priority: Priority, key: &JobKey) -> QueueResult<QueueItem> {
        let not_found = || QueueError::NotFound {
            priority,
            key: key.clone(),
        };

        let partition = self.partitions.get_mut(&priority).ok_or_else(not_found)?;
        let pos = partition
            .iter()
            .position(|item| &item.key == key)
            .ok_or_else(not_found)?;
        let item = partition.remove(pos).ok_or_else(not_found)?;

        if partition.is_empty() {
            self.partitions.remove(&priority);
        }
        self.index.remove(&(priority, key.clone()));
        Ok(item)
    }

    /// Remove `key` from every partition. Returns how many entries went.
    pub fn withdraw(&mut self, key: &JobKey) -> usize {
        let mut removed = 0;
        self.partitions.retain(|priority, items| {
            let before = items.len();
            items.retain(|item| &item.key != key);
            if items.len() != before {
                removed += before - items.len();
                self.index.remove(&(*priority, key.clone()));
            }
            !items.is_empty()
        });

        if removed == 0 {
            warn!(job = %key.job, task = key.task, "withdraw of task that is not queued");
        }
        removed
    }

    /// Owned copy of the queue in dispatch order.
    pub fn snapshot(&self) -> Vec<PartitionSnapshot> {
        self.iter()
            .map(|(priority, items)| PartitionSnapshot {
                priority,
                tasks: items
                    .iter()
                    .map(|item| QueuedTask {
                        key: item.key.clone(),
                        submit_time: item.submit_time,
                    })
                    .collect(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(job: &str, task: u32, priority: Priority) -> QueueItem {
        QueueItem::new(JobKey::new(job, task), priority, 0, Instant::now())
    }

    fn order(store: &TaskQueueStore) -> Vec<JobKey> {
        store.items().map(|i| i.key.clone()).collect()
    }

    #[test]
    fn enumerates_highest_priority_first_with_head_insertion() {
        let mut store = TaskQueueStore::new();
        store.enqueue(item("job", 0, 0), false);
        store.enqueue(item("job", 1, 0), false);
        store.enqueue(item("job", 2, 0), true);
        store.enqueue(item("job2", 10, 1), false);

        assert_eq!(
            order(&store),
            vec![
                JobKey::new("job2", 10),
                JobKey::new("job", 2),
                JobKey::new("job", 0),
                JobKey::new("job", 1),
            ]
        );
        assert_eq!(store.count_queued(1), 1);
        assert_eq!(store.count_queued(0), 3);
    }

    #[test]
    fn partitions_come_out_in_descending_priority() {
        let mut store = TaskQueueStore::new();
        for p in [3, -2, 10, 0, 7] {
            store.enqueue(item("j", (p + 100) as u32, p), false);
        }
        let priorities: Vec<Priority> = store.iter().map(|(p, _)| p).collect();
        assert_eq!(priorities, vec![10, 7, 3, 0, -2]);
    }

    #[test]
    fn latest_head_insertion_takes_the_front() {
        let mut store = TaskQueueStore::new();
        store.enqueue(item("j", 0, 5), false);
        store.enqueue(item("j", 1, 5), true);
        store.enqueue(item("j", 2, 5), true);

        assert_eq!(
            order(&store),
            vec![JobKey::new("j", 2), JobKey::new("j", 1), JobKey::new("j", 0)]
        );
    }

    #[test]
    fn unknown_priority_counts_zero() {
        let store = TaskQueueStore::new();
        assert_eq!(store.count_queued(42), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn duplicate_enqueue_is_ignored() {
        let mut store = TaskQueueStore::new();
        assert!(store.enqueue(item("j", 0, 0), false));
        assert!(store.enqueue(item("j", 1, 0), false));
        // Same key again, even at head, keeps the original position.
        assert!(!store.enqueue(item("j", 0, 0), true));

        assert_eq!(store.count_queued(0), 2);
        assert_eq!(order(&store), vec![JobKey::new("j", 0), JobKey::new("j", 1)]);
    }

    #[test]
    fn same_key_may_wait_at_two_priorities() {
        let mut store = TaskQueueStore::new();
        assert!(store.enqueue(item("j", 0, 0), false));
        assert!(store.enqueue(item("j", 0, 1), false));
        assert_eq!(store.total_queued(), 2);
    }

    #[test]
    fn dequeue_removes_item_and_empty_partition() {
        let mut store = TaskQueueStore::new();
        store.enqueue(item("j", 0, 2), false);

        let removed = store.dequeue(2, &JobKey::new("j", 0)).unwrap();
        assert_eq!(removed.key, JobKey::new("j", 0));
        assert_eq!(store.iter().count(), 0);
        assert!(!store.contains(2, &JobKey::new("j", 0)));

        // Key can be queued again after it left.
        assert!(store.enqueue(item("j", 0, 2), false));
    }

    #[test]
    fn dequeue_absent_key_is_not_found() {
        let mut store = TaskQueueStore::new();
        store.enqueue(item("j", 0, 0), false);

        let err = store.dequeue(0, &JobKey::new("j", 9)).unwrap_err();
        assert_eq!(
            err,
            QueueError::NotFound {
                priority: 0,
                key: JobKey::new("j", 9)
            }
        );
        assert!(store.dequeue(1, &JobKey::new("j", 0)).is_err());
        assert_eq!(store.count_queued(0), 1);
    }

    #[test]
    fn withdraw_clears_every_priority() {
        let mut store = TaskQueueStore::new();
        store.enqueue(item("j", 0, 0), false);
        store.enqueue(item("j", 0, 3), false);
        store.enqueue(item("j", 1, 3), false);

        assert_eq!(store.withdraw(&JobKey::new("j", 0)), 2);
        assert_eq!(store.total_queued(), 1);
        assert_eq!(store.count_queued(0), 0);
        assert_eq!(store.withdraw(&JobKey::new("j", 0)), 0);
    }

    #[test]
    fn snapshot_serializes_in_dispatch_order() {
        let mut store = TaskQueueStore::new();
        store.enqueue(QueueItem::new(JobKey::new("a", 0), 0, 1_000, Instant::now()), false);
        store.enqueue(QueueItem::new(JobKey::new("b", 0), 4, 2_000, Instant::now()), false);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].priority, 4);
        assert_eq!(snapshot[1].tasks[0].submit_time, 1_000);

        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.starts_with(r#"[{"priority":4"#));
    }
}
