//! The priority-ordered, size-bounded, disk-spillable message buffer
//! (spec.md §4.1).

use crate::config::BufferConfig;
use crate::message::{BufferedMessage, MetaValue};
use crate::persist;
use crate::stats::BufferStats;
use chrono::Utc;
use crl_core::{CrlError, CrlResult, CrlEvent, DropReason, EventHub, Priority};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinHandle;

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// One resident entry. `seq` is the buffer's own monotonic insertion
/// counter: it breaks ties within a priority class by enqueue order
/// (spec.md §4.1's "within the same priority by FIFO of enqueue
/// timestamp"), and is reassigned on `requeue` so a re-queued message goes
/// to the back of its (demoted) class.
struct Entry {
    msg: BufferedMessage,
    seq: u64,
}

struct Inner {
    entries: Vec<Entry>,
    memory_size: usize,
    stats: BufferStats,
}

/// Priority-ordered, size-bounded, disk-spillable message buffer.
///
/// The resident list is a `Vec` kept sorted by `(priority, seq)`, matching
/// spec.md §4.1's own complexity description (O(log n) binary-search
/// lookup, O(n) insertion shift, O(1) head access) and `maxMemorySize` is
/// enforced on every `add` via the `makeRoom` procedure. Per spec.md §5,
/// the whole resident list and its running size total are guarded by one
/// mutex so they never tear under concurrent access.
pub struct MessageBuffer {
    inner: Mutex<Inner>,
    config: BufferConfig,
    events: EventHub<CrlEvent>,
    next_seq: AtomicU64,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MessageBuffer {
    /// Creates a new, empty buffer wrapped in an `Arc` so
    /// [`Self::spawn_background_tasks`] can hand clones of `self` to
    /// spawned tasks (spec.md §9's "timer-driven background work → task
    /// handles").
    pub fn new(config: BufferConfig, events: EventHub<CrlEvent>) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                entries: Vec::new(),
                memory_size: 0,
                stats: BufferStats::default(),
            }),
            config,
            events,
            next_seq: AtomicU64::new(0),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    fn emit(&self, event: CrlEvent) {
        self.events.emit(&event);
    }

    /// `add(msg) → id` (spec.md §4.1).
    ///
    /// Generates the id and timestamp, runs `makeRoom` if the message
    /// would push `memory_size` over `max_memory_size`, then inserts unless
    /// `makeRoom` could only relieve pressure by spilling (see
    /// `DESIGN.md`'s resolution of the §4.1/§8 "always inserts" conflict).
    #[allow(clippy::too_many_arguments)]
    pub fn add(
        &self,
        topic: impl Into<String>,
        priority: Priority,
        payload: Vec<u8>,
        metadata: HashMap<String, MetaValue>,
        max_retries: u32,
        ttl: Option<chrono::Duration>,
    ) -> String {
        let msg = BufferedMessage::new(topic, priority, payload, metadata, max_retries, ttl);
        let id = msg.id.clone();
        let size = msg.size_bytes();

        if size > self.config.max_memory_size() {
            self.emit(CrlEvent::MessageDropped {
                id: id.clone(),
                reason: DropReason::TooLarge,
                at: Instant::now(),
            });
            #[cfg(feature = "metrics")]
            counter!("crl_buffer_messages_dropped_total", "reason" => "too_large").increment(1);
            let mut inner = self.inner.lock().unwrap();
            inner.stats.total_dropped += 1;
            return id;
        }

        let topic = msg.topic.clone();
        let mut inner = self.inner.lock().unwrap();
        let admitted = self.make_room(&mut inner, priority, size);
        if admitted {
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            let pos = partition_point(&inner.entries, priority, seq);
            inner.entries.insert(pos, Entry { msg, seq });
            inner.memory_size += size;
            inner.stats.total_added += 1;
            drop(inner);
            self.emit(CrlEvent::MessageAdded {
                id: id.clone(),
                topic,
                priority,
                at: Instant::now(),
            });
            #[cfg(feature = "metrics")]
            {
                counter!("crl_buffer_messages_added_total").increment(1);
                gauge!("crl_buffer_memory_size_bytes").set(self.size_bytes() as f64);
            }
        }
        id
    }

    /// Returns `true` if the incoming message should be inserted; `false`
    /// if `makeRoom` had to fall back to the spill-and-reject branch.
    fn make_room(&self, inner: &mut Inner, incoming_priority: Priority, incoming_size: usize) -> bool {
        loop {
            if inner.memory_size + incoming_size <= self.config.max_memory_size() {
                return true;
            }
            let Some(tail) = inner.entries.last() else {
                // Cap is smaller than a single message's size but we never
                // reach here for an over-cap single message (handled above).
                return true;
            };
            if tail.msg.priority > incoming_priority {
                // Tail is strictly weaker than the incoming message: evict it.
                let evicted = inner.entries.pop().unwrap();
                inner.memory_size -= evicted.msg.size_bytes();
                inner.stats.total_dropped += 1;
                self.emit(CrlEvent::MessageDropped {
                    id: evicted.msg.id,
                    reason: DropReason::BufferFull,
                    at: Instant::now(),
                });
                #[cfg(feature = "metrics")]
                counter!("crl_buffer_messages_dropped_total", "reason" => "buffer_full")
                    .increment(1);
                continue;
            }
            // Tail is equal-or-higher priority: never drop it. Spill what we
            // have and reject the incoming message instead of admitting it
            // over cap.
            self.spill(inner);
            inner.stats.total_dropped += 1;
            self.emit(CrlEvent::MessageDropped {
                id: String::new(),
                reason: DropReason::BufferFull,
                at: Instant::now(),
            });
            #[cfg(feature = "metrics")]
            counter!("crl_buffer_messages_dropped_total", "reason" => "buffer_full").increment(1);
            return false;
        }
    }

    /// Writes the current resident set to disk without re-acquiring
    /// `inner`'s lock (the caller already holds it from `make_room`).
    fn spill(&self, inner: &Inner) {
        let messages: Vec<BufferedMessage> = inner.entries.iter().map(|e| e.msg.clone()).collect();
        match persist::write_snapshot(&self.config, &messages) {
            Ok(path) => {
                self.emit(CrlEvent::Persisted {
                    path: path.display().to_string(),
                    count: messages.len(),
                    at: Instant::now(),
                });
            }
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_err, "buffer-pressure spill failed");
            }
        }
    }

    /// `peek()` (spec.md §4.1): the head, without removal.
    pub fn peek(&self) -> Option<BufferedMessage> {
        let inner = self.inner.lock().unwrap();
        inner.entries.first().map(|e| e.msg.clone())
    }

    /// `pop()` (spec.md §4.1): removes and returns the head.
    pub fn pop(&self) -> Option<BufferedMessage> {
        let mut inner = self.inner.lock().unwrap();
        if inner.entries.is_empty() {
            return None;
        }
        let entry = inner.entries.remove(0);
        inner.memory_size -= entry.msg.size_bytes();
        inner.stats.total_removed += 1;
        drop(inner);
        self.emit(CrlEvent::MessageRemoved {
            id: entry.msg.id.clone(),
            at: Instant::now(),
        });
        #[cfg(feature = "metrics")]
        gauge!("crl_buffer_memory_size_bytes").set(self.size_bytes() as f64);
        Some(entry.msg)
    }

    /// `get(id)` (spec.md §4.1): point lookup without removal.
    pub fn get(&self, id: &str) -> Option<BufferedMessage> {
        let inner = self.inner.lock().unwrap();
        inner
            .entries
            .iter()
            .find(|e| e.msg.id == id)
            .map(|e| e.msg.clone())
    }

    /// `remove(id)` (spec.md §4.1): point delete by id.
    pub fn remove(&self, id: &str) -> Option<BufferedMessage> {
        let mut inner = self.inner.lock().unwrap();
        let pos = inner.entries.iter().position(|e| e.msg.id == id)?;
        let entry = inner.entries.remove(pos);
        inner.memory_size -= entry.msg.size_bytes();
        inner.stats.total_removed += 1;
        drop(inner);
        self.emit(CrlEvent::MessageRemoved {
            id: entry.msg.id.clone(),
            at: Instant::now(),
        });
        Some(entry.msg)
    }

    /// `getByTopic(topic, limit?)` (spec.md §4.1).
    pub fn get_by_topic(&self, topic: &str, limit: Option<usize>) -> Vec<BufferedMessage> {
        let inner = self.inner.lock().unwrap();
        let iter = inner.entries.iter().filter(|e| e.msg.topic == topic);
        match limit {
            Some(n) => iter.take(n).map(|e| e.msg.clone()).collect(),
            None => iter.map(|e| e.msg.clone()).collect(),
        }
    }

    /// `getByPriority(priority, limit?)` (spec.md §4.1).
    pub fn get_by_priority(&self, priority: Priority, limit: Option<usize>) -> Vec<BufferedMessage> {
        let inner = self.inner.lock().unwrap();
        let iter = inner.entries.iter().filter(|e| e.msg.priority == priority);
        match limit {
            Some(n) => iter.take(n).map(|e| e.msg.clone()).collect(),
            None => iter.map(|e| e.msg.clone()).collect(),
        }
    }

    /// `requeue(msg)` (spec.md §4.1).
    ///
    /// `Ok(true)`: re-inserted with `retries += 1`, `timestamp` reset, and
    /// priority demoted by one step (floored at `Batch`).
    /// `Ok(false)`: `retries + 1 > max_retries`; the message is dropped.
    /// `Err(AlreadyBuffered)`: `msg.id` is still resident — spec.md §9
    /// leaves this undefined; we refuse rather than double-insert.
    pub fn requeue(&self, mut msg: BufferedMessage) -> CrlResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        if inner.entries.iter().any(|e| e.msg.id == msg.id) {
            return Err(CrlError::AlreadyBuffered(msg.id));
        }

        if msg.retries + 1 > msg.max_retries {
            inner.stats.total_dropped += 1;
            drop(inner);
            self.emit(CrlEvent::MessageDropped {
                id: msg.id,
                reason: DropReason::MaxRetries,
                at: Instant::now(),
            });
            #[cfg(feature = "metrics")]
            counter!("crl_buffer_messages_dropped_total", "reason" => "max_retries").increment(1);
            return Ok(false);
        }

        msg.retries += 1;
        msg.timestamp = Utc::now();
        msg.priority = msg.priority.demote();
        let size = msg.size_bytes();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let pos = partition_point(&inner.entries, msg.priority, seq);
        let id = msg.id.clone();
        let retries = msg.retries;
        let demoted_to = msg.priority;
        inner.entries.insert(pos, Entry { msg, seq });
        inner.memory_size += size;
        inner.stats.total_requeued += 1;
        drop(inner);
        self.emit(CrlEvent::MessageRequeued {
            id,
            retries,
            demoted_to,
            at: Instant::now(),
        });
        Ok(true)
    }

    /// `clear()` (spec.md §4.1).
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.clear();
        inner.memory_size = 0;
        drop(inner);
        self.emit(CrlEvent::Cleared { at: Instant::now() });
    }

    /// `getSize()` (spec.md §4.1): number of resident messages.
    pub fn size(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    /// Running total of bytes accounted for (`memorySize`, spec.md §4.1).
    pub fn size_bytes(&self) -> usize {
        self.inner.lock().unwrap().memory_size
    }

    /// `getStats()` (spec.md §4.1).
    pub fn stats(&self) -> BufferStats {
        let inner = self.inner.lock().unwrap();
        BufferStats {
            size: inner.entries.len(),
            memory_size: inner.memory_size,
            ..inner.stats
        }
    }

    /// `persistToDisk()` (spec.md §4.1 / §6).
    pub fn persist_to_disk(&self) -> CrlResult<std::path::PathBuf> {
        let messages: Vec<BufferedMessage> = {
            let inner = self.inner.lock().unwrap();
            inner.entries.iter().map(|e| e.msg.clone()).collect()
        };
        let result = persist::write_snapshot(&self.config, &messages);
        match &result {
            Ok(path) => {
                self.emit(CrlEvent::Persisted {
                    path: path.display().to_string(),
                    count: messages.len(),
                    at: Instant::now(),
                });
                #[cfg(feature = "tracing")]
                tracing::debug!(path = %path.display(), count = messages.len(), "persisted buffer");
            }
            Err(_err) => {
                // Persistence failures never lose in-memory state
                // (spec.md §4.1's failure semantics): log and keep serving.
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_err, "persist_to_disk failed");
            }
        }
        result
    }

    /// `loadFromDisk(filepath)` (spec.md §4.1 / §6).
    pub fn load_from_disk(&self, path: &std::path::Path) -> CrlResult<usize> {
        let loaded = match persist::read_snapshot(path) {
            Ok(loaded) => loaded,
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %err, path = %path.display(), "load_from_disk failed");
                return Err(err);
            }
        };

        let now = Utc::now();
        let mut inner = self.inner.lock().unwrap();
        let mut count = 0usize;
        for msg in loaded {
            if msg.is_expired(now, self.config.max_message_age) {
                continue;
            }
            let size = msg.size_bytes();
            if inner.memory_size + size > self.config.max_memory_size() {
                break;
            }
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            let pos = partition_point(&inner.entries, msg.priority, seq);
            inner.entries.insert(pos, Entry { msg, seq });
            inner.memory_size += size;
            count += 1;
        }
        inner.stats.total_added += count as u64;
        drop(inner);
        self.emit(CrlEvent::Loaded {
            path: path.display().to_string(),
            count,
            at: Instant::now(),
        });
        Ok(count)
    }

    /// Spawns the periodic maintenance tasks described in spec.md §4.1:
    /// an expiry sweep + disk-file pruning tick every
    /// `expiry_sweep_interval`, and an auto-persist-on-pressure tick every
    /// `flush_interval`. Handles are retained so `shutdown` can abort them
    /// deterministically (spec.md §9).
    pub fn spawn_background_tasks(self: &Arc<Self>) {
        let sweep_handle = {
            let buffer = Arc::clone(self);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(buffer.config.expiry_sweep_interval);
                loop {
                    interval.tick().await;
                    buffer.sweep_expired();
                    buffer.prune_disk_files();
                }
            })
        };

        let flush_handle = {
            let buffer = Arc::clone(self);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(buffer.config.flush_interval);
                loop {
                    interval.tick().await;
                    let pressure = {
                        let inner = buffer.inner.lock().unwrap();
                        inner.memory_size as f64 > 0.8 * buffer.config.max_memory_size() as f64
                    };
                    if pressure {
                        let _ = buffer.persist_to_disk();
                    }
                }
            })
        };

        let mut tasks = self.tasks.lock().unwrap();
        tasks.push(sweep_handle);
        tasks.push(flush_handle);
    }

    /// Expiry sweep (spec.md §4.1): walk backwards, drop anything expired.
    fn sweep_expired(&self) {
        let now = Utc::now();
        let max_age = self.config.max_message_age;
        let mut expired_ids = Vec::new();
        {
            let mut inner = self.inner.lock().unwrap();
            let mut i = inner.entries.len();
            while i > 0 {
                i -= 1;
                if inner.entries[i].msg.is_expired(now, max_age) {
                    let entry = inner.entries.remove(i);
                    inner.memory_size -= entry.msg.size_bytes();
                    inner.stats.total_expired += 1;
                    expired_ids.push(entry.msg.id);
                }
            }
        }
        for id in expired_ids {
            self.emit(CrlEvent::MessageExpired {
                id,
                at: Instant::now(),
            });
            #[cfg(feature = "metrics")]
            counter!("crl_buffer_messages_expired_total").increment(1);
        }
    }

    /// Disk-file pruning (spec.md §4.1): keep the most recent files under
    /// `max_disk_size`.
    fn prune_disk_files(&self) {
        if let Err(_err) = persist::prune(&self.config) {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_err, "disk-file pruning failed");
        }
    }

    /// Cancels all background tasks deterministically (spec.md §9).
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock().unwrap();
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

/// Binary-search the insertion point for `(priority, seq)`, keeping the
/// list sorted ascending by priority (CRITICAL first) then by `seq`
/// (spec.md §4.1's priority-insertion algorithm).
fn partition_point(entries: &[Entry], priority: Priority, seq: u64) -> usize {
    entries.partition_point(|e| (e.msg.priority, e.seq) < (priority, seq))
}

#[cfg(test)]
mod tests {
    use super::*;
    fn buffer(max_memory_size: usize) -> Arc<MessageBuffer> {
        let config = BufferConfig::builder().max_memory_size(max_memory_size).build();
        MessageBuffer::new(config, EventHub::new())
    }

    #[test]
    fn pop_returns_highest_priority_first() {
        let buf = buffer(1024 * 1024);
        buf.add("t", Priority::Low, vec![0; 4], HashMap::new(), 3, None);
        buf.add("t", Priority::Critical, vec![0; 4], HashMap::new(), 3, None);
        buf.add("t", Priority::Normal, vec![0; 4], HashMap::new(), 3, None);

        assert_eq!(buf.pop().unwrap().priority, Priority::Critical);
        assert_eq!(buf.pop().unwrap().priority, Priority::Normal);
        assert_eq!(buf.pop().unwrap().priority, Priority::Low);
        assert!(buf.pop().is_none());
    }

    #[test]
    fn same_priority_messages_pop_in_fifo_order() {
        let buf = buffer(1024 * 1024);
        let first = buf.add("t", Priority::Normal, vec![1], HashMap::new(), 3, None);
        let second = buf.add("t", Priority::Normal, vec![2], HashMap::new(), 3, None);

        assert_eq!(buf.pop().unwrap().id, first);
        assert_eq!(buf.pop().unwrap().id, second);
    }

    fn sample_message_size() -> usize {
        BufferedMessage::new("t", Priority::Normal, vec![0; 16], HashMap::new(), 3, None).size_bytes()
    }

    #[test]
    fn make_room_evicts_strictly_weaker_tail_to_admit_stronger_message() {
        // Cap fits exactly two same-shaped messages; a third, higher-priority
        // message must evict the weakest one to make room.
        let buf = buffer(sample_message_size() * 2);
        buf.add("t", Priority::Low, vec![0; 16], HashMap::new(), 3, None);
        buf.add("t", Priority::Low, vec![0; 16], HashMap::new(), 3, None);
        assert_eq!(buf.size(), 2);

        buf.add("t", Priority::Critical, vec![0; 16], HashMap::new(), 3, None);

        assert_eq!(buf.size(), 2);
        assert_eq!(buf.pop().unwrap().priority, Priority::Critical);
        assert_eq!(buf.pop().unwrap().priority, Priority::Low);
    }

    #[test]
    fn make_room_rejects_weaker_message_instead_of_evicting_equal_or_stronger_tail() {
        let buf = buffer(sample_message_size() * 2);
        buf.add("t", Priority::Critical, vec![0; 16], HashMap::new(), 3, None);
        buf.add("t", Priority::Low, vec![0; 16], HashMap::new(), 3, None);
        assert_eq!(buf.size(), 2);

        buf.add("t", Priority::Batch, vec![0; 16], HashMap::new(), 3, None);

        // BATCH could not evict the LOW tail (not strictly weaker) so it is
        // rejected; the resident set is unchanged (spec.md §8 scenario 2).
        assert_eq!(buf.size(), 2);
        assert_eq!(buf.pop().unwrap().priority, Priority::Critical);
        assert_eq!(buf.pop().unwrap().priority, Priority::Low);
    }

    #[test]
    fn oversized_message_is_dropped_without_insertion() {
        let buf = buffer(64);
        let id = buf.add("t", Priority::Normal, vec![0; 1024], HashMap::new(), 3, None);
        assert_eq!(buf.size(), 0);
        assert!(buf.get(&id).is_none());
    }

    #[test]
    fn requeue_demotes_priority_and_increments_retries() {
        let buf = buffer(1024 * 1024);
        let id = buf.add("t", Priority::Normal, vec![1], HashMap::new(), 3, None);
        let msg = buf.remove(&id).unwrap();

        assert!(buf.requeue(msg).unwrap());
        let requeued = buf.get(&id).unwrap();
        assert_eq!(requeued.priority, Priority::Low);
        assert_eq!(requeued.retries, 1);
    }

    #[test]
    fn requeue_drops_message_once_max_retries_exceeded() {
        let buf = buffer(1024 * 1024);
        let id = buf.add("t", Priority::Normal, vec![1], HashMap::new(), 0, None);
        let msg = buf.remove(&id).unwrap();

        assert!(!buf.requeue(msg).unwrap());
        assert!(buf.get(&id).is_none());
    }

    #[test]
    fn requeue_refuses_when_message_still_resident() {
        let buf = buffer(1024 * 1024);
        let id = buf.add("t", Priority::Normal, vec![1], HashMap::new(), 3, None);
        let msg = buf.get(&id).unwrap();

        let err = buf.requeue(msg).unwrap_err();
        assert!(matches!(err, CrlError::AlreadyBuffered(_)));
    }

    #[test]
    fn persist_and_load_round_trips_resident_messages() {
        let dir = tempfile::tempdir().unwrap();
        let config = BufferConfig::builder()
            .persist_path(dir.path())
            .max_memory_size(1024 * 1024)
            .build();
        let buf = MessageBuffer::new(config, EventHub::new());
        buf.add("t1", Priority::High, vec![1, 2, 3], HashMap::new(), 3, None);
        buf.add("t2", Priority::Low, vec![4, 5], HashMap::new(), 3, None);

        let path = buf.persist_to_disk().unwrap();
        buf.clear();
        assert_eq!(buf.size(), 0);

        let loaded = buf.load_from_disk(&path).unwrap();
        assert_eq!(loaded, 2);
        assert_eq!(buf.size(), 2);
    }

    #[test]
    fn get_by_topic_and_priority_filter_correctly() {
        let buf = buffer(1024 * 1024);
        buf.add("orders", Priority::High, vec![1], HashMap::new(), 3, None);
        buf.add("orders", Priority::Low, vec![2], HashMap::new(), 3, None);
        buf.add("telemetry", Priority::Low, vec![3], HashMap::new(), 3, None);

        assert_eq!(buf.get_by_topic("orders", None).len(), 2);
        assert_eq!(buf.get_by_priority(Priority::Low, None).len(), 2);
        assert_eq!(buf.get_by_topic("orders", Some(1)).len(), 1);
    }

    #[test]
    fn stats_track_lifetime_counters() {
        let buf = buffer(1024 * 1024);
        buf.add("t", Priority::Normal, vec![1], HashMap::new(), 3, None);
        buf.pop();
        let stats = buf.stats();
        assert_eq!(stats.total_added, 1);
        assert_eq!(stats.total_removed, 1);
        assert_eq!(stats.size, 0);
    }
}
