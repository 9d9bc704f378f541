//! Transaction Manager (§4.3): coalesces bursts of row mutations into a
//! single throttled drain against the store. The engine is single-threaded
//! cooperative (§5) — there is no background OS thread here, unlike the
//! worker pool in `sort_pool.rs`. Time is host-driven and passed in as plain
//! milliseconds rather than `std::time::Instant`: `Instant::now()` has no
//! clock source on `wasm32-unknown-unknown` (this crate's primary
//! deployment target) and panics at runtime there. The host supplies `now`
//! from whatever clock it has — `performance.now()` in a browser,
//! `Instant::now()`'s own elapsed milliseconds in a native harness — and
//! calls [`TransactionManager::poll`] once a scheduled wake-up fires.

use std::collections::VecDeque;
use std::time::Duration;

use log::warn;

use crate::store::IndexedDataStore;
use crate::types::CellValue;

/// One queued mutation, in the shape the store's own mutation methods accept.
#[derive(Debug, Clone)]
pub enum Operation {
    Add(crate::store::Row),
    Remove(crate::types::RowId),
    UpdateCell {
        id: crate::types::RowId,
        field: String,
        value: CellValue,
    },
    UpdateRow {
        id: crate::types::RowId,
        partial: std::collections::HashMap<String, CellValue>,
    },
}

/// Counts of rows actually applied during one drain, for the
/// `TransactionProcessed` instruction and the `flush()` return value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionResult {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
}

impl TransactionResult {
    fn is_empty(self) -> bool {
        self.added == 0 && self.removed == 0 && self.updated == 0
    }
}

/// What the caller should do after enqueuing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// `throttleWindow` is zero: the whole queue (including this operation)
    /// has already been drained synchronously as part of this call.
    DrainedImmediately(TransactionResult),
    /// A new timer was armed; the caller should schedule a wake-up at this
    /// millisecond timestamp (e.g. via `setTimeout`) and call
    /// [`TransactionManager::poll`] when it fires.
    TimerArmed(u64),
    /// A timer was already pending; this operation joined it, no new
    /// scheduling is needed.
    JoinedPendingTimer,
}

/// Enqueues mutations and drains them against a store on a throttle, per
/// §4.3: last-write-wins is implicit (the store's own `update_cell`
/// overwrites), enqueue order is preserved, and `updateRow` expands to one
/// `updateCell` per field before counting.
#[derive(Default)]
pub struct TransactionManager {
    throttle_window_ms: u64,
    queue: VecDeque<Operation>,
    armed_at: Option<u64>,
}

impl TransactionManager {
    pub fn new(throttle_window: Duration) -> Self {
        Self {
            throttle_window_ms: u64::try_from(throttle_window.as_millis()).unwrap_or(u64::MAX),
            queue: VecDeque::new(),
            armed_at: None,
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Queues `op`. With a zero throttle window, drains synchronously against
    /// `store` before returning. With a non-zero window, arms a timer if one
    /// isn't already pending — the caller must later observe [`Self::is_due`]
    /// (typically via [`Self::poll`]) and drain then.
    pub fn enqueue(&mut self, op: Operation, now_ms: u64, store: &mut IndexedDataStore) -> EnqueueOutcome {
        self.queue.push_back(op);
        if self.throttle_window_ms == 0 {
            let result = self.drain(store);
            return EnqueueOutcome::DrainedImmediately(result);
        }
        match self.armed_at {
            Some(_) => EnqueueOutcome::JoinedPendingTimer,
            None => {
                let fire_at = now_ms.saturating_add(self.throttle_window_ms);
                self.armed_at = Some(fire_at);
                EnqueueOutcome::TimerArmed(fire_at)
            }
        }
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        self.armed_at.is_some_and(|fire_at| now_ms >= fire_at)
    }

    /// Drains the whole queue against `store`, applying operations in
    /// enqueue order. A data source whose underlying apply can fail (this
    /// in-memory store's mutations cannot) would halt here and leave the
    /// remaining queue intact, per §4.3's documented failure policy.
    pub fn drain(&mut self, store: &mut IndexedDataStore) -> TransactionResult {
        self.armed_at = None;
        let mut result = TransactionResult::default();
        while let Some(op) = self.queue.pop_front() {
            match op {
                Operation::Add(row) => {
                    store.add_rows(vec![row]);
                    result.added += 1;
                }
                Operation::Remove(id) => {
                    store.remove_rows(&[id]);
                    result.removed += 1;
                }
                Operation::UpdateCell { id, field, value } => {
                    store.update_cell(&id, &field, value);
                    result.updated += 1;
                }
                Operation::UpdateRow { id, partial } => {
                    let n = partial.len();
                    store.update_row(&id, partial);
                    result.updated += n;
                }
            }
        }
        if !result.is_empty() {
            log::debug!(
                "transaction drain: {} added, {} removed, {} updated",
                result.added,
                result.removed,
                result.updated
            );
        }
        result
    }

    /// Cancels any pending timer and drains immediately, per §4.3's `flush()`
    /// contract. Since the engine is single-threaded, a drain always
    /// completes synchronously within this call — "concurrent callers share
    /// a single promise" collapses to "later callers observe an already-empty
    /// queue".
    pub fn flush(&mut self, store: &mut IndexedDataStore) -> TransactionResult {
        self.drain(store)
    }

    /// Host-driven clock tick: if a pending timer has fired, drains and
    /// returns the result. Call this from whatever timer mechanism the host
    /// provides (a `setTimeout` callback at the wasm boundary, a sleep loop
    /// in a native harness).
    pub fn poll(&mut self, now_ms: u64, store: &mut IndexedDataStore) -> Option<TransactionResult> {
        if self.is_due(now_ms) {
            Some(self.drain(store))
        } else {
            None
        }
    }

    pub fn set_throttle_window(&mut self, window: Duration) {
        let ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        if ms == 0 && !self.queue.is_empty() {
            warn!("throttle window set to zero with a non-empty queue; queue will not drain until next mutation or explicit flush");
        }
        self.throttle_window_ms = ms;
    }
}
