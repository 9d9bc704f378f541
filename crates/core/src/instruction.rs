//! The declarative instruction stream (§4.4, §6) and its listener plumbing.
//! The engine never touches the UI directly: every effect is one of these
//! tagged instructions, emitted in a single totally-ordered batch per call.

use serde::{Deserialize, Serialize};

use crate::filter::ColumnFilter;
use crate::store::Row;
use crate::types::{CellValue, ColumnDef, SortConfig};

pub type SlotId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellPosition {
    pub row: usize,
    pub col: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRange {
    pub start: CellPosition,
    pub end: CellPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One element of the instruction stream. Every variant carries enough data
/// to be applied in isolation, per §4.4.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum Instruction {
    CreateSlot {
        slot_id: SlotId,
    },
    DestroySlot {
        slot_id: SlotId,
    },
    AssignSlot {
        slot_id: SlotId,
        row_index: usize,
        row_data: Row,
    },
    MoveSlot {
        slot_id: SlotId,
        translate_y: f64,
    },
    SetActiveCell {
        position: Option<CellPosition>,
    },
    SetSelectionRange {
        range: Option<SelectionRange>,
    },
    UpdateVisibleRange {
        start: usize,
        end: usize,
    },
    SetContentSize {
        width: f64,
        height: f64,
    },
    UpdateHeader {
        col_index: usize,
        column: ColumnDef,
        sort: Option<SortConfig>,
        filter: Option<ColumnFilter>,
    },
    StartEdit {
        row: usize,
        col: usize,
        value: CellValue,
    },
    StopEdit {
        row: usize,
        col: usize,
    },
    CommitEdit {
        row: usize,
        col: usize,
        value: CellValue,
    },
    StartFill {
        range: SelectionRange,
    },
    UpdateFill {
        range: SelectionRange,
        filled: Vec<CellValue>,
    },
    CommitFill {
        range: SelectionRange,
        filled: Vec<CellValue>,
    },
    CancelFill,
    OpenFilterPopup {
        col_index: usize,
        column: ColumnDef,
        anchor: AnchorRect,
        distinct_values: Vec<CellValue>,
        current_filter: Option<ColumnFilter>,
    },
    CloseFilterPopup,
    DataLoading,
    DataLoaded {
        total_rows: usize,
    },
    DataError {
        message: String,
    },
    RowsAdded {
        count: usize,
    },
    RowsRemoved {
        count: usize,
    },
    RowsUpdated {
        count: usize,
    },
    TransactionProcessed {
        added: usize,
        removed: usize,
        updated: usize,
    },
}

type BatchListener = Box<dyn FnMut(&[Instruction])>;
type SingleListener = Box<dyn FnMut(&Instruction)>;

/// One-way fan-out from the engine to subscribers. The engine holds no
/// reference back to a renderer, only these opaque listener handles.
#[derive(Default)]
pub struct InstructionBus {
    batch_listeners: Vec<BatchListener>,
    single_listeners: Vec<SingleListener>,
}

/// Handle returned by `subscribe_*`; dropping it does not unsubscribe —
/// call `unsubscribe` explicitly, matching the `subscribe(listener) ->
/// unsubscribe` contract of §6 rather than relying on `Drop`.
pub struct SubscriptionId(usize);

impl InstructionBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_batch(&mut self, listener: BatchListener) -> SubscriptionId {
        self.batch_listeners.push(listener);
        SubscriptionId(self.batch_listeners.len() - 1)
    }

    pub fn subscribe_single(&mut self, listener: SingleListener) -> SubscriptionId {
        self.single_listeners.push(listener);
        SubscriptionId(self.single_listeners.len() - 1)
    }

    pub fn unsubscribe_batch(&mut self, id: SubscriptionId) {
        if id.0 < self.batch_listeners.len() {
            self.batch_listeners.remove(id.0);
        }
    }

    pub fn unsubscribe_single(&mut self, id: SubscriptionId) {
        if id.0 < self.single_listeners.len() {
            self.single_listeners.remove(id.0);
        }
    }

    /// Delivers `batch` atomically to every batch subscriber, then replays
    /// each instruction, in order, to every single-instruction subscriber.
    pub fn emit(&mut self, batch: &[Instruction]) {
        if batch.is_empty() {
            return;
        }
        for listener in &mut self.batch_listeners {
            listener(batch);
        }
        for instruction in batch {
            for listener in &mut self.single_listeners {
                listener(instruction);
            }
        }
    }
}
