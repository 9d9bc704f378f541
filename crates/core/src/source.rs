//! External interface contract (§6) and the reference client-side
//! implementation that wires the Indexed Data Store, Transaction Manager,
//! Viewport, and Instruction Bus into the single control flow §2 describes:
//! a mutation enqueues onto the transaction manager, a drain updates the
//! store, and the viewport re-synchronizes its slots against the new
//! visible order, all surfaced as one instruction batch.

use crate::config::GridConfig;
use crate::filter::{ColumnFilter, FilterModel};
use crate::instruction::{AnchorRect, Instruction, InstructionBus, SubscriptionId};
use crate::store::{IndexedDataStore, Pagination, QueryRequest, QueryResponse, Row, StoreOptions};
use crate::transaction::{EnqueueOutcome, Operation, TransactionManager, TransactionResult};
use crate::types::{CellValue, ColumnDef, RowId, SortConfig};
use crate::viewport::{compute_column_positions, Viewport};

type BatchListener = Box<dyn FnMut(&[Instruction])>;

/// The read-only half of the external interface: anything that can answer a
/// [`QueryRequest`] and broadcast instructions is a valid data source,
/// independent of whether it also supports mutation.
pub trait DataSource {
    fn fetch(&mut self, request: QueryRequest) -> QueryResponse;
    fn subscribe(&mut self, listener: BatchListener) -> SubscriptionId;
    fn unsubscribe(&mut self, id: SubscriptionId);
}

/// The mutable extension (§4.3, §6): row-level edits funnel through the
/// Transaction Manager rather than touching the store directly. Mutators
/// take an explicit `now_ms` host timestamp (milliseconds on whatever clock
/// the host runs — `performance.now()` in a browser) rather than reading a
/// clock internally, since `std::time::Instant` has no implementation on
/// `wasm32-unknown-unknown`.
pub trait MutableDataSource: DataSource {
    fn add_rows(&mut self, rows: Vec<Row>, now_ms: u64);
    fn remove_rows(&mut self, ids: &[RowId], now_ms: u64);
    fn update_cell(&mut self, id: &RowId, field: &str, value: CellValue, now_ms: u64);
    fn update_row(&mut self, id: &RowId, partial: std::collections::HashMap<String, CellValue>, now_ms: u64);
    fn flush_transactions(&mut self) -> TransactionResult;
    fn has_pending_transactions(&self) -> bool;
}

/// The full headless engine (§2): the four subsystems plus the column
/// model, fronted by a single control surface. This is the "reference
/// client-side data source" mentioned in §6 — an in-process, synchronous
/// fetch over an in-memory `IndexedDataStore`. A server-backed
/// `DataSource` would instead dispatch `fetch` over the network and call
/// back into `subscribe`'d listeners on response.
pub struct ClientDataSource {
    store: IndexedDataStore,
    transactions: TransactionManager,
    viewport: Viewport,
    bus: InstructionBus,
    columns: Vec<ColumnDef>,
    config: GridConfig,
}

impl ClientDataSource {
    pub fn new(
        initial_rows: Vec<Row>,
        columns: Vec<ColumnDef>,
        options: StoreOptions,
        config: GridConfig,
    ) -> Self {
        let store = IndexedDataStore::new(initial_rows, options, config.clone());
        let transactions = TransactionManager::new(config.throttle_window);
        let viewport = Viewport::new(&config);
        Self {
            store,
            transactions,
            viewport,
            bus: InstructionBus::new(),
            columns,
            config,
        }
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn set_columns(&mut self, columns: Vec<ColumnDef>) {
        self.columns = columns;
    }

    pub fn column_positions(&self, available_width: f64) -> Vec<(usize, f64, f64)> {
        compute_column_positions(&self.columns, available_width)
    }

    pub fn get_distinct_values(&self, field: &str) -> Vec<CellValue> {
        self.store.get_distinct_values(field)
    }

    pub fn get_row_by_id(&self, id: &RowId) -> Option<Row> {
        self.store.get_row_by_id(id).cloned()
    }

    pub fn get_total_row_count(&self) -> usize {
        self.store.get_total_row_count()
    }

    pub fn get_visible_row_count(&self) -> usize {
        self.store.get_visible_row_count()
    }

    pub fn get_sort_model(&self) -> &[SortConfig] {
        self.store.get_sort_model()
    }

    pub fn get_filter_model(&self) -> &FilterModel {
        self.store.get_filter_model()
    }

    /// Sets or clears one column's filter (the filter-popup contract of §6)
    /// and re-synchronizes the viewport against the new visible rows.
    pub fn set_filter(&mut self, col_id: &str, filter: Option<ColumnFilter>) {
        self.store.set_filter(col_id, filter);
        self.resync_viewport();
    }

    pub fn set_sort_model(&mut self, model: Vec<SortConfig>) {
        self.store.set_sort_model(model);
        self.resync_viewport();
    }

    /// Gathers the `OpenFilterPopup` payload for a column and emits it —
    /// the popup's distinct-value checklist and current condition chain
    /// are both sourced from the store, never invented by the caller.
    pub fn open_filter_popup(&mut self, col_index: usize, anchor: AnchorRect) {
        let Some(column) = self.columns.get(col_index).cloned() else {
            return;
        };
        let col_id = column.resolved_col_id().to_string();
        let distinct_values = self.store.get_distinct_values(&col_id);
        let current_filter = self.store.get_filter_model().get(&col_id).cloned();
        self.bus.emit(&[Instruction::OpenFilterPopup {
            col_index,
            column,
            anchor,
            distinct_values,
            current_filter,
        }]);
    }

    pub fn close_filter_popup(&mut self) {
        self.bus.emit(&[Instruction::CloseFilterPopup]);
    }

    /// Updates viewport geometry/scroll state and re-runs slot
    /// synchronization, emitting the resulting instruction batch alongside
    /// `UpdateVisibleRange`/`SetContentSize`.
    pub fn set_viewport(
        &mut self,
        viewport_width: f64,
        viewport_height: f64,
        row_height: f64,
        header_height: f64,
        scroll_top: f64,
        scroll_left: f64,
    ) {
        self.viewport.set_total_rows(self.store.get_visible_row_count());
        self.viewport
            .set_dimensions(viewport_width, viewport_height, row_height, header_height);
        self.viewport.set_scroll(scroll_top, scroll_left);
        self.resync_viewport();
    }

    /// Dampens a raw wheel delta, for callers driving scroll via wheel
    /// events rather than a direct `scrollTop` assignment.
    pub fn apply_wheel_delta(&self, raw_delta: f64) -> f64 {
        self.viewport.apply_wheel_delta(raw_delta)
    }

    fn resync_viewport(&mut self) {
        self.viewport.set_total_rows(self.store.get_visible_row_count());
        let store = &self.store;
        let instructions = self.viewport.sync_slots(|position| store.visible_row_at(position));

        let mut batch = instructions;
        let range = self.store_required_range();
        batch.push(Instruction::UpdateVisibleRange { start: range.0, end: range.1 });
        batch.push(Instruction::SetContentSize {
            width: self.columns.iter().filter(|c| !c.hidden).map(|c| c.width).sum(),
            height: self.viewport.published_content_height(),
        });
        self.bus.emit(&batch);
    }

    fn store_required_range(&self) -> (usize, usize) {
        let range = self.viewport.required_range();
        (range.start, range.end)
    }

    /// Host-driven clock tick (see `transaction.rs`): call this from the
    /// host's timer mechanism once a `TimerArmed` timestamp is reached.
    /// Drains and re-synchronizes the viewport if a drain actually ran.
    pub fn poll(&mut self, now_ms: u64) -> Option<TransactionResult> {
        let result = self.transactions.poll(now_ms, &mut self.store)?;
        self.after_drain(result);
        Some(result)
    }

    fn after_drain(&mut self, result: TransactionResult) {
        self.resync_viewport();
        self.bus.emit(&[Instruction::TransactionProcessed {
            added: result.added,
            removed: result.removed,
            updated: result.updated,
        }]);
    }

    fn enqueue(&mut self, op: Operation, now_ms: u64) {
        if let EnqueueOutcome::DrainedImmediately(result) = self.transactions.enqueue(op, now_ms, &mut self.store) {
            self.after_drain(result);
        }
    }
}

impl DataSource for ClientDataSource {
    /// Per §5, a `fetch` issued while transactions are pending must first
    /// flush them, so readers never observe a stale view behind an
    /// un-drained mutation queue.
    fn fetch(&mut self, mut request: QueryRequest) -> QueryResponse {
        if self.transactions.has_pending() {
            let result = self.transactions.flush(&mut self.store);
            self.after_drain(result);
        }
        self.bus.emit(&[Instruction::DataLoading]);
        if request.pagination.is_none() {
            request.pagination = Some(Pagination { page_index: 0, page_size: self.store.get_total_row_count().max(1) });
        }
        let response = self.store.query(request);
        self.bus.emit(&[Instruction::DataLoaded { total_rows: response.total_rows }]);
        response
    }

    fn subscribe(&mut self, listener: BatchListener) -> SubscriptionId {
        self.bus.subscribe_batch(listener)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        self.bus.unsubscribe_batch(id);
    }
}

impl MutableDataSource for ClientDataSource {
    fn add_rows(&mut self, rows: Vec<Row>, now_ms: u64) {
        for row in rows {
            self.enqueue(Operation::Add(row), now_ms);
        }
    }

    fn remove_rows(&mut self, ids: &[RowId], now_ms: u64) {
        for id in ids {
            self.enqueue(Operation::Remove(id.clone()), now_ms);
        }
    }

    fn update_cell(&mut self, id: &RowId, field: &str, value: CellValue, now_ms: u64) {
        self.enqueue(
            Operation::UpdateCell {
                id: id.clone(),
                field: field.to_string(),
                value,
            },
            now_ms,
        );
    }

    fn update_row(&mut self, id: &RowId, partial: std::collections::HashMap<String, CellValue>, now_ms: u64) {
        self.enqueue(Operation::UpdateRow { id: id.clone(), partial }, now_ms);
    }

    fn flush_transactions(&mut self) -> TransactionResult {
        let result = self.transactions.flush(&mut self.store);
        self.after_drain(result);
        result
    }

    fn has_pending_transactions(&self) -> bool {
        self.transactions.has_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellDataType;
    use std::collections::HashMap;

    fn text_column(field: &str) -> ColumnDef {
        ColumnDef {
            field: field.to_string(),
            col_id: None,
            cell_data_type: CellDataType::Text,
            width: 120.0,
            min_width: None,
            max_width: None,
            header_name: None,
            sortable: true,
            filterable: true,
            editable: true,
            movable: true,
            resizable: true,
            hidden: false,
            pinned: None,
            cell_renderer: None,
            edit_renderer: None,
            header_renderer: None,
        }
    }

    fn row(id: i64, name: &str) -> Row {
        let mut cells = HashMap::new();
        cells.insert("name".to_string(), CellValue::Str(name.to_string()));
        Row { id: RowId::Int(id), cells }
    }

    fn engine_with(rows: Vec<Row>, throttle_zero: bool) -> ClientDataSource {
        let mut config = GridConfig::default();
        if throttle_zero {
            config = config.with_throttle_window(std::time::Duration::ZERO);
        }
        ClientDataSource::new(rows, vec![text_column("name")], StoreOptions::default(), config)
    }

    #[test]
    fn fetch_returns_current_rows() {
        let mut engine = engine_with(vec![row(1, "Alice"), row(2, "Bob")], true);
        let response = engine.fetch(QueryRequest::default());
        assert_eq!(response.total_rows, 2);
    }

    #[test]
    fn fetch_flushes_pending_transactions_first() {
        let mut engine = engine_with(vec![row(1, "Alice")], false);
        engine.add_rows(vec![row(2, "Bob")], 0);
        assert!(engine.has_pending_transactions());
        let response = engine.fetch(QueryRequest::default());
        assert!(!engine.has_pending_transactions());
        assert_eq!(response.total_rows, 2);
    }

    #[test]
    fn subscribers_receive_instructions_on_viewport_sync() {
        let mut engine = engine_with(vec![row(1, "Alice"), row(2, "Bob")], true);
        let received: std::rc::Rc<std::cell::RefCell<usize>> = std::rc::Rc::new(std::cell::RefCell::new(0));
        let received_clone = received.clone();
        engine.subscribe(Box::new(move |batch| {
            *received_clone.borrow_mut() += batch.len();
        }));
        engine.set_viewport(800.0, 400.0, 40.0, 0.0, 0.0, 0.0);
        assert!(*received.borrow() > 0);
    }

    #[test]
    fn set_filter_narrows_visible_rows() {
        let mut engine = engine_with(vec![row(1, "Alice"), row(2, "Bob")], true);
        engine.set_filter(
            "name",
            Some(ColumnFilter {
                conditions: vec![crate::filter::Condition {
                    kind: crate::filter::ConditionKind::Text,
                    operator: crate::filter::FilterOperator::Equals,
                    value: Some(CellValue::Str("Alice".to_string())),
                    secondary_value: None,
                    selected_values: None,
                    next_operator: None,
                }],
                combination: crate::filter::Combinator::And,
            }),
        );
        assert_eq!(engine.get_visible_row_count(), 1);
    }

    #[test]
    fn mutation_with_zero_throttle_is_visible_immediately() {
        let mut engine = engine_with(vec![row(1, "Alice")], true);
        engine.add_rows(vec![row(2, "Bob")], 0);
        assert_eq!(engine.get_total_row_count(), 2);
        assert!(!engine.has_pending_transactions());
    }

    #[test]
    fn mutation_with_nonzero_throttle_is_queued_until_flush() {
        let mut engine = engine_with(vec![row(1, "Alice")], false);
        engine.add_rows(vec![row(2, "Bob")], 0);
        assert_eq!(engine.get_total_row_count(), 1);
        assert!(engine.has_pending_transactions());
        let result = engine.flush_transactions();
        assert_eq!(result.added, 1);
        assert_eq!(engine.get_total_row_count(), 2);
    }

    #[test]
    fn column_positions_reflect_current_columns() {
        let engine = engine_with(vec![row(1, "Alice")], true);
        let positions = engine.column_positions(120.0);
        assert_eq!(positions.len(), 1);
    }
}
