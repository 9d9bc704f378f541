// wasm_bindgen is incompatible with const fn
#![allow(clippy::missing_const_for_fn)]

//! Thin `wasm-bindgen` binding layer over `grid-core`. This crate owns the
//! one thing the core engine must not know about — that a browser exists —
//! and nothing else: no grid logic lives here, only (de)serialization at the
//! JS boundary and wiring the engine's instruction bus to a JS callback.

use std::collections::HashMap;

use grid_core::{
    CellValue, ClientDataSource, ColumnDef, DataSource, FilterModel, GridConfig, Instruction,
    MutableDataSource, Row, RowId, SortConfig,
};
use grid_core::filter::ColumnFilter;
use grid_core::instruction::AnchorRect;
use grid_core::store::{Pagination, QueryRequest, StoreOptions};
use wasm_bindgen::prelude::*;

/// Installs `console.log`-backed logging, gated behind the `debug-log`
/// feature (matching the teacher's own feature split). Call once from the
/// host before constructing a [`TableEngine`].
#[wasm_bindgen(js_name = initLogging)]
pub fn init_logging() {
    #[cfg(feature = "debug-log")]
    {
        console_log::init_with_level(log::Level::Debug).ok();
    }
}

/// The main WASM-exposed table engine: a `ClientDataSource` plus the JS glue
/// to feed it rows/columns and drain its instruction stream.
#[wasm_bindgen]
pub struct TableEngine {
    source: ClientDataSource,
}

#[wasm_bindgen]
impl TableEngine {
    /// Create a new `TableEngine` from JSON-encoded rows and columns.
    /// `rows`: array of `{ id, cells }`. `columns`: array of `ColumnDef`.
    #[wasm_bindgen(constructor)]
    pub fn new(rows: JsValue, columns: JsValue) -> Result<TableEngine, JsError> {
        let rows: Vec<Row> = serde_wasm_bindgen::from_value(rows)?;
        let columns: Vec<ColumnDef> = serde_wasm_bindgen::from_value(columns)?;
        Ok(Self {
            source: ClientDataSource::new(rows, columns, StoreOptions::default(), GridConfig::default()),
        })
    }

    /// Set column definitions from a JS value (array of `ColumnDef`).
    #[wasm_bindgen(js_name = setColumns)]
    pub fn set_columns(&mut self, columns: JsValue) -> Result<(), JsError> {
        let columns: Vec<ColumnDef> = serde_wasm_bindgen::from_value(columns)?;
        self.source.set_columns(columns);
        Ok(())
    }

    /// Current column definitions, as JSON.
    #[wasm_bindgen(js_name = getColumns)]
    pub fn get_columns(&self) -> Result<JsValue, JsError> {
        Ok(serde_wasm_bindgen::to_value(self.source.columns())?)
    }

    /// `[colIndex, x, width]` triples for the columns that fit in
    /// `availableWidth`, per the prefix-sum column layout algorithm.
    #[wasm_bindgen(js_name = columnPositions)]
    pub fn column_positions(&self, available_width: f64) -> Result<JsValue, JsError> {
        Ok(serde_wasm_bindgen::to_value(&self.source.column_positions(available_width))?)
    }

    /// Total row count, ignoring sort/filter.
    #[wasm_bindgen(js_name = rowCount)]
    pub fn row_count(&self) -> usize {
        self.source.get_total_row_count()
    }

    /// Row count after the current filter model is applied.
    #[wasm_bindgen(js_name = visibleRowCount)]
    pub fn visible_row_count(&self) -> usize {
        self.source.get_visible_row_count()
    }

    /// Fetch a page of rows, applying (and first flushing any pending
    /// transactions against) the current sort/filter model.
    /// Expected `request`: `{ pagination?: { pageIndex, pageSize }, sort?: SortConfig[], filter?: FilterModel }`.
    #[wasm_bindgen]
    pub fn fetch(&mut self, request: JsValue) -> Result<JsValue, JsError> {
        let request: JsQueryRequest = serde_wasm_bindgen::from_value(request)?;
        let response = self.source.fetch(request.into());
        Ok(serde_wasm_bindgen::to_value(&JsQueryResponse::from(response))?)
    }

    /// Set the whole multi-column sort model in one call (leftmost is primary).
    #[wasm_bindgen(js_name = setSortModel)]
    pub fn set_sort_model(&mut self, model: JsValue) -> Result<(), JsError> {
        let model: Vec<SortConfig> = serde_wasm_bindgen::from_value(model)?;
        self.source.set_sort_model(model);
        Ok(())
    }

    /// Current sort model, as JSON.
    #[wasm_bindgen(js_name = getSortModel)]
    pub fn get_sort_model(&self) -> Result<JsValue, JsError> {
        Ok(serde_wasm_bindgen::to_value(self.source.get_sort_model())?)
    }

    /// Set or clear one column's filter condition chain.
    #[wasm_bindgen(js_name = setFilter)]
    pub fn set_filter(&mut self, col_id: &str, filter: JsValue) -> Result<(), JsError> {
        let filter: Option<ColumnFilter> = if filter.is_null() || filter.is_undefined() {
            None
        } else {
            Some(serde_wasm_bindgen::from_value(filter)?)
        };
        self.source.set_filter(col_id, filter);
        Ok(())
    }

    /// Current filter model (`Record<colId, ColumnFilter>`), as JSON.
    #[wasm_bindgen(js_name = getFilterModel)]
    pub fn get_filter_model(&self) -> Result<JsValue, JsError> {
        let model: &FilterModel = self.source.get_filter_model();
        Ok(serde_wasm_bindgen::to_value(model)?)
    }

    /// Distinct values currently observed for `field`, for a filter popup's
    /// checkbox list.
    #[wasm_bindgen(js_name = getDistinctValues)]
    pub fn get_distinct_values(&self, field: &str) -> Result<JsValue, JsError> {
        Ok(serde_wasm_bindgen::to_value(&self.source.get_distinct_values(field))?)
    }

    /// Emits an `OpenFilterPopup` instruction carrying the column's distinct
    /// values and current filter, anchored at `{ x, y, width, height }`.
    #[wasm_bindgen(js_name = openFilterPopup)]
    pub fn open_filter_popup(&mut self, col_index: usize, anchor: JsValue) -> Result<(), JsError> {
        let anchor: AnchorRect = serde_wasm_bindgen::from_value(anchor)?;
        self.source.open_filter_popup(col_index, anchor);
        Ok(())
    }

    #[wasm_bindgen(js_name = closeFilterPopup)]
    pub fn close_filter_popup(&mut self) {
        self.source.close_filter_popup();
    }

    /// Updates viewport geometry/scroll state and re-synchronizes the slot
    /// pool, delivering the resulting instruction batch to subscribers.
    #[wasm_bindgen(js_name = setViewport)]
    #[allow(clippy::too_many_arguments)]
    pub fn set_viewport(
        &mut self,
        viewport_width: f64,
        viewport_height: f64,
        row_height: f64,
        header_height: f64,
        scroll_top: f64,
        scroll_left: f64,
    ) {
        self.source
            .set_viewport(viewport_width, viewport_height, row_height, header_height, scroll_top, scroll_left);
    }

    /// Dampens a raw wheel delta while scroll virtualization is compressing
    /// the coordinate space.
    #[wasm_bindgen(js_name = applyWheelDelta)]
    pub fn apply_wheel_delta(&self, raw_delta: f64) -> f64 {
        self.source.apply_wheel_delta(raw_delta)
    }

    /// Enqueues new rows. `nowMs` is the host's current time in milliseconds
    /// (e.g. `performance.now()`), since `Instant` has no clock on wasm32.
    #[wasm_bindgen(js_name = addRows)]
    pub fn add_rows(&mut self, rows: JsValue, now_ms: f64) -> Result<(), JsError> {
        let rows: Vec<Row> = serde_wasm_bindgen::from_value(rows)?;
        self.source.add_rows(rows, now_ms as u64);
        Ok(())
    }

    /// Enqueues row removal by id.
    #[wasm_bindgen(js_name = removeRows)]
    pub fn remove_rows(&mut self, ids: JsValue, now_ms: f64) -> Result<(), JsError> {
        let ids: Vec<RowId> = serde_wasm_bindgen::from_value(ids)?;
        self.source.remove_rows(&ids, now_ms as u64);
        Ok(())
    }

    /// Enqueues a single-cell edit.
    #[wasm_bindgen(js_name = updateCell)]
    pub fn update_cell(&mut self, id: JsValue, field: &str, value: JsValue, now_ms: f64) -> Result<(), JsError> {
        let id: RowId = serde_wasm_bindgen::from_value(id)?;
        let value: CellValue = serde_wasm_bindgen::from_value(value)?;
        self.source.update_cell(&id, field, value, now_ms as u64);
        Ok(())
    }

    /// Enqueues a multi-field row edit (e.g. paste/fill), expanding to one
    /// throttled update per field.
    #[wasm_bindgen(js_name = updateRow)]
    pub fn update_row(&mut self, id: JsValue, partial: JsValue, now_ms: f64) -> Result<(), JsError> {
        let id: RowId = serde_wasm_bindgen::from_value(id)?;
        let partial: HashMap<String, CellValue> = serde_wasm_bindgen::from_value(partial)?;
        self.source.update_row(&id, partial, now_ms as u64);
        Ok(())
    }

    /// Whether any enqueued mutation is still waiting on the throttle timer.
    #[wasm_bindgen(js_name = hasPendingTransactions)]
    pub fn has_pending_transactions(&self) -> bool {
        self.source.has_pending_transactions()
    }

    /// Drains the transaction queue immediately, bypassing the throttle.
    /// Returns `{ added, removed, updated }`.
    #[wasm_bindgen(js_name = flushTransactions)]
    pub fn flush_transactions(&mut self) -> Result<JsValue, JsError> {
        let result = self.source.flush_transactions();
        Ok(serde_wasm_bindgen::to_value(&JsTransactionResult::from(result))?)
    }

    /// Host-driven clock tick: call once the host's timer (armed from a
    /// `TimerArmed` outcome) fires. Returns `null` if nothing was due.
    #[wasm_bindgen]
    pub fn poll(&mut self, now_ms: f64) -> Result<JsValue, JsError> {
        match self.source.poll(now_ms as u64) {
            Some(result) => Ok(serde_wasm_bindgen::to_value(&JsTransactionResult::from(result))?),
            None => Ok(JsValue::NULL),
        }
    }

    /// Registers a JS callback invoked with the instruction batch (as JSON)
    /// every time the engine emits one.
    #[wasm_bindgen]
    pub fn subscribe(&mut self, callback: js_sys::Function) {
        self.source.subscribe(Box::new(move |batch: &[Instruction]| {
            if let Ok(value) = serde_wasm_bindgen::to_value(batch) {
                let _ = callback.call1(&JsValue::NULL, &value);
            }
        }));
    }
}

/// Mirrors [`grid_core::store::QueryRequest`] with `camelCase` JSON field
/// names for the JS boundary, since `QueryRequest` itself deliberately
/// carries no `Serialize`/`Deserialize` derive (it's an in-process call
/// shape, not a wire type).
#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsQueryRequest {
    pagination: Option<JsPagination>,
    sort: Option<Vec<SortConfig>>,
    filter: Option<FilterModel>,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsPagination {
    page_index: usize,
    page_size: usize,
}

impl From<JsQueryRequest> for QueryRequest {
    fn from(value: JsQueryRequest) -> Self {
        Self {
            pagination: value.pagination.map(|p| Pagination {
                page_index: p.page_index,
                page_size: p.page_size,
            }),
            sort: value.sort,
            filter: value.filter,
        }
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct JsQueryResponse {
    rows: Vec<Row>,
    total_rows: usize,
}

impl From<grid_core::store::QueryResponse> for JsQueryResponse {
    fn from(value: grid_core::store::QueryResponse) -> Self {
        Self { rows: value.rows, total_rows: value.total_rows }
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct JsTransactionResult {
    added: usize,
    removed: usize,
    updated: usize,
}

impl From<grid_core::TransactionResult> for JsTransactionResult {
    fn from(value: grid_core::TransactionResult) -> Self {
        Self { added: value.added, removed: value.removed, updated: value.updated }
    }
}
