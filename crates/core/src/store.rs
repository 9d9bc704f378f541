//! The Indexed Data Store (§4.1): content-addressable row table with
//! incrementally maintained sort order, filter predicates, and distinct-value
//! indexes. Generalizes the teacher's `DataStore` (`data_store.rs` +
//! `index_ops.rs`), which held `Vec<Vec<serde_json::Value>>` rows addressed
//! only by position, into rows addressed by caller-supplied identity with a
//! dotted-path field model.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::accessor::get_field_value;
use crate::config::GridConfig;
use crate::filter::{row_matches, FilterModel};
use crate::sort_hash::{compare_encoded_key, encode_sort_key};
use crate::sort_pool::SortPool;
use crate::types::{CellValue, RowId, SortConfig};

/// A row's identity plus its cells. Fields are addressed by dotted path
/// through [`crate::accessor::get_field_value`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: RowId,
    pub cells: HashMap<String, CellValue>,
}

/// How a row's field value is resolved. Overridable per spec's
/// `options.getFieldValue` so callers whose rows don't fit the dotted-path
/// object model can supply their own accessor; defaults to
/// [`get_field_value`].
pub type FieldAccessor = Box<dyn Fn(&Row, &str) -> CellValue>;

#[derive(Default)]
pub struct StoreOptions {
    pub field_accessor: Option<FieldAccessor>,
}

#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub page_index: usize,
    pub page_size: usize,
}

#[derive(Default)]
pub struct QueryRequest {
    pub pagination: Option<Pagination>,
    pub sort: Option<Vec<SortConfig>>,
    pub filter: Option<FilterModel>,
}

#[derive(Debug, Clone)]
pub struct QueryResponse {
    pub rows: Vec<Row>,
    pub total_rows: usize,
}

/// The content-addressable table.
pub struct IndexedDataStore {
    rows: Vec<Row>,
    row_by_id: HashMap<RowId, u32>,
    sorted_indices: Vec<u32>,
    /// `None` means "every row passes" (the spec's conceptually-universal,
    /// unmaterialized set for an empty filter model).
    filtered_indices: Option<HashSet<u32>>,
    sort_model: Vec<SortConfig>,
    sort_model_hash: String,
    row_sort_keys: HashMap<u32, Vec<f64>>,
    filter_model: FilterModel,
    distinct_values: HashMap<String, HashMap<String, CellValue>>,
    field_accessor: FieldAccessor,
    config: GridConfig,
    sort_pool: SortPool,
}

fn stringify_sort_model(model: &[SortConfig]) -> String {
    serde_json::to_string(model).unwrap_or_default()
}

fn compute_key_vector(sort_model: &[SortConfig], accessor: &FieldAccessor, row: &Row) -> Vec<f64> {
    sort_model
        .iter()
        .map(|cfg| encode_sort_key(&accessor(row, &cfg.column_id)))
        .collect()
}

fn compare_key_vectors(a: &[f64], b: &[f64], sort_model: &[SortConfig]) -> Ordering {
    for (k, cfg) in sort_model.iter().enumerate() {
        let ord = compare_encoded_key(a[k], b[k], cfg.direction);
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

impl IndexedDataStore {
    pub fn new(initial: Vec<Row>, options: StoreOptions, config: GridConfig) -> Self {
        let field_accessor = options.field_accessor.unwrap_or_else(|| Box::new(get_field_value));
        let sort_worker_count = config.sort_worker_count;
        let mut store = Self {
            rows: Vec::new(),
            row_by_id: HashMap::new(),
            sorted_indices: Vec::new(),
            filtered_indices: None,
            sort_model: Vec::new(),
            sort_model_hash: stringify_sort_model(&[]),
            row_sort_keys: HashMap::new(),
            filter_model: FilterModel::new(),
            distinct_values: HashMap::new(),
            field_accessor,
            config,
            sort_pool: SortPool::new(sort_worker_count),
        };
        for row in initial {
            store.add_row(row);
        }
        store
    }

    fn accessor(&self, row: &Row, path: &str) -> CellValue {
        (self.field_accessor)(row, path)
    }

    fn record_distinct(&mut self, field: &str, value: &CellValue) {
        if value.is_null() {
            return;
        }
        let bucket = self.distinct_values.entry(field.to_string()).or_default();
        bucket.entry(value.dedupe_key()).or_insert_with(|| value.clone());
    }

    fn row_passes_filter(&self, row: &Row) -> bool {
        row_matches(&self.filter_model, |col| self.accessor(row, col))
    }

    fn binary_search_insert_pos(&self, keys: &[f64]) -> usize {
        self.sorted_indices.partition_point(|&idx| {
            let existing = &self.row_sort_keys[&idx];
            compare_key_vectors(existing, keys, &self.sort_model) != Ordering::Greater
        })
    }

    // ── Mutation ────────────────────────────────────────────────────────

    pub fn add_rows(&mut self, rows: Vec<Row>) {
        for row in rows {
            self.add_row(row);
        }
    }

    fn add_row(&mut self, row: Row) {
        if self.row_by_id.contains_key(&row.id) {
            warn!("add_rows: row id already exists, skipping");
            return;
        }
        let idx = self.rows.len() as u32;

        for (field, value) in &row.cells {
            self.record_distinct(field, value);
        }
        self.row_by_id.insert(row.id.clone(), idx);

        if self.sort_model.is_empty() {
            self.sorted_indices.push(idx);
        } else {
            let keys = compute_key_vector(&self.sort_model, &self.field_accessor, &row);
            let pos = self.binary_search_insert_pos(&keys);
            self.sorted_indices.insert(pos, idx);
            self.row_sort_keys.insert(idx, keys);
        }

        if self.row_passes_filter(&row) {
            if let Some(set) = &mut self.filtered_indices {
                set.insert(idx);
            }
        }

        self.rows.push(row);
    }

    pub fn remove_rows(&mut self, ids: &[RowId]) {
        for id in ids {
            self.remove_row(id);
        }
    }

    fn remove_row(&mut self, id: &RowId) {
        let Some(&idx) = self.row_by_id.get(id) else {
            return;
        };

        self.rows.remove(idx as usize);
        self.row_by_id.remove(id);
        self.row_sort_keys.remove(&idx);
        self.sorted_indices.retain(|&i| i != idx);
        if let Some(set) = &mut self.filtered_indices {
            set.remove(&idx);
        }

        for i in &mut self.sorted_indices {
            if *i > idx {
                *i -= 1;
            }
        }
        if let Some(set) = &mut self.filtered_indices {
            *set = set.iter().map(|&i| if i > idx { i - 1 } else { i }).collect();
        }
        self.row_sort_keys = self
            .row_sort_keys
            .drain()
            .map(|(i, v)| (if i > idx { i - 1 } else { i }, v))
            .collect();
        for v in self.row_by_id.values_mut() {
            if *v > idx {
                *v -= 1;
            }
        }
    }

    pub fn update_cell(&mut self, id: &RowId, field: &str, value: CellValue) {
        let Some(&idx) = self.row_by_id.get(id) else {
            return;
        };

        self.record_distinct(field, &value);
        self.rows[idx as usize].cells.insert(field.to_string(), value);
        let row_snapshot = self.rows[idx as usize].clone();

        if self.sort_model.iter().any(|c| c.column_id == field) {
            let keys = compute_key_vector(&self.sort_model, &self.field_accessor, &row_snapshot);
            self.sorted_indices.retain(|&i| i != idx);
            self.row_sort_keys.insert(idx, keys.clone());
            let pos = self.binary_search_insert_pos(&keys);
            self.sorted_indices.insert(pos, idx);
        }

        if self.filter_model.contains_key(field) {
            let passes = self.row_passes_filter(&row_snapshot);
            if let Some(set) = &mut self.filtered_indices {
                if passes {
                    set.insert(idx);
                } else {
                    set.remove(&idx);
                }
            }
        }
    }

    pub fn update_row(&mut self, id: &RowId, partial: HashMap<String, CellValue>) {
        for (field, value) in partial {
            self.update_cell(id, &field, value);
        }
    }

    pub fn clear(&mut self) {
        self.rows.clear();
        self.row_by_id.clear();
        self.sorted_indices.clear();
        self.filtered_indices = None;
        self.row_sort_keys.clear();
        self.distinct_values.clear();
        self.sort_model.clear();
        self.sort_model_hash = stringify_sort_model(&[]);
        self.filter_model.clear();
    }

    // ── Sort / filter model ──────────────────────────────────────────────

    pub fn set_sort_model(&mut self, model: Vec<SortConfig>) {
        let hash = stringify_sort_model(&model);
        if hash == self.sort_model_hash {
            return;
        }
        self.sort_model = model;
        self.sort_model_hash = hash;
        self.rebuild_sort_order();
    }

    pub fn get_sort_model(&self) -> &[SortConfig] {
        &self.sort_model
    }

    fn rebuild_sort_order(&mut self) {
        if self.sort_model.is_empty() {
            self.row_sort_keys.clear();
            self.sorted_indices = (0..self.rows.len() as u32).collect();
            return;
        }

        let computed: Vec<(u32, Vec<f64>)> = self
            .rows
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                (
                    idx as u32,
                    compute_key_vector(&self.sort_model, &self.field_accessor, row),
                )
            })
            .collect();
        self.row_sort_keys.clear();
        self.row_sort_keys.extend(computed);

        let n = self.rows.len();
        if n >= self.config.parallel_sort_threshold && self.sort_model.len() == 1 {
            // Single-key case can reuse the pool's key-array dispatch directly.
            let keys: Vec<f64> = (0..n as u32).map(|i| self.row_sort_keys[&i][0]).collect();
            let direction = self.sort_model[0].direction;
            let handle = self
                .sort_pool
                .dispatch_multi_key(vec![keys], vec![direction]);
            match handle.recv() {
                Ok(perm) => {
                    self.sorted_indices = perm;
                    return;
                }
                Err(_) => warn!("sort pool unavailable, falling back to synchronous sort"),
            }
        }

        let keys_map = &self.row_sort_keys;
        let sort_model = &self.sort_model;
        let mut perm: Vec<u32> = (0..n as u32).collect();
        perm.sort_by(|&a, &b| compare_key_vectors(&keys_map[&a], &keys_map[&b], sort_model));
        self.sorted_indices = perm;
    }

    pub fn set_filter_model(&mut self, model: FilterModel) {
        self.filter_model = model;
        self.recompute_filter();
    }

    pub fn get_filter_model(&self) -> &FilterModel {
        &self.filter_model
    }

    /// Sets or clears a single column's filter, for the filter-popup contract
    /// of §6 (`setFilter(colId, model | null)`) without disturbing other
    /// columns' filters.
    pub fn set_filter(&mut self, col_id: &str, filter: Option<crate::filter::ColumnFilter>) {
        match filter {
            Some(f) => {
                self.filter_model.insert(col_id.to_string(), f);
            }
            None => {
                self.filter_model.remove(col_id);
            }
        }
        self.recompute_filter();
    }

    fn recompute_filter(&mut self) {
        if self.filter_model.is_empty() {
            self.filtered_indices = None;
            return;
        }
        let mut set = HashSet::new();
        for (idx, row) in self.rows.iter().enumerate() {
            if self.row_passes_filter(row) {
                set.insert(idx as u32);
            }
        }
        self.filtered_indices = Some(set);
    }

    // ── Read access ──────────────────────────────────────────────────────

    fn visible_indices(&self) -> Vec<u32> {
        match &self.filtered_indices {
            None => self.sorted_indices.clone(),
            Some(set) => self
                .sorted_indices
                .iter()
                .copied()
                .filter(|i| set.contains(i))
                .collect(),
        }
    }

    pub fn query(&mut self, request: QueryRequest) -> QueryResponse {
        if let Some(sort) = request.sort {
            self.set_sort_model(sort);
        }
        if let Some(filter) = request.filter {
            self.set_filter_model(filter);
        }

        let visible = self.visible_indices();
        let total_rows = visible.len();

        let Some(pagination) = request.pagination else {
            return QueryResponse {
                rows: visible.iter().map(|&i| self.rows[i as usize].clone()).collect(),
                total_rows,
            };
        };

        let start = pagination.page_index.saturating_mul(pagination.page_size);
        if start >= total_rows {
            return QueryResponse { rows: Vec::new(), total_rows };
        }
        let end = (start + pagination.page_size).min(total_rows);
        let rows = visible[start..end].iter().map(|&i| self.rows[i as usize].clone()).collect();
        QueryResponse { rows, total_rows }
    }

    pub fn get_row_by_id(&self, id: &RowId) -> Option<&Row> {
        self.row_by_id.get(id).map(|&idx| &self.rows[idx as usize])
    }

    pub fn get_row_by_index(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Resolves a *visible* (post-sort, post-filter) row position to its
    /// current data, for the viewport's slot-pool synchronization.
    pub fn visible_row_at(&self, position: usize) -> Option<Row> {
        let visible = self.visible_indices();
        visible
            .get(position)
            .map(|&idx| self.rows[idx as usize].clone())
    }

    pub fn get_all_rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn get_total_row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn get_visible_row_count(&self) -> usize {
        match &self.filtered_indices {
            None => self.rows.len(),
            Some(set) => set.len(),
        }
    }

    pub fn get_distinct_values(&self, field: &str) -> Vec<CellValue> {
        self.distinct_values
            .get(field)
            .map(|bucket| bucket.values().cloned().collect())
            .unwrap_or_default()
    }
}
