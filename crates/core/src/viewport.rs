//! Viewport / Slot Pool (§4.4): virtual-scroll kernel that synchronizes a
//! fixed-ish pool of recyclable slots against the rows currently required by
//! the viewport, plus scroll-coordinate compression for oversized datasets
//! and column-position layout. Generalizes the teacher's `virtual_scroll.rs`
//! (which only computed a `start..end` index range) into the full slot-pool
//! bookkeeping §4.4 requires.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use crate::config::GridConfig;
use crate::instruction::{Instruction, SlotId};
use crate::store::Row;
use crate::types::ColumnDef;

#[derive(Debug, Clone, Copy, PartialEq)]
struct SlotState {
    row_index: usize,
    translate_y: f64,
}

pub struct Viewport {
    scroll_top: f64,
    scroll_left: f64,
    viewport_width: f64,
    viewport_height: f64,
    row_height: f64,
    header_height: f64,
    overscan: usize,
    total_rows: usize,
    scroll_height_cap: f64,
    wheel_dampening: f64,
    slots: HashMap<SlotId, SlotState>,
    row_to_slot: HashMap<usize, SlotId>,
    next_slot_id: SlotId,
}

impl Viewport {
    pub fn new(config: &GridConfig) -> Self {
        Self {
            scroll_top: 0.0,
            scroll_left: 0.0,
            viewport_width: 0.0,
            viewport_height: 0.0,
            row_height: 0.0,
            header_height: 0.0,
            overscan: config.default_overscan,
            total_rows: 0,
            scroll_height_cap: config.scroll_height_cap,
            wheel_dampening: config.wheel_dampening,
            slots: HashMap::new(),
            row_to_slot: HashMap::new(),
            next_slot_id: 0,
        }
    }

    pub fn set_total_rows(&mut self, total_rows: usize) {
        self.total_rows = total_rows;
    }

    pub fn set_dimensions(
        &mut self,
        viewport_width: f64,
        viewport_height: f64,
        row_height: f64,
        header_height: f64,
    ) {
        self.viewport_width = viewport_width;
        self.viewport_height = viewport_height;
        self.row_height = row_height;
        self.header_height = header_height;
    }

    /// Sets the renderer-reported (virtual, compressed) scroll position.
    pub fn set_scroll(&mut self, scroll_top: f64, scroll_left: f64) {
        self.scroll_top = scroll_top;
        self.scroll_left = scroll_left;
    }

    /// Attenuates a raw wheel delta while scroll virtualization is active,
    /// so one physical tick doesn't skip thousands of rows.
    pub fn apply_wheel_delta(&self, raw_delta: f64) -> f64 {
        if self.scroll_ratio() < 1.0 {
            raw_delta * self.wheel_dampening
        } else {
            raw_delta
        }
    }

    fn natural_height(&self) -> f64 {
        self.total_rows as f64 * self.row_height + self.header_height
    }

    /// Compression factor between natural content height and the published
    /// container height. `1.0` when no compression is needed.
    pub fn scroll_ratio(&self) -> f64 {
        let natural = self.natural_height();
        if natural > self.scroll_height_cap && natural > 0.0 {
            self.scroll_height_cap / natural
        } else {
            1.0
        }
    }

    /// The content height the renderer should actually use for its scroll
    /// container.
    pub fn published_content_height(&self) -> f64 {
        self.natural_height().min(self.scroll_height_cap)
    }

    /// The maximum meaningful reported (virtual) `scrollTop`: a container
    /// published at `publishedContentHeight` can't scroll past
    /// `publishedContentHeight - viewportHeight`, the same bound a native
    /// DOM scroll container imposes (`scrollHeight - clientHeight`).
    fn max_virtual_scroll(&self) -> f64 {
        (self.published_content_height() - self.viewport_height).max(0.0)
    }

    /// Converts the renderer's reported (virtual) scroll position into the
    /// natural coordinate space used for row-index math. Rescaled against
    /// the reachable range on both ends, rather than a uniform division by
    /// `scrollRatio`, so the maximum reportable `scrollTop` actually reaches
    /// the end of the dataset instead of under-shooting it.
    pub fn effective_scroll_top(&self) -> f64 {
        if self.scroll_ratio() >= 1.0 {
            return self.scroll_top;
        }
        let max_virtual = self.max_virtual_scroll();
        if max_virtual <= 0.0 {
            return self.scroll_top;
        }
        let natural = self.natural_height();
        (self.scroll_top / max_virtual * natural).min(natural)
    }

    fn translate_y(&self, row_index: usize) -> f64 {
        let natural_y = row_index as f64 * self.row_height + self.header_height;
        if self.scroll_ratio() < 1.0 {
            natural_y - self.effective_scroll_top() + self.scroll_top
        } else {
            natural_y
        }
    }

    /// `[firstVisible, lastVisible]` per §4.4, using the natural (effective)
    /// scroll position.
    pub fn required_range(&self) -> Range<usize> {
        if self.total_rows == 0 || self.row_height <= 0.0 {
            return 0..0;
        }
        let effective = self.effective_scroll_top();
        let first = ((effective / self.row_height).floor() as isize - self.overscan as isize)
            .max(0) as usize;
        let last_raw = ((effective + self.viewport_height) / self.row_height).ceil() as usize
            + self.overscan;
        let last = last_raw.min(self.total_rows - 1);
        if first > last {
            first..first
        } else {
            first..(last + 1)
        }
    }

    /// Runs the slot synchronization algorithm and returns the instruction
    /// batch to emit. `row_at` resolves a row index to its current data.
    pub fn sync_slots(&mut self, row_at: impl Fn(usize) -> Option<Row>) -> Vec<Instruction> {
        let required: HashSet<usize> = self.required_range().collect();
        let mut still_needed = required.clone();
        let mut recycle: Vec<SlotId> = Vec::new();
        let mut kept: Vec<SlotId> = Vec::new();

        for (&slot_id, state) in &self.slots {
            if required.contains(&state.row_index) {
                still_needed.remove(&state.row_index);
                kept.push(slot_id);
            } else {
                recycle.push(slot_id);
            }
        }

        let mut instructions = Vec::new();
        let mut missing: Vec<usize> = still_needed.into_iter().collect();
        missing.sort_unstable();

        for row_index in missing.drain(..) {
            let Some(row) = row_at(row_index) else { continue };
            let translate_y = self.translate_y(row_index);

            if let Some(slot_id) = recycle.pop() {
                instructions.push(Instruction::AssignSlot {
                    slot_id,
                    row_index,
                    row_data: row,
                });
                instructions.push(Instruction::MoveSlot { slot_id, translate_y });
                self.row_to_slot.remove(
                    &self
                        .slots
                        .get(&slot_id)
                        .map(|s| s.row_index)
                        .unwrap_or(usize::MAX),
                );
                self.slots.insert(slot_id, SlotState { row_index, translate_y });
                self.row_to_slot.insert(row_index, slot_id);
            } else {
                let slot_id = self.next_slot_id;
                self.next_slot_id += 1;
                instructions.push(Instruction::CreateSlot { slot_id });
                instructions.push(Instruction::AssignSlot {
                    slot_id,
                    row_index,
                    row_data: row,
                });
                instructions.push(Instruction::MoveSlot { slot_id, translate_y });
                self.slots.insert(slot_id, SlotState { row_index, translate_y });
                self.row_to_slot.insert(row_index, slot_id);
            }
        }

        // Slots whose id was in the original recycle set but never popped
        // (more recycled slots than missing rows) must be destroyed.
        let reassigned: HashSet<SlotId> = instructions
            .iter()
            .filter_map(|i| match i {
                Instruction::AssignSlot { slot_id, .. } => Some(*slot_id),
                _ => None,
            })
            .collect();
        let to_destroy: Vec<SlotId> = self
            .slots
            .iter()
            .filter(|(id, state)| !required.contains(&state.row_index) && !reassigned.contains(*id))
            .map(|(&id, _)| id)
            .collect();
        for slot_id in to_destroy {
            instructions.push(Instruction::DestroySlot { slot_id });
            if let Some(state) = self.slots.remove(&slot_id) {
                self.row_to_slot.remove(&state.row_index);
            }
        }

        for slot_id in kept {
            let Some(state) = self.slots.get_mut(&slot_id) else { continue };
            let translate_y = self.translate_y(state.row_index);
            if (state.translate_y - translate_y).abs() > f64::EPSILON {
                state.translate_y = translate_y;
                instructions.push(Instruction::MoveSlot { slot_id, translate_y });
            }
        }

        instructions
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

/// Derived prefix-sum column layout (§4.4 "Column positions"). Hidden
/// columns are excluded from the returned positions but keep their original
/// index so the renderer can map visible <-> original. When the available
/// width exceeds the summed widths, flexible columns (no explicit non-zero
/// width constraint beyond min/max) scale up proportionally; min/max widths
/// are honored by clamping and redistributing the remainder over a few
/// passes.
pub fn compute_column_positions(columns: &[ColumnDef], available_width: f64) -> Vec<(usize, f64, f64)> {
    let visible: Vec<(usize, &ColumnDef)> = columns
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.hidden)
        .collect();
    if visible.is_empty() {
        return Vec::new();
    }

    let mut widths: Vec<f64> = visible.iter().map(|(_, c)| c.width).collect();
    let total: f64 = widths.iter().sum();

    if available_width > total && total > 0.0 {
        let mut locked = vec![false; widths.len()];
        for _pass in 0..5 {
            let free_total: f64 = widths
                .iter()
                .zip(&locked)
                .filter(|(_, &l)| !l)
                .map(|(w, _)| w)
                .sum();
            if free_total <= 0.0 {
                break;
            }
            let target_total = available_width
                - widths
                    .iter()
                    .zip(&locked)
                    .filter(|(_, &l)| l)
                    .map(|(w, _)| w)
                    .sum::<f64>();
            let scale = target_total / free_total;
            let mut all_locked_this_pass = true;
            for (i, (_, col)) in visible.iter().enumerate() {
                if locked[i] {
                    continue;
                }
                let scaled = widths[i] * scale;
                let clamped = scaled
                    .max(col.min_width.unwrap_or(0.0))
                    .min(col.max_width.unwrap_or(f64::INFINITY));
                if (clamped - scaled).abs() > f64::EPSILON {
                    widths[i] = clamped;
                    locked[i] = true;
                    all_locked_this_pass = false;
                } else {
                    widths[i] = scaled;
                }
            }
            if all_locked_this_pass {
                break;
            }
        }
    }

    let mut x = 0.0;
    let mut result = Vec::with_capacity(visible.len());
    for ((original_index, _), width) in visible.iter().zip(widths) {
        result.push((*original_index, x, width));
        x += width;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CellValue, RowId};
    use std::collections::HashMap as StdHashMap;

    fn row(i: usize) -> Row {
        Row {
            id: RowId::Int(i as i64),
            cells: StdHashMap::new(),
        }
    }

    fn config() -> GridConfig {
        GridConfig::default().with_default_overscan(2)
    }

    #[test]
    fn required_range_basic() {
        let mut vp = Viewport::new(&config());
        vp.set_total_rows(1000);
        vp.set_dimensions(800.0, 400.0, 40.0, 0.0);
        vp.set_scroll(0.0, 0.0);
        let range = vp.required_range();
        assert_eq!(range.start, 0);
        // 10 visible + 2 overscan
        assert_eq!(range.end, 12);
    }

    #[test]
    fn sync_slots_allocates_exactly_required_count() {
        let mut vp = Viewport::new(&config());
        vp.set_total_rows(1000);
        vp.set_dimensions(800.0, 400.0, 40.0, 0.0);
        vp.set_scroll(0.0, 0.0);
        let _ = vp.sync_slots(|i| Some(row(i)));
        assert_eq!(vp.slot_count(), vp.required_range().len());
    }

    #[test]
    fn sync_slots_recycles_on_scroll() {
        let mut vp = Viewport::new(&config());
        vp.set_total_rows(1000);
        vp.set_dimensions(800.0, 400.0, 40.0, 0.0);
        vp.set_scroll(0.0, 0.0);
        vp.sync_slots(|i| Some(row(i)));
        let before = vp.slot_count();

        vp.set_scroll(4000.0, 0.0); // scroll 100 rows down
        let instructions = vp.sync_slots(|i| Some(row(i)));
        assert_eq!(vp.slot_count(), before);
        assert!(instructions
            .iter()
            .any(|i| matches!(i, Instruction::MoveSlot { .. })));
        assert!(!instructions
            .iter()
            .any(|i| matches!(i, Instruction::CreateSlot { .. })));
    }

    #[test]
    fn scroll_virtualization_caps_published_height() {
        let mut config = GridConfig::default();
        config.scroll_height_cap = 10_000_000.0;
        let mut vp = Viewport::new(&config);
        vp.set_total_rows(500_000);
        vp.set_dimensions(800.0, 400.0, 32.0, 40.0);
        assert!((vp.published_content_height() - 10_000_000.0).abs() < f64::EPSILON);
        assert!(vp.scroll_ratio() < 1.0);
    }

    #[test]
    fn virtual_scroll_bounds_hold_near_end() {
        let mut config = GridConfig::default();
        config.scroll_height_cap = 10_000_000.0;
        let mut vp = Viewport::new(&config);
        vp.set_total_rows(500_000);
        vp.set_dimensions(800.0, 400.0, 32.0, 40.0);
        vp.set_scroll(9_999_400.0, 0.0);

        let range = vp.required_range();
        assert!(
            range.contains(&499_999),
            "visible range {:?} must reach the last row near the scroll bottom",
            range
        );

        for row_index in range {
            let y = vp.translate_y(row_index);
            assert!(y >= 0.0 - 1.0 && y <= vp.published_content_height() + 1.0);
        }
    }

    #[test]
    fn wheel_dampening_only_applies_when_virtualized() {
        let mut config = GridConfig::default();
        config.wheel_dampening = 0.5;
        config.scroll_height_cap = 10_000_000.0;

        let mut small = Viewport::new(&config);
        small.set_total_rows(100);
        small.set_dimensions(800.0, 400.0, 40.0, 0.0);
        assert!((small.apply_wheel_delta(100.0) - 100.0).abs() < f64::EPSILON);

        let mut huge = Viewport::new(&config);
        huge.set_total_rows(500_000);
        huge.set_dimensions(800.0, 400.0, 32.0, 40.0);
        assert!((huge.apply_wheel_delta(100.0) - 50.0).abs() < f64::EPSILON);
    }

    fn column(width: f64, min: Option<f64>, max: Option<f64>, hidden: bool) -> ColumnDef {
        ColumnDef {
            field: "f".to_string(),
            col_id: None,
            cell_data_type: crate::types::CellDataType::Text,
            width,
            min_width: min,
            max_width: max,
            header_name: None,
            sortable: true,
            filterable: true,
            editable: false,
            movable: true,
            resizable: true,
            hidden,
            pinned: None,
            cell_renderer: None,
            edit_renderer: None,
            header_renderer: None,
        }
    }

    #[test]
    fn column_positions_prefix_sum_basic() {
        let columns = vec![column(100.0, None, None, false), column(200.0, None, None, false)];
        let positions = compute_column_positions(&columns, 300.0);
        assert_eq!(positions, vec![(0, 0.0, 100.0), (1, 100.0, 200.0)]);
    }

    #[test]
    fn hidden_columns_excluded_but_keep_original_index() {
        let columns = vec![
            column(100.0, None, None, false),
            column(100.0, None, None, true),
            column(100.0, None, None, false),
        ];
        let positions = compute_column_positions(&columns, 200.0);
        let indices: Vec<usize> = positions.iter().map(|(i, ..)| *i).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn proportional_scaling_fills_available_width() {
        let columns = vec![column(100.0, None, None, false), column(100.0, None, None, false)];
        let positions = compute_column_positions(&columns, 400.0);
        let total_width: f64 = positions.iter().map(|(_, _, w)| w).sum();
        assert!((total_width - 400.0).abs() < 0.01);
    }

    #[test]
    fn max_width_clamps_during_scaling() {
        let columns = vec![
            column(100.0, None, Some(120.0), false),
            column(100.0, None, None, false),
        ];
        let positions = compute_column_positions(&columns, 400.0);
        assert!(positions[0].2 <= 120.0 + 0.01);
    }
}
