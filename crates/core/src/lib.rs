//! Headless, framework-agnostic data grid engine: an Indexed Data Store,
//! Sort Engine, Transaction Manager, and Viewport/Slot Pool wired together
//! behind a small `DataSource`/`MutableDataSource` contract. No rendering,
//! no DOM — the wasm crate (`grid-wasm`) is the only thing that knows a
//! browser exists.

pub mod accessor;
pub mod config;
pub mod error;
pub mod filter;
pub mod instruction;
pub mod layout;
pub mod layout_buffer;
pub mod sort_hash;
pub mod sort_pool;
pub mod source;
pub mod store;
pub mod transaction;
pub mod types;
pub mod viewport;

pub use config::GridConfig;
pub use error::{GridError, GridResult};
pub use filter::{ColumnFilter, Condition, FilterModel, FilterOperator};
pub use instruction::{Instruction, InstructionBus};
pub use layout::LayoutEngine;
pub use source::{ClientDataSource, DataSource, MutableDataSource};
pub use store::{IndexedDataStore, QueryRequest, QueryResponse, Row};
pub use transaction::{TransactionManager, TransactionResult};
pub use types::{CellDataType, CellValue, ColumnDef, RowId, SortConfig, SortDirection};
pub use viewport::Viewport;
