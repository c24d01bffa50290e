//! Order lifecycle and inventory-consistency engine.
//!
//! Validates orders against live stock, commits multi-table writes
//! atomically, deducts ingredient stock on order closure, and processes
//! all-or-nothing batches with per-order accept/reject outcomes. Every
//! order-lifecycle and stock-ledger transaction boundary lives here; the
//! query modules below never open their own.

mod batch;
mod draft;
mod error;
mod lifecycle;
mod reorder;
mod requirement;
mod stock;
mod validator;

pub use batch::{BatchOrderStatus, BatchReport, BatchSummary, InventoryUpdate, ProcessedOrder};
pub use draft::{OrderDraft, OrderItemDraft};
pub use error::{EngineError, Result};
pub use lifecycle::OrderService;
pub use reorder::{REORDER_COMMENT, ReorderAlert};
pub use requirement::Requirement;
pub use stock::restock;
pub use validator::Rejection;
