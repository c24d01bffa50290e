//! Reorder monitoring after successful closes.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use store::inventory::{self, InventoryItem};

use crate::Result;

/// Comment attached to every reorder alert payload.
pub const REORDER_COMMENT: &str = "these items need to be replenished";

/// Informational addendum to a close response listing ingredients at or
/// below their reorder threshold. Never an error and never blocking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderAlert {
    pub items: Vec<InventoryItem>,
    pub comment: String,
}

/// Scans the stock ledger for reorder candidates. Returns `None` when every
/// ingredient is above its threshold.
pub async fn check(pool: &PgPool) -> Result<Option<ReorderAlert>> {
    let items = inventory::reorder_candidates(pool).await?;
    if items.is_empty() {
        return Ok(None);
    }

    tracing::info!(count = items.len(), "ingredients at or below reorder threshold");
    Ok(Some(ReorderAlert {
        items,
        comment: REORDER_COMMENT.to_string(),
    }))
}
