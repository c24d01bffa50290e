//! Restock orchestration for the stock ledger.

use sqlx::PgPool;
use store::StoreError;
use store::inventory::{self, InventoryTransaction, NewInventoryTransaction};

use crate::{EngineError, Result};

/// Records a restock: the append-only transaction row and the matching
/// stock increment commit as one atomic unit.
#[tracing::instrument(skip(pool))]
pub async fn restock(
    pool: &PgPool,
    transaction: &NewInventoryTransaction,
) -> Result<InventoryTransaction> {
    if transaction.quantity <= 0.0 {
        return Err(EngineError::Validation(
            "restock quantity must be positive".to_string(),
        ));
    }

    let mut tx = pool.begin().await.map_err(StoreError::from)?;
    if !inventory::exists(&mut *tx, transaction.inventory_id).await? {
        return Err(EngineError::NotFound(format!(
            "inventory item {}",
            transaction.inventory_id
        )));
    }

    let stored = inventory::restock(&mut tx, transaction).await?;
    tx.commit().await.map_err(StoreError::from)?;

    metrics::counter!("inventory_restocks").increment(1);
    tracing::info!(
        inventory_id = %stored.inventory_id,
        quantity = stored.quantity,
        "inventory restocked"
    );
    Ok(stored)
}
