//! All-or-nothing batch order processing.

use std::collections::HashMap;

use chrono::Utc;
use common::{CustomerId, InventoryId, Money, OrderId};
use serde::{Deserialize, Serialize};
use sqlx::{Connection, PgConnection};
use store::{StoreError, inventory, orders};

use crate::draft::OrderDraft;
use crate::lifecycle::OrderService;
use crate::validator::{self, Rejection};
use crate::Result;

/// Per-order outcome in a batch report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchOrderStatus {
    Accepted,
    Rejected,
}

/// One processed order in the batch report. Rejected orders were never
/// persisted and carry no order ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedOrder {
    pub order_id: Option<OrderId>,
    pub customer_id: CustomerId,
    pub status: BatchOrderStatus,
    pub total: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// One (order, ingredient) touch point. `remaining` is the ingredient's
/// stock after the whole batch committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryUpdate {
    pub ingredient_id: InventoryId,
    pub quantity_used: f64,
    pub remaining: f64,
}

/// Aggregate accounting for a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total_orders: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub total_revenue: Money,
    pub inventory_updates: Vec<InventoryUpdate>,
}

/// Structured result of a batch submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub processed_orders: Vec<ProcessedOrder>,
    pub summary: BatchSummary,
}

/// An order the batch accepted, pending report assembly.
struct AppliedOrder {
    order_id: OrderId,
    total: Money,
    pairs: Vec<(InventoryId, f64)>,
}

impl OrderService {
    /// Processes a batch of candidate orders inside one transaction.
    ///
    /// Each order is independently validated; rejections become report
    /// entries and leave no trace in the store. Accepted orders run the
    /// full create-and-close pipeline, deducting stock immediately, and
    /// commit together; any storage failure rolls the entire batch back.
    #[tracing::instrument(skip(self, drafts), fields(total_orders = drafts.len()))]
    pub async fn process_batch(&self, drafts: &[OrderDraft]) -> Result<BatchReport> {
        let mut tx = self.pool().begin().await.map_err(StoreError::from)?;

        let mut processed = Vec::with_capacity(drafts.len());
        let mut applied = Vec::new();
        let mut accepted = 0usize;
        let mut rejected = 0usize;
        let mut total_revenue = Money::zero();

        for draft in drafts {
            match Self::apply_batch_order(&mut tx, draft).await? {
                Ok(order) => {
                    accepted += 1;
                    total_revenue += order.total;
                    processed.push(ProcessedOrder {
                        order_id: Some(order.order_id),
                        customer_id: draft.customer_id,
                        status: BatchOrderStatus::Accepted,
                        total: order.total,
                        reason: None,
                    });
                    applied.push(order);
                }
                Err(rejection) => {
                    rejected += 1;
                    processed.push(ProcessedOrder {
                        order_id: None,
                        customer_id: draft.customer_id,
                        status: BatchOrderStatus::Rejected,
                        total: Money::zero(),
                        reason: Some(rejection.to_string()),
                    });
                }
            }
        }

        // Final post-batch stock for every touched ingredient, read inside
        // the transaction so the report matches what commits.
        let mut touched: Vec<InventoryId> = applied
            .iter()
            .flat_map(|order| order.pairs.iter().map(|(id, _)| *id))
            .collect();
        touched.sort_unstable();
        touched.dedup();
        let levels = if touched.is_empty() {
            HashMap::new()
        } else {
            inventory::stock_levels(&mut *tx, &touched).await?
        };

        let inventory_updates = applied
            .iter()
            .flat_map(|order| {
                order.pairs.iter().map(|(id, qty)| InventoryUpdate {
                    ingredient_id: *id,
                    quantity_used: *qty,
                    remaining: levels.get(id).copied().unwrap_or(0.0),
                })
            })
            .collect();

        tx.commit().await.map_err(StoreError::from)?;
        metrics::counter!("order_batches_processed").increment(1);
        metrics::counter!("batch_orders_accepted").increment(accepted as u64);
        metrics::counter!("batch_orders_rejected").increment(rejected as u64);
        tracing::info!(accepted, rejected, revenue = %total_revenue, "batch processed");

        Ok(BatchReport {
            processed_orders: processed,
            summary: BatchSummary {
                total_orders: drafts.len(),
                accepted,
                rejected,
                total_revenue,
                inventory_updates,
            },
        })
    }

    /// Applies one batch order under a savepoint. A rejection, including a
    /// deduction guard that loses a race after the sufficiency check,
    /// unwinds this order alone and leaves already-accepted orders intact.
    async fn apply_batch_order(
        conn: &mut PgConnection,
        draft: &OrderDraft,
    ) -> Result<std::result::Result<AppliedOrder, Rejection>> {
        let mut sp = conn.begin().await.map_err(StoreError::from)?;

        let req = match validator::check_order(&mut sp, draft).await? {
            Ok(req) => req,
            Err(rejection) => return Ok(Err(rejection)),
        };

        let priced = Self::price(&mut sp, draft).await?;
        let at = Utc::now();
        let order_id = orders::insert(&mut sp, &priced, at).await?;
        orders::set_closed(&mut sp, order_id, at).await?;

        let pairs = req.to_pairs();
        if !pairs.is_empty() {
            let affected = inventory::deduct(&mut sp, &pairs).await?;
            if affected != pairs.len() as u64 {
                drop(sp);
                return Ok(Err(Rejection::InsufficientStock));
            }
        }

        sp.commit().await.map_err(StoreError::from)?;
        Ok(Ok(AppliedOrder {
            order_id,
            total: priced.total_amount,
            pairs,
        }))
    }
}
