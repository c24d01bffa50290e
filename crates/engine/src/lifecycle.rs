//! Single-order lifecycle orchestration.

use chrono::Utc;
use common::{Money, OrderId, OrderStatus};
use sqlx::{PgConnection, PgPool};
use store::orders::{self, NewOrder, NewOrderItem, Order, StatusEvent};
use store::{StoreError, inventory, menu};

use crate::draft::OrderDraft;
use crate::reorder::{self, ReorderAlert};
use crate::requirement;
use crate::validator;
use crate::{EngineError, Result};

/// Orchestrates the order state machine `(none) → active → closed`, with
/// hard deletion and in-place update from `active`.
///
/// Every multi-step mutation runs inside a single transaction: partial
/// writes (an order row without its items, or a deduction without the
/// matching status change) are never observable.
#[derive(Clone)]
pub struct OrderService {
    pool: PgPool,
}

impl OrderService {
    /// Creates an order service over the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Prices a draft from current menu prices. Each line captures
    /// `unit price × quantity` as its price-at-order-time; the order total
    /// is the sum of the lines.
    pub(crate) async fn price(conn: &mut PgConnection, draft: &OrderDraft) -> Result<NewOrder> {
        let mut items = Vec::with_capacity(draft.items.len());
        let mut total = Money::zero();

        for item in &draft.items {
            let unit = menu::price_of(&mut *conn, item.menu_item_id).await?.ok_or_else(|| {
                EngineError::Validation(format!(
                    "ordered menu item does not exist: {}",
                    item.menu_item_id
                ))
            })?;
            let line = unit.multiply(item.quantity);
            total += line;
            items.push(NewOrderItem {
                menu_item_id: item.menu_item_id,
                quantity: item.quantity,
                price_at_order_time: line,
                customizations: item.customizations.clone(),
            });
        }

        Ok(NewOrder {
            customer_id: draft.customer_id,
            total_amount: total,
            special_instructions: draft.special_instructions.clone(),
            items,
        })
    }

    /// Validates, prices, and persists a new active order.
    #[tracing::instrument(skip(self, draft))]
    pub async fn create(&self, draft: &OrderDraft) -> Result<Order> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        if let Err(rejection) = validator::check_order(&mut tx, draft).await? {
            return Err(rejection.into());
        }

        let priced = Self::price(&mut tx, draft).await?;
        let at = Utc::now();
        let id = orders::insert(&mut tx, &priced, at).await?;
        let order = orders::fetch(&mut tx, id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("order {id}")))?;

        tx.commit().await.map_err(StoreError::from)?;
        metrics::counter!("orders_created").increment(1);
        tracing::info!(order_id = %order.id, total = %order.total_amount, "order created");
        Ok(order)
    }

    /// Fetches an order with its items.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: OrderId) -> Result<Order> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        orders::fetch(&mut conn, id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("order {id}")))
    }

    /// Lists all orders with their items.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Order>> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        Ok(orders::list(&mut conn).await?)
    }

    /// Re-validates and re-prices an order, replacing its fields and item
    /// set in place and appending a fresh "active" status event.
    #[tracing::instrument(skip(self, draft))]
    pub async fn update(&self, id: OrderId, draft: &OrderDraft) -> Result<Order> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let existing = orders::fetch(&mut tx, id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("order {id}")))?;
        if existing.status == OrderStatus::Closed {
            return Err(EngineError::Conflict(format!("order {id} is already closed")));
        }

        if let Err(rejection) = validator::check_order(&mut tx, draft).await? {
            return Err(rejection.into());
        }

        let priced = Self::price(&mut tx, draft).await?;
        orders::replace(&mut tx, id, &priced, Utc::now()).await?;
        let order = orders::fetch(&mut tx, id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("order {id}")))?;

        tx.commit().await.map_err(StoreError::from)?;
        tracing::info!(order_id = %id, "order updated");
        Ok(order)
    }

    /// Hard-deletes an order and its items. Stock deducted by an earlier
    /// close is not restored.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: OrderId) -> Result<()> {
        if !orders::delete(&self.pool, id).await? {
            return Err(EngineError::NotFound(format!("order {id}")));
        }
        metrics::counter!("orders_deleted").increment(1);
        tracing::info!(order_id = %id, "order deleted");
        Ok(())
    }

    /// Closes an active order: re-checks stock against the order's current
    /// items, marks it closed, appends the "closed" status event, and
    /// deducts the full requirement, all in one transaction. On success the
    /// reorder monitor runs and its candidates come back as a side payload.
    #[tracing::instrument(skip(self))]
    pub async fn close(&self, id: OrderId) -> Result<Option<ReorderAlert>> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let order = orders::fetch(&mut tx, id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("order {id}")))?;
        if order.status == OrderStatus::Closed {
            return Err(EngineError::Conflict(format!("order {id} is already closed")));
        }

        // Stock may have moved since creation; re-derive and re-check.
        let lines: Vec<_> = order
            .items
            .iter()
            .map(|item| (item.menu_item_id, item.quantity))
            .collect();
        let req = requirement::resolve(&mut tx, &lines).await?;
        let levels = inventory::stock_levels(&mut *tx, &req.ids()).await?;
        if requirement::first_shortfall(&req, &levels).is_some() {
            return Err(EngineError::Conflict("not enough inventory".to_string()));
        }

        orders::set_closed(&mut tx, id, Utc::now()).await?;

        let pairs = req.to_pairs();
        if !pairs.is_empty() {
            let affected = inventory::deduct(&mut tx, &pairs).await?;
            if affected != pairs.len() as u64 {
                // The guard lost a race after the sufficiency check; nothing
                // from this close commits.
                return Err(EngineError::Conflict("not enough inventory".to_string()));
            }
        }

        tx.commit().await.map_err(StoreError::from)?;
        metrics::counter!("orders_closed").increment(1);
        tracing::info!(order_id = %id, "order closed");

        reorder::check(&self.pool).await
    }

    /// Returns the append-only status history of an order.
    #[tracing::instrument(skip(self))]
    pub async fn status_history(&self, id: OrderId) -> Result<Vec<StatusEvent>> {
        if !orders::exists(&self.pool, id).await? {
            return Err(EngineError::NotFound(format!("order {id}")));
        }
        Ok(orders::status_history(&self.pool, id).await?)
    }
}
