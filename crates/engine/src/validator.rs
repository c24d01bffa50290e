//! Order admission checks shared by single-order creation and batching.

use common::{CustomerId, MenuItemId};
use sqlx::PgConnection;
use store::{customers, inventory, menu};

use crate::draft::OrderDraft;
use crate::requirement::{self, Requirement};
use crate::{EngineError, Result};

/// Why an order was not admitted.
///
/// In the batch pipeline these become per-order report entries; in the
/// single-order pipeline they surface as a validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    EmptyItems,
    UnknownMenuItem(MenuItemId),
    InsufficientStock,
    UnknownCustomer(CustomerId),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::EmptyItems => write!(f, "order items are empty"),
            Rejection::UnknownMenuItem(id) => {
                write!(f, "ordered menu item does not exist: {id}")
            }
            Rejection::InsufficientStock => write!(f, "not enough inventory"),
            Rejection::UnknownCustomer(id) => write!(f, "customer does not exist: {id}"),
        }
    }
}

/// Checks an order draft for admission, short-circuiting on the first
/// failure: menu references, then stock sufficiency, then the customer.
///
/// A failed check is data (`Ok(Err(..))`), not an error; only store
/// failures surface as `Err`. On success the resolved requirement is
/// returned so callers do not recompute it.
pub(crate) async fn check_order(
    conn: &mut PgConnection,
    draft: &OrderDraft,
) -> Result<std::result::Result<Requirement, Rejection>> {
    if draft.items.is_empty() {
        return Ok(Err(Rejection::EmptyItems));
    }

    for item in &draft.items {
        if !menu::exists(&mut *conn, item.menu_item_id).await? {
            return Ok(Err(Rejection::UnknownMenuItem(item.menu_item_id)));
        }
    }

    let req = requirement::resolve(conn, &draft.lines()).await?;
    let levels = inventory::stock_levels(&mut *conn, &req.ids()).await?;
    if let Some(ingredient) = requirement::first_shortfall(&req, &levels) {
        tracing::debug!(%ingredient, "stock cannot cover order requirement");
        return Ok(Err(Rejection::InsufficientStock));
    }

    if !customers::exists(&mut *conn, draft.customer_id).await? {
        return Ok(Err(Rejection::UnknownCustomer(draft.customer_id)));
    }

    Ok(Ok(req))
}

impl From<Rejection> for EngineError {
    fn from(rejection: Rejection) -> Self {
        EngineError::Validation(rejection.to_string())
    }
}
