use common::{CustomerId, MenuItemId};
use serde::{Deserialize, Serialize};

fn empty_payload() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// An inbound order as handed over by the HTTP layer: field-validated but
/// not yet checked against the menu, stock, or customers, and not priced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDraft {
    pub customer_id: CustomerId,
    /// Opaque free-form payload, persisted without interpretation.
    #[serde(default = "empty_payload")]
    pub special_instructions: serde_json::Value,
    #[serde(default)]
    pub items: Vec<OrderItemDraft>,
}

/// One requested line item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemDraft {
    pub menu_item_id: MenuItemId,
    pub quantity: u32,
    /// Opaque free-form payload, persisted without interpretation.
    #[serde(default = "empty_payload")]
    pub customizations: serde_json::Value,
}

impl OrderDraft {
    /// Returns the (menu item, quantity) pairs of the draft's lines.
    pub fn lines(&self) -> Vec<(MenuItemId, u32)> {
        self.items
            .iter()
            .map(|item| (item.menu_item_id, item.quantity))
            .collect()
    }
}
