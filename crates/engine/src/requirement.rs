//! Ingredient requirements resolved from menu recipes.

use std::collections::{BTreeMap, HashMap};

use common::{InventoryId, MenuItemId};
use sqlx::PgConnection;
use store::menu;

/// A mapping from ingredient identity to the quantity needed to fulfill an
/// order's items. Kept sorted so iteration order (and everything derived
/// from it, like batch reports) is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Requirement(BTreeMap<InventoryId, f64>);

impl Requirement {
    /// Adds a quantity for an ingredient, accumulating duplicates.
    pub fn add(&mut self, id: InventoryId, quantity: f64) {
        *self.0.entry(id).or_insert(0.0) += quantity;
    }

    /// Returns the required quantity for an ingredient, zero if untouched.
    pub fn get(&self, id: InventoryId) -> f64 {
        self.0.get(&id).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates ingredients in ascending ID order.
    pub fn iter(&self) -> impl Iterator<Item = (InventoryId, f64)> + '_ {
        self.0.iter().map(|(id, qty)| (*id, *qty))
    }

    /// Returns the touched ingredient IDs in ascending order.
    pub fn ids(&self) -> Vec<InventoryId> {
        self.0.keys().copied().collect()
    }

    /// Returns the requirement as (ingredient, quantity) pairs.
    pub fn to_pairs(&self) -> Vec<(InventoryId, f64)> {
        self.iter().collect()
    }
}

/// Resolves the ingredient requirement for the given (menu item, quantity)
/// lines: each recipe edge's quantity times the ordered unit count,
/// accumulated across all lines. Pure read over the recipe table.
pub async fn resolve(
    conn: &mut PgConnection,
    lines: &[(MenuItemId, u32)],
) -> store::Result<Requirement> {
    let mut requirement = Requirement::default();
    for (menu_item_id, quantity) in lines {
        for edge in menu::ingredients_for(&mut *conn, *menu_item_id).await? {
            requirement.add(edge.inventory_id, edge.quantity * f64::from(*quantity));
        }
    }
    Ok(requirement)
}

/// Returns the first ingredient whose stock cannot cover the requirement.
///
/// Stock must be strictly greater than the required quantity: an exact
/// match counts as insufficient. Ingredients missing from `levels` fail
/// closed as if their stock were zero.
pub fn first_shortfall(
    requirement: &Requirement,
    levels: &HashMap<InventoryId, f64>,
) -> Option<InventoryId> {
    requirement.iter().find_map(|(id, required)| {
        match levels.get(&id) {
            Some(available) if *available > required => None,
            _ => Some(id),
        }
    })
}
