//! Views of inventory data consumed by the cache backfill.
//!
//! The inventory model itself lives elsewhere; these are the only fields the
//! suggestion cache reads from it.

use crate::{LarderResult, LocationId, TenantId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The suggestion-relevant fields of one inventory item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub category: Option<String>,
    pub unit: Option<String>,
    pub location_id: Option<LocationId>,
}

impl InventoryRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_location(mut self, location_id: LocationId) -> Self {
        self.location_id = Some(location_id);
        self
    }
}

/// One node of the household location tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationNode {
    pub id: LocationId,
    pub name: String,
    pub parent_id: Option<LocationId>,
}

impl LocationNode {
    pub fn root(id: LocationId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id: None,
        }
    }

    pub fn child(id: LocationId, name: impl Into<String>, parent_id: LocationId) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id: Some(parent_id),
        }
    }
}

/// Read access to a tenant's inventory items.
pub trait InventorySource: Send + Sync {
    /// Every inventory record belonging to `tenant_id`.
    fn records(&self, tenant_id: TenantId) -> LarderResult<Vec<InventoryRecord>>;
}

/// Lookup of location tree nodes.
pub trait LocationGraph: Send + Sync {
    /// The node with this id, or `None` if it does not exist.
    fn node(&self, id: LocationId) -> LarderResult<Option<LocationNode>>;
}

impl<T: InventorySource + ?Sized> InventorySource for &T {
    fn records(&self, tenant_id: TenantId) -> LarderResult<Vec<InventoryRecord>> {
        (**self).records(tenant_id)
    }
}

impl<T: InventorySource + ?Sized> InventorySource for Arc<T> {
    fn records(&self, tenant_id: TenantId) -> LarderResult<Vec<InventoryRecord>> {
        (**self).records(tenant_id)
    }
}

impl<T: LocationGraph + ?Sized> LocationGraph for &T {
    fn node(&self, id: LocationId) -> LarderResult<Option<LocationNode>> {
        (**self).node(id)
    }
}

impl<T: LocationGraph + ?Sized> LocationGraph for Arc<T> {
    fn node(&self, id: LocationId) -> LarderResult<Option<LocationNode>> {
        (**self).node(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let record = InventoryRecord::new()
            .with_category("Food")
            .with_unit("kg")
            .with_location(LocationId::new(3));
        assert_eq!(record.category.as_deref(), Some("Food"));
        assert_eq!(record.unit.as_deref(), Some("kg"));
        assert_eq!(record.location_id, Some(LocationId::new(3)));
    }

    #[test]
    fn test_location_node_constructors() {
        let root = LocationNode::root(LocationId::new(1), "Kitchen");
        let child = LocationNode::child(LocationId::new(2), "Fridge", root.id);
        assert!(root.parent_id.is_none());
        assert_eq!(child.parent_id, Some(LocationId::new(1)));
    }
}
