//! Content: a concrete quantity of one SKU, the unit moved between storages.

use crate::id::ContentId;
use crate::qty::Qty;
use crate::registry::ResourceUom;
use serde::{Deserialize, Serialize};

/// Errors constructing content.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    /// Quantities must be strictly positive; a zero or negative unit of
    /// material is meaningless to move or store.
    #[error("content quantity must be positive, got {qty}")]
    NonPositiveQty { qty: Qty },
}

/// A quantity of one [`ResourceUom`], carrying a process-unique identity.
///
/// Identity is assigned in the constructor and never changes; splitting
/// produces new identities. Two contents are the same unit only if their ids
/// match, regardless of SKU and quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    id: ContentId,
    resource_uom: ResourceUom,
    qty: Qty,
}

impl Content {
    /// Create content with a fresh identity. Rejects `qty <= 0`.
    pub fn new(resource_uom: ResourceUom, qty: Qty) -> Result<Self, ContentError> {
        if qty <= Qty::ZERO {
            return Err(ContentError::NonPositiveQty { qty });
        }
        Ok(Self {
            id: ContentId::next(),
            resource_uom,
            qty,
        })
    }

    /// Clone this content's SKU with a different quantity and a fresh identity.
    pub fn with_qty(&self, qty: Qty) -> Result<Self, ContentError> {
        Self::new(self.resource_uom, qty)
    }

    pub fn id(&self) -> ContentId {
        self.id
    }

    pub fn resource_uom(&self) -> ResourceUom {
        self.resource_uom
    }

    pub fn qty(&self) -> Qty {
        self.qty
    }

    /// Whether `other` carries the same SKU (resource + UoM), ignoring qty.
    pub fn matches_sku(&self, other: &Content) -> bool {
        self.resource_uom == other.resource_uom
    }

    /// Split off `keep` from this content: returns `(kept, remainder)`, both
    /// fresh identities, whose quantities sum exactly to the original.
    /// `keep` must be positive and strictly less than the current quantity.
    pub fn split(&self, keep: Qty) -> Result<(Content, Content), ContentError> {
        if keep <= Qty::ZERO {
            return Err(ContentError::NonPositiveQty { qty: keep });
        }
        let remainder = self.qty - keep;
        if remainder <= Qty::ZERO {
            return Err(ContentError::NonPositiveQty { qty: remainder });
        }
        Ok((
            Self::new(self.resource_uom, keep)?,
            Self::new(self.resource_uom, remainder)?,
        ))
    }

    /// Absorb another content of the same SKU. Quantities add exactly; the
    /// absorbed identity is retired with the consumed value.
    pub fn merge(&mut self, other: Content) {
        debug_assert_eq!(self.resource_uom, other.resource_uom);
        self.qty += other.qty;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{ResourceId, UomId};
    use crate::qty::qty;

    fn sku() -> ResourceUom {
        ResourceUom::new(ResourceId(0), UomId(0))
    }

    #[test]
    fn rejects_zero_and_negative_qty() {
        assert!(matches!(
            Content::new(sku(), Qty::ZERO),
            Err(ContentError::NonPositiveQty { .. })
        ));
        assert!(Content::new(sku(), qty(-1.0)).is_err());
    }

    #[test]
    fn identity_is_unique_per_construction() {
        let a = Content::new(sku(), qty(3.0)).unwrap();
        let b = Content::new(sku(), qty(3.0)).unwrap();
        assert_ne!(a.id(), b.id());
        assert!(a.matches_sku(&b));
    }

    #[test]
    fn split_conserves_quantity() {
        let c = Content::new(sku(), qty(9.0)).unwrap();
        let (kept, rest) = c.split(qty(7.0)).unwrap();
        assert_eq!(kept.qty(), qty(7.0));
        assert_eq!(rest.qty(), qty(2.0));
        assert_eq!(kept.qty() + rest.qty(), c.qty());
    }

    #[test]
    fn split_rejects_whole_or_over() {
        let c = Content::new(sku(), qty(5.0)).unwrap();
        assert!(c.split(qty(5.0)).is_err());
        assert!(c.split(qty(6.0)).is_err());
        assert!(c.split(Qty::ZERO).is_err());
    }

    #[test]
    fn merge_adds_quantities() {
        let mut a = Content::new(sku(), qty(2.5)).unwrap();
        let b = Content::new(sku(), qty(1.5)).unwrap();
        a.merge(b);
        assert_eq!(a.qty(), qty(4.0));
    }
}
