use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Entity Identities
// ============================================================================
//
// Aggregates reference each other by identity only. Each identity is a
// distinct newtype so a VariantId can never be passed where a ProductId is
// expected.
//
// ============================================================================

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Uuid {
                id.0
            }
        }
    };
}

entity_id!(
    /// Catalog product (aggregate root)
    ProductId
);
entity_id!(
    /// Purchasable SKU owned by a product
    VariantId
);
entity_id!(
    /// Catalog-level attribute axis such as "color"
    VariationTypeId
);
entity_id!(
    /// One allowed value of a variation type
    VariantOptionId
);
entity_id!(ImageId);
entity_id!(CategoryId);
entity_id!(
    /// Placed order (aggregate root)
    OrderId
);
entity_id!(PurchaserId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(ProductId::new(), ProductId::new());
    }

    #[test]
    fn test_id_serializes_as_plain_uuid() {
        let uuid = Uuid::new_v4();
        let id = VariantId::from_uuid(uuid);

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", uuid));

        let back: VariantId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert_eq!(back.as_uuid(), uuid);
    }
}
