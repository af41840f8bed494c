//! # Identifier Newtypes
//!
//! Integer identifiers for the registry's entities. Request ids are assigned
//! by the store and never change after creation; the other ids reference rows
//! owned by external CRUD collaborators (users, provinces, company types,
//! business-purpose activities, checklist templates).

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

macro_rules! int_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Build a validated identifier. Zero is reserved and rejected.
            pub fn new(raw: u64) -> Result<Self, ValidationError> {
                if raw == 0 {
                    return Err(ValidationError::InvalidId {
                        field: $field,
                        value: raw.to_string(),
                    });
                }
                Ok(Self(raw))
            }

            /// The raw integer value.
            pub fn get(&self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.trim().parse::<u64>().map_err(|_| ValidationError::InvalidId {
                    field: $field,
                    value: s.to_string(),
                })?;
                Self::new(raw)
            }
        }
    };
}

int_id!(
    /// Identity of a name-reservation request.
    RequestId,
    "request",
    "request_id"
);
int_id!(
    /// A user known to the external user/role directory.
    UserId,
    "user",
    "user_id"
);
int_id!(
    /// An administrative province (owner of submissions and fee rules).
    ProvinceId,
    "province",
    "province_id"
);
int_id!(
    /// A legal-entity type (LLC, joint-stock, sole proprietorship, ...).
    CompanyTypeId,
    "company_type",
    "company_type_id"
);
int_id!(
    /// A business-purpose activity from the activity catalogue.
    PurposeId,
    "purpose",
    "purpose_id"
);
int_id!(
    /// A checklist / attachment template item.
    ChecklistItemId,
    "checklist_item",
    "checklist_item_id"
);

/// Opaque reference to an artifact held by the external file store.
///
/// The registry never interprets the contents; it only records the path the
/// store returned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    /// Maximum accepted reference length.
    pub const MAX_LEN: usize = 1024;

    /// Wrap a store-provided reference. Blank or oversized references are rejected.
    pub fn new(path: impl Into<String>) -> Result<Self, ValidationError> {
        let path = crate::error::require_text("artifact_ref", &path.into(), Self::MAX_LEN)?;
        Ok(Self(path))
    }

    /// The reference as returned by the file store.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_id_rejected() {
        assert!(RequestId::new(0).is_err());
        assert!(ProvinceId::new(0).is_err());
    }

    #[test]
    fn ids_parse_from_str() {
        let id: RequestId = "42".parse().unwrap();
        assert_eq!(id.get(), 42);
        assert!("abc".parse::<UserId>().is_err());
        assert!("0".parse::<UserId>().is_err());
    }

    #[test]
    fn display_carries_namespace() {
        assert_eq!(RequestId(7).to_string(), "request:7");
        assert_eq!(ProvinceId(3).to_string(), "province:3");
    }

    #[test]
    fn ids_serialize_as_bare_integers() {
        assert_eq!(serde_json::to_string(&UserId(9)).unwrap(), "9");
        let parsed: CompanyTypeId = serde_json::from_str("12").unwrap();
        assert_eq!(parsed, CompanyTypeId(12));
    }

    #[test]
    fn artifact_ref_rejects_blank() {
        assert!(ArtifactRef::new("  ").is_err());
        assert_eq!(ArtifactRef::new("uploads/r1.pdf").unwrap().as_str(), "uploads/r1.pdf");
    }
}
