//! Opaque identifiers for graph entities.
//!
//! Ids are string-backed so a structured export path can transparently
//! take the place of a physical id during serialization.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Mint a fresh id.
            pub fn generate() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::new_v4().simple()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

define_id!(
    /// Identifies a base (a grouping of sources).
    BaseId, "b"
);
define_id!(
    /// Identifies a physical database connection.
    SourceId, "src"
);
define_id!(
    /// Identifies a logical table or view.
    ModelId, "md"
);
define_id!(
    /// Identifies a column of a model.
    ColumnId, "col"
);
define_id!(
    /// Identifies a view over a model.
    ViewId, "vw"
);
define_id!(
    /// Identifies a filter node.
    FilterId, "fl"
);
define_id!(
    /// Identifies a sort entry.
    SortId, "so"
);
