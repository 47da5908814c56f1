//! Record types for the two harvested collections

use std::fmt;

/// One discovered entity, produced by a list-page row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogRecord {
    /// External identifier taken from the detail link's query string
    pub id: String,
    pub standard_name: String,
    pub city: String,
    pub county: String,
    pub short_name: String,
    pub alias_name: String,
    pub used_name: String,
}

/// Extended fields for a catalog entity, keyed by the same id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailRecord {
    pub id: String,
    /// Romanized form of the name
    pub rome: String,
    pub use_time: String,
    pub full_name: String,
    pub origin: String,
    pub describe: String,
    pub remark: String,
}

/// The two record collections held by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Catalog,
    Detail,
}

impl Collection {
    pub fn table_name(&self) -> &'static str {
        match self {
            Self::Catalog => "catalog_records",
            Self::Detail => "detail_records",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Catalog => write!(f, "catalog"),
            Self::Detail => write!(f, "detail"),
        }
    }
}
