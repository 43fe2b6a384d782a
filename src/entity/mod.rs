//! Database entity models backing the document store.
//!
//! The document store is two tables: `document`, which holds the bodies of
//! every logical collection, and `expiry_index`, which records the
//! inactivity windows enforced on collections such as `token`.

/// Document rows, one per stored entity.
pub mod document;

/// Expiry index declarations.
pub mod expiry_index;
