//! Document entity model for Sea-ORM database interaction.
//!
//! Every logical collection (item, sensor, event, user, map, token) shares
//! this one table. A row is a single document; the collection it belongs to
//! is a plain column and the document body is an opaque encoded blob.

use sea_orm::entity::prelude::*;

/// Sea-ORM entity model representing one stored document.
///
/// # Database Schema
///
/// | Column      | Type                    | Description                                |
/// |-------------|-------------------------|--------------------------------------------|
/// | seq         | INTEGER (Primary Key)   | Auto-increment insertion sequence          |
/// | id          | TEXT (Unique)           | Store-assigned document id (UUID)          |
/// | collection  | TEXT                    | Logical collection name                    |
/// | data        | BYTEA / BLOB            | MessagePack encoded document body          |
/// | created_at  | TIMESTAMPTZ             | Insertion time                             |
/// | updated_at  | TIMESTAMPTZ             | Time of the last replace                   |
///
/// The body never contains `_id`; it is re-attached from the `id` column
/// when a document is decoded.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "document")]
pub struct Model {
    /// Insertion sequence. Reads return documents in this order.
    #[sea_orm(primary_key)]
    pub seq: i32,

    /// The store-assigned identifier, a hyphenated UUID string.
    #[sea_orm(column_type = "Text", unique)]
    pub id: String,

    /// Name of the logical collection this document belongs to.
    #[sea_orm(column_type = "Text", indexed)]
    pub collection: String,

    /// The MessagePack-serialized document body.
    pub data: Vec<u8>,

    /// When the document was inserted.
    pub created_at: DateTimeWithTimeZone,

    /// When the document body was last replaced.
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
