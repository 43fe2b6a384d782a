//! Expiry index entity model.
//!
//! An expiry index declares that documents of one collection expire once the
//! timestamp stored under `field` is older than `expire_after_secs`.

use sea_orm::entity::prelude::*;

/// | Column            | Type               | Description                          |
/// |-------------------|--------------------|--------------------------------------|
/// | name              | TEXT (Primary Key) | Index name, e.g. `token_last_modified_ttl` |
/// | collection        | TEXT               | Collection the index applies to      |
/// | field             | TEXT               | Timestamp field inside the document  |
/// | expire_after_secs | BIGINT             | Inactivity window in seconds         |
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "expiry_index")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub collection: String,
    #[sea_orm(column_type = "Text")]
    pub field: String,
    pub expire_after_secs: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
