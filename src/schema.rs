//! Static entity descriptors.
//!
//! Every entity the tracker stores is described by one [`EntitySchema`]; the
//! generic [`Mapper`](crate::mapper::Mapper) reads nothing else.

/// Declares how an entity maps onto its collection.
#[derive(Debug, PartialEq, Eq)]
pub struct EntitySchema {
    pub collection: &'static str,
    /// Declared attributes. Anything else is rejected.
    pub fields: &'static [&'static str],
    /// Must be present, and non-null, at creation.
    pub required_fields: &'static [&'static str],
    /// Must not collide with another non-deleted document.
    pub unique_fields: &'static [&'static str],
    /// Matched by [`Mapper::search`](crate::mapper::Mapper::search).
    pub search_fields: &'static [&'static str],
    /// Business-level identifier, distinct from the store `_id`.
    pub id_field: &'static str,
    /// Field normalized to an [`AccessLevel`](crate::access::AccessLevel) on write.
    pub access_field: Option<&'static str>,
}

impl EntitySchema {
    pub fn declares(&self, field: &str) -> bool {
        self.fields.contains(&field)
    }
}

pub static ITEM: EntitySchema = EntitySchema {
    collection: "item",
    fields: &[
        "description",
        "name",
        "tags",
        "default_storage_location",
        "location_blacklist",
        "location_whitelist",
        "item_id",
    ],
    required_fields: &["name", "item_id", "tags"],
    unique_fields: &["item_id", "tags"],
    search_fields: &["name", "item_id", "description", "tags"],
    id_field: "item_id",
    access_field: None,
};

pub static SENSOR: EntitySchema = EntitySchema {
    collection: "sensor",
    fields: &["description", "name", "sensor_id", "tag", "types", "location"],
    required_fields: &["name", "sensor_id"],
    unique_fields: &["sensor_id"],
    search_fields: &["name", "sensor_id", "description", "tag"],
    id_field: "sensor_id",
    access_field: None,
};

pub static EVENT: EntitySchema = EntitySchema {
    collection: "event",
    fields: &[
        "received_timestamp",
        "event_timestamp",
        "event_details",
        "sensor_id",
        "item_id",
        "tag_id",
        "alert",
    ],
    required_fields: &[
        "received_timestamp",
        "event_timestamp",
        "event_details",
        "sensor_id",
        "tag_id",
    ],
    unique_fields: &["event_timestamp"],
    search_fields: &["event_details", "sensor_id", "item_id", "tag_id"],
    id_field: "event_timestamp",
    access_field: None,
};

pub static USER: EntitySchema = EntitySchema {
    collection: "user",
    fields: &["name", "email", "access", "picture"],
    required_fields: &["name", "email", "access"],
    unique_fields: &["email"],
    search_fields: &["name", "email"],
    id_field: "email",
    access_field: Some("access"),
};

pub static MAP: EntitySchema = EntitySchema {
    collection: "map",
    fields: &["name", "image_link", "description"],
    required_fields: &["name", "image_link"],
    unique_fields: &["image_link", "name"],
    search_fields: &["name", "description"],
    id_field: "name",
    access_field: None,
};

pub static TOKEN: EntitySchema = EntitySchema {
    collection: "token",
    fields: &["token", "user_data", "access_level", "last_modified"],
    required_fields: &["token", "user_data", "access_level"],
    unique_fields: &["token"],
    search_fields: &[],
    id_field: "token",
    access_field: Some("access_level"),
};
