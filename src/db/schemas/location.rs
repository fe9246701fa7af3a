//! Location document schema
//!
//! One document per physical location, carrying the list of objects that can
//! be picked onto a checklist at that location.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for locations
pub const LOCATION_COLLECTION: &str = "locations";

/// One selectable object at a location
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct LocationObject {
    /// Stable code identifying the object
    pub cr_code: String,
    /// Display label
    pub label: String,
}

/// Location document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct LocationDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Unique location name
    pub name: String,

    /// Objects that can be checked at this location
    #[serde(default)]
    pub object_list: Vec<LocationObject>,
}

impl IntoIndexes for LocationDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "name": 1 },
            Some(IndexOptions::builder().unique(true).build()),
        )]
    }
}

impl MutMetadata for LocationDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_doc_round_trip() {
        let loc = LocationDoc {
            _id: None,
            metadata: Metadata::default(),
            name: "Warehouse A".into(),
            object_list: vec![LocationObject {
                cr_code: "CR-001".into(),
                label: "Fire extinguisher".into(),
            }],
        };

        let bson = bson::to_document(&loc).unwrap();
        let back: LocationDoc = bson::from_document(bson).unwrap();
        assert_eq!(back.name, "Warehouse A");
        assert_eq!(back.object_list, loc.object_list);
    }
}
