//! Checklist document schema
//!
//! A checklist is an ordered list of (location, selected objects) pairs built
//! by a user and persisted for later review or relay to a worker.

use bson::{oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for checklists
pub const CHECKLIST_COLLECTION: &str = "checklists";

/// Reference to one selected object
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectRef {
    /// Stable code identifying the object
    pub cr_code: String,
    /// Display label as it was at selection time
    #[serde(default)]
    pub label: String,
}

/// One checklist entry: a location and the objects picked there
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct ChecklistItem {
    pub location: String,
    #[serde(default)]
    pub objects: Vec<ObjectRef>,
}

/// Checklist document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ChecklistDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Ordered checklist entries
    #[serde(default)]
    pub items: Vec<ChecklistItem>,
}

impl IntoIndexes for ChecklistDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        Vec::new()
    }
}

impl MutMetadata for ChecklistDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checklist_doc_round_trip() {
        let doc = ChecklistDoc {
            _id: None,
            metadata: Metadata::default(),
            items: vec![ChecklistItem {
                location: "Warehouse A".into(),
                objects: vec![ObjectRef {
                    cr_code: "CR-001".into(),
                    label: "Fire extinguisher".into(),
                }],
            }],
        };

        let bson = bson::to_document(&doc).unwrap();
        let back: ChecklistDoc = bson::from_document(bson).unwrap();
        assert_eq!(back.items, doc.items);
    }

    #[test]
    fn test_items_default_when_missing() {
        let json = r#"{"metadata": {}}"#;
        let doc: ChecklistDoc = serde_json::from_str(json).unwrap();
        assert!(doc.items.is_empty());
    }
}
