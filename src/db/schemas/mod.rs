//! Database schemas for Waypoint
//!
//! Defines MongoDB document structures for locations and checklists.

pub mod checklist;
pub mod location;
pub mod metadata;

pub use checklist::{ChecklistDoc, ChecklistItem, ObjectRef, CHECKLIST_COLLECTION};
pub use location::{LocationDoc, LocationObject, LOCATION_COLLECTION};
pub use metadata::Metadata;
