use std::{borrow::Cow, collections::BTreeMap};

use serde::Serialize;

// Column orders match the SQL table definitions the CSVs are loaded into.
pub const NODE_FIELDS: [&str; 8] = ["id", "lat", "lon", "user", "uid", "version", "changeset", "timestamp"];
pub const NODE_TAGS_FIELDS: [&str; 4] = ["id", "key", "value", "type"];
pub const WAY_FIELDS: [&str; 6] = ["id", "user", "uid", "version", "changeset", "timestamp"];
pub const WAY_TAGS_FIELDS: [&str; 4] = ["id", "key", "value", "type"];
pub const WAY_NODES_FIELDS: [&str; 3] = ["id", "node_id", "position"];

/// A row that can be written under a header by looking up each column name.
pub trait TableRow {
    fn cell(&self, field: &str) -> Option<Cow<'_, str>>;
}

/// Attribute values of a node or way keyed by field name.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct AttributeRow(BTreeMap<String, String>);

impl AttributeRow {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }
}

impl FromIterator<(String, String)> for AttributeRow {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        AttributeRow(iter.into_iter().collect())
    }
}

impl TableRow for AttributeRow {
    fn cell(&self, field: &str) -> Option<Cow<'_, str>> {
        self.get(field).map(Cow::Borrowed)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TagRow {
    pub id: String,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub tag_type: String,
}

impl TableRow for TagRow {
    fn cell(&self, field: &str) -> Option<Cow<'_, str>> {
        match field {
            "id" => Some(Cow::Borrowed(&self.id)),
            "key" => Some(Cow::Borrowed(&self.key)),
            "value" => Some(Cow::Borrowed(&self.value)),
            "type" => Some(Cow::Borrowed(&self.tag_type)),
            _ => None,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WayNodeRow {
    pub id: String,
    pub node_id: String,
    pub position: usize,
}

impl TableRow for WayNodeRow {
    fn cell(&self, field: &str) -> Option<Cow<'_, str>> {
        match field {
            "id" => Some(Cow::Borrowed(&self.id)),
            "node_id" => Some(Cow::Borrowed(&self.node_id)),
            "position" => Some(Cow::Owned(self.position.to_string())),
            _ => None,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NodeShape {
    pub node: AttributeRow,
    pub node_tags: Vec<TagRow>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WayShape {
    pub way: AttributeRow,
    pub way_nodes: Vec<WayNodeRow>,
    pub way_tags: Vec<TagRow>,
}

/// Output of shaping one element. Serializes to the same layout the schema
/// describes: `{"node": .., "node_tags": ..}` or `{"way": .., "way_nodes": .., "way_tags": ..}`.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ShapedRecord {
    Node(NodeShape),
    Way(WayShape),
}
