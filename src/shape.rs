pub mod classify;
pub mod postcode;

use serde::Deserialize;

use crate::data::osm::{Child, Element, ElementData};
use crate::data::tables::{
    AttributeRow, NodeShape, ShapedRecord, TagRow, WayNodeRow, WayShape, NODE_FIELDS, WAY_FIELDS,
};
use crate::errors::Result;

use self::classify::TagClassifier;
use self::postcode::PostcodeNormalizer;

/// Rules for turning elements into table rows. Every field has a default, so
/// a config file only needs to list what it overrides.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ShapeConfig {
    pub node_fields: Vec<String>,
    pub way_fields: Vec<String>,
    /// Stored for node fields missing from the element.
    pub placeholder: String,
    pub default_tag_type: String,
    pub problem_chars: String,
    pub lower_colon: String,
    pub postcode_key: String,
    pub postcode_pattern: String,
}

impl Default for ShapeConfig {
    fn default() -> Self {
        ShapeConfig {
            node_fields: NODE_FIELDS.iter().map(|f| f.to_string()).collect(),
            way_fields: WAY_FIELDS.iter().map(|f| f.to_string()).collect(),
            placeholder: "9999999".to_string(),
            default_tag_type: "regular".to_string(),
            problem_chars: r#"[=+/&<>;'"?%#$@,. \t\r\n]"#.to_string(),
            lower_colon: r"^[a-z_]+:[a-z_]+".to_string(),
            postcode_key: "postcode".to_string(),
            postcode_pattern: r"[0-9]{5}".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Shaper {
    node_fields: Vec<String>,
    way_fields: Vec<String>,
    placeholder: String,
    classifier: TagClassifier,
    normalizer: PostcodeNormalizer,
}

impl Shaper {
    pub fn new(config: &ShapeConfig) -> Result<Shaper> {
        Ok(Shaper {
            node_fields: config.node_fields.clone(),
            way_fields: config.way_fields.clone(),
            placeholder: config.placeholder.clone(),
            classifier: TagClassifier::new(&config.problem_chars, &config.lower_colon, &config.default_tag_type)?,
            normalizer: PostcodeNormalizer::new(&config.postcode_key, &config.postcode_pattern)?,
        })
    }

    /// Returns `None` for element kinds that have no tables.
    pub fn shape(&self, element: &Element) -> Option<ShapedRecord> {
        match element {
            Element::Node(node) => Some(ShapedRecord::Node(self.shape_node(node))),
            Element::Way(way) => Some(ShapedRecord::Way(self.shape_way(way))),
            Element::Other(_) => None,
        }
    }

    fn shape_node(&self, node: &ElementData) -> NodeShape {
        // Missing node fields get the placeholder, missing way fields are left out.
        let attributes = self.node_fields.iter()
            .map(|field| {
                let value = node.attributes.get(field)
                    .cloned()
                    .unwrap_or_else(|| self.placeholder.clone());
                (field.clone(), value)
            })
            .collect();

        let tags = node.children.iter()
            .filter_map(|child| match child {
                Child::Tag { key, value } => self.tag_row(&node.id, key, value),
                Child::NodeRef { .. } => None,
            })
            .collect();

        NodeShape {
            node: attributes,
            node_tags: tags,
        }
    }

    fn shape_way(&self, way: &ElementData) -> WayShape {
        let attributes: AttributeRow = way.attributes.iter()
            .filter(|(name, _)| self.way_fields.contains(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let mut way_nodes = Vec::new();
        let mut tags = Vec::new();
        for child in &way.children {
            match child {
                Child::Tag { key, value } => tags.extend(self.tag_row(&way.id, key, value)),
                Child::NodeRef { node_id } => {
                    let position = way_nodes.len();
                    way_nodes.push(WayNodeRow {
                        id: way.id.clone(),
                        node_id: node_id.clone(),
                        position,
                    });
                },
            }
        }

        WayShape {
            way: attributes,
            way_nodes,
            way_tags: tags,
        }
    }

    fn tag_row(&self, id: &str, raw_key: &str, raw_value: &str) -> Option<TagRow> {
        let classified = self.classifier.classify(raw_key)?;
        let value = self.normalizer.normalize(&classified.key, raw_value);
        Some(TagRow {
            id: id.to_string(),
            key: classified.key,
            value,
            tag_type: classified.tag_type,
        })
    }
}
