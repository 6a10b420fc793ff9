use std::collections::BTreeMap;

/// One map feature as read from the .osm file.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Node(ElementData),
    Way(ElementData),
    /// Any other top level feature (relations). Carries the element name.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementData {
    pub id: String,
    /// Every XML attribute of the element, `id` included.
    pub attributes: BTreeMap<String, String>,
    /// Child annotations in document order.
    pub children: Vec<Child>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Child {
    /// `<tag k=".." v=".."/>`
    Tag { key: String, value: String },
    /// `<nd ref=".."/>`
    NodeRef { node_id: String },
}

#[cfg(test)]
impl ElementData {
    pub fn new(id: &str) -> Self {
        let mut attributes = BTreeMap::new();
        attributes.insert("id".to_string(), id.to_string());
        ElementData {
            id: id.to_string(),
            attributes,
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.children.push(Child::Tag {
            key: key.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn with_node_ref(mut self, node_id: &str) -> Self {
        self.children.push(Child::NodeRef {
            node_id: node_id.to_string(),
        });
        self
    }
}
