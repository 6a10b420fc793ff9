use std::{collections::BTreeMap, fmt, fs::File, io::BufReader, path::Path};

use serde_json::{json, Map, Value};

use crate::data::tables::{ShapedRecord, NODE_FIELDS, NODE_TAGS_FIELDS, WAY_FIELDS, WAY_NODES_FIELDS, WAY_TAGS_FIELDS};
use crate::errors::Result;

// Row values are strings, numeric columns accept a number or a string holding one.
const INTEGER_PATTERN: &str = r"^[+-]?[0-9]+$";
const FLOAT_PATTERN: &str = r"^[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?$";

/// A shaped record that did not pass validation. `field` is the top level
/// entry of the record that failed (`node`, `way_tags`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: String,
    pub detail: Value,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let detail = serde_json::to_string_pretty(&self.detail).map_err(|_| fmt::Error)?;
        write!(f, "\nElement of type '{}' has the following errors:\n{}", self.field, detail)
    }
}

pub trait Validator {
    fn validate(&self, record: &ShapedRecord) -> std::result::Result<(), ValidationError>;
}

/// JSON Schema document describing a shaped record, one property per table.
#[derive(Debug, Clone)]
pub struct Schema {
    pub document: Value,
}

impl Schema {
    pub fn load(path: &Path) -> Result<Schema> {
        let file = File::open(path)?;
        let document = serde_json::from_reader(BufReader::new(file))?;
        Ok(Schema { document })
    }

    /// Every column of the five tables, all required.
    pub fn osm_tables() -> Schema {
        fn column(column_type: &str) -> Value {
            match column_type {
                "integer" => json!({"anyOf": [
                    {"type": "integer"},
                    {"type": "string", "pattern": INTEGER_PATTERN},
                ]}),
                "float" => json!({"anyOf": [
                    {"type": "number"},
                    {"type": "string", "pattern": FLOAT_PATTERN},
                ]}),
                _ => json!({"type": "string"}),
            }
        }
        fn row(fields: &[&str], column_type: impl Fn(&str) -> &'static str) -> Value {
            let properties: Map<String, Value> = fields.iter()
                .map(|name| (name.to_string(), column(column_type(name))))
                .collect();
            json!({
                "type": "object",
                "properties": properties,
                "required": fields,
                "additionalProperties": false,
            })
        }
        fn rows(fields: &[&str], column_type: impl Fn(&str) -> &'static str) -> Value {
            json!({"type": "array", "items": row(fields, column_type)})
        }

        let attribute_type = |name: &str| match name {
            "id" | "uid" | "changeset" => "integer",
            "lat" | "lon" => "float",
            _ => "string",
        };
        let tag_type = |name: &str| if name == "id" { "integer" } else { "string" };

        Schema {
            document: json!({
                "$schema": "https://json-schema.org/draft/2020-12/schema",
                "type": "object",
                "properties": {
                    "node": row(&NODE_FIELDS, attribute_type),
                    "node_tags": rows(&NODE_TAGS_FIELDS, tag_type),
                    "way": row(&WAY_FIELDS, attribute_type),
                    "way_nodes": rows(&WAY_NODES_FIELDS, |_| "integer"),
                    "way_tags": rows(&WAY_TAGS_FIELDS, tag_type),
                },
                "additionalProperties": false,
            }),
        }
    }
}

pub struct SchemaValidator {
    validator: jsonschema::Validator,
}

impl SchemaValidator {
    /// Compiles the schema once, it is reused for every record.
    pub fn new(schema: &Schema) -> Result<SchemaValidator> {
        let validator = jsonschema::Validator::new(&schema.document)
            .map_err(|err| format!("Failed to compile schema: {err}"))?;
        Ok(SchemaValidator { validator })
    }
}

impl Validator for SchemaValidator {
    fn validate(&self, record: &ShapedRecord) -> std::result::Result<(), ValidationError> {
        let document = serde_json::to_value(record).map_err(|err| ValidationError {
            field: "record".to_string(),
            detail: json!([err.to_string()]),
        })?;

        // Messages grouped by table, then by the instance path inside the record.
        let mut failures: BTreeMap<String, BTreeMap<String, Vec<String>>> = BTreeMap::new();
        for err in self.validator.iter_errors(&document) {
            let path = err.instance_path().to_string();
            let field = path.split('/')
                .find(|segment| !segment.is_empty())
                .unwrap_or("record")
                .to_string();
            failures.entry(field)
                .or_default()
                .entry(path)
                .or_default()
                .push(err.to_string());
        }

        // The first failing table in name order is reported.
        match failures.into_iter().next() {
            None => Ok(()),
            Some((field, messages)) => Err(ValidationError {
                field,
                detail: json!(messages),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::osm::{Element, ElementData};
    use crate::shape::{ShapeConfig, Shaper};

    fn shape(element: Element) -> ShapedRecord {
        Shaper::new(&ShapeConfig::default()).unwrap().shape(&element).unwrap()
    }

    fn validator() -> SchemaValidator {
        SchemaValidator::new(&Schema::osm_tables()).unwrap()
    }

    fn full_node(id: &str) -> ElementData {
        ElementData::new(id)
            .with_attribute("lat", "47.6")
            .with_attribute("lon", "-122.3")
            .with_attribute("user", "sam")
            .with_attribute("uid", "12")
            .with_attribute("version", "2")
            .with_attribute("changeset", "345")
            .with_attribute("timestamp", "2016-01-01T00:00:00Z")
    }

    fn full_way(id: &str) -> ElementData {
        ElementData::new(id)
            .with_attribute("user", "sam")
            .with_attribute("uid", "12")
            .with_attribute("version", "2")
            .with_attribute("changeset", "345")
            .with_attribute("timestamp", "2016-01-01T00:00:00Z")
    }

    fn failing_paths(err: &ValidationError) -> Vec<String> {
        err.detail.as_object()
            .map(|paths| paths.keys().cloned().collect())
            .unwrap_or_default()
    }

    #[test]
    fn complete_node_passes() {
        let record = shape(Element::Node(full_node("1").with_tag("addr:postcode", "98104")));
        assert_eq!(validator().validate(&record), Ok(()));
    }

    #[test]
    fn placeholder_node_passes() {
        let record = shape(Element::Node(ElementData::new("1").with_tag("name", "x")));
        assert_eq!(validator().validate(&record), Ok(()));
    }

    #[test]
    fn complete_way_passes() {
        let record = shape(Element::Way(
            full_way("20").with_node_ref("1").with_tag("highway", "service").with_node_ref("2")
        ));
        assert_eq!(validator().validate(&record), Ok(()));
    }

    #[test]
    fn way_missing_changeset_fails() {
        let mut way = full_way("20");
        way.attributes.remove("changeset");
        let err = validator().validate(&shape(Element::Way(way))).unwrap_err();
        assert_eq!(err.field, "way");
        assert_eq!(failing_paths(&err), vec!["/way"]);
        assert!(err.detail["/way"][0].as_str().unwrap().contains("changeset"), "{}", err);
    }

    #[test]
    fn bad_integer_is_reported() {
        let record = shape(Element::Node(full_node("1").with_attribute("uid", "twelve")));
        let err = validator().validate(&record).unwrap_err();
        assert_eq!(err.field, "node");
        assert_eq!(failing_paths(&err), vec!["/node/uid"]);
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let record = shape(Element::Node(
            full_node("+7").with_attribute("lat", "-1.5e3").with_attribute("lon", ".25")
        ));
        assert_eq!(validator().validate(&record), Ok(()));

        let record = shape(Element::Node(full_node("1").with_attribute("lat", "47.6N")));
        assert_eq!(validator().validate(&record).unwrap_err().field, "node");
    }

    #[test]
    fn bad_list_row_is_reported_by_index() {
        let record = shape(Element::Way(
            full_way("abc").with_node_ref("1")
        ));
        let err = validator().validate(&record).unwrap_err();
        // "way" sorts before "way_nodes".
        assert_eq!(err.field, "way");
        assert_eq!(failing_paths(&err), vec!["/way/id"]);

        let mut schema = Schema::osm_tables();
        schema.document["properties"]["way"]["properties"]["id"] = json!({"type": "string"});
        let err = SchemaValidator::new(&schema).unwrap().validate(&record).unwrap_err();
        assert_eq!(err.field, "way_nodes");
        assert_eq!(failing_paths(&err), vec!["/way_nodes/0/id"]);
    }

    #[test]
    fn entry_without_table_is_rejected() {
        let schema = Schema {
            document: json!({"type": "object", "properties": {}, "additionalProperties": false}),
        };
        let record = shape(Element::Node(full_node("1")));
        let err = SchemaValidator::new(&schema).unwrap().validate(&record).unwrap_err();
        assert_eq!(err.field, "record");
    }

    #[test]
    fn invalid_schema_does_not_compile() {
        let schema = Schema { document: json!({"type": 12}) };
        assert!(SchemaValidator::new(&schema).is_err());
    }

    #[test]
    fn message_names_the_field() {
        let err = ValidationError {
            field: "node".to_string(),
            detail: json!({"/node/uid": ["\"twelve\" is not valid"]}),
        };
        let message = err.to_string();
        assert!(message.starts_with("\nElement of type 'node' has the following errors:\n"));
        assert!(message.contains("/node/uid"));
    }
}
