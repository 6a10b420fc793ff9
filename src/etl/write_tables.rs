use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::data::tables::{ShapedRecord, TableRow, NODE_TAGS_FIELDS, WAY_NODES_FIELDS, WAY_TAGS_FIELDS};
use crate::errors::Result;

/// File names of the five tables inside the destination directory.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TableFiles {
    pub nodes: String,
    pub node_tags: String,
    pub ways: String,
    pub way_nodes: String,
    pub way_tags: String,
}

impl Default for TableFiles {
    fn default() -> Self {
        TableFiles {
            nodes: "nodes.csv".to_string(),
            node_tags: "nodes_tags.csv".to_string(),
            ways: "ways.csv".to_string(),
            way_nodes: "ways_nodes.csv".to_string(),
            way_tags: "ways_tags.csv".to_string(),
        }
    }
}

impl TableFiles {
    pub fn paths(&self, dir: &Path) -> [PathBuf; 5] {
        [&self.nodes, &self.node_tags, &self.ways, &self.way_nodes, &self.way_tags]
            .map(|name| dir.join(name))
    }
}

/// Quotes a cell when it contains the delimiter, a quote or a line break.
fn escape_cell(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// One CSV file with a fixed header. Rows are written by looking up each
/// header column, absent columns become empty cells.
pub struct TableWriter<W: Write> {
    out: W,
    fields: Vec<String>,
    rows: usize,
}

impl<W: Write> TableWriter<W> {
    pub fn new(mut out: W, fields: &[String]) -> Result<TableWriter<W>> {
        let header: Vec<Cow<str>> = fields.iter().map(|field| escape_cell(field)).collect();
        writeln!(out, "{}", header.join(","))?;
        Ok(TableWriter {
            out,
            fields: fields.to_vec(),
            rows: 0,
        })
    }

    pub fn write_row(&mut self, row: &impl TableRow) -> Result<()> {
        let cells: Vec<String> = self.fields.iter()
            .map(|field| match row.cell(field) {
                Some(value) => escape_cell(&value).into_owned(),
                None => String::new(),
            })
            .collect();
        writeln!(self.out, "{}", cells.join(","))?;
        self.rows += 1;
        Ok(())
    }

    pub fn write_rows<'r, T: TableRow + 'r>(&mut self, rows: impl IntoIterator<Item = &'r T>) -> Result<()> {
        for row in rows {
            self.write_row(row)?;
        }
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn flush(&mut self) -> Result<()> {
        Ok(self.out.flush()?)
    }
}

fn to_strings(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

/// The five output tables of a run.
pub struct TableWriters<W: Write> {
    pub nodes: TableWriter<W>,
    pub node_tags: TableWriter<W>,
    pub ways: TableWriter<W>,
    pub way_nodes: TableWriter<W>,
    pub way_tags: TableWriter<W>,
}

impl TableWriters<BufWriter<File>> {
    pub fn create(dir: &Path, files: &TableFiles, node_fields: &[String], way_fields: &[String]) -> Result<Self> {
        let [nodes, node_tags, ways, way_nodes, way_tags] = files.paths(dir);
        let open = |path: PathBuf| -> Result<BufWriter<File>> { Ok(BufWriter::new(File::create(path)?)) };

        Ok(TableWriters {
            nodes: TableWriter::new(open(nodes)?, node_fields)?,
            node_tags: TableWriter::new(open(node_tags)?, &to_strings(&NODE_TAGS_FIELDS))?,
            ways: TableWriter::new(open(ways)?, way_fields)?,
            way_nodes: TableWriter::new(open(way_nodes)?, &to_strings(&WAY_NODES_FIELDS))?,
            way_tags: TableWriter::new(open(way_tags)?, &to_strings(&WAY_TAGS_FIELDS))?,
        })
    }
}

impl<W: Write> TableWriters<W> {
    pub fn write_record(&mut self, record: &ShapedRecord) -> Result<()> {
        match record {
            ShapedRecord::Node(shape) => {
                self.nodes.write_row(&shape.node)?;
                self.node_tags.write_rows(&shape.node_tags)?;
            },
            ShapedRecord::Way(shape) => {
                self.ways.write_row(&shape.way)?;
                self.way_nodes.write_rows(&shape.way_nodes)?;
                self.way_tags.write_rows(&shape.way_tags)?;
            },
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.nodes.flush()?;
        self.node_tags.flush()?;
        self.ways.flush()?;
        self.way_nodes.flush()?;
        self.way_tags.flush()
    }
}
