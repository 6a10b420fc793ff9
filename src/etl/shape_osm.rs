use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{debug, error, info};

use crate::UserConfig;
use crate::data::osm::Element;
use crate::data::tables::ShapedRecord;
use crate::errors::{Error, Result};
use crate::etl::Etl;
use crate::etl::read_osm::{OsmElements, OsmSource};
use crate::etl::write_tables::{TableFiles, TableWriters};
use crate::shape::Shaper;
use crate::validate::{Schema, SchemaValidator, Validator};

pub const ETL_NAME: &str = "shape_osm";

type SharedValidator = Rc<dyn Validator>;

/// Lazily shapes (and optionally validates) every element of the source.
/// Stops at the first read or validation error.
pub struct ShapedRecords<I> {
    elements: I,
    shaper: Shaper,
    validator: Option<SharedValidator>,
    skipped: usize,
}

impl<I: Iterator<Item = Result<Element>>> Iterator for ShapedRecords<I> {
    type Item = Result<ShapedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let element = match self.elements.next()? {
                Ok(element) => element,
                Err(err) => return Some(Err(err)),
            };

            let (id, record) = match &element {
                Element::Node(data) | Element::Way(data) => (data.id.as_str(), self.shaper.shape(&element)),
                Element::Other(name) => {
                    debug!(element = name.as_str(); "Skipping element without tables");
                    (name.as_str(), None)
                },
            };
            let Some(record) = record else {
                self.skipped += 1;
                continue;
            };

            if let Some(validator) = &self.validator {
                if let Err(err) = validator.validate(&record) {
                    error!(id = id, field = err.field.as_str(); "Shaped element failed validation");
                    return Some(Err(err.into()));
                }
            }
            return Some(Ok(record));
        }
    }
}

#[derive(Default)]
struct LoadCounts {
    nodes: usize,
    ways: usize,
}

pub struct ShapeOsmEtl {
    data_path: PathBuf,
    shaper: Shaper,
    validator: Option<SharedValidator>,
    tables: TableFiles,
    node_fields: Vec<String>,
    way_fields: Vec<String>,
    show_progress: bool,
}

impl ShapeOsmEtl {
    pub fn new(config: &UserConfig) -> Result<ShapeOsmEtl> {
        let validator: Option<SharedValidator> = if config.validate {
            let schema = match &config.schema_path {
                Some(path) => Schema::load(Path::new(path))?,
                None => Schema::osm_tables(),
            };
            Some(Rc::new(SchemaValidator::new(&schema)?))
        } else {
            None
        };

        Ok(ShapeOsmEtl {
            data_path: PathBuf::from(&config.data_path),
            shaper: Shaper::new(&config.shape)?,
            validator,
            tables: config.tables.clone(),
            node_fields: config.shape.node_fields.clone(),
            way_fields: config.shape.way_fields.clone(),
            show_progress: config.show_progress,
        })
    }

    fn write_records(
        &self,
        writers: &mut TableWriters<impl std::io::Write>,
        records: &mut <Self as Etl>::Output,
        counts: &mut LoadCounts,
    ) -> Result<()> {
        let iter: Box<dyn Iterator<Item = Result<ShapedRecord>> + '_> = if self.show_progress {
            Box::new(tqdm::tqdm(records.by_ref()))
        } else {
            Box::new(records.by_ref())
        };

        for record in iter {
            let record = record?;
            match &record {
                ShapedRecord::Node(_) => counts.nodes += 1,
                ShapedRecord::Way(_) => counts.ways += 1,
            }
            writers.write_record(&record)?;
        }
        writers.flush()
    }

    /// Half written tables must not be picked up as cached by the next run.
    /// Returns the load error, extended with the cleanup error if removal fails.
    fn discard_partial_tables(&self, dir: &Path, err: Error) -> Error {
        error!(etl_name = ETL_NAME, err = err.message.as_str(); "Load failed, removing partial tables");
        match self.clean(dir) {
            Ok(()) => err,
            Err(clean_err) => Error::from(format!(
                "{} (removing partial tables also failed: {})", err.message, clean_err.message
            )),
        }
    }
}

impl Etl for ShapeOsmEtl {
    type Input = OsmElements<OsmSource>;
    type Output = ShapedRecords<OsmElements<OsmSource>>;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        for path in self.tables.paths(dir) {
            if !path.try_exists()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        for path in self.tables.paths(dir) {
            if path.try_exists()? {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    fn extract(&mut self, _dir: &Path) -> Result<Self::Input> {
        info!(etl_name = ETL_NAME, data_path = self.data_path.display().to_string().as_str(); "Opening OSM file");
        OsmElements::open(&self.data_path)
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        Ok(ShapedRecords {
            elements: input,
            shaper: self.shaper.clone(),
            validator: self.validator.clone(),
            skipped: 0,
        })
    }

    fn load(&mut self, dir: &Path, mut output: Self::Output) -> Result<()> {
        let mut writers = TableWriters::create(dir, &self.tables, &self.node_fields, &self.way_fields)?;
        let mut counts = LoadCounts::default();

        if let Err(err) = self.write_records(&mut writers, &mut output, &mut counts) {
            drop(writers);
            return Err(self.discard_partial_tables(dir, err));
        }

        info!(
            etl_name = ETL_NAME,
            nodes = counts.nodes,
            ways = counts.ways,
            node_tags = writers.node_tags.rows(),
            way_nodes = writers.way_nodes.rows(),
            way_tags = writers.way_tags.rows(),
            skipped = output.skipped;
            "Tables written"
        );
        Ok(())
    }
}
