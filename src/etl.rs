pub mod read_osm;
pub mod shape_osm;
pub mod write_tables;

use std::path::Path;
use log::{info, error};

use crate::errors::Result;

/// Logs a failed phase with the stage name before handing the error back.
fn log_failure<T>(etl_name: &str, phase: &str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        error!(etl_name = etl_name, phase = phase, err = err.message.as_str(); "Phase failed with error");
    }
    result
}

/// A batch stage that reads its input, reshapes it and writes its outputs
/// into `dir`. Outputs that already exist are reused unless `overwrite` is set.
pub trait Etl {
    type Input;
    type Output;

    fn etl_name(&self) -> &str;

    fn is_cached(&self, dir: &Path) -> Result<bool>;
    fn clean(&self, dir: &Path) -> Result<()>;

    fn extract(&mut self, dir: &Path) -> Result<Self::Input>;
    fn transform(&mut self, input: Self::Input) -> Result<Self::Output>;
    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()>;

    fn process(&mut self, dir: &Path, overwrite: bool) -> Result<()> {
        let etl_name = self.etl_name().to_string();
        info!(etl_name = etl_name.as_str(), overwrite = overwrite; "Starting ETL process");

        if overwrite {
            log_failure(&etl_name, "clean", self.clean(dir))?;
        } else if self.is_cached(dir)? {
            info!(etl_name = etl_name.as_str(); "Outputs already present, skipping");
            return Ok(());
        }

        info!(etl_name = etl_name.as_str(); "Extracting");
        let input = log_failure(&etl_name, "extract", self.extract(dir))?;

        info!(etl_name = etl_name.as_str(); "Transforming");
        let output = log_failure(&etl_name, "transform", self.transform(input))?;

        info!(etl_name = etl_name.as_str(); "Loading");
        log_failure(&etl_name, "load", self.load(dir, output))?;

        info!(etl_name = etl_name.as_str(); "Process finished");
        Ok(())
    }
}
