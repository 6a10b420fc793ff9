use regex::Regex;

use crate::errors::Result;

/// Cuts postcode values down to the five digit ZIP code they contain.
#[derive(Debug, Clone)]
pub struct PostcodeNormalizer {
    key_marker: String,
    zip_code: Regex,
}

impl PostcodeNormalizer {
    pub fn new(key_marker: &str, zip_code: &str) -> Result<PostcodeNormalizer> {
        Ok(PostcodeNormalizer {
            key_marker: key_marker.to_string(),
            zip_code: Regex::new(zip_code)?,
        })
    }

    pub fn normalize(&self, key: &str, value: &str) -> String {
        if !key.contains(&self.key_marker) {
            return value.to_string();
        }
        match self.zip_code.find(value) {
            Some(zip) => zip.as_str().to_string(),
            None => value.to_string(),
        }
    }
}
