use regex::Regex;

use crate::errors::Result;

/// Namespace and bare key of a tag that passed the character check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedKey {
    pub tag_type: String,
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct TagClassifier {
    problem_chars: Regex,
    lower_colon: Regex,
    default_tag_type: String,
}

impl TagClassifier {
    pub fn new(problem_chars: &str, lower_colon: &str, default_tag_type: &str) -> Result<TagClassifier> {
        Ok(TagClassifier {
            problem_chars: Regex::new(problem_chars)?,
            lower_colon: Regex::new(lower_colon)?,
            default_tag_type: default_tag_type.to_string(),
        })
    }

    /// Returns `None` when the key contains a problem character and the whole
    /// tag has to be dropped.
    pub fn classify(&self, raw_key: &str) -> Option<ClassifiedKey> {
        if self.problem_chars.is_match(raw_key) {
            return None;
        }

        if self.lower_colon.is_match(raw_key) {
            // Only the first colon separates the namespace, "tiger:county:name" keeps "county:name".
            if let Some((namespace, key)) = raw_key.split_once(':') {
                return Some(ClassifiedKey {
                    tag_type: namespace.to_string(),
                    key: key.to_string(),
                });
            }
        }

        Some(ClassifiedKey {
            tag_type: self.default_tag_type.clone(),
            key: raw_key.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::ShapeConfig;

    fn classifier() -> TagClassifier {
        let config = ShapeConfig::default();
        TagClassifier::new(&config.problem_chars, &config.lower_colon, &config.default_tag_type).unwrap()
    }

    fn classified(tag_type: &str, key: &str) -> Option<ClassifiedKey> {
        Some(ClassifiedKey {
            tag_type: tag_type.to_string(),
            key: key.to_string(),
        })
    }

    #[test]
    fn plain_key_is_regular() {
        assert_eq!(classifier().classify("name"), classified("regular", "name"));
    }

    #[test]
    fn lower_colon_key_is_split() {
        assert_eq!(classifier().classify("addr:postcode"), classified("addr", "postcode"));
    }

    #[test]
    fn only_first_colon_splits() {
        assert_eq!(classifier().classify("tiger:county:name"), classified("tiger", "county:name"));
    }

    #[test]
    fn underscores_count_as_lowercase() {
        assert_eq!(classifier().classify("is_in:country_code"), classified("is_in", "country_code"));
    }

    #[test]
    fn pattern_is_anchored_at_start_only() {
        // "addr:street" already matches, the trailing digit rides along in the key.
        assert_eq!(classifier().classify("addr:street_1"), classified("addr", "street_1"));
    }

    #[test]
    fn uppercase_namespace_is_not_split() {
        assert_eq!(classifier().classify("Addr:street"), classified("regular", "Addr:street"));
        assert_eq!(classifier().classify("name:EN"), classified("regular", "name:EN"));
    }

    #[test]
    fn problem_chars_reject_the_key() {
        let classifier = classifier();
        for key in ["bad,key", "a.b", "a=b", "a+b", "a/b", "a&b", "a<b", "a>b", "a;b", "a'b",
                    "a\"b", "a?b", "a%b", "a#b", "a$b", "a@b", "a b", "a\tb", "a\nb", "a\rb"] {
            assert_eq!(classifier.classify(key), None, "{key:?} should be rejected");
        }
    }

    #[test]
    fn digits_and_dashes_are_allowed() {
        assert_eq!(classifier().classify("fixme-2"), classified("regular", "fixme-2"));
    }
}
