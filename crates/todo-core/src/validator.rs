use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;

/// Field name to the first violation recorded for it.
pub type ValidationErrors = BTreeMap<String, String>;

/// Request-scoped accumulator of field-level violations.
///
/// Only the first message per key is kept, so repeated checks against the
/// same field produce the same payload on every run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validator {
    errors: ValidationErrors,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(key.into()).or_insert_with(|| message.into());
    }

    /// Records `message` under `key` when `ok` is false.
    pub fn check(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add_error(key, message);
        }
    }

    #[must_use]
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    #[must_use]
    pub fn into_errors(self) -> ValidationErrors {
        self.errors
    }

    /// Lowest-keyed violation, if any.
    #[must_use]
    pub fn first_error(&self) -> Option<(&str, &str)> {
        self.errors
            .iter()
            .next()
            .map(|(key, message)| (key.as_str(), message.as_str()))
    }
}

#[must_use]
pub fn permitted_value<T: PartialEq + ?Sized>(value: &T, permitted: &[&T]) -> bool {
    permitted.iter().any(|candidate| *candidate == value)
}

#[must_use]
pub fn unique<T: Eq + Hash>(values: &[T]) -> bool {
    let mut seen = HashSet::with_capacity(values.len());
    values.iter().all(|value| seen.insert(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_message_per_key_wins() {
        let mut validator = Validator::new();
        validator.check(false, "name", "must be provided");
        validator.check(false, "name", "must not exceed 200 bytes");

        assert!(!validator.valid());
        assert_eq!(validator.errors().len(), 1);
        assert_eq!(
            validator.errors().get("name").map(String::as_str),
            Some("must be provided")
        );
    }

    #[test]
    fn passing_checks_record_nothing() {
        let mut validator = Validator::new();
        validator.check(true, "page", "must be greater than zero");
        assert!(validator.valid());
        assert!(validator.first_error().is_none());
    }

    #[test]
    fn independent_keys_accumulate() {
        let mut validator = Validator::new();
        validator.check(false, "page_size", "must be a maximum of 100");
        validator.check(false, "page", "must be greater than zero");
        validator.add_error("sort", "invalid sort value");

        let errors = validator.clone().into_errors();
        assert_eq!(
            errors.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["page", "page_size", "sort"]
        );
        assert_eq!(validator.first_error(), Some(("page", "must be greater than zero")));
    }

    #[test]
    fn permitted_value_matches_exact_members() {
        let safelist = ["id", "-id", "name"];
        assert!(permitted_value("id", &safelist));
        assert!(permitted_value("-id", &safelist));
        assert!(!permitted_value("name; DROP TABLE", &safelist));
        assert!(!permitted_value("ID", &safelist));
    }

    #[test]
    fn unique_detects_duplicates() {
        assert!(unique(&["a", "b", "c"]));
        assert!(!unique(&["a", "b", "a"]));
        assert!(unique::<u8>(&[]));
    }
}
