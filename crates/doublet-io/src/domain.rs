//! Domain types for doublet-io.

use doublet_xcorr::RawSignal;

use crate::IoError;

/// A validated experiment name for output file naming.
///
/// Must match `[a-zA-Z0-9_-]+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentName(String);

impl ExperimentName {
    /// Parse and validate an experiment name.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::InvalidExperimentName`] if the name is empty or
    /// contains characters outside `[a-zA-Z0-9_-]`.
    pub fn new(name: impl Into<String>) -> Result<Self, IoError> {
        let name = name.into();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(IoError::InvalidExperimentName { name });
        }
        Ok(Self(name))
    }

    /// Return the experiment name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ExperimentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An ordered collection of labelled events.
///
/// Produced by [`SignalReader`](crate::SignalReader). Events keep the file's
/// row order, which is also the row/column order of any matrix built from them.
/// Labels are not required to be unique; lookups return the first match.
#[derive(Debug, Clone)]
pub struct EventCatalog {
    events: Vec<RawSignal>,
}

impl EventCatalog {
    pub(crate) fn new(events: Vec<RawSignal>) -> Self {
        debug_assert!(!events.is_empty(), "catalog must not be empty");
        Self { events }
    }

    /// Return the events in file order.
    #[must_use]
    pub fn events(&self) -> &[RawSignal] {
        &self.events
    }

    /// Consume the catalog and return its events.
    #[must_use]
    pub fn into_events(self) -> Vec<RawSignal> {
        self.events
    }

    /// Return the number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Always false for catalogs produced by the reader.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Return the label of every event, in order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(|e| e.label().unwrap_or_default())
    }

    /// Find the first event with the given label.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::UnknownLabel`] if no event carries `label`.
    pub fn find(&self, label: &str) -> Result<&RawSignal, IoError> {
        self.events
            .iter()
            .find(|e| e.label() == Some(label))
            .ok_or_else(|| IoError::UnknownLabel {
                label: label.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doublet_xcorr::SampleRate;

    fn catalog() -> EventCatalog {
        let rate = SampleRate::new(10.0).unwrap();
        EventCatalog::new(vec![
            RawSignal::new(vec![1.0, 2.0], rate).unwrap().with_label("a"),
            RawSignal::new(vec![3.0], rate).unwrap().with_label("b"),
            RawSignal::new(vec![4.0, 5.0, 6.0], rate).unwrap().with_label("a"),
        ])
    }

    #[test]
    fn experiment_name_valid() {
        let name = ExperimentName::new("quake-swarm_01").unwrap();
        assert_eq!(name.as_str(), "quake-swarm_01");
        assert_eq!(name.to_string(), "quake-swarm_01");
    }

    #[test]
    fn experiment_name_rejects_empty() {
        let name = ExperimentName::new("");
        assert!(matches!(name, Err(IoError::InvalidExperimentName { .. })));
    }

    #[test]
    fn experiment_name_rejects_path_separators() {
        let name = ExperimentName::new("../escape");
        assert!(matches!(name, Err(IoError::InvalidExperimentName { .. })));
    }

    #[test]
    fn find_returns_first_match() {
        let cat = catalog();
        assert_eq!(cat.find("a").unwrap().len(), 2);
        assert_eq!(cat.find("b").unwrap().len(), 1);
    }

    #[test]
    fn find_unknown_label() {
        let cat = catalog();
        assert!(matches!(cat.find("zzz"), Err(IoError::UnknownLabel { .. })));
    }

    #[test]
    fn labels_in_file_order() {
        let cat = catalog();
        let labels: Vec<&str> = cat.labels().collect();
        assert_eq!(labels, vec!["a", "b", "a"]);
    }
}
