use std::{collections::HashMap, error::Error, fmt, fs, io, path::Path};

use serde::Deserialize;

/// A class as listed in `imagenet_class_index.json`: `["n01440764", "tench"]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClassLabel(String, String);

impl ClassLabel {
    pub fn new(synset: &str, name: &str) -> Self {
        Self(synset.to_string(), name.to_string())
    }

    pub fn synset(&self) -> &str {
        &self.0
    }

    pub fn name(&self) -> &str {
        &self.1
    }
}

/// Failures loading the class table.
#[derive(Debug)]
pub enum ClassesErr {
    Io(io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for ClassesErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassesErr::Io(e) => write!(f, "io error reading the class index: {e}"),
            ClassesErr::Parse(e) => write!(f, "invalid class index: {e}"),
        }
    }
}

impl Error for ClassesErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ClassesErr::Io(e) => Some(e),
            ClassesErr::Parse(e) => Some(e),
        }
    }
}

impl From<io::Error> for ClassesErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ClassesErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// A predicted index with no entry in the class table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookupErr {
    pub index: usize,
}

impl fmt::Display for LookupErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "class index {} has no label", self.index)
    }
}

impl Error for LookupErr {}

/// Maps class indices, keyed by their decimal string, to their labels.
#[derive(Debug, Clone, Default)]
pub struct ClassTable {
    labels: HashMap<String, ClassLabel>,
}

impl ClassTable {
    /// Reads a class table in the `imagenet_class_index.json` format.
    ///
    /// # Arguments
    /// * `path` - The path of the file.
    ///
    /// # Returns
    /// The table or an io or parsing error.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ClassesErr> {
        let bytes = fs::read(path)?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ClassesErr> {
        Ok(Self {
            labels: serde_json::from_slice(bytes)?,
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns the label of class `index`.
    pub fn lookup(&self, index: usize) -> Result<&ClassLabel, LookupErr> {
        self.labels
            .get(&index.to_string())
            .ok_or(LookupErr { index })
    }

    /// Lists the indices below `num_classes` that have no label.
    pub fn missing(&self, num_classes: usize) -> Vec<usize> {
        (0..num_classes)
            .filter(|i| !self.labels.contains_key(&i.to_string()))
            .collect()
    }
}

impl FromIterator<(usize, ClassLabel)> for ClassTable {
    fn from_iter<I: IntoIterator<Item = (usize, ClassLabel)>>(iter: I) -> Self {
        Self {
            labels: iter
                .into_iter()
                .map(|(index, label)| (index.to_string(), label))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &[u8] = br#"{
        "0": ["n01440764", "tench"],
        "1": ["n01443537", "goldfish"],
        "999": ["n15075141", "toilet_tissue"]
    }"#;

    #[test]
    fn looks_up_by_decimal_index() {
        let table = ClassTable::from_slice(INDEX).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.lookup(1).unwrap().name(), "goldfish");
        assert_eq!(table.lookup(999).unwrap().synset(), "n15075141");
    }

    #[test]
    fn unknown_index_is_a_lookup_error() {
        let table = ClassTable::from_slice(INDEX).unwrap();
        assert_eq!(table.lookup(1000), Err(LookupErr { index: 1000 }));
    }

    #[test]
    fn reports_gaps() {
        let table = ClassTable::from_slice(INDEX).unwrap();
        assert_eq!(table.missing(3), vec![2]);
    }

    #[test]
    fn rejects_malformed_entries() {
        let err = ClassTable::from_slice(br#"{"0": "tench"}"#).unwrap_err();
        assert!(matches!(err, ClassesErr::Parse(_)));
    }
}
