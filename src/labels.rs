use std::{collections::HashMap, fs, io, path::Path};

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// Returned for labels that have no suggestion text.
pub const MISSING_SUGGESTION: &str = "N/A";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("class list {0} contains no labels")]
    EmptyClassList(String),
    #[error("failed to parse suggestions {path}: {source}")]
    Suggestions {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
struct SuggestionEntry {
    #[serde(default)]
    fertilizer: Option<String>,
    #[serde(default)]
    organic: Option<String>,
}

/// The closed set of class labels the model can emit, in output order,
/// plus the static suggestion tables keyed by label.
#[derive(Debug, Clone, Default)]
pub struct ClassCatalog {
    classes: Vec<String>,
    fertilizer: HashMap<String, String>,
    organic: HashMap<String, String>,
}

impl ClassCatalog {
    pub fn new(classes: Vec<String>) -> Self {
        Self {
            classes,
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub fn with_suggestion(
        mut self,
        label: &str,
        fertilizer: impl Into<String>,
        organic: impl Into<String>,
    ) -> Self {
        self.fertilizer.insert(label.to_string(), fertilizer.into());
        self.organic.insert(label.to_string(), organic.into());
        self
    }

    pub fn from_files(
        class_list_path: &Path,
        suggestions_path: &Path,
    ) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(class_list_path).map_err(|source| CatalogError::Io {
            path: class_list_path.display().to_string(),
            source,
        })?;
        let classes = parse_class_list(&raw);
        if classes.is_empty() {
            return Err(CatalogError::EmptyClassList(
                class_list_path.display().to_string(),
            ));
        }

        let mut catalog = Self::new(classes);

        let raw = match fs::read_to_string(suggestions_path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(
                    "{} not found, every suggestion will be {}",
                    suggestions_path.display(),
                    MISSING_SUGGESTION
                );
                return Ok(catalog);
            }
            Err(source) => {
                return Err(CatalogError::Io {
                    path: suggestions_path.display().to_string(),
                    source,
                })
            }
        };

        let entries: HashMap<String, SuggestionEntry> =
            serde_json::from_str(&raw).map_err(|source| CatalogError::Suggestions {
                path: suggestions_path.display().to_string(),
                source,
            })?;

        for (label, entry) in entries {
            if !catalog.classes.contains(&label) {
                warn!("suggestion entry `{}` matches no class label", label);
            }
            if let Some(text) = entry.fertilizer {
                catalog.fertilizer.insert(label.clone(), text);
            }
            if let Some(text) = entry.organic {
                catalog.organic.insert(label, text);
            }
        }

        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    pub fn suggestion(&self, label: &str) -> &str {
        self.fertilizer
            .get(label)
            .map(String::as_str)
            .unwrap_or(MISSING_SUGGESTION)
    }

    pub fn organic_suggestion(&self, label: &str) -> &str {
        self.organic
            .get(label)
            .map(String::as_str)
            .unwrap_or(MISSING_SUGGESTION)
    }
}

fn parse_class_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_list_skips_blank_lines_and_trims() {
        let classes = parse_class_list("Tomato___Early_blight\r\n\n  Tomato___healthy  \n");
        assert_eq!(classes, vec!["Tomato___Early_blight", "Tomato___healthy"]);
    }

    #[test]
    fn loads_labels_and_suggestions() {
        let dir = tempfile::tempdir().unwrap();
        let classes = dir.path().join("class_list.txt");
        let suggestions = dir.path().join("suggestions.json");
        fs::write(&classes, "Corn___Common_rust\nCorn___healthy\n").unwrap();
        fs::write(
            &suggestions,
            r#"{"Corn___Common_rust": {"fertilizer": "Apply mancozeb.", "organic": "Neem oil spray."},
                "Corn___healthy": {"organic": "Keep mulching."}}"#,
        )
        .unwrap();

        let catalog = ClassCatalog::from_files(&classes, &suggestions).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.label(0), Some("Corn___Common_rust"));
        assert_eq!(catalog.label(2), None);
        assert_eq!(catalog.suggestion("Corn___Common_rust"), "Apply mancozeb.");
        assert_eq!(catalog.organic_suggestion("Corn___Common_rust"), "Neem oil spray.");
        assert_eq!(catalog.suggestion("Corn___healthy"), MISSING_SUGGESTION);
        assert_eq!(catalog.organic_suggestion("Corn___healthy"), "Keep mulching.");
    }

    #[test]
    fn missing_suggestion_file_is_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let classes = dir.path().join("class_list.txt");
        fs::write(&classes, "Potato___Late_blight\n").unwrap();

        let catalog =
            ClassCatalog::from_files(&classes, &dir.path().join("absent.json")).unwrap();
        assert_eq!(catalog.suggestion("Potato___Late_blight"), MISSING_SUGGESTION);
    }

    #[test]
    fn empty_or_missing_class_list_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let classes = dir.path().join("class_list.txt");
        let suggestions = dir.path().join("suggestions.json");

        assert!(matches!(
            ClassCatalog::from_files(&classes, &suggestions),
            Err(CatalogError::Io { .. })
        ));

        fs::write(&classes, "\n \n").unwrap();
        assert!(matches!(
            ClassCatalog::from_files(&classes, &suggestions),
            Err(CatalogError::EmptyClassList(_))
        ));
    }

    #[test]
    fn malformed_suggestions_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let classes = dir.path().join("class_list.txt");
        let suggestions = dir.path().join("suggestions.json");
        fs::write(&classes, "Apple___scab\n").unwrap();
        fs::write(&suggestions, "[not json").unwrap();

        assert!(matches!(
            ClassCatalog::from_files(&classes, &suggestions),
            Err(CatalogError::Suggestions { .. })
        ));
    }
}
