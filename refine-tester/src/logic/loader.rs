use std::fs;
use std::path::{Path, PathBuf};

use refine_engine::{AdvancedModel, ConfigError, DataLoader, ProbabilityModel};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Config { path: String, source: ConfigError },
}

/// Loads model tables from JSON files, falling back to the embedded tables
/// for any path not supplied.
#[derive(Debug, Clone, Default)]
pub struct FileDataLoader {
    model_path: Option<PathBuf>,
    advanced_path: Option<PathBuf>,
}

impl FileDataLoader {
    pub const fn new(model_path: Option<PathBuf>, advanced_path: Option<PathBuf>) -> Self {
        Self {
            model_path,
            advanced_path,
        }
    }
}

fn read_and_parse<T>(
    path: &Path,
    parse: impl FnOnce(&str) -> Result<T, ConfigError>,
) -> Result<T, LoadError> {
    let display = path.display().to_string();
    let json = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: display.clone(),
        source,
    })?;
    parse(&json).map_err(|source| LoadError::Config {
        path: display,
        source,
    })
}

impl DataLoader for FileDataLoader {
    type Error = LoadError;

    fn load_probability_model(&self) -> Result<ProbabilityModel, Self::Error> {
        match &self.model_path {
            Some(path) => read_and_parse(path, ProbabilityModel::from_json_str),
            None => ProbabilityModel::embedded().map_err(|source| LoadError::Config {
                path: "<embedded>".to_string(),
                source,
            }),
        }
    }

    fn load_advanced_model(&self) -> Result<AdvancedModel, Self::Error> {
        match &self.advanced_path {
            Some(path) => read_and_parse(path, AdvancedModel::from_json_str),
            None => AdvancedModel::embedded().map_err(|source| LoadError::Config {
                path: "<embedded>".to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refine_engine::RefineEngine;

    fn temp_file(label: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "refine-loader-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ));
        fs::write(&path, contents).expect("write temp file");
        path
    }

    #[test]
    fn defaults_to_embedded_tables() {
        let engine = RefineEngine::new(FileDataLoader::default()).unwrap();
        assert_eq!(engine.probability_model().levels().count(), 15);
    }

    #[test]
    fn missing_file_reports_path() {
        let loader = FileDataLoader::new(Some(PathBuf::from("/nonexistent/model.json")), None);
        let err = loader.load_probability_model().unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/model.json"));
    }

    #[test]
    fn invalid_tables_surface_config_error() {
        let path = temp_file("advanced", "{\"version\": 1}");
        let loader = FileDataLoader::new(None, Some(path));
        let err = loader.load_advanced_model().unwrap_err();
        assert!(matches!(
            err,
            LoadError::Config {
                source: ConfigError::Parse { .. },
                ..
            }
        ));
    }
}
