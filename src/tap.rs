//! Tap configuration and stream discovery.

use std::{collections::HashMap, fs, path::Path};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::{
    error::TapError,
    observability::log_info,
    stream::{ParquetStream, StreamOptions},
};

static NON_IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_]").unwrap());

/// Derive a stable, identifier-safe stream name from a dataset path: the
/// base filename without its extension, with every character outside
/// `[a-zA-Z0-9_]` replaced by `_`.
pub fn sanitize_stream_name(path: &str) -> String {
    let stem = Path::new(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default();
    NON_IDENTIFIER.replace_all(&stem, "_").into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TapConfig {
    /// Paths to Parquet datasets: files, directories or glob patterns.
    pub paths: Vec<String>,
    #[serde(default)]
    pub batch_size: Option<usize>,
}

impl TapConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, TapError> {
        let config: TapConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TapError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| TapError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), TapError> {
        if self.paths.is_empty() {
            return Err(TapError::EmptyPaths);
        }
        if self.batch_size == Some(0) {
            return Err(TapError::InvalidBatchSize);
        }
        Ok(())
    }

    fn stream_options(&self) -> StreamOptions {
        match self.batch_size {
            Some(batch_size) => StreamOptions::default().batch_size(batch_size),
            None => StreamOptions::default(),
        }
    }
}

/// Builds one [`ParquetStream`] per configured dataset path.
#[derive(Debug, Clone)]
pub struct Tap {
    config: TapConfig,
}

impl Tap {
    pub const NAME: &'static str = "tap-parquet";

    pub fn new(config: TapConfig) -> Result<Self, TapError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TapConfig {
        &self.config
    }

    /// Stream names for every configured path, in configuration order.
    /// Two paths sharing a name are rejected.
    pub fn stream_names(&self) -> Result<Vec<(String, String)>, TapError> {
        let mut seen: HashMap<String, &str> = HashMap::with_capacity(self.config.paths.len());
        let mut names = Vec::with_capacity(self.config.paths.len());
        for path in &self.config.paths {
            let name = sanitize_stream_name(path);
            if let Some(first) = seen.insert(name.clone(), path) {
                return Err(TapError::DuplicateStreamName {
                    name,
                    first: first.to_string(),
                    second: path.clone(),
                });
            }
            names.push((name, path.clone()));
        }
        Ok(names)
    }

    /// Open every configured dataset and discover its schema. The first
    /// failing path aborts discovery.
    pub fn discover_streams(&self) -> Result<Vec<ParquetStream>, TapError> {
        let options = self.config.stream_options();
        let streams = self
            .stream_names()?
            .into_iter()
            .map(|(name, path)| ParquetStream::with_options(name, path, options.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        log_info!(
            component = "tap",
            event = "streams_discovered",
            streams = streams.len(),
        );
        Ok(streams)
    }
}
