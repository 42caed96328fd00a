use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use linkstore::export::{LinkDepth, OutputMode, RenderOptions, UnresolvedMode};
use linkstore::storage::{GroupOptions, RemovalStrategy};
use serde::Deserialize;
use thiserror::Error;

/// Settings read from the optional `--config` TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub render: RenderSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    pub removal: Option<RemovalStrategy>,
    pub verify_on_commit: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenderSection {
    pub depth: Option<i64>,
    pub mode: Option<OutputMode>,
    pub unresolved: Option<UnresolvedMode>,
    pub pretty: Option<bool>,
    pub row_limit: Option<usize>,
    pub expansion_limit: Option<usize>,
    #[serde(default)]
    pub renames: BTreeMap<String, String>,
}

impl CliConfig {
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => read_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn group_options(&self) -> GroupOptions {
        let mut options = GroupOptions::new();
        if let Some(removal) = self.store.removal {
            options = options.removal(removal);
        }
        if let Some(verify) = self.store.verify_on_commit {
            options = options.verify_on_commit(verify);
        }
        options
    }

    pub fn render_options(&self) -> Result<RenderOptions, ConfigError> {
        let render = &self.render;
        let mut options = RenderOptions::new();
        if let Some(depth) = render.depth {
            options = options.depth(
                LinkDepth::from_raw(depth).map_err(|_| ConfigError::InvalidDepth { depth })?,
            );
        }
        if let Some(mode) = render.mode {
            options = options.mode(mode);
        }
        if let Some(unresolved) = render.unresolved {
            options = options.unresolved(unresolved);
        }
        if let Some(pretty) = render.pretty {
            options = options.pretty(pretty);
        }
        if let Some(limit) = render.row_limit {
            options = options.row_limit(limit);
        }
        if let Some(limit) = render.expansion_limit {
            options = options.expansion_limit(limit);
        }
        for (from, to) in &render.renames {
            options = options.rename(from.as_str(), to.as_str());
        }
        Ok(options)
    }
}

fn read_file(path: &Path) -> Result<CliConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read CLI config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse CLI config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("render depth {depth} in CLI config is invalid; use -1 or a non-negative number")]
    InvalidDepth { depth: i64 },
}
