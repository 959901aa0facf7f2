use std::{
    fs,
    path::{Path, PathBuf},
};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kaleidoscope::{Kaleidoscope, Variant, MAX_ITERATIONS};

/// Three dihedral orders, optionally in parentheses and comma separated.
static TRIANGLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\(?\s*(\d+)\s*[,\s]\s*(\d+)\s*[,\s]\s*(\d+)\s*\)?\s*$")
        .expect("hardcoded pattern")
});
static SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s*[xX]\s*(\d+)\s*$").expect("hardcoded pattern"));

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed settings: {0}")]
    Json(#[from] serde_json::Error),
    #[error("expected three dihedral orders like \"7 3 2\", got {0:?}")]
    Triangle(String),
    #[error("expected a size like 640x480, got {0:?}")]
    Size(String),
}

/// Orders `(k, m, n)` from strings like `7 3 2` or `(7, 3, 2)`.
pub fn parse_triangle(string: &str) -> Result<(u32, u32, u32), ConfigError> {
    let error = || ConfigError::Triangle(string.to_string());
    let captures = TRIANGLE.captures(string).ok_or_else(error)?;
    let order = |i: usize| captures[i].parse::<u32>().map_err(|_| error());
    Ok((order(1)?, order(2)?, order(3)?))
}

/// Width and height from strings like `640x480`.
pub fn parse_size(string: &str) -> Result<(usize, usize), ConfigError> {
    let error = || ConfigError::Size(string.to_string());
    let captures = SIZE.captures(string).ok_or_else(error)?;
    let width = captures[1].parse().map_err(|_| error())?;
    let height = captures[2].parse().map_err(|_| error())?;
    if width == 0 || height == 0 {
        return Err(error());
    }
    Ok((width, height))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub width: usize,
    pub height: usize,
    /// Half the visible extent along the shorter side.
    pub half_extent: f64,
}
impl GridSettings {
    pub fn new() -> Self {
        Self {
            width: 64,
            height: 48,
            half_extent: 1.,
        }
    }
}
impl Default for GridSettings {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub triangle: String,
    pub variant: Variant,
    pub max_iterations: u32,
    pub min_iterations: u32,
    pub grid: GridSettings,
    /// Circle arrangement to map with instead of the triangle.
    pub preset: Option<PathBuf>,
}
impl Settings {
    pub fn new() -> Self {
        Self {
            triangle: "7 3 2".to_string(),
            variant: Variant::Regular,
            max_iterations: MAX_ITERATIONS,
            min_iterations: 0,
            grid: GridSettings::new(),
            preset: None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn triangle(&self) -> Result<(u32, u32, u32), ConfigError> {
        parse_triangle(&self.triangle)
    }

    pub fn kaleidoscope(&self) -> Result<Kaleidoscope, ConfigError> {
        let (k, m, n) = self.triangle()?;
        let mut kaleidoscope = Kaleidoscope::new(k, m, n).with_variant(self.variant);
        kaleidoscope.max_iterations = self.max_iterations;
        kaleidoscope.min_iterations = self.min_iterations;
        Ok(kaleidoscope)
    }
}
impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}
