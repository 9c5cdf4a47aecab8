//! JSON configuration and report helpers for hole-grid detection.

use std::{
    fs,
    path::{Path, PathBuf},
};

use holegrid_core::{Bound, GrayImage, GridCoords, Keypoint};
use serde::{Deserialize, Serialize};

use crate::{
    DetectionStats, GridCellEntry, GridConfigError, GridDetection, GridDetector,
    GridDetectorParams, GridNotFoundError, GridNotFoundKind, GridShape, ReferenceBoard,
    ReferenceHomography,
};

#[derive(thiserror::Error, Debug)]
pub enum GridIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("unknown log level {0:?}")]
    LogLevel(String),
    #[error(transparent)]
    Logger(#[from] log::SetLoggerError),
}

/// Evenly spaced reference layout, optionally with the rectified output size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceLayoutSpec {
    /// Column and row pitch in reference pixels.
    pub spacing: [f32; 2],
    /// Reference position of cell `(0, 0)`.
    #[serde(default)]
    pub origin: [f32; 2],
    /// `[width, height]` of the rectified image; no rectification when absent.
    #[serde(default)]
    pub image_size: Option<[usize; 2]>,
}

impl ReferenceLayoutSpec {
    pub fn build(&self, shape: GridShape) -> ReferenceBoard {
        let board = ReferenceBoard::uniform(shape, self.spacing, self.origin);
        match self.image_size {
            Some([w, h]) => board.with_image(GrayImage::new(w, h)),
            None => board,
        }
    }
}

/// Configuration for running the detector over a stored keypoint list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridDetectConfig {
    /// JSON file holding an array of `[x, y]` hole centers.
    pub keypoints_path: String,
    /// Source image `[width, height]`, used as the bound when `bound` is absent.
    #[serde(default)]
    pub image_size: Option<[usize; 2]>,
    #[serde(default)]
    pub bound: Option<Bound>,
    #[serde(default)]
    pub params: GridDetectorParams,
    #[serde(default)]
    pub reference: Option<ReferenceLayoutSpec>,
    #[serde(default)]
    pub output_path: Option<String>,
    /// `log` level name for the stderr logger, e.g. `"debug"`; `info` when absent.
    #[serde(default)]
    pub log_level: Option<String>,
}

impl GridDetectConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, GridIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), GridIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the output report path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("holegrid_detect_report.json"))
    }

    /// Read the keypoint file; keypoint indices follow file order.
    pub fn load_keypoints(&self) -> Result<Vec<Keypoint>, GridIoError> {
        let raw = fs::read_to_string(&self.keypoints_path)?;
        let points: Vec<[f32; 2]> = serde_json::from_str(&raw)?;
        Ok(points
            .into_iter()
            .enumerate()
            .map(|(index, [x, y])| Keypoint::new(index, x, y))
            .collect())
    }

    /// Explicit bound, else the full image when its size is known.
    pub fn bound(&self) -> Option<Bound> {
        self.bound
            .or_else(|| self.image_size.map(|[w, h]| Bound::from_image_size(w, h)))
    }

    /// Install the stderr logger at the configured level.
    pub fn init_logging(&self) -> Result<(), GridIoError> {
        let level = match &self.log_level {
            Some(name) => name
                .parse::<log::LevelFilter>()
                .map_err(|_| GridIoError::LogLevel(name.clone()))?,
            None => log::LevelFilter::Info,
        };
        holegrid_core::init_with_level(level)?;
        Ok(())
    }

    /// Build a detector from this config.
    pub fn build_detector(&self) -> Result<GridDetector, GridConfigError> {
        let reference = self
            .reference
            .as_ref()
            .map(|layout| layout.build(self.params.shape));
        GridDetector::new(self.params.clone(), reference)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridDetectReport {
    pub keypoints_path: String,
    pub config_path: String,
    pub shape: GridShape,
    pub num_keypoints: usize,
    #[serde(default)]
    pub cells: Option<Vec<GridCellEntry>>,
    #[serde(default)]
    pub missing_cells: Option<Vec<GridCoords>>,
    #[serde(default)]
    pub homography: Option<ReferenceHomography>,
    #[serde(default)]
    pub stats: Option<DetectionStats>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_kind: Option<GridNotFoundKind>,
}

impl GridDetectReport {
    /// Build a base report from the input config.
    pub fn new(cfg: &GridDetectConfig, config_path: &Path, num_keypoints: usize) -> Self {
        Self {
            keypoints_path: cfg.keypoints_path.clone(),
            config_path: config_path.to_string_lossy().into_owned(),
            shape: cfg.params.shape,
            num_keypoints,
            cells: None,
            missing_cells: None,
            homography: None,
            stats: None,
            error: None,
            error_kind: None,
        }
    }

    /// Populate report fields from a successful detection.
    pub fn set_detection(&mut self, res: &GridDetection) {
        self.cells = Some(res.grid.entries());
        self.missing_cells = Some(res.grid.missing_cells(self.shape));
        self.homography = res.homography.clone();
        self.stats = Some(res.stats.clone());
        self.error = None;
        self.error_kind = None;
    }

    /// Record a detection error.
    pub fn set_error(&mut self, err: &GridNotFoundError) {
        self.error = Some(err.to_string());
        self.error_kind = Some(err.kind());
    }

    /// Load a report from JSON on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, GridIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), GridIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
