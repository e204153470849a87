use cv_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// How a cluster of overlapping raw detections collapses into one rectangle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Integer mean of the members' x, y, width and height.
    #[default]
    Average,
    /// Bounding box of all members.
    Union,
}

/// Scan parameters attached to a cascade.
///
/// Missing fields in a deserialized document take their default values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanParams {
    /// Multiplier between consecutive pyramid levels, must exceed 1.0.
    pub scale_factor: f32,
    /// Scan stride in resampled pixels, both axes.
    pub step: u32,
    /// Multiplies every stage threshold; lower values accept more windows.
    pub threshold: f32,
    /// Windows whose grey-level standard deviation falls below this are rejected
    /// before any stage runs. Zero disables the gate.
    pub min_std_dev: u32,
    pub merge: MergePolicy,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.5,
            step: 2,
            threshold: 0.5,
            min_std_dev: 50,
            merge: MergePolicy::Average,
        }
    }
}

impl ScanParams {
    pub fn with_scale_factor(mut self, scale_factor: f32) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    pub fn with_step(mut self, step: u32) -> Self {
        self.step = step;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_min_std_dev(mut self, min_std_dev: u32) -> Self {
        self.min_std_dev = min_std_dev;
        self
    }

    pub fn with_merge(mut self, merge: MergePolicy) -> Self {
        self.merge = merge;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.scale_factor.is_finite() || self.scale_factor <= 1.0 {
            return Err(Error::Configuration(format!(
                "scale factor must be a finite value above 1.0, got {}",
                self.scale_factor
            )));
        }
        if self.step == 0 {
            return Err(Error::Configuration("scan step must be >= 1".into()));
        }
        if !self.threshold.is_finite() {
            return Err(Error::Configuration(format!(
                "stage threshold multiplier must be finite, got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}
