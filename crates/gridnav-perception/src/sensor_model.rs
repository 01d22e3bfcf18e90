//! Read-only sensor and motion models derived from configuration.

use std::f64::consts::PI;

use gridnav_types::{SensingSettings, TemperatureMeans, Terrain};

/// Gaussian probability density of `x` under `N(mean, std_dev²)`.
pub fn gaussian_pdf(x: f64, mean: f64, std_dev: f64) -> f64 {
    let z = (x - mean) / std_dev;
    (-0.5 * z * z).exp() / ((2.0 * PI).sqrt() * std_dev)
}

/// Temperature likelihood per terrain category, one shared standard
/// deviation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureModel {
    pub means: TemperatureMeans,
    pub std_dev: f64,
}

impl TemperatureModel {
    /// `P(reading | robot on terrain)`.
    pub fn likelihood(&self, reading: f64, terrain: Terrain) -> f64 {
        gaussian_pdf(reading, self.means.mean(terrain), self.std_dev)
    }
}

/// Texture sensor that reports the true label with probability `p_correct`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureModel {
    pub p_correct: f64,
}

impl TextureModel {
    pub fn likelihood(&self, reading: &str, label: &str) -> f64 {
        if reading == label {
            self.p_correct
        } else {
            1.0 - self.p_correct
        }
    }
}

/// A commanded move succeeds with `p_success`, otherwise the robot stays put.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionModel {
    pub p_success: f64,
}

/// Bundle of all models used by the belief filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorModels {
    pub temperature: TemperatureModel,
    pub texture: TextureModel,
    pub motion: MotionModel,
}

impl SensorModels {
    pub fn from_settings(settings: &SensingSettings) -> Self {
        Self {
            temperature: TemperatureModel {
                means: settings.temperature_means,
                std_dev: settings.temp_noise_std_dev,
            },
            texture: TextureModel {
                p_correct: settings.prob_tex_correct,
            },
            motion: MotionModel {
                p_success: settings.prob_move_correct,
            },
        }
    }
}
