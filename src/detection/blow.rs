//! Breath (blowing) detection on microphone spectra
//!
//! Blowing into a microphone is loud broadband noise with a large share of
//! its energy above 2 kHz, unlike voiced speech which sits low.

use crate::detection::{Detector, SensorKind};
use serde::{Deserialize, Serialize};

/// One magnitude spectrum from the host's audio analyser
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpectrumFrame {
    #[serde(default)]
    pub timestamp_ms: f64,
    pub sample_rate: f64,
    /// Byte magnitudes from DC up to Nyquist
    pub bins: Vec<u8>,
}

/// Summed bin magnitudes per frequency band
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BandEnergy {
    pub total: f64,
    pub low: f64,
    pub mid: f64,
    pub high: f64,
}

impl BandEnergy {
    /// Share of the total that falls in the high band
    pub fn high_ratio(&self) -> f64 {
        if self.total > 0.0 {
            self.high / self.total
        } else {
            0.0
        }
    }
}

/// Breath detection tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlowConfig {
    /// Minimum overall loudness
    pub total_energy_threshold: f64,
    pub high_ratio_threshold: f64,
    /// Upper edge of the low band in Hz
    pub low_band_hz: f64,
    /// Upper edge of the mid band in Hz
    pub mid_band_hz: f64,
    /// Upper edge of the high band in Hz
    pub high_band_hz: f64,
    pub min_ms_between: f64,
    pub required_frames: u32,
}

impl Default for BlowConfig {
    fn default() -> Self {
        Self {
            total_energy_threshold: 9000.0,
            high_ratio_threshold: 0.35,
            low_band_hz: 500.0,
            mid_band_hz: 2000.0,
            high_band_hz: 8000.0,
            min_ms_between: 300.0,
            required_frames: 3,
        }
    }
}

impl BlowConfig {
    /// Split a spectrum into bands. Bin `i` sits at `i * rate / (2 * bins)`.
    pub fn band_energy(&self, frame: &SpectrumFrame) -> BandEnergy {
        let bin_count = frame.bins.len() as f64;
        let mut energy = BandEnergy::default();
        if bin_count == 0.0 {
            return energy;
        }

        for (i, &magnitude) in frame.bins.iter().enumerate() {
            let freq = i as f64 * frame.sample_rate / (bin_count * 2.0);
            let value = f64::from(magnitude);
            energy.total += value;
            if freq < self.low_band_hz {
                energy.low += value;
            } else if freq < self.mid_band_hz {
                energy.mid += value;
            } else if freq < self.high_band_hz {
                energy.high += value;
            }
        }
        energy
    }
}

#[derive(Debug, Clone)]
pub struct BlowDetector {
    config: BlowConfig,
    consecutive: u32,
    last_confirmed_ms: Option<f64>,
}

impl BlowDetector {
    pub fn new(config: BlowConfig) -> Self {
        Self {
            config,
            consecutive: 0,
            last_confirmed_ms: None,
        }
    }
}

impl Default for BlowDetector {
    fn default() -> Self {
        Self::new(BlowConfig::default())
    }
}

impl Detector for BlowDetector {
    type Frame = SpectrumFrame;

    fn sensor(&self) -> SensorKind {
        SensorKind::Microphone
    }

    fn observe(&mut self, frame: &SpectrumFrame) -> bool {
        let energy = self.config.band_energy(frame);
        let cooled_down = self
            .last_confirmed_ms
            .map_or(true, |last| frame.timestamp_ms - last > self.config.min_ms_between);

        let blowing = energy.total > self.config.total_energy_threshold
            && energy.high_ratio() > self.config.high_ratio_threshold
            && cooled_down;

        if blowing {
            self.consecutive += 1;
        } else {
            self.consecutive = self.consecutive.saturating_sub(1);
        }

        if self.consecutive >= self.config.required_frames {
            self.last_confirmed_ms = Some(frame.timestamp_ms);
            self.consecutive = 0;
            return true;
        }
        false
    }

    fn reset(&mut self) {
        self.consecutive = 0;
        self.last_confirmed_ms = None;
    }
}
