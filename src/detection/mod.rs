//! Detection adapters
//!
//! Pure per-frame detectors (speech, hand gestures, breath) plus the gate
//! that binds a detector to a sensor. A detector only sees frames while its
//! gate holds a sensor handle, and the handle is released the moment the gate
//! deactivates or is dropped.

pub mod blow;
pub mod cover_eyes;
pub mod landmarks;
pub mod pointing;
pub mod speech;
pub mod wave;

pub use blow::{BlowConfig, BlowDetector, SpectrumFrame};
pub use cover_eyes::{CoverEyesConfig, CoverEyesDetector};
pub use landmarks::{HandFrame, HandLandmarks, Landmark};
pub use pointing::{PointingConfig, PointingDetector};
pub use speech::{Language, SpeechConfig, Transcript, YesDetector};
pub use wave::{WaveConfig, WaveDetector};

use crate::error::FlowError;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

/// Device a detector reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Camera,
    Microphone,
    SpeechRecognizer,
}

impl SensorKind {
    pub const ALL: [SensorKind; 3] = [
        SensorKind::Camera,
        SensorKind::Microphone,
        SensorKind::SpeechRecognizer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Camera => "camera",
            SensorKind::Microphone => "microphone",
            SensorKind::SpeechRecognizer => "speech_recognizer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-frame decision function for one target behavior
pub trait Detector {
    type Frame;

    /// Sensor the frames come from
    fn sensor(&self) -> SensorKind;

    /// Feed one frame. Returns `true` when the behavior is confirmed.
    fn observe(&mut self, frame: &Self::Frame) -> bool;

    /// Drop all smoothing state before a new activation
    fn reset(&mut self);
}

/// An acquired device. Dropping the handle releases the device.
pub trait SensorHandle {
    fn kind(&self) -> SensorKind;
}

/// Hands out sensor handles; the host's permission and device layer
pub trait SensorHub {
    fn acquire(&mut self, kind: SensorKind) -> Result<Box<dyn SensorHandle>, FlowError>;
}

/// Activation gate around a detector.
///
/// Inactive gates emit nothing. An active gate reports the first confirmed
/// detection and then deactivates itself, so each activation fires at most
/// once.
pub struct DetectionAdapter<D: Detector> {
    detector: D,
    handle: Option<Box<dyn SensorHandle>>,
}

impl<D: Detector> DetectionAdapter<D> {
    pub fn new(detector: D) -> Self {
        Self {
            detector,
            handle: None,
        }
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Acquire the sensor and start a fresh activation.
    ///
    /// On failure the gate stays inactive and the caller decides how to
    /// surface the missing permission.
    pub fn activate(&mut self, sensors: &mut dyn SensorHub) -> Result<(), FlowError> {
        let kind = self.detector.sensor();
        // Release first so a re-activation never holds two handles
        self.handle = None;
        let handle = sensors.acquire(kind).map_err(|e| {
            warn!("Could not acquire {}: {}", kind, e);
            e
        })?;
        self.detector.reset();
        self.handle = Some(handle);
        debug!("Detection active on {}", kind);
        Ok(())
    }

    /// Stop detection and release the sensor
    pub fn deactivate(&mut self) {
        if self.handle.take().is_some() {
            debug!("Detection released {}", self.detector.sensor());
        }
    }

    /// Feed a frame; `true` exactly once per activation
    pub fn feed(&mut self, frame: &D::Frame) -> bool {
        if !self.is_active() {
            return false;
        }
        if self.detector.observe(frame) {
            info!("Detected behavior on {}", self.detector.sensor());
            self.deactivate();
            return true;
        }
        false
    }
}

#[derive(Debug, Default)]
struct SensorLedger {
    denied: BTreeSet<SensorKind>,
    open: BTreeMap<SensorKind, usize>,
    acquired: usize,
}

/// In-process sensor hub for scripted runs and tests.
///
/// Grants every sensor that is not explicitly denied and keeps count of the
/// handles still open. Clones share the same ledger.
#[derive(Debug, Clone, Default)]
pub struct VirtualSensorHub {
    ledger: Rc<RefCell<SensorLedger>>,
}

impl VirtualSensorHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hub that refuses the given sensors
    pub fn denying(kinds: impl IntoIterator<Item = SensorKind>) -> Self {
        let hub = Self::new();
        for kind in kinds {
            hub.set_denied(kind, true);
        }
        hub
    }

    pub fn set_denied(&self, kind: SensorKind, denied: bool) {
        let mut ledger = self.ledger.borrow_mut();
        if denied {
            ledger.denied.insert(kind);
        } else {
            ledger.denied.remove(&kind);
        }
    }

    /// Handles currently held for `kind`
    pub fn open_handles(&self, kind: SensorKind) -> usize {
        self.ledger.borrow().open.get(&kind).copied().unwrap_or(0)
    }

    /// Handles currently held across all sensors
    pub fn total_open(&self) -> usize {
        self.ledger.borrow().open.values().sum()
    }

    /// Successful acquisitions since creation
    pub fn acquired_count(&self) -> usize {
        self.ledger.borrow().acquired
    }
}

impl SensorHub for VirtualSensorHub {
    fn acquire(&mut self, kind: SensorKind) -> Result<Box<dyn SensorHandle>, FlowError> {
        let mut ledger = self.ledger.borrow_mut();
        if ledger.denied.contains(&kind) {
            return Err(FlowError::SensorUnavailable(format!(
                "{} permission denied",
                kind
            )));
        }
        *ledger.open.entry(kind).or_insert(0) += 1;
        ledger.acquired += 1;
        Ok(Box::new(VirtualHandle {
            kind,
            ledger: Rc::clone(&self.ledger),
        }))
    }
}

struct VirtualHandle {
    kind: SensorKind,
    ledger: Rc<RefCell<SensorLedger>>,
}

impl SensorHandle for VirtualHandle {
    fn kind(&self) -> SensorKind {
        self.kind
    }
}

impl Drop for VirtualHandle {
    fn drop(&mut self) {
        let mut ledger = self.ledger.borrow_mut();
        if let Some(open) = ledger.open.get_mut(&self.kind) {
            *open = open.saturating_sub(1);
        }
    }
}
