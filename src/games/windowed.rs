//! A detector racing a countdown
//!
//! Shared by every stage whose result is "did the behavior show up before
//! time ran out".

use super::Phase;
use crate::activity::ActivityWindow;
use crate::detection::{DetectionAdapter, Detector, SensorHub};
use crate::types::Verdict;
use std::time::Duration;

pub(crate) struct WindowedDetection<D: Detector> {
    adapter: DetectionAdapter<D>,
    window: ActivityWindow,
    access_denied: bool,
}

impl<D: Detector> WindowedDetection<D> {
    pub fn new(detector: D, duration: Duration) -> Self {
        Self {
            adapter: DetectionAdapter::new(detector),
            window: ActivityWindow::new(duration),
            access_denied: false,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.access_denied {
            return Phase::AccessNeeded;
        }
        match self.window.outcome() {
            None => Phase::Intro,
            Some(outcome) if outcome.is_resolved() => Phase::Finished,
            Some(_) => Phase::Active,
        }
    }

    /// Acquire the sensor and arm the window. A refused sensor leaves the
    /// window unarmed and the phase at `AccessNeeded`.
    pub fn start(&mut self, sensors: &mut dyn SensorHub) -> Phase {
        match self.adapter.activate(sensors) {
            Ok(()) => {
                self.access_denied = false;
                self.window.arm();
            }
            Err(_) => {
                self.access_denied = true;
                self.window.disarm();
            }
        }
        self.phase()
    }

    /// Verdict if this frame confirmed the behavior
    pub fn feed(&mut self, frame: &D::Frame) -> Option<Verdict> {
        if !self.window.is_pending() {
            return None;
        }
        if self.adapter.feed(frame) && self.window.detect() {
            return Some(Verdict::Passed);
        }
        None
    }

    /// Verdict if this tick ran the window out
    pub fn tick(&mut self, elapsed: Duration) -> Option<Verdict> {
        let outcome = self.window.tick(elapsed)?;
        self.adapter.deactivate();
        outcome.verdict()
    }

    /// Abandon the activation; counts as not passed
    pub fn give_up(&mut self) -> Verdict {
        self.adapter.deactivate();
        self.access_denied = false;
        if !self.window.is_pending() {
            self.window.arm();
        }
        self.window.expire();
        Verdict::NotPassed
    }

    pub fn seconds_left(&self) -> Option<u64> {
        self.window.is_pending().then(|| self.window.seconds_left())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BlowDetector, SensorKind, SpectrumFrame, VirtualSensorHub};
    use pretty_assertions::assert_eq;

    fn loud_breath(t: f64) -> SpectrumFrame {
        let mut bins = vec![0u8; 512];
        for value in &mut bins[50..160] {
            *value = 100;
        }
        SpectrumFrame {
            timestamp_ms: t,
            sample_rate: 48_000.0,
            bins,
        }
    }

    #[test]
    fn test_detection_before_timeout() {
        let mut hub = VirtualSensorHub::new();
        let mut run = WindowedDetection::new(BlowDetector::default(), Duration::from_secs(10));
        assert_eq!(run.phase(), Phase::Intro);
        assert_eq!(run.feed(&loud_breath(0.0)), None);

        assert_eq!(run.start(&mut hub), Phase::Active);
        assert_eq!(run.seconds_left(), Some(10));
        assert_eq!(run.feed(&loud_breath(0.0)), None);
        assert_eq!(run.feed(&loud_breath(20.0)), None);
        assert_eq!(run.feed(&loud_breath(40.0)), Some(Verdict::Passed));

        assert_eq!(run.phase(), Phase::Finished);
        assert_eq!(hub.total_open(), 0);
        assert_eq!(run.tick(Duration::from_secs(30)), None);
    }

    #[test]
    fn test_timeout_releases_sensor() {
        let mut hub = VirtualSensorHub::new();
        let mut run = WindowedDetection::new(BlowDetector::default(), Duration::from_secs(10));
        run.start(&mut hub);
        assert_eq!(hub.open_handles(SensorKind::Microphone), 1);

        assert_eq!(run.tick(Duration::from_secs(9)), None);
        assert_eq!(run.tick(Duration::from_secs(1)), Some(Verdict::NotPassed));
        assert_eq!(hub.total_open(), 0);
        assert_eq!(run.feed(&loud_breath(0.0)), None);
    }

    #[test]
    fn test_denied_sensor() {
        let mut hub = VirtualSensorHub::denying([SensorKind::Microphone]);
        let mut run = WindowedDetection::new(BlowDetector::default(), Duration::from_secs(10));
        assert_eq!(run.start(&mut hub), Phase::AccessNeeded);
        assert_eq!(run.seconds_left(), None);
        assert_eq!(run.tick(Duration::from_secs(20)), None);

        hub.set_denied(SensorKind::Microphone, false);
        assert_eq!(run.start(&mut hub), Phase::Active);
    }

    #[test]
    fn test_give_up() {
        let mut hub = VirtualSensorHub::new();
        let mut run = WindowedDetection::new(BlowDetector::default(), Duration::from_secs(10));
        run.start(&mut hub);
        assert_eq!(run.give_up(), Verdict::NotPassed);
        assert_eq!(run.phase(), Phase::Finished);
        assert_eq!(hub.total_open(), 0);
    }
}
