//! Lean and shake detection on the accelerometer stream
//!
//! Both detectors are debounced: the condition must hold for a number of
//! consecutive samples before the alarm fires. After firing, the required
//! count widens so a sustained excursion does not repeat the alarm every few
//! samples; it narrows again as soon as the condition clears.

use std::collections::VecDeque;

use smartshelf_common::events::AlarmKind;

/// Samples in the shake window
pub const SHAKE_WINDOW: usize = 5;

const LEAN_DELAY: u32 = 30;
const LEAN_DELAY_AFTER_ALARM: u32 = 50;
const SHAKE_DELAY: u32 = 10;
const SHAKE_DELAY_AFTER_ALARM: u32 = 30;

/// One accelerometer sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImuSample {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ImuSample {
    /// Decode a `<hhh` notification frame
    pub fn decode(frame: &[u8]) -> Option<Self> {
        if frame.len() != 6 {
            return None;
        }
        let axis = |i: usize| i32::from(i16::from_le_bytes([frame[i], frame[i + 1]]));
        Some(Self {
            x: axis(0),
            y: axis(2),
            z: axis(4),
        })
    }

    /// Sum of absolute per-axis differences
    pub fn distance(&self, other: &ImuSample) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs() + (self.z - other.z).abs()
    }
}

#[derive(Debug, Clone)]
struct Debounce {
    count: u32,
    required: u32,
    normal: u32,
    after_alarm: u32,
}

impl Debounce {
    fn new(normal: u32, after_alarm: u32) -> Self {
        Self {
            count: 0,
            required: normal,
            normal,
            after_alarm,
        }
    }

    /// Feed one condition value; true when the alarm fires
    fn update(&mut self, exceeded: bool) -> bool {
        if !exceeded {
            self.count = 0;
            self.required = self.normal;
            return false;
        }
        self.count += 1;
        if self.count >= self.required {
            self.count = 0;
            self.required = self.after_alarm;
            return true;
        }
        false
    }
}

/// Drift from the session's origin sample
#[derive(Debug, Clone)]
pub struct LeanDetector {
    threshold: i32,
    debounce: Debounce,
}

impl LeanDetector {
    pub fn new(threshold: i32) -> Self {
        Self {
            threshold,
            debounce: Debounce::new(LEAN_DELAY, LEAN_DELAY_AFTER_ALARM),
        }
    }

    pub fn update(&mut self, total_lean: i32) -> bool {
        self.debounce.update(total_lean > self.threshold)
    }
}

/// Sliding-window sum of inter-sample movement
#[derive(Debug, Clone)]
pub struct ShakeDetector {
    threshold: i32,
    window: VecDeque<i32>,
    debounce: Debounce,
}

impl ShakeDetector {
    pub fn new(threshold: i32) -> Self {
        Self {
            threshold,
            window: VecDeque::from(vec![0; SHAKE_WINDOW]),
            debounce: Debounce::new(SHAKE_DELAY, SHAKE_DELAY_AFTER_ALARM),
        }
    }

    pub fn update(&mut self, delta: i32) -> bool {
        if self.window.len() == SHAKE_WINDOW {
            self.window.pop_front();
        }
        self.window.push_back(delta);
        let total: i32 = self.window.iter().sum();
        self.debounce.update(total > self.threshold * SHAKE_WINDOW as i32)
    }
}

/// Runs both detectors over one session's accelerometer stream
///
/// The first sample after a (re)connect becomes the lean origin, so the
/// shelf's orientation at connect time counts as level.
#[derive(Debug, Clone)]
pub struct ImuAnalyzer {
    lean_threshold: i32,
    shake_threshold: i32,
    origin: Option<ImuSample>,
    previous: Option<ImuSample>,
    lean: LeanDetector,
    shake: ShakeDetector,
}

impl ImuAnalyzer {
    pub fn new(lean_threshold: i32, shake_threshold: i32) -> Self {
        Self {
            lean_threshold,
            shake_threshold,
            origin: None,
            previous: None,
            lean: LeanDetector::new(lean_threshold),
            shake: ShakeDetector::new(shake_threshold),
        }
    }

    /// Forget the origin and detector history (new session)
    pub fn reset(&mut self) {
        *self = Self::new(self.lean_threshold, self.shake_threshold);
    }

    pub fn origin(&self) -> Option<ImuSample> {
        self.origin
    }

    /// Process one sample; returns the alarms that fired
    pub fn process(&mut self, sample: ImuSample) -> Vec<AlarmKind> {
        let (Some(origin), Some(previous)) = (self.origin, self.previous) else {
            self.origin = Some(sample);
            self.previous = Some(sample);
            return Vec::new();
        };
        self.previous = Some(sample);

        let mut alarms = Vec::new();
        if self.lean.update(sample.distance(&origin)) {
            alarms.push(AlarmKind::Lean);
        }
        if self.shake.update(sample.distance(&previous)) {
            alarms.push(AlarmKind::Shake);
        }
        alarms
    }
}
