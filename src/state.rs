//! Shared inspection state: expected specification, counters and the last
//! counted detection.
//!
//! Every operation takes the single internal lock exactly once. The debounce
//! gate, the verdict and the counter/snapshot update of a detection all happen
//! inside that one critical section, so concurrent viewers can never count the
//! same part twice.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::SpecInputError;
use crate::models::{Shape, Verdict};

pub const DEFAULT_EXPECTED_SHAPE: Shape = Shape::Rectangle;
pub const DEFAULT_EXPECTED_AREA: f64 = 1000.0;
pub const DEFAULT_TOLERANCE: f64 = 300.0;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(2);

/// Operator-set target a part is judged against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExpectedSpec {
    pub shape: Shape,
    pub area: f64,
    pub tolerance: f64,
}

impl Default for ExpectedSpec {
    fn default() -> Self {
        Self {
            shape: DEFAULT_EXPECTED_SHAPE,
            area: DEFAULT_EXPECTED_AREA,
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl ExpectedSpec {
    /// Build a spec from numeric input, clamping negative tolerance to zero and
    /// replacing non-finite numbers with the defaults. `Unknown` is not a
    /// selectable target and becomes the default shape.
    pub fn sanitized(shape: Shape, area: f64, tolerance: f64) -> Self {
        let shape = if Shape::SELECTABLE.contains(&shape) {
            shape
        } else {
            DEFAULT_EXPECTED_SHAPE
        };
        let area = if area.is_finite() { area } else { DEFAULT_EXPECTED_AREA };
        let tolerance = if tolerance.is_finite() {
            tolerance.max(0.0)
        } else {
            DEFAULT_TOLERANCE
        };
        Self {
            shape,
            area,
            tolerance,
        }
    }

    /// Parse raw operator input. Fields that do not parse fall back to the
    /// defaults; the returned errors describe what was replaced.
    pub fn parse_lenient(
        shape: &str,
        area: &str,
        tolerance: &str,
    ) -> (Self, Vec<SpecInputError>) {
        let mut errors = Vec::new();

        let shape = shape.parse::<Shape>().unwrap_or_else(|err| {
            errors.push(err);
            DEFAULT_EXPECTED_SHAPE
        });
        let area = parse_number("expected_area", area).unwrap_or_else(|err| {
            errors.push(err);
            DEFAULT_EXPECTED_AREA
        });
        let tolerance = parse_number("tolerance", tolerance).unwrap_or_else(|err| {
            errors.push(err);
            DEFAULT_TOLERANCE
        });

        (Self::sanitized(shape, area, tolerance), errors)
    }

    /// `Good` iff the shape matches and the area is within tolerance.
    pub fn judge(&self, shape: Shape, area: f64) -> Verdict {
        let area_diff = (area - self.area).abs();
        if shape != self.shape || area_diff > self.tolerance {
            Verdict::Bad
        } else {
            Verdict::Good
        }
    }
}

fn parse_number(field: &'static str, raw: &str) -> Result<f64, SpecInputError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| SpecInputError::InvalidNumber {
            field,
            value: raw.to_string(),
        })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    pub total: u64,
    pub good: u64,
    pub bad: u64,
}

impl Counters {
    fn count(&mut self, verdict: Verdict) {
        self.total += 1;
        match verdict {
            Verdict::Good => self.good += 1,
            Verdict::Bad => self.bad += 1,
        }
    }
}

/// Last counted detection. `shape`/`result` are `None` until the first one.
#[derive(Debug, Clone, Default)]
pub struct DetectionSnapshot {
    pub id: Option<Uuid>,
    pub shape: Option<Shape>,
    pub area: f64,
    pub result: Option<Verdict>,
    pub timestamp: Option<Instant>,
    pub detected_at: Option<OffsetDateTime>,
}

/// A counted detection, handed to the actuator dispatcher.
#[derive(Debug, Clone)]
pub struct Decision {
    pub id: Uuid,
    pub shape: Shape,
    pub area: f64,
    pub verdict: Verdict,
    pub at: Instant,
}

/// Consistent copy of the whole state.
#[derive(Debug, Clone)]
pub struct InspectionSnapshot {
    pub expected: ExpectedSpec,
    pub counters: Counters,
    pub last: DetectionSnapshot,
    pub cooldown: Duration,
}

#[derive(Debug, Default)]
struct Inner {
    expected: ExpectedSpec,
    counters: Counters,
    last: DetectionSnapshot,
}

impl Inner {
    fn cooling_down(&self, now: Instant, cooldown: Duration) -> bool {
        match self.last.timestamp {
            Some(last) => now.saturating_duration_since(last) < cooldown,
            None => false,
        }
    }

    fn apply(&mut self, shape: Shape, area: f64, verdict: Verdict, now: Instant) -> Decision {
        let id = Uuid::new_v4();
        self.last = DetectionSnapshot {
            id: Some(id),
            shape: Some(shape),
            area,
            result: Some(verdict),
            timestamp: Some(now),
            detected_at: Some(OffsetDateTime::now_utc()),
        };
        self.counters.count(verdict);
        Decision {
            id,
            shape,
            area,
            verdict,
            at: now,
        }
    }
}

#[derive(Debug)]
pub struct InspectionState {
    cooldown: Duration,
    inner: Mutex<Inner>,
}

impl InspectionState {
    pub fn new(cooldown: Duration, expected: ExpectedSpec) -> Self {
        Self {
            cooldown,
            inner: Mutex::new(Inner {
                expected,
                ..Inner::default()
            }),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn get_snapshot(&self) -> InspectionSnapshot {
        let inner = self.inner.lock();
        InspectionSnapshot {
            expected: inner.expected,
            counters: inner.counters,
            last: inner.last.clone(),
            cooldown: self.cooldown,
        }
    }

    pub fn expected(&self) -> ExpectedSpec {
        self.inner.lock().expected
    }

    /// Replace the expected specification and return what was stored.
    pub fn set_expected(&self, shape: Shape, area: f64, tolerance: f64) -> ExpectedSpec {
        let spec = ExpectedSpec::sanitized(shape, area, tolerance);
        self.inner.lock().expected = spec;
        info!(shape = %spec.shape, area = spec.area, tolerance = spec.tolerance, "expected spec updated");
        spec
    }

    /// Lenient variant of [`set_expected`](Self::set_expected) for raw form input.
    pub fn set_expected_from_input(&self, shape: &str, area: &str, tolerance: &str) -> ExpectedSpec {
        let (spec, errors) = ExpectedSpec::parse_lenient(shape, area, tolerance);
        for err in &errors {
            warn!("invalid spec input, using default: {err}");
        }
        self.set_expected(spec.shape, spec.area, spec.tolerance)
    }

    /// Count a detection whose verdict is already known.
    ///
    /// Returns `false` without touching anything when `now` falls inside the
    /// cooldown of the previous counted detection.
    pub fn record_detection(&self, shape: Shape, area: f64, result: Verdict, now: Instant) -> bool {
        let mut inner = self.inner.lock();
        if inner.cooling_down(now, self.cooldown) {
            return false;
        }
        inner.apply(shape, area, result, now);
        true
    }

    /// Judge a detection against the current expected spec and count it,
    /// unless the debounce window is still open.
    pub fn evaluate(&self, shape: Shape, area: f64, now: Instant) -> Option<Decision> {
        let mut inner = self.inner.lock();
        if inner.cooling_down(now, self.cooldown) {
            return None;
        }
        let verdict = inner.expected.judge(shape, area);
        Some(inner.apply(shape, area, verdict, now))
    }

    pub fn reset_counters(&self) {
        self.inner.lock().counters = Counters::default();
        info!("counters reset");
    }
}

impl Default for InspectionState {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN, ExpectedSpec::default())
    }
}
