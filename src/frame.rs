use crate::error::InputError;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::time::{Duration, Instant};

/// Stable label for a tracked hand ("left", "right", or anything else the tracker emits)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Create an identity, rejecting empty or whitespace-only labels
    pub fn new<S: Into<String>>(label: S) -> Result<Self, InputError> {
        let label = label.into();
        if label.trim().is_empty() {
            return Err(InputError::EmptyIdentity);
        }
        Ok(Self(label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Identity {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identity {
    type Error = InputError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

/// Point in normalized image coordinates, origin top-left, y grows downward
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Monotonic session time, measured from session start
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(Duration);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(Duration::ZERO);

    pub const MAX: Timestamp = Timestamp(Duration::MAX);

    /// Build from fractional seconds. Negative or NaN input clamps to zero,
    /// values past the representable range saturate to [`Timestamp::MAX`].
    pub fn from_secs_f64(secs: f64) -> Self {
        match Duration::try_from_secs_f64(secs) {
            Ok(duration) => Self(duration),
            Err(_) if secs > 0.0 => Self::MAX,
            Err(_) => Self::ZERO,
        }
    }

    /// Strict variant: `None` unless `secs` is finite, non-negative and representable
    pub fn try_from_secs_f64(secs: f64) -> Option<Self> {
        Duration::try_from_secs_f64(secs).ok().map(Self)
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.0.as_secs_f64()
    }

    /// Time elapsed since `earlier`, or `None` when `earlier` is later than `self`
    pub fn checked_since(&self, earlier: Timestamp) -> Option<Duration> {
        self.0.checked_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.as_secs_f64())
    }
}

/// Stamps frames that arrive without a capture time
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    started: Instant,
}

impl SessionClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn now(&self) -> Timestamp {
        Timestamp(self.started.elapsed())
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::start()
    }
}

/// Motion of one hand between two consecutive frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionLabel {
    MovingUp,
    MovingDown,
    Stationary,
}

impl MotionLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MotionLabel::MovingUp => "Moving Up",
            MotionLabel::MovingDown => "Moving Down",
            MotionLabel::Stationary => "Stationary",
        }
    }
}

impl fmt::Display for MotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected hand in one video frame. The identity is validated later by the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct HandObservation {
    pub identity: String,
    pub position: Point,
}

impl HandObservation {
    pub fn new<S: Into<String>>(identity: S, position: Point) -> Self {
        Self {
            identity: identity.into(),
            position,
        }
    }

    /// Reduce a landmark set to its centroid. Handedness labels are lower-cased.
    pub fn from_landmarks(handedness: &str, landmarks: &[Point]) -> Result<Self, InputError> {
        let identity = handedness.trim().to_lowercase();
        if landmarks.is_empty() {
            return Err(InputError::NoLandmarks { identity });
        }

        let count = landmarks.len() as f64;
        let (sum_x, sum_y) = landmarks
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));

        Ok(Self {
            identity,
            position: Point::new(sum_x / count, sum_y / count),
        })
    }
}

/// All hands seen in a single video frame
#[derive(Debug, Clone, PartialEq)]
pub struct HandFrame {
    pub timestamp: Timestamp,
    pub hands: Vec<HandObservation>,
}

impl HandFrame {
    pub fn new(timestamp: Timestamp, hands: Vec<HandObservation>) -> Self {
        Self { timestamp, hands }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_rejects_empty() {
        assert_eq!(Identity::new(""), Err(InputError::EmptyIdentity));
        assert_eq!(Identity::new("   "), Err(InputError::EmptyIdentity));
        assert_eq!(Identity::new("left").unwrap().as_str(), "left");
    }

    #[test]
    fn test_identity_deserialize_validates() {
        let ok: Identity = serde_json::from_str("\"right\"").unwrap();
        assert_eq!(ok.as_str(), "right");
        assert!(serde_json::from_str::<Identity>("\"\"").is_err());
    }

    #[test]
    fn test_timestamp_checked_since() {
        let earlier = Timestamp::from_secs_f64(1.0);
        let later = Timestamp::from_secs_f64(1.5);

        assert_eq!(later.checked_since(earlier), Some(Duration::from_millis(500)));
        assert_eq!(earlier.checked_since(later), None);
    }

    #[test]
    fn test_timestamp_clamps_invalid_seconds() {
        assert_eq!(Timestamp::from_secs_f64(-3.0), Timestamp::ZERO);
        assert_eq!(Timestamp::from_secs_f64(f64::NAN), Timestamp::ZERO);
        assert_eq!(Timestamp::from_secs_f64(1e20), Timestamp::MAX);
        assert_eq!(Timestamp::from_secs_f64(f64::INFINITY), Timestamp::MAX);
    }

    #[test]
    fn test_timestamp_strict_conversion() {
        assert_eq!(
            Timestamp::try_from_secs_f64(1.5),
            Some(Timestamp::from_secs_f64(1.5))
        );
        assert_eq!(Timestamp::try_from_secs_f64(-0.5), None);
        assert_eq!(Timestamp::try_from_secs_f64(f64::NAN), None);
        assert_eq!(Timestamp::try_from_secs_f64(1e20), None);
    }

    #[test]
    fn test_centroid_from_landmarks() {
        let landmarks = vec![Point::new(0.2, 0.4), Point::new(0.4, 0.6), Point::new(0.6, 0.8)];
        let obs = HandObservation::from_landmarks("Left", &landmarks).unwrap();

        assert_eq!(obs.identity, "left");
        assert!((obs.position.x - 0.4).abs() < 1e-9);
        assert!((obs.position.y - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_centroid_requires_landmarks() {
        let err = HandObservation::from_landmarks("Right", &[]).unwrap_err();
        assert_eq!(
            err,
            InputError::NoLandmarks {
                identity: "right".to_string()
            }
        );
    }

    #[test]
    fn test_motion_label_display() {
        assert_eq!(MotionLabel::MovingUp.to_string(), "Moving Up");
        assert_eq!(MotionLabel::Stationary.to_string(), "Stationary");
    }
}
