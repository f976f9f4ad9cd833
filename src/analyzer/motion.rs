use crate::config::MotionConfig;
use crate::error::InputError;
use crate::frame::{Identity, MotionLabel, Point, Timestamp};

use std::collections::HashMap;
use tracing::debug;

/// Last accepted sample for one hand
#[derive(Debug, Clone, Copy)]
struct TrackedHand {
    position: Point,
    seen_at: Timestamp,
}

/// Classifies vertical motion of each hand from consecutive position samples
#[derive(Debug)]
pub struct MotionClassifier {
    config: MotionConfig,
    hands: HashMap<Identity, TrackedHand>,
}

impl MotionClassifier {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            hands: HashMap::new(),
        }
    }

    /// Classify the motion of `identity` since its previous sample.
    ///
    /// The first sample for an identity only records a reference point and
    /// yields [`MotionLabel::Stationary`]. Rejected input leaves the stored
    /// state untouched.
    pub fn classify(
        &mut self,
        identity: &str,
        position: Point,
        now: Timestamp,
    ) -> Result<MotionLabel, InputError> {
        let identity = Identity::new(identity)?;
        if !position.is_finite() {
            return Err(InputError::NonFinitePosition {
                identity: identity.to_string(),
                x: position.x,
                y: position.y,
            });
        }

        let current = TrackedHand {
            position,
            seen_at: now,
        };

        let previous = match self.hands.insert(identity.clone(), current) {
            Some(previous) => previous,
            None => {
                debug!("First sample for '{}', recording reference position", identity);
                return Ok(MotionLabel::Stationary);
            }
        };

        if now < previous.seen_at {
            debug!(
                "Sample for '{}' at {} is older than previous sample at {}",
                identity, now, previous.seen_at
            );
        }

        // y grows downward, so a positive dy means the hand rose
        let dy = previous.position.y - position.y;
        let threshold = self.config.movement_threshold;

        let label = if dy > threshold {
            MotionLabel::MovingUp
        } else if dy < -threshold {
            MotionLabel::MovingDown
        } else {
            MotionLabel::Stationary
        };

        debug!("'{}' dy={:.4} -> {}", identity, dy, label);
        Ok(label)
    }

    /// Last accepted position for `identity`, if any sample has arrived
    pub fn last_position(&self, identity: &str) -> Option<Point> {
        self.hands.get(identity).map(|hand| hand.position)
    }

    pub fn tracked_count(&self) -> usize {
        self.hands.len()
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    /// Forget every tracked hand
    pub fn reset(&mut self) {
        self.hands.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> MotionClassifier {
        MotionClassifier::new(MotionConfig::default())
    }

    fn at(secs: f64) -> Timestamp {
        Timestamp::from_secs_f64(secs)
    }

    #[test]
    fn test_first_sample_is_stationary() {
        let mut classifier = classifier();

        for (i, hand) in ["left", "right", "third-hand"].iter().enumerate() {
            let label = classifier
                .classify(hand, Point::new(0.5, 0.9), at(i as f64))
                .unwrap();
            assert_eq!(label, MotionLabel::Stationary);
        }
        assert_eq!(classifier.tracked_count(), 3);
    }

    #[test]
    fn test_upward_and_downward_motion() {
        let mut classifier = classifier();
        classifier.classify("left", Point::new(0.5, 0.5), at(0.0)).unwrap();

        let up = classifier.classify("left", Point::new(0.5, 0.45), at(0.1)).unwrap();
        assert_eq!(up, MotionLabel::MovingUp);

        let down = classifier.classify("left", Point::new(0.5, 0.55), at(0.2)).unwrap();
        assert_eq!(down, MotionLabel::MovingDown);

        let still = classifier.classify("left", Point::new(0.9, 0.56), at(0.3)).unwrap();
        assert_eq!(still, MotionLabel::Stationary);
    }

    #[test]
    fn test_threshold_is_strict() {
        let config = MotionConfig {
            movement_threshold: 0.25,
        };
        let mut classifier = MotionClassifier::new(config);

        // Binary-exact values so dy equals the threshold exactly
        classifier.classify("left", Point::new(0.0, 0.5), at(0.0)).unwrap();
        let label = classifier.classify("left", Point::new(0.0, 0.25), at(0.1)).unwrap();
        assert_eq!(label, MotionLabel::Stationary);

        let label = classifier.classify("left", Point::new(0.0, 0.5), at(0.2)).unwrap();
        assert_eq!(label, MotionLabel::Stationary);
    }

    #[test]
    fn test_identities_are_independent() {
        let mut classifier = classifier();
        classifier.classify("left", Point::new(0.5, 0.5), at(0.0)).unwrap();
        classifier.classify("right", Point::new(0.5, 0.1), at(0.0)).unwrap();

        let left = classifier.classify("left", Point::new(0.5, 0.4), at(0.1)).unwrap();
        let right = classifier.classify("right", Point::new(0.5, 0.2), at(0.1)).unwrap();

        assert_eq!(left, MotionLabel::MovingUp);
        assert_eq!(right, MotionLabel::MovingDown);
    }

    #[test]
    fn test_position_updated_on_every_sample() {
        let mut classifier = classifier();
        classifier.classify("left", Point::new(0.5, 0.5), at(0.0)).unwrap();
        classifier.classify("left", Point::new(0.5, 0.49), at(0.1)).unwrap();

        assert_eq!(classifier.last_position("left"), Some(Point::new(0.5, 0.49)));
        assert_eq!(classifier.last_position("right"), None);
    }

    #[test]
    fn test_non_finite_input_does_not_mutate_state() {
        let mut classifier = classifier();
        classifier.classify("left", Point::new(0.5, 0.5), at(0.0)).unwrap();

        let err = classifier
            .classify("left", Point::new(0.5, f64::NAN), at(0.1))
            .unwrap_err();
        assert!(matches!(err, InputError::NonFinitePosition { .. }));
        assert_eq!(classifier.last_position("left"), Some(Point::new(0.5, 0.5)));

        let err = classifier
            .classify("right", Point::new(f64::INFINITY, 0.5), at(0.1))
            .unwrap_err();
        assert!(matches!(err, InputError::NonFinitePosition { .. }));
        assert_eq!(classifier.tracked_count(), 1);
    }

    #[test]
    fn test_empty_identity_rejected() {
        let mut classifier = classifier();
        let err = classifier
            .classify("", Point::new(0.5, 0.5), at(0.0))
            .unwrap_err();

        assert_eq!(err, InputError::EmptyIdentity);
        assert_eq!(classifier.tracked_count(), 0);
    }

    #[test]
    fn test_out_of_order_timestamp_still_classifies() {
        let mut classifier = classifier();
        classifier.classify("left", Point::new(0.5, 0.5), at(5.0)).unwrap();

        let label = classifier.classify("left", Point::new(0.5, 0.4), at(1.0)).unwrap();
        assert_eq!(label, MotionLabel::MovingUp);
    }

    #[test]
    fn test_reset_forgets_hands() {
        let mut classifier = classifier();
        classifier.classify("left", Point::new(0.5, 0.5), at(0.0)).unwrap();
        classifier.reset();

        let label = classifier.classify("left", Point::new(0.5, 0.1), at(0.1)).unwrap();
        assert_eq!(label, MotionLabel::Stationary);
    }
}
