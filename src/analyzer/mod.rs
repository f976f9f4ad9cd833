mod motion;
mod pattern;

pub use motion::MotionClassifier;
pub use pattern::{ActionCompletion, PatternDetector, TriggerEvent};
