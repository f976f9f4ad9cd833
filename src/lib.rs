pub mod action;
pub mod analyzer;
pub mod config;
pub mod error;
pub mod events;
pub mod feed;
pub mod frame;
pub mod keyboard_input;
pub mod session;

pub use action::{handler_from_config, ActionDispatcher, ActionHandler, CommandAction, LogAction};
pub use analyzer::{ActionCompletion, MotionClassifier, PatternDetector, TriggerEvent};
pub use config::{ActionConfig, ActionKind, JuggleConfig, MotionConfig, PatternConfig, SystemConfig};
pub use error::{ActionError, EventBusError, FeedError, InputError, JuggleError, Result};
pub use events::{EventBus, EventFilter, EventMetrics, EventReceiver, JuggleEvent};
pub use feed::{FeedReader, FrameSource};
pub use frame::{HandFrame, HandObservation, Identity, MotionLabel, Point, SessionClock, Timestamp};
pub use keyboard_input::{KeyboardFeed, KeyboardHandSimulator};
pub use session::{FrameReport, JuggleSession, JuggleSessionBuilder, SessionStats};
