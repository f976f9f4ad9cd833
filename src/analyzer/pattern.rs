use crate::config::PatternConfig;
use crate::frame::{Identity, MotionLabel, Timestamp};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Emitted once per confirmed alternating-hand episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub event_id: String,
    /// Hand whose upward swing completed the pattern
    pub identity: Identity,
    /// Chained swings counted at the moment of the trigger
    pub alternations: u32,
    pub timestamp: Timestamp,
    pub triggered_at: DateTime<Utc>,
}

/// Re-arms a [`PatternDetector`] from whichever task ran the action.
///
/// The detector stays disarmed until this is signalled. A caller that drops
/// a trigger without completing it will never see another one.
#[derive(Debug, Clone)]
pub struct ActionCompletion {
    in_progress: Arc<AtomicBool>,
}

impl ActionCompletion {
    /// Mark the action finished. Safe to call any number of times.
    pub fn complete(&self) {
        if self.in_progress.swap(false, Ordering::AcqRel) {
            debug!("Action completed, pattern detector re-armed");
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }
}

/// Detects alternating upward swings between hands and emits a debounced trigger
#[derive(Debug)]
pub struct PatternDetector {
    config: PatternConfig,
    window: Duration,
    last_upward_identity: Option<Identity>,
    last_upward_time: Option<Timestamp>,
    alternation_count: u32,
    last_swing_suppressed: bool,
    action_in_progress: Arc<AtomicBool>,
}

impl PatternDetector {
    pub fn new(config: PatternConfig) -> Self {
        let window = config.alternation_window();
        Self {
            config,
            window,
            last_upward_identity: None,
            last_upward_time: None,
            alternation_count: 0,
            last_swing_suppressed: false,
            action_in_progress: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Feed one classified motion. Only [`MotionLabel::MovingUp`] affects state.
    pub fn observe(
        &mut self,
        identity: &Identity,
        label: MotionLabel,
        now: Timestamp,
    ) -> Option<TriggerEvent> {
        self.last_swing_suppressed = false;
        if label != MotionLabel::MovingUp {
            return None;
        }

        if self.alternates_with(identity, now) {
            self.alternation_count = self.alternation_count.saturating_add(1);
            info!(
                "Alternating motion from '{}', count: {}",
                identity, self.alternation_count
            );
        } else {
            debug!("Upward swing from '{}' starts a new sequence", identity);
            self.alternation_count = 1;
        }

        self.last_upward_identity = Some(identity.clone());
        self.last_upward_time = Some(now);

        if self.alternation_count < self.config.alternation_threshold {
            return None;
        }

        if self.action_in_progress.load(Ordering::Acquire) {
            warn!(
                "Pattern threshold reached (count {}) while an action is still running, suppressing trigger",
                self.alternation_count
            );
            self.last_swing_suppressed = true;
            return None;
        }

        let alternations = self.alternation_count;
        self.alternation_count = 0;
        self.action_in_progress.store(true, Ordering::Release);

        let trigger = TriggerEvent {
            event_id: Uuid::new_v4().to_string(),
            identity: identity.clone(),
            alternations,
            timestamp: now,
            triggered_at: Utc::now(),
        };

        info!(
            "Juggling motion detected after {} alternations (event {})",
            alternations, trigger.event_id
        );

        Some(trigger)
    }

    /// Whether an upward swing from `identity` at `now` continues the current chain
    fn alternates_with(&self, identity: &Identity, now: Timestamp) -> bool {
        let (last_identity, last_time) = match (&self.last_upward_identity, self.last_upward_time) {
            (Some(last_identity), Some(last_time)) => (last_identity, last_time),
            _ => return false,
        };

        if last_identity == identity {
            return false;
        }

        // A timestamp earlier than the last swing counts as an elapsed window
        match now.checked_since(last_time) {
            Some(elapsed) => elapsed < self.window,
            None => false,
        }
    }

    /// Re-arm the trigger after the dispatched action finished
    pub fn on_action_complete(&self) {
        self.completion_handle().complete();
    }

    /// Handle that re-arms this detector from another thread or task
    pub fn completion_handle(&self) -> ActionCompletion {
        ActionCompletion {
            in_progress: Arc::clone(&self.action_in_progress),
        }
    }

    pub fn alternation_count(&self) -> u32 {
        self.alternation_count
    }

    /// Whether the last observation reached the threshold but was held back by a running action
    pub fn last_swing_suppressed(&self) -> bool {
        self.last_swing_suppressed
    }

    pub fn is_action_in_progress(&self) -> bool {
        self.action_in_progress.load(Ordering::Acquire)
    }

    pub fn last_upward_identity(&self) -> Option<&Identity> {
        self.last_upward_identity.as_ref()
    }

    pub fn config(&self) -> &PatternConfig {
        &self.config
    }
}
