use crate::action::{handler_from_config, ActionDispatcher, ActionHandler};
use crate::analyzer::{MotionClassifier, PatternDetector, TriggerEvent};
use crate::config::JuggleConfig;
use crate::error::{FeedError, InputError, JuggleError, Result};
use crate::events::{EventBus, JuggleEvent};
use crate::feed::FrameSource;
use crate::frame::{HandFrame, Identity, MotionLabel, Timestamp};

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Outcome of processing one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub timestamp: Timestamp,
    /// Classified hands, in input order
    pub labels: Vec<(Identity, MotionLabel)>,
    /// Observations skipped for this frame
    pub rejected: Vec<InputError>,
    /// Alternation count after the frame, as shown on the overlay
    pub alternation_count: u32,
    pub trigger: Option<TriggerEvent>,
}

impl FrameReport {
    pub fn label_for(&self, identity: &str) -> Option<MotionLabel> {
        self.labels
            .iter()
            .find(|(id, _)| id.as_str() == identity)
            .map(|(_, label)| *label)
    }
}

/// Counters for a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_processed: u64,
    pub observations_rejected: u64,
    pub malformed_frames: u64,
    pub triggers: u64,
}

/// Drives classifier and detector for every frame and dispatches confirmed patterns
pub struct JuggleSession {
    classifier: MotionClassifier,
    detector: PatternDetector,
    dispatcher: ActionDispatcher,
    event_bus: Arc<EventBus>,
    stats: SessionStats,
}

impl JuggleSession {
    /// Create a session with the action described by `config.action`
    pub fn new(config: JuggleConfig, event_bus: Arc<EventBus>) -> Result<Self> {
        let handler = handler_from_config(&config.action)?;
        Self::with_handler(config, event_bus, handler)
    }

    /// Create a session running `handler` instead of the configured action
    pub fn with_handler(
        config: JuggleConfig,
        event_bus: Arc<EventBus>,
        handler: Arc<dyn ActionHandler>,
    ) -> Result<Self> {
        config.validate()?;

        info!(
            "Creating juggling session (threshold {:.3}, window {:.1}s, {} alternations, action '{}')",
            config.motion.movement_threshold,
            config.pattern.alternation_window_seconds,
            config.pattern.alternation_threshold,
            handler.name()
        );

        let classifier = MotionClassifier::new(config.motion);
        let detector = PatternDetector::new(config.pattern);
        let dispatcher = ActionDispatcher::new(
            handler,
            detector.completion_handle(),
            Arc::clone(&event_bus),
        );

        Ok(Self {
            classifier,
            detector,
            dispatcher,
            event_bus,
            stats: SessionStats::default(),
        })
    }

    /// Classify every hand in `frame`, feed the detector and dispatch any trigger.
    ///
    /// Must run inside a tokio runtime because triggered actions are spawned.
    pub fn process_frame(&mut self, frame: &HandFrame) -> FrameReport {
        let now = frame.timestamp;
        let mut labels = Vec::with_capacity(frame.hands.len());
        let mut rejected = Vec::new();
        let mut trigger = None;

        for hand in &frame.hands {
            let classified = Identity::new(hand.identity.as_str()).and_then(|identity| {
                self.classifier
                    .classify(identity.as_str(), hand.position, now)
                    .map(|label| (identity, label))
            });

            let (identity, label) = match classified {
                Ok(classified) => classified,
                Err(e) => {
                    warn!("Skipping observation for '{}': {}", hand.identity, e);
                    self.publish(JuggleEvent::InputRejected {
                        identity: hand.identity.clone(),
                        reason: e.to_string(),
                    });
                    rejected.push(e);
                    continue;
                }
            };

            self.publish(JuggleEvent::MotionClassified {
                identity: hand.identity.clone(),
                label,
                timestamp: now,
            });

            if let Some(fired) = self.detector.observe(&identity, label, now) {
                self.on_trigger(&fired);
                trigger = Some(fired);
            } else if label == MotionLabel::MovingUp {
                self.after_upward_swing(&identity, now);
            }

            labels.push((identity, label));
        }

        self.stats.frames_processed += 1;
        self.stats.observations_rejected += rejected.len() as u64;

        FrameReport {
            timestamp: now,
            labels,
            rejected,
            alternation_count: self.detector.alternation_count(),
            trigger,
        }
    }

    fn after_upward_swing(&self, identity: &Identity, now: Timestamp) {
        let count = self.detector.alternation_count();
        if self.detector.last_swing_suppressed() {
            self.publish(JuggleEvent::TriggerSuppressed {
                count,
                timestamp: now,
            });
        } else {
            self.publish(JuggleEvent::AlternationAdvanced {
                identity: identity.to_string(),
                count,
                timestamp: now,
            });
        }
    }

    fn on_trigger(&mut self, trigger: &TriggerEvent) {
        self.stats.triggers += 1;
        self.publish(JuggleEvent::PatternConfirmed {
            event_id: trigger.event_id.clone(),
            identity: trigger.identity.to_string(),
            alternations: trigger.alternations,
            timestamp: trigger.timestamp,
        });
        self.dispatcher.dispatch(trigger.clone());
    }

    fn publish(&self, event: JuggleEvent) {
        // No subscribers is fine; events are for observers only
        let _ = self.event_bus.publish(event);
    }

    /// Process frames from `source` until it ends or `cancel` fires.
    ///
    /// Malformed frames are logged and skipped. Read failures end the run.
    pub async fn run<S: FrameSource>(
        &mut self,
        source: &mut S,
        cancel: CancellationToken,
    ) -> Result<SessionStats> {
        info!("Juggling session started");

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Session cancelled");
                    break;
                }
                next = source.next_frame() => next,
            };

            match next {
                Ok(Some(frame)) => {
                    let report = self.process_frame(&frame);
                    debug!(
                        "Frame at {}: {} hands, count {}",
                        report.timestamp,
                        report.labels.len(),
                        report.alternation_count
                    );
                }
                Ok(None) => {
                    info!("Frame source exhausted");
                    break;
                }
                Err(FeedError::Io(e)) => return Err(JuggleError::Io(e)),
                Err(e) => {
                    warn!("Skipping malformed frame: {}", e);
                    self.stats.malformed_frames += 1;
                }
            }
        }

        Ok(self.stats.clone())
    }

    /// Wait for in-flight actions to finish
    pub async fn shutdown(&self) -> Result<()> {
        if self.dispatcher.in_flight() > 0 {
            info!("Waiting for running action to finish");
        }
        self.dispatcher.wait_idle().await?;
        Ok(())
    }

    pub fn alternation_count(&self) -> u32 {
        self.detector.alternation_count()
    }

    pub fn is_action_in_progress(&self) -> bool {
        self.detector.is_action_in_progress()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn classifier(&self) -> &MotionClassifier {
        &self.classifier
    }
}

/// Builder for JuggleSession
pub struct JuggleSessionBuilder {
    config: Option<JuggleConfig>,
    event_bus: Option<Arc<EventBus>>,
    handler: Option<Arc<dyn ActionHandler>>,
}

impl Default for JuggleSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl JuggleSessionBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: None,
            event_bus: None,
            handler: None,
        }
    }

    pub fn config(mut self, config: JuggleConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Override the action built from the configuration
    pub fn handler(mut self, handler: Arc<dyn ActionHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Build the session; missing parts fall back to defaults
    pub fn build(self) -> Result<JuggleSession> {
        let config = self.config.unwrap_or_default();
        // Checked before the bus is sized from it
        config.validate()?;

        let event_bus = self
            .event_bus
            .unwrap_or_else(|| Arc::new(EventBus::new(config.system.event_bus_capacity)));

        match self.handler {
            Some(handler) => JuggleSession::with_handler(config, event_bus, handler),
            None => JuggleSession::new(config, event_bus),
        }
    }
}
