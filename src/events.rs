use crate::error::EventBusError;
use crate::frame::{MotionLabel, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events that can occur during a juggling session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JuggleEvent {
    /// A hand's motion was classified for one frame
    MotionClassified {
        identity: String,
        label: MotionLabel,
        timestamp: Timestamp,
    },
    /// An upward swing extended the alternating chain
    AlternationAdvanced {
        identity: String,
        count: u32,
        timestamp: Timestamp,
    },
    /// The alternating pattern reached its threshold
    PatternConfirmed {
        event_id: String,
        identity: String,
        alternations: u32,
        timestamp: Timestamp,
    },
    /// The threshold was reached while an action was still running
    TriggerSuppressed { count: u32, timestamp: Timestamp },
    /// The triggered action has started
    ActionStarted { event_id: String },
    /// The triggered action finished and the detector is re-armed
    ActionCompleted {
        event_id: String,
        success: bool,
        error: Option<String>,
    },
    /// An observation was rejected at the classifier boundary
    InputRejected { identity: String, reason: String },
    /// Session shutdown requested
    ShutdownRequested { reason: String },
}

impl JuggleEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            JuggleEvent::MotionClassified {
                identity, label, ..
            } => format!("{}: {}", identity, label),
            JuggleEvent::AlternationAdvanced { identity, count, .. } => {
                format!("Alternating motion from {} (count {})", identity, count)
            }
            JuggleEvent::PatternConfirmed {
                event_id,
                alternations,
                ..
            } => format!(
                "Juggling motion confirmed after {} alternations ({})",
                alternations, event_id
            ),
            JuggleEvent::TriggerSuppressed { count, .. } => {
                format!("Trigger suppressed at count {} (action running)", count)
            }
            JuggleEvent::ActionStarted { event_id } => format!("Action started: {}", event_id),
            JuggleEvent::ActionCompleted {
                event_id,
                success,
                error,
            } => match (success, error) {
                (true, _) => format!("Action completed: {}", event_id),
                (false, Some(error)) => format!("Action failed: {} ({})", event_id, error),
                (false, None) => format!("Action failed: {}", event_id),
            },
            JuggleEvent::InputRejected { identity, reason } => {
                format!("Rejected input for '{}': {}", identity, reason)
            }
            JuggleEvent::ShutdownRequested { reason } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            JuggleEvent::MotionClassified { .. } => "motion_classified",
            JuggleEvent::AlternationAdvanced { .. } => "alternation_advanced",
            JuggleEvent::PatternConfirmed { .. } => "pattern_confirmed",
            JuggleEvent::TriggerSuppressed { .. } => "trigger_suppressed",
            JuggleEvent::ActionStarted { .. } => "action_started",
            JuggleEvent::ActionCompleted { .. } => "action_completed",
            JuggleEvent::InputRejected { .. } => "input_rejected",
            JuggleEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

/// Event bus for session observers using broadcast channels
pub struct EventBus {
    sender: broadcast::Sender<JuggleEvent>,
    debug_logging: bool,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: false,
        }
    }

    /// Create a new event bus with debug logging enabled
    pub fn with_debug_logging(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            debug_logging: true,
        }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<JuggleEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers.
    ///
    /// Fails only when nobody is subscribed; frame processing treats that as harmless.
    pub fn publish(&self, event: JuggleEvent) -> Result<usize, EventBusError> {
        match &event {
            JuggleEvent::PatternConfirmed { .. } => info!("{}", event.description()),
            JuggleEvent::ActionCompleted { success: false, .. } => {
                error!("{}", event.description())
            }
            JuggleEvent::ShutdownRequested { reason } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {
                if self.debug_logging {
                    debug!("Publishing event: {}", event.description());
                }
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            debug_logging: self.debug_logging,
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Accept events concerning specific hands
    Identities(Vec<String>),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &JuggleEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Identities(identities) => match event {
                JuggleEvent::MotionClassified { identity, .. }
                | JuggleEvent::AlternationAdvanced { identity, .. }
                | JuggleEvent::PatternConfirmed { identity, .. }
                | JuggleEvent::InputRejected { identity, .. } => identities.contains(identity),
                _ => false,
            },
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<JuggleEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(
        receiver: broadcast::Receiver<JuggleEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<JuggleEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<JuggleEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => {
                    return Ok(None);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

/// Event counts collected over a session
#[derive(Debug, Default, Clone)]
pub struct EventMetrics {
    pub total_events: u64,
    pub events_by_type: HashMap<&'static str, u64>,
    pub lagged: u64,
}

impl EventMetrics {
    /// Record an event
    pub fn record_event(&mut self, event: &JuggleEvent) {
        self.total_events += 1;
        *self.events_by_type.entry(event.event_type()).or_insert(0) += 1;
    }

    pub fn record_lag(&mut self, skipped: u64) {
        self.lagged += skipped;
    }

    pub fn count(&self, event_type: &str) -> u64 {
        self.events_by_type.get(event_type).copied().unwrap_or(0)
    }

    /// Human-readable summary of the session, one counter per line
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Session summary:".to_string(),
            format!("  Total events: {}", self.total_events),
        ];
        if self.lagged > 0 {
            lines.push(format!("  Missed (lagged): {}", self.lagged));
        }

        let mut types: Vec<_> = self.events_by_type.iter().collect();
        types.sort();
        lines.extend(
            types
                .into_iter()
                .map(|(event_type, count)| format!("  {}: {}", event_type, count)),
        );
        lines.join("\n")
    }

    /// Print the summary on stdout, independent of the log filter
    pub fn print_summary(&self) {
        println!("{}", self.summary());
    }

    /// Reset all metrics
    pub fn reset(&mut self) {
        self.total_events = 0;
        self.events_by_type.clear();
        self.lagged = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    fn classified(identity: &str) -> JuggleEvent {
        JuggleEvent::MotionClassified {
            identity: identity.to_string(),
            label: MotionLabel::MovingUp,
            timestamp: Timestamp::ZERO,
        }
    }

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let subscriber_count = event_bus.publish(classified("left")).unwrap();
        assert_eq!(subscriber_count, 1);

        let received = receiver.recv().await.unwrap();
        assert_eq!(received, classified("left"));
    }

    #[test]
    fn test_publish_without_subscribers_fails() {
        let event_bus = EventBus::new(10);
        assert!(!event_bus.has_subscribers());
        assert!(event_bus.publish(classified("left")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus
            .publish(JuggleEvent::ActionStarted {
                event_id: "e1".to_string(),
            })
            .unwrap();

        let _ = timeout(Duration::from_millis(100), receiver1.recv())
            .await
            .unwrap()
            .unwrap();
        let _ = timeout(Duration::from_millis(100), receiver2.recv())
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_event_filter() {
        let filter = EventFilter::EventTypes(vec!["pattern_confirmed"]);
        let confirmed = JuggleEvent::PatternConfirmed {
            event_id: "e1".to_string(),
            identity: "right".to_string(),
            alternations: 4,
            timestamp: Timestamp::ZERO,
        };

        assert!(filter.matches(&confirmed));
        assert!(!filter.matches(&classified("left")));

        let by_hand = EventFilter::Identities(vec!["right".to_string()]);
        assert!(by_hand.matches(&confirmed));
        assert!(!by_hand.matches(&classified("left")));
        assert!(!by_hand.matches(&JuggleEvent::ShutdownRequested {
            reason: "test".to_string()
        }));
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let receiver = event_bus.subscribe();
        let filter = EventFilter::EventTypes(vec!["action_completed"]);
        let mut filtered = EventReceiver::new(receiver, filter, "test".to_string());

        event_bus.publish(classified("left")).unwrap();
        event_bus
            .publish(JuggleEvent::ActionCompleted {
                event_id: "e1".to_string(),
                success: true,
                error: None,
            })
            .unwrap();

        let received = timeout(Duration::from_millis(100), filtered.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.event_type(), "action_completed");
        assert_eq!(filtered.try_recv().unwrap(), None);
    }

    #[tokio::test]
    async fn test_lagged_receiver_reports_skipped() {
        let event_bus = EventBus::new(2);
        let receiver = event_bus.subscribe();
        let mut filtered = EventReceiver::new(receiver, EventFilter::All, "slow".to_string());

        for hand in ["a", "b", "c", "d"] {
            event_bus.publish(classified(hand)).unwrap();
        }

        match filtered.recv().await {
            Err(EventBusError::Lagged { skipped }) => assert_eq!(skipped, 2),
            other => panic!("expected lag, got {:?}", other),
        }
    }

    #[test]
    fn test_event_properties() {
        let event = JuggleEvent::PatternConfirmed {
            event_id: "abc".to_string(),
            identity: "left".to_string(),
            alternations: 4,
            timestamp: Timestamp::ZERO,
        };

        assert_eq!(event.event_type(), "pattern_confirmed");
        assert!(event.description().contains("4 alternations"));
    }

    #[test]
    fn test_event_metrics() {
        let mut metrics = EventMetrics::default();
        metrics.record_event(&classified("left"));
        metrics.record_event(&classified("right"));
        metrics.record_event(&JuggleEvent::ShutdownRequested {
            reason: "done".to_string(),
        });
        metrics.record_lag(3);

        assert_eq!(metrics.total_events, 3);
        assert_eq!(metrics.count("motion_classified"), 2);
        assert_eq!(metrics.count("pattern_confirmed"), 0);
        assert_eq!(metrics.lagged, 3);

        let summary = metrics.summary();
        assert!(summary.contains("Total events: 3"));
        assert!(summary.contains("Missed (lagged): 3"));
        assert!(summary.contains("motion_classified: 2"));
        assert!(summary.contains("shutdown_requested: 1"));

        metrics.reset();
        assert_eq!(metrics.total_events, 0);
    }
}
