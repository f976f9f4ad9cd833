use crate::error::{FeedError, Result};
use crate::events::{EventBus, JuggleEvent};
use crate::feed::FrameSource;
use crate::frame::{HandFrame, HandObservation, Point, SessionClock};

use async_trait::async_trait;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const REST_Y: f64 = 0.6;
const RAISED_Y: f64 = 0.4;

/// Synthesizes hand frames from key presses so the detector can be tried without a camera.
///
/// `l` and `r` swing the left or right hand up and back down; `q` or Esc ends the feed.
pub struct KeyboardHandSimulator {
    event_bus: Arc<EventBus>,
    cancellation_token: CancellationToken,
    clock: SessionClock,
}

impl KeyboardHandSimulator {
    pub fn new(event_bus: Arc<EventBus>, clock: SessionClock) -> Self {
        Self {
            event_bus,
            cancellation_token: CancellationToken::new(),
            clock,
        }
    }

    /// Start listening for keyboard input and return the frame feed
    pub fn start(&self) -> Result<KeyboardFeed> {
        info!("Starting keyboard hand simulator - press L/R to swing a hand, Q to quit");

        let (tx, rx) = mpsc::channel(64);
        let event_bus = Arc::clone(&self.event_bus);
        let cancellation_token = self.cancellation_token.clone();
        let clock = self.clock;

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            // Both hands at rest gives the classifier its reference positions
            let _ = tx.blocking_send(rest_frame(&clock));

            loop {
                if cancellation_token.is_cancelled() {
                    debug!("Keyboard hand simulator stopping");
                    break;
                }

                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let key_event = match event::read() {
                            Ok(Event::Key(key_event)) if key_event.kind == KeyEventKind::Press => {
                                key_event
                            }
                            _ => continue,
                        };

                        let hand = match key_event.code {
                            KeyCode::Char('l') | KeyCode::Char('L') => "left",
                            KeyCode::Char('r') | KeyCode::Char('R') => "right",
                            KeyCode::Char('q') | KeyCode::Esc => {
                                info!("Quit key pressed - ending keyboard feed");
                                let _ = event_bus.publish(JuggleEvent::ShutdownRequested {
                                    reason: "User requested via keyboard".to_string(),
                                });
                                break;
                            }
                            other => {
                                debug!("Key pressed: {:?}", other);
                                continue;
                            }
                        };

                        debug!("Simulating upward swing of {} hand", hand);
                        if tx.blocking_send(swing_frame(&clock, hand)).is_err()
                            || tx.blocking_send(rest_frame(&clock)).is_err()
                        {
                            debug!("Keyboard feed receiver dropped");
                            break;
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            }
        });

        Ok(KeyboardFeed { receiver: rx })
    }

    /// Stop the keyboard simulator
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard hand simulator");
        self.cancellation_token.cancel();

        // Give the task a moment to clean up and disable raw mode
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = disable_raw_mode();

        Ok(())
    }
}

fn rest_frame(clock: &SessionClock) -> HandFrame {
    HandFrame::new(
        clock.now(),
        vec![
            HandObservation::new("left", Point::new(0.3, REST_Y)),
            HandObservation::new("right", Point::new(0.7, REST_Y)),
        ],
    )
}

fn swing_frame(clock: &SessionClock, raised: &str) -> HandFrame {
    let y_for = |hand: &str| if hand == raised { RAISED_Y } else { REST_Y };
    HandFrame::new(
        clock.now(),
        vec![
            HandObservation::new("left", Point::new(0.3, y_for("left"))),
            HandObservation::new("right", Point::new(0.7, y_for("right"))),
        ],
    )
}

/// Frames produced by [`KeyboardHandSimulator`]
pub struct KeyboardFeed {
    receiver: mpsc::Receiver<HandFrame>,
}

#[async_trait]
impl FrameSource for KeyboardFeed {
    async fn next_frame(&mut self) -> std::result::Result<Option<HandFrame>, FeedError> {
        Ok(self.receiver.recv().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::MotionClassifier;
    use crate::config::MotionConfig;
    use crate::frame::MotionLabel;

    #[tokio::test]
    async fn test_simulator_creation() {
        let event_bus = Arc::new(EventBus::new(100));
        let simulator = KeyboardHandSimulator::new(event_bus, SessionClock::start());

        assert!(!simulator.cancellation_token.is_cancelled());
    }

    #[tokio::test]
    async fn test_simulator_stop() {
        let event_bus = Arc::new(EventBus::new(100));
        let simulator = KeyboardHandSimulator::new(event_bus, SessionClock::start());

        simulator.stop().await.unwrap();
        assert!(simulator.cancellation_token.is_cancelled());
    }

    #[test]
    fn test_swing_frame_reads_as_upward_motion() {
        let clock = SessionClock::start();
        let mut classifier = MotionClassifier::new(MotionConfig::default());

        for hand in rest_frame(&clock).hands {
            classifier.classify(&hand.identity, hand.position, clock.now()).unwrap();
        }

        let swing = swing_frame(&clock, "right");
        let labels: Vec<_> = swing
            .hands
            .iter()
            .map(|hand| {
                classifier
                    .classify(&hand.identity, hand.position, swing.timestamp)
                    .unwrap()
            })
            .collect();

        assert_eq!(labels, vec![MotionLabel::Stationary, MotionLabel::MovingUp]);
    }

    #[tokio::test]
    async fn test_keyboard_feed_ends_when_sender_dropped() {
        let (tx, rx) = mpsc::channel(4);
        let mut feed = KeyboardFeed { receiver: rx };

        tx.send(rest_frame(&SessionClock::start())).await.unwrap();
        drop(tx);

        assert!(feed.next_frame().await.unwrap().is_some());
        assert!(feed.next_frame().await.unwrap().is_none());
    }
}
