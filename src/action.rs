//! Actions run when the juggling pattern is confirmed.
//!
//! The detector never runs actions itself. [`ActionDispatcher`] spawns the
//! configured [`ActionHandler`] on its own task so frame processing keeps
//! going, and re-arms the detector when the handler returns, even when it
//! fails or panics.

use crate::analyzer::{ActionCompletion, TriggerEvent};
use crate::config::{ActionConfig, ActionKind};
use crate::error::ActionError;
use crate::events::{EventBus, JuggleEvent};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Something to do once the pattern is confirmed
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Run the action to completion
    async fn run(&self, trigger: &TriggerEvent) -> Result<(), ActionError>;

    /// Name used in logs
    fn name(&self) -> &str;
}

/// Logs the confirmation and returns immediately
#[derive(Debug, Default)]
pub struct LogAction;

#[async_trait]
impl ActionHandler for LogAction {
    async fn run(&self, trigger: &TriggerEvent) -> Result<(), ActionError> {
        info!(
            "Juggling motion detected! '{}' completed {} alternations at {}",
            trigger.identity, trigger.alternations, trigger.timestamp
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Runs an external program (e.g. a media player on a clip) and waits for it to exit
#[derive(Debug, Clone)]
pub struct CommandAction {
    program: String,
    args: Vec<String>,
}

impl CommandAction {
    pub fn new<S: Into<String>>(program: S, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from an argv list; `None` when the list is empty
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl ActionHandler for CommandAction {
    async fn run(&self, trigger: &TriggerEvent) -> Result<(), ActionError> {
        info!(
            "Launching '{}' for event {}",
            self.program, trigger.event_id
        );

        let status = Command::new(&self.program)
            .args(&self.args)
            .env("JUGGLECAM_EVENT_ID", &trigger.event_id)
            .env("JUGGLECAM_HAND", trigger.identity.as_str())
            .status()
            .await
            .map_err(|source| ActionError::Launch {
                program: self.program.clone(),
                source,
            })?;

        if status.success() {
            debug!("'{}' exited cleanly", self.program);
            Ok(())
        } else {
            Err(ActionError::ExitStatus {
                program: self.program.clone(),
                status: status.to_string(),
            })
        }
    }

    fn name(&self) -> &str {
        &self.program
    }
}

/// Build the handler described by the configuration
pub fn handler_from_config(config: &ActionConfig) -> Result<Arc<dyn ActionHandler>, ActionError> {
    match config.kind {
        ActionKind::Log => Ok(Arc::new(LogAction)),
        ActionKind::Command => CommandAction::from_argv(&config.command)
            .map(|action| Arc::new(action) as Arc<dyn ActionHandler>)
            .ok_or_else(|| ActionError::Task {
                details: "command action configured without a program".to_string(),
            }),
    }
}

/// Runs triggered actions off the frame-processing path
pub struct ActionDispatcher {
    handler: Arc<dyn ActionHandler>,
    completion: ActionCompletion,
    event_bus: Arc<EventBus>,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl ActionDispatcher {
    pub fn new(
        handler: Arc<dyn ActionHandler>,
        completion: ActionCompletion,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            handler,
            completion,
            event_bus,
            in_flight: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the handler for `trigger`. Must be called from within a tokio runtime.
    pub fn dispatch(&self, trigger: TriggerEvent) {
        let handler = Arc::clone(&self.handler);
        let completion = self.completion.clone();
        let event_bus = Arc::clone(&self.event_bus);

        debug!(
            "Dispatching action '{}' for event {}",
            handler.name(),
            trigger.event_id
        );

        let task = tokio::spawn(async move {
            let _ = event_bus.publish(JuggleEvent::ActionStarted {
                event_id: trigger.event_id.clone(),
            });

            // Run on an inner task so a panicking handler surfaces as a JoinError here
            let run_handler = Arc::clone(&handler);
            let run_trigger = trigger.clone();
            let result = match tokio::spawn(async move { run_handler.run(&run_trigger).await }).await
            {
                Ok(result) => result,
                Err(e) => Err(ActionError::Task {
                    details: e.to_string(),
                }),
            };
            if let Err(e) = &result {
                error!("Action '{}' failed: {}", handler.name(), e);
            }

            // Re-arm before announcing completion so observers see a ready detector
            completion.complete();

            let _ = event_bus.publish(JuggleEvent::ActionCompleted {
                event_id: trigger.event_id,
                success: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
            });
        });

        let mut in_flight = self.in_flight.lock();
        in_flight.retain(|handle| !handle.is_finished());
        in_flight.push(task);
    }

    /// Number of dispatched actions that have not finished yet
    pub fn in_flight(&self) -> usize {
        let mut in_flight = self.in_flight.lock();
        in_flight.retain(|handle| !handle.is_finished());
        in_flight.len()
    }

    /// Wait for every dispatched action to finish.
    ///
    /// All actions are awaited even if one of them fails; the first failure is returned.
    pub async fn wait_idle(&self) -> Result<(), ActionError> {
        let handles: Vec<_> = self.in_flight.lock().drain(..).collect();
        let mut first_error = None;
        for handle in handles {
            if let Err(e) = handle.await {
                // The dispatch task died before it could signal completion
                self.completion.complete();
                first_error.get_or_insert(ActionError::Task {
                    details: e.to_string(),
                });
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
