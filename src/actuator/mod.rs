//! Servo and indicator actuation for accepted and rejected parts.

pub mod http;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info_span, warn};

use crate::error::ActuatorError;
use crate::models::Verdict;
use crate::state::Decision;

pub use http::HttpActuatorClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorColor {
    Red,
    Green,
}

impl IndicatorColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorColor::Red => "red",
            IndicatorColor::Green => "green",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorState {
    On,
    Off,
}

impl IndicatorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorState::On => "on",
            IndicatorState::Off => "off",
        }
    }
}

/// Remote device driving the sorting servo and the indicator lights.
///
/// Each call is a single attempt; implementations bound it with their own timeout.
#[async_trait]
pub trait ActuatorClient: Send + Sync {
    async fn set_position(&self, angle: i32) -> Result<String, ActuatorError>;

    async fn set_indicator(
        &self,
        color: IndicatorColor,
        state: IndicatorState,
    ) -> Result<String, ActuatorError>;

    async fn log(&self, message: &str) -> Result<String, ActuatorError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActuationStep {
    SetPosition(i32),
    SetIndicator(IndicatorColor, IndicatorState),
    Log(String),
    Settle(Duration),
}

impl fmt::Display for ActuationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuationStep::SetPosition(angle) => write!(f, "servo angle={angle}"),
            ActuationStep::SetIndicator(color, state) => {
                write!(f, "led {}={}", color.as_str(), state.as_str())
            }
            ActuationStep::Log(msg) => write!(f, "log {msg:?}"),
            ActuationStep::Settle(d) => write!(f, "settle {}ms", d.as_millis()),
        }
    }
}

/// Angles, messages and timing of the accept/reject sequences.
#[derive(Debug, Clone)]
pub struct ActuationPlan {
    pub accept_angle: i32,
    pub reject_angle: i32,
    pub accept_message: String,
    pub reject_message: String,
    pub settle: Duration,
}

impl Default for ActuationPlan {
    fn default() -> Self {
        Self {
            accept_angle: 0,
            reject_angle: 180,
            accept_message: "Good part detected".to_string(),
            reject_message: "Rejected part detected".to_string(),
            settle: Duration::from_secs(2),
        }
    }
}

impl ActuationPlan {
    /// Ordered steps executed for a verdict.
    pub fn steps(&self, verdict: Verdict) -> Vec<ActuationStep> {
        let (angle, color, message) = match verdict {
            Verdict::Good => (self.accept_angle, IndicatorColor::Green, &self.accept_message),
            Verdict::Bad => (self.reject_angle, IndicatorColor::Red, &self.reject_message),
        };
        vec![
            ActuationStep::SetPosition(angle),
            ActuationStep::SetIndicator(color, IndicatorState::On),
            ActuationStep::Log(message.clone()),
            ActuationStep::Settle(self.settle),
            ActuationStep::SetIndicator(color, IndicatorState::Off),
        ]
    }
}

/// What happened when a sequence ran. Failed commands are kept as strings.
#[derive(Debug, Clone, Default)]
pub struct SequenceReport {
    pub responses: Vec<String>,
    pub errors: Vec<String>,
}

impl SequenceReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Run every step of `steps` in order. A failing command does not stop the
/// remaining ones.
pub async fn run_sequence(client: &dyn ActuatorClient, steps: &[ActuationStep]) -> SequenceReport {
    let mut report = SequenceReport::default();
    for step in steps {
        let result = match step {
            ActuationStep::SetPosition(angle) => client.set_position(*angle).await,
            ActuationStep::SetIndicator(color, state) => client.set_indicator(*color, *state).await,
            ActuationStep::Log(message) => client.log(message).await,
            ActuationStep::Settle(duration) => {
                tokio::time::sleep(*duration).await;
                continue;
            }
        };
        match result {
            Ok(body) => {
                debug!(%step, body = %body.trim(), "actuator command ok");
                report.responses.push(body);
            }
            Err(err) => {
                warn!(%step, "actuator command failed: {err}");
                report.errors.push(format!("ERR:{err}"));
            }
        }
    }
    report
}

/// Fire-and-forget execution of actuation sequences on a tokio runtime.
#[derive(Clone)]
pub struct ActuatorDispatcher {
    client: Arc<dyn ActuatorClient>,
    plan: ActuationPlan,
    runtime: Handle,
}

impl ActuatorDispatcher {
    pub fn new(client: Arc<dyn ActuatorClient>, plan: ActuationPlan, runtime: Handle) -> Self {
        Self {
            client,
            plan,
            runtime,
        }
    }

    pub fn plan(&self) -> &ActuationPlan {
        &self.plan
    }

    /// Start the sequence for `decision` on its own task and return immediately.
    ///
    /// Safe to call from blocking threads; the task runs on the stored runtime.
    pub fn dispatch(&self, decision: &Decision) -> JoinHandle<SequenceReport> {
        let client = self.client.clone();
        let steps = self.plan.steps(decision.verdict);
        let span = info_span!(
            "actuation",
            decision = %decision.id,
            verdict = %decision.verdict,
        );
        self.runtime.spawn(
            async move {
                let report = run_sequence(client.as_ref(), &steps).await;
                if !report.is_clean() {
                    warn!(failed = report.errors.len(), "actuation sequence finished with errors");
                }
                report
            }
            .instrument(span),
        )
    }
}

impl fmt::Debug for ActuatorDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActuatorDispatcher")
            .field("plan", &self.plan)
            .finish()
    }
}
