//! Fallback Simulator
//!
//! Replays a scripted workflow when the backend is unreachable. The plan is a
//! pure function of mode and input: pick a scenario, lay its content out at
//! fixed multiples of the mode interval, then add the feedback one interval
//! after the last content event.
//!
//! ```text
//! single, 2 arguments:   1000 ms arg   2000 ms arg   3000 ms feedback
//! debate, 2 turns:       2000 ms turn  4000 ms turn  6000 ms feedback
//! ```
//!
//! Running a plan serializes each event to the same JSON the live channel
//! sends and posts it to the session inbox as a raw frame, so it goes through
//! the Message Router exactly like live traffic.

pub mod scenarios;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::events::{
    DebateTurn, DefenderMove, Feedback, GeneratedArgument, InboundEvent, ProsecutorMove,
};
use crate::inbox::{post, InboundKind, InboxSender};
use crate::messages::OriginId;
use scenarios::Scenario;

// ============================================================================
// Configuration
// ============================================================================

/// Simulation style
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationMode {
    /// Single analysis: a sequence of `argument_generated` events
    #[default]
    Single,
    /// Debate: a sequence of `debate_turn` events
    Debate,
}

impl fmt::Display for SimulationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Debate => write!(f, "debate"),
        }
    }
}

impl FromStr for SimulationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" | "analysis" => Ok(Self::Single),
            "debate" => Ok(Self::Debate),
            other => Err(format!("unknown simulation mode `{other}` (expected single or debate)")),
        }
    }
}

/// Simulator timing
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// Step interval in single mode, in milliseconds
    pub single_interval_ms: u64,
    /// Step interval in debate mode, in milliseconds
    pub debate_interval_ms: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            single_interval_ms: 1000,
            debate_interval_ms: 2000,
        }
    }
}

impl SimulatorConfig {
    /// Step interval for `mode`
    #[must_use]
    pub fn interval(&self, mode: SimulationMode) -> Duration {
        match mode {
            SimulationMode::Single => Duration::from_millis(self.single_interval_ms),
            SimulationMode::Debate => Duration::from_millis(self.debate_interval_ms),
        }
    }
}

// ============================================================================
// Planning
// ============================================================================

/// An event and when to emit it, relative to simulation start
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduledEvent {
    /// The event to emit
    pub event: InboundEvent,
    /// Offset from simulation start
    pub fire_at: Duration,
}

/// A fully determined simulation
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationPlan {
    /// Name of the selected scenario
    pub scenario: &'static str,
    /// Mode the plan was built for
    pub mode: SimulationMode,
    /// Events in emission order
    pub events: Vec<ScheduledEvent>,
}

/// Build the schedule for `input` in `mode`
#[must_use]
pub fn plan(mode: SimulationMode, input: &str, config: &SimulatorConfig) -> SimulationPlan {
    let scenario = scenarios::select(input);
    let interval = config.interval(mode);

    let mut content = match mode {
        SimulationMode::Single => argument_events(scenario),
        SimulationMode::Debate => turn_events(scenario),
    };
    content.push(feedback_event(scenario));

    let events = content
        .into_iter()
        .zip(1u32..)
        .map(|(event, step)| ScheduledEvent {
            event,
            fire_at: interval * step,
        })
        .collect();

    SimulationPlan {
        scenario: scenario.name,
        mode,
        events,
    }
}

fn argument_events(scenario: &Scenario) -> Vec<InboundEvent> {
    scenario
        .arguments
        .iter()
        .map(|a| {
            InboundEvent::ArgumentGenerated(GeneratedArgument {
                agent: a.agent.to_string(),
                content: a.content.to_string(),
                thinking: a.thinking.to_string(),
                timestamp: None,
            })
        })
        .collect()
}

fn turn_events(scenario: &Scenario) -> Vec<InboundEvent> {
    scenario
        .turns
        .iter()
        .zip(1u32..)
        .map(|(t, turn)| {
            InboundEvent::DebateTurn(DebateTurn {
                turn,
                prosecutor: ProsecutorMove {
                    argument: t.prosecutor.to_string(),
                    thinking: t.prosecutor_thinking.to_string(),
                },
                defender: DefenderMove {
                    response: t.defender.to_string(),
                    thinking: t.defender_thinking.to_string(),
                },
            })
        })
        .collect()
}

fn feedback_event(scenario: &Scenario) -> InboundEvent {
    let owned = |items: &[&str]| -> Vec<String> { items.iter().map(|s| (*s).to_string()).collect() };
    InboundEvent::FeedbackReady(Feedback {
        recommendations: owned(scenario.feedback.recommendations),
        strengths: owned(scenario.feedback.strengths),
        weaknesses: owned(scenario.feedback.weaknesses),
        summary: Some(scenario.feedback.summary.to_string()),
    })
}

// ============================================================================
// Runner
// ============================================================================

/// Handle to a running simulation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SimulationHandle(OriginId);

impl SimulationHandle {
    /// Origin tag carried by everything this simulation posts to the inbox
    #[must_use]
    pub fn origin(&self) -> OriginId {
        self.0
    }
}

impl fmt::Display for SimulationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sim_{}", self.0 .0)
    }
}

struct Running {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Runs simulation plans on timers
pub struct Simulator {
    config: SimulatorConfig,
    inbox: InboxSender,
    running: HashMap<SimulationHandle, Running>,
}

impl Simulator {
    /// Create a simulator posting to `inbox`
    #[must_use]
    pub fn new(config: SimulatorConfig, inbox: InboxSender) -> Self {
        Self {
            config,
            inbox,
            running: HashMap::new(),
        }
    }

    /// Timing in use
    #[must_use]
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Plan and start a simulation; must be called within a tokio runtime
    pub fn start(&mut self, mode: SimulationMode, input: &str) -> SimulationHandle {
        let plan = plan(mode, input, &self.config);
        let handle = SimulationHandle(OriginId::next());
        let cancel = CancellationToken::new();

        tracing::info!(
            %handle,
            scenario = plan.scenario,
            %mode,
            events = plan.events.len(),
            "Starting fallback simulation"
        );

        let task = tokio::spawn(run_plan(handle, plan, self.inbox.clone(), cancel.clone()));
        self.running.insert(handle, Running { cancel, task });
        handle
    }

    /// Cancel every pending event of a simulation; returns whether it was running
    pub fn cancel(&mut self, handle: SimulationHandle) -> bool {
        match self.running.remove(&handle) {
            Some(running) => {
                running.cancel.cancel();
                tracing::debug!(%handle, "Simulation cancelled");
                true
            }
            None => false,
        }
    }

    /// Forget a simulation that delivered its last event
    pub fn finished(&mut self, handle: SimulationHandle) {
        self.running.remove(&handle);
    }

    /// Whether a simulation still has events pending
    #[must_use]
    pub fn is_running(&self, handle: SimulationHandle) -> bool {
        self.running
            .get(&handle)
            .is_some_and(|r| !r.task.is_finished())
    }

    /// Cancel every simulation without waiting
    pub fn cancel_all(&mut self) {
        for (_, running) in self.running.drain() {
            running.cancel.cancel();
        }
    }

    /// Cancel every simulation and wait for the tasks to stop
    pub async fn shutdown(&mut self) {
        let tasks: Vec<_> = self
            .running
            .drain()
            .map(|(_, running)| {
                running.cancel.cancel();
                running.task
            })
            .collect();

        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Simulation task ended abnormally");
            }
        }
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("config", &self.config)
            .field("running", &self.running.len())
            .finish()
    }
}

async fn run_plan(
    handle: SimulationHandle,
    plan: SimulationPlan,
    inbox: InboxSender,
    cancel: CancellationToken,
) {
    let start = Instant::now();

    for scheduled in plan.events {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            () = tokio::time::sleep_until(start + scheduled.fire_at) => {}
        }

        let frame = match serde_json::to_string(&stamp(scheduled.event)) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(%handle, error = %e, "Failed to serialize simulated event");
                continue;
            }
        };
        if !post(&inbox, handle.origin(), InboundKind::Frame(frame)) {
            return;
        }
    }

    post(&inbox, handle.origin(), InboundKind::SimulationFinished);
    tracing::debug!(%handle, "Simulation finished");
}

/// Give simulated arguments an emission timestamp like the backend does
fn stamp(event: InboundEvent) -> InboundEvent {
    match event {
        InboundEvent::ArgumentGenerated(mut argument) if argument.timestamp.is_none() => {
            argument.timestamp = Some(chrono::Utc::now().to_rfc3339());
            InboundEvent::ArgumentGenerated(argument)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbox::inbox;
    use pretty_assertions::assert_eq;

    fn offsets(plan: &SimulationPlan) -> Vec<u64> {
        plan.events
            .iter()
            .map(|e| u64::try_from(e.fire_at.as_millis()).unwrap())
            .collect()
    }

    #[test]
    fn test_single_mode_personal_injury_schedule() {
        let plan = plan(
            SimulationMode::Single,
            "texting while walking",
            &SimulatorConfig::default(),
        );

        assert_eq!(plan.scenario, "personal_injury");
        assert_eq!(offsets(&plan), vec![1000, 2000, 3000]);
        let tags: Vec<_> = plan.events.iter().map(|e| e.event.tag()).collect();
        assert_eq!(
            tags,
            vec!["argument_generated", "argument_generated", "feedback_ready"]
        );
    }

    #[test]
    fn test_debate_mode_uses_turns_and_longer_interval() {
        let plan = plan(
            SimulationMode::Debate,
            "slip and fall",
            &SimulatorConfig::default(),
        );

        assert_eq!(offsets(&plan), vec![2000, 4000, 6000]);
        match &plan.events[1].event {
            InboundEvent::DebateTurn(turn) => assert_eq!(turn.turn, 2),
            other => panic!("expected debate turn, got {other:?}"),
        }
    }

    #[test]
    fn test_generic_scenario_is_single_step() {
        let plan = plan(SimulationMode::Single, "hello", &SimulatorConfig::default());
        assert_eq!(plan.scenario, "generic");
        assert_eq!(offsets(&plan), vec![1000, 2000]);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let config = SimulatorConfig::default();
        assert_eq!(
            plan(SimulationMode::Debate, "contract dispute", &config),
            plan(SimulationMode::Debate, "contract dispute", &config)
        );
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("Debate".parse::<SimulationMode>().unwrap(), SimulationMode::Debate);
        assert_eq!("single".parse::<SimulationMode>().unwrap(), SimulationMode::Single);
        assert!("both".parse::<SimulationMode>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_runner_emits_frames_on_schedule() {
        let (tx, mut rx) = inbox();
        let mut simulator = Simulator::new(SimulatorConfig::default(), tx);
        let start = Instant::now();
        let handle = simulator.start(SimulationMode::Single, "texting while walking");

        let mut fired = Vec::new();
        loop {
            let item = rx.recv().await.unwrap();
            assert_eq!(item.origin, handle.origin());
            match item.kind {
                InboundKind::Frame(frame) => {
                    let event: InboundEvent = serde_json::from_str(&frame).unwrap();
                    fired.push((event.tag(), start.elapsed().as_millis()));
                }
                InboundKind::SimulationFinished => break,
                other => panic!("unexpected {other:?}"),
            }
        }

        assert_eq!(
            fired,
            vec![
                ("argument_generated", 1000),
                ("argument_generated", 2000),
                ("feedback_ready", 3000),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_pending_events() {
        let (tx, mut rx) = inbox();
        let mut simulator = Simulator::new(SimulatorConfig::default(), tx);
        let handle = simulator.start(SimulationMode::Single, "texting while walking");

        let first = rx.recv().await.unwrap();
        assert!(matches!(first.kind, InboundKind::Frame(_)));

        assert!(simulator.cancel(handle));
        assert!(!simulator.cancel(handle));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
    }
}
