//! Every controller, learned or rule-based, must drive the intersection through the program
//! in order, with exact clearance intervals and green times inside the configured bounds.

use async_trait::async_trait;
use greenwave::environment::{
    EnvironmentFactory, EnvironmentSession, QueueObservation, SessionConfig,
    SimulatedIntersectionFactory, SimulationConfig,
};
use greenwave::error::Result;
use greenwave::rl::{AgentConfig, DqnAgent, TrainingConfig, TrainingOrchestrator};
use greenwave::signal::{
    build_program, AdaptiveBaseline, ControllerRun, FixedTime, GreenTiming, PhaseKind,
    SignalProgram,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// (tick, phase index) for every `apply_phase` call
type PhaseLog = Arc<Mutex<Vec<(u64, usize)>>>;

struct RecordingSession {
    inner: Box<dyn EnvironmentSession>,
    tick: u64,
    log: PhaseLog,
}

#[async_trait]
impl EnvironmentSession for RecordingSession {
    async fn step(&mut self, n_ticks: u32) -> Result<()> {
        self.inner.step(n_ticks).await?;
        self.tick += u64::from(n_ticks);
        Ok(())
    }

    fn observe(&self) -> Result<QueueObservation> {
        self.inner.observe()
    }

    fn list_active_entities(&self) -> Result<HashSet<String>> {
        self.inner.list_active_entities()
    }

    fn get_waiting_time(&self, id: &str) -> Result<f64> {
        self.inner.get_waiting_time(id)
    }

    fn apply_phase(&mut self, phase_index: usize) -> Result<()> {
        self.log.lock().unwrap().push((self.tick, phase_index));
        self.inner.apply_phase(phase_index)
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await
    }
}

struct RecordingFactory {
    inner: SimulatedIntersectionFactory,
    logs: Mutex<Vec<PhaseLog>>,
}

impl RecordingFactory {
    fn new() -> Self {
        Self {
            inner: SimulatedIntersectionFactory::new(SimulationConfig {
                seed: Some(11),
                ..SimulationConfig::default()
            }),
            logs: Mutex::new(Vec::new()),
        }
    }

    fn logs(&self) -> Vec<Vec<(u64, usize)>> {
        self.logs
            .lock()
            .unwrap()
            .iter()
            .map(|log| log.lock().unwrap().clone())
            .collect()
    }
}

#[async_trait]
impl EnvironmentFactory for RecordingFactory {
    async fn start(&self, config: &SessionConfig) -> Result<Box<dyn EnvironmentSession>> {
        let inner = self.inner.start(config).await?;
        let log = PhaseLog::default();
        self.logs.lock().unwrap().push(log.clone());
        Ok(Box::new(RecordingSession {
            inner,
            tick: 0,
            log,
        }))
    }
}

fn program() -> SignalProgram {
    build_program("GGrr", "rrGG", 22).unwrap()
}

/// Check one session's phase log; returns the number of completed green phases.
fn assert_safe(program: &SignalProgram, timing: GreenTiming, log: &[(u64, usize)]) -> usize {
    assert_eq!(log.first(), Some(&(0, 0)), "sessions start in phase 0");

    let mut greens = 0;
    for pair in log.windows(2) {
        let (start, phase) = pair[0];
        let (end, next) = pair[1];
        assert_eq!(next, (phase + 1) % 6, "phase {phase} followed by {next}");

        let held = end - start;
        match program.phase(phase).kind() {
            PhaseKind::Yellow => assert_eq!(held, 3, "yellow at tick {start}"),
            PhaseKind::AllRed => assert_eq!(held, 1, "all-red at tick {start}"),
            PhaseKind::Green => {
                greens += 1;
                assert!(
                    held >= u64::from(timing.min_green()) && held <= u64::from(timing.max_green()),
                    "green at tick {start} held for {held}"
                );
            }
        }
    }
    greens
}

#[tokio::test]
async fn learning_agent_cannot_shorten_clearance() {
    let factory = RecordingFactory::new();
    let timing = GreenTiming::default();
    let checkpoint = std::env::temp_dir()
        .join(format!("greenwave_safety_{}", uuid::Uuid::new_v4()))
        .join("dqn.json");
    let orchestrator = TrainingOrchestrator::new(
        &factory,
        program(),
        timing,
        TrainingConfig {
            episodes: 2,
            max_steps: 600,
            batch_size: 16,
            decision_interval: 5,
            checkpoint_path: checkpoint.to_string_lossy().into_owned(),
        },
    )
    .unwrap()
    .with_seed(Some(3));
    let mut agent = DqnAgent::new(AgentConfig {
        seed: Some(5),
        ..AgentConfig::default()
    })
    .unwrap();

    orchestrator.run(&mut agent).await.unwrap();

    let logs = factory.logs();
    assert_eq!(logs.len(), 2);
    for log in &logs {
        // 600 ticks cannot pass without at least a few full cycles at a 60-tick max green
        assert!(assert_safe(&program(), timing, log) >= 4);
    }
}

#[tokio::test]
async fn tight_green_bounds_are_respected() {
    let factory = RecordingFactory::new();
    let timing = GreenTiming::new(8, 12).unwrap();
    let checkpoint = std::env::temp_dir()
        .join(format!("greenwave_safety_{}", uuid::Uuid::new_v4()))
        .join("dqn.json");
    let orchestrator = TrainingOrchestrator::new(
        &factory,
        program(),
        timing,
        TrainingConfig {
            episodes: 1,
            max_steps: 400,
            batch_size: 8,
            decision_interval: 3,
            checkpoint_path: checkpoint.to_string_lossy().into_owned(),
        },
    )
    .unwrap();
    let mut agent = DqnAgent::new(AgentConfig {
        seed: Some(9),
        ..AgentConfig::default()
    })
    .unwrap();

    orchestrator.run(&mut agent).await.unwrap();
    assert_safe(&program(), timing, &factory.logs()[0]);
}

#[tokio::test]
async fn rule_based_controllers_follow_the_program() {
    let timing = GreenTiming::default();

    let factory = RecordingFactory::new();
    let runner = ControllerRun::new(&factory, program(), timing).with_seed(Some(2));
    runner.run(&AdaptiveBaseline::new(), 1800).await.unwrap();
    runner.run(&FixedTime::new(), 1800).await.unwrap();

    let logs = factory.logs();
    assert_eq!(logs.len(), 2);
    assert!(assert_safe(&program(), timing, &logs[0]) > 0);

    // Fixed time holds every green for exactly the programmed 22 ticks
    let fixed = &logs[1];
    assert_safe(&program(), timing, fixed);
    for pair in fixed.windows(2) {
        if program().phase(pair[0].1).kind() == PhaseKind::Green {
            assert_eq!(pair[1].0 - pair[0].0, 22);
        }
    }
}
