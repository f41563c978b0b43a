//! Training Loop
//!
//! Episodic loop coordinating the DQN agent, the signal state machine and the environment.
//! The agent only chooses which group it wants green; every phase change still goes through
//! [`SignalStateMachine`], so learning can never shorten a clearance interval.

use serde::Serialize;
use tracing::{error, info, warn};

use crate::environment::{
    total_waiting_time, EnvironmentFactory, EnvironmentSession, SessionConfig,
};
use crate::error::{GreenwaveError, Result};
use crate::rl::agent::DqnAgent;
use crate::rl::config::TrainingConfig;
use crate::rl::memory::Experience;
use crate::rl::training::checkpointing::Checkpointer;
use crate::signal::{GreenTiming, MovementGroup, SignalProgram, SignalStateMachine};

/// Reward for one decision interval: positive when aggregate waiting time went down.
pub fn interval_reward(waiting_before: f64, waiting_after: f64) -> f64 {
    waiting_before - waiting_after
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Epsilon-greedy actions, experiences stored, learning updates applied
    Train,
    /// Greedy actions, agent left untouched
    Evaluate,
}

/// Episode result
#[derive(Debug, Clone, Default, Serialize)]
pub struct EpisodeResult {
    pub episode: usize,
    /// Sum of interval rewards
    pub total_reward: f64,
    pub decisions: u64,
    pub ticks: u64,
    pub phase_transitions: u64,
    pub learn_updates: u64,
    /// Mean learning loss over the episode's updates
    pub mean_loss: Option<f64>,
    /// Sum over ticks of halted vehicles
    pub total_delay_ticks: u64,
    /// Exploration rate at episode end
    pub epsilon: f64,
    pub checkpoint_saved: bool,
}

/// Aggregate over a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrainingStats {
    pub episodes: usize,
    pub decisions: u64,
    pub updates: u64,
    pub best_reward: Option<f64>,
    pub checkpoint_failures: usize,
}

impl TrainingStats {
    pub fn from_results(results: &[EpisodeResult]) -> Self {
        Self {
            episodes: results.len(),
            decisions: results.iter().map(|r| r.decisions).sum(),
            updates: results.iter().map(|r| r.learn_updates).sum(),
            best_reward: results
                .iter()
                .map(|r| r.total_reward)
                .max_by(|a, b| a.total_cmp(b)),
            checkpoint_failures: results.iter().filter(|r| !r.checkpoint_saved).count(),
        }
    }
}

pub struct TrainingOrchestrator<'a> {
    factory: &'a dyn EnvironmentFactory,
    program: SignalProgram,
    timing: GreenTiming,
    config: TrainingConfig,
    checkpointer: Checkpointer,
    seed: Option<u64>,
}

impl<'a> TrainingOrchestrator<'a> {
    pub fn new(
        factory: &'a dyn EnvironmentFactory,
        program: SignalProgram,
        timing: GreenTiming,
        config: TrainingConfig,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|errors| GreenwaveError::Configuration(errors.join("; ")))?;
        let checkpointer = Checkpointer::new(&config.checkpoint_path);
        Ok(Self {
            factory,
            program,
            timing,
            config,
            checkpointer,
            seed: None,
        })
    }

    /// Base seed for environment sessions; episode `e` uses `seed + e`.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Run every configured episode.
    ///
    /// An environment failure aborts the run; checkpoints written by earlier episodes are left
    /// as they are. A failed save is logged and the run carries on.
    pub async fn run(&self, agent: &mut DqnAgent) -> Result<Vec<EpisodeResult>> {
        let mut results = Vec::with_capacity(self.config.episodes);

        info!(
            episodes = self.config.episodes,
            max_steps = self.config.max_steps,
            batch_size = self.config.batch_size,
            checkpoint = %self.checkpointer.path().display(),
            "starting training run"
        );

        for episode in 0..self.config.episodes {
            let mut result = match self.run_episode(episode, agent, Mode::Train).await {
                Ok(result) => result,
                Err(e) => {
                    error!(episode = episode + 1, "episode aborted: {}", e);
                    return Err(e);
                }
            };

            match agent.save(self.checkpointer.path()) {
                Ok(()) => result.checkpoint_saved = true,
                Err(e) if !e.is_fatal_to_run() => {
                    warn!(episode = episode + 1, "checkpoint save failed: {}", e)
                }
                Err(e) => return Err(e),
            }

            info!(
                "Episode: {}/{} | Score: {:.2} | Epsilon: {:.2} | Updates: {}",
                episode + 1,
                self.config.episodes,
                result.total_reward,
                result.epsilon,
                result.learn_updates
            );
            results.push(result);
        }

        Ok(results)
    }

    /// Greedy rollout of the current weights without learning.
    pub async fn evaluate(&self, agent: &mut DqnAgent) -> Result<EpisodeResult> {
        let result = self.run_episode(0, agent, Mode::Evaluate).await?;
        info!(
            reward = result.total_reward,
            delay_ticks = result.total_delay_ticks,
            "evaluation complete"
        );
        Ok(result)
    }

    async fn run_episode(
        &self,
        episode: usize,
        agent: &mut DqnAgent,
        mode: Mode,
    ) -> Result<EpisodeResult> {
        let seed = self.seed.map(|s| s.wrapping_add(episode as u64));
        let session_config = SessionConfig::new(self.program.clone(), seed);
        let mut session = self.factory.start(&session_config).await?;

        let outcome = self.drive(session.as_mut(), episode, agent, mode).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close session {}: {}", session_config.session_id, e);
        }
        outcome
    }

    async fn drive(
        &self,
        session: &mut dyn EnvironmentSession,
        episode: usize,
        agent: &mut DqnAgent,
        mode: Mode,
    ) -> Result<EpisodeResult> {
        let mut machine = SignalStateMachine::new(self.program.clone(), self.timing);
        let mut result = EpisodeResult {
            episode,
            ..EpisodeResult::default()
        };
        let mut loss_sum = 0.0;

        session.apply_phase(machine.current_index())?;
        let mut state = session.observe()?.to_features();

        while machine.ticks() < self.config.max_steps {
            let action = match mode {
                Mode::Train => agent.act(&state)?,
                Mode::Evaluate => agent.greedy_action(&state)?,
            };
            let desired = MovementGroup::from_action(action).ok_or_else(|| {
                GreenwaveError::Validation(format!("agent produced invalid action {action}"))
            })?;

            let waiting_before = total_waiting_time(session)?;

            let remaining = self.config.max_steps - machine.ticks();
            let interval = u64::from(self.config.decision_interval).min(remaining);
            for _ in 0..interval {
                session.step(1).await?;
                result.total_delay_ticks += u64::from(session.observe()?.total());

                let request = desired != machine.active_group();
                if let Some(transition) = machine.tick(request) {
                    session.apply_phase(transition.to)?;
                }
            }

            let waiting_after = total_waiting_time(session)?;
            let reward = interval_reward(waiting_before, waiting_after);
            let next_state = session.observe()?.to_features();

            result.decisions += 1;
            result.total_reward += reward;

            if mode == Mode::Train {
                agent.remember(Experience::new(state, action, reward, next_state, false))?;
                if agent.memory_len() >= self.config.batch_size {
                    let stats = agent.learn(self.config.batch_size)?;
                    loss_sum += stats.loss;
                    result.learn_updates += 1;
                }
            }
            state = next_state;
        }

        result.ticks = machine.ticks();
        result.phase_transitions = machine.transitions();
        result.epsilon = agent.epsilon();
        if result.learn_updates > 0 {
            result.mean_loss = Some(loss_sum / result.learn_updates as f64);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{MockEnvironmentFactory, SimulatedIntersectionFactory, SimulationConfig};
    use crate::rl::config::AgentConfig;
    use crate::signal::build_program;
    use std::env::temp_dir;

    fn program() -> SignalProgram {
        build_program("GGrr", "rrGG", 22).unwrap()
    }

    fn training_config(episodes: usize, max_steps: u64) -> TrainingConfig {
        TrainingConfig {
            episodes,
            max_steps,
            batch_size: 8,
            decision_interval: 5,
            checkpoint_path: temp_dir()
                .join(format!("greenwave_trainer_{}", uuid::Uuid::new_v4()))
                .join("dqn.json")
                .to_string_lossy()
                .into_owned(),
        }
    }

    fn agent() -> DqnAgent {
        DqnAgent::new(AgentConfig {
            seed: Some(4),
            ..AgentConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn reward_is_reduction_in_waiting_time() {
        assert_eq!(interval_reward(120.0, 80.0), 40.0);
        assert_eq!(interval_reward(80.0, 120.0), -40.0);
    }

    #[tokio::test]
    async fn episode_counts_decisions_and_updates() {
        let factory = SimulatedIntersectionFactory::new(SimulationConfig::default());
        let orchestrator =
            TrainingOrchestrator::new(&factory, program(), GreenTiming::default(), training_config(1, 100))
                .unwrap()
                .with_seed(Some(1));
        let mut agent = agent();

        let results = orchestrator.run(&mut agent).await.unwrap();
        let r = &results[0];

        assert_eq!(r.ticks, 100);
        assert_eq!(r.decisions, 20);
        // Learning starts once 8 experiences are buffered
        assert_eq!(r.learn_updates, 13);
        assert_eq!(agent.updates(), 13);
        assert_eq!(agent.memory_len(), 20);
        assert!((r.epsilon - 0.995f64.powi(13)).abs() < 1e-9);
        assert!(r.checkpoint_saved);
    }

    #[tokio::test]
    async fn partial_final_interval_stops_at_max_steps() {
        let factory = SimulatedIntersectionFactory::new(SimulationConfig::default());
        let orchestrator =
            TrainingOrchestrator::new(&factory, program(), GreenTiming::default(), training_config(1, 12))
                .unwrap();
        let results = orchestrator.run(&mut agent()).await.unwrap();
        assert_eq!(results[0].ticks, 12);
        assert_eq!(results[0].decisions, 3);
    }

    #[tokio::test]
    async fn evaluation_leaves_agent_untouched() {
        let factory = SimulatedIntersectionFactory::new(SimulationConfig::default());
        let orchestrator =
            TrainingOrchestrator::new(&factory, program(), GreenTiming::default(), training_config(1, 200))
                .unwrap();
        let mut agent = agent();

        let result = orchestrator.evaluate(&mut agent).await.unwrap();
        assert_eq!(result.ticks, 200);
        assert_eq!(result.learn_updates, 0);
        assert_eq!(agent.memory_len(), 0);
        assert_eq!(agent.epsilon(), 1.0);
    }

    #[tokio::test]
    async fn unavailable_simulator_aborts_before_any_checkpoint() {
        let mut factory = MockEnvironmentFactory::new();
        factory.expect_start().times(1).returning(|_| {
            Err(GreenwaveError::EnvironmentUnavailable(
                "simulator binary not found".to_string(),
            ))
        });

        let config = training_config(3, 50);
        let checkpoint = config.checkpoint_path.clone();
        let orchestrator =
            TrainingOrchestrator::new(&factory, program(), GreenTiming::default(), config).unwrap();

        let err = orchestrator.run(&mut agent()).await.unwrap_err();
        assert!(matches!(err, GreenwaveError::EnvironmentUnavailable(_)));
        assert!(!std::path::Path::new(&checkpoint).exists());
    }

    #[test]
    fn rejects_zero_batch_size() {
        let factory = SimulatedIntersectionFactory::default();
        let config = TrainingConfig {
            batch_size: 0,
            ..training_config(1, 10)
        };
        assert!(matches!(
            TrainingOrchestrator::new(&factory, program(), GreenTiming::default(), config),
            Err(GreenwaveError::Configuration(_))
        ));
    }

    #[test]
    fn stats_summarise_results() {
        let results = vec![
            EpisodeResult {
                total_reward: -5.0,
                decisions: 10,
                learn_updates: 3,
                checkpoint_saved: true,
                ..EpisodeResult::default()
            },
            EpisodeResult {
                total_reward: 2.5,
                decisions: 10,
                learn_updates: 10,
                checkpoint_saved: false,
                ..EpisodeResult::default()
            },
        ];
        let stats = TrainingStats::from_results(&results);
        assert_eq!(stats.episodes, 2);
        assert_eq!(stats.decisions, 20);
        assert_eq!(stats.updates, 13);
        assert_eq!(stats.best_reward, Some(2.5));
        assert_eq!(stats.checkpoint_failures, 1);
    }
}
