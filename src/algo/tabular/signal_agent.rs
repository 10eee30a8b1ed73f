use std::{path::Path, time::Duration};

use log::{debug, info, trace, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    assert_interval,
    checkpoint::Checkpoint,
    decay::Constant,
    env::Environment,
    error::{Error, Result},
    exploration::{self, EpsilonGreedy, Policy},
    state::{self, RewardGrid, State, Tag, NUM_ARMS},
    util::{argmax, max_value},
};

use super::{QTable, NUM_ACTIONS};

/// Configuration for the [`SignalAgent`]
#[derive(Debug, Clone)]
pub struct SignalAgentConfig<P: Policy = EpsilonGreedy<Constant>> {
    /// Exploration policy, evaluated at the current episode count
    ///
    /// **Default**: epsilon greedy with a constant epsilon of `0.1`
    pub exploration: P,
    /// Learning rate
    ///
    /// **Default**: `0.5`
    pub alpha: f32,
    /// Discount factor
    ///
    /// **Default**: `1.0`
    pub gamma: f32,
    /// Terminal reward tags of the approach grid
    pub grid: RewardGrid,
    /// Steps after which [`SignalAgent::go`] gives up on reaching a terminal cell
    ///
    /// **Default**: `32`
    pub max_steps: u32,
    /// Seed for the agent's random number generator, `None` seeds from entropy
    pub seed: Option<u64>,
}

impl Default for SignalAgentConfig {
    fn default() -> Self {
        Self {
            exploration: EpsilonGreedy::default(),
            alpha: 0.5,
            gamma: 1.0,
            grid: RewardGrid::default(),
            max_steps: 32,
            seed: None,
        }
    }
}

/// Outcome of one episode run by [`SignalAgent::go`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeSummary {
    pub start: State,
    /// The first signal shown on the approach
    pub action: usize,
    /// Where the episode stopped
    pub end: State,
    /// Reward of the last update
    pub reward: f32,
    pub steps: u32,
    /// Time from the first signal to the end of the episode
    pub elapsed: Duration,
    /// `false` if the step limit was hit before a terminal cell
    pub completed: bool,
}

/// A tabular Q-learning agent that picks which turn signal to show on an intersection approach
///
/// The agent owns the episode: [`reset`](Self::reset) picks a starting arm, the host reports
/// detected tags through [`update`](Self::update), and the agent learns from the reward tag of
/// the cell it lands on.
///
/// Calls on one agent must be serialized by the host, there is no internal synchronization.
pub struct SignalAgent<P: Policy = EpsilonGreedy<Constant>> {
    q_table: QTable,
    exploration: P,
    grid: RewardGrid,
    alpha: f32,   // learning rate
    gamma: f32,   // discount factor
    max_steps: u32,
    episode: u32, // finished episodes
    start_state: State,
    state: State,
    rng: StdRng,
}

impl<P: Policy> SignalAgent<P> {
    /// Initialize a new `SignalAgent` with a zeroed table
    ///
    /// **Panics** if `alpha` or `gamma` is not in the interval `[0,1]`, or if `max_steps` is zero
    pub fn new(config: SignalAgentConfig<P>) -> Self {
        let SignalAgentConfig {
            exploration,
            alpha,
            gamma,
            grid,
            max_steps,
            seed,
        } = config;
        assert_interval!(alpha, 0.0, 1.0);
        assert_interval!(gamma, 0.0, 1.0);
        assert!(max_steps > 0, "`max_steps` must be at least 1");

        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let start_state = State::start(rng.gen_range(0..NUM_ARMS));

        Self {
            q_table: QTable::new(),
            exploration,
            grid,
            alpha,
            gamma,
            max_steps,
            episode: 0,
            start_state,
            state: start_state,
            rng,
        }
    }

    pub fn q_table(&self) -> &QTable {
        &self.q_table
    }

    pub fn grid(&self) -> &RewardGrid {
        &self.grid
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn gamma(&self) -> f32 {
        self.gamma
    }

    /// Number of finished episodes
    pub fn episode(&self) -> u32 {
        self.episode
    }

    /// Current value of the exploration parameter
    pub fn exploration(&self) -> f32 {
        self.exploration.parameter(self.episode as f32)
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn start_state(&self) -> State {
        self.start_state
    }

    /// Reseed the agent's random number generator
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Begin a new episode on a uniformly random arm
    pub fn reset(&mut self) -> State {
        let arm = self.rng.gen_range(0..NUM_ARMS);
        self.reset_to(arm)
    }

    /// Begin a new episode on a known arm
    ///
    /// **Panics** if `arm` is not a starting arm of the grid
    pub fn reset_to(&mut self, arm: usize) -> State {
        assert!(arm < NUM_ARMS, "Invalid arm: {arm}");
        self.start_state = State::start(arm);
        self.state = self.start_state;
        self.start_state
    }

    /// The state a detected `tag` leads to from `state`, without touching the table
    pub fn classify(&self, tag: Tag, state: State) -> State {
        if let Tag::Unrecognized(id) = tag {
            warn!("Unrecognized tag {id} at {state}, resetting to the initial state");
        }
        state::classify(tag, state)
    }

    /// Whether `state` carries a terminal reward tag, `false` for cells outside the grid
    pub fn is_terminal(&self, state: State) -> bool {
        self.grid.is_terminal(state)
    }

    /// Distribution the exploration policy assigns to the actions of `state`
    pub fn action_probabilities(&self, state: State) -> Vec<f32> {
        self.exploration
            .probabilities(self.episode as f32, &self.q_table.row(state))
    }

    /// Draw an action for `state` from the exploration policy
    pub fn select_action(&mut self, state: State) -> usize {
        let probabilities = self.action_probabilities(state);
        let action = exploration::sample(&probabilities, &mut self.rng);
        debug!("Selected action {action} at {state} with probabilities {probabilities:?}");
        action
    }

    /// The highest valued action of `state`, lowest index on ties
    pub fn greedy_action(&self, state: State) -> usize {
        argmax(&self.q_table.row(state))
    }

    /// Advance the episode with a detected `tag` and learn from the reward of the cell reached
    ///
    /// The target bootstraps from the next state's values even when that state is terminal.
    /// Terminal rows stay at zero as long as the host stops updating once a terminal cell is
    /// reached.
    ///
    /// **Returns** the reward tag of the cell reached
    pub fn update(&mut self, action: usize, tag: Tag) -> Result<f32> {
        if action >= NUM_ACTIONS {
            return Err(Error::ActionOutOfRange {
                action,
                num_actions: NUM_ACTIONS,
            });
        }

        let state = self.state;
        let next_state = self.classify(tag, state);
        let reward = self.grid.reward(next_state) as f32;

        let max_next_q = max_value(&self.q_table.row(next_state));
        let td_target = reward + self.gamma * max_next_q;
        let q_value = self.q_table.row_mut(state);
        let td_error = td_target - q_value[action];
        q_value[action] += self.alpha * td_error;

        trace!("Q{state}[{action}] += {} * {td_error} (reward {reward})", self.alpha);
        self.state = next_state;
        Ok(reward)
    }

    /// Count the current episode as finished
    pub fn finish_episode(&mut self) {
        self.episode += 1;
    }

    /// Run one episode in `env`, from reset until a terminal cell or the step limit
    pub fn go<E: Environment>(&mut self, env: &mut E) -> Result<EpisodeSummary> {
        let start = self.reset();
        env.reset(start);

        let mut first_action = 0;
        let mut elapsed = Duration::ZERO;
        let mut reward = 0.0;
        let mut steps = 0;
        while steps < self.max_steps {
            let action = self.select_action(self.state);
            if steps == 0 {
                first_action = action;
            }

            let (tag, dt) = env.step(action);
            elapsed += dt;
            reward = self.update(action, tag)?;
            steps += 1;

            if self.is_terminal(self.state) {
                break;
            }
        }

        let completed = self.is_terminal(self.state);
        if !completed {
            warn!(
                "Episode {} stopped after {steps} steps without reaching a terminal cell",
                self.episode
            );
        }
        self.finish_episode();
        info!(
            "Episode {} from {start} ended at {} with reward {reward}",
            self.episode, self.state
        );

        Ok(EpisodeSummary {
            start,
            action: first_action,
            end: self.state,
            reward,
            steps,
            elapsed,
            completed,
        })
    }

    /// Write the table and episode bookkeeping to `path`
    pub fn persist(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        Checkpoint::from_agent(self).save(path)?;
        info!(
            "Saved {} table rows at episode {} to {}",
            self.q_table.len(),
            self.episode,
            path.display()
        );
        Ok(())
    }

    /// Replace the table and episode bookkeeping with the checkpoint at `path`
    ///
    /// The agent is left untouched if the checkpoint cannot be read.
    pub fn restore(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let checkpoint = Checkpoint::load(path)?;
        self.episode = checkpoint.episode;
        self.alpha = checkpoint.alpha;
        self.gamma = checkpoint.gamma;
        self.q_table = checkpoint.q_table.into_iter().collect();
        info!(
            "Restored {} table rows at episode {} from {}",
            self.q_table.len(),
            self.episode,
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use statrs::{distribution::Binomial, statistics::Distribution};

    use crate::{
        decay::{Constant, Linear},
        exploration::Softmax,
        state::MAX_PROGRESS,
    };

    use super::*;

    fn agent(epsilon: f32, alpha: f32, gamma: f32) -> SignalAgent {
        SignalAgent::new(SignalAgentConfig {
            exploration: EpsilonGreedy::constant(epsilon),
            alpha,
            gamma,
            seed: Some(42),
            ..Default::default()
        })
    }

    /// Grid whose second arm exits correctly straight ahead
    fn straight_grid() -> RewardGrid {
        RewardGrid::new([[0, 1, -1, -1], [0, 1, -1, -1], [0, -1, -1, 1]]).unwrap()
    }

    /// Scripted environment replaying a fixed list of tags
    struct ScriptedEnv {
        tags: Vec<Tag>,
        i: usize,
    }

    impl Environment for ScriptedEnv {
        fn reset(&mut self, _start: State) {
            self.i = 0;
        }

        fn step(&mut self, _action: usize) -> (Tag, Duration) {
            let tag = self.tags[self.i.min(self.tags.len() - 1)];
            self.i += 1;
            (tag, Duration::from_millis(100))
        }
    }

    #[test]
    fn reset_functional() {
        let mut agent = agent(0.1, 0.5, 1.0);
        let mut seen = [false; NUM_ARMS];
        for _ in 0..100 {
            let state = agent.reset();
            assert_eq!(state.progress, 0, "episodes start at progress 0");
            assert_eq!(agent.state(), state, "current state overwritten");
            assert_eq!(agent.start_state(), state);
            seen[state.arm] = true;
        }
        assert!(seen.iter().all(|&s| s), "every arm is chosen");
    }

    #[test]
    fn single_update_from_zero_table() {
        let mut agent: SignalAgent = SignalAgent::new(SignalAgentConfig {
            grid: straight_grid(),
            alpha: 0.5,
            gamma: 1.0,
            seed: Some(1),
            ..Default::default()
        });
        agent.reset_to(1);

        let reward = agent.update(0, Tag::Forward).unwrap();
        assert_eq!(reward, 1.0, "landed on the correct exit");
        assert_eq!(agent.q_table().get(State::new(1, 0), 0), 0.5, "0 + 0.5 * (1 + 0 - 0)");
        assert_eq!(agent.state(), State::new(1, 1), "current state advanced");
        assert!(agent.is_terminal(agent.state()));
    }

    #[test]
    fn update_bootstraps_from_terminal_row() {
        // A terminal row is never written by the update rule itself, so seed one through
        // a restored table to observe that its values still feed the target.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seeded.json");
        let mut table = QTable::new();
        table.row_mut(State::new(0, 1))[2] = 2.0;
        Checkpoint {
            episode: 0,
            alpha: 1.0,
            gamma: 0.5,
            exploration: 0.1,
            q_table: table.entries(),
        }
        .save(&path)
        .unwrap();

        let mut agent = agent(0.1, 0.5, 1.0);
        agent.restore(&path).unwrap();
        agent.reset_to(0);
        let reward = agent.update(1, Tag::Forward).unwrap();

        assert_eq!(reward, 1.0);
        assert_eq!(
            agent.q_table().get(State::new(0, 0), 1),
            2.0,
            "target is 1 + 0.5 * 2, the terminal row is not treated as zero"
        );
    }

    #[test]
    fn update_rejects_out_of_range_action() {
        let mut agent = agent(0.1, 0.5, 1.0);
        let before = agent.state();
        let err = agent.update(NUM_ACTIONS, Tag::Forward).unwrap_err();
        assert!(
            matches!(err, Error::ActionOutOfRange { action: 3, num_actions: 3 }),
            "typed error"
        );
        assert_eq!(agent.state(), before, "state untouched on error");
        assert_eq!(agent.q_table(), &QTable::new(), "table untouched on error");
    }

    #[test]
    fn unrecognized_tag_resets_state() {
        let mut agent = agent(0.1, 0.5, 1.0);
        agent.reset_to(2);
        let reward = agent.update(0, Tag::Unrecognized(2000)).unwrap();
        assert_eq!(reward, 0.0, "initial state is non-terminal");
        assert_eq!(agent.state(), State::default());
        assert_eq!(agent.classify(Tag::Left, State::new(2, 1)), State::new(2, MAX_PROGRESS));
    }

    #[test]
    fn select_action_frequencies_split_ties() {
        const N: u64 = 20_000;
        let epsilon = 0.3;
        let mut agent = agent(epsilon, 0.5, 1.0);

        // Two actions tie for the maximum at (0, 0)
        agent.reset_to(0);
        agent.update(0, Tag::Forward).unwrap();
        agent.reset_to(0);
        agent.update(2, Tag::Forward).unwrap();
        let state = State::start(0);
        assert_eq!(agent.q_table().row(state), [0.5, 0.0, 0.5]);

        let mut counts = [0u64; NUM_ACTIONS];
        for _ in 0..N {
            counts[agent.select_action(state)] += 1;
        }

        let tied_p = (epsilon / 3.0 + (1.0 - epsilon) / 2.0) as f64;
        let other_p = (epsilon / 3.0) as f64;
        for (action, p) in [(0, tied_p), (1, other_p), (2, tied_p)] {
            let dist = Binomial::new(p, N).unwrap();
            let mean = dist.mean().unwrap();
            let sd = dist.std_dev().unwrap();
            let count = counts[action] as f64;
            assert!(
                (count - mean).abs() < 5.0 * sd,
                "action {action}: count {count} too far from expected {mean}"
            );
        }
    }

    #[test]
    fn greedy_selection_is_uniform_over_ties() {
        let mut agent = agent(0.0, 0.5, 1.0);
        let state = State::start(1);
        let mut counts = [0u32; NUM_ACTIONS];
        for _ in 0..3000 {
            counts[agent.select_action(state)] += 1;
        }
        assert!(
            counts.iter().all(|&c| c > 800),
            "all three zero-valued actions drawn, got {counts:?}"
        );
        assert_eq!(agent.greedy_action(state), 0, "deterministic tie-break is lowest index");
    }

    #[test]
    fn go_runs_one_episode() {
        let mut agent = agent(0.1, 0.5, 1.0);
        let mut env = ScriptedEnv {
            tags: vec![Tag::Unrecognized(7), Tag::Right],
            i: 0,
        };
        let summary = agent.go(&mut env).unwrap();

        assert!(summary.completed, "second tag reaches a terminal cell");
        assert_eq!(summary.steps, 2);
        assert_eq!(summary.end, State::new(0, 2), "reset to arm 0 then turned right");
        assert_eq!(summary.reward, -1.0);
        assert_eq!(summary.elapsed, Duration::from_millis(200));
        assert_eq!(agent.episode(), 1, "episode counted");
    }

    #[test]
    fn go_stops_at_step_limit() {
        let mut agent: SignalAgent = SignalAgent::new(SignalAgentConfig {
            max_steps: 5,
            seed: Some(3),
            ..Default::default()
        });
        let mut env = ScriptedEnv {
            tags: vec![Tag::Unrecognized(99)],
            i: 0,
        };
        let summary = agent.go(&mut env).unwrap();
        assert!(!summary.completed, "never terminal");
        assert_eq!(summary.steps, 5);
        assert_eq!(agent.episode(), 1, "truncated episode still counted");
    }

    #[test]
    #[should_panic(expected = "`max_steps` must be at least 1")]
    fn zero_step_limit_panics() {
        let _: SignalAgent = SignalAgent::new(SignalAgentConfig {
            max_steps: 0,
            ..Default::default()
        });
    }

    #[test]
    fn first_action_is_the_first_signal_shown() {
        let mut agent = agent(0.0, 0.5, 1.0);
        // Arm 1 prefers action 2 at the start, any other state ties
        agent.reset_to(1);
        agent.update(2, Tag::Right).unwrap();
        let mut env = ScriptedEnv {
            tags: vec![Tag::Unrecognized(1), Tag::Right],
            i: 0,
        };
        let summary = loop {
            let summary = agent.go(&mut env).unwrap();
            if summary.start == State::start(1) {
                break summary;
            }
        };
        assert_eq!(summary.steps, 2);
        assert_eq!(summary.action, 2, "greedy choice at the start, not a later step's");
    }

    #[test]
    fn states_outside_grid_are_not_terminal() {
        let agent = agent(0.1, 0.5, 1.0);
        assert!(!agent.is_terminal(State::new(NUM_ARMS, 0)));
        assert!(!agent.is_terminal(State::new(0, MAX_PROGRESS + 1)));
        assert!(agent.is_terminal(State::new(0, MAX_PROGRESS)));
    }

    #[test]
    fn softmax_agent_trains_past_zero_temperature() {
        let dir = tempfile::tempdir().unwrap();
        let mut agent = SignalAgent::new(SignalAgentConfig {
            exploration: Softmax::new(Linear::new(0.5, 1.0, 0.0).unwrap()),
            alpha: 0.5,
            gamma: 1.0,
            grid: RewardGrid::default(),
            max_steps: 8,
            seed: Some(9),
        });
        let mut env = ScriptedEnv {
            tags: vec![Tag::Forward],
            i: 0,
        };
        for _ in 0..5 {
            agent.go(&mut env).unwrap();
        }
        assert_eq!(agent.exploration(), 0.0, "schedule ended at zero temperature");
        let probs = agent.action_probabilities(agent.start_state());
        assert!(probs.iter().all(|p| p.is_finite()), "greedy limit, no NaN");
        agent.persist(dir.path().join("cold.json")).unwrap();
    }

    #[test]
    fn persist_restore_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.json");

        let mut trained = agent(0.2, 0.5, 0.9);
        for _ in 0..50 {
            let state = trained.reset();
            let action = trained.select_action(state);
            let tag = Tag::from_id(trained.rng.gen_range(0..3));
            trained.update(action, tag).unwrap();
            trained.finish_episode();
        }
        trained.persist(&path).unwrap();

        let mut restored = agent(0.2, 0.1, 0.1);
        restored.restore(&path).unwrap();
        assert_eq!(restored.q_table(), trained.q_table(), "same rows and values");
        assert_eq!(restored.episode(), 50, "episode count restored");
        assert_eq!(restored.alpha(), 0.5, "learning rate restored");
        assert_eq!(restored.gamma(), 0.9, "discount restored");

        trained.reseed(11);
        restored.reseed(11);
        for tag in [Tag::Forward, Tag::Left, Tag::Right, Tag::Forward] {
            let a = trained.reset();
            let b = restored.reset();
            assert_eq!(a, b, "same start");
            let action = trained.select_action(a);
            assert_eq!(restored.select_action(b), action, "same action");
            assert_eq!(
                trained.update(action, tag).unwrap(),
                restored.update(action, tag).unwrap()
            );
        }
        assert_eq!(restored.q_table(), trained.q_table(), "identical after further training");
    }

    #[test]
    fn restore_missing_file_leaves_agent_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut agent = agent(0.1, 0.5, 1.0);
        agent.reset_to(1);
        agent.update(1, Tag::Right).unwrap();
        let table = agent.q_table().clone();

        let err = agent.restore(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, Error::Io(_)), "missing file is an io error");
        assert_eq!(agent.q_table(), &table, "table kept");
    }

    #[test]
    fn softmax_agent_learns() {
        let mut agent = SignalAgent::new(SignalAgentConfig {
            exploration: Softmax::new(Constant::new(0.5)),
            alpha: 0.5,
            gamma: 1.0,
            grid: RewardGrid::default(),
            max_steps: 8,
            seed: Some(5),
        });
        agent.reset_to(2);
        agent.update(2, Tag::Left).unwrap();
        let probs = agent.action_probabilities(State::start(2));
        assert!(probs[2] > probs[0] && probs[2] > probs[1], "rewarded signal preferred");
        assert_eq!(agent.exploration(), 0.5, "temperature reported");
    }

    #[test]
    #[should_panic(expected = "Invalid value for `gamma`")]
    fn gamma_out_of_range() {
        agent(0.1, 0.5, 1.5);
    }
}
