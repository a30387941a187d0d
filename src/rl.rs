//! Online Q-learning against a live grid world.
//!
//! The learner always requests the greedy action from its table. Exploration
//! comes from the world itself: the constructor widens the outcome
//! distribution so the executed action sometimes differs from the requested
//! one.

use ndarray::{Array2, Array3};
use tracing::{debug, info};

use crate::environment::{Cell, Env, Movement, Pos};
use crate::error::Result;
use crate::policy::Policy;
use crate::utils;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QLearningConfig {
    /// Learning rate α
    pub learning_rate: f64,
    /// Discount factor γ
    pub discount: f64,
    /// ε handed to [`Env::change_probabilities`]
    pub exploration: f64,
    /// Learning stops once the cumulative reward reaches this value
    pub reward_threshold: f64,
    /// Record the cumulative reward every this many steps, 0 disables it
    pub sample_every: usize,
    /// Optional bound on the number of episodes. `None` keeps learning until
    /// the threshold is reached, however long that takes.
    pub max_episodes: Option<usize>,
}

impl Default for QLearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.2,
            discount: 1.0,
            exploration: 0.04,
            reward_threshold: 100_000.0,
            sample_every: 100,
            max_episodes: None,
        }
    }
}

/// One four-entry action-value vector per cell, indexed in
/// [`Movement::actions`] order.
#[derive(Debug, Clone, PartialEq)]
pub struct QTable {
    values: Array3<f64>,
    // cells the greedy lookup has no action for
    blocked: Array2<bool>,
}

impl QTable {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            values: Array3::zeros((width, height, Movement::actions().len())),
            blocked: Array2::from_elem((width, height), false),
        }
    }

    /// Empty table shaped like `env`, with its obstacles marked as having no
    /// action.
    pub fn for_world(env: &Env) -> Self {
        let mut table = Self::new(env.width(), env.height());
        table.blocked = env.fields().mapv(|cell| cell == Cell::Obstacle);
        table
    }

    pub fn action_values(&self, pos: Pos) -> [f64; 4] {
        let mut out = [0.0; 4];
        for (i, q) in out.iter_mut().enumerate() {
            *q = self.values[[pos.x, pos.y, i]];
        }
        out
    }

    /// Q-value of a directional action. `Nothing` has no entry and reads 0.
    pub fn get(&self, pos: Pos, action: Movement) -> f64 {
        action
            .index()
            .map(|i| self.values[[pos.x, pos.y, i]])
            .unwrap_or(0.0)
    }

    pub fn set(&mut self, pos: Pos, action: Movement, value: f64) {
        if let Some(i) = action.index() {
            self.values[[pos.x, pos.y, i]] = value;
        }
    }

    /// Highest valued action, ties go to the first in evaluation order.
    pub fn best_action(&self, pos: Pos) -> Movement {
        let i = utils::argmax(&self.action_values(pos)).unwrap_or(0);
        Movement::actions()[i]
    }

    pub fn max_q(&self, pos: Pos) -> f64 {
        self.get(pos, self.best_action(pos))
    }

    /// Q(s,a) ← Q(s,a) + α[r + γ max_a' Q(s',a') - Q(s,a)]
    ///
    /// Returns the temporal difference before the step was applied. `a` must
    /// be directional: `Nothing` has no entry, so nothing would be written.
    pub fn update(
        &mut self,
        s: Pos,
        a: Movement,
        r: f64,
        s_p: Pos,
        step_size: f64,
        discount: f64,
    ) -> f64 {
        debug_assert!(a.index().is_some(), "q-update for a non-directional action");
        let current = self.get(s, a);
        let t_d = r + discount * self.max_q(s_p) - current;
        self.set(s, a, current + step_size * t_d);
        t_d
    }
}

impl Policy for QTable {
    fn action(&self, pos: Pos) -> Option<Movement> {
        match self.blocked.get([pos.x, pos.y]) {
            Some(false) => Some(self.best_action(pos)),
            _ => None,
        }
    }
}

/// What a call to [`QLearning::learn`] went through.
#[derive(Debug, Clone, PartialEq)]
pub struct LearningReport {
    pub episodes: usize,
    pub steps: usize,
    pub cumulative_reward: f64,
    /// Cumulative reward recorded every `sample_every` steps.
    pub samples: Vec<f64>,
}

pub struct QLearning<'a> {
    env: &'a mut Env,
    config: QLearningConfig,
    table: QTable,
    total_actions: usize,
    cumulative_reward: f64,
    episodes: usize,
    samples: Vec<f64>,
}

impl<'a> QLearning<'a> {
    /// Takes over `env` for the lifetime of the learner and applies the
    /// configured exploration to its outcome distribution.
    pub fn new(env: &'a mut Env, config: QLearningConfig) -> Result<Self> {
        env.change_probabilities(config.exploration)?;
        let table = QTable::for_world(env);
        Ok(Self {
            env,
            config,
            table,
            total_actions: 0,
            cumulative_reward: 0.0,
            episodes: 0,
            samples: Vec::new(),
        })
    }

    fn budget_left(&self) -> bool {
        self.cumulative_reward < self.config.reward_threshold
            && self.config.max_episodes.map_or(true, |max| self.episodes < max)
    }

    /// Runs whole episodes until the cumulative reward reaches the threshold
    /// (or the episode bound, if one is set).
    pub fn learn(&mut self) -> LearningReport {
        info!(
            learning_rate = self.config.learning_rate,
            discount = self.config.discount,
            exploration = self.config.exploration,
            threshold = self.config.reward_threshold,
            "starting q-learning"
        );

        while self.budget_left() {
            self.run_episode();
            self.env.restart();
            self.episodes += 1;
            self.env.set_learning_iterations(self.episodes);
            self.env.set_cumulative_reward(self.cumulative_reward);
            if self.episodes % 1000 == 0 {
                debug!(
                    episodes = self.episodes,
                    steps = self.total_actions,
                    cumulative_reward = self.cumulative_reward,
                    "q-learning progress"
                );
            }
        }

        info!(
            episodes = self.episodes,
            steps = self.total_actions,
            cumulative_reward = self.cumulative_reward,
            "q-learning finished"
        );
        self.report()
    }

    // At least one step is taken, even from a final cell.
    fn run_episode(&mut self) {
        loop {
            let s = self.env.pos();
            let a = self.table.best_action(s);
            let r = self.env.perform_action(a);
            let s_p = self.env.pos();
            self.table
                .update(s, a, r, s_p, self.config.learning_rate, self.config.discount);

            self.cumulative_reward += r;
            self.total_actions += 1;
            if self.config.sample_every > 0 && self.total_actions % self.config.sample_every == 0 {
                self.samples.push(self.cumulative_reward);
            }

            if self.env.is_terminated() {
                break;
            }
        }
    }

    pub fn report(&self) -> LearningReport {
        LearningReport {
            episodes: self.episodes,
            steps: self.total_actions,
            cumulative_reward: self.cumulative_reward,
            samples: self.samples.clone(),
        }
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }

    pub fn into_table(self) -> QTable {
        self.table
    }

    pub fn env(&self) -> &Env {
        &*self.env
    }

    pub fn config(&self) -> QLearningConfig {
        self.config
    }
}

impl Policy for QLearning<'_> {
    fn action(&self, pos: Pos) -> Option<Movement> {
        self.table.action(pos)
    }
}
