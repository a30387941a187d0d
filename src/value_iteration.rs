//! Offline dynamic programming over a snapshot of a grid world.
//!
//! Every sweep recomputes, in place, the value of each traversable cell as
//! the best Q-value over its admissible actions:
//!
//! Q(s, a) = R(s) + γ · Σ_i p_i · V(s_i)
//!
//! where `s_i` are the cells reached by the five stochastic outcomes of `a`
//! (intended, previous, next, opposite, stay). An outcome that would leave
//! the grid or hit an obstacle leaves the agent where it is, so its mass
//! goes to `V(s)`. The policy is derived once, after the last sweep.

use ndarray::Array2;
use tracing::{debug, info};

use crate::environment::{check_movement, Cell, Env, Movement, Pos, Rewards};
use crate::policy::Policy;
use crate::utils;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueIterationConfig {
    /// Discount factor γ
    pub discount: f64,
    /// Number of full sweeps, there is no early exit
    pub sweeps: usize,
}

impl Default for ValueIterationConfig {
    fn default() -> Self {
        Self {
            discount: 0.86,
            sweeps: 1000,
        }
    }
}

pub struct ValueIteration {
    map: Array2<Cell>,
    probs: [f64; 5],
    config: ValueIterationConfig,
    values: Array2<f64>,
    rewards: Array2<f64>,
    policy: Array2<Option<Movement>>,
    complexity: u64,
}

impl ValueIteration {
    /// Runs all sweeps against a copy of `env`'s fields and outcome
    /// distribution. Later changes to `env` are not seen.
    pub fn new(env: &Env, config: ValueIterationConfig) -> Self {
        let map = env.fields().clone();
        let (width, height) = map.dim();
        let mut solver = Self {
            rewards: reward_landscape(&map, env.rewards()),
            values: Array2::zeros((width, height)),
            policy: Array2::from_elem((width, height), None),
            probs: env.probabilities(),
            map,
            config,
            complexity: 0,
        };
        info!(
            width,
            height,
            discount = config.discount,
            sweeps = config.sweeps,
            "starting value iteration"
        );
        solver.calculate();
        info!(complexity = solver.complexity, "value iteration finished");
        solver
    }

    /// Like [`ValueIteration::new`], then publishes the value landscape back
    /// to `env` for inspection.
    pub fn solve(env: &mut Env, config: ValueIterationConfig) -> Self {
        let solver = Self::new(env, config);
        env.publish_values(solver.values.clone());
        solver
    }

    fn calculate(&mut self) {
        let (width, height) = self.map.dim();
        for sweep in 0..self.config.sweeps {
            for x in 0..width {
                for y in 0..height {
                    self.update_value(Pos::new(x, y));
                }
            }
            if sweep % 100 == 0 {
                debug!(sweep, complexity = self.complexity, "value iteration sweep");
            }
        }

        for x in 0..width {
            for y in 0..height {
                let pos = Pos::new(x, y);
                self.policy[[x, y]] = self.best_move(pos);
            }
        }
    }

    fn possible_actions(&self, pos: Pos) -> Vec<Movement> {
        Movement::actions()
            .iter()
            .copied()
            .filter(|a| check_movement(&self.map, pos, *a).is_some())
            .collect()
    }

    fn update_value(&mut self, pos: Pos) {
        if self.map[[pos.x, pos.y]] == Cell::Obstacle {
            return;
        }
        let q_values: Vec<f64> = self
            .possible_actions(pos)
            .into_iter()
            .map(|a| self.q_value(pos, a))
            .collect();
        if let Some(best) = utils::max(&q_values) {
            self.values[[pos.x, pos.y]] = best;
        }
    }

    fn q_value(&mut self, pos: Pos, action: Movement) -> f64 {
        let here = self.values[[pos.x, pos.y]];
        let mut expected_value = 0.0;
        for (outcome, p) in action.outcomes().iter().zip(self.probs.iter()) {
            let value = match check_movement(&self.map, pos, *outcome) {
                Some(next) => self.values[[next.x, next.y]],
                None => here,
            };
            expected_value += p * value;
            self.complexity += 1;
        }
        self.rewards[[pos.x, pos.y]] + self.config.discount * expected_value
    }

    // Greedy over the converged values of the neighbouring cells.
    fn best_move(&self, pos: Pos) -> Option<Movement> {
        if self.map[[pos.x, pos.y]] == Cell::Obstacle {
            return None;
        }
        let moves = self.possible_actions(pos);
        let values: Vec<f64> = moves
            .iter()
            .filter_map(|a| check_movement(&self.map, pos, *a))
            .map(|next| self.values[[next.x, next.y]])
            .collect();
        utils::argmax(&values).map(|i| moves[i])
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn value(&self, pos: Pos) -> Option<f64> {
        self.values.get([pos.x, pos.y]).copied()
    }

    pub fn rewards(&self) -> &Array2<f64> {
        &self.rewards
    }

    pub fn policy_landscape(&self) -> &Array2<Option<Movement>> {
        &self.policy
    }

    /// Number of single-outcome evaluations performed over all sweeps.
    pub fn complexity(&self) -> u64 {
        self.complexity
    }

    pub fn config(&self) -> ValueIterationConfig {
        self.config
    }
}

impl Policy for ValueIteration {
    fn action(&self, pos: Pos) -> Option<Movement> {
        self.policy.get([pos.x, pos.y]).copied().flatten()
    }
}

fn reward_landscape(map: &Array2<Cell>, rewards: Rewards) -> Array2<f64> {
    map.mapv(|cell| rewards.for_cell(cell))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn deterministic_world(width: usize, height: usize) -> Env {
        let mut env = Env::new(width, height).unwrap();
        env.set_probabilities([1.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        env.set_rewards(Rewards { positive: 10.0, negative: -10.0, step: -1.0 });
        env
    }

    #[test]
    fn reward_landscape_follows_cell_kinds() {
        let mut env = deterministic_world(2, 2);
        env.set_field(Pos::new(0, 1), Cell::Reward).unwrap();
        env.set_field(Pos::new(1, 1), Cell::NegReward).unwrap();
        env.set_field(Pos::new(1, 0), Cell::Obstacle).unwrap();
        let vi = ValueIteration::new(&env, ValueIterationConfig { discount: 0.9, sweeps: 0 });

        assert_eq!(vi.rewards()[[0, 0]], -1.0);
        assert_eq!(vi.rewards()[[0, 1]], 10.0);
        assert_eq!(vi.rewards()[[1, 1]], -10.0);
        assert_eq!(vi.rewards()[[1, 0]], 0.0);
    }

    #[test]
    fn blocked_outcomes_fall_back_to_staying() {
        // Only the intended move or its opposite happen; the opposite always
        // bumps into the edge of the 2x1 corridor.
        let mut env = deterministic_world(2, 1);
        env.set_probabilities([0.5, 0.0, 0.0, 0.5, 0.0]).unwrap();
        env.set_field(Pos::new(1, 0), Cell::Reward).unwrap();
        let vi = ValueIteration::new(&env, ValueIterationConfig { discount: 0.5, sweeps: 200 });

        assert!((vi.values()[[0, 0]] - 3.5).abs() < 1e-9);
        assert!((vi.values()[[1, 0]] - 14.5).abs() < 1e-9);
    }

    #[test]
    fn obstacles_keep_zero_value_and_are_never_targets() {
        let mut env = deterministic_world(4, 4);
        env.change_probabilities(0.1).unwrap();
        env.set_field(Pos::new(3, 3), Cell::Reward).unwrap();
        env.set_field(Pos::new(1, 1), Cell::Obstacle).unwrap();
        env.set_field(Pos::new(2, 1), Cell::Obstacle).unwrap();
        let vi = ValueIteration::new(&env, ValueIterationConfig::default());

        for pos in env.iter_all_coordinates() {
            if env.field(pos) == Cell::Obstacle {
                assert_eq!(vi.value(pos), Some(0.0));
                assert_eq!(vi.action(pos), None);
                continue;
            }
            let action = vi.action(pos).expect("traversable cell has a policy");
            let target = env.destination(pos, action).expect("policy target is admissible");
            assert_ne!(env.field(target), Cell::Obstacle);
        }
    }

    #[test]
    fn walled_in_cell_has_no_policy() {
        let mut env = deterministic_world(3, 3);
        env.set_field(Pos::new(2, 2), Cell::Reward).unwrap();
        for pos in [Pos::new(0, 1), Pos::new(1, 0)].iter() {
            env.set_field(*pos, Cell::Obstacle).unwrap();
        }
        let vi = ValueIteration::new(&env, ValueIterationConfig::default());

        assert_eq!(vi.action(Pos::new(0, 0)), None);
        assert_eq!(vi.value(Pos::new(0, 0)), Some(0.0));
    }

    #[test]
    fn complexity_counts_every_outcome() {
        let env = deterministic_world(2, 1);
        let vi = ValueIteration::new(&env, ValueIterationConfig { discount: 0.9, sweeps: 10 });
        // two cells, one admissible action each, five outcomes per action
        assert_eq!(vi.complexity(), 10 * 2 * 5);
    }

    #[test]
    fn solve_publishes_values() {
        let mut env = deterministic_world(3, 1);
        env.set_field(Pos::new(2, 0), Cell::Reward).unwrap();
        let vi = ValueIteration::solve(&mut env, ValueIterationConfig::default());
        assert_eq!(env.value_landscape(), Some(vi.values()));
    }

    #[test]
    fn later_world_edits_are_not_seen() {
        let mut env = deterministic_world(3, 1);
        env.set_field(Pos::new(2, 0), Cell::Reward).unwrap();
        let vi = ValueIteration::new(&env, ValueIterationConfig::default());
        env.set_field(Pos::new(1, 0), Cell::Obstacle).unwrap();
        assert_eq!(vi.action(Pos::new(0, 0)), Some(Movement::Right));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn policy_closes_in_on_a_single_reward(
            width in 2usize..6,
            height in 2usize..6,
            gx in 0usize..6,
            gy in 0usize..6,
        ) {
            let goal = Pos::new(gx % width, gy % height);
            let mut env = deterministic_world(width, height);
            env.set_field(goal, Cell::Reward).unwrap();
            let vi = ValueIteration::new(&env, ValueIterationConfig { discount: 0.9, sweeps: 300 });

            for pos in env.iter_all_coordinates() {
                if pos == goal {
                    continue;
                }
                let action = vi.action(pos).unwrap();
                let next = env.destination(pos, action).unwrap();
                prop_assert_eq!(next.manhattan(goal) + 1, pos.manhattan(goal));
                prop_assert!(vi.values()[[next.x, next.y]] > vi.values()[[pos.x, pos.y]]);
            }
        }
    }
}
