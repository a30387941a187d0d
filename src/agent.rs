use std::thread;
use std::time::Duration;

use tracing::{debug, trace};

use crate::environment::{Env, Pos};
use crate::policy::Policy;

/// How a single policy-driven episode ended.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeOutcome {
    pub steps: usize,
    pub reward: f64,
    pub terminated: bool,
    /// Positions visited, starting with the initial one.
    pub path: Vec<Pos>,
}

/// Drives a world with a policy, one episode at a time.
pub struct Agent {
    max_steps: usize,
    delay: Duration,
    show: bool,
}

impl Agent {
    pub fn new(max_steps: usize) -> Self {
        Self {
            max_steps,
            delay: Duration::from_millis(0),
            show: false,
        }
    }

    /// Print the grid after every step and pause for `delay` in between.
    pub fn with_display(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self.show = true;
        self
    }

    /// Requests the policy's action until the world reaches a final cell, the
    /// policy has nothing to offer, or `max_steps` is used up. The world is
    /// restarted afterwards.
    pub fn run_episode<P: Policy>(&self, env: &mut Env, policy: &P) -> EpisodeOutcome {
        let mut outcome = EpisodeOutcome {
            steps: 0,
            reward: 0.0,
            terminated: env.is_terminated(),
            path: vec![env.pos()],
        };

        while !outcome.terminated && outcome.steps < self.max_steps {
            let movement = match policy.action(env.pos()) {
                Some(movement) => movement,
                None => {
                    debug!(x = env.pos().x, y = env.pos().y, "policy has no action here");
                    break;
                }
            };
            outcome.reward += env.perform_action(movement);
            outcome.steps += 1;
            outcome.path.push(env.pos());
            outcome.terminated = env.is_terminated();
            trace!(?movement, steps = outcome.steps, reward = outcome.reward, "agent step");

            if self.show {
                println!("{}", env);
                if !self.delay.is_zero() {
                    thread::sleep(self.delay);
                }
            }
        }

        debug!(
            steps = outcome.steps,
            reward = outcome.reward,
            terminated = outcome.terminated,
            "episode finished"
        );
        env.restart();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{Cell, Movement};
    use crate::policy::DetPolicy;

    fn corridor() -> Env {
        let mut env = Env::new(4, 1).unwrap().with_seed(11);
        env.set_probabilities([1.0, 0.0, 0.0, 0.0, 0.0]).unwrap();
        env.set_field(Pos::new(3, 0), Cell::Reward).unwrap();
        env
    }

    #[test]
    fn walks_to_the_end_and_restarts() {
        let mut env = corridor();
        let mut policy = DetPolicy::new();
        for x in 0..3 {
            policy.policy.insert(Pos::new(x, 0), Movement::Right);
        }

        let outcome = Agent::new(10).run_episode(&mut env, &policy);

        assert!(outcome.terminated);
        assert_eq!(outcome.steps, 3);
        assert_eq!(outcome.path.last(), Some(&Pos::new(3, 0)));
        assert!((outcome.reward - (1.0 - 2.0 * 0.04)).abs() < 1e-12);
        assert_eq!(env.pos(), Pos::new(0, 0));
    }

    #[test]
    fn stops_at_step_bound() {
        let mut env = corridor();
        let mut policy = DetPolicy::new();
        policy.policy.insert(Pos::new(0, 0), Movement::Left);

        let outcome = Agent::new(5).run_episode(&mut env, &policy);

        assert!(!outcome.terminated);
        assert_eq!(outcome.steps, 5);
    }

    #[test]
    fn stops_when_policy_is_undefined() {
        let mut env = corridor();
        let outcome = Agent::new(5).run_episode(&mut env, &DetPolicy::new());
        assert_eq!(outcome.steps, 0);
        assert_eq!(outcome.path, vec![Pos::new(0, 0)]);
    }
}
