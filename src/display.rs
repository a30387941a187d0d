//! Console rendering of value landscapes and policies, top row first.

use std::fmt::Write;

use ndarray::Array2;

use crate::environment::{Cell, Env, Pos};
use crate::policy::Policy;

pub fn render_values(env: &Env, values: &Array2<f64>) -> String {
    let mut out = String::new();
    for y in (0..env.height()).rev() {
        for x in 0..env.width() {
            let pos = Pos::new(x, y);
            if env.field(pos) == Cell::Obstacle {
                out.push_str("    #####");
            } else {
                let _ = write!(out, " {:>8.3}", values[[x, y]]);
            }
        }
        out.push('\n');
    }
    out
}

/// Arrows for traversable cells, the cell symbol for final cells and
/// obstacles, `?` where the policy has no answer.
pub fn render_policy<P: Policy>(env: &Env, policy: &P) -> String {
    let mut out = String::new();
    for y in (0..env.height()).rev() {
        for x in 0..env.width() {
            let pos = Pos::new(x, y);
            let cell = env.field(pos);
            let symbol = match cell {
                Cell::Empty => policy.action(pos).map_or('?', |a| a.arrow()),
                _ => cell.symbol(),
            };
            out.push(symbol);
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Movement;
    use crate::policy::DetPolicy;

    #[test]
    fn policy_grid_uses_arrows() {
        let mut env = Env::new(3, 2).unwrap();
        env.set_field(Pos::new(2, 1), Cell::Reward).unwrap();
        env.set_field(Pos::new(1, 0), Cell::Obstacle).unwrap();
        let mut policy = DetPolicy::new();
        policy.policy.insert(Pos::new(0, 1), Movement::Right);
        policy.policy.insert(Pos::new(1, 1), Movement::Right);
        policy.policy.insert(Pos::new(0, 0), Movement::Up);

        assert_eq!(render_policy(&env, &policy), ">>+\n^#?\n");
    }

    #[test]
    fn value_grid_masks_obstacles() {
        let mut env = Env::new(2, 1).unwrap();
        env.set_field(Pos::new(1, 0), Cell::Obstacle).unwrap();
        let values = Array2::from_elem((2, 1), 1.5);
        assert_eq!(render_values(&env, &values), "    1.500    #####\n");
    }
}
