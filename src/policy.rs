use std::collections::HashMap;

use crate::environment::{Env, Movement, Pos};

/// Stateless lookup from a position to the action to request there.
/// `None` means the position has no defined action (obstacles, cells that
/// cannot move anywhere).
pub trait Policy {
    fn action(&self, pos: Pos) -> Option<Movement>;
}

// Represents deterministic policy
#[derive(Debug, Clone, Default)]
pub struct DetPolicy {
    pub policy: HashMap<Pos, Movement>,
}

impl DetPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Freezes any other policy into a table over every cell of `env`.
    pub fn from_policy<P: Policy>(env: &Env, source: &P) -> Self {
        let policy = env
            .iter_all_coordinates()
            .filter_map(|pos| source.action(pos).map(|a| (pos, a)))
            .collect();
        Self { policy }
    }
}

impl Policy for DetPolicy {
    fn action(&self, pos: Pos) -> Option<Movement> {
        self.policy.get(&pos).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysUp;

    impl Policy for AlwaysUp {
        fn action(&self, _pos: Pos) -> Option<Movement> {
            Some(Movement::Up)
        }
    }

    #[test]
    fn freezes_other_policies() {
        let env = Env::new(2, 3).unwrap();
        let frozen = DetPolicy::from_policy(&env, &AlwaysUp);
        assert_eq!(frozen.policy.len(), 6);
        assert_eq!(frozen.action(Pos::new(1, 2)), Some(Movement::Up));
        assert_eq!(frozen.action(Pos::new(5, 5)), None);
    }
}
