//! Ready-made maps and JSON world descriptions.
//!
//! A world is written as rows of cell symbols, top row first:
//!
//! ```text
//! ...+
//! .#.-
//! ....
//! ```
//!
//! `.` empty, `#` obstacle, `+` reward, `-` negative reward. The bottom-left
//! symbol is position `(0, 0)` and `Up` increases `y`.

use std::{fs, path::Path};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::environment::{Cell, Env, Pos, Rewards};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSpec {
    pub rows: Vec<String>,
    pub start: Pos,
    #[serde(default)]
    pub rewards: Rewards,
    /// Sets the outcome distribution through [`Env::change_probabilities`].
    #[serde(default)]
    pub epsilon: Option<f64>,
    /// Explicit outcome distribution, mutually exclusive with `epsilon`.
    #[serde(default)]
    pub probabilities: Option<[f64; 5]>,
}

impl WorldSpec {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            operation: format!("read {}", path.display()),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Whether the description overrides the default outcome distribution.
    pub fn sets_distribution(&self) -> bool {
        self.epsilon.is_some() || self.probabilities.is_some()
    }

    pub fn build(&self) -> Result<Env> {
        let invalid = |message: String| Error::InvalidWorld { message };

        let height = self.rows.len();
        let width = self.rows.first().map_or(0, |row| row.chars().count());
        if let Some(row) = self.rows.iter().find(|row| row.chars().count() != width) {
            return Err(invalid(format!(
                "row '{}' has {} cells, expected {}",
                row,
                row.chars().count(),
                width
            )));
        }
        let mut env = Env::new(width, height)?;

        for (row_index, row) in self.rows.iter().enumerate() {
            let y = height - 1 - row_index;
            for (x, symbol) in row.chars().enumerate() {
                let cell = Cell::from_symbol(symbol).ok_or_else(|| {
                    invalid(format!("unknown cell symbol '{}' at ({}, {})", symbol, x, y))
                })?;
                env.set_field(Pos::new(x, y), cell)?;
            }
        }

        env.set_initial_state(self.start)?;
        if env.field(self.start) == Cell::Obstacle {
            return Err(invalid(format!(
                "start ({}, {}) is an obstacle",
                self.start.x, self.start.y
            )));
        }
        env.set_rewards(self.rewards);

        match (self.epsilon, self.probabilities) {
            (Some(_), Some(_)) => {
                return Err(invalid(
                    "set either epsilon or probabilities, not both".to_string(),
                ))
            }
            (Some(epsilon), None) => env.change_probabilities(epsilon)?,
            (None, Some(probs)) => env.set_probabilities(probs)?,
            (None, None) => {}
        }
        Ok(env)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    /// The 4x3 textbook world with one wall and two exits
    Classic,
    /// A walk along a cliff edge
    Cliff,
    /// A single row leading to the goal
    Corridor,
}

impl Preset {
    pub fn spec(self) -> WorldSpec {
        let rows = |rows: &[&str]| -> Vec<String> { rows.iter().map(|r| r.to_string()).collect() };
        match self {
            Preset::Classic => WorldSpec {
                rows: rows(&["...+", ".#.-", "...."]),
                start: Pos::new(0, 0),
                rewards: Rewards::default(),
                epsilon: None,
                probabilities: None,
            },
            Preset::Cliff => WorldSpec {
                rows: rows(&["......", "......", ".----+"]),
                start: Pos::new(0, 0),
                rewards: Rewards { positive: 10.0, negative: -100.0, step: -1.0 },
                epsilon: None,
                probabilities: None,
            },
            Preset::Corridor => WorldSpec {
                rows: rows(&["....+"]),
                start: Pos::new(0, 0),
                rewards: Rewards { positive: 10.0, negative: -10.0, step: -1.0 },
                epsilon: None,
                probabilities: None,
            },
        }
    }

    pub fn build(self) -> Result<Env> {
        self.spec().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::DEFAULT_PROBABILITIES;

    #[test]
    fn classic_layout() {
        let env = Preset::Classic.build().unwrap();
        assert_eq!((env.width(), env.height()), (4, 3));
        assert_eq!(env.field(Pos::new(1, 1)), Cell::Obstacle);
        assert_eq!(env.field(Pos::new(3, 2)), Cell::Reward);
        assert_eq!(env.field(Pos::new(3, 1)), Cell::NegReward);
        assert_eq!(env.pos(), Pos::new(0, 0));
        assert_eq!(env.probabilities(), DEFAULT_PROBABILITIES);
    }

    #[test]
    fn every_preset_builds() {
        for preset in Preset::value_variants() {
            let env = preset.build().unwrap();
            assert_ne!(env.field(env.start_pos()), Cell::Obstacle);
        }
    }

    #[test]
    fn parses_json_worlds() {
        let spec = WorldSpec::from_json(
            r##"{
                "rows": ["..+", "#.-"],
                "start": {"x": 1, "y": 0},
                "rewards": {"positive": 5.0, "negative": -5.0, "step": -0.5},
                "epsilon": 0.05
            }"##,
        )
        .unwrap();
        let env = spec.build().unwrap();

        assert_eq!(env.field(Pos::new(0, 0)), Cell::Obstacle);
        assert_eq!(env.field(Pos::new(2, 1)), Cell::Reward);
        assert_eq!(env.pos(), Pos::new(1, 0));
        assert_eq!(env.rewards().step, -0.5);
        assert!((env.probabilities()[0] - 0.8).abs() < 1e-12);
        assert!(spec.sets_distribution());
        assert!(!Preset::Classic.spec().sets_distribution());
    }

    #[test]
    fn rejects_broken_worlds() {
        let base = Preset::Corridor.spec();

        let ragged = WorldSpec { rows: vec!["...".into(), "..".into()], ..base.clone() };
        assert!(matches!(ragged.build(), Err(Error::InvalidWorld { .. })));

        let unknown = WorldSpec { rows: vec!["..x".into()], ..base.clone() };
        assert!(matches!(unknown.build(), Err(Error::InvalidWorld { .. })));

        let empty = WorldSpec { rows: vec![], ..base.clone() };
        assert!(matches!(empty.build(), Err(Error::InvalidDimensions { .. })));

        let outside = WorldSpec { start: Pos::new(9, 0), ..base.clone() };
        assert!(matches!(outside.build(), Err(Error::OutOfBounds { .. })));

        let walled = WorldSpec { rows: vec!["#...+".into()], ..base.clone() };
        assert!(matches!(walled.build(), Err(Error::InvalidWorld { .. })));

        let both = WorldSpec {
            epsilon: Some(0.1),
            probabilities: Some([1.0, 0.0, 0.0, 0.0, 0.0]),
            ..base
        };
        assert!(matches!(both.build(), Err(Error::InvalidWorld { .. })));
    }
}
