use std::fmt;

use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::{Error, Result};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Cell {
    Empty,
    Obstacle,
    Reward,
    NegReward,
}

impl Cell {
    pub fn is_final(self) -> bool {
        matches!(self, Cell::Reward | Cell::NegReward)
    }

    pub fn symbol(self) -> char {
        match self {
            Cell::Empty => '.',
            Cell::Obstacle => '#',
            Cell::Reward => '+',
            Cell::NegReward => '-',
        }
    }

    pub fn from_symbol(symbol: char) -> Option<Cell> {
        match symbol {
            '.' => Some(Cell::Empty),
            '#' => Some(Cell::Obstacle),
            '+' => Some(Cell::Reward),
            '-' => Some(Cell::NegReward),
            _ => None,
        }
    }
}

// Action
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Movement {
    Up,
    Down,
    Left,
    Right,
    Nothing,
}

// Clockwise order of the directional actions, `next` walks forward through it.
const CYCLE: [Movement; 4] = [Movement::Up, Movement::Right, Movement::Down, Movement::Left];

impl Movement {
    /// Directional actions in evaluation order. Tie-breaking everywhere
    /// follows this order, and action-value vectors are indexed by it.
    pub fn actions() -> [Movement; 4] {
        [Movement::Up, Movement::Down, Movement::Left, Movement::Right]
    }

    pub fn into_vector(self) -> (isize, isize) {
        match self {
            Movement::Up      => ( 0, 1),
            Movement::Down    => ( 0,-1),
            Movement::Left    => (-1, 0),
            Movement::Right   => ( 1, 0),
            Movement::Nothing => ( 0, 0),
        }
    }

    /// Slot of this action in [`Movement::actions`], `None` for `Nothing`.
    pub fn index(self) -> Option<usize> {
        Movement::actions().iter().position(|a| *a == self)
    }

    pub fn next(self) -> Movement {
        self.rotate(1)
    }

    pub fn previous(self) -> Movement {
        self.rotate(3)
    }

    pub fn opposite(self) -> Movement {
        self.rotate(2)
    }

    fn rotate(self, steps: usize) -> Movement {
        match CYCLE.iter().position(|a| *a == self) {
            Some(i) => CYCLE[(i + steps) % CYCLE.len()],
            None => Movement::Nothing,
        }
    }

    /// The five actions that may actually be executed when `self` is
    /// requested, in the order the outcome distribution refers to them.
    pub fn outcomes(self) -> [Movement; 5] {
        [self, self.previous(), self.next(), self.opposite(), Movement::Nothing]
    }

    pub fn arrow(self) -> char {
        match self {
            Movement::Up => '^',
            Movement::Down => 'v',
            Movement::Left => '<',
            Movement::Right => '>',
            Movement::Nothing => 'o',
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub x: usize,
    pub y: usize,
}

impl Pos {
    pub fn new(x: usize, y: usize) -> Self {
        Pos { x, y }
    }

    pub fn manhattan(self, other: Pos) -> usize {
        let dx = if self.x > other.x { self.x - other.x } else { other.x - self.x };
        let dy = if self.y > other.y { self.y - other.y } else { other.y - self.y };
        dx + dy
    }
}

/// Reward handed out for landing on each kind of cell.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rewards {
    pub positive: f64,
    pub negative: f64,
    pub step: f64,
}

impl Default for Rewards {
    fn default() -> Self {
        Rewards {
            positive: 1.0,
            negative: -1.0,
            step: -0.04,
        }
    }
}

impl Rewards {
    pub fn for_cell(&self, cell: Cell) -> f64 {
        match cell {
            Cell::Reward => self.positive,
            Cell::NegReward => self.negative,
            Cell::Empty => self.step,
            Cell::Obstacle => 0.0,
        }
    }
}

/// Outcome distribution used until the caller sets another one:
/// perform, sidestep left, sidestep right, step back, stay.
pub const DEFAULT_PROBABILITIES: [f64; 5] = [0.7, 0.1, 0.1, 0.1, 0.0];

const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// Cell reached by `movement` from `pos` on `map`. `None` when it would leave
/// the grid or hit an obstacle.
pub fn check_movement(map: &Array2<Cell>, pos: Pos, movement: Movement) -> Option<Pos> {
    let (dx, dy) = movement.into_vector();
    let x = pos.x as isize + dx;
    let y = pos.y as isize + dy;
    if x < 0 || y < 0 {
        return None;
    }
    let new_pos = Pos::new(x as usize, y as usize);
    match map.get([new_pos.x, new_pos.y]) {
        Some(Cell::Obstacle) | None => None,
        Some(_) => Some(new_pos),
    }
}

pub struct Env {
    map: Array2<Cell>,
    start: Pos,
    pos: Pos,
    rewards: Rewards,
    probs: [f64; 5],
    rng: StdRng,
    learning_iterations: usize,
    cumulative_reward: f64,
    actions_performed: usize,
    value_landscape: Option<Array2<f64>>,
}

impl Env {
    /// Empty `width` x `height` world with the agent at the origin.
    pub fn new(width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        Ok(Self {
            map: Array2::from_elem((width, height), Cell::Empty),
            start: Pos::new(0, 0),
            pos: Pos::new(0, 0),
            rewards: Rewards::default(),
            probs: DEFAULT_PROBABILITIES,
            rng: StdRng::from_entropy(),
            learning_iterations: 0,
            cumulative_reward: 0.0,
            actions_performed: 0,
            value_landscape: None,
        })
    }

    /// Replaces the random source so action outcomes become reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.reseed(seed);
        self
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn width(&self) -> usize {
        self.map.nrows()
    }

    pub fn height(&self) -> usize {
        self.map.ncols()
    }

    pub fn size(&self) -> Pos {
        Pos { x: self.width(), y: self.height() }
    }

    pub fn in_bounds(&self, pos: Pos) -> bool {
        pos.x < self.width() && pos.y < self.height()
    }

    fn check_bounds(&self, pos: Pos) -> Result<()> {
        if self.in_bounds(pos) {
            Ok(())
        } else {
            Err(Error::OutOfBounds { pos, width: self.width(), height: self.height() })
        }
    }

    pub fn set_field(&mut self, pos: Pos, cell: Cell) -> Result<()> {
        self.check_bounds(pos)?;
        self.map[[pos.x, pos.y]] = cell;
        Ok(())
    }

    /// Panics if `pos` is out of bounds.
    pub fn field(&self, pos: Pos) -> Cell {
        self.map[[pos.x, pos.y]]
    }

    pub fn fields(&self) -> &Array2<Cell> {
        &self.map
    }

    /// Sets both the current and the initial position. Placing the agent on
    /// an obstacle is not checked.
    pub fn set_initial_state(&mut self, pos: Pos) -> Result<()> {
        self.check_bounds(pos)?;
        self.start = pos;
        self.pos = pos;
        Ok(())
    }

    pub fn start_pos(&self) -> Pos {
        self.start
    }

    pub fn pos(&self) -> Pos {
        self.pos
    }

    pub fn rewards(&self) -> Rewards {
        self.rewards
    }

    pub fn set_rewards(&mut self, rewards: Rewards) {
        self.rewards = rewards;
    }

    pub fn probabilities(&self) -> [f64; 5] {
        self.probs
    }

    /// Intended action with probability `1 - 4ε`, each of the other four
    /// outcomes with probability `ε`.
    pub fn change_probabilities(&mut self, epsilon: f64) -> Result<()> {
        if !(0.0..=0.25).contains(&epsilon) {
            return Err(Error::InvalidProbability {
                message: format!("epsilon {} is outside [0, 0.25]", epsilon),
            });
        }
        self.probs = [1.0 - 4.0 * epsilon, epsilon, epsilon, epsilon, epsilon];
        Ok(())
    }

    pub fn set_probabilities(&mut self, probs: [f64; 5]) -> Result<()> {
        if let Some(p) = probs.iter().find(|p| !(**p >= 0.0)) {
            return Err(Error::InvalidProbability {
                message: format!("negative or NaN probability {}", p),
            });
        }
        let total: f64 = probs.iter().sum();
        if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(Error::InvalidProbability {
                message: format!("probabilities sum to {} instead of 1", total),
            });
        }
        self.probs = probs;
        Ok(())
    }

    pub fn is_terminal(&self, pos: Pos) -> bool {
        self.field(pos).is_final()
    }

    pub fn is_terminated(&self) -> bool {
        self.is_terminal(self.pos)
    }

    /// Where `movement` leads from `pos`, or `None` if that cell is outside
    /// the grid or an obstacle.
    pub fn destination(&self, pos: Pos, movement: Movement) -> Option<Pos> {
        check_movement(&self.map, pos, movement)
    }

    fn sample_outcome(&mut self, movement: Movement) -> Movement {
        let outcomes = movement.outcomes();
        let r: f64 = self.rng.gen();
        let mut tot_p = 0.0;
        for (outcome, p) in outcomes.iter().zip(self.probs.iter()) {
            tot_p += p;
            if tot_p > r {
                return *outcome;
            }
        }
        // Rounding left `r` above the accumulated mass.
        outcomes
            .iter()
            .zip(self.probs.iter())
            .rev()
            .find(|(_, p)| **p > 0.0)
            .map(|(outcome, _)| *outcome)
            .unwrap_or(movement)
    }

    /// Executes `movement` under the outcome distribution and returns the
    /// reward of the cell the agent ends up on.
    pub fn perform_action(&mut self, movement: Movement) -> f64 {
        let executed = self.sample_outcome(movement);
        if let Some(new_pos) = self.destination(self.pos, executed) {
            self.pos = new_pos;
        }
        self.actions_performed += 1;
        let reward = self.rewards.for_cell(self.field(self.pos));
        trace!(?movement, ?executed, x = self.pos.x, y = self.pos.y, reward, "performed action");
        reward
    }

    pub fn restart(&mut self) {
        self.pos = self.start;
    }

    pub fn learning_iterations(&self) -> usize {
        self.learning_iterations
    }

    pub fn set_learning_iterations(&mut self, iterations: usize) {
        self.learning_iterations = iterations;
    }

    pub fn cumulative_reward(&self) -> f64 {
        self.cumulative_reward
    }

    pub fn set_cumulative_reward(&mut self, reward: f64) {
        self.cumulative_reward = reward;
    }

    pub fn actions_performed(&self) -> usize {
        self.actions_performed
    }

    pub fn publish_values(&mut self, values: Array2<f64>) {
        self.value_landscape = Some(values);
    }

    pub fn value_landscape(&self) -> Option<&Array2<f64>> {
        self.value_landscape.as_ref()
    }

    pub fn iter_all_coordinates(&self) -> EnvIter {
        EnvIter::new(self.size())
    }
}

impl fmt::Display for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for y in (0..self.height()).rev() {
            for x in 0..self.width() {
                let pos = Pos::new(x, y);
                let symbol = if pos == self.pos { 'A' } else { self.field(pos).symbol() };
                write!(f, "{}", symbol)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Walks every coordinate column by column: `x` outer, `y` inner.
pub struct EnvIter {
    currx: usize,
    curry: usize,
    size: Pos,
}

impl EnvIter {
    fn new(size: Pos) -> EnvIter {
        EnvIter {
            size,
            currx: 0,
            curry: 0,
        }
    }
}

impl Iterator for EnvIter {
    type Item = Pos;

    fn next(&mut self) -> Option<Pos> {
        if self.currx >= self.size.x || self.size.y == 0 {
            return None;
        }
        let pos = Pos { x: self.currx, y: self.curry };
        self.curry += 1;
        if self.curry == self.size.y {
            self.curry = 0;
            self.currx += 1;
        }
        Some(pos)
    }
}
