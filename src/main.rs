//! gridworld CLI - solve grid worlds with value iteration or Q-learning and
//! watch the resulting policy walk them.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gridworld_mdp::{
    display, export, Agent, Env, Policy, Preset, QLearning, QLearningConfig, ValueIteration,
    ValueIterationConfig, WorldSpec,
};

#[derive(Parser)]
#[command(name = "gridworld")]
#[command(version, about = "Policies for stochastic grid worlds", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve the world offline with value iteration
    ValueIteration(ValueIterationArgs),

    /// Learn a policy online with Q-learning
    QLearning(QLearningArgs),
}

#[derive(Args)]
struct WorldArgs {
    /// Built-in map
    #[arg(long, value_enum, default_value = "classic")]
    preset: Preset,

    /// JSON world description, overrides --preset
    #[arg(long)]
    world: Option<PathBuf>,

    /// Random seed for reproducible action outcomes
    #[arg(long)]
    seed: Option<u64>,

    /// Number of policy-driven episodes to run afterwards
    #[arg(long, default_value_t = 1)]
    episodes: usize,

    /// Step bound for each policy-driven episode
    #[arg(long, default_value_t = 1000)]
    max_steps: usize,

    /// Print the grid after every step of the policy-driven episodes
    #[arg(long)]
    show: bool,

    /// Pause between printed steps, in milliseconds
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,
}

impl WorldArgs {
    fn spec(&self) -> Result<WorldSpec> {
        match &self.world {
            Some(path) => WorldSpec::load(path)
                .with_context(|| format!("loading world {}", path.display())),
            None => Ok(self.preset.spec()),
        }
    }

    fn build(&self, spec: &WorldSpec) -> Result<Env> {
        let mut env = spec.build().context("building world")?;
        if let Some(seed) = self.seed {
            env.reseed(seed);
        }
        Ok(env)
    }

    fn agent(&self) -> Agent {
        let agent = Agent::new(self.max_steps);
        if self.show {
            agent.with_display(Duration::from_millis(self.delay_ms))
        } else {
            agent
        }
    }
}

#[derive(Args)]
struct ValueIterationArgs {
    #[command(flatten)]
    world: WorldArgs,

    /// Outcome noise: the intended action runs with probability 1 - 4ε
    #[arg(long)]
    epsilon: Option<f64>,

    /// Discount factor γ
    #[arg(long)]
    discount: Option<f64>,

    /// Number of sweeps over the grid
    #[arg(long)]
    sweeps: Option<usize>,
}

#[derive(Args)]
struct QLearningArgs {
    #[command(flatten)]
    world: WorldArgs,

    /// Learning rate α
    #[arg(long)]
    learning_rate: Option<f64>,

    /// Discount factor γ
    #[arg(long)]
    discount: Option<f64>,

    /// Exploration noise applied to the world while learning, replaces any
    /// distribution the world sets
    #[arg(long)]
    exploration: Option<f64>,

    /// Stop learning once the cumulative reward reaches this value
    #[arg(long)]
    threshold: Option<f64>,

    /// Stop learning after this many episodes
    #[arg(long)]
    max_episodes: Option<usize>,

    /// Record the cumulative reward every this many steps
    #[arg(long)]
    sample_every: Option<usize>,

    /// Where to write the cumulative reward curve
    #[arg(long, default_value = "cumulative_rewards.csv")]
    output: PathBuf,
}

fn run_policy<P: Policy>(env: &mut Env, policy: &P, world: &WorldArgs) {
    let agent = world.agent();
    for episode in 1..=world.episodes {
        let outcome = agent.run_episode(env, policy);
        println!(
            "Episode {}: {} steps, reward {:.3}, {}",
            episode,
            outcome.steps,
            outcome.reward,
            if outcome.terminated { "terminated" } else { "stopped" }
        );
    }
}

fn value_iteration(args: ValueIterationArgs) -> Result<()> {
    let mut env = args.world.build(&args.world.spec()?)?;
    if let Some(epsilon) = args.epsilon {
        env.change_probabilities(epsilon)?;
    }
    let defaults = ValueIterationConfig::default();
    let config = ValueIterationConfig {
        discount: args.discount.unwrap_or(defaults.discount),
        sweeps: args.sweeps.unwrap_or(defaults.sweeps),
    };

    let solver = ValueIteration::solve(&mut env, config);

    println!("{}", env);
    println!("Values:\n{}", display::render_values(&env, solver.values()));
    println!("Policy:\n{}", display::render_policy(&env, &solver));
    println!("Complexity: {}", solver.complexity());

    run_policy(&mut env, &solver, &args.world);
    Ok(())
}

fn q_learning(args: QLearningArgs) -> Result<()> {
    let spec = args.world.spec()?;
    let mut env = args.world.build(&spec)?;
    let defaults = QLearningConfig::default();
    let config = QLearningConfig {
        learning_rate: args.learning_rate.unwrap_or(defaults.learning_rate),
        discount: args.discount.unwrap_or(defaults.discount),
        exploration: args.exploration.unwrap_or(defaults.exploration),
        reward_threshold: args.threshold.unwrap_or(defaults.reward_threshold),
        sample_every: args.sample_every.unwrap_or(defaults.sample_every),
        max_episodes: args.max_episodes.or(defaults.max_episodes),
    };

    if spec.sets_distribution() {
        warn!(
            exploration = config.exploration,
            "the world's outcome distribution is replaced by the exploration noise"
        );
    }

    let mut learner = QLearning::new(&mut env, config).context("setting up q-learning")?;
    let report = learner.learn();
    let table = learner.into_table();

    if let Err(err) = export::dump_cumulative_rewards(&args.output, &report.samples) {
        warn!(error = %err, path = %args.output.display(), "could not export cumulative rewards");
    }

    info!(
        episodes = report.episodes,
        steps = report.steps,
        cumulative_reward = report.cumulative_reward,
        "learning done"
    );
    println!("{}", env);
    println!("Policy:\n{}", display::render_policy(&env, &table));
    println!(
        "Learning iterations: {}, cumulative reward: {:.3}",
        env.learning_iterations(),
        env.cumulative_reward()
    );

    run_policy(&mut env, &table, &args.world);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::ValueIteration(args) => value_iteration(args),
        Commands::QLearning(args) => q_learning(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epsilon_belongs_to_value_iteration() {
        let cli = Cli::try_parse_from(["gridworld", "value-iteration", "--epsilon", "0.1"]).unwrap();
        match cli.command {
            Commands::ValueIteration(args) => assert_eq!(args.epsilon, Some(0.1)),
            Commands::QLearning(_) => panic!("parsed the wrong subcommand"),
        }

        assert!(Cli::try_parse_from(["gridworld", "q-learning", "--epsilon", "0.1"]).is_err());
        let cli = Cli::try_parse_from(["gridworld", "q-learning", "--exploration", "0.1"]).unwrap();
        match cli.command {
            Commands::QLearning(args) => assert_eq!(args.exploration, Some(0.1)),
            Commands::ValueIteration(_) => panic!("parsed the wrong subcommand"),
        }
    }
}
