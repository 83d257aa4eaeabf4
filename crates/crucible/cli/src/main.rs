use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use crucible_service::{
    AutonomyLevel, CrucibleService, EvolveOptions, GenerateOptions, GenerationMode,
};
use crucible_types::EvolutionStrategyKind;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crucible", about = "Saga-driven generation and evolution of code candidates")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a project from requirements text (simulated collaborators)
    Generate(GenerateArgs),

    /// Generate a project, then evolve its stored result
    Evolve(EvolveArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// Project name
    #[arg(long, default_value = "demo")]
    name: String,

    /// Natural-language requirements
    #[arg(
        long,
        default_value = "Create Invoice and Customer records. Support refund and report. The service must stay deterministic."
    )]
    requirements: String,

    /// Candidate strategies per batch
    #[arg(long, default_value_t = 5)]
    strategies: usize,

    /// Checkpoint acceptance threshold (0-100)
    #[arg(long, default_value_t = 80.0)]
    threshold: f64,

    /// Render the final artifact for release instead of prototyping
    #[arg(long)]
    production: bool,

    /// Regenerate on a retry verdict without operator input
    #[arg(long)]
    autonomous: bool,
}

#[derive(Args)]
struct EvolveArgs {
    #[command(flatten)]
    generate: GenerateArgs,

    /// Variation strategy
    #[arg(long, value_enum, default_value = "genetic")]
    strategy: StrategyArg,

    /// Individuals per generation
    #[arg(long, default_value_t = 10)]
    population: usize,

    /// Generation budget
    #[arg(long, default_value_t = 25)]
    generations: u32,

    /// Convergence threshold on the 0-1 fitness scale
    #[arg(long, default_value_t = 0.9)]
    fitness_threshold: f64,

    /// Pause between generations, in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Fixed RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum StrategyArg {
    Genetic,
    Differential,
    #[value(name = "particle_swarm")]
    ParticleSwarm,
    #[value(name = "simulated_annealing")]
    SimulatedAnnealing,
    #[value(name = "ab_testing")]
    AbTesting,
    Hybrid,
}

impl StrategyArg {
    fn as_kind(self) -> EvolutionStrategyKind {
        match self {
            StrategyArg::Genetic => EvolutionStrategyKind::Genetic,
            StrategyArg::Differential => EvolutionStrategyKind::Differential,
            StrategyArg::ParticleSwarm => EvolutionStrategyKind::ParticleSwarm,
            StrategyArg::SimulatedAnnealing => EvolutionStrategyKind::SimulatedAnnealing,
            StrategyArg::AbTesting => EvolutionStrategyKind::AbTesting,
            StrategyArg::Hybrid => EvolutionStrategyKind::Hybrid,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Generate(args) => handle_generate(args).await,
        Commands::Evolve(args) => handle_evolve(args).await,
    }
}

async fn handle_generate(args: GenerateArgs) -> Result<()> {
    let service = CrucibleService::simulated();
    let handle = service
        .generate(&args.name, &args.requirements, generate_options(&args))
        .await?;

    print_ok(&format!(
        "Generation finished after {} attempt(s)",
        handle.attempts
    ));
    println!("Project:    {}", handle.project_id);
    println!("Run:        {}", handle.workflow_run_id);
    println!("Candidate:  {}", handle.best_candidate);
    println!("Quality:    {:.1}", handle.quality_score);
    println!("Checkpoint: {:?}", handle.checkpoint_status);
    for hint in &handle.improvements {
        print_warn(hint);
    }

    let health = service.health().await?;
    println!("Health: {}", serde_json::to_string_pretty(&health)?);
    Ok(())
}

async fn handle_evolve(args: EvolveArgs) -> Result<()> {
    let service = CrucibleService::simulated();
    let seed_options = generate_options(&args.generate);
    let generated = service
        .generate(&args.generate.name, &args.generate.requirements, seed_options)
        .await?;
    print_ok(&format!(
        "Seed project ready (quality {:.1})",
        generated.quality_score
    ));

    let mut options = EvolveOptions::new(args.strategy.as_kind())
        .with_population_size(args.population)
        .with_max_generations(args.generations)
        .with_fitness_threshold(args.fitness_threshold)
        .with_quality_threshold(args.generate.threshold);
    if let Some(ms) = args.interval_ms {
        options = options.with_interval(Duration::from_millis(ms));
    }
    if let Some(seed) = args.seed {
        options = options.with_rng_seed(seed);
    }

    let outcome = service
        .start_evolution(&generated.project_id, options)
        .await?;
    if outcome.accepted {
        print_ok("Evolved artifact accepted and persisted");
    } else {
        print_warn("Evolved artifact rejected; original result kept");
    }
    let run = &outcome.run;
    println!("Run:         {}", run.id);
    println!("Strategy:    {:?}", run.strategy);
    println!(
        "Generations: {}/{}",
        run.current_generation, run.max_generations
    );
    println!("Baseline:    {:.3}", run.baseline_fitness);
    println!("Best:        {:.3}", run.best_fitness_achieved);
    if let Some(quality) = outcome.final_quality {
        println!("Quality:     {:.1}", quality);
    }
    Ok(())
}

fn generate_options(args: &GenerateArgs) -> GenerateOptions {
    let mut options = GenerateOptions::new()
        .with_strategy_count(args.strategies)
        .with_quality_threshold(args.threshold);
    if args.production {
        options = options.with_mode(GenerationMode::Production);
    }
    if args.autonomous {
        options = options.with_autonomy_level(AutonomyLevel::Autonomous);
    }
    options
}

fn print_ok(message: &str) {
    println!("  [OK] {}", message);
}

fn print_warn(message: &str) {
    println!("  [WARN] {}", message);
}
