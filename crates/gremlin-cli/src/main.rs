mod render;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use gremlin_analysis::{AnalysisResult, Gremlin, RunDir};
use gremlin_core::{ConfigManager, Depth, GremlinConfig, LoggingConfig, PatternCatalog};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, Registry};

/// Exit status when `--fail-on` finds matching risks
const EXIT_RISKS_FOUND: i32 = 2;

#[derive(Parser)]
#[command(name = "gremlin")]
#[command(about = "Gremlin - exploratory QA risk analysis for feature scopes", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./.gremlin.toml, then ~/.gremlin/config.toml)
    #[arg(long, global = true, env = "GREMLIN_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Rich,
    Md,
    Json,
    Junit,
}

#[derive(Clone, Copy, ValueEnum)]
enum DepthArg {
    Quick,
    Deep,
}

impl From<DepthArg> for Depth {
    fn from(arg: DepthArg) -> Self {
        match arg {
            DepthArg::Quick => Depth::Quick,
            DepthArg::Deep => Depth::Deep,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FailOn {
    Critical,
    High,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a feature/scope for QA risks (all four stages)
    Review {
        /// Feature or area to analyze
        scope: String,

        /// Analysis depth
        #[arg(short, long, value_enum)]
        depth: Option<DepthArg>,

        /// Confidence threshold (0-100)
        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=100))]
        threshold: Option<u8>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "rich")]
        output: OutputFormat,

        /// Extra context for the engine; `@path` reads a file
        #[arg(short, long)]
        context: Option<String>,

        /// Run a second pass that rejects irrelevant, generic or duplicate risks
        #[arg(long)]
        validate: bool,

        /// Directory of pattern YAML files (replaces the built-in catalog)
        #[arg(long)]
        patterns_dir: Option<PathBuf>,

        /// Exit with status 2 when risks at or above this severity are found
        #[arg(long, value_enum)]
        fail_on: Option<FailOn>,
    },

    /// Stage 1: infer domains and save understanding.json
    Understand {
        /// Feature or area to analyze
        scope: String,

        #[arg(short, long, value_enum)]
        depth: Option<DepthArg>,

        #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=100))]
        threshold: Option<u8>,

        /// Extra context for the engine; `@path` reads a file
        #[arg(short, long)]
        context: Option<String>,

        #[arg(long)]
        run_dir: Option<PathBuf>,
    },

    /// Stage 2: select patterns and save scenarios.json
    Ideate {
        #[arg(long)]
        patterns_dir: Option<PathBuf>,

        #[arg(long)]
        run_dir: Option<PathBuf>,
    },

    /// Stage 3: call the reasoning engine and save results.json
    Rollout {
        #[arg(long)]
        run_dir: Option<PathBuf>,
    },

    /// Stage 4: parse (and optionally validate) risks and save scores.json
    Judge {
        #[arg(long)]
        validate: bool,

        #[arg(short, long, value_enum, default_value = "rich")]
        output: OutputFormat,

        #[arg(long, value_enum)]
        fail_on: Option<FailOn>,

        #[arg(long)]
        run_dir: Option<PathBuf>,
    },

    /// List or show breaking patterns
    #[command(subcommand)]
    Patterns(PatternCommands),
}

#[derive(Subcommand)]
enum PatternCommands {
    /// List universal categories and domains
    List {
        #[arg(long)]
        patterns_dir: Option<PathBuf>,
    },

    /// Show the patterns of one domain or universal category
    Show {
        /// Domain (e.g. payments) or category (e.g. input_validation)
        name: String,

        #[arg(long)]
        patterns_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let manager = match &cli.config {
        Some(path) => ConfigManager::load_from(path)?,
        None => ConfigManager::load()?,
    };
    let mut config = manager.config().clone();
    init_logging(&config.logging, cli.verbose);
    if let Some(path) = manager.config_path() {
        debug!(path = %path.display(), "Loaded configuration");
    }

    match cli.command {
        Commands::Review {
            scope,
            depth,
            threshold,
            output,
            context,
            validate,
            patterns_dir,
            fail_on,
        } => {
            apply_overrides(&mut config, threshold, patterns_dir, None);
            let depth = depth.map(Depth::from).unwrap_or(config.analysis.depth);
            let context = resolve_context(context)?;

            let gremlin = Gremlin::from_config(&config)?;
            let result = gremlin
                .analyze(&scope, context.as_deref(), depth, validate)
                .await?;
            print_result(&result, output)?;
            Ok(exit_code(&result, fail_on))
        }

        Commands::Understand {
            scope,
            depth,
            threshold,
            context,
            run_dir,
        } => {
            apply_overrides(&mut config, threshold, None, run_dir);
            let depth = depth.map(Depth::from).unwrap_or(config.analysis.depth);
            let context = resolve_context(context)?;

            let gremlin = Gremlin::from_config(&config)?;
            let understanding = gremlin.understand(&scope, context.as_deref(), depth)?;
            let path = run_dir_for(&config).save_understanding(&understanding)?;

            let domains = if understanding.matched_domains.is_empty() {
                "none".to_string()
            } else {
                understanding.matched_domains.join(", ")
            };
            println!("{} {}", "Domains:".bold(), domains.green());
            println!("{} {}", "Saved".dimmed(), path.display());
            Ok(0)
        }

        Commands::Ideate {
            patterns_dir,
            run_dir,
        } => {
            apply_overrides(&mut config, None, patterns_dir, run_dir);
            let run = run_dir_for(&config);
            let understanding = load_or_explain(run.load_understanding(), "understand")?;

            let gremlin = Gremlin::from_config(&config)?;
            let ideation = gremlin.ideate(understanding)?;
            let path = run.save_ideation(&ideation)?;

            println!(
                "{} {} ({} universal, {} domain)",
                "Patterns:".bold(),
                ideation.pattern_count,
                ideation.selected_patterns.universal_count(),
                ideation.selected_patterns.domain_count()
            );
            println!("{} {}", "Saved".dimmed(), path.display());
            Ok(0)
        }

        Commands::Rollout { run_dir } => {
            apply_overrides(&mut config, None, None, run_dir);
            let run = run_dir_for(&config);
            let ideation = load_or_explain(run.load_ideation(), "ideate")?;

            let gremlin = Gremlin::from_config(&config)?;
            let rollout = gremlin.rollout(ideation).await?;
            let path = run.save_rollout(&rollout)?;

            println!(
                "{} {} characters",
                "Response:".bold(),
                rollout.raw_response.len()
            );
            println!("{} {}", "Saved".dimmed(), path.display());
            Ok(0)
        }

        Commands::Judge {
            validate,
            output,
            fail_on,
            run_dir,
        } => {
            apply_overrides(&mut config, None, None, run_dir);
            let run = run_dir_for(&config);
            let rollout = load_or_explain(run.load_rollout(), "rollout")?;

            let gremlin = Gremlin::from_config(&config)?;
            let judgment = gremlin.judge(rollout, validate).await?;
            let path = run.save_judgment(&judgment)?;
            eprintln!("{} {}", "Saved".dimmed(), path.display());

            let result = AnalysisResult::from_judgment(&judgment);
            print_result(&result, output)?;
            Ok(exit_code(&result, fail_on))
        }

        Commands::Patterns(command) => {
            let (name, patterns_dir) = match command {
                PatternCommands::List { patterns_dir } => (None, patterns_dir),
                PatternCommands::Show { name, patterns_dir } => (Some(name), patterns_dir),
            };
            apply_overrides(&mut config, None, patterns_dir, None);
            let catalog = match &config.analysis.patterns_dir {
                Some(dir) => PatternCatalog::load_dir(dir)?,
                None => PatternCatalog::builtin()?,
            };

            match name {
                None => println!("{}", render::render_pattern_list(&catalog)),
                Some(name) => match render::render_pattern_detail(&catalog, &name) {
                    Some(detail) => println!("{}", detail),
                    None => {
                        eprintln!("{}", format!("Unknown domain: {}", name).red());
                        eprintln!(
                            "{}",
                            format!(
                                "Available: {}",
                                render::available_pattern_names(&catalog).join(", ")
                            )
                            .dimmed()
                        );
                        return Ok(1);
                    }
                },
            }
            Ok(0)
        }
    }
}

fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
    };
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // stdout is reserved for reports
    match logging.format.as_str() {
        "json" => {
            let subscriber = Registry::default().with(filter).with(layer.json());
            tracing::subscriber::set_global_default(subscriber).ok();
        }
        "compact" => {
            let subscriber = Registry::default().with(filter).with(layer.compact());
            tracing::subscriber::set_global_default(subscriber).ok();
        }
        _ => {
            let subscriber = Registry::default().with(filter).with(layer);
            tracing::subscriber::set_global_default(subscriber).ok();
        }
    }
}

fn apply_overrides(
    config: &mut GremlinConfig,
    threshold: Option<u8>,
    patterns_dir: Option<PathBuf>,
    run_dir: Option<PathBuf>,
) {
    if let Some(threshold) = threshold {
        config.analysis.threshold = threshold;
    }
    if let Some(dir) = patterns_dir {
        config.analysis.patterns_dir = Some(dir);
    }
    if let Some(dir) = run_dir {
        config.analysis.run_dir = dir;
    }
}

fn run_dir_for(config: &GremlinConfig) -> RunDir {
    RunDir::new(&config.analysis.run_dir)
}

/// `@path` reads context from a file; anything else is used verbatim
fn resolve_context(context: Option<String>) -> Result<Option<String>> {
    match context {
        Some(value) => match value.strip_prefix('@') {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .map_err(|e| anyhow!("Failed to read context file {}: {}", path, e))?;
                Ok(Some(content))
            }
            None => Ok(Some(value)),
        },
        None => Ok(None),
    }
}

fn load_or_explain<T>(loaded: gremlin_analysis::Result<T>, previous: &str) -> Result<T> {
    match loaded {
        Ok(artifact) => Ok(artifact),
        Err(e) => bail!("{} (run 'gremlin {}' first)", e, previous),
    }
}

fn print_result(result: &AnalysisResult, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Rich => println!("{}", render::render_rich(result)),
        OutputFormat::Md => println!("{}", result.to_markdown()),
        OutputFormat::Json => println!("{}", result.to_json()?),
        OutputFormat::Junit => println!("{}", result.to_junit()),
    }
    Ok(())
}

fn exit_code(result: &AnalysisResult, fail_on: Option<FailOn>) -> i32 {
    let failing = match fail_on {
        Some(FailOn::Critical) => result.has_critical_risks(),
        Some(FailOn::High) => result.has_high_severity_risks(),
        None => false,
    };
    if failing {
        EXIT_RISKS_FOUND
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gremlin_analysis::Risk;

    #[test]
    fn test_cli_parses_review() {
        let cli = Cli::try_parse_from([
            "gremlin",
            "review",
            "checkout flow",
            "-d",
            "deep",
            "-t",
            "60",
            "-o",
            "junit",
            "--validate",
            "--fail-on",
            "high",
        ])
        .unwrap();
        match cli.command {
            Commands::Review {
                scope,
                threshold,
                validate,
                fail_on,
                ..
            } => {
                assert_eq!(scope, "checkout flow");
                assert_eq!(threshold, Some(60));
                assert!(validate);
                assert!(matches!(fail_on, Some(FailOn::High)));
            }
            _ => panic!("expected review"),
        }
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        assert!(Cli::try_parse_from(["gremlin", "review", "x", "-t", "150"]).is_err());
    }

    #[test]
    fn test_context_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ctx.txt");
        std::fs::write(&path, "fn charge() {}").unwrap();

        let arg = format!("@{}", path.display());
        assert_eq!(
            resolve_context(Some(arg)).unwrap().as_deref(),
            Some("fn charge() {}")
        );
        assert_eq!(
            resolve_context(Some("inline".into())).unwrap().as_deref(),
            Some("inline")
        );
        assert!(resolve_context(Some("@/definitely/missing".into())).is_err());
    }

    #[test]
    fn test_fail_on_exit_codes() {
        let high = AnalysisResult::new("s", vec![Risk::new("HIGH", 90, "w", "i")], vec![], 0);
        assert_eq!(exit_code(&high, None), 0);
        assert_eq!(exit_code(&high, Some(FailOn::Critical)), 0);
        assert_eq!(exit_code(&high, Some(FailOn::High)), EXIT_RISKS_FOUND);
    }
}
