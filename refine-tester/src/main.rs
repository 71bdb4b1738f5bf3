mod common;
mod logic;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use refine_engine::constants::{ACCEPTANCE_ITERATIONS, ACCEPTANCE_TOLERANCE};
use refine_engine::{
    DataLoader, EvaluationMode, Mechanic, ModifierChoice, ModifierCombo, RefineEngine,
};
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use common::{parse_index_list, split_csv};
use logic::{
    FileDataLoader, PlanOptions, RefineTester, ScenarioResult, build_scenarios,
    resolve_seed_inputs, single_track_choice,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunMode {
    /// Exact expectations only (fast, no randomness)
    Closed,
    /// Monte Carlo only
    Simulate,
    /// Both, reporting the deviation between them
    Both,
}

/// Consumables applied to `--trace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TraceCombo {
    None,
    Catalyst,
    BonusItem,
    Both,
}

impl From<TraceCombo> for ModifierCombo {
    fn from(combo: TraceCombo) -> Self {
        match combo {
            TraceCombo::None => Self::None,
            TraceCombo::Catalyst => Self::Catalyst,
            TraceCombo::BonusItem => Self::BonusItem,
            TraceCombo::Both => Self::Both,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "refine-tester", version = "0.1.0")]
#[command(about = "Cross-validates refine expectations against Monte Carlo simulation")]
struct Args {
    /// Evaluation mode: closed (exact), simulate (Monte Carlo), or both
    #[arg(long, value_enum, default_value_t = RunMode::Both)]
    mode: RunMode,

    /// Single-track levels to evaluate (comma-separated, ranges, or "all")
    #[arg(long, default_value = "all")]
    levels: String,

    /// Dual-track stages to evaluate (comma-separated, "all", or "none")
    #[arg(long, default_value = "none")]
    stages: String,

    /// Also evaluate enhanced ancestor tables where a stage has one
    #[arg(long)]
    enhanced: bool,

    /// Monte Carlo iterations per evaluation
    #[arg(long, default_value_t = 2000)]
    iterations: usize,

    /// Seeds to run (comma-separated)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Fixed catalyst stack count (defaults to each level's bucket cap)
    #[arg(long)]
    catalyst_stacks: Option<u32>,

    /// Acceptance sweep: forces ≥10000 iterations and fails on deviation beyond tolerance
    #[arg(long)]
    acceptance: bool,

    /// Relative tolerance for acceptance checks
    #[arg(long, default_value_t = ACCEPTANCE_TOLERANCE)]
    tolerance: f64,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console", "csv"])]
    report: String,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Single-track tables to load instead of the embedded ones
    #[arg(long)]
    model: Option<PathBuf>,

    /// Dual-track tables to load instead of the embedded ones
    #[arg(long)]
    advanced_model: Option<PathBuf>,

    /// Print one seeded attempt trace for this level
    #[arg(long)]
    trace: Option<u32>,

    /// Consumables for the trace; catalysts use --catalyst-stacks or the bucket cap
    #[arg(long, value_enum, default_value_t = TraceCombo::None)]
    trace_combo: TraceCombo,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    announce_banner();

    let start_time = Instant::now();
    let loader = FileDataLoader::new(args.model.clone(), args.advanced_model.clone());
    let engine = RefineEngine::new(loader).context("failed to load refine tables")?;
    let seeds = resolve_seed_inputs(&split_csv(&args.seeds))?;
    let mode = evaluation_mode(&args);

    if let Some(level) = args.trace {
        print_trace(&args, &engine, level, seeds[0])?;
    }

    let options = plan_options(&args, &engine)?;
    let scenarios = build_scenarios(&engine, &options)?;
    let tester = RefineTester::new(&engine, args.tolerance, args.acceptance, args.verbose);

    println!("{}", "🧮 Running Evaluations".bright_yellow().bold());
    println!("{}", "-".repeat(30).yellow());
    let results: Vec<ScenarioResult> = scenarios
        .iter()
        .flat_map(|scenario| tester.run_scenario(scenario, &seeds, mode))
        .collect();

    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn announce_banner() {
    println!("{}", "🔨 Refine Engine Tester".bright_cyan().bold());
    println!("{}", "=======================".cyan());
}

fn compute_iterations(args: &Args) -> usize {
    if args.acceptance {
        if args.iterations < ACCEPTANCE_ITERATIONS {
            println!(
                "🔁 Acceptance mode enabled: increasing iterations from {} to {ACCEPTANCE_ITERATIONS}",
                args.iterations
            );
        } else {
            println!(
                "🔁 Acceptance mode enabled: using {} iterations",
                args.iterations
            );
        }
        args.iterations.max(ACCEPTANCE_ITERATIONS)
    } else {
        args.iterations
    }
}

fn evaluation_mode(args: &Args) -> EvaluationMode {
    let iterations = compute_iterations(args);
    match (args.mode, args.acceptance) {
        (RunMode::Closed, false) => EvaluationMode::ClosedForm,
        (RunMode::Simulate, _) => EvaluationMode::MonteCarlo { iterations },
        (RunMode::Closed | RunMode::Both, _) => EvaluationMode::Both { iterations },
    }
}

fn plan_options<L: DataLoader>(args: &Args, engine: &RefineEngine<L>) -> Result<PlanOptions> {
    let levels: Vec<u32> = engine.probability_model().levels().collect();
    let stages: Vec<u32> = engine.advanced_model().stages().collect();
    let parse_or_none = |raw: &str, available: &[u32]| -> Result<Vec<u32>> {
        if raw.trim().eq_ignore_ascii_case("none") {
            Ok(Vec::new())
        } else {
            parse_index_list(raw, available)
        }
    };
    Ok(PlanOptions {
        levels: parse_or_none(&args.levels, &levels).context("invalid --levels")?,
        stages: parse_or_none(&args.stages, &stages).context("invalid --stages")?,
        enhanced: args.enhanced,
        catalyst_stacks: args.catalyst_stacks,
    })
}

fn trace_choice<L: DataLoader>(
    args: &Args,
    engine: &RefineEngine<L>,
    level: u32,
) -> Result<ModifierChoice> {
    single_track_choice(
        engine.probability_model(),
        level,
        args.trace_combo.into(),
        args.catalyst_stacks,
    )
    .with_context(|| format!("cannot trace level {level}"))
}

fn print_trace<L: DataLoader>(
    args: &Args,
    engine: &RefineEngine<L>,
    level: u32,
    seed: u64,
) -> Result<()> {
    let choice = trace_choice(args, engine, level)?;
    let records = engine
        .trace_attempts(level, &choice, seed)
        .with_context(|| format!("cannot trace level {level}"))?;
    let label = format!("{}, seed {seed}", Mechanic::single(level, choice));
    let mut out = stdout();
    logic::reports::generate_trace(&mut out, &label, &records)?;
    writeln!(out)?;
    Ok(())
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => logic::reports::generate_json_report(output_target.writer(), results)?,
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Refine Evaluation Results\n\n_No evaluations executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(output_target.writer(), results)?;
            }
        }
        "csv" => logic::reports::generate_csv_report(output_target.writer(), results)?,
        _ => {
            let duration = start_time.elapsed();
            if results.is_empty() {
                writeln!(&mut output_target, "No evaluations executed.")?;
            } else {
                logic::reports::generate_console_report(
                    output_target.writer(),
                    results,
                    duration,
                )?;
            }
            writeln!(&mut output_target)?;
            writeln!(&mut output_target, "🏁 Total time: {duration:?}")?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            mode: RunMode::Closed,
            levels: "11".to_string(),
            stages: "none".to_string(),
            enhanced: false,
            iterations: 100,
            seeds: "1337".to_string(),
            catalyst_stacks: None,
            acceptance: false,
            tolerance: ACCEPTANCE_TOLERANCE,
            report: "json".to_string(),
            output: None,
            model: None,
            advanced_model: None,
            trace: None,
            trace_combo: TraceCombo::None,
            verbose: false,
        }
    }

    fn temp_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "refine-main-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    #[test]
    fn acceptance_raises_iterations_and_forces_simulation() {
        let mut args = base_args();
        args.acceptance = true;
        assert_eq!(compute_iterations(&args), ACCEPTANCE_ITERATIONS);
        assert_eq!(
            evaluation_mode(&args),
            EvaluationMode::Both {
                iterations: ACCEPTANCE_ITERATIONS
            }
        );
        args.iterations = 20_000;
        assert_eq!(compute_iterations(&args), 20_000);
    }

    #[test]
    fn closed_mode_without_acceptance_is_exact_only() {
        assert_eq!(evaluation_mode(&base_args()), EvaluationMode::ClosedForm);
        let args = Args {
            mode: RunMode::Simulate,
            ..base_args()
        };
        assert_eq!(
            evaluation_mode(&args),
            EvaluationMode::MonteCarlo { iterations: 100 }
        );
    }

    #[test]
    fn plan_options_expand_keywords() {
        let engine = RefineEngine::embedded().unwrap();
        let args = Args {
            levels: "all".to_string(),
            stages: "all".to_string(),
            ..base_args()
        };
        let options = plan_options(&args, &engine).unwrap();
        assert_eq!(options.levels.len(), 15);
        assert_eq!(options.stages, vec![1, 2]);

        let none = Args {
            levels: "none".to_string(),
            ..base_args()
        };
        assert!(plan_options(&none, &engine).unwrap().levels.is_empty());
    }

    #[test]
    fn trace_choice_follows_combo_and_stack_flags() {
        let engine = RefineEngine::embedded().unwrap();
        assert_eq!(
            trace_choice(&base_args(), &engine, 11).unwrap(),
            ModifierChoice::NONE
        );

        let saturated = Args {
            trace_combo: TraceCombo::Both,
            ..base_args()
        };
        assert_eq!(
            trace_choice(&saturated, &engine, 11).unwrap(),
            ModifierChoice::new(true, 20, true)
        );

        let fixed = Args {
            trace_combo: TraceCombo::Catalyst,
            catalyst_stacks: Some(5),
            ..base_args()
        };
        assert_eq!(
            trace_choice(&fixed, &engine, 11).unwrap(),
            ModifierChoice::new(true, 5, false)
        );
        assert!(trace_choice(&fixed, &engine, 40).is_err());
    }

    #[test]
    fn write_reports_emits_json_output() {
        let temp = temp_path("report.json");
        let args = Args {
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[], Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("[]"));
    }

    #[test]
    fn write_reports_markdown_empty_results() {
        let temp = temp_path("report.md");
        let args = Args {
            report: "markdown".to_string(),
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[], Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("No evaluations executed"));
    }
}
