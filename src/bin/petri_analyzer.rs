use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;
use serde::Serialize;

use biodivine_lib_petri_nets::{
    load_pnml, DeadlockDetector, DeadlockReport, ExplicitReachability, PetriNet,
    ReachabilityConfig, ReachableStates, SymbolicReachability, DEFAULT_MAX_ATTEMPTS,
};

/// Formulas and marking lists beyond this size are hidden in the console report.
const FORMULA_PRINT_LIMIT: usize = 400;
const MARKING_LIST_PRINT_LIMIT: usize = 20;

#[derive(Parser)]
#[command(name = "petri_analyzer")]
#[command(about = "Symbolic reachability and deadlock analysis of 1-safe PNML nets")]
struct Args {
    /// Path to a .pnml file, or a directory scanned for *.pnml files
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// Upper bound on propose-and-check rounds in the deadlock detector
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS, require_equals = true)]
    max_attempts: usize,

    /// Skip the explicit-state cross-check of the symbolic marking count
    #[arg(long)]
    skip_explicit: bool,

    /// Emit one JSON summary per net instead of the console report
    #[arg(long)]
    json: bool,

    /// Logging verbosity (use -v for info, or -v=LEVEL for specific level)
    #[arg(long, short = 'v', value_name = "LEVEL", num_args = 0..=1, default_missing_value = "info", require_equals = true)]
    verbose: Option<Option<LogLevel>>,
}

#[derive(Clone, clap::ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
}

impl From<LogLevel> for LevelFilter {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => LevelFilter::Trace,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Info => LevelFilter::Info,
        }
    }
}

/// Machine-readable per-net result for `--json`.
#[derive(Serialize)]
struct NetSummary {
    file: String,
    places: usize,
    transitions: usize,
    reachable_markings: String,
    reachability_iterations: usize,
    reachability_seconds: f64,
    explicit_markings: Option<usize>,
    counts_match: Option<bool>,
    deadlock_status: String,
    deadlock_marking: Option<BTreeMap<String, u8>>,
    deadlock_seconds: f64,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = match &args.verbose {
        None => LevelFilter::Off,
        Some(None) => LevelFilter::Info,
        Some(Some(level)) => level.clone().into(),
    };
    Builder::from_default_env().filter_level(log_level).init();

    let files = match collect_files(&args.path) {
        Ok(files) => files,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::FAILURE;
        }
    };

    let mut failed = false;
    for file in &files {
        if !analyze_file(file, &args) {
            failed = true;
        }
    }
    if !args.json {
        println!("{}", "=".repeat(70));
        println!("Processed {} file(s).", files.len());
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// A single file, or every `*.pnml` file of a directory in sorted order.
fn collect_files(path: &Path) -> Result<Vec<PathBuf>, String> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(format!("Path {} does not exist.", path.display()));
    }

    let entries =
        std::fs::read_dir(path).map_err(|e| format!("Cannot read {}: {e}", path.display()))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "pnml"))
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(format!("No .pnml files found in {}.", path.display()));
    }
    Ok(files)
}

/// Run the full pipeline on one net. Returns `false` when the file could not be
/// analyzed or the cross-check failed; later files are still processed.
fn analyze_file(file: &Path, args: &Args) -> bool {
    if !args.json {
        println!("{}", "=".repeat(70));
        println!("Testing: {}", file.display());
        println!("{}", "=".repeat(70));
    }

    let net = match load_pnml(file) {
        Ok(net) => net,
        Err(error) => {
            eprintln!("Cannot load {}: {error}", file.display());
            return false;
        }
    };

    if !args.json {
        println!(
            "Loaded net with {} places and {} transitions.",
            net.num_places(),
            net.num_transitions()
        );
    }

    let symbolic = SymbolicReachability::new(&net);
    let reachability = symbolic.compute(&ReachabilityConfig::default());

    let mut summary = NetSummary {
        file: file.display().to_string(),
        places: net.num_places(),
        transitions: net.num_transitions(),
        reachable_markings: String::new(),
        reachability_iterations: 0,
        reachability_seconds: 0.0,
        explicit_markings: None,
        counts_match: None,
        deadlock_status: String::new(),
        deadlock_marking: None,
        deadlock_seconds: 0.0,
    };
    let mut ok = true;

    let report: DeadlockReport;
    match &reachability {
        Ok(reachable) => {
            summary.reachable_markings = reachable.count().to_string();
            summary.reachability_iterations = reachable.iterations();
            summary.reachability_seconds = reachable.elapsed().as_secs_f64();

            if !args.json {
                println!("\n[Symbolic reachability]");
                println!("   Total markings: {}", reachable.count());
                println!("   Iterations: {}", reachable.iterations());
                println!("   Time: {:.4}s", reachable.elapsed().as_secs_f64());
                print_formula("Initial formula", reachable.initial_formula());
                print_formula("Final formula", reachable.final_formula());
            }

            if !args.skip_explicit {
                ok &= cross_check(&net, reachable, args, &mut summary);
            }

            let detector = DeadlockDetector::new(&symbolic).with_max_attempts(args.max_attempts);
            report = match detector.detect(reachable) {
                Ok(report) => report,
                Err(error) => {
                    eprintln!("Deadlock detection failed: {error}");
                    return false;
                }
            };
        }
        Err(error) => {
            eprintln!("Symbolic reachability failed: {error}");
            ok = false;
            report = DeadlockReport::computation_failed(error);
        }
    }

    summary.deadlock_status = report.status.to_string();
    summary.deadlock_seconds = report.elapsed.as_secs_f64();
    summary.deadlock_marking = report.marking.as_ref().map(|m| net.named_marking(m));

    if args.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(error) => {
                eprintln!("Cannot serialize summary: {error}");
                ok = false;
            }
        }
    } else {
        println!("\n[Deadlock detection]");
        println!("   Result: {}", report.status);
        if let Some(marking) = &report.marking {
            let marked: Vec<&str> = marking
                .marked_places()
                .map(|p| net.places()[p].display_name())
                .collect();
            if marked.is_empty() {
                println!("   Deadlock marking: (empty)");
            } else {
                println!("   Deadlock marking: {}", marked.join(", "));
            }
        }
        println!("   Time: {:.4}s", report.elapsed.as_secs_f64());
    }

    ok
}

fn cross_check(
    net: &PetriNet,
    reachable: &ReachableStates,
    args: &Args,
    summary: &mut NetSummary,
) -> bool {
    let explicit = ExplicitReachability::new(net).compute();
    let matches = reachable.count() == &num_bigint::BigInt::from(explicit.count());
    summary.explicit_markings = Some(explicit.count());
    summary.counts_match = Some(matches);

    if !args.json {
        println!("\n[Explicit cross-check]");
        println!("   Total markings: {}", explicit.count());
        println!("   Time: {:.4}s", explicit.elapsed().as_secs_f64());
        if explicit.count() <= MARKING_LIST_PRINT_LIMIT {
            for (i, marking) in explicit.markings().iter().enumerate() {
                println!("    {}. {:?}", i + 1, net.named_marking(marking));
            }
        } else {
            println!("   (Marking list too long, hidden.)");
        }
        if matches {
            println!("   RESULTS MATCH ({})", explicit.count());
        }
    }
    if !matches {
        eprintln!(
            "WARNING: symbolic count {} does not match explicit count {}",
            reachable.count(),
            explicit.count()
        );
    }
    matches
}

fn print_formula(label: &str, formula: &str) {
    if formula.len() <= FORMULA_PRINT_LIMIT {
        println!("   {label}: {formula}");
    } else {
        println!("   {label}: (too large, hidden)");
    }
}
