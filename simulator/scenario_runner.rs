// Scenario Runner - Load and execute scenario YAML files
//
// Usage:
//   cargo run --bin scenario_runner scenarios/default.yaml
//   cargo run --bin scenario_runner scenarios/  (runs all .yaml files in directory)
//   cargo run --bin scenario_runner scenarios/default.yaml --seed 7 --output results/
//   cargo run --bin scenario_runner scenarios/lossy_links.yaml --verbose

mod event_sink;

use dr_rust::{SimConfig, Simulation};
use event_sink::LoggingEventSink;
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Scenario file format
#[derive(Debug, serde::Deserialize)]
struct ScenarioFile {
    /// Scenario metadata
    #[serde(default)]
    meta: ScenarioMeta,

    /// Full run configuration; omitted keys take their defaults
    #[serde(default)]
    config: SimConfig,
}

#[derive(Debug, Default, serde::Deserialize)]
struct ScenarioMeta {
    name: Option<String>,
    description: Option<String>,
    hypothesis: Option<String>,
}

#[derive(Debug, Default)]
struct Options {
    seed: Option<u64>,
    output: Option<PathBuf>,
    verbose: bool,
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!(
            "Usage: {} <scenario.yaml | directory/> [--seed N] [--output DIR] [--verbose]",
            args[0]
        );
        eprintln!("\nExamples:");
        eprintln!("  {} scenarios/default.yaml", args[0]);
        eprintln!("  {} scenarios/", args[0]);
        eprintln!("  {} scenarios/default.yaml --seed 0x2a --output results/", args[0]);
        std::process::exit(1);
    }

    let path = Path::new(&args[1]);
    let options = parse_options(&args[2..]);

    let level = if options.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(e) = SimpleLogger::new().with_level(level).init() {
        eprintln!("logger init failed: {}", e);
    }

    if let Some(ref dir) = options.output {
        if let Err(e) = fs::create_dir_all(dir) {
            eprintln!("Failed to create {}: {}", dir.display(), e);
            std::process::exit(1);
        }
    }

    if path.is_file() {
        run_scenario_file(path, &options);
    } else if path.is_dir() {
        run_scenario_directory(path, &options);
    } else {
        eprintln!("Error: Path does not exist: {}", path.display());
        std::process::exit(1);
    }
}

fn parse_options(args: &[String]) -> Options {
    let mut options = Options::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--seed" => {
                let value = iter.next().unwrap_or_else(|| {
                    eprintln!("--seed needs a value");
                    std::process::exit(1);
                });
                options.seed = Some(parse_seed(value));
            }
            "--output" => {
                let value = iter.next().unwrap_or_else(|| {
                    eprintln!("--output needs a directory");
                    std::process::exit(1);
                });
                options.output = Some(PathBuf::from(value));
            }
            "--verbose" | "-v" => options.verbose = true,
            other => {
                eprintln!("Unknown argument: {}", other);
                std::process::exit(1);
            }
        }
    }
    options
}

fn run_scenario_directory(dir: &Path, options: &Options) {
    let mut scenarios = Vec::new();

    // Find all .yaml files
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            let ext = path.extension().and_then(|s| s.to_str());
            if ext == Some("yaml") || ext == Some("yml") {
                scenarios.push(path);
            }
        }
    }

    scenarios.sort();

    if scenarios.is_empty() {
        eprintln!("No .yaml files found in {}", dir.display());
        std::process::exit(1);
    }

    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  SCENARIO RUNNER - Multiple Scenarios                 ║");
    println!("╚════════════════════════════════════════════════════════╝\n");
    println!("Found {} scenario(s) to run\n", scenarios.len());

    for (i, scenario_path) in scenarios.iter().enumerate() {
        println!("\n{}/{} Running: {}\n", i + 1, scenarios.len(), scenario_path.display());
        run_scenario_file(scenario_path, options);
    }

    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  All scenarios complete!                               ║");
    println!("╚════════════════════════════════════════════════════════╝\n");
}

fn run_scenario_file(path: &Path, options: &Options) {
    println!("Loading scenario from: {}", path.display());

    let yaml_content = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {}", path.display(), e);
        std::process::exit(1);
    });

    let scenario: ScenarioFile = serde_yaml::from_str(&yaml_content).unwrap_or_else(|e| {
        eprintln!("Failed to parse {}: {}", path.display(), e);
        std::process::exit(1);
    });

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("scenario")
        .to_string();

    // Print scenario header
    println!("\n╔════════════════════════════════════════════════════════╗");
    let title = scenario.meta.name.clone().unwrap_or_else(|| format!("Scenario: {}", stem));
    println!("║  {}{}║", title, " ".repeat(54_usize.saturating_sub(title.len())));
    println!("╚════════════════════════════════════════════════════════╝\n");

    if let Some(ref desc) = scenario.meta.description {
        println!("{}\n", desc);
    }

    if let Some(ref hypothesis) = scenario.meta.hypothesis {
        println!("Hypothesis:");
        println!("  {}\n", hypothesis);
    }

    let mut config = scenario.config;
    if let Some(seed) = options.seed {
        config.random_seed = seed;
    }
    if config.run_id.is_none() {
        config.run_id = Some(stem.clone());
    }

    println!("Configuration:");
    println!("  Seed: {}", config.random_seed);
    println!(
        "  Nodes: {} outer (r={}m) + {} inner (r={}m)",
        config.topology.outer_ring_nodes,
        config.topology.outer_ring_radius,
        config.topology.inner_ring_nodes,
        config.topology.inner_ring_radius
    );
    println!(
        "  Ranges: sensor {}m, P2P {}m",
        config.topology.sensor_range, config.topology.p2p_range
    );
    println!(
        "  Thresholds: confirm {:.2}, verify {:.2}, timeout {}s",
        config.decision_logic.confirm_threshold,
        config.decision_logic.verify_threshold,
        config.decision_logic.verification_timeout
    );
    println!(
        "  Events: {} (intruder p={:.2}, mean interval {}s)",
        config.simulation.event_count,
        config.simulation.intruder_probability,
        config.simulation.event_interval_mean
    );
    println!("\nStarting simulation...\n");

    let sink = Box::new(LoggingEventSink::new(options.verbose));
    let simulation = Simulation::new_with_sink(config, sink).unwrap_or_else(|e| {
        error!("{}: invalid configuration: {}", path.display(), e);
        std::process::exit(1);
    });
    let result = simulation.run();

    result.print_summary();

    let yaml = result.to_yaml().unwrap_or_else(|e| {
        error!("cannot serialize result: {}", e);
        std::process::exit(1);
    });
    let fingerprint = blake3::hash(yaml.as_bytes());
    println!("\nFingerprint: {}", fingerprint);

    if let Some(ref dir) = options.output {
        let out_path = dir.join(format!("{}.result.yaml", stem));
        match fs::write(&out_path, &yaml) {
            Ok(()) => info!("result written to {}", out_path.display()),
            Err(e) => {
                error!("Failed to write {}: {}", out_path.display(), e);
                std::process::exit(1);
            }
        }
    }

    println!("\n✓ Scenario complete!\n");
}

/// Decimal, or hexadecimal with a `0x` prefix
fn parse_seed(text: &str) -> u64 {
    let parsed = match text.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse::<u64>(),
    };
    parsed.unwrap_or_else(|e| {
        eprintln!("Invalid seed {}: {}", text, e);
        std::process::exit(1);
    })
}
