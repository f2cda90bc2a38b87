// Profiling Runner - Scenario runner with timing instrumentation
//
// Usage:
//   cargo run --bin profiling_runner --release scenarios/default.yaml

use dr_rust::{SimConfig, Simulation};
use std::env;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <scenario.yaml>", args[0]);
        eprintln!("\nExample:");
        eprintln!("  {} scenarios/default.yaml", args[0]);
        std::process::exit(1);
    }

    let path = Path::new(&args[1]);

    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  PROFILING RUNNER                                      ║");
    println!("╚════════════════════════════════════════════════════════╝\n");

    let total_start = Instant::now();

    // Time: Loading YAML
    let load_start = Instant::now();
    println!("Loading scenario from: {}", path.display());

    let yaml_content = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {}", path.display(), e);
        std::process::exit(1);
    });

    let load_time = load_start.elapsed();
    println!("  ✓ File read: {:?}", load_time);

    // Time: Parsing YAML
    let parse_start = Instant::now();

    #[derive(Debug, serde::Deserialize)]
    struct ScenarioFile {
        #[serde(default)]
        config: SimConfig,
    }

    let scenario: ScenarioFile = serde_yaml::from_str(&yaml_content).unwrap_or_else(|e| {
        eprintln!("Failed to parse {}: {}", path.display(), e);
        std::process::exit(1);
    });

    let parse_time = parse_start.elapsed();
    println!("  ✓ YAML parsed: {:?}", parse_time);

    // Time: Validation and topology construction
    let build_start = Instant::now();
    let simulation = Simulation::new(scenario.config).unwrap_or_else(|e| {
        eprintln!("Invalid configuration in {}: {}", path.display(), e);
        std::process::exit(1);
    });
    let build_time = build_start.elapsed();
    println!("  ✓ Simulation built: {:?}", build_time);

    let topology = simulation.topology().summary();
    println!("\nConfiguration:");
    println!("  Nodes:           {:>10}", topology.total_nodes);
    println!("  Events:          {:>10}", simulation.config().simulation.event_count);
    println!("  Avg degree:      {:>10.1}", topology.avg_degree);

    // Time: Running simulation
    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  SIMULATION                                            ║");
    println!("╚════════════════════════════════════════════════════════╝\n");

    let sim_start = Instant::now();
    let result = simulation.run();
    let sim_time = sim_start.elapsed();

    result.print_summary();

    let total_time = total_start.elapsed();

    println!("\n╔════════════════════════════════════════════════════════╗");
    println!("║  PROFILING RESULTS                                     ║");
    println!("╚════════════════════════════════════════════════════════╝\n");

    println!("Time Breakdown:");
    print_timing("  File I/O", load_time, total_time);
    print_timing("  YAML Parsing", parse_time, total_time);
    print_timing("  Build", build_time, total_time);
    print_timing("  Simulation", sim_time, total_time);
    println!("  ─────────────────────────────────────────");
    println!("  Total:           {:>10.3?}  (100.0%)", total_time);

    let events = result.total_events;
    let messages = result.p2p_messages_sent;

    println!("\nSimulation Metrics:");
    println!("  Events:          {:>10}", events);
    println!("  P2P Messages:    {:>10}", messages);
    println!("  Virtual time:    {:>10.1}s", result.sim_duration_seconds);
    println!();

    let wall = sim_time.as_secs_f64();
    if wall > 0.0 {
        println!("Performance:");
        println!("  Events/sec:      {:>10.1}", events as f64 / wall);
        println!("  Messages/sec:    {:>10.0}", messages as f64 / wall);
        println!("  Speedup:         {:>10.0}x", result.sim_duration_seconds / wall);

        if events > 0 {
            let ns_per_event = sim_time.as_nanos() / events as u128;
            println!("  Time/event:      {:>10}ns", ns_per_event);
        }
    }

    println!("\n✓ Profiling complete!\n");
}

fn print_timing(label: &str, time: Duration, total: Duration) {
    let percent = (time.as_secs_f64() / total.as_secs_f64()) * 100.0;
    println!("  {:<15}  {:>10.3?}  ({:>5.1}%)", label, time, percent);
}
