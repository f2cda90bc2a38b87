use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;

use dr_rust::{run_simulation, SimConfig};

fn main() {
    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Info).init() {
        eprintln!("logger init failed: {}", e);
    }

    info!("starting");

    let config = SimConfig::default();
    match run_simulation(&config) {
        Ok(result) => {
            result.print_summary();
            match result.fingerprint() {
                Ok(hash) => println!("\nFingerprint: {}", hash),
                Err(e) => error!("cannot fingerprint result: {}", e),
            }
        }
        Err(e) => {
            error!("invalid configuration: {}", e);
            std::process::exit(1);
        }
    }
}
