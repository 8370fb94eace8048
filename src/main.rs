use std::error::Error;
use std::fs;

use rocket_flight::sim::FlightDataType;
use rocket_flight::{presets, simulate, SimOptions};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Usage: `rocket-flight [two-stage] [options.json]`
fn main() -> Result<(), Box<dyn Error>> {
    // RUST_LOG overrides the default "warn" level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut two_stage = false;
    let mut options = SimOptions::default();
    for arg in std::env::args().skip(1) {
        if arg == "two-stage" {
            two_stage = true;
        } else {
            options = serde_json::from_str(&fs::read_to_string(&arg)?)?;
        }
    }

    let rocket = if two_stage { presets::two_stage() } else { presets::single_stage() };
    let name = rocket.name.clone();
    let data = simulate(rocket, &options)?;

    // -----------------------------------------------------------------------
    // Print results
    // -----------------------------------------------------------------------
    println!();
    println!("====================================================================");
    println!("  ROCKET FLIGHT SIMULATION: {name}");
    println!("====================================================================");

    for branch in &data.branches {
        println!();
        println!("  Flight Events ({})", branch.name());
        println!("  ──────────────────────────────────────────────────────────────────");
        for event in branch.events() {
            let alt = branch.value_at(FlightDataType::ALTITUDE, event.time);
            let vel = branch.value_at(FlightDataType::VELOCITY_TOTAL, event.time);
            println!(
                "  {:<28} t={:>7.2}s   alt={:>7.1}m   vel={:>6.1}m/s",
                event.kind.name(),
                event.time,
                alt,
                vel
            );
        }
    }

    println!();
    println!("  Performance Summary");
    println!("  ──────────────────────────────────────────────────────────────────");
    println!("{}", data.summary);

    if !data.warnings.is_empty() {
        println!();
        println!("  Warnings");
        println!("  ──────────────────────────────────────────────────────────────────");
        for w in data.warnings.iter() {
            println!("  - {w}");
        }
    }
    println!("====================================================================");
    println!();

    println!("{}", serde_json::to_string_pretty(&data.summary)?);
    Ok(())
}
