//! Reestablishment Driver Demo
//!
//! Runs the configured scenario matrix against the simulated RAN:
//!
//! ```text
//! reest-demo [config.json] [clean|flaky|hostile] [seed]
//! ```
//!
//! Without a config file the standard suite runs with every delay
//! compressed a hundredfold.

use reest_runtime::{init_logging, DriverConfig, SuiteRunner};
use reest_test::{run_reestablishment_suite, FaultProfile};
use tracing::info;

fn profile_from_args(name: Option<&str>, seed: Option<&str>) -> Result<FaultProfile, String> {
    let profile = match name.unwrap_or("clean") {
        "clean" => FaultProfile::clean(),
        "flaky" => FaultProfile::flaky_bringup(),
        "hostile" => FaultProfile::hostile(),
        other => return Err(format!("unknown fault profile '{}'", other)),
    };
    match seed {
        Some(s) => s
            .parse()
            .map(|seed| profile.with_seed(seed))
            .map_err(|e| format!("invalid seed '{}': {}", s, e)),
        None => Ok(profile),
    }
}

fn print_report(runner: &SuiteRunner) {
    println!();
    println!("{:<44} {:>8} {:>11} {:>7}", "scenario", "result", "injections", "tries");
    println!("{}", "-".repeat(73));
    for report in runner.results() {
        let result = if report.passed() { "PASS" } else { "FAIL" };
        println!(
            "{:<44} {:>8} {:>11} {:>7}",
            report.id,
            result,
            report.run.stats.total_injections(),
            report.attempts
        );
    }

    let summary = runner.summary();
    println!();
    println!(
        "{}/{} passed ({:.0}%), {} rerun(s)",
        summary.passed,
        summary.total,
        summary.pass_rate() * 100.0,
        summary.reruns
    );
    for (id, err) in &summary.failures {
        println!("  {}: {}", id, err);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let config = match args.first() {
        Some(path) => DriverConfig::load(path)?,
        None => DriverConfig {
            time_scale: 0.01,
            ..DriverConfig::default()
        },
    };
    init_logging(&config.log);

    let profile = profile_from_args(args.get(1).map(String::as_str), args.get(2).map(String::as_str))?;

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║        Reestablishment Driver - Simulated RAN              ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();
    println!("Scenarios:  {}", config.matrix().len());
    println!("Clients:    {}", config.client_count);
    println!(
        "Schedule:   {:?} per client, reestablishment every {:?}",
        config.test_duration_per_client, config.reestablishment_interval
    );
    println!("Profile:    {:?}", profile);

    info!(scenarios = config.matrix().len(), clients = config.client_count, "starting suite");
    let runner = run_reestablishment_suite(&config, profile).await?;
    print_report(&runner);

    if !runner.summary().all_passed() {
        std::process::exit(1);
    }
    Ok(())
}
