mod menu;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use async_monitor::{run_monitor, ButtonPress};
use common::config::load_config;
use common::sink::open_sink;
use common::MonitorConfig;
use monitor::{ButtonLatch, ConsoleIndicatorBank, MonitorLoop, RunSummary, SimulatedSampleSource};

const CONFIG_PATH: &str = "configs/monitor.toml";
const DEMO_DURATION: Duration = Duration::from_secs(10);
const MODE_SWITCH_EVERY: Duration = Duration::from_secs(3);
const LAMP_TEST_HOLD: Duration = Duration::from_millis(500);

fn main() {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| CONFIG_PATH.to_string());
    let config = if Path::new(&config_path).exists() {
        match load_config(&config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Invalid config {}: {}", config_path, e);
                std::process::exit(1);
            }
        }
    } else {
        MonitorConfig::default()
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .init();

    println!("===========================================");
    println!("Welcome to the G-Force Monitor");
    println!("===========================================");
    info!("Using configuration from {}", config_path);

    loop {
        menu::show_menu();

        match menu::get_user_choice() {
            Ok(1) => run_paced_demo(&config),
            Ok(2) => run_async_demo(&config),
            Ok(3) => list_ride_modes(&config),
            Ok(4) => run_lamp_test(),
            Ok(menu::EXIT_CHOICE) => {
                println!("Goodbye!");
                break;
            }
            _ => println!("Invalid choice. Please select 1-5."),
        }
    }
}

fn build_monitor(
    config: &MonitorConfig,
) -> Option<MonitorLoop<SimulatedSampleSource, ConsoleIndicatorBank, Box<dyn common::RecordSink + Send>>> {
    let sink = match open_sink(&config.recorder) {
        Ok(sink) => sink,
        Err(e) => {
            error!("Cannot open record sink: {}", e);
            return None;
        }
    };
    let source = SimulatedSampleSource::new(config.poll_period());
    match MonitorLoop::new(config, source, ConsoleIndicatorBank::new(), sink) {
        Ok(monitor) => Some(monitor),
        Err(e) => {
            error!("Invalid configuration: {}", e);
            None
        }
    }
}

fn run_paced_demo(config: &MonitorConfig) {
    println!("\n=== Running Monitor (paced loop) ===");
    println!(
        "Poll rate: {} Hz, lateral limit: {} g, duration: {}s",
        config.poll_rate_hz,
        config.max_lat_force,
        DEMO_DURATION.as_secs()
    );

    let Some(mut monitor) = build_monitor(config) else {
        menu::wait_for_enter();
        return;
    };

    let latch = Arc::new(ButtonLatch::new());
    let shutdown = Arc::new(AtomicBool::new(false));

    // stands in for the operator's buttons
    let operator = {
        let latch = Arc::clone(&latch);
        let shutdown = Arc::clone(&shutdown);
        thread::spawn(move || {
            latch.press_logger_toggle();
            let mut elapsed = Duration::ZERO;
            while elapsed < DEMO_DURATION {
                thread::sleep(MODE_SWITCH_EVERY);
                elapsed += MODE_SWITCH_EVERY;
                latch.press_mode_select();
            }
            shutdown.store(true, Ordering::Relaxed);
        })
    };

    let result = monitor.run(&latch, &shutdown);
    shutdown.store(true, Ordering::Relaxed);
    if operator.join().is_err() {
        warn!("Operator thread panicked");
    }

    display_results(result, config);
    menu::wait_for_enter();
}

fn run_async_demo(config: &MonitorConfig) {
    println!("\n=== Running Monitor (async host) ===");

    let Some(mut monitor) = build_monitor(config) else {
        menu::wait_for_enter();
        return;
    };

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!("Cannot start tokio runtime: {}", e);
            return;
        }
    };

    let result = rt.block_on(async {
        let (press_tx, press_rx) = tokio::sync::mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        tokio::spawn(async move {
            let _ = press_tx.send(ButtonPress::LoggerToggle).await;
            let mut elapsed = Duration::ZERO;
            while elapsed < DEMO_DURATION {
                tokio::time::sleep(MODE_SWITCH_EVERY).await;
                elapsed += MODE_SWITCH_EVERY;
                let _ = press_tx.send(ButtonPress::ModeSelect).await;
            }
            let _ = shutdown_tx.send(true);
        });

        run_monitor(&mut monitor, press_rx, shutdown_rx).await
    });

    display_results(result, config);
    menu::wait_for_enter();
}

fn list_ride_modes(config: &MonitorConfig) {
    println!("\n=== Ride Modes ===");
    let modes = match config.mode_set() {
        Ok(modes) => modes,
        Err(e) => {
            error!("{}", e);
            return;
        }
    };
    for profile in modes.list_modes() {
        let marker = if profile.name == modes.active().name { "*" } else { " " };
        println!(
            "{} {:<10} lateral {:.2} g | accel {:.2} g | braking {:.2} g | {:?}",
            marker,
            profile.name,
            profile.lateral_tolerance,
            profile.accel_tolerance_brake,
            profile.accel_tolerance_forward,
            profile.display_color
        );
    }
    menu::wait_for_enter();
}

fn run_lamp_test() {
    println!("\n=== Lamp Test ===");
    let mut bank = ConsoleIndicatorBank::new();
    let steps = bank.lamp_test(LAMP_TEST_HOLD);
    println!("Lamp test finished: {} steps", steps);
    menu::wait_for_enter();
}

fn display_results(result: Result<RunSummary, common::MonitorError>, config: &MonitorConfig) {
    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            error!("Monitoring ended with an error: {}", e);
            return;
        }
    };

    let compliance = if summary.cycles > 0 {
        (summary.cycles - summary.missed_deadlines) as f64 / summary.cycles as f64 * 100.0
    } else {
        0.0
    };

    println!("\n=== Session Results ===");
    println!("Total Cycles: {}", summary.cycles);
    println!("Slip Warnings: {}", summary.warnings);
    println!("Mode Changes: {}", summary.mode_changes);
    println!(
        "Records Flushed: {} (to {})",
        summary.records_flushed, config.recorder.output_path
    );
    if summary.sink_failures > 0 {
        println!("Failed Flushes: {}", summary.sink_failures);
    }
    println!(
        "Poll Deadline Compliance: {:.2}% ({} over, worst {:?})",
        compliance, summary.missed_deadlines, summary.max_processing
    );
}
