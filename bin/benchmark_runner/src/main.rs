use common::config::{load_config, MonitorConfig};
use common::metrics::{MetricRecord, RecordSink};
use common::{
    ColorTag, IndicationPlan, IndicatorBank, MotionSample, SampleSource, SinkError, WarningEvent,
};
use criterion::{black_box, Criterion};
use monitor::{ButtonInputs, MonitorLoop, SimulatedSampleSource};
use serde::Serialize;
use std::env;
use std::time::Duration;
use tracing::{error, info};

const DEFAULT_CYCLES: u64 = 100_000;
/// A mode press every this many cycles while measuring.
const MODE_PRESS_INTERVAL: u64 = 5_000;

/// Takes plans without driving anything, so only the loop itself is timed.
struct NullBank;

impl IndicatorBank for NullBank {
    fn apply_plan(&mut self, plan: &IndicationPlan) {
        black_box(plan);
    }

    fn flash_warning(&mut self, event: &WarningEvent) {
        black_box(event);
    }

    fn reset(&mut self) {}

    fn set_status_color(&mut self, color: ColorTag) {
        black_box(color);
    }
}

struct NullSink;

impl RecordSink for NullSink {
    fn append(&mut self, records: &[MetricRecord]) -> Result<(), SinkError> {
        black_box(records);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct CycleResult {
    cycle_id: u64,
    mode: String,
    processing_time_ns: u64,
    deadline_met: bool,
    warning: bool,
}

fn measure_cycles(config: &MonitorConfig, cycles: u64) -> Result<Vec<CycleResult>, common::MonitorError> {
    let source = SimulatedSampleSource::new(config.poll_period());
    let mut monitor = MonitorLoop::new(config, source, NullBank, NullSink)?;
    let deadline = monitor.poll_period();
    let mut results = Vec::with_capacity(cycles as usize);

    for i in 0..cycles {
        let inputs = ButtonInputs {
            mode_select: i > 0 && i % MODE_PRESS_INTERVAL == 0,
            // log the first half of the run
            logger_toggle: i == 0 || i == cycles / 2,
        };
        let report = monitor.tick(inputs)?;
        results.push(CycleResult {
            cycle_id: report.cycle_id,
            mode: monitor.active_profile().name.clone(),
            processing_time_ns: report.processing_time.as_nanos() as u64,
            deadline_met: report.processing_time <= deadline,
            warning: report.plan.warning.is_some(),
        });
    }
    monitor.stop()?;
    Ok(results)
}

fn analyze_results_detailed(results: &[CycleResult], deadline: Duration) {
    if results.is_empty() {
        println!("No results to analyze");
        return;
    }

    let total = results.len();
    let missed_deadlines = results.iter().filter(|r| !r.deadline_met).count();
    let deadline_rate = (1.0 - (missed_deadlines as f64 / total as f64)) * 100.0;
    let warnings = results.iter().filter(|r| r.warning).count();

    let processing_times: Vec<f64> = results
        .iter()
        .map(|r| r.processing_time_ns as f64 / 1000.0) // Convert to μs
        .collect();

    println!("\n=== Cycle Timing Analysis ===");
    println!("Total cycles: {}", total);
    println!("Poll deadline: {:?}", deadline);
    println!("Deadline compliance: {:.2}% ({} missed)", deadline_rate, missed_deadlines);
    println!("Cycles with slip warning: {}", warnings);

    let avg_proc = processing_times.iter().sum::<f64>() / processing_times.len() as f64;
    let min_proc = processing_times.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let max_proc = processing_times.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    println!("Processing time (μs): avg={:.2}, min={:.2}, max={:.2}", avg_proc, min_proc, max_proc);

    let mut modes: Vec<&str> = results.iter().map(|r| r.mode.as_str()).collect();
    modes.sort_unstable();
    modes.dedup();
    println!("\nPer ride mode:");
    for mode in modes {
        let in_mode: Vec<&CycleResult> = results.iter().filter(|r| r.mode == mode).collect();
        let avg = in_mode.iter().map(|r| r.processing_time_ns as f64 / 1000.0).sum::<f64>()
            / in_mode.len() as f64;
        let mode_warnings = in_mode.iter().filter(|r| r.warning).count();
        println!(
            "  {}: {} cycles, {} warnings, avg {:.2} μs",
            mode,
            in_mode.len(),
            mode_warnings,
            avg
        );
    }
}

fn save_to_csv(results: &[CycleResult], filename: &str) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_path(filename)?;
    for record in results {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    info!("Saved {} records to {}", results.len(), filename);
    Ok(())
}

fn benchmark_mapping(c: &mut Criterion, config: &MonitorConfig) -> Result<(), common::ConfigError> {
    let mapper = config.mapper();
    let modes = config.mode_set()?;
    let profile = modes.active().clone();
    let samples: Vec<MotionSample> = {
        let mut source = SimulatedSampleSource::new(config.poll_period());
        (0..1024).filter_map(|_| source.poll().ok()).collect()
    };

    c.bench_function("indication_mapping", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % samples.len();
            black_box(mapper.map(black_box(&samples[i]), &profile))
        });
    });
    Ok(())
}

fn benchmark_tick(c: &mut Criterion, config: &MonitorConfig) -> Result<(), common::MonitorError> {
    let source = SimulatedSampleSource::new(config.poll_period());
    let mut monitor = MonitorLoop::new(config, source, NullBank, NullSink)?;

    c.bench_function("monitor_tick", |b| {
        b.iter(|| {
            let _ = black_box(monitor.tick(ButtonInputs::default()));
        });
    });
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: benchmark_runner <config_file> [cycles] [--criterion]");
        eprintln!("Example: benchmark_runner configs/monitor.toml 100000");
        eprintln!("Example: benchmark_runner configs/monitor.toml --criterion");
        std::process::exit(1);
    }

    let config_path = &args[1];
    let use_criterion = args.contains(&"--criterion".to_string());
    let cycles = args
        .get(2)
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_CYCLES);

    let mut config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };
    // per-cycle logging would dominate the measurement
    config.logging.enable_cycle_logging = false;

    println!("========================================");
    println!("G-Force Monitor Benchmark");
    println!("========================================");
    println!("Config: {}", config_path);
    println!("Poll rate: {} Hz", config.poll_rate_hz);
    println!("Ride modes: {}", config.profiles.len());
    if use_criterion {
        println!("Using Criterion for statistical analysis");
    }
    println!("========================================\n");

    if use_criterion {
        let mut criterion = Criterion::default()
            .sample_size(50)
            .measurement_time(Duration::from_secs(10));

        if let Err(e) = benchmark_mapping(&mut criterion, &config) {
            error!("Mapping benchmark failed: {}", e);
        }
        if let Err(e) = benchmark_tick(&mut criterion, &config) {
            error!("Tick benchmark failed: {}", e);
        }

        println!("\n========================================");
        println!("Criterion statistical analysis complete!");
        println!("Check the target/criterion directory for detailed HTML reports.");
        println!("========================================");
    } else {
        println!("Running {} monitor cycles...", cycles);
        let start = std::time::Instant::now();
        let results = match measure_cycles(&config, cycles) {
            Ok(results) => results,
            Err(e) => {
                error!("Measurement aborted: {}", e);
                std::process::exit(1);
            }
        };
        println!("Completed in {:.2} seconds", start.elapsed().as_secs_f64());

        analyze_results_detailed(&results, config.poll_period());

        if let Err(e) = save_to_csv(&results, "cycle_results.csv") {
            error!("Failed to save CSV: {}", e);
        } else {
            println!("Results saved to cycle_results.csv");
        }

        println!("\n========================================");
        println!("Benchmark complete!");
        println!("========================================");
    }
}
