use bumpylife::cli::{parse_args, Command};
use bumpylife::segment::describe_slot;
use bumpylife::simulate::simulate_fleet;
use bumpylife::{
    default_segment_path, log, parse_config, set_log_file, ExitRegister, RecycleConfig,
    RecycleError, SharedSegment,
};
use std::process;

fn run() -> Result<(), RecycleError> {
    let args = parse_args();
    if let Some(log_file) = &args.log_file {
        set_log_file(log_file);
    }

    let config = match &args.config_file {
        Some(path) => parse_config(path)?,
        None => RecycleConfig::default(),
    };
    let segment_path = args
        .segment_path
        .clone()
        .or_else(|| config.segment_path.clone())
        .unwrap_or_else(default_segment_path);

    match args.command {
        Command::Status => {
            let segment = SharedSegment::attach_existing(&segment_path)?;
            println!(
                "segment {} host {} pending exit: {}",
                segment.path(),
                segment.host_id(),
                describe_slot(segment.peek()?)
            );
        }
        Command::Clear => {
            let segment = SharedSegment::attach_existing(&segment_path)?;
            let previous = segment.transact(|slot| slot.take())?;
            let _ = log(&format!(
                "Cleared pending exit slot in {} (was {})",
                segment_path,
                describe_slot(previous)
            ));
        }
        Command::Simulate { workers, requests } => {
            // Without a config file, preview a typical range
            let config = if args.config_file.is_some() {
                config
            } else {
                RecycleConfig {
                    enable: true,
                    min: 100,
                    max: 200,
                    ..config
                }
            };
            let report = simulate_fleet(&config, workers, requests, u64::from(process::id()));
            for (worker, threshold, served) in &report.workers {
                let threshold = threshold.map_or_else(|| "-".to_string(), |t| t.to_string());
                println!("worker {} threshold {} served {}", worker, threshold, served);
            }
            for (i, worker) in report.signaled.iter().enumerate() {
                println!("recycle #{}: worker {}", i + 1, worker);
            }
            println!("pending exit: {}", describe_slot(report.pending));
        }
    }

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
