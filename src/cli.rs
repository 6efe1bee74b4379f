use crate::simulate::MAX_SIMULATED_WORKERS;
use std::env;
use std::process;

/// Subcommand selected on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the worker currently flagged for exit
    Status,
    /// Empty the pending-exit slot
    Clear,
    /// Run an in-process fleet and print the recycling order
    Simulate { workers: u32, requests: u64 },
}

/// Options parsed from the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub log_file: Option<String>,
    pub config_file: Option<String>,
    pub segment_path: Option<String>,
    pub command: Command,
}

/// Result of argument parsing before any side effects
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Run(CliArgs),
    Help,
    Version,
}

/// Prints usage instructions for the program.
pub fn print_usage() {
    println!(
        "Usage: {} [-h] [-v] [-l logfile] [-c config] [-s segment] <status|clear|simulate> [-w workers] [-n requests]",
        crate::PROGRAM_NAME
    );
}

fn parse_number<T: std::str::FromStr>(value: Option<String>, what: &str) -> Result<T, String> {
    let value = value.ok_or_else(|| format!("Missing {} argument", what))?;
    value
        .parse()
        .map_err(|_| format!("{} must be a positive number", what))
}

/// Parses arguments (without the program name)
///
/// # Errors
/// A message suitable for stderr when an argument is missing or malformed
pub fn parse_args_from<I>(args: I) -> Result<ParseOutcome, String>
where
    I: IntoIterator<Item = String>,
{
    let mut log_file = None;
    let mut config_file = None;
    let mut segment_path = None;
    let mut command = None;
    let mut workers: u32 = 4;
    let mut requests: u64 = 1000;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" => return Ok(ParseOutcome::Help),
            "-v" => return Ok(ParseOutcome::Version),
            "-l" => log_file = Some(args.next().ok_or("Missing log file argument")?),
            "-c" => config_file = Some(args.next().ok_or("Missing config file argument")?),
            "-s" => segment_path = Some(args.next().ok_or("Missing segment path argument")?),
            "-w" => {
                workers = parse_number(args.next(), "Worker count")?;
                if workers == 0 {
                    return Err("Worker count must be a positive number".to_string());
                }
                if workers > MAX_SIMULATED_WORKERS {
                    return Err(format!(
                        "Worker count must not exceed {}",
                        MAX_SIMULATED_WORKERS
                    ));
                }
            }
            "-n" => requests = parse_number(args.next(), "Request count")?,
            "status" | "clear" | "simulate" if command.is_none() => command = Some(arg),
            _ => return Err(format!("Unexpected argument: {}", arg)),
        }
    }

    let command = match command.as_deref() {
        Some("status") => Command::Status,
        Some("clear") => Command::Clear,
        Some("simulate") => Command::Simulate { workers, requests },
        _ => return Err("Missing command".to_string()),
    };

    Ok(ParseOutcome::Run(CliArgs {
        log_file,
        config_file,
        segment_path,
        command,
    }))
}

/// Parses command line arguments, exiting on `-h`, `-v` or errors
pub fn parse_args() -> CliArgs {
    match parse_args_from(env::args().skip(1)) {
        Ok(ParseOutcome::Run(args)) => args,
        Ok(ParseOutcome::Help) => {
            print_usage();
            process::exit(0);
        }
        Ok(ParseOutcome::Version) => {
            println!("{} version {}", crate::PROGRAM_NAME, crate::PROGRAM_VERSION);
            process::exit(0);
        }
        Err(message) => {
            eprintln!("Error: {}", message);
            print_usage();
            process::exit(1);
        }
    }
}
