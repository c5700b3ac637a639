use clap::Parser;
use qrlog::cli::{Cli, Command};
use qrlog::config::Config;
use qrlog::history::{Appended, SaveOutcome, ScanHistory};
use qrlog::report;
use std::io::BufRead;

fn print_save_notice(save: SaveOutcome, verbose: bool) {
    match save {
        SaveOutcome::Saved => {}
        SaveOutcome::SwitchedToKeyValue => {
            eprintln!("notice: file storage failed, switched to key-value storage for this session");
        }
        SaveOutcome::Trimmed => {
            eprintln!("notice: storage quota exceeded, old history trimmed");
        }
        SaveOutcome::Unavailable => {
            if verbose {
                eprintln!("warning: history not persisted (no storage backend)");
            }
        }
    }
}

/// Payloads for one `add` invocation: arguments if given, otherwise one
/// payload per stdin line (the decoder side of a pipe).
fn collect_payloads(args_payloads: Vec<String>) -> Vec<String> {
    if !args_payloads.is_empty() {
        return args_payloads;
    }

    std::io::stdin()
        .lock()
        .lines()
        .map_while(Result::ok)
        .filter(|line| !line.is_empty())
        .collect()
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match Config::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error resolving storage paths: {e}");
            std::process::exit(1);
        }
    };

    let mut history = ScanHistory::open(&config);

    if !history.status().available {
        eprintln!("warning: no usable storage backend, history will not be persisted");
        if let Some(err) = &history.status().last_error {
            eprintln!("warning: {err}");
        }
    }
    if history.was_restored() && config.verbose {
        eprintln!("history recovered from backup snapshot");
    }

    match cli.command {
        Command::Add(args) => {
            let payloads = collect_payloads(args.payload);
            if payloads.is_empty() {
                eprintln!("Nothing to record. Pass a payload or pipe one per line.");
                std::process::exit(1);
            }

            for payload in &payloads {
                match history.append(payload) {
                    Ok(Appended::Recorded { record, save }) => {
                        println!("recorded [{}] {}", record.kind.as_str(), record.id);
                        print_save_notice(save, config.verbose);
                    }
                    Ok(Appended::AdjacentDuplicate) => {
                        println!("skipped duplicate of newest entry");
                    }
                    Err(e) => {
                        eprintln!("warning: failed to save history: {e}");
                    }
                }
            }
        }
        Command::History(args) => {
            if args.latest {
                match history.records().first() {
                    Some(record) => println!("{}", record.data),
                    None => {
                        eprintln!("No scans recorded.");
                        std::process::exit(1);
                    }
                }
            } else {
                report::print_history(history.records(), &args);
            }
        }
        Command::Export(args) => {
            let csv = report::csv::render(history.records());
            match args.output {
                Some(path) => {
                    if let Err(e) = std::fs::write(&path, &csv) {
                        eprintln!("Error writing {}: {e}", path.display());
                        std::process::exit(1);
                    }
                    println!(
                        "exported {} scans to {}",
                        history.records().len(),
                        path.display()
                    );
                }
                None => print!("{csv}"),
            }
        }
        Command::Remove(args) => match history.remove(&args.id) {
            Ok((true, save)) => {
                println!("removed {}", args.id);
                print_save_notice(save, config.verbose);
            }
            Ok((false, _)) => {
                eprintln!("No scan with id '{}'", args.id);
                std::process::exit(1);
            }
            Err(e) => {
                eprintln!("warning: failed to save history: {e}");
            }
        },
        Command::Clear(args) => {
            if !args.yes {
                eprintln!("This deletes all recorded scans. Re-run with --yes to confirm.");
                std::process::exit(1);
            }
            match history.clear() {
                Ok(save) => {
                    println!("history cleared");
                    print_save_notice(save, config.verbose);
                }
                Err(e) => {
                    eprintln!("warning: failed to clear persisted history: {e}");
                }
            }
        }
        Command::Status => {
            let status = history.status();
            println!("backend:    {}", status.backend.as_str());
            println!("available:  {}", if status.available { "yes" } else { "no" });
            println!("history:    {}", config.history_dir().display());
            println!("key-value:  {}", config.kv_db_path().display());
            println!("entries:    {}", history.records().len());
            if let Some(err) = &status.last_error {
                println!("last error: {err}");
            }
        }
    }
}
