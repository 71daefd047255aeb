//! Rivet CLI: run instruction files or convert expressions to postfix.

use std::env;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use colored::Colorize;

use rivetlang::error::RivetError;
use rivetlang::postfix_line;
use rivetlang::vm::{Vm, VmConfig};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// CLI command to execute.
enum Command {
    /// Run an instruction file on the VM
    Run { file: String, config: VmConfig },
    /// Convert one expression line to postfix and print it
    Expr { line: String },
}

fn print_usage() {
    eprintln!("Rivet {} - Toolchain Core", VERSION);
    eprintln!();
    eprintln!("Usage: rivet run <file.ir> [options]");
    eprintln!("       rivet expr \"<expression>\"");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  run <file.ir>   Execute an instruction file on the VM");
    eprintln!("  expr <line>     Print the postfix form of an expression");
    eprintln!();
    eprintln!("Options for run:");
    eprintln!("  --ram N         RAM size in cells (default: 256)");
    eprintln!("  --registers N   Register count (default: 6)");
    eprintln!("  --ips N         Instructions per second (default: 1000)");
    eprintln!("  --help, -h      Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  rivet run program.ir");
    eprintln!("  rivet run program.ir --ram 512 --ips 100000");
    eprintln!("  rivet expr \"( 1 + 2 ) * 3\"");
}

fn parse_args() -> Command {
    let args: Vec<String> = env::args().skip(1).collect();

    let mut iter = args.iter();
    match iter.next().map(String::as_str) {
        Some("run") => {
            let Some(file) = iter.next() else {
                eprintln!("run command requires a file");
                print_usage();
                process::exit(64);
            };
            let mut config = VmConfig::default();
            while let Some(flag) = iter.next() {
                let value = iter.next().unwrap_or_else(|| {
                    eprintln!("{} requires a value", flag);
                    print_usage();
                    process::exit(64);
                });
                match flag.as_str() {
                    "--ram" => config.ram_size = parse_number(flag, value),
                    "--registers" => config.register_count = parse_number(flag, value),
                    "--ips" => config.instructions_per_second = parse_number(flag, value),
                    _ => {
                        eprintln!("Unknown option for run command: {}", flag);
                        print_usage();
                        process::exit(64);
                    }
                }
            }
            Command::Run {
                file: file.clone(),
                config,
            }
        }
        Some("expr") => {
            let Some(line) = iter.next() else {
                eprintln!("expr command requires an expression");
                print_usage();
                process::exit(64);
            };
            Command::Expr { line: line.clone() }
        }
        Some("--help") | Some("-h") => {
            print_usage();
            process::exit(0);
        }
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            print_usage();
            process::exit(64);
        }
        None => {
            print_usage();
            process::exit(64);
        }
    }
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> T {
    value.parse().unwrap_or_else(|_| {
        eprintln!("{} requires a non-negative integer, got '{}'", flag, value);
        print_usage();
        process::exit(64);
    })
}

fn main() {
    match parse_args() {
        Command::Run { file, config } => run_ir(&file, config),
        Command::Expr { line } => run_expr(&line),
    }
}

fn run_ir(file: &str, config: VmConfig) {
    let result = (|| -> Result<(), RivetError> {
        let source = std::fs::read_to_string(file)?;
        let mut machine = Vm::new(config)?;
        machine.load(&source)?;

        // Ctrl-C flips the flag; the VM notices between instructions.
        let cancel = Arc::new(AtomicBool::new(false));
        machine.set_cancel_flag(Arc::clone(&cancel));
        let handler = Arc::clone(&cancel);
        ctrlc::set_handler(move || handler.store(true, Ordering::Relaxed))
            .map_err(|e| std::io::Error::other(e.to_string()))?;

        println!("{}", machine.describe());
        machine.run()?;
        Ok(())
    })();

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red(), e);
        process::exit(70);
    }
}

fn run_expr(line: &str) {
    match postfix_line(line) {
        Ok(postfix) => {
            let rendered: Vec<String> = postfix.iter().map(|t| t.to_string()).collect();
            println!("{}", rendered.join(" ").green());
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            process::exit(70);
        }
    }
}
