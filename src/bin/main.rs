use std::io::{IsTerminal, Read};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use gosh::Gosh;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Runs gosh scripts, or starts an interactive prompt when no script is given.
#[derive(Parser)]
#[command(name = "gosh", version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Script to run. Reads stdin when it is not a terminal.
    script: Option<PathBuf>,

    /// Print the parse tree as an s-expression before running
    #[arg(long)]
    sexpr: bool,

    /// Print the scope analysis of every function before running
    #[arg(long)]
    analyze: bool,

    /// Enable verbose logging (use multiple times for increased verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    let mut gosh = Gosh::new().with_sexpr(cli.sexpr).with_analysis(cli.analyze);

    let (source_name, result) = match cli.script {
        Some(path) => {
            let name = path.display().to_string();
            let result = gosh.run_file(&name);
            (name, result)
        }
        None if !std::io::stdin().is_terminal() => {
            let mut source = String::new();
            std::io::stdin().read_to_string(&mut source)?;
            ("stdin".to_owned(), gosh.run_script("stdin", &source))
        }
        None => {
            println!("gosh {}", env!("CARGO_PKG_VERSION"));
            return gosh.run_prompt();
        }
    };

    if let Err(err) = result {
        match err.downcast_ref::<gosh::Error>() {
            Some(e) => {
                for line in e.to_string().lines() {
                    eprintln!("{source_name}:{line}");
                }
                std::process::exit(e.exit_code());
            }
            None => return Err(err),
        }
    }

    Ok(())
}

/// `GOSH_LOG` wins over the verbosity flags when it is set.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = match EnvFilter::try_from_env("GOSH_LOG") {
        Ok(filter) => filter,
        Err(_) if quiet => EnvFilter::new("error"),
        Err(_) => match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        },
    };

    let formatter = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true);

    tracing_subscriber::registry().with(formatter).with(filter).init();
}
