// main.rs - tapejit command line

mod repl;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tapejit::codegen::{self, HostBindings};
use tapejit::{Config, CursorMode, Engine, Program};

#[derive(Parser)]
#[command(name = "tapejit")]
#[command(version, about = "Run tape-language programs interpreted or JIT-compiled", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Number of tape cells (overrides the config file)
    #[arg(long, global = true)]
    tape_size: Option<usize>,

    /// Report cursor moves off the tape instead of wrapping
    #[arg(long, global = true)]
    strict: bool,

    /// Log more to stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program
    Run {
        /// Program file
        file: Option<PathBuf>,

        /// Program text given inline
        #[arg(short, long, conflicts_with = "file")]
        eval: Option<String>,

        /// Compile to machine code and run that instead of interpreting
        #[arg(long)]
        jit: bool,
    },

    /// Print or save the generated machine code without running it
    Emit {
        /// Program file
        file: PathBuf,

        /// Write the raw routine here instead of printing a hex listing
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Interactive session over one persistent tape
    Repl {
        /// Start with the JIT engine
        #[arg(long)]
        jit: bool,
    },
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(size) = cli.tape_size {
        config.tape_size = size;
    }
    if cli.strict {
        config.cursor = CursorMode::Strict;
    }
    config.validate()?;
    Ok(config)
}

fn read_program(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn engine_for(jit: bool) -> Engine {
    if jit { Engine::Jit } else { Engine::Interpreter }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(&cli)?;

    match &cli.command {
        Commands::Run { file, eval, jit } => {
            let text = match (file, eval) {
                (Some(path), None) => read_program(path)?,
                (None, Some(text)) => text.clone().into_bytes(),
                _ => bail!("give a program file or --eval TEXT"),
            };
            tapejit::run(Program::from_bytes(&text), engine_for(*jit), &config)?;
            io::stdout().flush()?;
        }

        Commands::Emit { file, output } => {
            let text = read_program(file)?;
            // Addresses are zero: the routine is only meaningful once
            // regenerated against a live tape.
            let bindings = HostBindings::unbound(&config);
            let code = codegen::generate(Program::from_bytes(&text), bindings)?;
            info!(
                code_len = code.len(),
                loops = code.loops,
                elided = code.elided,
                guards = code.guards,
                "generated"
            );

            match output {
                Some(path) => fs::write(path, &code.bytes)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => print!("{}", code.listing()),
            }
        }

        Commands::Repl { jit } => {
            let mut repl = repl::Repl::new(config, engine_for(*jit))?;
            repl.run()?;
        }
    }

    Ok(())
}
