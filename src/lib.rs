// lib.rs - Tape-language interpreter and x86-64 JIT

pub mod codegen;
pub mod config;
pub mod error;
pub mod exec;
pub mod interpreter;
pub mod io;
pub mod jit;
pub mod program;
pub mod tape;

use std::io::Write as _;

use tracing::{info, instrument};

pub use config::{Config, CursorMode};
pub use error::{Error, Result};
pub use interpreter::Interpreter;
#[cfg(unix)]
pub use io::FdChannel;
pub use io::{ByteChannel, IoChannel, MemoryChannel};
pub use jit::{ExitSlots, Jit};
pub use program::{Instruction, Program};
pub use tape::TapeMachine;

/// Execution strategy. Both give the same observable behaviour for a
/// well-formed program; exactly one runs per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Engine {
    #[default]
    Interpreter,
    Jit,
}

impl Engine {
    pub fn name(&self) -> &'static str {
        match self {
            Engine::Interpreter => "interpreter",
            Engine::Jit => "jit",
        }
    }
}

/// Run `program` against `tape`, reading and writing the descriptors named
/// in `config`. Either engine reads them unbuffered, so switching engines
/// between runs never strands input.
///
/// To run the interpreter over any other [`ByteChannel`], use
/// [`Interpreter::run`] directly.
pub fn run_on(
    program: Program<'_>,
    engine: Engine,
    config: &Config,
    tape: &mut TapeMachine,
) -> Result<()> {
    match engine {
        Engine::Interpreter => {
            std::io::stdout().flush()?;
            let mut io = descriptor_channel(config)?;
            Interpreter::with_config(config).run(program, tape, &mut io)
        }
        Engine::Jit => Jit::new(config.clone()).run(program, tape),
    }
}

#[cfg(unix)]
fn descriptor_channel(config: &Config) -> Result<FdChannel> {
    Ok(FdChannel::from_config(config))
}

#[cfg(not(unix))]
fn descriptor_channel(
    config: &Config,
) -> Result<IoChannel<std::io::Stdin, std::io::BufWriter<std::io::Stdout>>> {
    if (config.input_fd, config.output_fd) != (0, 1) {
        return Err(Error::Config("custom descriptors need a unix host".to_string()));
    }
    Ok(IoChannel::stdio())
}

/// Run `program` on a fresh tape and return the tape it finished with.
#[instrument(level = "info", skip(program, config), fields(len = program.len()))]
pub fn run(program: Program<'_>, engine: Engine, config: &Config) -> Result<TapeMachine> {
    config.validate()?;
    let mut tape = TapeMachine::with_config(config);
    info!(engine = engine.name(), tape_size = config.tape_size, "running program");
    run_on(program, engine, config, &mut tape)?;
    Ok(tape)
}
