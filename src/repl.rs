// repl.rs - Interactive session over one persistent tape

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use tapejit::{Config, Engine, Program, TapeMachine};

const PROMPT: &str = "tape> ";
const HISTORY_FILE: &str = ".tapejit_history";
const DEFAULT_WINDOW: usize = 8;

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Help,
    Quit,
    Reset,
    Tape(usize),
    Engine(Engine),
    Unknown(String),
}

/// A line is a command only when `.` is followed by a letter; anything else
/// (including `.` on its own or `.+.`) is program text.
fn parse_command(input: &str) -> Option<Command> {
    let rest = input.strip_prefix('.')?;
    if !rest.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }

    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or_default().to_lowercase();
    let arg = words.next();

    let command = match name.as_str() {
        "help" | "h" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        "reset" => Command::Reset,
        "tape" | "t" => match arg.map(str::parse) {
            None => Command::Tape(DEFAULT_WINDOW),
            Some(Ok(radius)) => Command::Tape(radius),
            Some(Err(_)) => Command::Unknown(input.to_string()),
        },
        "engine" => match arg {
            Some("interp") | Some("interpreter") => Command::Engine(Engine::Interpreter),
            Some("jit") => Command::Engine(Engine::Jit),
            _ => Command::Unknown(input.to_string()),
        },
        _ => Command::Unknown(input.to_string()),
    };
    Some(command)
}

/// Cells around the cursor, the cursor cell bracketed.
fn format_window(tape: &TapeMachine, radius: usize) -> String {
    let (start, cells) = tape.window(radius);
    let mut out = format!("cursor {} | ", tape.cursor());
    for (i, cell) in cells.iter().enumerate() {
        if start + i == tape.cursor() {
            out.push_str(&format!("[{}] ", cell));
        } else {
            out.push_str(&format!("{} ", cell));
        }
    }
    out.trim_end().to_string()
}

pub struct Repl {
    config: Config,
    engine: Engine,
    tape: TapeMachine,
    editor: DefaultEditor,
    history: Option<PathBuf>,
}

impl Repl {
    pub fn new(config: Config, engine: Engine) -> Result<Self> {
        let mut editor = DefaultEditor::new()?;
        let history = dirs::home_dir().map(|home| home.join(HISTORY_FILE));
        if let Some(path) = &history {
            let _ = editor.load_history(path);
        }

        Ok(Repl {
            tape: TapeMachine::with_config(&config),
            config,
            engine,
            editor,
            history,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        println!("tapejit {} ({})", env!("CARGO_PKG_VERSION"), self.engine.name());
        println!("Type .help for help, .quit to exit");

        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let input = line.trim();
                    if input.is_empty() {
                        continue;
                    }
                    let _ = self.editor.add_history_entry(input);

                    match parse_command(input) {
                        Some(Command::Quit) => break,
                        Some(command) => self.handle_command(command),
                        None => self.eval(input),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("Error: {:?}", err);
                    break;
                }
            }
        }

        if let Some(path) = &self.history {
            let _ = self.editor.save_history(path);
        }
        Ok(())
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Help => print_help(),
            Command::Reset => {
                self.tape.reset();
                println!("tape cleared");
            }
            Command::Tape(radius) => println!("{}", format_window(&self.tape, radius)),
            Command::Engine(engine) => {
                self.engine = engine;
                println!("engine: {}", engine.name());
            }
            Command::Unknown(input) => {
                println!("Unknown command: {}", input);
                println!("Type .help for help");
            }
            Command::Quit => {}
        }
    }

    fn eval(&mut self, input: &str) {
        let result = tapejit::run_on(Program::new(input), self.engine, &self.config, &mut self.tape);
        let _ = io::stdout().flush();
        match result {
            Ok(()) => println!(" ok"),
            Err(e) => println!(" error: {}", e),
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  .help, .h              Show this help");
    println!("  .tape [n], .t [n]      Show cells within n of the cursor");
    println!("  .reset                 Zero the tape and home the cursor");
    println!("  .engine interp|jit     Switch execution engine");
    println!("  .quit, .q              Exit");
    println!();
    println!("Any other line runs as a program against the same tape.");
    println!("Instructions: + - < > , . [ ]   (everything else is ignored)");
    println!("Both engines read ',' from stdin one byte at a time, so unread");
    println!("input carries over from one line to the next.");
}
