// interpreter.rs - Direct interpreter over the program text

use tracing::{debug, instrument};

use crate::config::{Config, DEFAULT_MAX_NESTING};
use crate::error::{Error, Result};
use crate::io::ByteChannel;
use crate::program::{Instruction, Program};
use crate::tape::TapeMachine;

/// Walks the program text against a tape without any precomputed jump table.
///
/// A loop whose entry test fails is skipped by scanning its body with
/// execution suppressed: every mutating instruction becomes a no-op, but
/// `[` and `]` keep the loop stack and the suppression depth in step so the
/// matching `]` is found even through nested loops.
pub struct Interpreter {
    max_nesting: usize,
    /// Re-entry offsets (the byte after each open `[`).
    loops: Vec<usize>,
    /// Number of enclosing loop bodies currently being skipped.
    suppressed: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_NESTING)
    }
}

impl Interpreter {
    pub fn new(max_nesting: usize) -> Self {
        Interpreter {
            max_nesting,
            loops: Vec::with_capacity(max_nesting),
            suppressed: 0,
        }
    }

    pub fn with_config(config: &Config) -> Self {
        Self::new(config.max_nesting)
    }

    /// Run `program` to completion. Output is flushed before returning.
    #[instrument(level = "debug", skip_all, fields(len = program.len()))]
    pub fn run<C: ByteChannel>(
        &mut self,
        program: Program<'_>,
        tape: &mut TapeMachine,
        io: &mut C,
    ) -> Result<()> {
        self.loops.clear();
        self.suppressed = 0;

        let text = program.as_bytes();
        let mut ip = 0;

        while ip < text.len() {
            let pos = ip;
            ip += 1;
            let Some(instruction) = Instruction::from_byte(text[pos]) else {
                continue;
            };

            match instruction {
                Instruction::Right | Instruction::Left | Instruction::Inc | Instruction::Dec => {
                    let n = program.run_length(pos);
                    ip = pos + n;
                    if self.suppressed == 0 {
                        match instruction {
                            Instruction::Right => tape.shift(n as isize)?,
                            Instruction::Left => tape.shift(-(n as isize))?,
                            Instruction::Inc => tape.add((n % 256) as u8),
                            _ => tape.sub((n % 256) as u8),
                        }
                    }
                }

                Instruction::Read => {
                    // End of input leaves the cell as it was.
                    if self.suppressed == 0 {
                        if let Some(byte) = io.read_byte()? {
                            tape.set(byte);
                        }
                    }
                }

                Instruction::Write => {
                    if self.suppressed == 0 {
                        io.write_byte(tape.get())?;
                    }
                }

                Instruction::Open => {
                    if self.loops.len() == self.max_nesting {
                        return Err(Error::NestingTooDeep {
                            limit: self.max_nesting,
                            offset: pos,
                        });
                    }
                    self.loops.push(ip);
                    if tape.get() == 0 {
                        self.suppressed += 1;
                    }
                }

                Instruction::Close => {
                    let Some(&reentry) = self.loops.last() else {
                        return Err(Error::UnmatchedClose { offset: pos });
                    };
                    if tape.get() != 0 {
                        ip = reentry;
                    } else {
                        self.loops.pop();
                    }
                    if self.suppressed > 0 {
                        self.suppressed -= 1;
                    }
                }
            }
        }

        io.flush()?;
        debug!(cursor = tape.cursor(), open_loops = self.loops.len(), "interpreter finished");
        Ok(())
    }

    /// Suppression depth left over from the last run.
    pub fn suppression_depth(&self) -> usize {
        self.suppressed
    }
}
