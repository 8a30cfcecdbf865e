// jit.rs - Generate, load and run machine code against a tape

use std::io::{self, Write};
use std::{mem, ptr};

use tracing::{debug, instrument};

use crate::codegen::{self, HostBindings, MachineCode};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::exec::{self, ExecutableRegion};
use crate::program::Program;
use crate::tape::TapeMachine;

/// Where a finished routine leaves its results for the host.
#[derive(Debug, Default)]
#[repr(C)]
pub struct ExitSlots {
    /// Address of the cell the cursor finished on.
    pub cursor_addr: u64,
    /// Non-zero when a strict-mode move was rejected: the move itself.
    pub fault: i64,
}

/// JIT engine. Each call to [`Jit::run`] generates a fresh routine bound to
/// the tape's current cell, runs it once and releases its memory.
///
/// The routine honours the tape's [`CursorMode`](crate::CursorMode): a wrap
/// tape is a ring, and on a strict tape a move off either end stops the
/// routine with the cursor where it was.
#[derive(Debug, Clone, Default)]
pub struct Jit {
    config: Config,
}

impl Jit {
    pub fn new(config: Config) -> Self {
        Jit { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Translate `program` for `tape` without running it. The routine will
    /// report back through `exit`.
    pub fn compile(
        &self,
        program: Program<'_>,
        tape: &mut TapeMachine,
        exit: &mut ExitSlots,
    ) -> Result<MachineCode> {
        let slots = exit as *mut ExitSlots as u64;
        let bindings = HostBindings {
            cell_addr: tape.cursor_ptr() as u64,
            tape_base: tape.base_addr() as u64,
            tape_len: tape.capacity() as u64,
            cursor: tape.mode(),
            cursor_slot: slots + mem::offset_of!(ExitSlots, cursor_addr) as u64,
            fault_slot: slots + mem::offset_of!(ExitSlots, fault) as u64,
            input_fd: self.config.input_fd,
            output_fd: self.config.output_fd,
        };
        codegen::generate(program, bindings)
    }

    #[instrument(level = "debug", skip_all, fields(len = program.len()))]
    pub fn run(&self, program: Program<'_>, tape: &mut TapeMachine) -> Result<()> {
        let mut exit = ExitSlots::default();
        let code = self.compile(program, tape, &mut exit)?;

        exec::ensure_supported_host()?;
        let region = ExecutableRegion::load(&code.bytes)?;

        // Generated code writes to the descriptor directly; anything still
        // buffered on our side must go out first.
        io::stdout().flush()?;

        // SAFETY: the routine was produced by codegen for this tape and these
        // slots. Every pointer move is range-guarded, `tape` is mutably
        // borrowed and `exit` is a live local for the whole call.
        unsafe { region.invoke() };
        drop(region);

        // SAFETY: plain reads of a local the routine has just written.
        let (cursor_addr, fault) = unsafe {
            (
                ptr::read_volatile(ptr::addr_of!(exit.cursor_addr)),
                ptr::read_volatile(ptr::addr_of!(exit.fault)),
            )
        };
        let offset = (cursor_addr as usize).wrapping_sub(tape.base_addr());
        if offset >= tape.capacity() {
            return Err(Error::CursorOutOfRange {
                cursor: tape.cursor(),
                delta: offset as isize - tape.cursor() as isize,
                capacity: tape.capacity(),
            });
        }
        tape.set_cursor(offset);

        if fault != 0 {
            debug!(cursor = offset, delta = fault, "jit stopped on a cursor fault");
            return Err(Error::CursorOutOfRange {
                cursor: offset,
                delta: fault as isize,
                capacity: tape.capacity(),
            });
        }

        debug!(code_len = code.len(), guards = code.guards, cursor = offset, "jit finished");
        Ok(())
    }
}
