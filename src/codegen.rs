// codegen.rs - Program text to x86-64 machine code
//
// The generated routine keeps the tape cursor in RBX for its whole lifetime:
//
//   push rbx                  ; RBX is callee-saved
//   mov  rbx, <cell address>
//   ...body...
//   mov  rax, <cursor slot>
//   mov  [rax], rbx           ; hand the final cursor back to the host
//   pop  rbx
//   ret
//   fault:                    ; strict mode only
//   mov  rcx, <fault slot>
//   mov  [rcx], rax           ; rax holds the rejected move
//   jmp  epilogue
//
// Every pointer move is followed (wrap mode) or preceded (strict mode) by a
// range guard, so RBX never leaves the tape while a cell is touched.
//
// Nothing here is unsafe: the generator only produces bytes. Loading and
// calling them is exec.rs's job.

use std::fmt::Write as _;

use tracing::{debug, trace};

use crate::config::{Config, CursorMode};
use crate::error::{Error, Result};
use crate::program::{Instruction, Program};

// ============================================================================
// ENCODINGS
// ============================================================================

const PUSH_RBX: u8 = 0x53;
const POP_RBX: u8 = 0x5B;
const RET: u8 = 0xC3;
const MOV_RBX_IMM64: [u8; 2] = [0x48, 0xBB];
const MOV_RAX_IMM64: [u8; 2] = [0x48, 0xB8];
const MOV_MEM_RAX_RBX: [u8; 3] = [0x48, 0x89, 0x18];

const ADD_MEM_RBX_IMM8: [u8; 2] = [0x80, 0x03];         // add byte [rbx], ib
const SUB_MEM_RBX_IMM8: [u8; 2] = [0x80, 0x2B];         // sub byte [rbx], ib
const ADD_RBX_IMM8: [u8; 3] = [0x48, 0x83, 0xC3];       // add rbx, ib (sign-extended)
const SUB_RBX_IMM8: [u8; 3] = [0x48, 0x83, 0xEB];       // sub rbx, ib (sign-extended)
const ADD_RBX_IMM32: [u8; 3] = [0x48, 0x81, 0xC3];      // add rbx, id
const SUB_RBX_IMM32: [u8; 3] = [0x48, 0x81, 0xEB];      // sub rbx, id

const CMP_MEM_RBX_ZERO: [u8; 3] = [0x80, 0x3B, 0x00];   // cmp byte [rbx], 0
const JE_REL32: [u8; 2] = [0x0F, 0x84];
const JNE_REL32: [u8; 2] = [0x0F, 0x85];
const JMP_REL8: u8 = 0xEB;
const JMP_REL32: u8 = 0xE9;
const JB_REL8: u8 = 0x72;
const JAE_REL8: u8 = 0x73;

const MOV_RCX_IMM64: [u8; 2] = [0x48, 0xB9];
const MOV_MEM_RCX_RAX: [u8; 3] = [0x48, 0x89, 0x01];
const CMP_RBX_RAX: [u8; 3] = [0x48, 0x39, 0xC3];
const ADD_RBX_RAX: [u8; 3] = [0x48, 0x01, 0xC3];
const SUB_RBX_RAX: [u8; 3] = [0x48, 0x29, 0xC3];

const SYS_READ: u32 = 0;
const SYS_WRITE: u32 = 1;

/// Longest run folded into one emitted instruction.
pub const MAX_RUN: usize = 255;

/// Pointer moves up to this size fit the sign-extended 8-bit immediate.
const MAX_POINTER_IMM8: usize = 127;

/// Size of one loop test: `cmp byte [rbx], 0` plus a near conditional jump.
pub const BRANCH_BLOCK_LEN: usize = CMP_MEM_RBX_ZERO.len() + JE_REL32.len() + 4;

const SHORT_JMP_LEN: usize = 2;

/// Trailing closers one short jump may skip: 11 * (9 + 2) = 121 <= i8::MAX.
const MAX_ELIDED_CLOSERS: usize = 11;

pub const PROLOGUE_LEN: usize = 1 + MOV_RBX_IMM64.len() + 8;
pub const EPILOGUE_LEN: usize = MOV_RAX_IMM64.len() + 8 + MOV_MEM_RAX_RBX.len() + 2;

/// Wrap guard: `mov rax, bound; cmp rbx, rax; jcc +13; mov rax, len; add/sub rbx, rax`.
pub const WRAP_GUARD_LEN: usize = 10 + 3 + 2 + 10 + 3;
/// Strict guard: `mov rax, limit; cmp rbx, rax; jcc +15; mov rax, delta; jmp fault`.
pub const STRICT_GUARD_LEN: usize = 10 + 3 + 2 + 10 + 5;
pub const FAULT_STUB_LEN: usize = MOV_RCX_IMM64.len() + 8 + MOV_MEM_RCX_RAX.len() + 5;

// ============================================================================
// HOST BINDINGS
// ============================================================================

/// Host values baked into the generated routine as immediates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostBindings {
    /// Address of the tape cell the cursor starts on.
    pub cell_addr: u64,
    /// Address of the first tape cell.
    pub tape_base: u64,
    /// Number of tape cells.
    pub tape_len: u64,
    pub cursor: CursorMode,
    /// Address of a `u64` the epilogue stores the final cursor address into.
    pub cursor_slot: u64,
    /// Address of an `i64` that receives the rejected move in strict mode.
    pub fault_slot: u64,
    pub input_fd: i32,
    pub output_fd: i32,
}

impl HostBindings {
    /// Bindings with every address zero, for looking at the generated code
    /// rather than running it.
    pub fn unbound(config: &Config) -> Self {
        HostBindings {
            cell_addr: 0,
            tape_base: 0,
            tape_len: config.tape_size as u64,
            cursor: config.cursor,
            cursor_slot: 0,
            fault_slot: 0,
            input_fd: config.input_fd,
            output_fd: config.output_fd,
        }
    }

    fn tape_end(&self) -> u64 {
        self.tape_base.wrapping_add(self.tape_len)
    }
}

// ============================================================================
// GENERATED CODE
// ============================================================================

/// A finished routine, all branches resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineCode {
    pub bytes: Vec<u8>,
    /// Loop pairs whose two displacements were patched.
    pub loops: usize,
    /// Short jumps emitted over redundant closing tests.
    pub elided: usize,
    /// Range guards emitted around pointer moves.
    pub guards: usize,
}

impl MachineCode {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Offset-annotated hex dump, 16 bytes per line.
    pub fn listing(&self) -> String {
        let mut out = String::new();
        for (row, chunk) in self.bytes.chunks(16).enumerate() {
            let _ = write!(out, "{:08x}:", row * 16);
            for byte in chunk {
                let _ = write!(out, " {:02x}", byte);
            }
            out.push('\n');
        }
        out
    }
}

// ============================================================================
// CODE GENERATOR
// ============================================================================

pub struct CodeGenerator {
    bindings: HostBindings,
    code: Vec<u8>,
    /// For each open `[`: offset just past its `je`, and its source offset.
    relocations: Vec<(usize, usize)>,
    /// Ends of strict-guard jumps still aimed at the fault stub.
    fault_jumps: Vec<usize>,
    loops: usize,
    elided: usize,
    guards: usize,
}

impl CodeGenerator {
    pub fn new(bindings: HostBindings) -> Self {
        CodeGenerator {
            bindings,
            code: Vec::new(),
            relocations: Vec::new(),
            fault_jumps: Vec::new(),
            loops: 0,
            elided: 0,
            guards: 0,
        }
    }

    /// Translate a whole program in one pass.
    pub fn generate(mut self, program: Program<'_>) -> Result<MachineCode> {
        self.code.reserve(PROLOGUE_LEN + program.len() * 4 + EPILOGUE_LEN);
        self.emit_prologue();

        let mut pos = 0;
        while pos < program.len() {
            let Some(instruction) = program.instruction_at(pos) else {
                pos += 1;
                continue;
            };

            if instruction.is_coalescable() {
                let n = program.run_length(pos);
                self.emit_run(instruction, n);
                pos += n;
                continue;
            }

            match instruction {
                Instruction::Read => self.emit_syscall(SYS_READ, self.bindings.input_fd),
                Instruction::Write => self.emit_syscall(SYS_WRITE, self.bindings.output_fd),
                Instruction::Open => self.emit_open(pos),
                Instruction::Close => {
                    self.emit_close(pos)?;
                    let trailing = program.run_length(pos) - 1;
                    if trailing > 0 {
                        self.emit_elided_closers(trailing);
                    }
                }
                _ => unreachable!("coalescable instructions handled above"),
            }
            pos += 1;
        }

        if let Some(&(_, offset)) = self.relocations.last() {
            return Err(Error::UnclosedLoop { offset });
        }

        let epilogue = self.code.len();
        self.emit_epilogue();
        if !self.fault_jumps.is_empty() {
            self.emit_fault_stub(epilogue)?;
        }
        debug!(
            program_len = program.len(),
            code_len = self.code.len(),
            loops = self.loops,
            elided = self.elided,
            guards = self.guards,
            "generated machine code"
        );

        Ok(MachineCode {
            bytes: self.code,
            loops: self.loops,
            elided: self.elided,
            guards: self.guards,
        })
    }

    fn emit_prologue(&mut self) {
        self.code.push(PUSH_RBX);
        self.code.extend_from_slice(&MOV_RBX_IMM64);
        self.code.extend_from_slice(&self.bindings.cell_addr.to_le_bytes());
    }

    fn emit_epilogue(&mut self) {
        self.code.extend_from_slice(&MOV_RAX_IMM64);
        self.code.extend_from_slice(&self.bindings.cursor_slot.to_le_bytes());
        self.code.extend_from_slice(&MOV_MEM_RAX_RBX);
        self.code.push(POP_RBX);
        self.code.push(RET);
    }

    /// `.. fault: mov rcx, slot; mov [rcx], rax; jmp epilogue`, then aim every
    /// strict guard at it.
    fn emit_fault_stub(&mut self, epilogue: usize) -> Result<()> {
        let stub = self.code.len();
        self.code.extend_from_slice(&MOV_RCX_IMM64);
        self.code.extend_from_slice(&self.bindings.fault_slot.to_le_bytes());
        self.code.extend_from_slice(&MOV_MEM_RCX_RAX);
        self.code.push(JMP_REL32);
        self.code.extend_from_slice(&[0; 4]);
        let end = self.code.len();
        let back = self.displacement(end, epilogue)?;
        self.patch_rel32(end, back);

        for site in std::mem::take(&mut self.fault_jumps) {
            let forward = self.displacement(site, stub)?;
            self.patch_rel32(site, forward);
        }
        Ok(())
    }

    /// Runs longer than [`MAX_RUN`] are split, never truncated.
    fn emit_run(&mut self, instruction: Instruction, mut n: usize) {
        let pointer = matches!(instruction, Instruction::Right | Instruction::Left);
        if pointer && self.bindings.cursor == CursorMode::Strict {
            self.emit_strict_guard(instruction, n);
        }

        while n > 0 {
            let chunk = n.min(MAX_RUN);
            n -= chunk;
            match instruction {
                Instruction::Inc => self.emit_imm8(&ADD_MEM_RBX_IMM8, chunk),
                Instruction::Dec => self.emit_imm8(&SUB_MEM_RBX_IMM8, chunk),
                _ if self.bindings.cursor == CursorMode::Wrap => {
                    // A whole number of laps is no move at all.
                    let step = (chunk as u64 % self.bindings.tape_len.max(1)) as usize;
                    if step > 0 {
                        self.emit_pointer_move(instruction, step);
                        self.emit_wrap_guard(instruction);
                    }
                }
                _ => self.emit_pointer_move(instruction, chunk),
            }
        }
    }

    fn emit_pointer_move(&mut self, instruction: Instruction, n: usize) {
        match instruction {
            Instruction::Right if n <= MAX_POINTER_IMM8 => self.emit_imm8(&ADD_RBX_IMM8, n),
            Instruction::Left if n <= MAX_POINTER_IMM8 => self.emit_imm8(&SUB_RBX_IMM8, n),
            Instruction::Right => self.emit_imm32(&ADD_RBX_IMM32, n),
            Instruction::Left => self.emit_imm32(&SUB_RBX_IMM32, n),
            _ => unreachable!("not a pointer instruction"),
        }
    }

    fn emit_mov_rax(&mut self, value: u64) {
        self.code.extend_from_slice(&MOV_RAX_IMM64);
        self.code.extend_from_slice(&value.to_le_bytes());
    }

    /// After a move shorter than the tape, at most one lap brings RBX back:
    /// past the end it drops by the tape length, below the base it rises.
    fn emit_wrap_guard(&mut self, instruction: Instruction) {
        let (bound, skip_if, fix) = match instruction {
            Instruction::Right => (self.bindings.tape_end(), JB_REL8, SUB_RBX_RAX),
            _ => (self.bindings.tape_base, JAE_REL8, ADD_RBX_RAX),
        };
        self.emit_mov_rax(bound);
        self.code.extend_from_slice(&CMP_RBX_RAX);
        self.code.push(skip_if);
        self.code.push((MOV_RAX_IMM64.len() + 8 + fix.len()) as u8);
        self.emit_mov_rax(self.bindings.tape_len);
        self.code.extend_from_slice(&fix);
        self.guards += 1;
    }

    /// Checked before the run moves, so a rejected run leaves RBX untouched.
    fn emit_strict_guard(&mut self, instruction: Instruction, n: usize) {
        let n64 = n as u64;
        let (limit, skip_if, delta) = match instruction {
            // Out of range when cursor + n >= len.
            Instruction::Right => (self.bindings.tape_end().saturating_sub(n64), JB_REL8, n as i64),
            // Out of range when cursor < n.
            _ => (self.bindings.tape_base.saturating_add(n64), JAE_REL8, -(n as i64)),
        };
        self.emit_mov_rax(limit);
        self.code.extend_from_slice(&CMP_RBX_RAX);
        self.code.push(skip_if);
        self.code.push((MOV_RAX_IMM64.len() + 8 + 5) as u8);
        self.emit_mov_rax(delta as u64);
        self.code.push(JMP_REL32);
        self.code.extend_from_slice(&[0; 4]);
        self.fault_jumps.push(self.code.len());
        self.guards += 1;
    }

    fn emit_imm8(&mut self, opcode: &[u8], value: usize) {
        debug_assert!(value <= u8::MAX as usize);
        self.code.extend_from_slice(opcode);
        self.code.push(value as u8);
    }

    fn emit_imm32(&mut self, opcode: &[u8], value: usize) {
        self.code.extend_from_slice(opcode);
        self.code.extend_from_slice(&(value as u32).to_le_bytes());
    }

    /// `syscall(number, fd, rbx, 1)`: one byte at the cursor.
    fn emit_syscall(&mut self, number: u32, fd: i32) {
        self.code.push(0xB8); // mov eax, id
        self.code.extend_from_slice(&number.to_le_bytes());
        self.code.push(0xBF); // mov edi, id
        self.code.extend_from_slice(&fd.to_le_bytes());
        self.code.extend_from_slice(&[0x48, 0x89, 0xDE]); // mov rsi, rbx
        self.code.push(0xBA); // mov edx, id
        self.code.extend_from_slice(&1u32.to_le_bytes());
        self.code.extend_from_slice(&[0x0F, 0x05]); // syscall
    }

    fn emit_branch_block(&mut self, jcc: &[u8; 2]) -> usize {
        self.code.extend_from_slice(&CMP_MEM_RBX_ZERO);
        self.code.extend_from_slice(jcc);
        self.code.extend_from_slice(&[0; 4]);
        self.code.len()
    }

    fn emit_open(&mut self, source_offset: usize) {
        let end = self.emit_branch_block(&JE_REL32);
        self.relocations.push((end, source_offset));
    }

    /// Emit the closing test and patch both displacements of the pair.
    fn emit_close(&mut self, source_offset: usize) -> Result<()> {
        let Some((open_end, _)) = self.relocations.pop() else {
            return Err(Error::UnmatchedClose { offset: source_offset });
        };
        let close_end = self.emit_branch_block(&JNE_REL32);

        let backward = self.displacement(close_end, open_end)?;
        let forward = self.displacement(open_end, close_end)?;
        self.patch_rel32(close_end, backward);
        self.patch_rel32(open_end, forward);
        self.loops += 1;

        trace!(open_end, close_end, backward, forward, "patched loop");
        Ok(())
    }

    /// Signed distance from the end of a jump at `from` to `to`.
    fn displacement(&self, from: usize, to: usize) -> Result<i32> {
        let delta = to as i64 - from as i64;
        i32::try_from(delta).map_err(|_| Error::CodeTooLarge { size: self.code.len() })
    }

    /// Overwrite the 4 placeholder bytes that end at `end`.
    fn patch_rel32(&mut self, end: usize, displacement: i32) {
        self.code[end - 4..end].copy_from_slice(&displacement.to_le_bytes());
    }

    /// The cell is zero when a closing test falls through, so the tests of
    /// directly following closers would fall through too. Jump over them.
    fn emit_elided_closers(&mut self, trailing: usize) {
        let skipped = trailing.min(MAX_ELIDED_CLOSERS);
        // Every skipped closer except a final one also carries its own short jump.
        let with_jump = skipped.min(trailing - 1);
        let span = skipped * BRANCH_BLOCK_LEN + with_jump * SHORT_JMP_LEN;
        debug_assert!(span <= i8::MAX as usize);

        self.code.push(JMP_REL8);
        self.code.push(span as u8);
        self.elided += skipped;
    }
}

/// Translate `program` with the given bindings.
pub fn generate(program: Program<'_>, bindings: HostBindings) -> Result<MachineCode> {
    CodeGenerator::new(bindings).generate(program)
}
