// tape.rs - Fixed-capacity byte tape with a cursor

use crate::config::{Config, CursorMode};
use crate::error::{Error, Result};

/// The execution state both engines run against: a zero-initialised,
/// fixed-capacity row of byte cells and a cursor into it.
///
/// All cell access goes through the cursor. The tape never grows; how a
/// move past either end is handled depends on the [`CursorMode`].
#[derive(Debug, Clone)]
pub struct TapeMachine {
    cells: Box<[u8]>,
    cursor: usize,
    mode: CursorMode,
}

impl Default for TapeMachine {
    fn default() -> Self {
        Self::with_config(&Config::default())
    }
}

impl TapeMachine {
    pub fn new(capacity: usize, mode: CursorMode) -> Self {
        assert!(capacity > 0, "tape capacity must be non-zero");
        TapeMachine {
            cells: vec![0; capacity].into_boxed_slice(),
            cursor: 0,
            mode,
        }
    }

    pub fn with_config(config: &Config) -> Self {
        Self::new(config.tape_size, config.cursor)
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn mode(&self) -> CursorMode {
        self.mode
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    /// Value of the current cell.
    pub fn get(&self) -> u8 {
        self.cells[self.cursor]
    }

    pub fn set(&mut self, value: u8) {
        self.cells[self.cursor] = value;
    }

    /// Add `n` to the current cell, modulo 256.
    pub fn add(&mut self, n: u8) {
        let cell = &mut self.cells[self.cursor];
        *cell = cell.wrapping_add(n);
    }

    /// Subtract `n` from the current cell, modulo 256.
    pub fn sub(&mut self, n: u8) {
        let cell = &mut self.cells[self.cursor];
        *cell = cell.wrapping_sub(n);
    }

    /// Move the cursor by a signed delta.
    pub fn shift(&mut self, delta: isize) -> Result<()> {
        let capacity = self.capacity() as isize;
        let target = self.cursor as isize + delta;
        self.cursor = match self.mode {
            CursorMode::Wrap => target.rem_euclid(capacity) as usize,
            CursorMode::Strict if (0..capacity).contains(&target) => target as usize,
            CursorMode::Strict => {
                return Err(Error::CursorOutOfRange {
                    cursor: self.cursor,
                    delta,
                    capacity: self.capacity(),
                });
            }
        };
        Ok(())
    }

    /// Cells within `radius` of the cursor, clipped to the tape, together with
    /// the index of the first returned cell.
    pub fn window(&self, radius: usize) -> (usize, &[u8]) {
        let start = self.cursor.saturating_sub(radius);
        let end = self.cursor.saturating_add(radius).saturating_add(1).min(self.capacity());
        (start, &self.cells[start..end])
    }

    /// Zero every cell and return the cursor to 0.
    pub fn reset(&mut self) {
        self.cells.fill(0);
        self.cursor = 0;
    }

    /// Address of the current cell, for embedding into generated code. The
    /// pointer is derived from the whole tape, which the routine walks.
    pub(crate) fn cursor_ptr(&mut self) -> *mut u8 {
        self.cells.as_mut_ptr().wrapping_add(self.cursor)
    }

    pub(crate) fn base_addr(&self) -> usize {
        self.cells.as_ptr() as usize
    }

    /// Used after generated code ran; the caller has range-checked `cursor`.
    pub(crate) fn set_cursor(&mut self, cursor: usize) {
        debug_assert!(cursor < self.capacity());
        self.cursor = cursor;
    }
}
