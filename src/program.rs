// program.rs - Program text and the eight-instruction alphabet

// ============================================================================
// INSTRUCTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    Right,      // >
    Left,       // <
    Inc,        // +
    Dec,        // -
    Read,       // ,
    Write,      // .
    Open,       // [
    Close,      // ]
}

impl Instruction {
    /// Any byte outside the alphabet is a no-op and maps to `None`.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'>' => Some(Instruction::Right),
            b'<' => Some(Instruction::Left),
            b'+' => Some(Instruction::Inc),
            b'-' => Some(Instruction::Dec),
            b',' => Some(Instruction::Read),
            b'.' => Some(Instruction::Write),
            b'[' => Some(Instruction::Open),
            b']' => Some(Instruction::Close),
            _ => None,
        }
    }

    pub fn symbol(&self) -> char {
        match self {
            Instruction::Right => '>',
            Instruction::Left => '<',
            Instruction::Inc => '+',
            Instruction::Dec => '-',
            Instruction::Read => ',',
            Instruction::Write => '.',
            Instruction::Open => '[',
            Instruction::Close => ']',
        }
    }

    /// Instructions whose consecutive repetitions fold into one count.
    pub fn is_coalescable(&self) -> bool {
        matches!(
            self,
            Instruction::Right | Instruction::Left | Instruction::Inc | Instruction::Dec
        )
    }
}

// ============================================================================
// PROGRAM
// ============================================================================

/// Borrowed, immutable program text.
#[derive(Debug, Clone, Copy)]
pub struct Program<'a> {
    text: &'a [u8],
}

impl<'a> Program<'a> {
    pub fn new(text: &'a str) -> Self {
        Program { text: text.as_bytes() }
    }

    pub fn from_bytes(text: &'a [u8]) -> Self {
        Program { text }
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Instruction at byte offset `pos`, `None` past the end or for a no-op byte.
    pub fn instruction_at(&self, pos: usize) -> Option<Instruction> {
        self.text.get(pos).copied().and_then(Instruction::from_byte)
    }

    /// Number of consecutive copies of the byte at `pos`, starting at `pos`.
    /// Only directly adjacent bytes count; a no-op byte ends the run.
    pub fn run_length(&self, pos: usize) -> usize {
        match self.text.get(pos) {
            Some(&byte) => self.text[pos..].iter().take_while(|&&b| b == byte).count(),
            None => 0,
        }
    }

    /// Meaningful instructions with their byte offsets, no-ops skipped.
    pub fn instructions(&self) -> impl Iterator<Item = (usize, Instruction)> + 'a {
        self.text
            .iter()
            .enumerate()
            .filter_map(|(pos, &b)| Instruction::from_byte(b).map(|ins| (pos, ins)))
    }
}
