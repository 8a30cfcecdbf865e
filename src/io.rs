// io.rs - Byte-granular input/output for the interpreter
//
// Generated code does not go through this module: it issues the read/write
// system calls itself on the descriptors named in the Config. `FdChannel`
// makes the same calls, so both engines see the same bytes in the same order.

use std::io::{self, BufWriter, Read, Stdin, Stdout, Write};
#[cfg(unix)]
use std::ptr;

#[cfg(unix)]
use crate::config::Config;

/// One byte in, one byte out, in program order.
pub trait ByteChannel {
    /// Blocks until a byte is available. `Ok(None)` means end of input.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    fn write_byte(&mut self, byte: u8) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

/// A [`ByteChannel`] over any reader/writer pair.
///
/// Pending output is flushed before every read so a prompt written by the
/// program is visible before the program blocks on input.
pub struct IoChannel<R, W> {
    input: R,
    output: W,
}

impl<R: Read, W: Write> IoChannel<R, W> {
    pub fn new(input: R, output: W) -> Self {
        IoChannel { input, output }
    }

    pub fn into_parts(self) -> (R, W) {
        (self.input, self.output)
    }

    pub fn output(&self) -> &W {
        &self.output
    }
}

impl IoChannel<Stdin, BufWriter<Stdout>> {
    /// The process's standard input and output.
    pub fn stdio() -> Self {
        IoChannel::new(io::stdin(), BufWriter::new(io::stdout()))
    }
}

/// In-memory channel: fixed input bytes, output collected in a Vec.
pub type MemoryChannel = IoChannel<io::Cursor<Vec<u8>>, Vec<u8>>;

impl MemoryChannel {
    pub fn from_input(input: impl Into<Vec<u8>>) -> Self {
        IoChannel::new(io::Cursor::new(input.into()), Vec::new())
    }

    pub fn into_output(self) -> Vec<u8> {
        self.output
    }
}

/// Unbuffered channel over raw descriptors, one system call per byte.
///
/// Nothing is read ahead, so whatever this channel leaves unread is still
/// there for the next reader of the descriptor, generated code included.
/// The descriptors are borrowed, never closed.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdChannel {
    input_fd: i32,
    output_fd: i32,
}

#[cfg(unix)]
impl FdChannel {
    pub fn new(input_fd: i32, output_fd: i32) -> Self {
        FdChannel { input_fd, output_fd }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.input_fd, config.output_fd)
    }
}

#[cfg(unix)]
impl ByteChannel for FdChannel {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        let mut byte = 0u8;
        loop {
            // SAFETY: reads at most one byte into a live local.
            let n = unsafe { libc::read(self.input_fd, ptr::addr_of_mut!(byte).cast(), 1) };
            match n {
                1 => return Ok(Some(byte)),
                0 => return Ok(None),
                _ => {
                    let err = io::Error::last_os_error();
                    if err.kind() != io::ErrorKind::Interrupted {
                        return Err(err);
                    }
                }
            }
        }
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        loop {
            // SAFETY: writes one byte out of a live local.
            let n = unsafe { libc::write(self.output_fd, ptr::addr_of!(byte).cast(), 1) };
            match n {
                1 => return Ok(()),
                0 => return Err(io::ErrorKind::WriteZero.into()),
                _ => {
                    let err = io::Error::last_os_error();
                    if err.kind() != io::ErrorKind::Interrupted {
                        return Err(err);
                    }
                }
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<R: Read, W: Write> ByteChannel for IoChannel<R, W> {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        self.output.flush()?;
        let mut byte = [0u8; 1];
        match self.input.read_exact(&mut byte) {
            Ok(()) => Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.output.write_all(&[byte])
    }

    fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }
}
