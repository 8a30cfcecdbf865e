// exec.rs - Executable memory for generated routines
//
// The only unsafe code in the crate lives here: map pages, copy machine code
// in, flip the pages to read+execute, call the first byte, unmap on drop.

use target_lexicon::{Architecture, OperatingSystem, Triple};

use crate::error::{Error, Result};

/// Generated code is x86-64 and issues Linux system calls directly.
pub fn ensure_supported_host() -> Result<()> {
    let host = Triple::host();
    match (host.architecture, host.operating_system) {
        (Architecture::X86_64, OperatingSystem::Linux) => Ok(()),
        _ => Err(Error::UnsupportedHost {
            triple: host.to_string(),
        }),
    }
}

#[cfg(unix)]
pub use unix::ExecutableRegion;

#[cfg(not(unix))]
pub use unsupported::ExecutableRegion;

#[cfg(unix)]
mod unix {
    use std::io;
    use std::mem;
    use std::ptr::{self, NonNull};

    use tracing::debug;

    use crate::error::{Error, Result};

    /// A private anonymous mapping holding one generated routine.
    ///
    /// The mapping is writable only while the code is copied in and is
    /// executable only afterwards. It is released when the region drops.
    #[derive(Debug)]
    pub struct ExecutableRegion {
        ptr: NonNull<u8>,
        mapped_len: usize,
        code_len: usize,
    }

    fn page_size() -> usize {
        // SAFETY: sysconf has no preconditions.
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 { size as usize } else { 4096 }
    }

    impl ExecutableRegion {
        /// Map enough whole pages for `code`, copy it in and make it executable.
        pub fn load(code: &[u8]) -> Result<Self> {
            let page = page_size();
            let mapped_len = code.len().max(1).div_ceil(page) * page;

            // SAFETY: a fresh anonymous mapping, no existing memory is touched.
            let raw = unsafe {
                libc::mmap(
                    ptr::null_mut(),
                    mapped_len,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                    -1,
                    0,
                )
            };
            if raw == libc::MAP_FAILED {
                return Err(Error::ExecMemory {
                    op: "mmap",
                    source: io::Error::last_os_error(),
                });
            }
            let Some(ptr) = NonNull::new(raw as *mut u8) else {
                return Err(Error::ExecMemory {
                    op: "mmap",
                    source: io::Error::other("mapping returned a null address"),
                });
            };
            let region = ExecutableRegion {
                ptr,
                mapped_len,
                code_len: code.len(),
            };

            // SAFETY: the mapping is at least code.len() bytes, writable, and
            // cannot overlap the borrowed slice.
            unsafe {
                ptr::copy_nonoverlapping(code.as_ptr(), region.ptr.as_ptr(), code.len());
            }

            // SAFETY: ptr/mapped_len describe exactly the mapping made above.
            let rc = unsafe {
                libc::mprotect(
                    region.ptr.as_ptr() as *mut libc::c_void,
                    region.mapped_len,
                    libc::PROT_READ | libc::PROT_EXEC,
                )
            };
            if rc != 0 {
                // `region` drops here and unmaps the pages.
                return Err(Error::ExecMemory {
                    op: "mprotect",
                    source: io::Error::last_os_error(),
                });
            }

            debug!(code_len = code.len(), mapped_len, "loaded executable region");
            Ok(region)
        }

        pub fn code_len(&self) -> usize {
            self.code_len
        }

        pub fn mapped_len(&self) -> usize {
            self.mapped_len
        }

        /// Call the routine's first byte and wait for it to return.
        ///
        /// # Safety
        ///
        /// The region must hold a complete routine following the C calling
        /// convention for `extern "C" fn()`, and every address it embeds
        /// (tape cells, cursor slot) must be valid for the whole call.
        pub unsafe fn invoke(&self) {
            // SAFETY: forwarded to the caller; the mapping is executable.
            let entry: extern "C" fn() =
                unsafe { mem::transmute::<*mut u8, extern "C" fn()>(self.ptr.as_ptr()) };
            entry();
        }
    }

    impl Drop for ExecutableRegion {
        fn drop(&mut self) {
            // SAFETY: unmapping the mapping this region owns; nothing else
            // refers to it once the region is gone.
            unsafe {
                libc::munmap(self.ptr.as_ptr() as *mut libc::c_void, self.mapped_len);
            }
        }
    }
}

#[cfg(not(unix))]
mod unsupported {
    use target_lexicon::Triple;

    use crate::error::{Error, Result};

    #[derive(Debug)]
    pub struct ExecutableRegion {
        _private: (),
    }

    impl ExecutableRegion {
        pub fn load(_code: &[u8]) -> Result<Self> {
            Err(Error::UnsupportedHost {
                triple: Triple::host().to_string(),
            })
        }

        pub fn code_len(&self) -> usize {
            0
        }

        pub fn mapped_len(&self) -> usize {
            0
        }

        /// # Safety
        ///
        /// Never constructed on this host.
        pub unsafe fn invoke(&self) {}
    }
}
