use std::{ptr::NonNull, sync::OnceLock};

use crate::{
    error::{FreelistError, Result},
    utils::align,
};

/// Virtual memory page size of the computer. This is usually 4096, but we
/// don't know the value at compile time.
static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

/// Marker type the platform specific memory primitives are implemented on.
pub(crate) struct Kernel;

/// This trait provides an abstraction to handle low level memory operations
/// and syscalls. The allocator's top level view of this has nothing
/// to do with the concrete implementations / APIs offered by each kernel.
trait PlatformMemory {
    /// Request a memory region of size `len`. It returns a Pointer to the
    /// given location or None if the underlying syscall fails.
    unsafe fn request_memory(len: usize) -> Option<NonNull<u8>>;

    /// Returns the memory of size `len` starting from `addr` back to the kernel.
    unsafe fn return_memory(addr: NonNull<u8>, len: usize);

    /// Returns the virtual memory page size of the computer in bytes.
    unsafe fn page_size() -> usize;
}

/// Wrapper to calculate the computer's page size once per process.
#[inline]
pub(crate) fn page_size() -> usize {
    *PAGE_SIZE.get_or_init(|| unsafe { Kernel::page_size() })
}

/// The single block of memory a [`crate::Freelist`] manages.
///
/// It's requested straight from the kernel once, zeroed, and given back once when
/// dropped. It is never resized.
///
/// ```text
/// +--------------------+------------------------------+---------+
/// |  Node storage      |  User data                   | padding |
/// +--------------------+------------------------------+---------+
/// ^ start              ^ start + internal size          (page rounding)
/// ```
pub(crate) struct Arena {
    start: NonNull<u8>,
    /// Bytes usable by the allocator.
    len: usize,
    /// Bytes actually mapped, `len` rounded up to the page size.
    mapped: usize,
}

// The arena exclusively owns its mapping, moving it to another thread is fine.
unsafe impl Send for Arena {}

impl Arena {
    /// Requests `len` zeroed bytes from the kernel.
    pub fn request(len: usize) -> Result<Self> {
        let mapped = align(len, page_size()).ok_or(FreelistError::MemoryUnavailable { len })?;

        unsafe {
            let start = Kernel::request_memory(mapped)
                .ok_or(FreelistError::MemoryUnavailable { len: mapped })?;

            // Fresh anonymous pages are already zero on every platform we support,
            // but the arena contract doesn't depend on that.
            start.as_ptr().write_bytes(0, len);

            tracing::trace!(len, mapped, addr = ?start, "arena mapped");

            Ok(Self { start, len, mapped })
        }
    }

    #[inline]
    pub fn start(&self) -> NonNull<u8> {
        self.start
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        tracing::trace!(mapped = self.mapped, addr = ?self.start, "arena unmapped");

        unsafe { Kernel::return_memory(self.start, self.mapped) }
    }
}

#[cfg(unix)]
mod unix {
    use super::{Kernel, PlatformMemory};

    use libc::{mmap, munmap, off_t, size_t};

    use std::{
        os::raw::{c_int, c_void},
        ptr::NonNull,
    };

    impl PlatformMemory for Kernel {
        unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
            // mmap parameters.
            const ADDR: *mut c_void = std::ptr::null_mut::<c_void>();
            // Read-Write only memory.
            const PROT: c_int = libc::PROT_READ | libc::PROT_WRITE;
            const FLAGS: c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;
            const FD: c_int = -1;
            const OFFSET: off_t = 0;

            unsafe {
                let addr = mmap(ADDR, len as size_t, PROT, FLAGS, FD, OFFSET);

                if addr == libc::MAP_FAILED {
                    return None;
                }

                NonNull::new(addr.cast::<u8>())
            }
        }

        unsafe fn return_memory(addr: NonNull<u8>, len: usize) {
            unsafe {
                munmap(addr.as_ptr().cast::<c_void>(), len as size_t);
            }
        }

        unsafe fn page_size() -> usize {
            unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) as usize }
        }
    }
}

#[cfg(windows)]
mod windows {
    use std::{mem::MaybeUninit, os::raw::c_void, ptr::NonNull};

    use super::{Kernel, PlatformMemory};

    use windows::Win32::System::{Memory, SystemInformation};

    impl PlatformMemory for Kernel {
        unsafe fn request_memory(len: usize) -> Option<NonNull<u8>> {
            // Read-Write only.
            let protection = Memory::PAGE_READWRITE;

            let flags = Memory::MEM_RESERVE | Memory::MEM_COMMIT;

            unsafe {
                let addr = Memory::VirtualAlloc(None, len, flags, protection);

                NonNull::new(addr.cast())
            }
        }

        unsafe fn return_memory(addr: NonNull<u8>, _len: usize) {
            unsafe {
                let _ = Memory::VirtualFree(
                    addr.as_ptr().cast::<c_void>(),
                    0,
                    Memory::MEM_RELEASE,
                );
            }
        }

        unsafe fn page_size() -> usize {
            unsafe {
                let mut system_info = MaybeUninit::uninit();
                SystemInformation::GetSystemInfo(system_info.as_mut_ptr());

                system_info.assume_init().dwPageSize as usize
            }
        }
    }
}
