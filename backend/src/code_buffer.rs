use std::io;
use std::ptr;

/// Default code buffer size: 16 MiB.
pub const DEFAULT_CODE_BUF_SIZE: usize = 16 * 1024 * 1024;

/// JIT code buffer backed by mmap'd memory.
///
/// Holds the shared prologue/epilogue followed by compiled blocks.
/// Follows W^X discipline: the buffer is either writable or
/// executable, never both. Emitting while the buffer is executable
/// faults, so callers bracket code generation with
/// [`set_writable`](Self::set_writable) / [`set_executable`](Self::set_executable).
pub struct CodeBuffer {
    ptr: *mut u8,
    size: usize,
    offset: usize,
    executable: bool,
}

// SAFETY: CodeBuffer owns its mmap'd memory exclusively.
unsafe impl Send for CodeBuffer {}

impl CodeBuffer {
    /// Allocate a new code buffer of the given size (rounded up to page size).
    pub fn new(size: usize) -> io::Result<Self> {
        let page_size = page_size();
        let size = (size.max(1) + page_size - 1) & !(page_size - 1);

        // SAFETY: mmap with MAP_ANONYMOUS | MAP_PRIVATE, no file backing.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            ptr: ptr as *mut u8,
            size,
            offset: 0,
            executable: false,
        })
    }

    /// Current write offset.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Total capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.size
    }

    /// Remaining writable bytes.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.size - self.offset
    }

    /// Raw pointer to the start of the buffer.
    #[inline]
    pub fn base_ptr(&self) -> *const u8 {
        self.ptr as *const u8
    }

    /// Pointer at a given offset.
    #[inline]
    pub fn ptr_at(&self, offset: usize) -> *const u8 {
        assert!(offset <= self.size);
        // SAFETY: offset is within the mapping.
        unsafe { self.ptr.add(offset) as *const u8 }
    }

    #[inline]
    pub fn is_executable(&self) -> bool {
        self.executable
    }

    // -- Emit methods --

    #[inline]
    pub fn emit_u8(&mut self, val: u8) {
        assert!(self.offset < self.size, "code buffer overflow");
        unsafe { self.ptr.add(self.offset).write(val) };
        self.offset += 1;
    }

    #[inline]
    pub fn emit_u32(&mut self, val: u32) {
        assert!(self.offset + 4 <= self.size, "code buffer overflow");
        unsafe { (self.ptr.add(self.offset) as *mut u32).write_unaligned(val) };
        self.offset += 4;
    }

    #[inline]
    pub fn emit_u64(&mut self, val: u64) {
        assert!(self.offset + 8 <= self.size, "code buffer overflow");
        unsafe { (self.ptr.add(self.offset) as *mut u64).write_unaligned(val) };
        self.offset += 8;
    }

    /// Patch a u32 at the given offset (jump displacements, frame sizes).
    #[inline]
    pub fn patch_u32(&mut self, offset: usize, val: u32) {
        assert!(offset + 4 <= self.offset, "patch beyond emitted code");
        unsafe { (self.ptr.add(offset) as *mut u32).write_unaligned(val) };
    }

    /// Read a u32 at the given offset.
    #[inline]
    pub fn read_u32(&self, offset: usize) -> u32 {
        assert!(offset + 4 <= self.offset);
        unsafe { (self.ptr.add(offset) as *const u32).read_unaligned() }
    }

    // -- Permission management (W^X) --

    /// Make the buffer executable and non-writable.
    pub fn set_executable(&mut self) -> io::Result<()> {
        self.protect(libc::PROT_READ | libc::PROT_EXEC)?;
        self.executable = true;
        Ok(())
    }

    /// Make the buffer writable and non-executable.
    pub fn set_writable(&mut self) -> io::Result<()> {
        self.protect(libc::PROT_READ | libc::PROT_WRITE)?;
        self.executable = false;
        Ok(())
    }

    fn protect(&self, prot: libc::c_int) -> io::Result<()> {
        // SAFETY: ptr..ptr+size is our own mapping.
        let ret = unsafe { libc::mprotect(self.ptr as *mut libc::c_void, self.size, prot) };
        if ret != 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    /// Get the generated code as a byte slice (up to current offset).
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr..ptr+offset has been written.
        unsafe { std::slice::from_raw_parts(self.ptr, self.offset) }
    }

    /// Emitted bytes in `[start, end)`.
    pub fn code(&self, start: usize, end: usize) -> &[u8] {
        &self.as_slice()[start..end]
    }
}

impl Drop for CodeBuffer {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                libc::munmap(self.ptr as *mut libc::c_void, self.size);
            }
        }
    }
}

pub fn page_size() -> usize {
    // SAFETY: sysconf is always safe to call.
    unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize }
}
