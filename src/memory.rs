//! Process memory usage query.

use tracing::debug;

/// Source of the current process memory usage, in bytes.
pub trait MemoryUsage: Send + Sync {
    fn bytes(&self) -> u64;
}

/// Reads the resident set size of this process from the OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessMemory;

impl MemoryUsage for ProcessMemory {
    fn bytes(&self) -> u64 {
        match resident_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(error = %e, "Memory usage query failed");
                0
            }
        }
    }
}

/// Resident pages from `/proc/self/statm` times the page size.
#[cfg(target_os = "linux")]
fn resident_bytes() -> std::io::Result<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm")?;
    let resident: u64 = statm
        .split_whitespace()
        .nth(1)
        .and_then(|field| field.parse().ok())
        .ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "malformed /proc/self/statm")
        })?;

    // SAFETY: sysconf has no memory-safety preconditions.
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page_size <= 0 {
        return Err(std::io::Error::last_os_error());
    }

    Ok(resident * page_size as u64)
}

/// Peak resident set size from `getrusage`. Reported in bytes on macOS and
/// kilobytes on the BSDs.
#[cfg(not(target_os = "linux"))]
fn resident_bytes() -> std::io::Result<u64> {
    // SAFETY: rusage is plain old data and getrusage only writes into it.
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }

    let max_rss = usage.ru_maxrss.max(0) as u64;
    if cfg!(target_os = "macos") {
        Ok(max_rss)
    } else {
        Ok(max_rss * 1024)
    }
}

/// Fixed memory figure for tests.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedMemory(pub u64);

#[cfg(test)]
impl MemoryUsage for FixedMemory {
    fn bytes(&self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_memory_is_nonzero() {
        // A running test binary always has resident pages.
        assert!(ProcessMemory.bytes() > 0);
    }

    #[test]
    fn test_fixed_memory() {
        assert_eq!(FixedMemory(4096).bytes(), 4096);
    }
}
