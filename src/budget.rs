//! Adaptive memory and thread budgeting from host capacity
//!
//! The repair engine needs a memory ceiling and a thread count up front. Both
//! are derived fresh for every invocation from read-only host queries, with
//! conservative clamps so the engine never under- or over-commits, and with
//! documented fallbacks when the host refuses to answer. Detection failures
//! never surface as errors.

use tracing::debug;

/// Lower clamp for the derived memory limit: 16 MiB
pub const MIN_MEMORY_LIMIT: u64 = 16 * 1024 * 1024;

/// Upper clamp for the derived memory limit: 2048 MiB
pub const MAX_MEMORY_LIMIT: u64 = 2048 * 1024 * 1024;

/// Assumed total when physical memory cannot be detected: 256 MiB
const FALLBACK_TOTAL_MEMORY: u64 = 256 * 1024 * 1024;

/// Thread count used when hardware concurrency cannot be detected
const FALLBACK_THREADS: u32 = 2;

/// Read-only host capacity queries
///
/// The derivation in [`ResourceBudget::detect`] is platform-independent;
/// implementations only answer two questions about the host. Failures are
/// reported through the return values, never as errors.
pub trait HostInfo {
    /// Total physical memory in bytes, or `None` when undetectable
    fn total_physical_memory(&self) -> Option<u64>;

    /// Number of hardware execution units, or 0 when undetectable
    fn hardware_concurrency(&self) -> u32;
}

/// Host queries backed by the operating system
///
/// Memory detection uses `sysconf` on Linux, `sysctl` on macOS, and
/// `GlobalMemoryStatusEx` on Windows; concurrency detection uses
/// [`std::thread::available_parallelism`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl HostInfo for SystemHost {
    fn total_physical_memory(&self) -> Option<u64> {
        total_physical_memory()
    }

    fn hardware_concurrency(&self) -> u32 {
        std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(0)
    }
}

/// Memory and thread limits for one engine invocation
///
/// Derived once per invocation and immutable afterward; never persisted
/// across invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceBudget {
    /// Memory ceiling handed to the engine, always within
    /// [`MIN_MEMORY_LIMIT`]`..=`[`MAX_MEMORY_LIMIT`] and therefore never zero
    pub memory_limit_bytes: u64,
    /// Worker thread count, never zero
    pub thread_count: u32,
}

impl ResourceBudget {
    /// Derive a fresh budget from host capacity
    ///
    /// Memory: half of detected physical memory, clamped to
    /// [`MIN_MEMORY_LIMIT`]`..=`[`MAX_MEMORY_LIMIT`]; a 256 MiB total is
    /// assumed when detection fails, which after halving still sits above the
    /// floor. Threads: detected hardware concurrency, 2 when undetectable.
    /// A zero memory limit is an invalid engine parameter, so the floor is
    /// applied unconditionally.
    pub fn detect(host: &dyn HostInfo) -> Self {
        let total = host
            .total_physical_memory()
            .unwrap_or(FALLBACK_TOTAL_MEMORY);
        let memory_limit_bytes = (total / 2).clamp(MIN_MEMORY_LIMIT, MAX_MEMORY_LIMIT);

        let detected = host.hardware_concurrency();
        let thread_count = if detected == 0 {
            FALLBACK_THREADS
        } else {
            detected
        };

        debug!(memory_limit_bytes, thread_count, "derived resource budget");
        Self {
            memory_limit_bytes,
            thread_count,
        }
    }
}

#[cfg(all(unix, not(target_os = "macos")))]
fn total_physical_memory() -> Option<u64> {
    // SAFETY: sysconf takes no pointers; a negative return signals an
    // unsupported or failed query and is handled below.
    let (pages, page_size) = unsafe {
        (
            libc::sysconf(libc::_SC_PHYS_PAGES),
            libc::sysconf(libc::_SC_PAGE_SIZE),
        )
    };
    if pages > 0 && page_size > 0 {
        Some(pages as u64 * page_size as u64)
    } else {
        None
    }
}

#[cfg(target_os = "macos")]
fn total_physical_memory() -> Option<u64> {
    let mut mib = [libc::CTL_HW, libc::HW_MEMSIZE];
    let mut total: u64 = 0;
    let mut len = std::mem::size_of::<u64>();

    // SAFETY: mib and total are valid for the duration of the call and len
    // matches the size of the output buffer.
    let rc = unsafe {
        libc::sysctl(
            mib.as_mut_ptr(),
            mib.len() as libc::c_uint,
            &mut total as *mut u64 as *mut libc::c_void,
            &mut len,
            std::ptr::null_mut(),
            0,
        )
    };
    (rc == 0 && total > 0).then_some(total)
}

#[cfg(windows)]
fn total_physical_memory() -> Option<u64> {
    use winapi::um::sysinfoapi::{GlobalMemoryStatusEx, MEMORYSTATUSEX};

    // SAFETY: status is zero-initialized with dwLength set as the API
    // requires, and is only read after a successful call.
    unsafe {
        let mut status: MEMORYSTATUSEX = std::mem::zeroed();
        status.dwLength = std::mem::size_of::<MEMORYSTATUSEX>() as u32;
        if GlobalMemoryStatusEx(&mut status) == 0 {
            return None;
        }
        (status.ullTotalPhys > 0).then_some(status.ullTotalPhys)
    }
}

#[cfg(not(any(unix, windows)))]
fn total_physical_memory() -> Option<u64> {
    None
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    /// A host with scripted answers
    struct FakeHost {
        memory: Option<u64>,
        cpus: u32,
    }

    impl HostInfo for FakeHost {
        fn total_physical_memory(&self) -> Option<u64> {
            self.memory
        }

        fn hardware_concurrency(&self) -> u32 {
            self.cpus
        }
    }

    const GIB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn memory_limit_is_half_of_detected_total() {
        let budget = ResourceBudget::detect(&FakeHost {
            memory: Some(2 * GIB),
            cpus: 8,
        });
        assert_eq!(budget.memory_limit_bytes, GIB);
        assert_eq!(budget.thread_count, 8);
    }

    #[test]
    fn tiny_hosts_are_clamped_to_the_floor() {
        let budget = ResourceBudget::detect(&FakeHost {
            memory: Some(8 * 1024 * 1024),
            cpus: 1,
        });
        assert_eq!(budget.memory_limit_bytes, MIN_MEMORY_LIMIT);
    }

    #[test]
    fn huge_hosts_are_clamped_to_the_ceiling() {
        let budget = ResourceBudget::detect(&FakeHost {
            memory: Some(64 * GIB),
            cpus: 32,
        });
        assert_eq!(budget.memory_limit_bytes, MAX_MEMORY_LIMIT);
    }

    #[test]
    fn undetectable_memory_falls_back_to_256_mib_total() {
        let budget = ResourceBudget::detect(&FakeHost {
            memory: None,
            cpus: 4,
        });
        assert_eq!(budget.memory_limit_bytes, 128 * 1024 * 1024);
    }

    #[test]
    fn zero_reported_memory_is_floored_never_zero() {
        let budget = ResourceBudget::detect(&FakeHost {
            memory: Some(0),
            cpus: 4,
        });
        assert_eq!(budget.memory_limit_bytes, MIN_MEMORY_LIMIT);
    }

    #[test]
    fn undetectable_concurrency_falls_back_to_two() {
        let budget = ResourceBudget::detect(&FakeHost {
            memory: Some(GIB),
            cpus: 0,
        });
        assert_eq!(budget.thread_count, 2);
    }

    #[test]
    fn derived_budget_always_sits_inside_the_clamp_range() {
        let totals = [
            0,
            1,
            MIN_MEMORY_LIMIT - 1,
            MIN_MEMORY_LIMIT,
            256 * 1024 * 1024,
            GIB,
            4 * GIB,
            u64::MAX,
        ];
        for total in totals {
            let budget = ResourceBudget::detect(&FakeHost {
                memory: Some(total),
                cpus: 1,
            });
            assert!(
                (MIN_MEMORY_LIMIT..=MAX_MEMORY_LIMIT).contains(&budget.memory_limit_bytes),
                "total {total} produced out-of-range limit {}",
                budget.memory_limit_bytes
            );
            assert!(budget.thread_count > 0);
        }
    }

    #[test]
    fn system_host_returns_usable_values() {
        let host = SystemHost;
        // On any host this test runs on, the fallback path still yields a
        // valid budget; only the invariants are asserted.
        let budget = ResourceBudget::detect(&host);
        assert!(budget.memory_limit_bytes >= MIN_MEMORY_LIMIT);
        assert!(budget.memory_limit_bytes <= MAX_MEMORY_LIMIT);
        assert!(budget.thread_count > 0);
    }
}
