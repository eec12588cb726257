//! The out-of-scope external collaborators named in `SPEC_FULL.md` §1:
//! OS thread-naming bindings and signal-based liveness probing. Grounded on
//! `examples/original_source/include/thread.hpp`'s `getThreadName`/
//! `setThreadName`/`isRunning` (via `pthread_getname_np`/
//! `pthread_setname_np`/`pthread_kill(.., 0)`) and `getCurrentPid` (via
//! `syscall(__NR_gettid)`). POSIX bindings via `libc`, mirroring
//! `examples/other_examples/55fe9719_Dicklesworthstone-glibc_rust__crates-frankenlibc-core-src-pthread-thread.rs.rs`
//! and `examples/other_examples/18d3bf69_shadow-shadow__src-lib-scheduler-src-pools-bounded.rs.rs`.
//!
//! Per `SPEC_FULL.md` §6, unsupported platforms degrade to no-ops
//! returning empty strings / best-effort `false` rather than failing.

/// Sets the OS-visible name of the calling thread, truncated to 15 bytes
/// plus a null terminator (the Linux `pthread_setname_np` limit). Returns
/// whether the underlying call succeeded; failure is best-effort and
/// non-fatal per the error taxonomy's OS-level-failure kind.
#[cfg(target_os = "linux")]
pub fn set_current_thread_name(name: &str) -> bool {
    let truncated: String = name.chars().take(15).collect();
    let Ok(c_name) = std::ffi::CString::new(truncated) else {
        return false;
    };
    // SAFETY: `c_name` is a valid NUL-terminated buffer for the lifetime of
    // this call; `pthread_setname_np` only reads it.
    unsafe { libc::pthread_setname_np(libc::pthread_self(), c_name.as_ptr()) == 0 }
}

#[cfg(not(target_os = "linux"))]
pub fn set_current_thread_name(_name: &str) -> bool {
    false
}

/// Reads back the OS-visible name of the calling thread; empty string if
/// unsupported or on failure.
#[cfg(target_os = "linux")]
pub fn get_current_thread_name() -> String {
    let mut buf = [0_u8; 16];
    // SAFETY: `buf` is exactly the 16-byte buffer `pthread_getname_np`
    // expects (15 chars + NUL) on Linux.
    let rc = unsafe {
        libc::pthread_getname_np(libc::pthread_self(), buf.as_mut_ptr().cast(), buf.len())
    };
    if rc != 0 {
        return String::new();
    }
    let nul = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..nul]).into_owned()
}

#[cfg(not(target_os = "linux"))]
pub fn get_current_thread_name() -> String {
    String::new()
}

/// The Linux kernel thread id of the calling thread (distinct from the
/// process-wide `pthread_t`), or `-1` where unsupported.
#[cfg(target_os = "linux")]
pub fn current_native_tid() -> i32 {
    // SAFETY: `SYS_gettid` takes no arguments and cannot fail.
    unsafe { libc::syscall(libc::SYS_gettid) as i32 }
}

#[cfg(not(target_os = "linux"))]
pub fn current_native_tid() -> i32 {
    -1
}

/// Probes whether a thread is still alive by sending it signal 0 (which
/// performs error checking without actually signaling), mirroring
/// `Thread::isRunning` in the source. `handle` is a `libc::pthread_t`
/// obtained from `std::os::unix::thread::JoinHandleExt::as_pthread_t`.
#[cfg(unix)]
pub fn is_thread_alive(handle: libc::pthread_t) -> bool {
    // SAFETY: signal 0 performs no action beyond existence/permission
    // checks; `handle` is a pthread_t obtained from a live or recently-live
    // `JoinHandle`.
    unsafe { libc::pthread_kill(handle, 0) == 0 }
}

#[cfg(not(unix))]
pub fn is_thread_alive(_handle: ()) -> bool {
    false
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_current_thread_name_round_trips() {
        assert!(set_current_thread_name("wp-test"));
        assert_eq!(get_current_thread_name(), "wp-test");
    }

    #[test]
    fn native_tid_is_positive_once_running() {
        assert!(current_native_tid() > 0);
    }
}
