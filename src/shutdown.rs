//! Process-wide cancellation flag, polled by run loops between steps.

use std::sync::atomic::{AtomicBool, Ordering};

static QUIT_REQUESTED: AtomicBool = AtomicBool::new(false);

pub fn request_quit() {
    QUIT_REQUESTED.store(true, Ordering::SeqCst);
}

/// The flag itself, for loops that take an explicit cancellation token.
pub fn flag() -> &'static AtomicBool {
    &QUIT_REQUESTED
}

#[cfg(unix)]
pub fn install() {
    use std::os::raw::c_int;
    const SIGINT: c_int = 2;
    const SIGTERM: c_int = 15;

    extern "C" fn handler(_sig: c_int) {
        // Only an atomic store is safe here.
        request_quit();
    }

    extern "C" {
        fn signal(sig: c_int, handler: extern "C" fn(c_int)) -> usize;
    }

    unsafe {
        let _ = signal(SIGINT, handler);
        let _ = signal(SIGTERM, handler);
    }
}

#[cfg(target_os = "windows")]
pub fn install() {
    type HandlerRoutine = extern "system" fn(u32) -> i32;
    extern "system" {
        fn SetConsoleCtrlHandler(handler: Option<HandlerRoutine>, add: i32) -> i32;
    }
    extern "system" fn handler(_ctrl_type: u32) -> i32 {
        request_quit();
        1
    }
    unsafe {
        let _ = SetConsoleCtrlHandler(Some(handler), 1);
    }
}

#[cfg(not(any(unix, target_os = "windows")))]
pub fn install() {}
