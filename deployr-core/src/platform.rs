//! Per-OS process supervision details.
//!
//! Hosts differ in how arguments reach the imaging utility and in how a
//! running utility, along with any helper processes it started, is stopped.
//! The default location of the utility differs as well. The Unix and Windows submodules export the same functions and the
//! matching one is selected with `#[cfg]`, so callers never branch on the OS.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use self::unix::*;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use self::windows::*;
