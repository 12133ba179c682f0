//! Interrupt (SIGINT) handling for the interpreter and its children.
//!
//! The interpreter installs a handler that only latches the interrupt; the
//! read loop consumes the latch before each read. Every spawned child puts the
//! default disposition back right after fork, so an interrupt terminates the
//! child and never the interpreter.

use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::atomic::{AtomicBool, Ordering};

/// Written only by [`latch_interrupt`], read only through [`Interrupts`].
static PENDING: AtomicBool = AtomicBool::new(false);

extern "C" fn latch_interrupt(_: libc::c_int) {
    PENDING.store(true, Ordering::SeqCst);
}

/// Handle to the interpreter's interrupt state.
///
/// Only one value exists per interpreter; it is the sole reader of the
/// latched flag.
#[derive(Debug)]
pub struct Interrupts {
    pending: &'static AtomicBool,
}

impl Interrupts {
    /// Installs the latching SIGINT handler for the current process.
    ///
    /// `SA_RESTART` is left out so that a blocking read is woken up by the
    /// interrupt instead of silently resumed.
    pub fn install() -> nix::Result<Self> {
        let action = SigAction::new(
            SigHandler::Handler(latch_interrupt),
            SaFlags::empty(),
            SigSet::empty(),
        );
        // SAFETY: the handler only performs an atomic store.
        unsafe { signal::sigaction(Signal::SIGINT, &action) }?;
        log::debug!("SIGINT handler installed");
        Ok(Self { pending: &PENDING })
    }

    /// Returns whether an interrupt arrived since the last call, clearing it.
    pub fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::SeqCst)
    }
}

/// Puts SIGINT back to its default disposition. Called by each child between
/// fork and exec.
pub fn restore_default() -> nix::Result<()> {
    // SAFETY: SIG_DFL installs no Rust code as a handler.
    unsafe { signal::signal(Signal::SIGINT, SigHandler::SigDfl) }.map(drop)
}
