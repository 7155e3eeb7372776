//! Host interface
//!
//! This trait is the execution environment that the trap-and-interrupt
//! core runs inside: the "host simulation kernel" named as
//! out-of-scope in the crate's top-level documentation. Implementing
//! this trait means providing program-counter storage, memory
//! executability queries, virtual-memory miss resolution, and a
//! one-shot timer — everything the fetch gate and debug controller
//! need to reach outside the hart's own architectural state.
//!
//! Modelled on the execution-environment-interface trait pattern used
//! elsewhere in this codebase for the unprivileged architecture: the
//! privileged core is generic over its host rather than calling free
//! functions or a global.

use crate::hart::DisableReason;

/// Execution environment interface consumed by [`crate::hart::Hart`].
pub trait Host {
    /// Read the current program counter.
    fn pc(&self) -> u32;

    /// Set the program counter.
    fn set_pc(&mut self, pc: u32);

    /// Is the byte at `address` executable right now? A `false`
    /// result causes the fetch gate to first ask
    /// [`Host::resolve_translation_miss`] before deciding whether to
    /// raise `InstructionAccessFault`.
    fn is_executable(&self, address: u32) -> bool;

    /// Attempt to materialize a translation for `address` (page-table
    /// walk, TLB fill, or similar). Returns whether `address` is
    /// executable after the attempt. A host with no virtual memory at
    /// all can implement this as `self.is_executable(address)`.
    fn resolve_translation_miss(&mut self, address: u32) -> bool;

    /// Read the raw instruction word at `address`, used only to
    /// compute `tval` for faults that report the trapping instruction
    /// for exceptions that report the trapping instruction.
    fn fetch_instruction_word(&self, address: u32) -> u32;

    /// Schedule a synchronous-interrupt notification so the host's
    /// fetch loop calls [`crate::hart::Hart::fetch_gate`] again at
    /// (or immediately after) the next suspension point.
    fn post_synchronous_interrupt(&mut self);

    /// Arm a one-shot timer that fires after exactly one retired
    /// instruction, to implement single-stepping. The host
    /// calls [`crate::hart::Hart::step_timer_fired`] when it expires.
    fn arm_step_timer(&mut self);

    /// Notify the host that the hart became non-runnable for
    /// `reason`. Default is a no-op; hosts that schedule multiple
    /// harts can use this to yield the simulation thread.
    fn notify_halted(&mut self, reason: DisableReason) {
        let _ = reason;
    }

    /// Notify the host that `reason` no longer disables the hart.
    /// Default is a no-op.
    fn notify_resumed(&mut self, reason: DisableReason) {
        let _ = reason;
    }
}
