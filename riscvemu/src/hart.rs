//! The hart
//!
//! [`Hart`] gathers the architectural state a single hardware thread
//! of execution carries between instructions: CSRs, current
//! privilege, debug-mode state, the disable bitset, the pending
//! interrupt vector, latched external-signal levels, and the small
//! amount of simulator bookkeeping (exclusive-access tag, last-taken
//! exception, retired-instruction counters) that the trap engines
//! consult. Everything that would otherwise be a free function in a
//! procedural trap model is a method here, split across this module
//! and its siblings under [`crate::trap`].
//!
//! A `Hart` never owns its program counter; that lives with the
//! embedding [`crate::host::Host`], which is why every trap engine
//! method takes `&mut H` alongside `&mut self`.

use bitflags::bitflags;

use crate::config::{HartConfig, IsaExtensions};
use crate::csr::{Cause, CsrFile, InterruptBits};
use crate::host::Host;
use crate::mode::Privilege;
use crate::trap::exceptions::{self, ExceptionDescriptor};

bitflags! {
    /// Reasons a hart is not currently running. The hart runs iff
    /// this set is empty.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DisableReason: u8 {
        const RESET            = 1 << 0;
        const WFI               = 1 << 1;
        const DEBUG             = 1 << 2;
        const RESTART_PENDING   = 1 << 3;
    }
}

/// Latched levels of the external signal ports that are level- rather
/// than edge-triggered, plus the reset-sampled copy of `resethaltreq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetValue {
    pub reset: bool,
    pub nmi: bool,
    pub haltreq: bool,
    pub resethaltreq: bool,
    pub resethaltreq_sampled: bool,
}

/// Debug-mode entry/exit and reset fan-out, plus contributions to the
/// exception-enumeration API. Registered in `Hart::observers` and
/// notified in registration order.
pub trait TrapObserver {
    fn on_trap(&mut self, _cause: Cause, _mode: Privilege) {}
    fn on_eret(&mut self, _mode: Privilege) {}
    fn on_reset(&mut self) {}
    /// Additional exception descriptors this observer contributes to
    /// the lazily-built enumeration (empty by default).
    fn extra_exceptions(&self) -> Vec<ExceptionDescriptor> {
        Vec::new()
    }
}

/// A snapshot of everything needed to resume a hart exactly where it
/// left off, except the program counter (owned by the host) and the
/// step-timer deadline (owned by the host's timer facility).
#[derive(Debug, Clone)]
pub struct HartSnapshot {
    pub csr: CsrFile,
    pub privilege: Privilege,
    pub dm: bool,
    pub dm_stall: bool,
    pub disable: DisableReason,
    pub pending_words: Vec<u64>,
    pub swip: u32,
    pub net_value: NetValue,
    pub exclusive_tag: Option<u32>,
    pub af_error: bool,
    pub first_only_fault: bool,
    pub last_exception: Option<Cause>,
    pub base_instructions: u64,
    pub base_cycles: u64,
}

pub struct Hart<H: Host> {
    pub(crate) config: HartConfig,
    pub(crate) csr: CsrFile,
    pub(crate) privilege: Privilege,
    pub(crate) dm: bool,
    pub(crate) dm_stall: bool,
    pub(crate) disable: DisableReason,
    pub(crate) pending: InterruptBits,
    pub(crate) swip: u32,
    pub(crate) net_value: NetValue,
    pub(crate) exclusive_tag: Option<u32>,
    pub(crate) af_error: bool,
    pub(crate) first_only_fault: bool,
    pub(crate) last_exception: Option<Cause>,
    pub(crate) observers: Vec<Box<dyn TrapObserver>>,
    pub(crate) exception_cache: Option<Vec<ExceptionDescriptor>>,
    pub(crate) base_instructions: u64,
    pub(crate) base_cycles: u64,
    _host: std::marker::PhantomData<H>,
}

impl<H: Host> Hart<H> {
    pub fn new(config: HartConfig) -> Self {
        let interrupt_words = config.interrupt_words();
        let pending = InterruptBits::new(interrupt_words);
        let csr = CsrFile::new(interrupt_words);
        Hart {
            config,
            csr,
            privilege: Privilege::Machine,
            dm: false,
            dm_stall: false,
            disable: DisableReason::RESET,
            pending,
            swip: 0,
            net_value: NetValue::default(),
            exclusive_tag: None,
            af_error: false,
            first_only_fault: false,
            last_exception: None,
            observers: Vec::new(),
            exception_cache: None,
            base_instructions: 0,
            base_cycles: 0,
            _host: std::marker::PhantomData,
        }
    }

    pub fn register_observer(&mut self, observer: Box<dyn TrapObserver>) {
        self.observers.push(observer);
        self.exception_cache = None;
    }

    pub fn config(&self) -> &HartConfig {
        &self.config
    }

    pub fn csr(&self) -> &CsrFile {
        &self.csr
    }

    pub fn csr_mut(&mut self) -> &mut CsrFile {
        &mut self.csr
    }

    pub fn privilege(&self) -> Privilege {
        self.privilege
    }

    pub fn is_debug_mode(&self) -> bool {
        self.dm
    }

    pub fn disable(&self) -> DisableReason {
        self.disable
    }

    pub fn is_runnable(&self) -> bool {
        self.disable.is_empty()
    }

    pub fn last_exception(&self) -> Option<Cause> {
        self.last_exception
    }

    pub fn base_instructions(&self) -> u64 {
        self.base_instructions
    }

    pub fn base_cycles(&self) -> u64 {
        self.base_cycles
    }

    /// `mip` as visible through the CSR accessor: `ip[0] | swip`.
    pub fn mip(&self) -> u32 {
        self.csr.mip(self.pending.low_word(), self.swip)
    }

    /// The full set of exceptions and interrupts this hart can take:
    /// the architectural table filtered by configured ISA, every
    /// observer's [`TrapObserver::extra_exceptions`], and one entry
    /// per configured local-interrupt line. Built on first use and
    /// cached until the next [`Hart::register_observer`].
    pub fn implemented_exceptions(&mut self) -> &[ExceptionDescriptor] {
        if self.exception_cache.is_none() {
            self.exception_cache = Some(self.build_exception_cache());
        }
        self.exception_cache.as_deref().unwrap()
    }

    fn build_exception_cache(&self) -> Vec<ExceptionDescriptor> {
        let mut descriptors = exceptions::implemented(self.config.isa);
        for observer in &self.observers {
            descriptors.extend(observer.extra_exceptions());
        }
        for code in 16..self.config.interrupt_count() as u32 {
            descriptors.push(ExceptionDescriptor {
                name: "local-interrupt",
                code,
                is_interrupt: true,
                required_isa: IsaExtensions::empty(),
                description: "implementation-defined local interrupt line",
            });
        }
        descriptors
    }

    /// Look up the descriptor for `cause` among this hart's implemented
    /// exceptions, e.g. to describe [`Hart::last_exception`].
    pub fn exception_descriptor(&mut self, cause: Cause) -> Option<ExceptionDescriptor> {
        self.implemented_exceptions()
            .iter()
            .find(|entry| entry.code == cause.code && entry.is_interrupt == cause.is_interrupt)
            .copied()
    }

    pub(crate) fn set_disabled(&mut self, host: &mut H, reason: DisableReason) {
        let was_runnable = self.is_runnable();
        self.disable.insert(reason);
        if was_runnable {
            host.notify_halted(reason);
        }
    }

    pub(crate) fn clear_disabled(&mut self, host: &mut H, reason: DisableReason) {
        if !self.disable.intersects(reason) {
            return;
        }
        self.disable.remove(reason);
        if self.is_runnable() {
            host.notify_resumed(reason);
        }
    }

    pub(crate) fn notify_trap(&mut self, cause: Cause, mode: Privilege) {
        for observer in &mut self.observers {
            observer.on_trap(cause, mode);
        }
    }

    pub(crate) fn notify_eret(&mut self, mode: Privilege) {
        for observer in &mut self.observers {
            observer.on_eret(mode);
        }
    }

    pub(crate) fn notify_reset(&mut self) {
        for observer in &mut self.observers {
            observer.on_reset();
        }
    }

    pub fn snapshot(&self) -> HartSnapshot {
        HartSnapshot {
            csr: self.csr.clone(),
            privilege: self.privilege,
            dm: self.dm,
            dm_stall: self.dm_stall,
            disable: self.disable,
            pending_words: self.pending.words().to_vec(),
            swip: self.swip,
            net_value: self.net_value,
            exclusive_tag: self.exclusive_tag,
            af_error: self.af_error,
            first_only_fault: self.first_only_fault,
            last_exception: self.last_exception,
            base_instructions: self.base_instructions,
            base_cycles: self.base_cycles,
        }
    }

    /// Restore a snapshot and re-run interrupt arbitration so any
    /// trap that should fire on the next fetch is rescheduled.
    pub fn restore(&mut self, host: &mut H, snapshot: HartSnapshot) {
        self.csr = snapshot.csr;
        self.privilege = snapshot.privilege;
        self.dm = snapshot.dm;
        self.dm_stall = snapshot.dm_stall;
        self.disable = snapshot.disable;
        self.pending = InterruptBits::from_words(snapshot.pending_words);
        self.swip = snapshot.swip;
        self.net_value = snapshot.net_value;
        self.exclusive_tag = snapshot.exclusive_tag;
        self.af_error = snapshot.af_error;
        self.first_only_fault = snapshot.first_only_fault;
        self.last_exception = snapshot.last_exception;
        self.base_instructions = snapshot.base_instructions;
        self.base_cycles = snapshot.base_cycles;
        self.update_pending(host);
    }

    /// Entry point shared by every port write that touches the
    /// pending-interrupt vector or `swip`: recompute and re-arbitrate.
    pub(crate) fn update_pending(&mut self, host: &mut H) {
        if self.arbiter_has_pending_and_enabled() {
            host.post_synchronous_interrupt();
        }
        if self.pending.any_set() || self.swip != 0 {
            self.clear_disabled(host, DisableReason::WFI);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Host;

    pub struct TestHost {
        pub pc: u32,
        pub executable: bool,
        pub synchronous_interrupts: u32,
        pub step_timers_armed: u32,
    }

    impl TestHost {
        pub fn new() -> Self {
            TestHost {
                pc: 0,
                executable: true,
                synchronous_interrupts: 0,
                step_timers_armed: 0,
            }
        }
    }

    impl Host for TestHost {
        fn pc(&self) -> u32 {
            self.pc
        }
        fn set_pc(&mut self, pc: u32) {
            self.pc = pc;
        }
        fn is_executable(&self, _address: u32) -> bool {
            self.executable
        }
        fn resolve_translation_miss(&mut self, _address: u32) -> bool {
            self.executable
        }
        fn fetch_instruction_word(&self, _address: u32) -> u32 {
            0
        }
        fn post_synchronous_interrupt(&mut self) {
            self.synchronous_interrupts += 1;
        }
        fn arm_step_timer(&mut self) {
            self.step_timers_armed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::TestHost;
    use super::*;

    #[test]
    fn new_hart_starts_disabled_for_reset() {
        let hart: Hart<TestHost> = Hart::new(HartConfig::default());
        assert_eq!(hart.disable(), DisableReason::RESET);
        assert!(!hart.is_runnable());
        assert_eq!(hart.privilege(), Privilege::Machine);
    }

    #[test]
    fn implemented_exceptions_includes_local_interrupt_lines() {
        let mut config = HartConfig::default();
        config.local_interrupt_count = 2;
        let mut hart: Hart<TestHost> = Hart::new(config);

        let descriptors = hart.implemented_exceptions();
        assert!(descriptors.iter().any(|d| d.code == 16 && d.is_interrupt));
        assert!(descriptors.iter().any(|d| d.code == 17 && d.is_interrupt));
        assert!(descriptors.iter().any(|d| d.name == "ecall-from-u-mode"));
    }

    #[test]
    fn exception_descriptor_looks_up_last_exception() {
        let mut hart: Hart<TestHost> = Hart::new(HartConfig::default());
        let cause = Cause::exception(crate::trap::exceptions::codes::BREAKPOINT);

        let descriptor = hart.exception_descriptor(cause).unwrap();

        assert_eq!(descriptor.name, "breakpoint");
    }

    #[test]
    fn registering_an_observer_invalidates_the_exception_cache() {
        struct ExtraObserver;
        impl TrapObserver for ExtraObserver {
            fn extra_exceptions(&self) -> Vec<ExceptionDescriptor> {
                vec![ExceptionDescriptor {
                    name: "custom-fault",
                    code: 24,
                    is_interrupt: false,
                    required_isa: IsaExtensions::empty(),
                    description: "implementation-defined custom fault",
                }]
            }
        }

        let mut hart: Hart<TestHost> = Hart::new(HartConfig::default());
        assert!(!hart
            .implemented_exceptions()
            .iter()
            .any(|d| d.name == "custom-fault"));

        hart.register_observer(Box::new(ExtraObserver));

        assert!(hart
            .implemented_exceptions()
            .iter()
            .any(|d| d.name == "custom-fault"));
    }

    #[test]
    fn snapshot_restore_round_trips_pending_bits() {
        let mut hart: Hart<TestHost> = Hart::new(HartConfig::default());
        let mut host = TestHost::new();
        hart.clear_disabled(&mut host, DisableReason::RESET);
        hart.pending.set(7, true);
        hart.swip = 0x40;

        let snapshot = hart.snapshot();
        let mut restored: Hart<TestHost> = Hart::new(HartConfig::default());
        restored.restore(&mut host, snapshot);

        assert!(restored.pending.get(7));
        assert_eq!(restored.swip, 0x40);
        assert_eq!(restored.mip(), (1 << 7) | 0x40);
    }
}
