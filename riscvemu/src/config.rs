//! Hart configuration
//!
//! Gathers the configuration inputs the rest of the crate is
//! parameterised over: which optional ISA extensions are implemented
//! (used to filter the exception table, `trap::exceptions`), how many
//! local interrupt lines exist (used to size the pending-interrupt
//! vector), the reset and NMI vector addresses, and a handful of
//! legacy/implementation-defined toggles called out in the design
//! notes. Loading this struct from a config file or command line is
//! the embedding host's job; this module only defines its shape.

use bitflags::bitflags;

bitflags! {
    /// Optional ISA extensions/modes implemented by a hart.
    ///
    /// Used by [`crate::trap::exceptions`] to filter the static
    /// exception table down to the set a particular configuration
    /// actually implements.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IsaExtensions: u32 {
        /// Integer multiply/divide.
        const M = 1 << 0;
        /// Atomics.
        const A = 1 << 1;
        /// Compressed instructions (affects ERET PC masking).
        const C = 1 << 2;
        /// Vector extension (affects fault-only-first handling).
        const V = 1 << 3;
        /// Supervisor mode is implemented.
        const S_MODE = 1 << 4;
        /// User mode is implemented.
        const U_MODE = 1 << 5;
    }
}

impl Default for IsaExtensions {
    /// RV32I with M/S/U all implemented, no extensions.
    fn default() -> Self {
        IsaExtensions::S_MODE | IsaExtensions::U_MODE
    }
}

/// Privileged-ISA version, for the handful of behaviours that changed
/// across versions (here: whether MRET/SRET clear `mstatus.MPRV` when
/// returning to a mode other than Machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrivilegedIsaVersion {
    /// Versions prior to the 1.10 ratification.
    Pre1_10,
    /// 1.10 and later.
    #[default]
    Post1_10,
}

/// What happens when the debug-mode controller needs to stop the hart
/// (`enterDM`): either a synchronous-interrupt notification is
/// posted to the host so its scheduler yields at the next fetch, or
/// the hart is halted outright via the disable bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugEntryPolicy {
    /// Post a synchronous interrupt; the host's fetch loop observes
    /// the debug-mode transition at its next call into the fetch gate.
    #[default]
    Interrupt,
    /// Halt the hart immediately via the disable bitset.
    Halt,
}

/// Static, per-hart configuration.
#[derive(Debug, Clone)]
pub struct HartConfig {
    /// Implemented optional extensions and modes.
    pub isa: IsaExtensions,
    /// Number of implementation-defined local interrupt lines, in
    /// addition to the 16 architectural causes. `ip[]` width grows
    /// with the local-interrupt count.
    pub local_interrupt_count: usize,
    /// PC value on reset.
    pub reset_address: u32,
    /// PC value on NMI entry.
    pub nmi_address: u32,
    /// Governs the MRET/SRET MPRV-clearing rule.
    pub privileged_isa_version: PrivilegedIsaVersion,
    /// If set, illegal-instruction `tval` is the raw instruction word
    /// rather than zero.
    pub tval_ii_code: bool,
    /// How the debug controller stops the hart on entry.
    pub debug_entry_policy: DebugEntryPolicy,
    /// Legacy custom-vectored-mode override, indexed by target mode
    /// (User, Supervisor, Hypervisor, Machine), consulted only when
    /// `xtvec.MODE == 0`. `None`
    /// means "no override configured".
    pub custom_mode_override: [Option<u32>; 4],
}

impl Default for HartConfig {
    fn default() -> Self {
        HartConfig {
            isa: IsaExtensions::default(),
            local_interrupt_count: 0,
            reset_address: 0,
            nmi_address: 0,
            privileged_isa_version: PrivilegedIsaVersion::default(),
            tval_ii_code: false,
            debug_entry_policy: DebugEntryPolicy::default(),
            custom_mode_override: [None; 4],
        }
    }
}

impl HartConfig {
    /// Total width of the pending-interrupt vector: 16 architectural
    /// causes plus the configured number of local lines.
    pub fn interrupt_count(&self) -> usize {
        16 + self.local_interrupt_count
    }

    /// Number of `u64` words needed to store the pending-interrupt
    /// vector.
    pub fn interrupt_words(&self) -> usize {
        self.interrupt_count().div_ceil(64)
    }

    /// The lowest implemented privilege mode: User if implemented,
    /// else Supervisor if implemented, else Machine.
    pub fn min_supported_mode(&self) -> crate::mode::Privilege {
        use crate::mode::Privilege;
        if self.isa.contains(IsaExtensions::U_MODE) {
            Privilege::User
        } else if self.isa.contains(IsaExtensions::S_MODE) {
            Privilege::Supervisor
        } else {
            Privilege::Machine
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_words_rounds_up() {
        let mut config = HartConfig::default();
        config.local_interrupt_count = 0;
        assert_eq!(config.interrupt_count(), 16);
        assert_eq!(config.interrupt_words(), 1);

        config.local_interrupt_count = 49;
        assert_eq!(config.interrupt_count(), 65);
        assert_eq!(config.interrupt_words(), 2);
    }

    #[test]
    fn min_supported_mode_prefers_user() {
        let config = HartConfig::default();
        assert_eq!(config.min_supported_mode(), crate::mode::Privilege::User);

        let mut m_only = HartConfig::default();
        m_only.isa = IsaExtensions::empty();
        assert_eq!(m_only.min_supported_mode(), crate::mode::Privilege::Machine);
    }
}
