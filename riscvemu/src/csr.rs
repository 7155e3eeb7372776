//! Control and status registers
//!
//! Typed storage for the privileged CSR fields that make up a hart's
//! architectural state: `mstatus`, the per-mode trap CSRs
//! (`{m,s,u}{cause,epc,tval,tvec}`), the delegation registers, the
//! external-interrupt-ID latches, `dcsr`/`dpc`, and `vstart`.
//!
//! This is the "CSR Accessor" component: the trap engines read and
//! write these fields directly, and never see a raw 12-bit CSR
//! address space or bit-packed register image. Packing these fields
//! into the actual `csrrw`-addressable register file is a concern of
//! the (out-of-scope) instruction decoder/executor that embeds this
//! crate.

use crate::mode::Privilege;

/// Errors raised by CSR writes that validate a caller-supplied value,
/// as opposed to internal invariant violations (which panic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TvecError {
    #[error("trap-vector base {base:#x} is not 4-byte aligned")]
    Misaligned { base: u32 },
}

/// High bit of `mcause`/`scause`/`ucause` distinguishing interrupts
/// from synchronous exceptions.
pub const INT_BIT: u32 = 0x8000_0000;

/// The cause of a trap: whether it is an interrupt, and the
/// architectural exception/interrupt code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cause {
    pub is_interrupt: bool,
    pub code: u32,
}

impl Cause {
    pub fn exception(code: u32) -> Self {
        Cause {
            is_interrupt: false,
            code,
        }
    }

    pub fn interrupt(code: u32) -> Self {
        Cause {
            is_interrupt: true,
            code,
        }
    }

    /// The raw value stored in `xcause`: the interrupt bit or-ed with
    /// the exception code.
    pub fn raw(&self) -> u32 {
        (if self.is_interrupt { INT_BIT } else { 0 }) | self.code
    }
}

/// A fixed-width bit vector used for the pending-interrupt vector
/// (`ip[]`) and the machine interrupt-enable register (`mie`), both
/// of which grow with the configured local-interrupt count. Sized
/// once at configuration time and never resized afterward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterruptBits {
    words: Vec<u64>,
}

impl InterruptBits {
    pub fn new(word_count: usize) -> Self {
        InterruptBits {
            words: vec![0; word_count.max(1)],
        }
    }

    pub fn get(&self, index: usize) -> bool {
        match self.words.get(index / 64) {
            Some(word) => (word >> (index % 64)) & 1 != 0,
            None => false,
        }
    }

    pub fn set(&mut self, index: usize, value: bool) {
        if let Some(word) = self.words.get_mut(index / 64) {
            if value {
                *word |= 1 << (index % 64);
            } else {
                *word &= !(1 << (index % 64));
            }
        }
    }

    /// The low 32 bits, i.e. the architectural `mip`/`mie` view before
    /// the software-pending shadow is or-ed in.
    pub fn low_word(&self) -> u32 {
        self.words.first().copied().unwrap_or(0) as u32
    }

    pub fn any_set(&self) -> bool {
        self.words.iter().any(|w| *w != 0)
    }

    /// Indices of all set bits, ascending.
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        let words = &self.words;
        (0..words.len() * 64).filter(move |i| (words[i / 64] >> (i % 64)) & 1 != 0)
    }

    /// Persisted form, for [`crate::hart::HartSnapshot`]: `ceil(numInterrupts / 64)`
    /// 64-bit words.
    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn from_words(words: Vec<u64>) -> Self {
        InterruptBits { words }
    }
}

/// `mtvec`/`stvec`/`utvec` mode field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TvecMode {
    Direct,
    Vectored,
}

/// A trap-vector-base-address register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tvec {
    pub base: u32,
    pub mode: TvecMode,
}

impl Default for Tvec {
    fn default() -> Self {
        Tvec {
            base: 0,
            mode: TvecMode::Direct,
        }
    }
}

/// Debug-mode entry cause, stored in `dcsr.cause`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugCause {
    #[default]
    None,
    Haltreq,
    Step,
    Ebreak,
    Resethaltreq,
}

/// `dcsr` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dcsr {
    pub prv: Privilege,
    pub cause: DebugCause,
    pub step: bool,
    pub nmip: bool,
    pub ebreak_u: bool,
    pub ebreak_s: bool,
    pub ebreak_m: bool,
    pub stopcount: bool,
}

impl Default for Dcsr {
    fn default() -> Self {
        Dcsr {
            prv: Privilege::Machine,
            cause: DebugCause::None,
            step: false,
            nmip: false,
            ebreak_u: false,
            ebreak_s: false,
            ebreak_m: false,
            stopcount: false,
        }
    }
}

/// `mstatus` fields relevant to trap entry/return. `spp` is only
/// meaningful when Supervisor is implemented; User has no `upp`
/// because there is nothing below it to record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mstatus {
    pub mie: bool,
    pub sie: bool,
    pub uie: bool,
    pub mpie: bool,
    pub spie: bool,
    pub upie: bool,
    pub mpp: Privilege,
    pub spp: Privilege,
    pub mprv: bool,
}

/// Per-privilege-mode trap registers: `{cause, epc, tval, tvec}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrapCsrs {
    pub cause: Cause,
    pub epc: u32,
    pub tval: u32,
    pub tvec: Tvec,
}

/// All CSR state the trap-and-interrupt core reads and writes.
#[derive(Debug, Clone)]
pub struct CsrFile {
    pub mstatus: Mstatus,
    /// Machine interrupt-enable register (`mie`). `sie`/`uie` as CSRs
    /// are masked views of this register gated by `mideleg`/`sideleg`
    /// in real hardware; this core only ever consults the canonical
    /// register plus the delegation masks, so no separate
    /// storage is kept for the per-mode views.
    pub mie: InterruptBits,
    pub m: TrapCsrs,
    pub s: TrapCsrs,
    pub u: TrapCsrs,
    pub medeleg: u32,
    pub mideleg: u32,
    pub sedeleg: u32,
    pub sideleg: u32,
    /// External-interrupt claim ID latched per target mode, consumed
    /// by trap entry when reporting an external-interrupt cause
    /// Indexed by [`Privilege`].
    pub ext_int_id: [u32; 4],
    pub dcsr: Dcsr,
    pub dpc: u32,
    pub vstart: u32,
    /// `mcountinhibit.IR`: when set, trap entry does not increment the
    /// retired-instruction counter.
    pub mcountinhibit_ir: bool,
}

impl CsrFile {
    pub fn new(interrupt_words: usize) -> Self {
        CsrFile {
            mstatus: Mstatus::default(),
            mie: InterruptBits::new(interrupt_words),
            m: TrapCsrs::default(),
            s: TrapCsrs::default(),
            u: TrapCsrs::default(),
            medeleg: 0,
            mideleg: 0,
            sedeleg: 0,
            sideleg: 0,
            ext_int_id: [0; 4],
            dcsr: Dcsr::default(),
            mcountinhibit_ir: false,
            dpc: 0,
            vstart: 0,
        }
    }

    fn trap_csrs(&self, mode: Privilege) -> &TrapCsrs {
        match mode {
            Privilege::User => &self.u,
            Privilege::Supervisor => &self.s,
            Privilege::Machine => &self.m,
            Privilege::Hypervisor => unreachable!(
                "delegation never selects Hypervisor as a trap target"
            ),
        }
    }

    fn trap_csrs_mut(&mut self, mode: Privilege) -> &mut TrapCsrs {
        match mode {
            Privilege::User => &mut self.u,
            Privilege::Supervisor => &mut self.s,
            Privilege::Machine => &mut self.m,
            Privilege::Hypervisor => unreachable!(
                "delegation never selects Hypervisor as a trap target"
            ),
        }
    }

    pub fn cause(&self, mode: Privilege) -> Cause {
        self.trap_csrs(mode).cause
    }

    pub fn set_cause(&mut self, mode: Privilege, cause: Cause) {
        self.trap_csrs_mut(mode).cause = cause;
    }

    pub fn epc(&self, mode: Privilege) -> u32 {
        self.trap_csrs(mode).epc
    }

    pub fn set_epc(&mut self, mode: Privilege, epc: u32) {
        self.trap_csrs_mut(mode).epc = epc;
    }

    pub fn tval(&self, mode: Privilege) -> u32 {
        self.trap_csrs(mode).tval
    }

    pub fn set_tval(&mut self, mode: Privilege, tval: u32) {
        self.trap_csrs_mut(mode).tval = tval;
    }

    pub fn tvec(&self, mode: Privilege) -> Tvec {
        self.trap_csrs(mode).tvec
    }

    /// Write `xtvec` for `mode`, rejecting a `base` that is not 4-byte
    /// aligned (the low two bits of `BASE` are defined to be zero).
    /// This is the one CSR write in this crate that can fail at the
    /// point the caller supplies it, rather than being guarded by an
    /// internal invariant.
    pub fn set_tvec(&mut self, mode: Privilege, base: u32, tvec_mode: TvecMode) -> Result<(), TvecError> {
        if base & 0b11 != 0 {
            return Err(TvecError::Misaligned { base });
        }
        self.trap_csrs_mut(mode).tvec = Tvec { base, mode: tvec_mode };
        Ok(())
    }

    /// Global interrupt-enable bit (`xIE`) for `mode`.
    pub fn ie(&self, mode: Privilege) -> bool {
        match mode {
            Privilege::User => self.mstatus.uie,
            Privilege::Supervisor => self.mstatus.sie,
            Privilege::Machine => self.mstatus.mie,
            Privilege::Hypervisor => unreachable!("no Hypervisor mstatus fields (out of scope)"),
        }
    }

    pub fn set_ie(&mut self, mode: Privilege, value: bool) {
        match mode {
            Privilege::User => self.mstatus.uie = value,
            Privilege::Supervisor => self.mstatus.sie = value,
            Privilege::Machine => self.mstatus.mie = value,
            Privilege::Hypervisor => unreachable!("no Hypervisor mstatus fields (out of scope)"),
        }
    }

    /// Previous interrupt-enable bit (`xPIE`) for `mode`.
    pub fn pie(&self, mode: Privilege) -> bool {
        match mode {
            Privilege::User => self.mstatus.upie,
            Privilege::Supervisor => self.mstatus.spie,
            Privilege::Machine => self.mstatus.mpie,
            Privilege::Hypervisor => unreachable!("no Hypervisor mstatus fields (out of scope)"),
        }
    }

    pub fn set_pie(&mut self, mode: Privilege, value: bool) {
        match mode {
            Privilege::User => self.mstatus.upie = value,
            Privilege::Supervisor => self.mstatus.spie = value,
            Privilege::Machine => self.mstatus.mpie = value,
            Privilege::Hypervisor => unreachable!("no Hypervisor mstatus fields (out of scope)"),
        }
    }

    /// Previous-privilege field (`xPP`) for `mode`; only Supervisor
    /// and Machine have one: on trap entry to S/M, `xPP` additionally
    /// records the previous mode.
    pub fn pp(&self, mode: Privilege) -> Privilege {
        match mode {
            Privilege::Supervisor => self.mstatus.spp,
            Privilege::Machine => self.mstatus.mpp,
            _ => unreachable!("only S and M record a previous-privilege field"),
        }
    }

    pub fn set_pp(&mut self, mode: Privilege, value: Privilege) {
        match mode {
            Privilege::Supervisor => self.mstatus.spp = value,
            Privilege::Machine => self.mstatus.mpp = value,
            _ => unreachable!("only S and M record a previous-privilege field"),
        }
    }

    /// `mip` as visible through this accessor: `ip[0] | swip`
    /// The canonical pending vector `ip[]` lives on
    /// [`crate::hart::Hart`] because it is written directly by port
    /// callbacks, not by CSR writes.
    pub fn mip(&self, ip_low_word: u32, swip: u32) -> u32 {
        ip_low_word | swip
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_bits_survive_word_boundary() {
        let mut bits = InterruptBits::new(2);
        bits.set(0, true);
        bits.set(63, true);
        bits.set(64, true);
        assert!(bits.get(0));
        assert!(bits.get(63));
        assert!(bits.get(64));
        assert!(!bits.get(65));
        assert_eq!(bits.low_word(), 1u32);
    }

    #[test]
    fn interrupt_bits_iter_set_is_ascending() {
        let mut bits = InterruptBits::new(1);
        bits.set(3, true);
        bits.set(11, true);
        bits.set(7, true);
        assert_eq!(bits.iter_set().collect::<Vec<_>>(), vec![3, 7, 11]);
    }

    #[test]
    fn cause_raw_sets_interrupt_bit() {
        assert_eq!(Cause::exception(2).raw(), 2);
        assert_eq!(Cause::interrupt(7).raw(), INT_BIT | 7);
    }

    #[test]
    fn mip_combines_ip_and_swip() {
        let csr = CsrFile::new(1);
        assert_eq!(csr.mip(0b0010, 0b0100), 0b0110);
    }

    #[test]
    fn set_tvec_rejects_misaligned_base() {
        let mut csr = CsrFile::new(1);
        let err = csr.set_tvec(Privilege::Machine, 0x101, TvecMode::Direct).unwrap_err();
        assert_eq!(err, TvecError::Misaligned { base: 0x101 });
    }

    #[test]
    fn set_tvec_accepts_aligned_base() {
        let mut csr = CsrFile::new(1);
        csr.set_tvec(Privilege::Supervisor, 0x8000, TvecMode::Vectored).unwrap();
        let tvec = csr.tvec(Privilege::Supervisor);
        assert_eq!(tvec.base, 0x8000);
        assert_eq!(tvec.mode, TvecMode::Vectored);
    }
}
