//! Exception table
//!
//! A static, append-only list of descriptors covering the 14 standard
//! synchronous exceptions and 9 standard interrupts defined by the
//! Privileged Architecture (U/S/M x {software, timer, external}).
//! Entries whose `required_isa` bits are missing from a hart's
//! configured ISA are filtered out by [`implemented`] when building
//! the exception-enumeration API.

use crate::config::IsaExtensions;

/// Architectural exception and interrupt codes. Exception and
/// interrupt code spaces overlap (e.g. `8` is both U-mode ECALL and
/// U-External interrupt); [`crate::csr::Cause::is_interrupt`]
/// disambiguates.
pub mod codes {
    pub const INSTRUCTION_ADDR_MISALIGNED: u32 = 0;
    pub const INSTRUCTION_ACCESS_FAULT: u32 = 1;
    pub const ILLEGAL_INSTRUCTION: u32 = 2;
    pub const BREAKPOINT: u32 = 3;
    pub const LOAD_ADDR_MISALIGNED: u32 = 4;
    pub const LOAD_ACCESS_FAULT: u32 = 5;
    pub const STORE_AMO_ADDR_MISALIGNED: u32 = 6;
    pub const STORE_AMO_ACCESS_FAULT: u32 = 7;
    pub const ECALL_U: u32 = 8;
    pub const ECALL_S: u32 = 9;
    pub const ECALL_M: u32 = 11;
    pub const INSTRUCTION_PAGE_FAULT: u32 = 12;
    pub const LOAD_PAGE_FAULT: u32 = 13;
    pub const STORE_AMO_PAGE_FAULT: u32 = 15;

    pub const U_SOFTWARE_INTERRUPT: u32 = 0;
    pub const S_SOFTWARE_INTERRUPT: u32 = 1;
    pub const M_SOFTWARE_INTERRUPT: u32 = 3;
    pub const U_TIMER_INTERRUPT: u32 = 4;
    pub const S_TIMER_INTERRUPT: u32 = 5;
    pub const M_TIMER_INTERRUPT: u32 = 7;
    pub const U_EXTERNAL_INTERRUPT: u32 = 8;
    pub const S_EXTERNAL_INTERRUPT: u32 = 9;
    pub const M_EXTERNAL_INTERRUPT: u32 = 11;

    /// Whether `code` (a synchronous-exception code) is one of the
    /// ECALL variants or EBREAK, which retired-instruction accounting
    /// treats specially.
    pub fn is_ecall_or_ebreak(code: u32) -> bool {
        matches!(code, BREAKPOINT | ECALL_U | ECALL_S | 10 | ECALL_M)
    }

    /// Whether `code` (an interrupt code) is one of the three
    /// external-interrupt lines.
    pub fn is_external_interrupt(code: u32) -> bool {
        matches!(
            code,
            U_EXTERNAL_INTERRUPT | S_EXTERNAL_INTERRUPT | M_EXTERNAL_INTERRUPT
        )
    }
}

/// One entry of the exception table: a name, architectural code,
/// whether it's an interrupt, the ISA features required for it to be
/// reachable, and a short description.
#[derive(Debug, Clone, Copy)]
pub struct ExceptionDescriptor {
    pub name: &'static str,
    pub code: u32,
    pub is_interrupt: bool,
    pub required_isa: IsaExtensions,
    pub description: &'static str,
}

macro_rules! exc {
    ($name:expr, $code:expr, $isa:expr, $desc:expr) => {
        ExceptionDescriptor {
            name: $name,
            code: $code,
            is_interrupt: false,
            required_isa: $isa,
            description: $desc,
        }
    };
}

macro_rules! intr {
    ($name:expr, $code:expr, $isa:expr, $desc:expr) => {
        ExceptionDescriptor {
            name: $name,
            code: $code,
            is_interrupt: true,
            required_isa: $isa,
            description: $desc,
        }
    };
}

const EMPTY: IsaExtensions = IsaExtensions::empty();

/// The full static table, architectural exceptions first, then
/// interrupts, both in ascending code order within their kind.
pub static STANDARD_TABLE: &[ExceptionDescriptor] = &[
    exc!(
        "instruction-address-misaligned",
        codes::INSTRUCTION_ADDR_MISALIGNED,
        EMPTY,
        "fetch address is not IALIGN-aligned"
    ),
    exc!(
        "instruction-access-fault",
        codes::INSTRUCTION_ACCESS_FAULT,
        EMPTY,
        "fetch address is not executable"
    ),
    exc!(
        "illegal-instruction",
        codes::ILLEGAL_INSTRUCTION,
        EMPTY,
        "decoder rejected the instruction word"
    ),
    exc!(
        "breakpoint",
        codes::BREAKPOINT,
        EMPTY,
        "EBREAK executed outside of debug-entry routing"
    ),
    exc!(
        "load-address-misaligned",
        codes::LOAD_ADDR_MISALIGNED,
        EMPTY,
        "load address violates the access's natural alignment"
    ),
    exc!(
        "load-access-fault",
        codes::LOAD_ACCESS_FAULT,
        EMPTY,
        "load address is not readable"
    ),
    exc!(
        "store-amo-address-misaligned",
        codes::STORE_AMO_ADDR_MISALIGNED,
        EMPTY,
        "store/AMO address violates the access's natural alignment"
    ),
    exc!(
        "store-amo-access-fault",
        codes::STORE_AMO_ACCESS_FAULT,
        EMPTY,
        "store/AMO address is not writable"
    ),
    exc!(
        "ecall-from-u-mode",
        codes::ECALL_U,
        IsaExtensions::U_MODE,
        "environment call from User mode"
    ),
    exc!(
        "ecall-from-s-mode",
        codes::ECALL_S,
        IsaExtensions::S_MODE,
        "environment call from Supervisor mode"
    ),
    exc!(
        "ecall-from-m-mode",
        codes::ECALL_M,
        EMPTY,
        "environment call from Machine mode"
    ),
    exc!(
        "instruction-page-fault",
        codes::INSTRUCTION_PAGE_FAULT,
        IsaExtensions::S_MODE,
        "fetch address translation failed"
    ),
    exc!(
        "load-page-fault",
        codes::LOAD_PAGE_FAULT,
        IsaExtensions::S_MODE,
        "load address translation failed"
    ),
    exc!(
        "store-amo-page-fault",
        codes::STORE_AMO_PAGE_FAULT,
        IsaExtensions::S_MODE,
        "store/AMO address translation failed"
    ),
    intr!(
        "u-software-interrupt",
        codes::U_SOFTWARE_INTERRUPT,
        IsaExtensions::U_MODE,
        "software interrupt targeted at User mode"
    ),
    intr!(
        "s-software-interrupt",
        codes::S_SOFTWARE_INTERRUPT,
        IsaExtensions::S_MODE,
        "software interrupt targeted at Supervisor mode"
    ),
    intr!(
        "m-software-interrupt",
        codes::M_SOFTWARE_INTERRUPT,
        EMPTY,
        "software interrupt targeted at Machine mode"
    ),
    intr!(
        "u-timer-interrupt",
        codes::U_TIMER_INTERRUPT,
        IsaExtensions::U_MODE,
        "timer interrupt targeted at User mode"
    ),
    intr!(
        "s-timer-interrupt",
        codes::S_TIMER_INTERRUPT,
        IsaExtensions::S_MODE,
        "timer interrupt targeted at Supervisor mode"
    ),
    intr!(
        "m-timer-interrupt",
        codes::M_TIMER_INTERRUPT,
        EMPTY,
        "timer interrupt targeted at Machine mode"
    ),
    intr!(
        "u-external-interrupt",
        codes::U_EXTERNAL_INTERRUPT,
        IsaExtensions::U_MODE,
        "external interrupt targeted at User mode"
    ),
    intr!(
        "s-external-interrupt",
        codes::S_EXTERNAL_INTERRUPT,
        IsaExtensions::S_MODE,
        "external interrupt targeted at Supervisor mode"
    ),
    intr!(
        "m-external-interrupt",
        codes::M_EXTERNAL_INTERRUPT,
        EMPTY,
        "external interrupt targeted at Machine mode"
    ),
];

/// Entries of [`STANDARD_TABLE`] whose required ISA bits are all
/// present in `isa`.
pub fn implemented(isa: IsaExtensions) -> Vec<ExceptionDescriptor> {
    STANDARD_TABLE
        .iter()
        .copied()
        .filter(|entry| isa.contains(entry.required_isa))
        .collect()
}

pub fn lookup(code: u32, is_interrupt: bool) -> Option<&'static ExceptionDescriptor> {
    STANDARD_TABLE
        .iter()
        .find(|entry| entry.code == code && entry.is_interrupt == is_interrupt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_fourteen_exceptions_and_nine_interrupts() {
        let exceptions = STANDARD_TABLE.iter().filter(|e| !e.is_interrupt).count();
        let interrupts = STANDARD_TABLE.iter().filter(|e| e.is_interrupt).count();
        assert_eq!(exceptions, 14);
        assert_eq!(interrupts, 9);
    }

    #[test]
    fn implemented_filters_by_isa() {
        let m_only = implemented(IsaExtensions::empty());
        assert!(m_only.iter().all(|e| e.name != "ecall-from-u-mode"));
        assert!(m_only.iter().any(|e| e.name == "ecall-from-m-mode"));

        let full = implemented(IsaExtensions::S_MODE | IsaExtensions::U_MODE);
        assert!(full.iter().any(|e| e.name == "ecall-from-u-mode"));
    }

    #[test]
    fn lookup_disambiguates_shared_codes() {
        let exception = lookup(8, false).unwrap();
        let interrupt = lookup(8, true).unwrap();
        assert_eq!(exception.name, "ecall-from-u-mode");
        assert_eq!(interrupt.name, "u-external-interrupt");
    }
}
