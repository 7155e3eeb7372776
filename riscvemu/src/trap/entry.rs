//! Trap entry engine
//!
//! [`take_exception`] is the one place that performs the architectural
//! state transition shared by every synchronous exception and every
//! dispatched interrupt. The convenience entry points below exist
//! because call sites rarely have a raw `Cause` handy; they know
//! "this was an illegal instruction" or "this was ECALL".

use crate::csr::{Cause, Tvec, TvecMode};
use crate::hart::Hart;
use crate::host::Host;
use crate::mode::{mode_index, Privilege};
use crate::trap::delegation;
use crate::trap::exceptions::codes;

/// Perform architectural trap entry for `cause`, with `epc` the value
/// to store in the target mode's `xepc` and `tval` the value to store
/// in `xtval`.
pub fn take_exception<H: Host>(hart: &mut Hart<H>, host: &mut H, cause: Cause, epc: u32, tval: u32) {
    if hart.dm {
        crate::trap::debug::enter_debug(hart, host, crate::csr::DebugCause::None);
        return;
    }

    let suppress_retire = (!cause.is_interrupt && codes::is_ecall_or_ebreak(cause.code))
        || hart.csr.mcountinhibit_ir;
    if !suppress_retire {
        hart.base_instructions = hart.base_instructions.wrapping_add(1);
    }

    hart.af_error = !cause.is_interrupt
        && matches!(
            cause.code,
            codes::INSTRUCTION_ACCESS_FAULT | codes::LOAD_ACCESS_FAULT | codes::STORE_AMO_ACCESS_FAULT
        );

    hart.exclusive_tag = None;

    let target = delegation::target_mode(&hart.csr, cause, hart.privilege);

    let reported_cause = if cause.is_interrupt && codes::is_external_interrupt(cause.code) {
        let claim = hart.csr.ext_int_id[mode_index(target)];
        if claim != 0 {
            Cause::interrupt(claim)
        } else {
            cause
        }
    } else {
        cause
    };

    let previous_mode = hart.privilege;
    let old_ie = hart.csr.ie(target);
    hart.csr.set_pie(target, old_ie);
    hart.csr.set_ie(target, false);
    hart.csr.set_cause(target, reported_cause);
    hart.csr.set_epc(target, epc & epc_mask(hart));
    hart.csr.set_tval(target, tval);
    if matches!(target, Privilege::Supervisor | Privilege::Machine) {
        hart.csr.set_pp(target, previous_mode);
    }

    let handler = handler_pc(hart, target, reported_cause);

    log::debug!(
        "trap entry: cause={:?} from={:?} to={:?} handler={:#x}",
        reported_cause,
        hart.privilege,
        target,
        handler
    );

    hart.privilege = target;
    hart.last_exception = Some(reported_cause);
    host.set_pc(handler);
    hart.notify_trap(reported_cause, target);
}

fn epc_mask<H: Host>(hart: &Hart<H>) -> u32 {
    if hart.config.isa.contains(crate::config::IsaExtensions::C) {
        !0u32 ^ 1
    } else {
        !0u32 ^ 0b11
    }
}

fn handler_pc<H: Host>(hart: &Hart<H>, target: Privilege, cause: Cause) -> u32 {
    let tvec: Tvec = hart.csr.tvec(target);
    if tvec.mode == TvecMode::Direct {
        if let Some(override_address) = hart.config.custom_mode_override[mode_index(target)] {
            return override_address;
        }
    }
    match tvec.mode {
        TvecMode::Vectored if cause.is_interrupt => tvec.base.wrapping_add(4 * cause.code),
        _ => tvec.base,
    }
}

/// Illegal instruction: `tval` is zero unless the hart is configured
/// to report the raw instruction word.
pub fn illegal_instruction<H: Host>(hart: &mut Hart<H>, host: &mut H, epc: u32, instruction_word: u32) {
    let tval = if hart.config.tval_ii_code { instruction_word } else { 0 };
    take_exception(hart, host, Cause::exception(codes::ILLEGAL_INSTRUCTION), epc, tval);
}

/// Misaligned fetch target.
pub fn instruction_address_misaligned<H: Host>(hart: &mut Hart<H>, host: &mut H, epc: u32, target: u32) {
    take_exception(
        hart,
        host,
        Cause::exception(codes::INSTRUCTION_ADDR_MISALIGNED),
        epc,
        target & !1u32,
    );
}

/// Fetch address rejected by [`Host::is_executable`].
pub fn instruction_access_fault<H: Host>(hart: &mut Hart<H>, host: &mut H, address: u32) {
    take_exception(hart, host, Cause::exception(codes::INSTRUCTION_ACCESS_FAULT), address, address);
}

/// `ECALL`, reported from whichever mode is currently active.
pub fn ecall<H: Host>(hart: &mut Hart<H>, host: &mut H, epc: u32) {
    let code = match hart.privilege {
        Privilege::User => codes::ECALL_U,
        Privilege::Supervisor => codes::ECALL_S,
        Privilege::Machine => codes::ECALL_M,
        Privilege::Hypervisor => codes::ECALL_S + 1,
    };
    take_exception(hart, host, Cause::exception(code), epc, 0);
}

/// Architectural `Breakpoint` exception, taken when EBREAK routing
/// decides not to enter debug mode.
pub fn breakpoint<H: Host>(hart: &mut Hart<H>, host: &mut H, epc: u32) {
    take_exception(hart, host, Cause::exception(codes::BREAKPOINT), epc, epc);
}

/// A misaligned/access/page-fault memory exception that may be
/// suppressed by vector-extension fault-only-first handling. Returns
/// `true` if the trap was actually taken, `false` if it was
/// suppressed and `vstart` clamped instead.
pub fn memory_fault<H: Host>(
    hart: &mut Hart<H>,
    host: &mut H,
    epc: u32,
    cause_code: u32,
    tval: u32,
    faulting_element: u32,
) -> bool {
    hart.csr.vstart = faulting_element;
    if hart.first_only_fault && hart.csr.vstart > 0 {
        hart.first_only_fault = false;
        return false;
    }
    take_exception(hart, host, Cause::exception(cause_code), epc, tval);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HartConfig;
    use crate::csr::TvecMode;
    use crate::hart::test_support::TestHost;

    fn hart_with_config(config: HartConfig) -> (Hart<TestHost>, TestHost) {
        (Hart::new(config), TestHost::new())
    }

    #[test]
    fn delegated_ecall_matches_boundary_scenario() {
        let (mut hart, mut host) = hart_with_config(HartConfig::default());
        hart.clear_disabled(&mut host, crate::hart::DisableReason::RESET);
        hart.privilege = Privilege::User;
        hart.csr.medeleg = 1 << codes::ECALL_U;
        hart.csr.s.tvec = Tvec {
            base: 0x80,
            mode: TvecMode::Direct,
        };
        host.set_pc(0x1000);

        ecall(&mut hart, &mut host, 0x1000);

        assert_eq!(hart.csr.s.cause, Cause::exception(codes::ECALL_U));
        assert_eq!(hart.csr.s.epc, 0x1000);
        assert_eq!(hart.csr.s.tval, 0);
        assert_eq!(hart.privilege(), Privilege::Supervisor);
        assert_eq!(host.pc(), 0x80);
        assert_eq!(hart.csr.mstatus.spp, Privilege::User);
        assert!(!hart.csr.mstatus.sie);
    }

    #[test]
    fn vectored_interrupt_handler_offsets_by_four_times_code() {
        let (mut hart, mut host) = hart_with_config(HartConfig::default());
        hart.clear_disabled(&mut host, crate::hart::DisableReason::RESET);
        hart.csr.m.tvec = Tvec {
            base: 0x100,
            mode: TvecMode::Vectored,
        };
        host.set_pc(0x2000);

        take_exception(&mut hart, &mut host, Cause::interrupt(codes::M_TIMER_INTERRUPT), 0x2000, 0);

        assert_eq!(host.pc(), 0x100 + 4 * codes::M_TIMER_INTERRUPT);
    }

    #[test]
    fn fault_only_first_suppresses_trap_and_clamps_vstart() {
        let (mut hart, mut host) = hart_with_config(HartConfig::default());
        hart.clear_disabled(&mut host, crate::hart::DisableReason::RESET);
        hart.first_only_fault = true;

        let taken = memory_fault(&mut hart, &mut host, 0x10, codes::LOAD_ACCESS_FAULT, 0, 3);

        assert!(!taken);
        assert_eq!(hart.csr.vstart, 3);
        assert!(!hart.first_only_fault);
        assert!(hart.last_exception().is_none());
    }
}
