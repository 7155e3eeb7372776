//! Debug-mode controller
//!
//! Enter/leave debug mode, the single-step timer, EBREAK routing, and
//! the halt/resume stall that the disable bitset implements when the
//! debug-entry policy is [`DebugEntryPolicy::Halt`].

use crate::config::{DebugEntryPolicy, PrivilegedIsaVersion};
use crate::csr::DebugCause;
use crate::hart::{DisableReason, Hart};
use crate::host::Host;
use crate::mode::Privilege;
use crate::trap::entry;
use crate::trap::ret::eret_common;

/// Enter debug mode for `cause`. If already in debug, only the stall
/// is refreshed.
pub fn enter_debug<H: Host>(hart: &mut Hart<H>, host: &mut H, cause: DebugCause) {
    if hart.dm {
        update_dm_stall(hart, host, true);
        return;
    }

    log::debug!("entering debug mode: cause={:?} from={:?}", cause, hart.privilege);
    let inhibit = hart.csr.mcountinhibit_ir;
    hart.dm = true;
    hart.csr.dcsr.prv = hart.privilege;
    hart.csr.dcsr.cause = cause;
    hart.csr.dpc = host.pc();
    hart.privilege = Privilege::Machine;
    hart.csr.mcountinhibit_ir = inhibit;

    update_dm_stall(hart, host, true);

    if hart.config.debug_entry_policy == DebugEntryPolicy::Interrupt {
        host.post_synchronous_interrupt();
    }
}

/// Leave debug mode, returning to `dcsr.prv` at `dpc`.
pub fn leave_dm<H: Host>(hart: &mut Hart<H>, host: &mut H) {
    log::debug!("leaving debug mode, returning to {:?}", hart.csr.dcsr.prv);
    let inhibit = hart.csr.mcountinhibit_ir;
    hart.dm = false;

    if hart.config.privileged_isa_version == PrivilegedIsaVersion::Post1_10 && hart.csr.dcsr.prv != Privilege::Machine
    {
        hart.csr.mstatus.mprv = false;
    }

    let dpc = hart.csr.dpc;
    let return_mode = hart.csr.dcsr.prv;
    eret_common(hart, host, return_mode, dpc);

    hart.csr.mcountinhibit_ir = inhibit;
    update_dm_stall(hart, host, false);
}

pub fn update_dm_stall<H: Host>(hart: &mut Hart<H>, host: &mut H, stalled: bool) {
    hart.dm_stall = stalled;
    if hart.config.debug_entry_policy != DebugEntryPolicy::Interrupt {
        if stalled {
            hart.set_disabled(host, DisableReason::DEBUG);
        } else {
            hart.clear_disabled(host, DisableReason::DEBUG);
        }
    }
}

/// Called by the host when the single-step timer it was asked to arm
/// fires. The timer itself is armed by [`crate::trap::fetch::fetch_gate`]
/// on every committed fetch that proceeds while `dcsr.step` is set.
pub fn step_timer_fired<H: Host>(hart: &mut Hart<H>, host: &mut H) {
    if !hart.dm && hart.csr.dcsr.step {
        enter_debug(hart, host, DebugCause::Step);
    }
}

/// EBREAK routing: in debug mode, always re-enters debug. Outside
/// debug, consults `dcsr.ebreak{u,s,m}` for the current mode; if not
/// set, takes the architectural `Breakpoint` exception instead.
pub fn ebreak<H: Host>(hart: &mut Hart<H>, host: &mut H, epc: u32) {
    if hart.dm {
        enter_debug(hart, host, DebugCause::Ebreak);
        return;
    }

    let routes_to_debug = match hart.privilege {
        Privilege::User => hart.csr.dcsr.ebreak_u,
        Privilege::Supervisor => hart.csr.dcsr.ebreak_s,
        Privilege::Machine => hart.csr.dcsr.ebreak_m,
        Privilege::Hypervisor => false,
    };

    if routes_to_debug {
        if hart.csr.dcsr.stopcount {
            hart.base_instructions = hart.base_instructions.wrapping_add(1);
            hart.base_cycles = hart.base_cycles.wrapping_add(1);
        }
        enter_debug(hart, host, DebugCause::Ebreak);
    } else {
        entry::breakpoint(hart, host, epc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HartConfig;
    use crate::hart::test_support::TestHost;

    fn ready_hart() -> (Hart<TestHost>, TestHost) {
        let mut hart: Hart<TestHost> = Hart::new(HartConfig::default());
        let mut host = TestHost::new();
        hart.clear_disabled(&mut host, DisableReason::RESET);
        (hart, host)
    }

    #[test]
    fn single_step_enters_debug_with_previous_mode_recorded() {
        let (mut hart, mut host) = ready_hart();
        hart.privilege = Privilege::Supervisor;
        hart.csr.dcsr.step = true;
        host.set_pc(0x3000);

        step_timer_fired(&mut hart, &mut host);

        assert!(hart.is_debug_mode());
        assert_eq!(hart.csr.dcsr.cause, DebugCause::Step);
        assert_eq!(hart.csr.dcsr.prv, Privilege::Supervisor);
        assert_eq!(hart.csr.dpc, 0x3000);
        assert_eq!(hart.privilege(), Privilege::Machine);
    }

    #[test]
    fn ebreak_without_routing_bit_takes_architectural_breakpoint() {
        let (mut hart, mut host) = ready_hart();
        host.set_pc(0x40);

        ebreak(&mut hart, &mut host, 0x40);

        assert!(!hart.is_debug_mode());
        assert_eq!(
            hart.last_exception().unwrap(),
            crate::csr::Cause::exception(crate::trap::exceptions::codes::BREAKPOINT)
        );
    }

    #[test]
    fn ebreak_with_routing_bit_enters_debug_instead() {
        let (mut hart, mut host) = ready_hart();
        hart.csr.dcsr.ebreak_m = true;
        host.set_pc(0x40);

        ebreak(&mut hart, &mut host, 0x40);

        assert!(hart.is_debug_mode());
        assert_eq!(hart.csr.dcsr.cause, DebugCause::Ebreak);
    }

    #[test]
    fn leave_dm_restores_recorded_privilege() {
        let (mut hart, mut host) = ready_hart();
        hart.privilege = Privilege::User;
        enter_debug(&mut hart, &mut host, DebugCause::Haltreq);
        assert_eq!(hart.privilege(), Privilege::Machine);

        leave_dm(&mut hart, &mut host);

        assert!(!hart.is_debug_mode());
        assert_eq!(hart.privilege(), Privilege::User);
    }
}
