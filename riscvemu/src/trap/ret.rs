//! Trap return engine
//!
//! MRET/SRET/URET/DRET all funnel through [`eret_common`], which sets
//! the new privilege mode, writes the masked PC, fans out to ERET
//! observers, and re-runs interrupt arbitration so a pending interrupt
//! in the returned-to mode fires immediately rather than waiting for
//! the next fetch.

use crate::config::{IsaExtensions, PrivilegedIsaVersion};
use crate::hart::Hart;
use crate::host::Host;
use crate::mode::Privilege;
use crate::trap::arbiter;
use crate::trap::entry;

fn is_implemented<H: Host>(hart: &Hart<H>, mode: Privilege) -> bool {
    match mode {
        Privilege::Machine => true,
        Privilege::Supervisor => hart.config.isa.contains(IsaExtensions::S_MODE),
        Privilege::User => hart.config.isa.contains(IsaExtensions::U_MODE),
        Privilege::Hypervisor => false,
    }
}

pub(crate) fn eret_common<H: Host>(hart: &mut Hart<H>, host: &mut H, new_mode: Privilege, pc: u32) {
    hart.privilege = new_mode;
    let masked = if hart.config.isa.contains(IsaExtensions::C) {
        pc & !1u32
    } else {
        pc & !0b11u32
    };
    host.set_pc(masked);
    hart.notify_eret(new_mode);
    arbiter::try_dispatch(hart, host);
}

/// `MRET`: a no-op while in debug mode.
pub fn mret<H: Host>(hart: &mut Hart<H>, host: &mut H) {
    if hart.dm {
        return;
    }
    let mpp = hart.csr.mstatus.mpp;
    let new_mode = if is_implemented(hart, mpp) {
        mpp
    } else {
        hart.config.min_supported_mode()
    };

    hart.exclusive_tag = None;
    hart.csr.mstatus.mie = hart.csr.mstatus.mpie;
    hart.csr.mstatus.mpie = true;
    hart.csr.mstatus.mpp = hart.config.min_supported_mode();
    if hart.config.privileged_isa_version == PrivilegedIsaVersion::Post1_10 && new_mode != Privilege::Machine {
        hart.csr.mstatus.mprv = false;
    }

    let epc = hart.csr.m.epc;
    eret_common(hart, host, new_mode, epc);
}

/// `SRET`: symmetric with MRET over the S-mode `mstatus` fields.
pub fn sret<H: Host>(hart: &mut Hart<H>, host: &mut H) {
    if hart.dm {
        return;
    }
    let spp = hart.csr.mstatus.spp;
    let new_mode = if is_implemented(hart, spp) {
        spp
    } else {
        hart.config.min_supported_mode()
    };

    hart.exclusive_tag = None;
    hart.csr.mstatus.sie = hart.csr.mstatus.spie;
    hart.csr.mstatus.spie = true;
    hart.csr.mstatus.spp = hart.config.min_supported_mode();

    let epc = hart.csr.s.epc;
    eret_common(hart, host, new_mode, epc);
}

/// `URET`: there is no `upp` to restore, since User is the lowest
/// implemented mode by construction.
pub fn uret<H: Host>(hart: &mut Hart<H>, host: &mut H) {
    if hart.dm {
        return;
    }
    hart.csr.mstatus.uie = hart.csr.mstatus.upie;
    hart.csr.mstatus.upie = true;

    let epc = hart.csr.u.epc;
    eret_common(hart, host, Privilege::User, epc);
}

/// `DRET`: illegal outside debug mode, otherwise delegates to the
/// debug controller's `leaveDM`.
pub fn dret<H: Host>(hart: &mut Hart<H>, host: &mut H) {
    if !hart.dm {
        let pc = host.pc();
        entry::illegal_instruction(hart, host, pc, 0);
        return;
    }
    crate::trap::debug::leave_dm(hart, host);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HartConfig;
    use crate::hart::test_support::TestHost;
    use crate::hart::DisableReason;

    #[test]
    fn mret_clamps_to_min_supported_mode_when_mpp_unimplemented() {
        let mut config = HartConfig::default();
        config.isa.remove(IsaExtensions::S_MODE);
        let mut hart: Hart<TestHost> = Hart::new(config);
        let mut host = TestHost::new();
        hart.clear_disabled(&mut host, DisableReason::RESET);

        hart.csr.mstatus.mpp = Privilege::Supervisor;
        hart.csr.m.epc = 0x4000;

        mret(&mut hart, &mut host);

        assert_eq!(hart.privilege(), Privilege::User);
        assert_eq!(hart.csr.mstatus.mpp, Privilege::User);
        assert_eq!(host.pc(), 0x4000);
    }

    #[test]
    fn mret_restores_mie_from_mpie() {
        let mut hart: Hart<TestHost> = Hart::new(HartConfig::default());
        let mut host = TestHost::new();
        hart.clear_disabled(&mut host, DisableReason::RESET);

        hart.csr.mstatus.mpie = true;
        hart.csr.mstatus.mie = false;
        hart.csr.m.epc = 0x8000;

        mret(&mut hart, &mut host);

        assert!(hart.csr.mstatus.mie);
        assert!(hart.csr.mstatus.mpie);
    }

    #[test]
    fn dret_outside_debug_raises_illegal_instruction() {
        let mut hart: Hart<TestHost> = Hart::new(HartConfig::default());
        let mut host = TestHost::new();
        hart.clear_disabled(&mut host, DisableReason::RESET);
        host.set_pc(0x2000);

        dret(&mut hart, &mut host);

        assert_eq!(
            hart.last_exception().unwrap(),
            crate::csr::Cause::exception(crate::trap::exceptions::codes::ILLEGAL_INSTRUCTION)
        );
    }
}
