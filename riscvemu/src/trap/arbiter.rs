//! Interrupt arbiter
//!
//! Computes the pending-and-enabled interrupt set and, among it,
//! selects the single interrupt to dispatch: highest destination
//! privilege mode wins, ties broken by a fixed architectural priority
//! table, remaining ties broken by the lowest numeric code.

use itertools::Itertools;

use crate::hart::{DisableReason, Hart};
use crate::host::Host;
use crate::mode::Privilege;
use crate::trap::delegation;
use crate::trap::entry;
use crate::trap::exceptions::codes;

/// `(code, rank)`; lower rank is higher priority. Causes not listed
/// (locals, custom) share the lowest rank and are broken by numeric
/// code, matching the fixed order `M-External > M-Software > M-Timer
/// > S-External > S-Software > S-Timer > U-External > U-Software >
/// U-Timer > locals/custom`.
const PRIORITY: &[(u32, u32)] = &[
    (codes::M_EXTERNAL_INTERRUPT, 0),
    (codes::M_SOFTWARE_INTERRUPT, 1),
    (codes::M_TIMER_INTERRUPT, 2),
    (codes::S_EXTERNAL_INTERRUPT, 3),
    (codes::S_SOFTWARE_INTERRUPT, 4),
    (codes::S_TIMER_INTERRUPT, 5),
    (codes::U_EXTERNAL_INTERRUPT, 6),
    (codes::U_SOFTWARE_INTERRUPT, 7),
    (codes::U_TIMER_INTERRUPT, 8),
];

const LOWEST_RANK: u32 = 9;

fn priority_rank(code: u32) -> u32 {
    PRIORITY
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, rank)| *rank)
        .unwrap_or(LOWEST_RANK)
}

/// The set of interrupt codes that are pending, enabled, and not
/// masked by debug mode.
pub(crate) fn pending_and_enabled<H: Host>(hart: &Hart<H>) -> Vec<u32> {
    if hart.dm {
        return Vec::new();
    }

    let count = hart.config.interrupt_count();
    let mut pending: Vec<u32> = (0..count)
        .filter(|&i| {
            let mip_bit = hart.pending.get(i) || (i < 32 && (hart.swip >> i) & 1 == 1);
            mip_bit && hart.csr.mie.get(i)
        })
        .map(|i| i as u32)
        .collect();

    let mie_eff = match hart.privilege {
        Privilege::Machine => hart.csr.mstatus.mie,
        _ => true,
    };
    let sie_eff = if hart.privilege < Privilege::Supervisor {
        true
    } else if hart.privilege == Privilege::Supervisor {
        hart.csr.mstatus.sie
    } else {
        false
    };
    let uie_eff = if hart.privilege == Privilege::User {
        hart.csr.mstatus.uie
    } else {
        false
    };

    let m_mask = !hart.csr.mideleg;
    let s_mask = hart.csr.mideleg & !hart.csr.sideleg;
    let u_mask = hart.csr.sideleg & hart.csr.mideleg;

    pending.retain(|&code| {
        let bit = 1u32.checked_shl(code).unwrap_or(0);
        if !mie_eff && m_mask & bit != 0 {
            return false;
        }
        if !sie_eff && s_mask & bit != 0 {
            return false;
        }
        if !uie_eff && u_mask & bit != 0 {
            return false;
        }
        true
    });

    pending
}

/// Group candidates by destination mode, then pick the
/// highest-priority (lowest rank, then lowest code) member of the
/// highest-destination-mode group.
fn select<H: Host>(hart: &Hart<H>, candidates: &[u32]) -> Option<u32> {
    let groups: std::collections::HashMap<Privilege, Vec<u32>> = candidates
        .iter()
        .copied()
        .into_group_map_by(|&code| delegation::target_mode(&hart.csr, crate::csr::Cause::interrupt(code), hart.privilege));

    let best_mode = groups.keys().copied().max()?;
    groups[&best_mode]
        .iter()
        .copied()
        .min_by_key(|&code| (priority_rank(code), code))
}

impl<H: Host> Hart<H> {
    pub(crate) fn arbiter_has_pending_and_enabled(&self) -> bool {
        !pending_and_enabled(self).is_empty()
    }
}

/// Select and dispatch the highest-priority pending-and-enabled
/// interrupt, if any. Returns whether one was dispatched.
pub fn try_dispatch<H: Host>(hart: &mut Hart<H>, host: &mut H) -> bool {
    let candidates = pending_and_enabled(hart);
    match select(hart, &candidates) {
        Some(code) => {
            let pc = host.pc();
            entry::take_exception(hart, host, crate::csr::Cause::interrupt(code), pc, 0);
            true
        }
        None => false,
    }
}

/// `WFI`: halt until any `mip` bit becomes set, regardless of whether
/// it is enabled or delegated.
pub fn wfi<H: Host>(hart: &mut Hart<H>, host: &mut H) {
    if !hart.dm && !hart.pending.any_set() && hart.swip == 0 {
        hart.set_disabled(host, DisableReason::WFI);
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
    fn meip_beats_mtip_when_both_pending_and_enabled() {
        let (mut hart, _host) = ready_hart();
        hart.pending.set(codes::M_EXTERNAL_INTERRUPT as usize, true);
        hart.pending.set(codes::M_TIMER_INTERRUPT as usize, true);
        hart.csr.mie.set(codes::M_EXTERNAL_INTERRUPT as usize, true);
        hart.csr.mie.set(codes::M_TIMER_INTERRUPT as usize, true);
        hart.csr.mstatus.mie = true;

        let candidates = pending_and_enabled(&hart);
        let selected = select(&hart, &candidates).unwrap();
        assert_eq!(selected, codes::M_EXTERNAL_INTERRUPT);
    }

    #[test]
    fn disabled_global_interrupt_enable_masks_undelegated_bits() {
        let (mut hart, _host) = ready_hart();
        hart.pending.set(codes::M_TIMER_INTERRUPT as usize, true);
        hart.csr.mie.set(codes::M_TIMER_INTERRUPT as usize, true);
        hart.csr.mstatus.mie = false;

        assert!(pending_and_enabled(&hart).is_empty());
    }

    #[test]
    fn wfi_halts_only_when_nothing_pending() {
        let (mut hart, mut host) = ready_hart();
        wfi(&mut hart, &mut host);
        assert!(hart.disable().contains(DisableReason::WFI));

        hart.pending.set(3, true);
        hart.update_pending(&mut host);
        assert!(!hart.disable().contains(DisableReason::WFI));
    }

    #[test]
    fn debug_mode_suppresses_all_pending_interrupts() {
        let (mut hart, _host) = ready_hart();
        hart.pending.set(codes::M_EXTERNAL_INTERRUPT as usize, true);
        hart.csr.mie.set(codes::M_EXTERNAL_INTERRUPT as usize, true);
        hart.csr.mstatus.mie = true;
        hart.dm = true;

        assert!(pending_and_enabled(&hart).is_empty());
    }
}
