//! External signal ports
//!
//! Level/edge handlers for the signals a host drives a hart through:
//! reset, NMI, the two debug halt requests, per-source interrupt
//! lines, external-interrupt-ID lines, and the `DM` output.

use crate::csr::CsrFile;
use crate::hart::{DisableReason, Hart};
use crate::host::Host;
use crate::mode::{mode_index, Privilege};

/// `reset` port: rising edge halts, falling edge runs the full reset
/// sequence.
pub fn write_reset<H: Host>(hart: &mut Hart<H>, host: &mut H, level: bool) {
    let rising = level && !hart.net_value.reset;
    let falling = !level && hart.net_value.reset;
    hart.net_value.reset = level;

    if rising {
        hart.set_disabled(host, DisableReason::RESET);
    } else if falling {
        reset_sequence(hart, host);
    }
}

/// `nmi` port: a falling edge outside debug mode triggers `doNMI`.
/// The level is always mirrored into `dcsr.nmip`.
pub fn write_nmi<H: Host>(hart: &mut Hart<H>, host: &mut H, level: bool) {
    let falling = !level && hart.net_value.nmi;
    hart.net_value.nmi = level;
    hart.csr.dcsr.nmip = level;

    if falling && !hart.dm {
        do_nmi(hart, host);
    }
}

fn do_nmi<H: Host>(hart: &mut Hart<H>, host: &mut H) {
    log::info!("NMI taken at pc={:#x}", host.pc());
    hart.clear_disabled(host, DisableReason::WFI);
    hart.privilege = Privilege::Machine;
    hart.csr.m.cause = crate::csr::Cause::exception(0);
    hart.csr.m.epc = host.pc();
    host.set_pc(hart.config.nmi_address);
}

/// `haltreq` port: a rising edge outside debug schedules a synchronous
/// interrupt so the fetch gate enters debug at its next call.
pub fn write_haltreq<H: Host>(hart: &mut Hart<H>, host: &mut H, level: bool) {
    let rising = level && !hart.net_value.haltreq;
    hart.net_value.haltreq = level;
    if rising && !hart.dm {
        host.post_synchronous_interrupt();
    }
}

/// `resethaltreq` port: level-latched, sampled into
/// `resethaltreq_sampled` only at reset.
pub fn write_resethaltreq<H: Host>(hart: &mut Hart<H>, _host: &mut H, level: bool) {
    hart.net_value.resethaltreq = level;
}

/// A standard-or-local interrupt source line: writes the
/// corresponding bit of `ip[]` and re-arbitrates.
pub fn write_interrupt_line<H: Host>(hart: &mut Hart<H>, host: &mut H, index: usize, level: bool) {
    debug_assert!(
        index < hart.config.interrupt_count(),
        "interrupt line index {index} out of range for {} configured lines",
        hart.config.interrupt_count()
    );
    hart.pending.set(index, level);
    hart.update_pending(host);
}

/// Write to `swip` (the software-pending shadow), as a CSR write to
/// `mip` would perform.
pub fn write_swip<H: Host>(hart: &mut Hart<H>, host: &mut H, value: u32) {
    hart.swip = value;
    hart.update_pending(host);
}

/// External-interrupt-ID line for `mode`: latches the claimed source
/// ID, consumed by trap entry for external interrupts.
pub fn write_external_id<H: Host>(hart: &mut Hart<H>, _host: &mut H, mode: Privilege, id: u32) {
    hart.csr.ext_int_id[mode_index(mode)] = id;
}

/// `DM` output port.
pub fn dm_output<H: Host>(hart: &Hart<H>) -> bool {
    hart.dm
}

/// `riscvReset`: clear the `Reset` disable reason, drop out of debug,
/// reinitialize all CSRs, notify reset observers, and sample
/// `resethaltreq` into its reset-time copy.
pub fn reset_sequence<H: Host>(hart: &mut Hart<H>, host: &mut H) {
    log::info!("hart reset");
    hart.clear_disabled(host, DisableReason::RESET);
    hart.dm = false;
    hart.privilege = Privilege::Machine;

    let interrupt_words = hart.config.interrupt_words();
    hart.csr = CsrFile::new(interrupt_words);
    hart.pending = crate::csr::InterruptBits::new(interrupt_words);
    hart.swip = 0;
    hart.exclusive_tag = None;
    hart.af_error = false;
    hart.first_only_fault = false;
    hart.last_exception = None;

    hart.notify_reset();

    host.set_pc(hart.config.reset_address);
    hart.net_value.resethaltreq_sampled = hart.net_value.resethaltreq;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HartConfig;
    use crate::hart::test_support::TestHost;

    #[test]
    fn reset_falling_edge_restores_pc_and_privilege() {
        let mut config = HartConfig::default();
        config.reset_address = 0x8000_0000;
        let mut hart: Hart<TestHost> = Hart::new(config);
        let mut host = TestHost::new();

        write_reset(&mut hart, &mut host, true);
        assert!(!hart.is_runnable());

        write_reset(&mut hart, &mut host, false);

        assert!(hart.is_runnable());
        assert_eq!(hart.privilege(), Privilege::Machine);
        assert_eq!(host.pc(), 0x8000_0000);
    }

    #[test]
    fn resethaltreq_sampled_only_at_reset() {
        let mut hart: Hart<TestHost> = Hart::new(HartConfig::default());
        let mut host = TestHost::new();
        write_resethaltreq(&mut hart, &mut host, true);
        assert!(!hart.net_value.resethaltreq_sampled);

        write_reset(&mut hart, &mut host, true);
        write_reset(&mut hart, &mut host, false);

        assert!(hart.net_value.resethaltreq_sampled);
    }

    #[test]
    fn interrupt_line_write_wakes_wfi_halted_hart() {
        let mut hart: Hart<TestHost> = Hart::new(HartConfig::default());
        let mut host = TestHost::new();
        hart.clear_disabled(&mut host, DisableReason::RESET);
        crate::trap::arbiter::wfi(&mut hart, &mut host);
        assert!(hart.disable().contains(DisableReason::WFI));

        write_interrupt_line(&mut hart, &mut host, 3, true);

        assert!(!hart.disable().contains(DisableReason::WFI));
    }

    #[test]
    fn nmi_falling_edge_redirects_to_configured_address() {
        let mut config = HartConfig::default();
        config.nmi_address = 0xdead0;
        let mut hart: Hart<TestHost> = Hart::new(config);
        let mut host = TestHost::new();
        hart.clear_disabled(&mut host, DisableReason::RESET);
        hart.privilege = Privilege::User;
        host.set_pc(0x1234);

        write_nmi(&mut hart, &mut host, true);
        write_nmi(&mut hart, &mut host, false);

        assert_eq!(hart.privilege(), Privilege::Machine);
        assert_eq!(hart.csr.m.epc, 0x1234);
        assert_eq!(host.pc(), 0xdead0);
    }
}
