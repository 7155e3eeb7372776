//! Fetch gate
//!
//! Called by the host before every fetch. Decides, in priority order,
//! between a reset-halt-request debug entry, a halt request, an
//! interrupt dispatch, a fetch fault, or letting the fetch proceed. On
//! a committed fetch that is allowed to proceed, also arms the
//! single-step timer ([`crate::host::Host::arm_step_timer`]) when
//! `dcsr.step` is set, so the next instruction to retire triggers
//! [`crate::trap::debug::step_timer_fired`].

use crate::csr::DebugCause;
use crate::hart::Hart;
use crate::host::Host;
use crate::trap::{arbiter, debug, entry};

/// Outcome of a [`fetch_gate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Nothing intercepted the fetch; the host may proceed to decode
    /// and execute the instruction at `address`.
    None,
    /// A debug entry or trap was taken; the host should not execute
    /// the instruction at `address`.
    ExceptionTaken,
    /// A debug entry or trap would be taken on a committed fetch, but
    /// `complete` was `false` so nothing was mutated.
    ExceptionPending,
}

/// `(address, complete)`: `complete` distinguishes a speculative probe
/// (used to decide whether a fetch *would* fault, without taking
/// architectural action) from a committed fetch.
pub fn fetch_gate<H: Host>(hart: &mut Hart<H>, host: &mut H, address: u32, complete: bool) -> FetchOutcome {
    if hart.net_value.resethaltreq_sampled && complete {
        hart.net_value.resethaltreq_sampled = false;
        debug::enter_debug(hart, host, DebugCause::Resethaltreq);
        return FetchOutcome::ExceptionTaken;
    }

    if hart.net_value.haltreq && !hart.dm {
        if !complete {
            return FetchOutcome::ExceptionPending;
        }
        debug::enter_debug(hart, host, DebugCause::Haltreq);
        return FetchOutcome::ExceptionTaken;
    }

    if hart.arbiter_has_pending_and_enabled() {
        if !complete {
            return FetchOutcome::ExceptionPending;
        }
        arbiter::try_dispatch(hart, host);
        return FetchOutcome::ExceptionTaken;
    }

    match check_fetch_address(hart, host, address, complete) {
        FetchOutcome::None => {}
        other => return other,
    }

    let word = host.fetch_instruction_word(address);
    if instruction_length(word) > 2 {
        let next = address.wrapping_add(2);
        match check_fetch_address(hart, host, next, complete) {
            FetchOutcome::None => {}
            other => return other,
        }
    }

    if complete && hart.csr.dcsr.step && !hart.dm {
        host.arm_step_timer();
    }

    FetchOutcome::None
}

fn check_fetch_address<H: Host>(hart: &mut Hart<H>, host: &mut H, address: u32, complete: bool) -> FetchOutcome {
    let mut executable = host.is_executable(address);
    if !executable {
        executable = host.resolve_translation_miss(address);
    }
    if executable {
        return FetchOutcome::None;
    }
    if !complete {
        return FetchOutcome::ExceptionPending;
    }
    entry::instruction_access_fault(hart, host, address);
    FetchOutcome::ExceptionTaken
}

fn instruction_length(word: u32) -> u32 {
    if word & 0b11 == 0b11 {
        4
    } else {
        2
    }
}
