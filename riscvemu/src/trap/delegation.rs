//! Mode & delegation
//!
//! Computes which privilege mode a trap should be delivered to, given
//! the delegation registers and the hart's current privilege.

use crate::csr::{Cause, CsrFile};
use crate::mode::Privilege;

/// `target_mode(cause, is_interrupt)`: walk `medeleg`/`mideleg` then
/// `sedeleg`/`sideleg`, and clamp upward so a trap never moves a hart
/// to a less privileged mode than it is already in.
///
/// Delegation masks are 32 bits wide, so local-interrupt codes (≥32)
/// are never delegated and always target Machine.
pub fn target_mode(csr: &CsrFile, cause: Cause, current: Privilege) -> Privilege {
    let (m_mask, s_mask) = if cause.is_interrupt {
        (csr.mideleg, csr.sideleg)
    } else {
        (csr.medeleg, csr.sedeleg)
    };
    let bit = 1u32.checked_shl(cause.code).unwrap_or(0);

    let target = if m_mask & bit == 0 {
        Privilege::Machine
    } else if s_mask & bit == 0 {
        Privilege::Supervisor
    } else {
        Privilege::User
    };

    target.max(current)
}
