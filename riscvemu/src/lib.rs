//! Trap, interrupt and debug-mode subsystem for a RISC-V hart simulator.
//!
//! This crate implements the part of a RISC-V hart that coordinates
//! architectural state (CSRs, privilege mode, program counter) with
//! asynchronous external stimuli: exception entry, interrupt
//! prioritization and delegation, exception return, debug-mode
//! transitions, WFI stalling, NMI and reset. It does not implement an
//! instruction decoder, functional execution of non-trap
//! instructions, or virtual-memory translation; those are the
//! responsibility of whatever embeds a [`hart::Hart`] and drives it
//! through the [`host::Host`] trait.
#![forbid(unsafe_code)]

pub mod config;
pub mod csr;
pub mod hart;
pub mod host;
pub mod mode;
pub mod trap;

pub use config::HartConfig;
pub use csr::CsrFile;
pub use hart::{Hart, HartSnapshot};
pub use host::Host;
pub use mode::Privilege;
pub use trap::FetchOutcome;
