//! Interactive REPL that drives a [`riscvemu::Hart`] through its
//! external signal ports and trap/return/debug operations, so the
//! trap-and-interrupt core can be poked at without wiring up a real
//! instruction decoder.

mod demo_host;

use clap::{Parser, Subcommand, ValueEnum};
use clap_num::maybe_hex;
use riscvemu::trap::{arbiter, debug, entry, fetch_gate, ports, ret};
use riscvemu::csr::TvecMode;
use riscvemu::{HartConfig, Host, Privilege};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use thiserror::Error;

use demo_host::DemoHost;

type Hart = riscvemu::Hart<DemoHost>;

#[derive(Parser)]
#[command(author, version, about = "REPL demo for the riscvemu trap core")]
struct Cli {
    /// PC on reset.
    #[arg(long, value_parser = maybe_hex::<u32>, default_value = "0")]
    reset_address: u32,
    /// PC on NMI entry.
    #[arg(long, value_parser = maybe_hex::<u32>, default_value = "0")]
    nmi_address: u32,
    /// Number of implementation-defined local interrupt lines.
    #[arg(long, default_value_t = 0)]
    local_interrupts: usize,
    /// Size in bytes of the demo host's flat memory.
    #[arg(long, default_value_t = 1 << 16)]
    memory_size: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    User,
    Supervisor,
    Hypervisor,
    Machine,
}

impl From<ModeArg> for Privilege {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::User => Privilege::User,
            ModeArg::Supervisor => Privilege::Supervisor,
            ModeArg::Hypervisor => Privilege::Hypervisor,
            ModeArg::Machine => Privilege::Machine,
        }
    }
}

#[derive(Parser)]
#[command(no_binary_name = true)]
struct Repl {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print pc, privilege, debug-mode and disable-reason state.
    Status,
    /// Drive the `reset` port.
    Reset { level: bool },
    /// Drive the `nmi` port.
    Nmi { level: bool },
    /// Drive the `haltreq` port.
    Haltreq { level: bool },
    /// Drive the `resethaltreq` port.
    Resethaltreq { level: bool },
    /// Drive local/standard interrupt line `index`.
    Irq { index: usize, level: bool },
    /// Write the software-interrupt-pending shadow.
    Swip {
        #[arg(value_parser = maybe_hex::<u32>)]
        value: u32,
    },
    /// Latch an external-interrupt-ID claim for `mode`.
    Extid {
        mode: ModeArg,
        #[arg(value_parser = maybe_hex::<u32>)]
        id: u32,
    },
    /// Set `xtvec` for `mode`. `vectored` selects Vectored over Direct.
    Tvec {
        mode: ModeArg,
        #[arg(value_parser = maybe_hex::<u32>)]
        base: u32,
        #[arg(long)]
        vectored: bool,
    },
    /// Take an ECALL from the current privilege mode.
    Ecall,
    /// Route an EBREAK through the debug-entry rules.
    Ebreak,
    Mret,
    Sret,
    Uret,
    Dret,
    /// Halt on WFI if nothing is pending.
    Wfi,
    /// Run the fetch gate once against `address`.
    Fetch {
        #[arg(value_parser = maybe_hex::<u32>)]
        address: u32,
        /// Probe only: do not take any architectural action.
        #[arg(long)]
        probe: bool,
    },
    /// Write a 4-byte little-endian word into the demo host's memory.
    Load {
        #[arg(value_parser = maybe_hex::<u32>)]
        address: u32,
        #[arg(value_parser = maybe_hex::<u32>)]
        word: u32,
    },
    /// List the exceptions and interrupts this hart's configuration
    /// implements.
    Exceptions,
    /// Leave the REPL.
    Quit,
}

#[derive(Debug, Error)]
enum ReplError {
    #[error(transparent)]
    Readline(#[from] ReadlineError),
}

fn print_status(hart: &Hart, host: &DemoHost) {
    println!(
        "pc={:#010x} privilege={:?} dm={} disable={:?} mip={:#010x}",
        host.pc(),
        hart.privilege(),
        hart.is_debug_mode(),
        hart.disable(),
        hart.mip(),
    );
}

fn dispatch(command: Command, hart: &mut Hart, host: &mut DemoHost) -> bool {
    match command {
        Command::Status => print_status(hart, host),
        Command::Reset { level } => ports::write_reset(hart, host, level),
        Command::Nmi { level } => ports::write_nmi(hart, host, level),
        Command::Haltreq { level } => ports::write_haltreq(hart, host, level),
        Command::Resethaltreq { level } => ports::write_resethaltreq(hart, host, level),
        Command::Irq { index, level } => ports::write_interrupt_line(hart, host, index, level),
        Command::Swip { value } => ports::write_swip(hart, host, value),
        Command::Extid { mode, id } => ports::write_external_id(hart, host, mode.into(), id),
        Command::Tvec { mode, base, vectored } => {
            let tvec_mode = if vectored { TvecMode::Vectored } else { TvecMode::Direct };
            if let Err(err) = hart.csr_mut().set_tvec(mode.into(), base, tvec_mode) {
                println!("{err}");
            }
        }
        Command::Ecall => {
            let pc = host.pc();
            entry::ecall(hart, host, pc);
        }
        Command::Ebreak => {
            let pc = host.pc();
            debug::ebreak(hart, host, pc);
        }
        Command::Mret => ret::mret(hart, host),
        Command::Sret => ret::sret(hart, host),
        Command::Uret => ret::uret(hart, host),
        Command::Dret => ret::dret(hart, host),
        Command::Wfi => arbiter::wfi(hart, host),
        Command::Fetch { address, probe } => {
            let outcome = fetch_gate(hart, host, address, !probe);
            println!("{outcome:?}");
        }
        Command::Load { address, word } => host.load(address, &word.to_le_bytes()),
        Command::Exceptions => {
            for descriptor in hart.implemented_exceptions() {
                let kind = if descriptor.is_interrupt { "interrupt" } else { "exception" };
                println!("{:>3} {kind:<9} {:<24} {}", descriptor.code, descriptor.name, descriptor.description);
            }
        }
        Command::Quit => return true,
    }
    false
}

fn run() -> Result<(), ReplError> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = HartConfig::default();
    config.reset_address = cli.reset_address;
    config.nmi_address = cli.nmi_address;
    config.local_interrupt_count = cli.local_interrupts;

    let mut hart = Hart::new(config);
    let mut host = DemoHost::new(cli.memory_size);
    ports::write_reset(&mut hart, &mut host, true);
    ports::write_reset(&mut hart, &mut host, false);

    println!("riscvemu trap core demo. Type a command (`status`, `--help` lists all), `quit` to exit.");
    let mut editor = DefaultEditor::new()?;
    loop {
        let line = match editor.readline("hart> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        editor.add_history_entry(trimmed).ok();

        let words = match shell_words(trimmed) {
            Some(words) => words,
            None => {
                println!("unbalanced quotes");
                continue;
            }
        };
        match Repl::try_parse_from(words) {
            Ok(repl) => {
                if dispatch(repl.command, &mut hart, &mut host) {
                    break;
                }
            }
            Err(err) => println!("{err}"),
        }
    }
    Ok(())
}

/// Minimal whitespace/quote tokenizer; enough for REPL input without
/// pulling in a full shell-parsing crate.
fn shell_words(input: &str) -> Option<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_current = false;
    for c in input.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_current = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_current {
                    words.push(std::mem::take(&mut current));
                    has_current = false;
                }
            }
            c => {
                current.push(c);
                has_current = true;
            }
        }
    }
    if in_quotes {
        return None;
    }
    if has_current {
        words.push(current);
    }
    Some(words)
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
