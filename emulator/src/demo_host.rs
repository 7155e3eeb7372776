//! A minimal [`riscvemu::Host`] implementation backed by a flat byte
//! array, just enough memory to let the REPL probe fetch addresses
//! and watch fault handling without a real instruction decoder.

use riscvemu::Host;

pub struct DemoHost {
    pc: u32,
    memory: Vec<u8>,
    pub synchronous_interrupts: u64,
    pub step_timers_armed: u64,
}

impl DemoHost {
    pub fn new(memory_size: usize) -> Self {
        DemoHost {
            pc: 0,
            memory: vec![0; memory_size],
            synchronous_interrupts: 0,
            step_timers_armed: 0,
        }
    }

    pub fn load(&mut self, address: u32, bytes: &[u8]) {
        let start = address as usize;
        let end = (start + bytes.len()).min(self.memory.len());
        if start < self.memory.len() {
            self.memory[start..end].copy_from_slice(&bytes[..end - start]);
        }
    }
}

impl Host for DemoHost {
    fn pc(&self) -> u32 {
        self.pc
    }

    fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
    }

    fn is_executable(&self, address: u32) -> bool {
        (address as usize) < self.memory.len()
    }

    fn resolve_translation_miss(&mut self, address: u32) -> bool {
        self.is_executable(address)
    }

    fn fetch_instruction_word(&self, address: u32) -> u32 {
        let start = address as usize;
        if start + 4 > self.memory.len() {
            return 0;
        }
        u32::from_le_bytes(self.memory[start..start + 4].try_into().unwrap())
    }

    fn post_synchronous_interrupt(&mut self) {
        self.synchronous_interrupts += 1;
        log::debug!("synchronous interrupt posted ({})", self.synchronous_interrupts);
    }

    fn arm_step_timer(&mut self) {
        self.step_timers_armed += 1;
    }
}
