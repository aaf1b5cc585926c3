//! # Simulated Register File
//!
//! A [`RegisterIo`] implementation backed by memory, used to exercise the
//! control plane without hardware. Reads can be scripted per register,
//! writes are logged and may trigger a hook that plays the firmware.

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;
use core::fmt;

use spin::Mutex;

use crate::io::RegisterIo;
use crate::regs;

/// Callback invoked after every register write
pub type WriteHook = Box<dyn Fn(u32, u32) + Send + Sync>;

/// In-memory register file
#[derive(Default)]
pub struct SimRegisters {
    values: Mutex<BTreeMap<u32, u32>>,
    scripted: Mutex<BTreeMap<u32, VecDeque<u32>>>,
    writes: Mutex<Vec<(u32, u32)>>,
    hook: Mutex<Option<WriteHook>>,
}

impl SimRegisters {
    /// Empty register file, every register reads zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the steady-state value of a register
    pub fn set(&self, offset: u32, value: u32) {
        self.values.lock().insert(offset, value);
    }

    /// Queue values returned by successive reads before falling back to
    /// the steady-state value
    pub fn script(&self, offset: u32, values: &[u32]) {
        self.scripted
            .lock()
            .entry(offset)
            .or_default()
            .extend(values.iter().copied());
    }

    /// Install the write hook
    pub fn on_write<F>(&self, hook: F)
    where
        F: Fn(u32, u32) + Send + Sync + 'static,
    {
        *self.hook.lock() = Some(Box::new(hook));
    }

    /// Writes seen so far, in order
    pub fn writes(&self) -> Vec<(u32, u32)> {
        self.writes.lock().clone()
    }

    /// Writes to one register, in order
    pub fn writes_to(&self, offset: u32) -> Vec<u32> {
        self.writes
            .lock()
            .iter()
            .filter(|(o, _)| *o == offset)
            .map(|(_, v)| *v)
            .collect()
    }

    /// Forget logged writes
    pub fn clear_writes(&self) {
        self.writes.lock().clear();
    }

    /// Load a design-parameter byte stream into the TLV window
    pub fn load_design_params(&self, stream: &[u8]) {
        self.set(regs::ER_GZ_PARAMS_TLV_LEN, stream.len() as u32);
        for (i, chunk) in stream.chunks(4).enumerate() {
            let mut dword = [0u8; 4];
            dword[..chunk.len()].copy_from_slice(chunk);
            self.set(regs::ER_GZ_PARAMS_TLV + 4 * i as u32, u32::from_le_bytes(dword));
        }
    }
}

impl RegisterIo for SimRegisters {
    fn read32(&self, offset: u32) -> u32 {
        if let Some(value) = self
            .scripted
            .lock()
            .get_mut(&offset)
            .and_then(|q| q.pop_front())
        {
            return value;
        }
        self.values.lock().get(&offset).copied().unwrap_or(0)
    }

    fn write32(&self, offset: u32, value: u32) {
        self.values.lock().insert(offset, value);
        self.writes.lock().push((offset, value));
        if let Some(hook) = self.hook.lock().as_ref() {
            hook(offset, value);
        }
    }
}

impl fmt::Debug for SimRegisters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimRegisters")
            .field("values", &*self.values.lock())
            .field("writes", &self.writes.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_reads_then_steady() {
        let regs = SimRegisters::new();
        regs.set(0x10, 7);
        regs.script(0x10, &[1, 2]);
        assert_eq!(regs.read32(0x10), 1);
        assert_eq!(regs.read32(0x10), 2);
        assert_eq!(regs.read32(0x10), 7);
        assert_eq!(regs.read32(0x14), 0);
    }

    #[test]
    fn test_write_log_and_hook() {
        use core::sync::atomic::{AtomicU32, Ordering};
        use alloc::sync::Arc;

        let seen = Arc::new(AtomicU32::new(0));
        let regs = SimRegisters::new();
        let s = seen.clone();
        regs.on_write(move |_, v| s.store(v, Ordering::SeqCst));
        regs.write32(0x200, 3);
        regs.write32(0x204, 4);
        assert_eq!(regs.writes(), alloc::vec![(0x200, 3), (0x204, 4)]);
        assert_eq!(regs.writes_to(0x204), alloc::vec![4]);
        assert_eq!(seen.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_design_param_window() {
        let regs = SimRegisters::new();
        regs.load_design_params(&[0x05, 0x02, 0x34, 0x12, 0x00]);
        assert_eq!(regs.read32(regs::ER_GZ_PARAMS_TLV_LEN), 5);
        assert_eq!(regs.read32(regs::ER_GZ_PARAMS_TLV), 0x1234_0205);
        assert_eq!(regs.read32(regs::ER_GZ_PARAMS_TLV + 4), 0);
    }
}
