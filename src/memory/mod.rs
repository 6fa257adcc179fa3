pub const WRAM_SIZE: usize = 0x20000;

/// 128 KiB work RAM. Banks 7E/7F see all of it, the low 8 KiB is also
/// mirrored into every system bank.
pub struct Wram {
    pub(crate) ram: Vec<u8>,
}

impl Wram {
    pub fn new() -> Self {
        Wram {
            ram: vec![0; WRAM_SIZE],
        }
    }

    pub fn read(&self, index: usize) -> Option<u8> {
        self.ram.get(index).copied()
    }

    pub fn write(&mut self, index: usize, data: u8) -> bool {
        match self.ram.get_mut(index) {
            Some(slot) => {
                *slot = data;
                true
            }
            None => false,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.ram
    }
}

impl Default for Wram {
    fn default() -> Self {
        Self::new()
    }
}
