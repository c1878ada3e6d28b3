//! CRC-8 (polynomial 0x07, init 0x00, no reflection, no final xor).

const POLYNOMIAL: u8 = 0x07;

static TABLE: [u8; 256] = build_table();

const fn build_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Checksum of `bytes`. Empty input yields 0.
pub fn compute(bytes: &[u8]) -> u8 {
    let mut digest = Crc8Digest::new();
    digest.update(bytes);
    digest.finish()
}

/// True when `compute(bytes) == expected`.
pub fn verify(bytes: &[u8], expected: u8) -> bool {
    compute(bytes) == expected
}

/// Incremental CRC-8 over several spans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc8Digest {
    crc: u8,
}

impl Crc8Digest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.crc = TABLE[usize::from(self.crc ^ byte)];
        }
    }

    pub fn finish(self) -> u8 {
        self.crc
    }
}
