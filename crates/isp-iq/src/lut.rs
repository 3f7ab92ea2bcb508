//! Double-buffered DMI lookup tables

use serde::{Deserialize, Serialize};

/// Hardware LUT bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LutBank {
    Bank0,
    Bank1,
}

impl LutBank {
    /// The other bank
    pub fn toggled(self) -> Self {
        match self {
            LutBank::Bank0 => LutBank::Bank1,
            LutBank::Bank1 => LutBank::Bank0,
        }
    }

    /// Bank-select register value
    pub fn select_bits(self) -> u32 {
        match self {
            LutBank::Bank0 => 0,
            LutBank::Bank1 => 1,
        }
    }
}

/// Owned table memory for one DMI bank
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmiBuffer {
    words: Vec<u32>,
}

impl DmiBuffer {
    /// Zeroed table of `entries` dwords
    pub fn new(entries: usize) -> Self {
        Self {
            words: vec![0; entries],
        }
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn words_mut(&mut self) -> &mut [u32] {
        &mut self.words
    }

    pub fn len_bytes(&self) -> usize {
        self.words.len() * 4
    }
}

/// Two LUT banks that alternate on every successful emit.
///
/// New content is staged into the bank the hardware is not reading; the
/// bank only flips once the DMI write for it made it into the command
/// buffer.
#[derive(Debug, Clone)]
pub struct DoubleBufferedLut {
    banks: [DmiBuffer; 2],
    next: LutBank,
    committed: Option<LutBank>,
}

impl DoubleBufferedLut {
    /// Create two banks of `entries` dwords each
    pub fn new(entries: usize) -> Self {
        Self {
            banks: [DmiBuffer::new(entries), DmiBuffer::new(entries)],
            next: LutBank::Bank0,
            committed: None,
        }
    }

    fn index(bank: LutBank) -> usize {
        match bank {
            LutBank::Bank0 => 0,
            LutBank::Bank1 => 1,
        }
    }

    /// Bank the next emit will target
    pub fn staged_bank(&self) -> LutBank {
        self.next
    }

    /// Table the next emit will send
    pub fn staged(&self) -> &DmiBuffer {
        &self.banks[Self::index(self.next)]
    }

    /// Mutable access to the staging table
    pub fn staged_mut(&mut self) -> &mut DmiBuffer {
        &mut self.banks[Self::index(self.next)]
    }

    /// Bank the hardware was last told to read, if any
    pub fn committed_bank(&self) -> Option<LutBank> {
        self.committed
    }

    /// Mark the staged bank as emitted and flip
    pub fn commit(&mut self) {
        self.committed = Some(self.next);
        self.next = self.next.toggled();
    }
}
