//! Hardware command buffer sink

use crate::error::IqError;
use crate::lut::{DmiBuffer, LutBank};

/// Packet opcode for a contiguous register write
pub const OP_REG_RANGE: u32 = 0x1;
/// Packet opcode for a DMI table upload
pub const OP_DMI: u32 = 0x2;

/// Default command buffer size in dwords
pub const DEFAULT_CMD_BUFFER_DWORDS: usize = 4096;

/// Narrow interface modules emit their configuration through
pub trait CommandSink {
    /// Write `values` to consecutive registers starting at `start_register`
    fn write_reg_range(&mut self, start_register: u32, values: &[u32]) -> Result<(), IqError>;

    /// Upload `byte_length` bytes of `dmi` starting at `byte_offset` into
    /// the LUT bank selected by `bank`, through `dmi_config_register`
    fn write_dmi(
        &mut self,
        dmi_config_register: u32,
        bank: LutBank,
        dmi: &DmiBuffer,
        byte_offset: usize,
        byte_length: usize,
    ) -> Result<(), IqError>;

    /// Position a later `rewind` returns to
    fn mark(&self) -> usize;

    /// Discard every packet written after `mark`
    fn rewind(&mut self, mark: usize);
}

/// Decoded view of one packet, used by tests and frame reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CmdPacket {
    RegRange { start: u32, values: Vec<u32> },
    Dmi { config_register: u32, bank: LutBank, data: Vec<u32> },
}

/// In-memory command buffer.
///
/// Packet layout:
/// - register range: `[OP_REG_RANGE << 24 | len, start_register, values..]`
/// - DMI upload: `[OP_DMI << 24 | len, config_register, bank_select, data..]`
#[derive(Debug, Clone)]
pub struct CmdBuffer {
    dwords: Vec<u32>,
    capacity: usize,
}

impl CmdBuffer {
    /// Create a buffer holding at most `capacity` dwords
    pub fn new(capacity: usize) -> Self {
        Self {
            dwords: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Number of dwords written so far
    pub fn len(&self) -> usize {
        self.dwords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dwords.is_empty()
    }

    /// Raw command stream
    pub fn as_dwords(&self) -> &[u32] {
        &self.dwords
    }

    /// Drop all packets; called by the driver between frames
    pub fn reset(&mut self) {
        self.dwords.clear();
    }

    fn reserve_packet(&mut self, needed: usize) -> Result<(), IqError> {
        let available = self.capacity - self.dwords.len();
        if needed > available {
            return Err(IqError::CommandBuffer { needed, available });
        }
        Ok(())
    }

    /// Decode the stream into packets
    pub fn packets(&self) -> Vec<CmdPacket> {
        let mut packets = Vec::new();
        let mut pos = 0;
        while pos + 1 < self.dwords.len() {
            let header = self.dwords[pos];
            let opcode = header >> 24;
            let len = (header & 0x00FF_FFFF) as usize;
            match opcode {
                OP_REG_RANGE => {
                    let start = self.dwords[pos + 1];
                    let values = self.dwords[pos + 2..pos + 2 + len].to_vec();
                    packets.push(CmdPacket::RegRange { start, values });
                    pos += 2 + len;
                }
                OP_DMI => {
                    let config_register = self.dwords[pos + 1];
                    let bank = if self.dwords[pos + 2] == 0 {
                        LutBank::Bank0
                    } else {
                        LutBank::Bank1
                    };
                    let data = self.dwords[pos + 3..pos + 3 + len].to_vec();
                    packets.push(CmdPacket::Dmi {
                        config_register,
                        bank,
                        data,
                    });
                    pos += 3 + len;
                }
                _ => break,
            }
        }
        packets
    }
}

impl Default for CmdBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CMD_BUFFER_DWORDS)
    }
}

impl CommandSink for CmdBuffer {
    fn write_reg_range(&mut self, start_register: u32, values: &[u32]) -> Result<(), IqError> {
        if values.is_empty() {
            return Err(IqError::InvalidArgument(format!(
                "empty register range at {:#06X}",
                start_register
            )));
        }
        self.reserve_packet(2 + values.len())?;

        self.dwords.push((OP_REG_RANGE << 24) | values.len() as u32);
        self.dwords.push(start_register);
        self.dwords.extend_from_slice(values);
        Ok(())
    }

    fn write_dmi(
        &mut self,
        dmi_config_register: u32,
        bank: LutBank,
        dmi: &DmiBuffer,
        byte_offset: usize,
        byte_length: usize,
    ) -> Result<(), IqError> {
        if byte_offset % 4 != 0 || byte_length % 4 != 0 || byte_length == 0 {
            return Err(IqError::InvalidArgument(format!(
                "DMI range {}+{} not dword aligned",
                byte_offset, byte_length
            )));
        }
        if byte_offset + byte_length > dmi.len_bytes() {
            return Err(IqError::InvalidArgument(format!(
                "DMI range {}+{} exceeds table of {} bytes",
                byte_offset,
                byte_length,
                dmi.len_bytes()
            )));
        }

        let first = byte_offset / 4;
        let count = byte_length / 4;
        self.reserve_packet(3 + count)?;

        self.dwords.push((OP_DMI << 24) | count as u32);
        self.dwords.push(dmi_config_register);
        self.dwords.push(bank.select_bits());
        self.dwords
            .extend_from_slice(&dmi.words()[first..first + count]);
        Ok(())
    }

    fn mark(&self) -> usize {
        self.dwords.len()
    }

    fn rewind(&mut self, mark: usize) {
        self.dwords.truncate(mark);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reg_range_packet() {
        let mut buffer = CmdBuffer::new(16);
        buffer.write_reg_range(0x0540, &[1, 2, 3]).unwrap();
        assert_eq!(buffer.len(), 5);
        assert_eq!(
            buffer.packets(),
            vec![CmdPacket::RegRange { start: 0x0540, values: vec![1, 2, 3] }]
        );
    }

    #[test]
    fn test_dmi_packet_slices_table() {
        let mut table = DmiBuffer::new(4);
        table.words_mut().copy_from_slice(&[10, 11, 12, 13]);

        let mut buffer = CmdBuffer::new(16);
        buffer.write_dmi(0x0C24, LutBank::Bank1, &table, 4, 8).unwrap();
        assert_eq!(
            buffer.packets(),
            vec![CmdPacket::Dmi { config_register: 0x0C24, bank: LutBank::Bank1, data: vec![11, 12] }]
        );
    }

    #[test]
    fn test_overflow_leaves_buffer_untouched() {
        let mut buffer = CmdBuffer::new(4);
        let err = buffer.write_reg_range(0x10, &[0; 3]).unwrap_err();
        assert!(matches!(err, IqError::CommandBuffer { needed: 5, available: 4 }));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_dmi_out_of_range() {
        let table = DmiBuffer::new(2);
        let mut buffer = CmdBuffer::default();
        assert!(buffer.write_dmi(0x0C24, LutBank::Bank0, &table, 4, 8).is_err());
        assert!(buffer.write_dmi(0x0C24, LutBank::Bank0, &table, 1, 4).is_err());
    }

    #[test]
    fn test_rewind_drops_packets_after_mark() {
        let mut buffer = CmdBuffer::new(16);
        buffer.write_reg_range(0x10, &[1]).unwrap();
        let mark = buffer.mark();
        buffer.write_reg_range(0x20, &[2, 3]).unwrap();
        buffer.rewind(mark);
        assert_eq!(buffer.packets(), vec![CmdPacket::RegRange { start: 0x10, values: vec![1] }]);
    }
}
