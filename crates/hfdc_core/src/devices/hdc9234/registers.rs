/*
    MartyPC
    https://github.com/dbalsom/martypc

    Copyright 2022-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    devices::hdc9234::registers.rs

    The HDC9234 register file and its status bit definitions.

    The chip has separate read and write register banks behind one
    auto-incrementing pointer. The DMA address and the desired/current sector
    registers (0-3) are a single physical storage shared by both banks; the
    remaining registers are distinct per direction.
*/

use modular_bitfield::{bitfield, prelude::*};

pub const REG_COUNT: usize = 11;
pub const SHARED_REG_COUNT: usize = 4;

// Registers shared between both banks
pub const REG_DMA7_0: usize = 0;
pub const REG_DMA15_8: usize = 1;
pub const REG_DMA23_16: usize = 2;
pub const REG_DESIRED_SECTOR: usize = 3;

// Write-only registers
pub const REG_DESIRED_HEAD: usize = 4;
pub const REG_DESIRED_CYLINDER: usize = 5;
pub const REG_SECTOR_COUNT: usize = 6;
pub const REG_RETRY_COUNT: usize = 7;
pub const REG_MODE: usize = 8;
pub const REG_TERM_CONDITIONS: usize = 9;

// Read-only registers
pub const REG_CURRENT_HEAD: usize = 4;
pub const REG_CURRENT_CYLINDER: usize = 5;
pub const REG_CURRENT_IDENT: usize = 6;
pub const REG_TEMP_STORAGE: usize = 7;
pub const REG_CHIP_STATUS: usize = 8;
pub const REG_DRIVE_STATUS: usize = 9;

/// The data register in either bank. The pointer never advances past it.
pub const REG_DATA: usize = 10;

pub const REG_NAMES_WRITE: [&str; REG_COUNT] = [
    "DMA7_0",
    "DMA15_8",
    "DMA23_16",
    "DESIRED_SECTOR",
    "DESIRED_HEAD",
    "DESIRED_CYLINDER",
    "SECTOR_COUNT",
    "RETRY_COUNT",
    "MODE",
    "TERM_CONDITIONS",
    "DATA",
];

pub const REG_NAMES_READ: [&str; REG_COUNT] = [
    "DMA7_0",
    "DMA15_8",
    "DMA23_16",
    "CURRENT_SECTOR",
    "CURRENT_HEAD",
    "CURRENT_CYLINDER",
    "CURRENT_IDENT",
    "TEMP_STORAGE",
    "CHIP_STATUS",
    "DRIVE_STATUS",
    "DATA",
];

// Interrupt status register
pub const INT_PENDING: u8 = 0b1000_0000;
pub const INT_DMA_REQUEST: u8 = 0b0100_0000;
pub const INT_DONE: u8 = 0b0010_0000;
pub const INT_TERM_CODE_MASK: u8 = 0b0001_1000;
pub const INT_READY_CHANGE: u8 = 0b0000_0100;
pub const INT_OVERRUN: u8 = 0b0000_0010;
pub const INT_BAD_SECTOR: u8 = 0b0000_0001;

// Termination conditions register. CRC preset (bit 7), terminate on deleted
// data (bit 4) and terminate on DSTAT3 (bit 3) are accepted and ignored.
pub const TC_INT_DONE: u8 = 0b0010_0000;
pub const TC_TERM_WRPROT: u8 = 0b0000_0100;
pub const TC_INT_READY_CHANGE: u8 = 0b0000_0010;
pub const TC_TERM_WRFAULT: u8 = 0b0000_0001;

// Chip status register
pub const CS_RETRY_REQUIRED: u8 = 0b1000_0000;
pub const CS_ECC_ATTEMPTED: u8 = 0b0100_0000;
pub const CS_ECC_ERROR: u8 = 0b0010_0000;
pub const CS_DELETED_DATA: u8 = 0b0001_0000;
pub const CS_SYNC_ERROR: u8 = 0b0000_1000;
pub const CS_COMPARE_ERROR: u8 = 0b0000_0100;
pub const CS_PRESENT_DRIVE: u8 = 0b0000_0011;

// Drive status register, as read from the auxiliary bus
pub const DS_SELECT_ACK: u8 = 0b1000_0000;
pub const DS_INDEX: u8 = 0b0100_0000;
pub const DS_SEEK_COMPLETE: u8 = 0b0010_0000;
pub const DS_TRACK00: u8 = 0b0001_0000;
pub const DS_DSTAT3: u8 = 0b0000_1000;
pub const DS_WRITE_PROTECT: u8 = 0b0000_0100;
pub const DS_READY: u8 = 0b0000_0010;
pub const DS_WRITE_FAULT: u8 = 0b0000_0001;

// Mode register
pub const MODE_STEP_RATE_MASK: u8 = 0b0000_0111;
pub const MODE_FM: u8 = 0b0001_0000;

/// The retry budget lives in the high nibble of the retry count register.
pub const RETRY_MASK: u8 = 0xF0;
pub const RETRY_UNIT: u8 = 0x10;
/// The low nibble of the retry count register drives the user-programmable
/// outputs on the OUTPUT1 latch.
pub const USER_OUTPUT_MASK: u8 = 0x0F;

/// Operand of the DRIVE SELECT command (opcodes 0x20-0x3F).
#[bitfield]
#[derive(Copy, Clone, Debug)]
pub struct DriveSelectOperand {
    pub unit: B2,
    pub drive_type: B2,
    pub head_load_delay: bool,
    #[skip]
    unused: B3,
}

/// Contents of the OUTPUT2 auxiliary latch.
#[bitfield]
#[derive(Copy, Clone, Debug)]
pub struct Output2Latch {
    pub head: B4,
    pub reduced_write_current: bool,
    pub direction_in: bool,
    pub step_pulse: bool,
    pub write_gate: bool,
}

#[derive(Clone, Debug, Default)]
pub struct RegisterFile {
    shared: [u8; SHARED_REG_COUNT],
    write: [u8; REG_COUNT],
    read: [u8; REG_COUNT],
    pointer: usize,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Value of a write-side register.
    #[inline]
    pub fn w(&self, reg: usize) -> u8 {
        if reg < SHARED_REG_COUNT {
            self.shared[reg]
        }
        else {
            self.write[reg]
        }
    }

    #[inline]
    pub fn set_w(&mut self, reg: usize, value: u8) {
        if reg < SHARED_REG_COUNT {
            self.shared[reg] = value;
        }
        else {
            self.write[reg] = value;
        }
    }

    /// Value of a read-side register.
    #[inline]
    pub fn r(&self, reg: usize) -> u8 {
        if reg < SHARED_REG_COUNT {
            self.shared[reg]
        }
        else {
            self.read[reg]
        }
    }

    #[inline]
    pub fn set_r(&mut self, reg: usize, value: u8) {
        if reg < SHARED_REG_COUNT {
            self.shared[reg] = value;
        }
        else {
            self.read[reg] = value;
        }
    }

    #[inline]
    pub fn pointer(&self) -> usize {
        self.pointer
    }

    /// Set the register pointer. Returns false, leaving the pointer
    /// unchanged, if `reg` does not address a register.
    pub fn set_pointer(&mut self, reg: usize) -> bool {
        if reg > REG_DATA {
            return false;
        }
        self.pointer = reg;
        true
    }

    fn advance(&mut self) {
        if self.pointer < REG_DATA {
            self.pointer += 1;
        }
    }

    /// Read the register addressed by the pointer and advance it.
    pub fn read_next(&mut self) -> u8 {
        let value = self.r(self.pointer);
        self.advance();
        value
    }

    /// Write the register addressed by the pointer and advance it.
    pub fn write_next(&mut self, value: u8) {
        self.set_w(self.pointer, value);
        self.advance();
    }

    /// The 24-bit DMA address held in registers 0-2.
    pub fn dma_address(&self) -> u32 {
        (self.shared[REG_DMA23_16] as u32) << 16 | (self.shared[REG_DMA15_8] as u32) << 8 | self.shared[REG_DMA7_0] as u32
    }

    pub fn set_dma_address(&mut self, address: u32) {
        self.shared[REG_DMA7_0] = (address & 0xFF) as u8;
        self.shared[REG_DMA15_8] = ((address >> 8) & 0xFF) as u8;
        self.shared[REG_DMA23_16] = ((address >> 16) & 0xFF) as u8;
    }

    /// Advance the DMA address by `count` bytes, wrapping at 24 bits.
    pub fn advance_dma_address(&mut self, count: usize) {
        let address = (self.dma_address() as usize).wrapping_add(count) & 0xFF_FFFF;
        self.set_dma_address(address as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_stops_at_data() {
        let mut regs = RegisterFile::new();
        for i in 0..REG_COUNT as u8 + 4 {
            regs.write_next(i);
        }
        assert_eq!(regs.pointer(), REG_DATA);
        // Writes past the end all landed in DATA.
        assert_eq!(regs.w(REG_DATA), REG_COUNT as u8 + 3);
        assert_eq!(regs.w(REG_TERM_CONDITIONS), REG_TERM_CONDITIONS as u8);
    }

    #[test]
    fn shared_registers_mirror() {
        let mut regs = RegisterFile::new();
        regs.write_next(0x11);
        regs.write_next(0x22);
        regs.write_next(0x33);
        regs.write_next(0x44);
        regs.write_next(0x55);

        assert!(regs.set_pointer(REG_DMA7_0));
        assert_eq!(regs.read_next(), 0x11);
        assert_eq!(regs.read_next(), 0x22);
        assert_eq!(regs.read_next(), 0x33);
        assert_eq!(regs.read_next(), 0x44);
        // DESIRED_HEAD is write-only; CURRENT_HEAD is untouched.
        assert_eq!(regs.read_next(), 0x00);
        assert_eq!(regs.w(REG_DESIRED_HEAD), 0x55);

        regs.set_r(REG_DESIRED_SECTOR, 0x99);
        assert_eq!(regs.w(REG_DESIRED_SECTOR), 0x99);
    }

    #[test]
    fn invalid_pointer_is_rejected() {
        let mut regs = RegisterFile::new();
        assert!(regs.set_pointer(REG_MODE));
        assert!(!regs.set_pointer(11));
        assert_eq!(regs.pointer(), REG_MODE);
    }

    #[test]
    fn dma_address_wraps() {
        let mut regs = RegisterFile::new();
        regs.set_dma_address(0xFF_FFF0);
        regs.advance_dma_address(0x20);
        assert_eq!(regs.dma_address(), 0x10);
        assert_eq!(regs.r(REG_DMA23_16), 0x00);
    }

    #[test]
    fn drive_select_operand() {
        let operand = DriveSelectOperand::from_bytes([0x3E & 0x1F]);
        assert_eq!(operand.unit(), 2);
        assert_eq!(operand.drive_type(), 3);
        assert!(operand.head_load_delay());
    }
}
