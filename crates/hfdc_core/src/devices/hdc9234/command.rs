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

    devices::hdc9234::command.rs

    Opcode decoding for the HDC9234 command set.
*/

use std::fmt::Display;

use crate::{
    device_types::hdc9234::DriveType,
    devices::hdc9234::{host::StepDirection, registers::DriveSelectOperand},
};

pub const OP_RESET: u8 = 0x00;
pub const OP_DESELECT: u8 = 0x01;
pub const OP_RESTORE: u8 = 0x02;
pub const OP_STEP: u8 = 0x04;
pub const OP_TAPE_BACKUP: u8 = 0x08;
pub const OP_POLL_DRIVES: u8 = 0x10;
pub const OP_DRIVE_SELECT: u8 = 0x20;
pub const OP_SET_REGISTER_POINTER: u8 = 0x40;
pub const OP_SEEK_READ_ID: u8 = 0x50;
pub const OP_READ: u8 = 0x58;
pub const OP_FORMAT_TRACK: u8 = 0x60;
pub const OP_WRITE: u8 = 0x80;

/// How READ SECTORS finds each sector.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReadMode {
    /// Take sectors in on-disk order after an implied seek.
    Physical,
    /// Ascending sector numbers after an implied seek.
    LogicalSeek,
    /// Ascending sector numbers on the current track.
    LogicalNoSeek,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Command {
    #[default]
    NoCommand,
    Reset,
    DeselectDrive,
    Restore {
        buffered: bool,
    },
    Step {
        direction: StepDirection,
        buffered: bool,
    },
    TapeBackup(u8),
    PollDrives {
        mask: u8,
    },
    DriveSelect {
        unit: u8,
        drive_type: DriveType,
        head_load_delay: bool,
    },
    SetRegisterPointer(u8),
    SeekReadId {
        step: bool,
        wait_seek_complete: bool,
        verify: bool,
    },
    ReadSectors {
        mode: ReadMode,
        transfer: bool,
    },
    ReadTrack {
        transfer: bool,
    },
    FormatTrack {
        deleted: bool,
        reduced_current: bool,
        precompensation: u8,
    },
    WriteSectors {
        implied_seek: bool,
        logical: bool,
        deleted: bool,
        reduced_current: bool,
        precompensation: u8,
    },
}

impl Command {
    pub fn decode(opcode: u8) -> Command {
        match opcode {
            OP_RESET => Command::Reset,
            OP_DESELECT => Command::DeselectDrive,
            0x02..=0x03 => Command::Restore {
                buffered: opcode & 0x01 != 0,
            },
            0x04..=0x07 => Command::Step {
                direction: if opcode & 0x02 != 0 {
                    StepDirection::Out
                }
                else {
                    StepDirection::In
                },
                buffered: opcode & 0x01 != 0,
            },
            0x08..=0x0F => Command::TapeBackup(opcode),
            0x10..=0x1F => Command::PollDrives { mask: opcode & 0x0F },
            0x20..=0x3F => {
                let operand = DriveSelectOperand::from_bytes([opcode & 0x1F]);
                Command::DriveSelect {
                    unit: operand.unit(),
                    drive_type: DriveType::from_bits(operand.drive_type()),
                    head_load_delay: operand.head_load_delay(),
                }
            }
            0x40..=0x4F => Command::SetRegisterPointer(opcode & 0x0F),
            0x50..=0x57 => Command::SeekReadId {
                step: opcode & 0x04 != 0,
                wait_seek_complete: opcode & 0x02 != 0,
                verify: opcode & 0x01 != 0,
            },
            0x58..=0x5F => {
                let transfer = opcode & 0x01 != 0;
                match (opcode >> 1) & 0x03 {
                    0 => Command::ReadSectors {
                        mode: ReadMode::Physical,
                        transfer,
                    },
                    1 => Command::ReadTrack { transfer },
                    2 => Command::ReadSectors {
                        mode: ReadMode::LogicalSeek,
                        transfer,
                    },
                    _ => Command::ReadSectors {
                        mode: ReadMode::LogicalNoSeek,
                        transfer,
                    },
                }
            }
            0x60..=0x7F => Command::FormatTrack {
                deleted: opcode & 0x10 != 0,
                reduced_current: opcode & 0x08 != 0,
                precompensation: opcode & 0x07,
            },
            _ => Command::WriteSectors {
                implied_seek: opcode & 0x40 == 0,
                logical: opcode & 0x20 != 0,
                deleted: opcode & 0x10 != 0,
                reduced_current: opcode & 0x08 != 0,
                precompensation: opcode & 0x07,
            },
        }
    }

    /// True for commands that address the selected drive's medium.
    pub fn uses_drive(&self) -> bool {
        matches!(
            self,
            Command::Restore { .. }
                | Command::Step { .. }
                | Command::SeekReadId { .. }
                | Command::ReadSectors { .. }
                | Command::ReadTrack { .. }
                | Command::FormatTrack { .. }
                | Command::WriteSectors { .. }
        )
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::NoCommand => write!(f, "No Command"),
            Command::Reset => write!(f, "Reset"),
            Command::DeselectDrive => write!(f, "Deselect Drive"),
            Command::Restore { buffered } => write!(f, "Restore Drive (buffered: {})", buffered),
            Command::Step { direction, buffered } => {
                write!(f, "Step {:?} (buffered: {})", direction, buffered)
            }
            Command::TapeBackup(op) => write!(f, "Tape Backup ({:02X})", op),
            Command::PollDrives { mask } => write!(f, "Poll Drives (mask: {:04b})", mask),
            Command::DriveSelect {
                unit,
                drive_type,
                head_load_delay,
            } => write!(
                f,
                "Drive Select (unit: {} type: {} head load: {})",
                unit, drive_type, head_load_delay
            ),
            Command::SetRegisterPointer(reg) => write!(f, "Set Register Pointer ({})", reg),
            Command::SeekReadId {
                step,
                wait_seek_complete,
                verify,
            } => write!(
                f,
                "Seek/Read ID (step: {} wait: {} verify: {})",
                step, wait_seek_complete, verify
            ),
            Command::ReadSectors { mode, transfer } => {
                write!(f, "Read Sectors {:?} (transfer: {})", mode, transfer)
            }
            Command::ReadTrack { transfer } => write!(f, "Read Track (transfer: {})", transfer),
            Command::FormatTrack { deleted, .. } => write!(f, "Format Track (deleted: {})", deleted),
            Command::WriteSectors {
                implied_seek,
                logical,
                deleted,
                ..
            } => write!(
                f,
                "Write Sectors {} (implied seek: {} deleted: {})",
                if *logical { "Logical" } else { "Physical" },
                implied_seek,
                deleted
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_ranges() {
        assert_eq!(Command::decode(0x00), Command::Reset);
        assert_eq!(Command::decode(0x03), Command::Restore { buffered: true });
        assert_eq!(
            Command::decode(0x06),
            Command::Step {
                direction: StepDirection::Out,
                buffered: false
            }
        );
        assert_eq!(Command::decode(0x1A), Command::PollDrives { mask: 0x0A });
        assert_eq!(
            Command::decode(0x2D),
            Command::DriveSelect {
                unit: 1,
                drive_type: DriveType::Floppy5,
                head_load_delay: false
            }
        );
        assert_eq!(Command::decode(0x4A), Command::SetRegisterPointer(10));
        assert_eq!(
            Command::decode(0x55),
            Command::SeekReadId {
                step: true,
                wait_seek_complete: false,
                verify: true
            }
        );
    }

    #[test]
    fn decode_read_family() {
        assert_eq!(
            Command::decode(0x59),
            Command::ReadSectors {
                mode: ReadMode::Physical,
                transfer: true
            }
        );
        assert_eq!(Command::decode(0x5A), Command::ReadTrack { transfer: false });
        assert_eq!(
            Command::decode(0x5D),
            Command::ReadSectors {
                mode: ReadMode::LogicalSeek,
                transfer: true
            }
        );
        assert_eq!(
            Command::decode(0x5E),
            Command::ReadSectors {
                mode: ReadMode::LogicalNoSeek,
                transfer: false
            }
        );
    }

    #[test]
    fn decode_write_family() {
        assert_eq!(
            Command::decode(0xA0),
            Command::WriteSectors {
                implied_seek: true,
                logical: true,
                deleted: false,
                reduced_current: false,
                precompensation: 0
            }
        );
        assert!(matches!(
            Command::decode(0xDF),
            Command::WriteSectors {
                implied_seek: false,
                logical: false,
                deleted: true,
                reduced_current: true,
                precompensation: 7
            }
        ));
        assert!(matches!(
            Command::decode(0x71),
            Command::FormatTrack {
                deleted: true,
                precompensation: 1,
                ..
            }
        ));
    }
}
