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

    devices::hdc9234::track.rs

    Raw track images. Builds the byte sequence the controller lays down when
    formatting a track and parses a raw track back into its sectors. Supports
    MFM and FM encodings and the full or abbreviated (no index mark) layout.
*/

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::{
    device_types::hdc9234::{at_ident_to_cylinder_base, DriveType, SectorId, TrackEncoding, IDENT_DEFAULT},
    devices::hdc9234::crc::{crc16, data_field_crc},
};

pub const MFM_GAP_BYTE: u8 = 0x4E;
pub const FM_GAP_BYTE: u8 = 0xFF;
pub const SYNC_BYTE: u8 = 0x00;
pub const MFM_SYNC_LEN: usize = 12;
pub const FM_SYNC_LEN: usize = 6;
pub const MFM_MARK_PREFIX: u8 = 0xA1;
pub const MFM_INDEX_PREFIX: u8 = 0xC2;
pub const MARK_PREFIX_LEN: usize = 3;

pub const INDEX_MARK: u8 = 0xFC;
pub const DATA_MARK: u8 = 0xFB;
pub const DELETED_DATA_MARK: u8 = 0xF8;
pub const FORMAT_FILL_BYTE: u8 = 0xE5;

pub const ID_FIELD_LEN: usize = 5;
pub const CRC_LEN: usize = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TrackError {
    #[error("Track ended inside a field at offset {0}")]
    Truncated(usize),
    #[error("No data mark follows the ID field at offset {0}")]
    MissingDataMark(usize),
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TrackLayout {
    /// Sync, index address mark and gap 1 follow the lead-in gap.
    Full,
    #[default]
    Abbreviated,
}

/// Gap lengths in bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TrackGaps {
    pub gap0: usize,
    pub gap1: usize,
    pub gap2: usize,
    pub gap3: usize,
}

lazy_static! {
    /// Gap sizes used when a track has to be synthesized from sector data.
    pub static ref STANDARD_GAPS: HashMap<(DriveType, TrackEncoding), TrackGaps> = {
        let fd_mfm = TrackGaps { gap0: 80, gap1: 50, gap2: 22, gap3: 24 };
        let fd_fm = TrackGaps { gap0: 40, gap1: 26, gap2: 11, gap3: 45 };
        let hd = TrackGaps { gap0: 16, gap1: 16, gap2: 3, gap3: 18 };

        let mut map = HashMap::new();
        map.insert((DriveType::Floppy5, TrackEncoding::Mfm), fd_mfm);
        map.insert((DriveType::Floppy5, TrackEncoding::Fm), fd_fm);
        map.insert((DriveType::Floppy8, TrackEncoding::Mfm), fd_mfm);
        map.insert((DriveType::Floppy8, TrackEncoding::Fm), fd_fm);
        map.insert((DriveType::AtHardDisk, TrackEncoding::Mfm), hd);
        map.insert((DriveType::SmcHardDisk, TrackEncoding::Mfm), hd);
        map
    };
}

/// The five bytes of an ID field as recorded on the track.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct IdField {
    pub ident: u8,
    pub cylinder: u8,
    pub head: u8,
    pub sector: u8,
    pub size: u8,
}

impl From<[u8; ID_FIELD_LEN]> for IdField {
    fn from(bytes: [u8; ID_FIELD_LEN]) -> Self {
        Self {
            ident: bytes[0],
            cylinder: bytes[1],
            head: bytes[2],
            sector: bytes[3],
            size: bytes[4],
        }
    }
}

impl IdField {
    pub fn to_bytes(&self) -> [u8; ID_FIELD_LEN] {
        [self.ident, self.cylinder, self.head, self.sector, self.size]
    }

    pub fn crc(&self) -> u16 {
        crc16(&self.to_bytes())
    }

    /// Pack a sector address the way `drive_type` records it. AT drives keep
    /// the cylinder band in the ident byte; SMC drives keep cylinder bits
    /// 10-8 in bits 6-4 of the head byte.
    pub fn encode(id: &SectorId, drive_type: DriveType) -> Self {
        let head = match drive_type {
            DriveType::SmcHardDisk => (((id.cylinder >> 4) & 0x70) as u8) | (id.head & 0x0F),
            _ => id.head & 0x0F,
        };
        Self {
            ident: id.ident(drive_type),
            cylinder: (id.cylinder & 0xFF) as u8,
            head,
            sector: id.sector,
            size: id.size,
        }
    }

    pub fn decode(&self, drive_type: DriveType) -> SectorId {
        let (cylinder, head) = match drive_type {
            DriveType::AtHardDisk => (
                at_ident_to_cylinder_base(self.ident) | self.cylinder as u16,
                self.head & 0x0F,
            ),
            DriveType::SmcHardDisk => (
                (((self.head & 0x70) as u16) << 4) | self.cylinder as u16,
                self.head & 0x0F,
            ),
            _ => (self.cylinder as u16, self.head),
        };
        SectorId::new(cylinder, head, self.sector, self.size)
    }

    #[inline]
    pub fn sector_len(&self) -> usize {
        128usize << (self.size & 0x07)
    }
}

/// Layout parameters for building a track.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TrackFormat {
    pub layout: TrackLayout,
    pub encoding: TrackEncoding,
    pub gaps: TrackGaps,
    pub track_size: usize,
}

impl TrackFormat {
    pub fn standard(drive_type: DriveType, encoding: TrackEncoding, layout: TrackLayout) -> Self {
        let encoding = drive_type.encoding(encoding == TrackEncoding::Fm);
        let gaps = STANDARD_GAPS
            .get(&(drive_type, encoding))
            .copied()
            .unwrap_or(TrackGaps {
                gap0: 16,
                gap1: 16,
                gap2: 3,
                gap3: 18,
            });
        Self {
            layout,
            encoding,
            gaps,
            track_size: drive_type.track_size(encoding),
        }
    }

    #[inline]
    pub fn gap_byte(&self) -> u8 {
        match self.encoding {
            TrackEncoding::Mfm => MFM_GAP_BYTE,
            TrackEncoding::Fm => FM_GAP_BYTE,
        }
    }

    #[inline]
    pub fn sync_len(&self) -> usize {
        match self.encoding {
            TrackEncoding::Mfm => MFM_SYNC_LEN,
            TrackEncoding::Fm => FM_SYNC_LEN,
        }
    }
}

/// One sector as laid down on, or recovered from, a raw track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackSector {
    pub id: IdField,
    pub deleted: bool,
    pub data: Vec<u8>,
    pub id_crc_ok: bool,
    pub data_crc_ok: bool,
}

impl TrackSector {
    pub fn new(id: IdField, deleted: bool, data: Vec<u8>) -> Self {
        Self {
            id,
            deleted,
            data,
            id_crc_ok: true,
            data_crc_ok: true,
        }
    }

    /// A freshly formatted sector: fill bytes sized by the ID's size code.
    pub fn formatted(id: IdField, deleted: bool) -> Self {
        let len = id.sector_len();
        Self::new(id, deleted, vec![FORMAT_FILL_BYTE; len])
    }

    #[inline]
    pub fn crc_ok(&self) -> bool {
        self.id_crc_ok && self.data_crc_ok
    }
}

fn push_run(track: &mut Vec<u8>, value: u8, count: usize) {
    track.extend(std::iter::repeat(value).take(count));
}

fn push_crc(track: &mut Vec<u8>, crc: u16) {
    track.extend_from_slice(&crc.to_be_bytes());
}

fn push_mark_prefix(track: &mut Vec<u8>, format: &TrackFormat) {
    push_run(track, SYNC_BYTE, format.sync_len());
    if format.encoding == TrackEncoding::Mfm {
        push_run(track, MFM_MARK_PREFIX, MARK_PREFIX_LEN);
    }
}

/// Build a raw track. The result is padded with gap bytes to the nominal
/// track size; a track that does not fit is returned as-is.
pub fn build_track(format: &TrackFormat, sectors: &[TrackSector]) -> Vec<u8> {
    let gap_byte = format.gap_byte();
    let mut track = Vec::with_capacity(format.track_size);

    push_run(&mut track, gap_byte, format.gaps.gap0);

    if format.layout == TrackLayout::Full {
        push_run(&mut track, SYNC_BYTE, format.sync_len());
        if format.encoding == TrackEncoding::Mfm {
            push_run(&mut track, MFM_INDEX_PREFIX, MARK_PREFIX_LEN);
        }
        track.push(INDEX_MARK);
        push_run(&mut track, gap_byte, format.gaps.gap1);
    }

    for sector in sectors {
        push_mark_prefix(&mut track, format);
        let id_bytes = sector.id.to_bytes();
        track.extend_from_slice(&id_bytes);
        push_crc(&mut track, crc16(&id_bytes));
        push_run(&mut track, gap_byte, format.gaps.gap2);

        push_mark_prefix(&mut track, format);
        let mark = if sector.deleted { DELETED_DATA_MARK } else { DATA_MARK };
        track.push(mark);
        track.extend_from_slice(&sector.data);
        push_crc(&mut track, data_field_crc(mark, &sector.data));
        push_run(&mut track, gap_byte, format.gaps.gap3);
    }

    if track.len() > format.track_size {
        log::warn!(
            "build_track(): track of {} bytes exceeds nominal size of {} bytes",
            track.len(),
            format.track_size
        );
    }
    else {
        let fill = format.track_size - track.len();
        push_run(&mut track, gap_byte, fill);
    }
    track
}

/// Find the first run of `count` bytes equal to `value` at or after `start`.
/// Returns the offset of the first byte of the run.
pub fn find_block(buf: &[u8], start: usize, count: usize, value: u8) -> Option<usize> {
    if count == 0 {
        return (start <= buf.len()).then_some(start);
    }
    let mut run = 0;
    for (i, byte) in buf.iter().enumerate().skip(start) {
        if *byte == value {
            run += 1;
            if run == count {
                return Some(i + 1 - count);
            }
        }
        else {
            run = 0;
        }
    }
    None
}

/// Locate the next address mark at or after `pos`. Returns the mark byte and
/// the offset just past it.
fn next_mark(buf: &[u8], pos: usize, encoding: TrackEncoding) -> Option<(u8, usize)> {
    match encoding {
        TrackEncoding::Mfm => {
            let mut p = find_block(buf, pos, MARK_PREFIX_LEN, MFM_MARK_PREFIX)?;
            // Skip any extra prefix bytes.
            while p < buf.len() && buf[p] == MFM_MARK_PREFIX {
                p += 1;
            }
            buf.get(p).map(|mark| (*mark, p + 1))
        }
        TrackEncoding::Fm => {
            let mut p = find_block(buf, pos, FM_SYNC_LEN, SYNC_BYTE)?;
            while p < buf.len() && buf[p] == SYNC_BYTE {
                p += 1;
            }
            buf.get(p).map(|mark| (*mark, p + 1))
        }
    }
}

fn is_id_mark(mark: u8, encoding: TrackEncoding) -> bool {
    match encoding {
        TrackEncoding::Mfm => matches!(mark, 0xFC..=0xFF),
        TrackEncoding::Fm => mark == IDENT_DEFAULT,
    }
}

fn read_crc(buf: &[u8], pos: usize) -> Option<u16> {
    let bytes = buf.get(pos..pos + CRC_LEN)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Parse a raw track into its sectors, in track order. CRC mismatches are
/// reported per sector rather than failing the parse.
pub fn parse_track(buf: &[u8], encoding: TrackEncoding) -> Result<Vec<TrackSector>, TrackError> {
    let mut sectors = Vec::new();
    let mut pos = 0;

    while let Some((mark, after_mark)) = next_mark(buf, pos, encoding) {
        if !is_id_mark(mark, encoding) {
            // Index mark or a data field with no ID in front of it.
            pos = after_mark;
            continue;
        }

        let id_start = after_mark - 1;
        let id_bytes: [u8; ID_FIELD_LEN] = buf
            .get(id_start..id_start + ID_FIELD_LEN)
            .and_then(|slice| slice.try_into().ok())
            .ok_or(TrackError::Truncated(id_start))?;
        let id = IdField::from(id_bytes);
        let id_crc = read_crc(buf, id_start + ID_FIELD_LEN).ok_or(TrackError::Truncated(id_start))?;
        let id_crc_ok = id_crc == crc16(&id_bytes);

        let search = id_start + ID_FIELD_LEN + CRC_LEN;
        let (data_mark, data_start) = next_mark(buf, search, encoding).ok_or(TrackError::MissingDataMark(id_start))?;
        if data_mark != DATA_MARK && data_mark != DELETED_DATA_MARK {
            return Err(TrackError::MissingDataMark(id_start));
        }

        let len = id.sector_len();
        let data = buf
            .get(data_start..data_start + len)
            .ok_or(TrackError::Truncated(data_start))?
            .to_vec();
        let data_crc = read_crc(buf, data_start + len).ok_or(TrackError::Truncated(data_start))?;
        let data_crc_ok = data_crc == data_field_crc(data_mark, &data);

        sectors.push(TrackSector {
            id,
            deleted: data_mark == DELETED_DATA_MARK,
            data,
            id_crc_ok,
            data_crc_ok,
        });
        pos = data_start + len + CRC_LEN;
    }

    Ok(sectors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_sectors(count: u8, size: u8) -> Vec<TrackSector> {
        (0..count)
            .map(|s| {
                let id = IdField {
                    ident: IDENT_DEFAULT,
                    cylinder: 5,
                    head: 1,
                    sector: s,
                    size,
                };
                let data = (0..id.sector_len()).map(|i| (i as u8) ^ s).collect();
                TrackSector::new(id, s == 2, data)
            })
            .collect()
    }

    #[test]
    fn find_block_returns_run_start() {
        let buf = [0x4E, 0xA1, 0x00, 0xA1, 0xA1, 0xA1, 0xFE];
        assert_eq!(find_block(&buf, 0, 3, 0xA1), Some(3));
        assert_eq!(find_block(&buf, 0, 1, 0xA1), Some(1));
        assert_eq!(find_block(&buf, 4, 3, 0xA1), None);
        assert_eq!(find_block(&buf, 0, 2, 0x00), None);
        assert_eq!(find_block(&buf, 20, 1, 0x4E), None);
    }

    #[test]
    fn mfm_track_round_trip() {
        let sectors = sample_sectors(9, 1);
        for layout in [TrackLayout::Full, TrackLayout::Abbreviated] {
            let format = TrackFormat::standard(DriveType::Floppy5, TrackEncoding::Mfm, layout);
            let track = build_track(&format, &sectors);
            assert_eq!(track.len(), 6250);

            let parsed = parse_track(&track, TrackEncoding::Mfm).unwrap();
            assert_eq!(parsed, sectors);
        }
    }

    #[test]
    fn fm_track_round_trip() {
        let sectors = sample_sectors(9, 1);
        let format = TrackFormat::standard(DriveType::Floppy5, TrackEncoding::Fm, TrackLayout::Full);
        let track = build_track(&format, &sectors);
        assert_eq!(track.len(), 3125);
        assert_eq!(track[0], FM_GAP_BYTE);

        let parsed = parse_track(&track, TrackEncoding::Fm).unwrap();
        assert_eq!(parsed, sectors);
    }

    #[test]
    fn full_layout_has_index_mark() {
        let format = TrackFormat::standard(DriveType::Floppy5, TrackEncoding::Mfm, TrackLayout::Full);
        let track = build_track(&format, &[]);
        let gap0 = format.gaps.gap0;
        assert!(track[..gap0].iter().all(|b| *b == MFM_GAP_BYTE));
        assert_eq!(find_block(&track, 0, 3, MFM_INDEX_PREFIX), Some(gap0 + MFM_SYNC_LEN));
        assert_eq!(track[gap0 + MFM_SYNC_LEN + 3], INDEX_MARK);

        let format = TrackFormat::standard(DriveType::Floppy5, TrackEncoding::Mfm, TrackLayout::Abbreviated);
        let track = build_track(&format, &[]);
        assert!(track.iter().all(|b| *b == MFM_GAP_BYTE));
    }

    #[test]
    fn id_field_crc_is_recorded() {
        let sectors = vec![TrackSector::formatted(IdField::from([0xFE, 0, 0, 1, 0]), false)];
        let format = TrackFormat::standard(DriveType::Floppy5, TrackEncoding::Mfm, TrackLayout::Abbreviated);
        let track = build_track(&format, &sectors);
        let id_pos = find_block(&track, 0, 3, MFM_MARK_PREFIX).unwrap() + 3;
        assert_eq!(&track[id_pos..id_pos + 7], &[0xFE, 0x00, 0x00, 0x01, 0x00, 0xD2, 0xC3]);
    }

    #[test]
    fn corrupt_crc_is_flagged() {
        let sectors = sample_sectors(3, 0);
        let format = TrackFormat::standard(DriveType::Floppy5, TrackEncoding::Mfm, TrackLayout::Abbreviated);
        let mut track = build_track(&format, &sectors);

        // Flip a byte in the first sector's data.
        let first_data = find_block(&track, 0, 3, MFM_MARK_PREFIX).unwrap();
        let data_prefix = find_block(&track, first_data + 3, 3, MFM_MARK_PREFIX).unwrap();
        track[data_prefix + 3 + 10] ^= 0xFF;

        let parsed = parse_track(&track, TrackEncoding::Mfm).unwrap();
        assert_eq!(parsed.len(), 3);
        assert!(parsed[0].id_crc_ok);
        assert!(!parsed[0].data_crc_ok);
        assert!(parsed[1].crc_ok());
    }

    #[test]
    fn truncated_track_is_an_error() {
        let sectors = sample_sectors(1, 1);
        let format = TrackFormat::standard(DriveType::Floppy5, TrackEncoding::Mfm, TrackLayout::Abbreviated);
        let track = build_track(&format, &sectors);
        let cut = find_block(&track, 0, 3, MFM_MARK_PREFIX).unwrap() + 40;
        assert!(matches!(
            parse_track(&track[..cut], TrackEncoding::Mfm),
            Err(TrackError::MissingDataMark(_))
        ));
    }

    #[test]
    fn id_field_packing() {
        let id = SectorId::new(0x2A5, 3, 7, 1);

        let smc = IdField::encode(&id, DriveType::SmcHardDisk);
        assert_eq!(smc.to_bytes(), [0xFE, 0xA5, 0x23, 7, 1]);
        assert_eq!(smc.decode(DriveType::SmcHardDisk), id);

        let at = IdField::encode(&id, DriveType::AtHardDisk);
        assert_eq!(at.to_bytes(), [0xFC, 0xA5, 0x03, 7, 1]);
        assert_eq!(at.decode(DriveType::AtHardDisk), id);
    }
}
