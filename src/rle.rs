//! Run-length encoding of a rectangular region of live cells, using 6-bit
//! packed bytes and an adaptive per-stream storage width (SPEC_FULL.md §6).
//!
//! Every multi-bit field in the stream is a sequence of "marked" bytes: the
//! low six bits are payload, bit 6 is a constant `0x40` marker, bit 7 is
//! zero. Values are little-endian across the marked bytes that make them up.
//!
//! The four header magnitudes (`offset_x`, `offset_y`, `width`, `height`)
//! are each a fixed 32-bit magnitude, packed into six marked bytes (`6*6 =
//! 36 >= 32` bits) regardless of the stream's chosen run-length width —
//! only run lengths themselves use the adaptive width `W`. Since a decoder
//! has to know `W` before it can parse anything packed, the stream opens
//! with one unmarked raw byte carrying `W` itself; this byte is not part of
//! the marked-payload scheme and is the one deviation from a literal
//! reading of the field list (see DESIGN.md).

use crate::cell::{Cell, CellSet};
use crate::error::SimError;
use crate::rect::Rect;

const MARKER: u8 = 0x40;
const TERMINATOR: u8 = 0x00;
const HEADER_FIELD_BYTES: usize = 6; // ceil(32 / 6)

/// Bit-packed run-length encoder/decoder for rectangular `CellSet` regions.
pub struct RleCodec;

impl RleCodec {
    /// Encodes the live cells of `cells` that fall within `rect` (in the
    /// cell set's own coordinate space) as a self-contained RLE stream.
    /// `offset` is stored verbatim as header metadata; it need not relate to
    /// `rect`'s own coordinates (a caller typically passes the region's
    /// intended placement in some other coordinate space, e.g. world-space
    /// anchor of a clipboard selection).
    pub fn encode_region(cells: &CellSet, rect: Rect, offset: (i64, i64)) -> Result<Vec<u8>, SimError> {
        let runs = Self::runs(cells, rect);
        let max_run = runs.iter().copied().max().unwrap_or(0);

        let width = [1usize, 2, 4, 8]
            .into_iter()
            .find(|&w| fits(max_run, w))
            .ok_or(SimError::CapacityExceeded)?;

        let mut out = Vec::new();
        out.push(width as u8);
        out.extend(pack_header(offset.0.unsigned_abs() as u32));
        out.extend(pack_header(offset.1.unsigned_abs() as u32));
        out.extend(pack_header(rect.width as u32));
        out.extend(pack_header(rect.height as u32));
        out.push(marked(if first_run_is_live(cells, rect) { 1 } else { 0 }));
        out.push(marked(if offset.0 >= 0 { 0 } else { 1 }));
        out.push(marked(if offset.1 >= 0 { 0 } else { 1 }));
        for run in &runs {
            out.extend(pack_run(*run, width));
        }
        out.push(TERMINATOR);
        Ok(out)
    }

    /// Decodes a stream produced by [`Self::encode_region`]. `warn_threshold`,
    /// if given, aborts with [`SimError::Oversize`] (no cells committed)
    /// when the decoded live-cell count would exceed it.
    pub fn decode(bytes: &[u8], warn_threshold: Option<u64>) -> Result<(CellSet, (i64, i64)), SimError> {
        let mut cursor = Cursor { bytes, pos: 0 };

        let width = match cursor.take_raw()? {
            1 => 1usize,
            2 => 2,
            4 => 4,
            8 => 8,
            _ => {
                log::warn!("rle decode: invalid storage width byte");
                return Err(SimError::InvalidFormat { reason: "storage width must be 1, 2, 4, or 8" });
            }
        };

        let offset_x_mag = unpack_header(&mut cursor)?;
        let offset_y_mag = unpack_header(&mut cursor)?;
        let region_width = unpack_header(&mut cursor)?;
        let region_height = unpack_header(&mut cursor)?;

        let first_live = unmark(cursor.take_raw()?)? != 0;
        let x_negative = unmark(cursor.take_raw()?)? != 0;
        let y_negative = unmark(cursor.take_raw()?)? != 0;

        let mut runs = Vec::new();
        loop {
            if cursor.peek() == Some(TERMINATOR) {
                cursor.pos += 1;
                break;
            }
            runs.push(unpack_run(&mut cursor, width)?);
        }

        let mut cells = CellSet::new();
        let mut live = first_live;
        let mut x = 0i64;
        let mut y = 0i64;
        let mut total: u64 = 0;
        'runs: for run_len in runs {
            for _ in 0..run_len {
                if x as u32 >= region_width {
                    break 'runs;
                }
                if live {
                    cells.insert(Cell::new(x as i32, y as i32));
                    total += 1;
                }
                y += 1;
                if y as u32 >= region_height {
                    y = 0;
                    x += 1;
                }
            }
            live = !live;
        }

        if let Some(threshold) = warn_threshold {
            if total > threshold {
                return Err(SimError::Oversize { count: total });
            }
        }

        let offset_x = if x_negative { -(offset_x_mag as i64) } else { offset_x_mag as i64 };
        let offset_y = if y_negative { -(offset_y_mag as i64) } else { offset_y_mag as i64 };
        Ok((cells, (offset_x, offset_y)))
    }

    /// Column-major (x slow, y fast) run lengths of `cells` restricted to
    /// `rect`, alternating dead/live starting with whichever the first cell
    /// in scan order actually is.
    fn runs(cells: &CellSet, rect: Rect) -> Vec<u64> {
        let mut runs = Vec::new();
        let mut current_live = first_run_is_live(cells, rect);
        let mut run_len: u64 = 0;
        for x in rect.x..rect.right() {
            for y in rect.y..rect.bottom() {
                let live = cells.contains(&Cell::new(x, y));
                if live == current_live {
                    run_len += 1;
                } else {
                    runs.push(run_len);
                    current_live = live;
                    run_len = 1;
                }
            }
        }
        runs.push(run_len);
        runs
    }
}

fn first_run_is_live(cells: &CellSet, rect: Rect) -> bool {
    if rect.is_empty() {
        return false;
    }
    cells.contains(&Cell::new(rect.x, rect.y))
}

fn fits(value: u64, width_bytes: usize) -> bool {
    let bits = width_bytes as u32 * 6;
    bits >= 64 || value < (1u64 << bits)
}

fn marked(payload: u8) -> u8 {
    (payload & 0x3F) | MARKER
}

fn unmark(byte: u8) -> Result<u8, SimError> {
    if byte & 0xC0 != MARKER {
        log::warn!("rle decode: payload byte missing 0x40 marker");
        return Err(SimError::InvalidFormat { reason: "payload byte missing 0x40 marker" });
    }
    Ok(byte & 0x3F)
}

fn pack_header(value: u32) -> [u8; HEADER_FIELD_BYTES] {
    let mut out = [0u8; HEADER_FIELD_BYTES];
    let mut v = value as u64;
    for slot in out.iter_mut() {
        *slot = marked((v & 0x3F) as u8);
        v >>= 6;
    }
    out
}

fn unpack_header(cursor: &mut Cursor) -> Result<u32, SimError> {
    let mut value: u64 = 0;
    for i in 0..HEADER_FIELD_BYTES {
        let payload = unmark(cursor.take_raw()?)?;
        value |= (payload as u64) << (6 * i);
    }
    Ok(value as u32)
}

fn pack_run(value: u64, width_bytes: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(width_bytes);
    let mut v = value;
    for _ in 0..width_bytes {
        out.push(marked((v & 0x3F) as u8));
        v >>= 6;
    }
    out
}

fn unpack_run(cursor: &mut Cursor, width_bytes: usize) -> Result<u64, SimError> {
    let mut value: u64 = 0;
    for i in 0..width_bytes {
        let payload = unmark(cursor.take_raw()?)?;
        value |= (payload as u64) << (6 * i);
    }
    Ok(value)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take_raw(&mut self) -> Result<u8, SimError> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or(SimError::InvalidFormat { reason: "stream ended before terminator" })?;
        self.pos += 1;
        Ok(byte)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(coords: &[(i32, i32)]) -> CellSet {
        coords.iter().map(|&(x, y)| Cell::new(x, y)).collect()
    }

    #[test]
    fn round_trips_a_small_region() {
        let seed = cells(&[(0, 0), (1, 1), (0, 1), (1, 0)]);
        let rect = Rect::new(0, 0, 4, 4);
        let encoded = RleCodec::encode_region(&seed, rect, (2, 2)).unwrap();
        let (decoded, offset) = RleCodec::decode(&encoded, None).unwrap();
        assert_eq!(decoded, seed);
        assert_eq!(offset, (2, 2));
    }

    #[test]
    fn round_trips_negative_offset() {
        let seed = cells(&[(0, 0), (2, 2)]);
        let rect = Rect::new(0, 0, 4, 4);
        let encoded = RleCodec::encode_region(&seed, rect, (-5, -7)).unwrap();
        let (decoded, offset) = RleCodec::decode(&encoded, None).unwrap();
        assert_eq!(decoded, seed);
        assert_eq!(offset, (-5, -7));
    }

    #[test]
    fn empty_region_round_trips() {
        let seed = CellSet::new();
        let rect = Rect::new(0, 0, 8, 8);
        let encoded = RleCodec::encode_region(&seed, rect, (0, 0)).unwrap();
        let (decoded, _) = RleCodec::decode(&encoded, None).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn oversize_threshold_rejects_without_committing() {
        let seed = cells(&[(0, 0), (1, 0), (2, 0), (3, 0)]);
        let rect = Rect::new(0, 0, 4, 1);
        let encoded = RleCodec::encode_region(&seed, rect, (0, 0)).unwrap();
        let result = RleCodec::decode(&encoded, Some(2));
        assert_eq!(result, Err(SimError::Oversize { count: 4 }));
    }

    #[test]
    fn corrupted_marker_byte_is_rejected() {
        let seed = cells(&[(0, 0)]);
        let rect = Rect::new(0, 0, 2, 2);
        let mut encoded = RleCodec::encode_region(&seed, rect, (0, 0)).unwrap();
        // Flip the marker bit on the first packed header byte.
        encoded[1] &= !MARKER;
        assert!(RleCodec::decode(&encoded, None).is_err());
    }
}
