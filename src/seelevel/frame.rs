use super::pulse::FRAME_LEN;

/// The tag every genuine response carries in the high nibble of its first byte.
pub const PREAMBLE: u8 = 0x90;
const PREAMBLE_MASK: u8 = 0xF0;

/// Sent in place of a segment reading when the sensor has no strip in that slot.
pub const ABSENT_SEGMENT: u8 = 0xFF;

/// The largest number of segments a single frame can describe.
pub const MAX_SEGMENTS: usize = FRAME_LEN - 2;

const CHECKSUM_INDEX: usize = 1;
const FIRST_SEGMENT_INDEX: usize = 2;
const CHECKSUM_OFFSET: u8 = 2;

/// Segment readings from the bottom of the frame, with absent segments trimmed.
pub type Segments = heapless::Vec<u8, MAX_SEGMENTS>;

/// Reasons a captured frame could not be used.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer (or more) bytes than a full frame were received.
    NoResponse,
    /// The first byte did not start with the SeeLevel preamble.
    PreambleInvalid,
    /// The checksum byte did not match the segment bytes.
    ChecksumMismatch,
}

/// Computes the checksum the sensor sends for the given (trimmed) segment bytes.
pub fn checksum(segments: &[u8]) -> u8 {
    segments
        .iter()
        .fold(0u8, |sum, segment| sum.wrapping_add(*segment))
        .wrapping_sub(CHECKSUM_OFFSET)
}

/// Checks a decoded frame and extracts its segment readings.
///
/// Trailing [`ABSENT_SEGMENT`] bytes are dropped before the checksum is verified, so the result
/// holds one byte per strip actually fitted to the sensor.
pub fn validate(frame: &[u8]) -> Result<Segments, FrameError> {
    if frame.len() != FRAME_LEN {
        return Err(FrameError::NoResponse);
    }
    if frame[0] & PREAMBLE_MASK != PREAMBLE {
        return Err(FrameError::PreambleInvalid);
    }

    let mut base_seg = frame.len() - 1;
    while base_seg > 0 && frame[base_seg] == ABSENT_SEGMENT {
        base_seg -= 1;
    }
    let present: &[u8] = if base_seg >= FIRST_SEGMENT_INDEX {
        &frame[FIRST_SEGMENT_INDEX..=base_seg]
    } else {
        &[]
    };

    if checksum(present) != frame[CHECKSUM_INDEX] {
        return Err(FrameError::ChecksumMismatch);
    }

    let mut segments: Segments = present.iter().copied().collect();
    // A dry second segment always clears the first.
    if segments.len() >= 2 && segments[1] == 0 {
        segments[0] = 0;
    }
    Ok(segments)
}
