//! Frame checksum
//!
//! Reader frames carry a single trailing byte: the XOR of every byte from the
//! length field through the last payload byte. The header (index 0) and the
//! checksum itself (index n-1) are excluded.

/// Smallest possible frame: header, length, three id bytes, command, checksum.
pub const MIN_FRAME_LEN: usize = 7;

/// XOR of all bytes
pub fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc ^ b)
}

/// Checksum of a complete frame: XOR over indices `[1 ..= n-2]`.
///
/// Frames shorter than two bytes have nothing to cover and yield `0`.
pub fn checksum_of(frame: &[u8]) -> u8 {
    if frame.len() < 2 {
        return 0;
    }
    xor_checksum(&frame[1..frame.len() - 1])
}

/// Checksum of a frame that does not carry its trailing byte yet:
/// XOR over indices `[1 ..= n-1]`.
pub fn checksum_unterminated(frame: &[u8]) -> u8 {
    match frame.split_first() {
        Some((_, rest)) => xor_checksum(rest),
        None => 0,
    }
}

/// Check the trailing byte of a complete frame.
pub fn verify_frame(frame: &[u8]) -> bool {
    match frame.last() {
        Some(&last) if frame.len() >= 2 => checksum_of(frame) == last,
        _ => false,
    }
}
