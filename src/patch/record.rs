//! Patch record parsing
//!
//! A patch file is line oriented. Each line is classified on its first two
//! characters:
//!
//! ```text
//! '*....'      comment
//! '\r'         blank (CR only)
//! 'F....'      comment
//! '?2...'      comment (second character is '2')
//! '01 ....'    command record
//! anything     unrecognized, skipped
//! ```
//!
//! # Command record layout (0-based character offsets)
//!
//! ```text
//! [0-1]   : "01"
//! [2]     : separator (ignored)
//! [3-4]   : opcode low byte
//! [5-6]   : opcode high byte
//! [7]     : separator (ignored)
//! [8-9]   : parameter length N
//! [10..]  : N parameter bytes, two hex characters each
//! ```
//!
//! # Lenient hex
//!
//! Hex digits are decoded with [`lenient_hex_digit`]: an invalid character, or
//! a character missing past the end of the line, decodes to 0 instead of
//! failing the record. Existing patch files rely on this, so a corrupt digit
//! produces a wrong byte on the wire rather than an error.

use crate::hci::Opcode;
use std::io::{self, BufRead, Read};
use tracing::debug;

/// Longest line considered; anything after it is ignored.
pub const LINE_LEN_MAX: usize = 1024;

const OPCODE_LSB_AT: usize = 3;
const OPCODE_MSB_AT: usize = 5;
const PARAM_LEN_AT: usize = 8;
const PARAMS_AT: usize = 10;

/// One HCI command decoded from a patch record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchCommand {
    pub opcode: Opcode,
    pub params: Vec<u8>,
}

/// Classification of one patch-file line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKind {
    Comment,
    Command(PatchCommand),
    Unrecognized,
}

/// Value of one hex digit, or 0 if `c` is not a hex digit.
pub fn lenient_hex_digit(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => 0,
    }
}

/// Byte from two hex digits, each decoded with [`lenient_hex_digit`].
pub fn lenient_hex_byte(msb: u8, lsb: u8) -> u8 {
    (lenient_hex_digit(msb) << 4) | lenient_hex_digit(lsb)
}

/// Classify and decode one line. Never fails.
pub fn parse_line(line: &[u8]) -> RecordKind {
    let line = &line[..line.len().min(LINE_LEN_MAX)];
    let at = |i: usize| line.get(i).copied().unwrap_or(0);

    if matches!(at(0), b'*' | b'\r' | b'F') || at(1) == b'2' {
        return RecordKind::Comment;
    }
    if at(0) != b'0' || at(1) != b'1' {
        return RecordKind::Unrecognized;
    }

    let lsb = lenient_hex_byte(at(OPCODE_LSB_AT), at(OPCODE_LSB_AT + 1));
    let msb = lenient_hex_byte(at(OPCODE_MSB_AT), at(OPCODE_MSB_AT + 1));
    let opcode = Opcode(u16::from_le_bytes([lsb, msb]));
    let param_len = lenient_hex_byte(at(PARAM_LEN_AT), at(PARAM_LEN_AT + 1)) as usize;

    let params = (0..param_len)
        .map(|i| {
            let pos = PARAMS_AT + 2 * i;
            lenient_hex_byte(at(pos), at(pos + 1))
        })
        .collect();

    RecordKind::Command(PatchCommand { opcode, params })
}

/// Streams command records out of an open patch file.
pub struct PatchReader<R> {
    inner: R,
    line: Vec<u8>,
    line_no: usize,
}

impl<R: BufRead> PatchReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line: Vec::with_capacity(LINE_LEN_MAX),
            line_no: 0,
        }
    }

    /// Next command record, skipping comments and unrecognized lines.
    ///
    /// `Ok(None)` at end of file.
    pub fn next_command(&mut self) -> io::Result<Option<PatchCommand>> {
        loop {
            self.line.clear();
            let n = (&mut self.inner)
                .take(LINE_LEN_MAX as u64)
                .read_until(b'\n', &mut self.line)?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            if n == LINE_LEN_MAX && self.line.last() != Some(&b'\n') {
                self.skip_rest_of_line()?;
            }

            match parse_line(&self.line) {
                RecordKind::Command(cmd) => return Ok(Some(cmd)),
                RecordKind::Comment => {}
                RecordKind::Unrecognized => {
                    debug!(line = self.line_no, "Skipping unrecognized patch line");
                }
            }
        }
    }

    /// Discard input up to and including the next newline.
    fn skip_rest_of_line(&mut self) -> io::Result<()> {
        let mut skipped = 0usize;
        loop {
            let buf = self.inner.fill_buf()?;
            if buf.is_empty() {
                break;
            }
            match buf.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    skipped += pos + 1;
                    self.inner.consume(pos + 1);
                    break;
                }
                None => {
                    let len = buf.len();
                    skipped += len;
                    self.inner.consume(len);
                }
            }
        }
        debug!(line = self.line_no, skipped, "Truncated over-long patch line");
        Ok(())
    }

    /// Number of lines consumed so far.
    pub fn line_no(&self) -> usize {
        self.line_no
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    // 40 characters: opcode 0xFC8E, 15 parameter bytes 0x00..=0x0E
    const WORKED_LINE: &str = "01 8EFC 0F000102030405060708090A0B0C0D0E";

    #[test]
    fn test_worked_record() {
        assert_eq!(WORKED_LINE.len(), 40);
        match parse_line(WORKED_LINE.as_bytes()) {
            RecordKind::Command(cmd) => {
                assert_eq!(cmd.opcode, Opcode(0xFC8E));
                assert_eq!(cmd.params, (0u8..=0x0E).collect::<Vec<_>>());
            }
            other => panic!("Expected command record, got {:?}", other),
        }
    }

    #[test]
    fn test_comment_markers() {
        assert_eq!(parse_line(b"* header\n"), RecordKind::Comment);
        assert_eq!(parse_line(b"\r\n"), RecordKind::Comment);
        assert_eq!(parse_line(b"FF 0000\n"), RecordKind::Comment);
        assert_eq!(parse_line(b"02 0000 00\n"), RecordKind::Comment);
    }

    #[test]
    fn test_unrecognized_lines() {
        assert_eq!(parse_line(b""), RecordKind::Unrecognized);
        assert_eq!(parse_line(b"\n"), RecordKind::Unrecognized);
        assert_eq!(parse_line(b"03 8EFC 00\n"), RecordKind::Unrecognized);
        assert_eq!(parse_line(b"f1 lowercase f is not a comment"), RecordKind::Unrecognized);
    }

    #[test]
    fn test_lenient_digit_decodes_invalid_as_zero() {
        assert_eq!(lenient_hex_digit(b'7'), 7);
        assert_eq!(lenient_hex_digit(b'a'), 10);
        assert_eq!(lenient_hex_digit(b'F'), 15);
        for c in [b'g', b'G', b' ', b'\n', 0u8, 0xFF, b'-'] {
            assert_eq!(lenient_hex_digit(c), 0, "char {:#04x}", c);
        }
        assert_eq!(lenient_hex_byte(b'Z', b'5'), 0x05);
        assert_eq!(lenient_hex_byte(b'5', b'Z'), 0x50);
    }

    #[test]
    fn test_lenient_decode_is_total_over_all_bytes() {
        for c in 0u8..=255 {
            let v = lenient_hex_digit(c);
            assert!(v < 16);
            if !c.is_ascii_hexdigit() {
                assert_eq!(v, 0);
            }
        }
    }

    #[test]
    fn test_malformed_digits_in_record_become_zero() {
        match parse_line(b"01 8EXC 02zz11") {
            RecordKind::Command(cmd) => {
                // 'X' decodes as 0 in the high byte's high nibble
                assert_eq!(cmd.opcode, Opcode(0x0C8E));
                assert_eq!(cmd.params, vec![0x00, 0x11]);
            }
            other => panic!("Expected command record, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_payload_is_zero_padded() {
        // Declares 4 bytes but only carries one
        match parse_line(b"01 AA55 04ff") {
            RecordKind::Command(cmd) => {
                assert_eq!(cmd.opcode, Opcode(0x55AA));
                assert_eq!(cmd.params, vec![0xFF, 0, 0, 0]);
            }
            other => panic!("Expected command record, got {:?}", other),
        }
    }

    #[test]
    fn test_short_command_line_never_panics() {
        match parse_line(b"01AA5500") {
            RecordKind::Command(cmd) => {
                assert_eq!(cmd.opcode, Opcode(0x50A5));
                assert!(cmd.params.is_empty());
            }
            other => panic!("Expected command record, got {:?}", other),
        }
        assert!(matches!(parse_line(b"01"), RecordKind::Command(_)));
    }

    #[test]
    fn test_extra_characters_are_ignored() {
        match parse_line(b"01 0C03 01AB CDEF trailing\r\n") {
            RecordKind::Command(cmd) => {
                assert_eq!(cmd.opcode, Opcode(0x030C));
                assert_eq!(cmd.params, vec![0xAB]);
            }
            other => panic!("Expected command record, got {:?}", other),
        }
    }

    #[test]
    fn test_reader_skips_to_commands() {
        let text = "* header\nF0 trailer\n\n01 8EFC 0100\n12 comment\nxx\n01 11FC 020100\n";
        let mut reader = PatchReader::new(Cursor::new(text));

        let first = reader.next_command().unwrap().unwrap();
        assert_eq!(first.opcode, Opcode(0xFC8E));
        assert_eq!(first.params, vec![0x00]);
        assert_eq!(reader.line_no(), 4);

        let second = reader.next_command().unwrap().unwrap();
        assert_eq!(second.opcode, Opcode(0xFC11));
        assert_eq!(second.params, vec![0x01, 0x00]);

        assert_eq!(reader.next_command().unwrap(), None);
        assert_eq!(reader.next_command().unwrap(), None);
    }

    #[test]
    fn test_long_line_is_cut_at_limit() {
        let mut text = String::from("01 8EFC 0100");
        text.push_str(&"0".repeat(3 * LINE_LEN_MAX));
        text.push_str("\n01 8EFC 0101\n");
        let mut reader = PatchReader::new(Cursor::new(text));

        let first = reader.next_command().unwrap().unwrap();
        assert_eq!(first.params, vec![0x00]);
        assert_eq!(reader.line.len(), LINE_LEN_MAX);

        // The tail of the long line is not read as a line of its own
        let second = reader.next_command().unwrap().unwrap();
        assert_eq!(second.params, vec![0x01]);
        assert_eq!(reader.line_no(), 2);
        assert_eq!(reader.next_command().unwrap(), None);
    }

    #[test]
    fn test_unterminated_file_stays_bounded() {
        let mut text = String::from("01 8EFC 0102");
        text.push_str(&"x".repeat(10 * LINE_LEN_MAX));
        let mut reader = PatchReader::new(Cursor::new(text));

        assert!(reader.next_command().unwrap().is_some());
        assert!(reader.line.capacity() <= 2 * LINE_LEN_MAX);
        assert_eq!(reader.next_command().unwrap(), None);
    }
}
