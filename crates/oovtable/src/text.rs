//! Bounded, NUL-terminated text in caller buffers.

use core::fmt::{self, Write};

struct Cursor<'a> {
    buffer: &'a mut [u8],
    len: usize,
}

impl Write for Cursor<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let take = s.len().min(self.buffer.len() - self.len);
        self.buffer[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}

/// Format `args` into `buffer`, truncating to leave room for the terminating NUL.
///
/// Returns the number of bytes written before the NUL. An empty buffer receives nothing.
pub fn write_into(buffer: &mut [u8], args: fmt::Arguments<'_>) -> usize {
    let Some(capacity) = buffer.len().checked_sub(1) else {
        return 0;
    };
    let mut cursor = Cursor {
        buffer: &mut buffer[..capacity],
        len: 0,
    };
    // Cursor never fails, it truncates
    let _ = cursor.write_fmt(args);
    let len = cursor.len;
    buffer[len] = 0;
    len
}

/// The text in `buffer` up to the first NUL
pub fn as_str(buffer: &[u8]) -> &str {
    let end = buffer.iter().position(|&b| b == 0).unwrap_or(buffer.len());
    match core::str::from_utf8(&buffer[..end]) {
        Ok(text) => text,
        Err(err) => core::str::from_utf8(&buffer[..err.valid_up_to()]).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_terminates() {
        let mut buffer = [0xffu8; 16];
        let written = write_into(&mut buffer, format_args!("val1({})", 7));
        assert_eq!(written, 7);
        assert_eq!(buffer[7], 0);
        assert_eq!(as_str(&buffer), "val1(7)");
    }

    #[test]
    fn truncates_to_fit() {
        let mut buffer = [0xffu8; 5];
        assert_eq!(write_into(&mut buffer, format_args!("{}", "abcdefgh")), 4);
        assert_eq!(as_str(&buffer), "abcd");

        let mut empty = [];
        assert_eq!(write_into(&mut empty, format_args!("x")), 0);

        let mut one = [0xffu8; 1];
        assert_eq!(write_into(&mut one, format_args!("x")), 0);
        assert_eq!(one, [0]);
    }
}
