//! Byte reader over a fully buffered module.
//!
//! A `ByteReader` is a window `[start, end)` into a shared buffer. Positions
//! are absolute offsets into that buffer, so a substream handed to the AST
//! decoder reports the same offsets the module decoder would.
//!
//! Reads past the window never panic: they return `None` and set a sticky
//! overread flag, which callers turn into `DecodeError::StreamExhausted`.
//! Multi-byte fixed-width values are read in host byte order.

use crate::error::DecodeError;

/// Cursor over a window of a byte buffer.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    start: usize,
    end: usize,
    pos: usize,
    overread: bool,
}

impl<'a> ByteReader<'a> {
    /// Create a reader over the whole buffer.
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader {
            data,
            start: 0,
            end: data.len(),
            pos: 0,
            overread: false,
        }
    }

    /// Create a reader over `len` bytes of `data` starting at `offset`.
    ///
    /// Returns `None` if the window does not fit inside `data`.
    pub fn window(data: &'a [u8], offset: usize, len: usize) -> Option<Self> {
        let end = offset.checked_add(len)?;
        if end > data.len() {
            return None;
        }
        Some(ByteReader {
            data,
            start: offset,
            end,
            pos: offset,
            overread: false,
        })
    }

    /// Current absolute position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Absolute `(start, end)` of this reader's window.
    pub fn bounds(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    /// Remaining bytes in the window.
    pub fn remaining(&self) -> usize {
        self.end.saturating_sub(self.pos)
    }

    /// True once every byte of the window has been consumed.
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.end
    }

    /// True if any read tried to go past the end of the window.
    pub fn has_overread(&self) -> bool {
        self.overread
    }

    /// Error describing an overread at the current position.
    pub fn exhausted(&self) -> DecodeError {
        DecodeError::StreamExhausted {
            offset: self.pos,
            opcode: None,
        }
    }

    /// Read a single byte.
    pub fn read_byte(&mut self) -> Option<u8> {
        if self.pos >= self.end {
            self.overread = true;
            return None;
        }
        let b = self.data[self.pos];
        self.pos += 1;
        Some(b)
    }

    /// Read exactly `N` bytes.
    ///
    /// On a short read nothing is consumed and the overread flag is set.
    pub fn read_array<const N: usize>(&mut self) -> Option<[u8; N]> {
        if self.remaining() < N {
            self.overread = true;
            return None;
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        Some(out)
    }

    /// Read a u16 in host byte order.
    pub fn read_u16(&mut self) -> Option<u16> {
        self.read_array::<2>().map(u16::from_ne_bytes)
    }

    /// Read a u32 in host byte order.
    pub fn read_u32(&mut self) -> Option<u32> {
        self.read_array::<4>().map(u32::from_ne_bytes)
    }

    /// Read an unsigned LEB128-encoded u32.
    pub fn read_var_u32(&mut self) -> Result<u32, DecodeError> {
        let start = self.pos;
        let mut result: u32 = 0;
        let mut shift: u32 = 0;

        loop {
            if shift > 28 {
                return Err(overflow(start));
            }
            let byte = self.read_byte().ok_or_else(|| self.exhausted())?;
            // The fifth byte may only carry the top four bits.
            if shift == 28 && byte & 0x70 != 0 {
                return Err(overflow(start));
            }
            result |= ((byte & 0x7F) as u32) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        Ok(result)
    }

    /// Read a signed LEB128-encoded i32.
    pub fn read_var_i32(&mut self) -> Result<i32, DecodeError> {
        let start = self.pos;
        let mut result: i32 = 0;
        let mut shift: u32 = 0;

        loop {
            if shift > 28 {
                return Err(overflow(start));
            }
            let byte = self.read_byte().ok_or_else(|| self.exhausted())?;
            // Bits above the fifth byte's low nibble must repeat the sign bit.
            if shift == 28 {
                let high = byte & 0x78;
                if high != 0 && high != 0x78 {
                    return Err(overflow(start));
                }
            }
            result |= ((byte & 0x7F) as i32) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                // Sign extend
                if shift < 32 && (byte & 0x40) != 0 {
                    result |= !0 << shift;
                }
                break;
            }
        }
        Ok(result)
    }

    /// Skip `n` bytes. Skipping past the window clamps to the end and sets
    /// the overread flag.
    pub fn skip(&mut self, n: usize) {
        match self.pos.checked_add(n) {
            Some(target) if target <= self.end => self.pos = target,
            _ => {
                self.pos = self.end;
                self.overread = true;
            }
        }
    }

    /// Slice off the next `len` bytes as their own reader and advance past
    /// them. Returns `None` (and sets the overread flag) if fewer than `len`
    /// bytes remain.
    pub fn substream(&mut self, len: usize) -> Option<ByteReader<'a>> {
        if self.remaining() < len {
            self.overread = true;
            return None;
        }
        let sub = ByteReader {
            data: self.data,
            start: self.pos,
            end: self.pos + len,
            pos: self.pos,
            overread: false,
        };
        self.pos += len;
        Some(sub)
    }
}

fn overflow(offset: usize) -> DecodeError {
    DecodeError::Unimplemented {
        offset,
        opcode: None,
        feature: "LEB128 value wider than 32 bits",
    }
}

/// Decode the NUL-terminated UTF-8 string starting at absolute `offset`.
pub fn read_c_string_at(data: &[u8], offset: usize) -> Result<&str, DecodeError> {
    let tail = data.get(offset..).ok_or(DecodeError::StreamExhausted {
        offset,
        opcode: None,
    })?;
    let len = tail
        .iter()
        .position(|&b| b == 0)
        .ok_or(DecodeError::StreamExhausted {
            offset: data.len(),
            opcode: None,
        })?;
    core::str::from_utf8(&tail[..len]).map_err(|_| DecodeError::InvalidUtf8 { offset })
}
