use std::cmp;
use std::collections::TryReserveError;
use std::fmt;

use thiserror::Error;

/// Storage grows by at least this many bytes at a time
const GROW_STEP: usize = 128;

#[derive(Error, Debug)]
pub enum BufferError {
    #[error("unable to grow buffer to {requested} bytes")]
    Alloc {
        requested: usize,
        #[source]
        source: TryReserveError,
    },
    #[error("buffer size overflows the address space")]
    CapacityOverflow,
    #[error("a formatting trait implementation returned an error")]
    Format,
    #[error("split point {at} is past the end of the content ({len} bytes)")]
    OutOfBounds { at: usize, len: usize },
}

pub type Result<T> = std::result::Result<T, BufferError>;

/// A growable byte buffer used to assemble protocol messages.
///
/// The logical content is always followed by a NUL byte, so the whole thing
/// can be handed to anything expecting a C-like string. `data.len()` is the
/// allocated size (terminator slot included) and `dptr` is the offset where
/// the next write lands.
///
/// A buffer built with [`Buffer::new`] owns no storage until the first
/// append; it reads as the empty string.
#[derive(Default, Clone)]
pub struct Buffer {
    data: Vec<u8>,
    dptr: usize,
}

/// Format into a [`Buffer`], `printf`-style.
///
/// ```
/// let mut buf = aero_buffer::Buffer::new();
/// let n = aero_buffer::bprintf!(buf, "{} {}", "a0001", "NOOP").unwrap();
/// assert_eq!(n, 10);
/// assert_eq!(buf.as_bytes(), b"a0001 NOOP");
/// ```
#[macro_export]
macro_rules! bprintf {
    ($buf:expr, $($arg:tt)*) => {
        $buf.append_fmt(format_args!($($arg)*))
    };
}

impl Buffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `seed` into a new buffer, cursor at its end.
    ///
    /// No growth margin is kept: storage is exactly the seed plus its
    /// terminator, so the next non-empty append reallocates.
    pub fn from_seed(seed: Option<&str>) -> Option<Self> {
        let seed = seed?;
        let mut data = Vec::with_capacity(seed.len() + 1);
        data.extend_from_slice(seed.as_bytes());
        data.push(0);

        let buf = Self {
            dptr: seed.len(),
            data,
        };
        buf.check();
        Some(buf)
    }

    /// Explicit release, accepting an absent buffer.
    pub fn release(buf: Option<Self>) {
        if let Some(buf) = buf {
            tracing::trace!(capacity = buf.capacity(), "releasing buffer");
            drop(buf);
        }
    }

    pub fn len(&self) -> usize {
        self.dptr
    }

    pub fn is_empty(&self) -> bool {
        self.dptr == 0
    }

    /// Allocated size, terminator slot included.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.dptr]
    }

    pub fn as_bytes_with_nul(&self) -> &[u8] {
        match self.data.is_empty() {
            true => b"\0",
            false => &self.data[..=self.dptr],
        }
    }

    pub fn as_str(&self) -> std::result::Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(self.as_bytes())
    }

    /// Forget the content but keep the storage.
    pub fn clear(&mut self) {
        self.dptr = 0;
        if let Some(first) = self.data.first_mut() {
            *first = 0;
        }
        self.check();
    }

    /// Append raw bytes, growing in steps of at least 128 bytes.
    ///
    /// On error nothing has been modified.
    pub fn append_bytes(&mut self, s: &[u8]) -> Result<()> {
        let needed = self
            .dptr
            .checked_add(s.len())
            .and_then(|n| n.checked_add(1))
            .ok_or(BufferError::CapacityOverflow)?;

        if needed > self.data.len() {
            let increment = if s.len() < GROW_STEP {
                GROW_STEP
            } else {
                s.len() + 1
            };
            self.grow(increment)?;
        }

        let end = self.dptr + s.len();
        self.data[self.dptr..end].copy_from_slice(s);
        self.dptr = end;
        self.data[end] = 0;
        self.check();
        Ok(())
    }

    pub fn append_char(&mut self, c: u8) -> Result<()> {
        self.append_bytes(&[c])
    }

    pub fn append_str(&mut self, s: &str) -> Result<()> {
        self.append_bytes(s.as_bytes())
    }

    /// Format at the cursor and return the number of bytes written.
    ///
    /// A first pass writes into whatever room is left and measures the
    /// output. If it did not fit, storage grows to the exact size needed
    /// (still at least 128 bytes more) and the formatting runs again.
    pub fn append_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<usize> {
        let mut blen = self.data.len() - self.dptr;
        if blen == 0 {
            self.grow(GROW_STEP)?;
            blen = self.data.len() - self.dptr;
        }

        let mut len = self.format_at_cursor(args)?;
        if len >= blen {
            let increment = cmp::max(len + 1 - blen, GROW_STEP);
            self.grow(increment)?;
            len = self.format_at_cursor(args)?;
        }

        self.dptr += len;
        self.data[self.dptr] = 0;
        self.check();
        Ok(len)
    }

    /// Shorten the content to `len` bytes. Longer lengths are ignored.
    pub fn truncate(&mut self, len: usize) {
        if len < self.dptr {
            self.dptr = len;
            self.data[len] = 0;
        }
        self.check();
    }

    /// Cut the content at `at` and return what followed as a new buffer.
    pub fn split_off(&mut self, at: usize) -> Result<Self> {
        if at > self.dptr {
            return Err(BufferError::OutOfBounds { at, len: self.dptr });
        }

        let mut tail = Self::new();
        tail.append_bytes(&self.data[at..self.dptr])?;

        self.dptr = at;
        if !self.data.is_empty() {
            self.data[at] = 0;
        }
        self.check();
        Ok(tail)
    }

    fn grow(&mut self, increment: usize) -> Result<()> {
        let requested = self
            .data
            .len()
            .checked_add(increment)
            .ok_or(BufferError::CapacityOverflow)?;
        self.data
            .try_reserve_exact(increment)
            .map_err(|source| BufferError::Alloc { requested, source })?;
        self.data.resize(requested, 0);
        tracing::trace!(capacity = requested, len = self.dptr, "buffer grown");
        Ok(())
    }

    /// Write `args` from the cursor on, truncated to the room left (minus
    /// the terminator slot), and return the untruncated length.
    fn format_at_cursor(&mut self, args: fmt::Arguments<'_>) -> Result<usize> {
        let (res, required) = {
            let mut sink = Truncating {
                dst: &mut self.data[self.dptr..],
                required: 0,
            };
            let res = fmt::write(&mut sink, args);
            (res, sink.required)
        };

        match res {
            Ok(()) => Ok(required),
            Err(_) => {
                self.data[self.dptr] = 0;
                Err(BufferError::Format)
            }
        }
    }

    fn check(&self) {
        debug_assert!(
            (self.data.is_empty() && self.dptr == 0)
                || (self.data.len() > self.dptr && self.data[self.dptr] == 0),
            "buffer content must be followed by a NUL byte"
        );
    }
}

struct Truncating<'a> {
    dst: &'a mut [u8],
    required: usize,
}

impl fmt::Write for Truncating<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = self.dst.len().saturating_sub(1);
        if self.required < room {
            let n = cmp::min(room - self.required, s.len());
            self.dst[self.required..self.required + n].copy_from_slice(&s.as_bytes()[..n]);
        }
        self.required = self.required.saturating_add(s.len());
        Ok(())
    }
}

impl fmt::Write for Buffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.append_str(s).map_err(|_| fmt::Error)
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Buffer {}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("content", &String::from_utf8_lossy(self.as_bytes()))
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write;

    fn assert_terminated(buf: &Buffer) {
        let with_nul = buf.as_bytes_with_nul();
        assert_eq!(with_nul.len(), buf.len() + 1);
        assert_eq!(with_nul[buf.len()], 0);
        assert!(buf.capacity() == 0 || buf.capacity() >= buf.len() + 1);
    }

    #[test]
    fn test_empty_buffer() {
        let buf = Buffer::new();
        assert_eq!(buf.capacity(), 0);
        assert!(buf.is_empty());
        assert_eq!(buf.as_bytes(), b"");
        assert_eq!(buf.as_bytes_with_nul(), b"\0");
    }

    #[test]
    fn test_nul_invariant() {
        let mut buf = Buffer::new();
        let mut expected = Vec::new();

        let chunks: [&[u8]; 5] = [b"AUTHENTICATE", b" ", b"", &[b'z'; 300], b"PLAIN"];
        for chunk in chunks {
            buf.append_bytes(chunk).unwrap();
            expected.extend_from_slice(chunk);
            assert_eq!(buf.as_bytes(), &expected[..]);
            assert_terminated(&buf);
        }

        buf.append_char(b'!').unwrap();
        expected.push(b'!');
        assert_eq!(buf.as_bytes(), &expected[..]);
        assert_terminated(&buf);

        bprintf!(buf, "{:04}", 7).unwrap();
        expected.extend_from_slice(b"0007");
        assert_eq!(buf.as_bytes(), &expected[..]);
        assert_terminated(&buf);
    }

    #[test]
    fn test_growth() {
        let mut buf = Buffer::new();

        // Small appends grow by a fixed step
        buf.append_str("0123456789").unwrap();
        assert_eq!(buf.capacity(), 128);
        buf.append_str("abc").unwrap();
        assert_eq!(buf.capacity(), 128);

        // Large appends grow by exactly what they need
        let big = vec![b'x'; 200];
        let old_len = buf.len();
        buf.append_bytes(&big).unwrap();
        assert_eq!(buf.capacity(), 128 + 201);
        assert!(buf.capacity() >= old_len + big.len() + 1);
        assert_eq!(&buf.as_bytes()[..13], b"0123456789abc");
        assert_eq!(&buf.as_bytes()[13..], &big[..]);
        assert_terminated(&buf);
    }

    #[test]
    fn test_seed() {
        let buf = Buffer::from_seed(Some("abc")).unwrap();
        assert_eq!(buf.as_bytes(), b"abc");
        assert_eq!(buf.as_bytes_with_nul(), b"abc\0");
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.capacity(), 4);

        assert!(Buffer::from_seed(None).is_none());
    }

    #[test]
    fn test_seed_grows_on_first_append() {
        let mut buf = Buffer::from_seed(Some("abc")).unwrap();
        buf.append_char(b'd').unwrap();
        assert_eq!(buf.capacity(), 4 + 128);
        assert_eq!(buf.as_bytes(), b"abcd");
        assert_terminated(&buf);
    }

    #[test]
    fn test_fmt_matches_format() {
        let long = "y".repeat(300);

        // zero capacity
        let mut buf = Buffer::new();
        let n = bprintf!(buf, "{} {}", "a0001", 42).unwrap();
        assert_eq!(n, 8);
        assert_eq!(buf.as_str().unwrap(), format!("{} {}", "a0001", 42));
        assert_eq!(buf.capacity(), 128);
        assert_terminated(&buf);

        // zero capacity, output larger than the pre-growth step
        let mut buf = Buffer::new();
        let n = bprintf!(buf, "<{}>", long).unwrap();
        assert_eq!(n, 302);
        assert_eq!(buf.as_str().unwrap(), format!("<{}>", long));
        assert_terminated(&buf);

        // seeded, a single free byte left
        let mut buf = Buffer::from_seed(Some("abc")).unwrap();
        let n = bprintf!(buf, "-{}-", 1234).unwrap();
        assert_eq!(n, 6);
        assert_eq!(buf.as_str().unwrap(), "abc-1234-");
        assert_eq!(buf.capacity(), 4 + 128);
        assert_terminated(&buf);

        // partially filled, output larger than what is left
        let mut buf = Buffer::new();
        buf.append_str("head:").unwrap();
        bprintf!(buf, "{}", long).unwrap();
        assert_eq!(buf.as_str().unwrap(), format!("head:{}", long));
        assert_terminated(&buf);
    }

    #[test]
    fn test_fmt_exact_fit() {
        let mut buf = Buffer::new();
        buf.append_char(b'>').unwrap();
        assert_eq!(buf.capacity(), 128);

        // 126 bytes + terminator fill the 127 remaining bytes
        let fill = "f".repeat(126);
        let n = bprintf!(buf, "{}", fill).unwrap();
        assert_eq!(n, 126);
        assert_eq!(buf.capacity(), 128);
        assert_terminated(&buf);

        // one more byte requires growth
        let n = bprintf!(buf, "{}", "g").unwrap();
        assert_eq!(n, 1);
        assert_eq!(buf.capacity(), 256);
        assert_eq!(buf.len(), 128);
        assert_terminated(&buf);
    }

    #[test]
    fn test_fmt_error_keeps_content() {
        struct Faulty;
        impl fmt::Display for Faulty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("partial")?;
                Err(fmt::Error)
            }
        }

        let mut buf = Buffer::from_seed(Some("keep")).unwrap();
        let res = bprintf!(buf, "{}", Faulty);
        assert!(matches!(res, Err(BufferError::Format)));
        assert_eq!(buf.as_bytes(), b"keep");
        assert_terminated(&buf);
    }

    #[test]
    fn test_split_off() {
        let mut buf = Buffer::new();
        buf.append_str("AUTHENTICATE PLAIN dQB1AHA=").unwrap();

        let mut tail = buf.split_off(18).unwrap();
        assert_eq!(buf.as_bytes(), b"AUTHENTICATE PLAIN");
        assert_eq!(tail.as_bytes(), b" dQB1AHA=");
        assert_terminated(&buf);
        assert_terminated(&tail);

        tail.append_str("\r\n").unwrap();
        assert_eq!(tail.as_bytes(), b" dQB1AHA=\r\n");

        assert!(matches!(
            buf.split_off(19),
            Err(BufferError::OutOfBounds { at: 19, len: 18 })
        ));

        buf.truncate(12);
        assert_eq!(buf.as_bytes(), b"AUTHENTICATE");
        assert_terminated(&buf);
        buf.truncate(100);
        assert_eq!(buf.as_bytes(), b"AUTHENTICATE");
    }

    #[test]
    fn test_clear_and_write() {
        let mut buf = Buffer::new();
        write!(buf, "{}{}", "a", 1).unwrap();
        assert_eq!(buf.as_bytes(), b"a1");

        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 128);
        assert_terminated(&buf);

        Buffer::release(Some(buf));
        Buffer::release(None);
    }
}
