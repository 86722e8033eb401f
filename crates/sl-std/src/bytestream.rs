//! Provides a [Cursor](std::io::Cursor) equivalent without [io::Error](std::io::Error)

#[derive(Clone, Copy, Debug)]
/// Provides a [Cursor](std::io::Cursor) equivalent without [io::Error](std::io::Error)
///
/// Every read either returns the requested data and advances the cursor,
/// or returns `None` and leaves the cursor where it was.
pub struct ByteStream<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

macro_rules! next_int {
    ($primitive: ty, $be_function: ident, $le_function: ident) => {
        #[must_use]
        pub fn $be_function(&mut self) -> Option<$primitive> {
            self.next_chunk().map(<$primitive>::from_be_bytes)
        }

        #[must_use]
        pub fn $le_function(&mut self) -> Option<$primitive> {
            self.next_chunk().map(<$primitive>::from_le_bytes)
        }
    };
}

impl<'a> ByteStream<'a> {
    #[must_use]
    pub const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, cursor: 0 }
    }

    /// Returns the bytes from cursor until the end of the stream
    ///
    /// If the cursor is past the end of the stream, an empty slice is returned
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        let index = self.cursor.min(self.bytes.len());
        &self.bytes[index..]
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining().is_empty()
    }

    /// The total length of the underlying buffer, independent of the cursor
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn advance(&mut self, n: usize) {
        self.cursor = self.cursor.saturating_add(n);
    }

    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor;
    }

    #[inline]
    #[must_use]
    pub fn next_chunk<const N: usize>(&mut self) -> Option<[u8; N]> {
        let chunk: [u8; N] = self.remaining().get(..N)?.try_into().ok()?;
        self.cursor += N;
        Some(chunk)
    }

    /// Read the next `n` bytes without copying them
    #[must_use]
    pub fn next_slice(&mut self, n: usize) -> Option<&'a [u8]> {
        let slice = self.remaining().get(..n)?;
        self.cursor += n;
        Some(slice)
    }

    #[must_use]
    pub fn next_byte(&mut self) -> Option<u8> {
        let byte = self.remaining().first().copied()?;
        self.cursor += 1;
        Some(byte)
    }

    #[must_use]
    pub fn next_i8(&mut self) -> Option<i8> {
        self.next_byte().map(|byte| byte as i8)
    }

    next_int!(u16, next_be_u16, next_le_u16);
    next_int!(i16, next_be_i16, next_le_i16);

    next_int!(u32, next_be_u32, next_le_u32);
    next_int!(i32, next_be_i32, next_le_i32);
}

#[cfg(test)]
mod tests {
    use super::ByteStream;

    #[test]
    fn read_integers() {
        let bytes = [0x12, 0x34, 0x56, 0x78, 0x9A];
        let mut stream = ByteStream::new(&bytes);

        assert_eq!(stream.next_le_u16(), Some(0x3412));
        assert_eq!(stream.next_be_u16(), Some(0x5678));
        assert_eq!(stream.cursor(), 4);

        // Not enough bytes left, the cursor must not move
        assert_eq!(stream.next_le_u32(), None);
        assert_eq!(stream.cursor(), 4);

        assert_eq!(stream.next_byte(), Some(0x9A));
        assert!(stream.is_empty());
        assert_eq!(stream.next_byte(), None);
    }

    #[test]
    fn empty_stream() {
        let stream = ByteStream::new(&[]);
        assert!(stream.remaining().is_empty());
    }

    #[test]
    fn cursor_past_end() {
        let bytes = [1, 2, 3];
        let mut stream = ByteStream::new(&bytes);
        stream.set_cursor(10);

        assert!(stream.is_empty());
        assert_eq!(stream.next_slice(1), None);
    }
}
