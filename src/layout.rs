//! Buffer sizing: total packed data bits to (buffer bytes, hash bits).

/// Derived sizing for one schema: the byte length of the packed buffer and
/// the width of the trailing hash fragment.
///
/// The buffer length is always a multiple of 3, so the base64 text needs no
/// padding, and the hash fragment is always at least 4 bits wide. Both are a
/// pure function of the schema's total data bit count, never stored on the
/// wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Packed buffer length in bytes.
    pub buffer_bytes: usize,
    /// Width of the trailing hash fragment in bits.
    pub hash_bits: usize,
}

impl Layout {
    /// Computes the layout for a schema whose packed fields total `data_bits`.
    pub fn for_data_bits(data_bits: usize) -> Self {
        let mut buffer_bytes = data_bits.div_ceil(8);
        if buffer_bytes % 3 != 0 {
            // must be a multiple of three
            buffer_bytes += 3 - buffer_bytes % 3;
        }

        let hash_bits = buffer_bytes * 8 - data_bits;
        if hash_bits < 4 {
            // too narrow to be a meaningful check value
            return Self {
                buffer_bytes: buffer_bytes + 3,
                hash_bits: hash_bits + 24,
            };
        }

        Self {
            buffer_bytes,
            hash_bits,
        }
    }

    /// Total bit capacity of the buffer: data bits plus hash bits.
    pub fn total_bits(&self) -> usize {
        self.buffer_bytes * 8
    }
}
