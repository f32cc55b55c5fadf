//! `Range: bytes=` request header handling.
//!
//! Only single ranges are honoured. Multi-range and malformed headers fall
//! back to a full response, which RFC 9110 allows.

/// Outcome of evaluating a `Range` header against a file length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// Serve the whole file (no header, or a header we ignore)
    Full,
    /// Serve `start..=end`
    Partial { start: u64, end: u64 },
    /// The range cannot be satisfied for this length (416)
    Unsatisfiable,
}

impl ByteRange {
    /// Evaluate an optional `Range` header value for a file of `len` bytes.
    pub fn parse(header: Option<&str>, len: u64) -> Self {
        let Some(value) = header else {
            return ByteRange::Full;
        };
        let Some(spec) = value.trim().strip_prefix("bytes=") else {
            return ByteRange::Full;
        };
        if spec.contains(',') {
            return ByteRange::Full;
        }
        let Some((start_raw, end_raw)) = spec.split_once('-') else {
            return ByteRange::Full;
        };
        let (start_raw, end_raw) = (start_raw.trim(), end_raw.trim());

        if start_raw.is_empty() {
            // Suffix range: the last N bytes
            let Ok(suffix) = end_raw.parse::<u64>() else {
                return ByteRange::Full;
            };
            if suffix == 0 || len == 0 {
                return ByteRange::Unsatisfiable;
            }
            return ByteRange::Partial {
                start: len.saturating_sub(suffix),
                end: len - 1,
            };
        }

        let Ok(start) = start_raw.parse::<u64>() else {
            return ByteRange::Full;
        };
        let end = if end_raw.is_empty() {
            len.saturating_sub(1)
        } else {
            match end_raw.parse::<u64>() {
                // last-pos before first-pos makes the range invalid, not unsatisfiable
                Ok(end) if end < start => return ByteRange::Full,
                Ok(end) => end.min(len.saturating_sub(1)),
                Err(_) => return ByteRange::Full,
            }
        };

        if len == 0 || start >= len {
            return ByteRange::Unsatisfiable;
        }
        ByteRange::Partial { start, end }
    }

    /// Number of body bytes for a file of `len` bytes.
    pub fn content_length(&self, len: u64) -> u64 {
        match *self {
            ByteRange::Full => len,
            ByteRange::Partial { start, end } => end - start + 1,
            ByteRange::Unsatisfiable => 0,
        }
    }

    /// Offset of the first body byte.
    pub fn offset(&self) -> u64 {
        match *self {
            ByteRange::Partial { start, .. } => start,
            _ => 0,
        }
    }
}
