// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Byte buffer backing a regular file

use crate::error::{FsError, FsResult};

/// Growable file content. Writes past the end zero-fill the gap.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct FileContent {
    bytes: Vec<u8>,
}

impl FileContent {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub(crate) fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Copy bytes at `offset` into `buf`; returns 0 at or past the end.
    pub(crate) fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize {
        let Ok(start) = usize::try_from(offset) else {
            return 0;
        };
        if start >= self.bytes.len() {
            return 0;
        }

        let end = std::cmp::min(start + buf.len(), self.bytes.len());
        let count = end - start;
        buf[..count].copy_from_slice(&self.bytes[start..end]);
        count
    }

    /// Fails without touching the buffer when `offset + data.len()` cannot
    /// be addressed or allocated.
    pub(crate) fn write_at(&mut self, offset: u64, data: &[u8]) -> FsResult<usize> {
        let end = usize::try_from(offset)
            .ok()
            .and_then(|start| start.checked_add(data.len()))
            .ok_or_else(|| FsError::InvalidArgument(format!("write at offset {offset} is out of range")))?;
        let start = end - data.len();

        if end > self.bytes.len() {
            self.bytes
                .try_reserve(end - self.bytes.len())
                .map_err(|e| FsError::InvalidArgument(format!("cannot grow file to {end} bytes: {e}")))?;
            self.bytes.resize(end, 0);
        }

        self.bytes[start..end].copy_from_slice(data);
        Ok(data.len())
    }

    /// Shrink to `new_len`. Never grows the buffer.
    pub(crate) fn truncate(&mut self, new_len: u64) {
        if new_len < self.len() {
            self.bytes.truncate(new_len as usize);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_past_end_zero_fills() {
        let mut content = FileContent::new();
        assert_eq!(content.write_at(4, b"ab").unwrap(), 2);
        assert_eq!(content.as_bytes(), &[0, 0, 0, 0, b'a', b'b']);
    }

    #[test]
    fn unaddressable_writes_fail_and_leave_content() {
        let mut content = FileContent::from_bytes(b"keep".to_vec());
        assert!(matches!(content.write_at(u64::MAX, b"x"), Err(FsError::InvalidArgument(_))));
        assert!(matches!(
            content.write_at(u64::MAX / 2, b"x"),
            Err(FsError::InvalidArgument(_))
        ));
        assert_eq!(content.as_bytes(), b"keep");
    }

    #[test]
    fn read_stops_at_end() {
        let content = FileContent::from_bytes(b"hello".to_vec());
        let mut buf = [0u8; 8];
        assert_eq!(content.read_at(3, &mut buf), 2);
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(content.read_at(5, &mut buf), 0);
        assert_eq!(content.read_at(u64::MAX, &mut buf), 0);
    }

    #[test]
    fn truncate_never_grows() {
        let mut content = FileContent::from_bytes(b"hello".to_vec());
        content.truncate(10);
        assert_eq!(content.len(), 5);
        content.truncate(2);
        assert_eq!(content.as_bytes(), b"he");
    }
}
