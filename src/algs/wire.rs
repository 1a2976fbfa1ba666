//! Fixed, little-endian wire types for the field exchange.

use bytemuck::{Pod, Zeroable};

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

/// Bytes per exchanged value.
pub const VALUE_BYTES: usize = std::mem::size_of::<f64>();

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// Append `values` to `dst` as little-endian `f64`s.
#[inline]
pub fn pack_f64(dst: &mut Vec<u8>, values: impl IntoIterator<Item = f64>) {
    for v in values {
        dst.extend_from_slice(&v.to_le_bytes());
    }
}

/// Decode little-endian `f64`s; trailing bytes that do not fill a value are ignored.
#[inline]
pub fn unpack_f64(src: &[u8]) -> impl Iterator<Item = f64> + '_ {
    src.chunks_exact(VALUE_BYTES).map(|c| {
        let mut b = [0u8; VALUE_BYTES];
        b.copy_from_slice(c);
        f64::from_le_bytes(b)
    })
}

/// Link-size handshake record.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug, PartialEq, Eq)]
pub struct WireCount {
    pub n_le: u32, // number of shared DOFs on the link
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }

    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }

    /// Decode a received record, checking its length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        expect_exact_len(bytes.len(), std::mem::size_of::<WireCount>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }
}
