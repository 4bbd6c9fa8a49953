//! f32 vector ↔ BLOB codec (little-endian, 4 bytes per component).

/// Encode a vector for the `embeddings.vector` column.
pub fn vec_to_blob(v: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(v.len() * 4);
    for f in v {
        out.extend_from_slice(&f.to_le_bytes());
    }
    out
}

/// Decode a `embeddings.vector` column. Trailing partial words are ignored.
pub fn blob_to_vec(b: &[u8]) -> Vec<f32> {
    b.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let v = vec![0.0f32, 1.5, -2.25, f32::MIN_POSITIVE];
        assert_eq!(blob_to_vec(&vec_to_blob(&v)), v);
    }

    #[test]
    fn ignores_trailing_bytes() {
        let mut b = vec_to_blob(&[1.0, 2.0]);
        b.push(0xFF);
        assert_eq!(blob_to_vec(&b), vec![1.0, 2.0]);
    }
}
