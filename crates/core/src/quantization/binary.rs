//! Binary quantization: one sign bit per dimension, packed LSB-first.
//!
//! Distance is the popcount of the XOR of two codes. Cheap and 32x smaller
//! than f32, but too lossy to guarantee high recall even with reranking.

use crate::error::Result;
use crate::quantization::{check_code, check_dimensions, QueryTable, Quantizer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryQuantizer {
    dimensions: usize,
}

impl BinaryQuantizer {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Packs `value > 0.0` bits; bit `d % 8` of byte `d / 8`.
    pub fn pack(vector: &[f32]) -> Vec<u8> {
        let mut out = vec![0u8; vector.len().div_ceil(8)];
        for (d, &v) in vector.iter().enumerate() {
            if v > 0.0 {
                out[d / 8] |= 1 << (d % 8);
            }
        }
        out
    }
}

impl Quantizer for BinaryQuantizer {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn code_size(&self) -> usize {
        self.dimensions.div_ceil(8)
    }

    fn is_trained(&self) -> bool {
        true
    }

    fn high_recall_suitable(&self) -> bool {
        false
    }

    fn encode(&self, vector: &[f32]) -> Result<Vec<u8>> {
        check_dimensions(self.dimensions, vector)?;
        Ok(Self::pack(vector))
    }

    /// Set bits decode to `1.0`, clear bits to `-1.0`.
    fn decode(&self, code: &[u8]) -> Result<Vec<f32>> {
        check_code(self.code_size(), code)?;
        Ok((0..self.dimensions)
            .map(|d| {
                if code[d / 8] & (1 << (d % 8)) != 0 {
                    1.0
                } else {
                    -1.0
                }
            })
            .collect())
    }

    fn prepare(&self, query: &[f32]) -> Result<QueryTable<'_>> {
        check_dimensions(self.dimensions, query)?;
        Ok(QueryTable::Binary {
            bits: Self::pack(query),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::distance::hamming_f32;

    #[test]
    fn test_pack_lsb_first() {
        let code = BinaryQuantizer::pack(&[1.0, -1.0, 0.0, 2.0, -0.5, 0.1, 0.0, 0.0, 3.0]);
        assert_eq!(code, vec![0b0010_1001, 0b0000_0001]);
    }

    #[test]
    fn test_code_size_rounds_up() {
        assert_eq!(BinaryQuantizer::new(9).code_size(), 2);
        assert_eq!(BinaryQuantizer::new(64).code_size(), 8);
    }

    #[test]
    fn test_distance_equals_sign_hamming() {
        let q = BinaryQuantizer::new(20);
        let a: Vec<f32> = (0..20).map(|i| if i % 3 == 0 { 1.0 } else { -1.0 }).collect();
        let b: Vec<f32> = (0..20).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        let d = q.distance(&a, &q.encode(&b).unwrap()).unwrap();
        assert_eq!(d, hamming_f32(&a, &b) as f32);
    }

    #[test]
    fn test_decode_signs() {
        let q = BinaryQuantizer::new(3);
        let decoded = q.decode(&q.encode(&[0.3, -2.0, 4.0]).unwrap()).unwrap();
        assert_eq!(decoded, vec![1.0, -1.0, 1.0]);
        assert!(!q.high_recall_suitable());
    }
}
