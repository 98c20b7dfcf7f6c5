use super::{check_width, BackendError, CapabilityTier, HammingBackend};
use crate::quantization::{hamming, PackedMatrix};
use crate::search::{select_top_k, TopK};

/// Reference backend: byte-wise XOR + popcount, heap top-k. Always available.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarBackend;

impl HammingBackend for ScalarBackend {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn tier(&self) -> CapabilityTier {
        CapabilityTier::Scalar
    }

    fn batch_search(
        &self,
        query: &[u8],
        corpus: &PackedMatrix,
        k: usize,
    ) -> Result<TopK, BackendError> {
        check_width(query, corpus)?;
        let distances = corpus
            .iter_rows()
            .enumerate()
            .map(|(i, row)| (i, hamming(query, row)));
        Ok(select_top_k(distances, k))
    }
}
