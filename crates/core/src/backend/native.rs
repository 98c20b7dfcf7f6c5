use super::{check_width, BackendError, CapabilityTier, HammingBackend};
use crate::quantization::{HammingKernel, PackedMatrix};
use crate::search::{select_top_k, TopK};

/// SIMD backend: runs the widest Hamming kernel the host supports over every row.
#[derive(Debug, Clone, Copy)]
pub struct NativeBackend {
    kernel: HammingKernel,
}

impl NativeBackend {
    /// Best backend for this host, or `None` when only scalar code is usable.
    pub fn detect() -> Option<Self> {
        let kernel = HammingKernel::best();
        (kernel.tier() > CapabilityTier::Scalar).then_some(Self { kernel })
    }

    /// Backend pinned to `tier`. Fails when the host does not support it.
    pub fn with_tier(tier: CapabilityTier) -> Result<Self, BackendError> {
        HammingKernel::for_tier(tier)
            .map(|kernel| Self { kernel })
            .ok_or_else(|| BackendError::Unavailable(format!("{tier} not supported by this CPU")))
    }
}

impl HammingBackend for NativeBackend {
    fn name(&self) -> &'static str {
        match self.kernel.tier() {
            CapabilityTier::Scalar => "native-scalar",
            CapabilityTier::Sse2 => "native-popcnt",
            CapabilityTier::Avx2 | CapabilityTier::Avx512 => "native-avx2",
            CapabilityTier::Avx512Vpopcnt => "native-avx512-vpopcnt",
        }
    }

    fn tier(&self) -> CapabilityTier {
        self.kernel.tier()
    }

    fn batch_search(
        &self,
        query: &[u8],
        corpus: &PackedMatrix,
        k: usize,
    ) -> Result<TopK, BackendError> {
        check_width(query, corpus)?;
        let kernel = self.kernel;
        let distances = corpus
            .iter_rows()
            .enumerate()
            .map(|(i, row)| (i, kernel.distance(query, row)));
        Ok(select_top_k(distances, k))
    }
}
