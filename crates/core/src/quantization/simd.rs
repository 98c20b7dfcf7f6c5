//! SIMD-accelerated Hamming distance kernels.
//!
//! Provides POPCNT, AVX2 (nibble lookup, Muła et al.) and AVX-512 VPOPCNTDQ
//! implementations of XOR + popcount over packed vectors. Every kernel
//! returns exactly the same integer as [`super::binary::hamming`]; the tier only
//! changes speed.

use crate::backend::capability::{detect_capability, CapabilityTier};

/// A Hamming kernel bound to one capability tier.
///
/// Can only be constructed for tiers the host supports, which is what makes
/// the `unsafe` dispatch in [`HammingKernel::distance`] sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HammingKernel {
    tier: CapabilityTier,
}

impl HammingKernel {
    /// Kernel for `tier`, or `None` if the host CPU does not support it.
    pub fn for_tier(tier: CapabilityTier) -> Option<Self> {
        (tier <= detect_capability()).then_some(Self { tier })
    }

    /// Fastest kernel the host supports.
    pub fn best() -> Self {
        Self {
            tier: detect_capability(),
        }
    }

    /// Portable kernel, available everywhere.
    pub fn scalar() -> Self {
        Self {
            tier: CapabilityTier::Scalar,
        }
    }

    pub fn tier(&self) -> CapabilityTier {
        self.tier
    }

    /// Hamming distance between two packed vectors of equal length.
    #[inline]
    #[allow(unreachable_code)]
    pub fn distance(&self, a: &[u8], b: &[u8]) -> u32 {
        debug_assert_eq!(a.len(), b.len());
        #[cfg(target_arch = "x86_64")]
        {
            // SAFETY: `self.tier <= detect_capability()` by construction and
            // tiers are cumulative, so every feature each kernel enables is present.
            match self.tier {
                CapabilityTier::Avx512Vpopcnt => return unsafe { avx512_hamming(a, b) },
                CapabilityTier::Avx512 | CapabilityTier::Avx2 => {
                    return unsafe { avx2_hamming(a, b) }
                }
                CapabilityTier::Sse2 => return unsafe { popcnt_hamming(a, b) },
                CapabilityTier::Scalar => {}
            }
        }
        scalar_hamming(a, b)
    }
}

// ============================================================================
// Scalar (u64 words)
// ============================================================================

/// Portable kernel: XOR + `count_ones` over 8-byte words, then the byte tail.
#[inline]
pub fn scalar_hamming(a: &[u8], b: &[u8]) -> u32 {
    let mut total = 0u32;
    let mut wa = a.chunks_exact(8);
    let mut wb = b.chunks_exact(8);
    for (x, y) in (&mut wa).zip(&mut wb) {
        let x = u64::from_ne_bytes([x[0], x[1], x[2], x[3], x[4], x[5], x[6], x[7]]);
        let y = u64::from_ne_bytes([y[0], y[1], y[2], y[3], y[4], y[5], y[6], y[7]]);
        total += (x ^ y).count_ones();
    }
    for (x, y) in wa.remainder().iter().zip(wb.remainder()) {
        total += (x ^ y).count_ones();
    }
    total
}

// ============================================================================
// x86_64 kernels
// ============================================================================

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

/// Same loop as [`scalar_hamming`], compiled with the hardware POPCNT instruction.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "popcnt")]
unsafe fn popcnt_hamming(a: &[u8], b: &[u8]) -> u32 {
    scalar_hamming(a, b)
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn avx2_hamming(a: &[u8], b: &[u8]) -> u32 {
    let len = a.len();
    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    let lookup = _mm256_setr_epi8(
        0, 1, 1, 2, 1, 2, 2, 3, 1, 2, 2, 3, 2, 3, 3, 4, //
        0, 1, 1, 2, 1, 2, 2, 3, 1, 2, 2, 3, 2, 3, 3, 4,
    );
    let low_mask = _mm256_set1_epi8(0x0f);
    let zero = _mm256_setzero_si256();
    let mut acc = _mm256_setzero_si256();

    let chunks = len / 32;
    for i in 0..chunks {
        let base = i * 32;
        let x = _mm256_xor_si256(
            _mm256_loadu_si256(a_ptr.add(base).cast()),
            _mm256_loadu_si256(b_ptr.add(base).cast()),
        );
        let lo = _mm256_and_si256(x, low_mask);
        let hi = _mm256_and_si256(_mm256_srli_epi16(x, 4), low_mask);
        let counts = _mm256_add_epi8(
            _mm256_shuffle_epi8(lookup, lo),
            _mm256_shuffle_epi8(lookup, hi),
        );
        acc = _mm256_add_epi64(acc, _mm256_sad_epu8(counts, zero));
    }

    let mut lanes = [0u64; 4];
    _mm256_storeu_si256(lanes.as_mut_ptr().cast(), acc);
    let head = lanes.iter().sum::<u64>() as u32;

    let tail = chunks * 32;
    head + scalar_hamming(&a[tail..], &b[tail..])
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx512f,avx512vpopcntdq,popcnt")]
unsafe fn avx512_hamming(a: &[u8], b: &[u8]) -> u32 {
    let len = a.len();
    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    let mut acc = _mm512_setzero_si512();
    let chunks = len / 64;
    for i in 0..chunks {
        let base = i * 64;
        let x = _mm512_xor_si512(
            _mm512_loadu_si512(a_ptr.add(base).cast()),
            _mm512_loadu_si512(b_ptr.add(base).cast()),
        );
        acc = _mm512_add_epi64(acc, _mm512_popcnt_epi64(x));
    }
    let head = _mm512_reduce_add_epi64(acc) as u32;

    let tail = chunks * 64;
    head + scalar_hamming(&a[tail..], &b[tail..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantization::binary::hamming;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_bytes(rng: &mut StdRng, len: usize) -> Vec<u8> {
        (0..len).map(|_| rng.gen()).collect()
    }

    #[test]
    fn test_scalar_kernel_matches_reference() {
        let mut rng = StdRng::seed_from_u64(7);
        for len in [0, 1, 7, 8, 9, 31, 32, 33, 48, 64, 65, 96, 130] {
            let a = random_bytes(&mut rng, len);
            let b = random_bytes(&mut rng, len);
            assert_eq!(scalar_hamming(&a, &b), hamming(&a, &b), "len {len}");
        }
    }

    #[test]
    fn test_every_supported_tier_matches_reference() {
        let mut rng = StdRng::seed_from_u64(42);
        for tier in CapabilityTier::ALL {
            let Some(kernel) = HammingKernel::for_tier(tier) else {
                continue;
            };
            for len in [0, 5, 16, 32, 48, 63, 64, 100, 128, 200] {
                let a = random_bytes(&mut rng, len);
                let b = random_bytes(&mut rng, len);
                assert_eq!(
                    kernel.distance(&a, &b),
                    hamming(&a, &b),
                    "tier {tier:?} len {len}"
                );
            }
        }
    }

    #[test]
    fn test_max_distance_all_tiers() {
        let a = vec![0x00u8; 200];
        let b = vec![0xFFu8; 200];
        for tier in CapabilityTier::ALL {
            if let Some(kernel) = HammingKernel::for_tier(tier) {
                assert_eq!(kernel.distance(&a, &b), 1600);
            }
        }
    }

    #[test]
    fn test_unsupported_tier_not_constructible() {
        let detected = detect_capability();
        for tier in CapabilityTier::ALL {
            assert_eq!(HammingKernel::for_tier(tier).is_some(), tier <= detected);
        }
        assert_eq!(HammingKernel::best().tier(), detected);
        assert_eq!(HammingKernel::scalar().tier(), CapabilityTier::Scalar);
    }
}
