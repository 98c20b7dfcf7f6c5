//! Binary quantization: sign-bit packing and Hamming distance kernels.

/// Packer, reference Hamming distance, and the packed row matrix.
pub mod binary;
/// Capability-gated SIMD Hamming kernels.
pub mod simd;

pub use binary::{hamming, pack, packed_width, score, PackedMatrix};
pub use simd::HammingKernel;
