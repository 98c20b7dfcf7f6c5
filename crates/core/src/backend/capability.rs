//! Host CPU capability tiers.
//!
//! Detection runs once per process and the result never changes afterwards.
//! Tiers are cumulative: a host reported at tier `T` supports every feature of
//! every tier below `T`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Acceleration tier available to the native backend, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityTier {
    /// Portable code only.
    Scalar,
    /// SSE2 with hardware POPCNT.
    Sse2,
    /// 256-bit AVX2.
    Avx2,
    /// AVX-512 foundation.
    Avx512,
    /// AVX-512 with the VPOPCNTDQ population-count extension.
    Avx512Vpopcnt,
}

impl CapabilityTier {
    /// Every tier in ascending order.
    pub const ALL: [CapabilityTier; 5] = [
        CapabilityTier::Scalar,
        CapabilityTier::Sse2,
        CapabilityTier::Avx2,
        CapabilityTier::Avx512,
        CapabilityTier::Avx512Vpopcnt,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CapabilityTier::Scalar => "Scalar",
            CapabilityTier::Sse2 => "SSE2",
            CapabilityTier::Avx2 => "AVX2",
            CapabilityTier::Avx512 => "AVX-512",
            CapabilityTier::Avx512Vpopcnt => "AVX-512+VPOPCNT",
        }
    }
}

impl fmt::Display for CapabilityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

static CAPABILITY: OnceLock<CapabilityTier> = OnceLock::new();

/// The host's capability tier, probed on first call and cached for the process.
pub fn detect_capability() -> CapabilityTier {
    *CAPABILITY.get_or_init(probe)
}

#[cfg(target_arch = "x86_64")]
fn probe() -> CapabilityTier {
    use std::arch::is_x86_feature_detected;

    let mut tier = CapabilityTier::Scalar;
    if !(is_x86_feature_detected!("sse2") && is_x86_feature_detected!("popcnt")) {
        return tier;
    }
    tier = CapabilityTier::Sse2;
    if !is_x86_feature_detected!("avx2") {
        return tier;
    }
    tier = CapabilityTier::Avx2;
    if !is_x86_feature_detected!("avx512f") {
        return tier;
    }
    tier = CapabilityTier::Avx512;
    if is_x86_feature_detected!("avx512vpopcntdq") {
        tier = CapabilityTier::Avx512Vpopcnt;
    }
    tier
}

#[cfg(not(target_arch = "x86_64"))]
fn probe() -> CapabilityTier {
    CapabilityTier::Scalar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers_are_totally_ordered() {
        for pair in CapabilityTier::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_detection_is_stable() {
        let first = detect_capability();
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(detect_capability))
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), first);
        }
    }

    #[test]
    fn test_names() {
        assert_eq!(CapabilityTier::Avx512Vpopcnt.to_string(), "AVX-512+VPOPCNT");
        assert_eq!(
            serde_json::to_string(&CapabilityTier::Avx2).unwrap(),
            "\"avx2\""
        );
    }
}
