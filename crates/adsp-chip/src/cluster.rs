//! Fixed cluster topology.
//!
//! The id → core mapping is a property of the silicon: ids 0–5 are the six
//! Gen1 media cores, ids 6–7 the two Gen2 control cores. Ids are fixed at
//! power-on and never migrate to a different physical core.

use crate::family::DspFamily;

/// Number of DSP cores in the cluster.
pub const DSP_COUNT: usize = 8;

/// Number of Gen1 cores (ids `0..GEN1_COUNT`).
pub const GEN1_COUNT: usize = 6;

/// Base of the first per-DSP register window.
pub const DSP_WINDOW_BASE: usize = 0x1000;

/// Stride between per-DSP register windows.
pub const DSP_WINDOW_STRIDE: usize = 0x400;

/// Total size of the mapped cluster register space.
pub const REG_SPACE_SIZE: usize = DSP_WINDOW_BASE + DSP_COUNT * DSP_WINDOW_STRIDE;

/// Identifier of one DSP core in the cluster.
///
/// Carries any raw value; validity is checked by [`DspId::family`] and by the
/// driver at every entry point, so an out-of-range id is rejected before any
/// hardware access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DspId(pub u8);

impl DspId {
    /// Index into per-DSP tables.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Family of the core behind this id, `None` if the id is out of range.
    pub const fn family(self) -> Option<DspFamily> {
        match self.0 as usize {
            n if n < GEN1_COUNT => Some(DspFamily::Gen1),
            n if n < DSP_COUNT => Some(DspFamily::Gen2),
            _ => None,
        }
    }
}

impl std::fmt::Display for DspId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dsp{}", self.0)
    }
}

/// All valid ids, in order.
pub const ALL_IDS: [DspId; DSP_COUNT] = [
    DspId(0),
    DspId(1),
    DspId(2),
    DspId(3),
    DspId(4),
    DspId(5),
    DspId(6),
    DspId(7),
];

/// Base offset of the register window for `id`.
pub const fn dsp_window_base(id: DspId) -> usize {
    DSP_WINDOW_BASE + id.index() * DSP_WINDOW_STRIDE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_split_matches_topology() {
        assert_eq!(DspId(0).family(), Some(DspFamily::Gen1));
        assert_eq!(DspId(5).family(), Some(DspFamily::Gen1));
        assert_eq!(DspId(6).family(), Some(DspFamily::Gen2));
        assert_eq!(DspId(7).family(), Some(DspFamily::Gen2));
        assert_eq!(DspId(8).family(), None);
        assert_eq!(DspId(255).family(), None);
    }

    #[test]
    fn windows_fit_in_register_space() {
        for id in ALL_IDS {
            assert!(dsp_window_base(id) + DSP_WINDOW_STRIDE <= REG_SPACE_SIZE);
        }
    }
}
