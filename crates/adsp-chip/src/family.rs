//! Per-family capability tables.
//!
//! The two core generations differ in their breakpoint register layout, their
//! halt-cause encoding, and the clock domain they sit on. The driver consults
//! these tables instead of branching on the family at each use site.

use crate::isa;
use crate::regs::{OCD_IBC_BASE, OCD_IBC_STRIDE};

/// Instruction breakpoints per core, both families.
pub const NUM_BREAKPOINTS: usize = 2;

/// Core generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DspFamily {
    /// Six media cores; breakpoints enabled through one shared special
    /// register.
    Gen1,
    /// Two control cores; one memory-mapped control register per breakpoint.
    Gen2,
}

/// How breakpoint enables are addressed on a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointLayout {
    /// A single special register holds one enable bit per breakpoint.
    SharedEnable {
        /// Special-register number of the shared enable register.
        sr: u32,
    },
    /// One control register per breakpoint in the OCD window.
    PerBreakpointCtl {
        /// Offset of breakpoint 0's control register within the DSP window.
        base: usize,
        /// Stride to the next breakpoint's control register.
        stride: usize,
    },
}

/// Clock domain shared by all cores of one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockDomain {
    /// Domain of the Gen1 media cores.
    Media,
    /// Domain of the Gen2 control cores.
    Control,
}

impl ClockDomain {
    /// Index into per-domain tables.
    pub const fn index(self) -> usize {
        match self {
            Self::Media => 0,
            Self::Control => 1,
        }
    }
}

/// Dynamic power management level, a coarse index into the fixed per-domain
/// frequency table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DpmLevel {
    /// Lowest operating point.
    Minimum,
    /// Reduced operating point.
    Low,
    /// Nominal operating point.
    Nominal,
    /// Highest operating point.
    Turbo,
}

impl DpmLevel {
    /// Table index of this level.
    pub const fn index(self) -> usize {
        match self {
            Self::Minimum => 0,
            Self::Low => 1,
            Self::Nominal => 2,
            Self::Turbo => 3,
        }
    }
}

impl DspFamily {
    /// Clock domain this family votes on.
    pub const fn clock_domain(self) -> ClockDomain {
        match self {
            Self::Gen1 => ClockDomain::Media,
            Self::Gen2 => ClockDomain::Control,
        }
    }

    /// Fixed DPM frequency table, Hz, indexed by [`DpmLevel`].
    pub const fn dpm_table(self) -> [u64; 4] {
        match self {
            Self::Gen1 => [100_000_000, 200_000_000, 400_000_000, 600_000_000],
            Self::Gen2 => [150_000_000, 300_000_000, 600_000_000, 800_000_000],
        }
    }

    /// Frequency for one DPM level.
    pub const fn dpm_hz(self, level: DpmLevel) -> u64 {
        self.dpm_table()[level.index()]
    }

    /// Breakpoint enable layout.
    pub const fn breakpoints(self) -> BreakpointLayout {
        match self {
            Self::Gen1 => BreakpointLayout::SharedEnable {
                sr: isa::SR_IBREAKENABLE,
            },
            Self::Gen2 => BreakpointLayout::PerBreakpointCtl {
                base: OCD_IBC_BASE,
                stride: OCD_IBC_STRIDE,
            },
        }
    }

    /// DSR halt-cause code reported on an instruction-breakpoint hit.
    pub const fn hit_cause(self) -> u32 {
        match self {
            Self::Gen1 => 0x2,
            Self::Gen2 => 0x4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dpm_tables_monotonic() {
        for family in [DspFamily::Gen1, DspFamily::Gen2] {
            let t = family.dpm_table();
            assert!(t[0] < t[1] && t[1] < t[2] && t[2] < t[3]);
            assert_eq!(family.dpm_hz(DpmLevel::Turbo), t[3]);
        }
    }

    #[test]
    fn families_use_distinct_breakpoint_layouts() {
        assert!(matches!(
            DspFamily::Gen1.breakpoints(),
            BreakpointLayout::SharedEnable { .. }
        ));
        assert!(matches!(
            DspFamily::Gen2.breakpoints(),
            BreakpointLayout::PerBreakpointCtl { .. }
        ));
        assert_ne!(DspFamily::Gen1.hit_cause(), DspFamily::Gen2.hit_cause());
    }
}
