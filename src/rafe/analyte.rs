//! Analyte name → RAFE mode resolution.
//!
//! Resolution order: the well-known table below, then a linear search of
//! every preset's analyte list, then [`RafeMode::Idle`].

use serde::{Deserialize, Serialize};

use super::preset::{PRESETS, RafeMode};

/// Analytes whose mode is fixed regardless of preset contents.
const KNOWN: [(&str, RafeMode); 6] = [
    ("glucose", RafeMode::LiquidEc),
    ("lactate", RafeMode::LiquidEc),
    ("radon", RafeMode::GasHighZ),
    ("vocs", RafeMode::GasHighZ),
    ("virus", RafeMode::BioImpedance),
    ("bacteria", RafeMode::BioImpedance),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAnalyte {
    /// Canonical preset casing, or the trimmed input if unknown.
    pub name: String,
    pub mode: RafeMode,
}

/// Canonical casing from whichever preset lists the analyte.
pub fn canonical_name(input: &str) -> Option<&'static str> {
    let wanted = input.trim();
    PRESETS.iter().find_map(|p| p.canonical_analyte(wanted))
}

pub fn required_mode(input: &str) -> RafeMode {
    let wanted = input.trim();
    KNOWN
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(wanted))
        .map(|&(_, mode)| mode)
        .or_else(|| {
            PRESETS
                .iter()
                .find(|p| p.canonical_analyte(wanted).is_some())
                .map(|p| p.mode)
        })
        .unwrap_or(RafeMode::Idle)
}

pub fn resolve(input: &str) -> ResolvedAnalyte {
    let name = canonical_name(input).map_or_else(|| input.trim().to_string(), str::to_string);
    ResolvedAnalyte {
        mode: required_mode(input),
        name,
    }
}
