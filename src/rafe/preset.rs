//! Static RAFE mode presets and the switch matrix.
//!
//! ```text
//!             SW1 SW2 SW3 SW4 SW5 SW6 SW7 SW8
//!  IDLE        .   .   .   .   .   .   .   .
//!  LIQUID_EC   X   X   X   X   .   .   .   .
//!  GAS_HIGH_Z  .   .   .   X   X   .   .   X
//!  BIO_IMP     X   .   X   .   .   X   X   .
//! ```
//!
//! The switch matrix and active pins of a [`RafeState`](super::RafeState)
//! are always a projection of one of these rows.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

// ---------------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RafeMode {
    #[default]
    #[serde(rename = "MODE_IDLE")]
    Idle,
    /// Three-electrode amperometry on liquid samples.
    #[serde(rename = "MODE_LIQUID_EC")]
    LiquidEc,
    /// Electrometer input for gas / ion chamber sensors.
    #[serde(rename = "MODE_GAS_HIGH_Z")]
    GasHighZ,
    /// AC impedance spectroscopy.
    #[serde(rename = "MODE_BIO_IMPEDANCE")]
    BioImpedance,
}

impl RafeMode {
    pub const ALL: [Self; 4] = [Self::Idle, Self::LiquidEc, Self::GasHighZ, Self::BioImpedance];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "MODE_IDLE",
            Self::LiquidEc => "MODE_LIQUID_EC",
            Self::GasHighZ => "MODE_GAS_HIGH_Z",
            Self::BioImpedance => "MODE_BIO_IMPEDANCE",
        }
    }

    pub fn preset(self) -> &'static ModePreset {
        match self {
            Self::Idle => &PRESETS[0],
            Self::LiquidEc => &PRESETS[1],
            Self::GasHighZ => &PRESETS[2],
            Self::BioImpedance => &PRESETS[3],
        }
    }
}

impl fmt::Display for RafeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts `MODE_LIQUID_EC`, `liquid_ec`, … in any casing.
impl FromStr for RafeMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| {
                let full = m.as_str();
                full.eq_ignore_ascii_case(wanted)
                    || full
                        .strip_prefix("MODE_")
                        .is_some_and(|short| short.eq_ignore_ascii_case(wanted))
            })
            .ok_or_else(|| Error::UnknownMode(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalyteCategory {
    None,
    Metabolic,
    Environmental,
    Pathogen,
}

// ---------------------------------------------------------------------------
// Switch matrix
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwitchId {
    #[serde(rename = "SW1_WE_CONNECT")]
    WeConnect,
    #[serde(rename = "SW2_RE_CONNECT")]
    ReConnect,
    #[serde(rename = "SW3_CE_CONNECT")]
    CeConnect,
    #[serde(rename = "SW4_TIA_ENABLE")]
    TiaEnable,
    #[serde(rename = "SW5_HIGH_Z_MODE")]
    HighZMode,
    #[serde(rename = "SW6_AC_COUPLING")]
    AcCoupling,
    #[serde(rename = "SW7_DDS_OUTPUT")]
    DdsOutput,
    #[serde(rename = "SW8_GUARD_RING")]
    GuardRing,
}

impl SwitchId {
    pub const COUNT: usize = 8;

    pub const ALL: [Self; Self::COUNT] = [
        Self::WeConnect,
        Self::ReConnect,
        Self::CeConnect,
        Self::TiaEnable,
        Self::HighZMode,
        Self::AcCoupling,
        Self::DdsOutput,
        Self::GuardRing,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WeConnect => "SW1_WE_CONNECT",
            Self::ReConnect => "SW2_RE_CONNECT",
            Self::CeConnect => "SW3_CE_CONNECT",
            Self::TiaEnable => "SW4_TIA_ENABLE",
            Self::HighZMode => "SW5_HIGH_Z_MODE",
            Self::AcCoupling => "SW6_AC_COUPLING",
            Self::DdsOutput => "SW7_DDS_OUTPUT",
            Self::GuardRing => "SW8_GUARD_RING",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for SwitchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwitchState {
    #[default]
    Open,
    Closed,
}

impl fmt::Display for SwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
        })
    }
}

/// One switch flip within a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchChange {
    pub switch: SwitchId,
    pub from: SwitchState,
    pub to: SwitchState,
}

impl fmt::Display for SwitchChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}→{}", self.switch, self.from, self.to)
    }
}

/// At most one change per switch.
pub type SwitchChanges = heapless::Vec<SwitchChange, { SwitchId::COUNT }>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SwitchMatrix([SwitchState; SwitchId::COUNT]);

impl SwitchMatrix {
    /// All open.
    pub const fn open() -> Self {
        Self([SwitchState::Open; SwitchId::COUNT])
    }

    pub fn with_closed(closed: &[SwitchId]) -> Self {
        let mut m = Self::open();
        for &sw in closed {
            m.0[sw.index()] = SwitchState::Closed;
        }
        m
    }

    pub fn get(&self, switch: SwitchId) -> SwitchState {
        self.0[switch.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (SwitchId, SwitchState)> + '_ {
        SwitchId::ALL.into_iter().map(|sw| (sw, self.get(sw)))
    }

    /// Exactly the switches whose state differs, in SW1..SW8 order.
    pub fn diff(&self, target: &Self) -> SwitchChanges {
        let mut changes = SwitchChanges::new();
        for sw in SwitchId::ALL {
            let (from, to) = (self.get(sw), target.get(sw));
            if from != to {
                // Capacity equals the number of switches.
                let _ = changes.push(SwitchChange {
                    switch: sw,
                    from,
                    to,
                });
            }
        }
        changes
    }
}

// ---------------------------------------------------------------------------
// Pins
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PinFunction {
    WorkingElectrode,
    ReferenceElectrode,
    CounterElectrode,
    TiaOutput,
    HighZInput,
    GuardDrive,
    EhdSense,
    ExcitationOutput,
    ResponseInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinConfig {
    pub pin: u8,
    pub function: PinFunction,
}

const fn pin(pin: u8, function: PinFunction) -> PinConfig {
    PinConfig { pin, function }
}

pub const MAX_ACTIVE_PINS: usize = 8;
pub type ActivePins = heapless::Vec<PinConfig, MAX_ACTIVE_PINS>;

// ---------------------------------------------------------------------------
// Preset table
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
pub struct ModePreset {
    pub mode: RafeMode,
    pub category: AnalyteCategory,
    pub target_analytes: &'static [&'static str],
    pub input_impedance_ohm: f64,
    /// `0.0` for DC modes.
    pub frequency_hz: f64,
    pub gain: u32,
    pub closed_switches: &'static [SwitchId],
    pub pins: &'static [PinConfig],
    pub power_consumption_mw: f64,
}

impl ModePreset {
    pub fn switch_matrix(&self) -> SwitchMatrix {
        SwitchMatrix::with_closed(self.closed_switches)
    }

    pub fn active_pins(&self) -> ActivePins {
        self.pins.iter().copied().take(MAX_ACTIVE_PINS).collect()
    }

    /// Case-insensitive lookup in this preset's analyte list.
    pub fn canonical_analyte(&self, name: &str) -> Option<&'static str> {
        self.target_analytes
            .iter()
            .copied()
            .find(|a| a.eq_ignore_ascii_case(name))
    }
}

use PinFunction as F;
use SwitchId as S;

pub static PRESETS: [ModePreset; 4] = [
    ModePreset {
        mode: RafeMode::Idle,
        category: AnalyteCategory::None,
        target_analytes: &[],
        input_impedance_ohm: 0.0,
        frequency_hz: 0.0,
        gain: 1,
        closed_switches: &[],
        pins: &[],
        power_consumption_mw: 0.5,
    },
    ModePreset {
        mode: RafeMode::LiquidEc,
        category: AnalyteCategory::Metabolic,
        target_analytes: &["Glucose", "Lactate", "Uric Acid", "Cholesterol", "Ketone"],
        input_impedance_ohm: 1e7,
        frequency_hz: 0.0,
        gain: 1_000,
        closed_switches: &[S::WeConnect, S::ReConnect, S::CeConnect, S::TiaEnable],
        pins: &[
            pin(2, F::WorkingElectrode),
            pin(3, F::ReferenceElectrode),
            pin(4, F::CounterElectrode),
            pin(5, F::TiaOutput),
        ],
        power_consumption_mw: 12.0,
    },
    ModePreset {
        mode: RafeMode::GasHighZ,
        category: AnalyteCategory::Environmental,
        target_analytes: &["Radon", "VOCs", "CO2", "NH3"],
        input_impedance_ohm: 1e12,
        frequency_hz: 0.0,
        gain: 10_000,
        closed_switches: &[S::TiaEnable, S::HighZMode, S::GuardRing],
        pins: &[
            pin(6, F::HighZInput),
            pin(7, F::GuardDrive),
            pin(12, F::EhdSense),
        ],
        power_consumption_mw: 25.0,
    },
    ModePreset {
        mode: RafeMode::BioImpedance,
        category: AnalyteCategory::Pathogen,
        target_analytes: &["Virus", "Bacteria", "Cell Viability", "Biofilm"],
        input_impedance_ohm: 1e6,
        frequency_hz: 10_000.0,
        gain: 100,
        closed_switches: &[S::WeConnect, S::CeConnect, S::AcCoupling, S::DdsOutput],
        pins: &[
            pin(2, F::WorkingElectrode),
            pin(4, F::CounterElectrode),
            pin(8, F::ExcitationOutput),
            pin(9, F::ResponseInput),
        ],
        power_consumption_mw: 18.0,
    },
];
