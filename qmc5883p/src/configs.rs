use core::fmt;

use crate::calibration::{AxesMap, Axis, Rotation, IDENTITY_MATRIX};
use crate::registers::*;

pub const DEFAULT_ADDRESS: u8 = 0x2C;
pub const DEFAULT_UPDATE_INTERVAL_MS: u32 = 1000;

/// Consecutive failed polls before a soft reset is attempted.
pub const DEFAULT_FAULT_THRESHOLD: u8 = 3;
/// Failed soft resets tolerated before the driver latches `Faulted`.
pub const DEFAULT_RESET_BUDGET: u8 = 3;

pub const CONFIG_RESET: &[RegConfig<MagReg>] = &[
    RegConfig {
        op: RegOp::Write,
        reg: MagReg::Control2,
        value: Control2Flags::SOFT_RST.bits(),
    },
];

/// Measurement settings programmed into CONTROL_1 and CONTROL_2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSettings {
    pub mode: MagMode,
    pub odr: MagOdr,
    pub osr1: MagOsr1,
    pub osr2: MagOsr2,
    pub range: MagRange,
    pub set_reset: MagSetReset,
}

impl Default for DeviceSettings {
    /// Continuous 10 Hz, OSR1 = 8, OSR2 = 8, +/-8 G, set/reset on.
    fn default() -> Self {
        Self {
            mode: MagMode::Continuous,
            odr: MagOdr::Hz10,
            osr1: MagOsr1::X8,
            osr2: MagOsr2::X8,
            range: MagRange::G8,
            set_reset: MagSetReset::SetAndReset,
        }
    }
}

impl DeviceSettings {
    pub fn control1(&self) -> u8 {
        (self.osr2 as u8) << MAG_OSR2_LOC
            | (self.osr1 as u8) << MAG_OSR1_LOC
            | (self.odr as u8) << MAG_ODR_LOC
            | (self.mode as u8) << MAG_MODE_LOC
    }

    pub fn control2(&self) -> u8 {
        (self.range as u8) << MAG_RNG_LOC | (self.set_reset as u8) << MAG_SET_RESET_LOC
    }

    /// Register writes that bring the part out of reset into measurement mode.
    pub fn wakeup_config(&self) -> [RegConfig<MagReg>; 3] {
        [
            RegConfig {
                reg: MagReg::AxisSign,
                value: AXIS_SIGN_DEFAULT,
                op: RegOp::Write,
            },
            RegConfig {
                reg: MagReg::Control2,
                value: self.control2(),
                op: RegOp::Write,
            },
            RegConfig {
                reg: MagReg::Control1,
                value: self.control1(),
                op: RegOp::Write,
            },
        ]
    }
}

/// Unit of the published values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldUnits {
    #[default]
    Counts,
    Gauss,
    Microtesla,
}

impl FieldUnits {
    /// Factor from raw counts at `range` to this unit.
    pub fn scale(self, range: MagRange) -> f32 {
        match self {
            FieldUnits::Counts => 1.0,
            FieldUnits::Gauss => 1.0 / range.lsb_per_gauss(),
            FieldUnits::Microtesla => 100.0 / range.lsb_per_gauss(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultPolicy {
    pub fault_threshold: u8,
    pub reset_budget: u8,
}

impl Default for FaultPolicy {
    fn default() -> Self {
        Self {
            fault_threshold: DEFAULT_FAULT_THRESHOLD,
            reset_budget: DEFAULT_RESET_BUDGET,
        }
    }
}

/// Everything the driver needs at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// 7-bit bus address.
    pub address: u8,
    /// Host polling period, read back through `Qmc5883p::update_interval_ms`.
    pub update_interval_ms: u32,
    /// Publish `field_strength` alongside the three axes.
    pub publish_magnitude: bool,
    pub offsets: [f32; 3],
    /// Row-major soft-iron matrix.
    pub matrix: [f32; 9],
    pub rotation: Rotation,
    pub axes_map: AxesMap,
    pub device: DeviceSettings,
    pub units: FieldUnits,
    pub fault_policy: FaultPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            update_interval_ms: DEFAULT_UPDATE_INTERVAL_MS,
            publish_magnitude: false,
            offsets: [0.0; 3],
            matrix: IDENTITY_MATRIX,
            rotation: Rotation::Deg0,
            axes_map: AxesMap::IDENTITY,
            device: DeviceSettings::default(),
            units: FieldUnits::Counts,
            fault_policy: FaultPolicy::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address > 0x7F {
            return Err(ConfigError::InvalidAddress(self.address));
        }
        if self.update_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if let Some(i) = self.offsets.iter().position(|v| !v.is_finite()) {
            return Err(ConfigError::NonFiniteOffset(i));
        }
        if let Some(i) = self.matrix.iter().position(|v| !v.is_finite()) {
            return Err(ConfigError::NonFiniteMatrix(i));
        }
        if self.fault_policy.fault_threshold == 0 {
            return Err(ConfigError::ZeroFaultThreshold);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    InvalidAddress(u8),
    ZeroInterval,
    NonFiniteOffset(usize),
    NonFiniteMatrix(usize),
    InvalidRotation(u16),
    InvalidAxis,
    DuplicateAxis(Axis),
    ZeroFaultThreshold,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidAddress(a) => write!(f, "address {:#04x} is not 7-bit", a),
            ConfigError::ZeroInterval => write!(f, "update interval must be > 0"),
            ConfigError::NonFiniteOffset(i) => write!(f, "offset {} is not finite", i),
            ConfigError::NonFiniteMatrix(i) => write!(f, "matrix element {} is not finite", i),
            ConfigError::InvalidRotation(d) => write!(f, "rotation {} is not one of 0/90/180/270", d),
            ConfigError::InvalidAxis => write!(f, "axis must be one of x, y, z, -x, -y, -z"),
            ConfigError::DuplicateAxis(a) => write!(f, "axis {:?} mapped more than once", a),
            ConfigError::ZeroFaultThreshold => write!(f, "fault threshold must be > 0"),
        }
    }
}
