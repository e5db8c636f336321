//! Mounting and hard/soft-iron correction.
//!
//! A [`CalibrationModel`] turns a [`RawSample`] into a [`CalibratedSample`]
//! in a fixed order:
//!
//! ```text
//! remap -> rotate about +Z -> subtract offsets -> 3x3 matrix -> unit scale
//! ```
//!
//! Remap and rotation do not commute once a mirrored axis is involved, so the
//! order above is part of the contract.

use core::str::FromStr;

use crate::configs::{Config, ConfigError};
use crate::sample::RawSample;
use crate::types::ThreeAxes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    pub fn factor(self) -> f32 {
        match self {
            Sign::Positive => 1.0,
            Sign::Negative => -1.0,
        }
    }
}

/// One entry of the axes map: which raw axis feeds a logical axis, and with what sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisSource {
    pub axis: Axis,
    pub sign: Sign,
}

impl AxisSource {
    pub const X: AxisSource = AxisSource::new(Axis::X, Sign::Positive);
    pub const Y: AxisSource = AxisSource::new(Axis::Y, Sign::Positive);
    pub const Z: AxisSource = AxisSource::new(Axis::Z, Sign::Positive);
    pub const NEG_X: AxisSource = AxisSource::new(Axis::X, Sign::Negative);
    pub const NEG_Y: AxisSource = AxisSource::new(Axis::Y, Sign::Negative);
    pub const NEG_Z: AxisSource = AxisSource::new(Axis::Z, Sign::Negative);

    pub const fn new(axis: Axis, sign: Sign) -> Self {
        Self { axis, sign }
    }
}

impl FromStr for AxisSource {
    type Err = ConfigError;

    /// Accepts `x`, `y`, `z`, optionally prefixed with `-`, in either case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (sign, name) = match s.strip_prefix('-') {
            Some(rest) => (Sign::Negative, rest),
            None => (Sign::Positive, s),
        };
        let axis = match name {
            "x" | "X" => Axis::X,
            "y" | "Y" => Axis::Y,
            "z" | "Z" => Axis::Z,
            _ => return Err(ConfigError::InvalidAxis),
        };
        Ok(AxisSource::new(axis, sign))
    }
}

/// Signed permutation of the three raw axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxesMap([AxisSource; 3]);

impl AxesMap {
    pub const IDENTITY: AxesMap = AxesMap([AxisSource::X, AxisSource::Y, AxisSource::Z]);

    /// Fails unless the three entries name three different raw axes.
    pub fn new(entries: [AxisSource; 3]) -> Result<Self, ConfigError> {
        let mut seen = [false; 3];
        for entry in entries.iter() {
            let idx = entry.axis as usize;
            if seen[idx] {
                return Err(ConfigError::DuplicateAxis(entry.axis));
            }
            seen[idx] = true;
        }
        Ok(Self(entries))
    }

    pub fn entries(&self) -> &[AxisSource; 3] {
        &self.0
    }

    pub fn apply(&self, raw: [f32; 3]) -> ThreeAxes {
        let pick = |src: AxisSource| raw[src.axis as usize] * src.sign.factor();
        ThreeAxes::new(pick(self.0[0]), pick(self.0[1]), pick(self.0[2]))
    }
}

impl Default for AxesMap {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Mounting rotation about +Z, applied after the axes map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    pub fn apply(self, v: ThreeAxes) -> ThreeAxes {
        let ThreeAxes { x, y, z } = v;
        match self {
            Rotation::Deg0 => ThreeAxes::new(x, y, z),
            Rotation::Deg90 => ThreeAxes::new(y, -x, z),
            Rotation::Deg180 => ThreeAxes::new(-x, -y, z),
            Rotation::Deg270 => ThreeAxes::new(-y, x, z),
        }
    }
}

impl TryFrom<u16> for Rotation {
    type Error = ConfigError;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(ConfigError::InvalidRotation(other)),
        }
    }
}

/// Corrected field vector for one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CalibratedSample {
    pub field: ThreeAxes,
}

impl CalibratedSample {
    pub fn magnitude(&self) -> f32 {
        self.field.norm()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationModel {
    offsets: ThreeAxes,
    matrix: [[f32; 3]; 3],
    rotation: Rotation,
    axes_map: AxesMap,
    unit_scale: f32,
}

pub const IDENTITY_MATRIX: [f32; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

impl Default for CalibrationModel {
    fn default() -> Self {
        Self::from_parts([0.0; 3], IDENTITY_MATRIX, Rotation::Deg0, AxesMap::IDENTITY)
    }
}

impl CalibrationModel {
    /// `matrix` is row-major. Offsets and matrix entries must be finite.
    pub fn new(
        offsets: [f32; 3],
        matrix: [f32; 9],
        rotation: Rotation,
        axes_map: AxesMap,
    ) -> Result<Self, ConfigError> {
        if let Some(i) = offsets.iter().position(|v| !v.is_finite()) {
            return Err(ConfigError::NonFiniteOffset(i));
        }
        if let Some(i) = matrix.iter().position(|v| !v.is_finite()) {
            return Err(ConfigError::NonFiniteMatrix(i));
        }
        Ok(Self::from_parts(offsets, matrix, rotation, axes_map))
    }

    fn from_parts(offsets: [f32; 3], matrix: [f32; 9], rotation: Rotation, axes_map: AxesMap) -> Self {
        let mut rows = [[0.0f32; 3]; 3];
        for (i, row) in rows.iter_mut().enumerate() {
            row.copy_from_slice(&matrix[i * 3..i * 3 + 3]);
        }
        Self {
            offsets: ThreeAxes::from_array(offsets),
            matrix: rows,
            rotation,
            axes_map,
            unit_scale: 1.0,
        }
    }

    /// Multiplier applied after the matrix, e.g. counts to gauss.
    pub fn with_unit_scale(mut self, unit_scale: f32) -> Self {
        self.unit_scale = unit_scale;
        self
    }

    /// Callers validate `config` first; `Config::validate` applies the same
    /// finiteness checks as [`CalibrationModel::new`].
    pub fn from_config(config: &Config) -> Self {
        Self::from_parts(config.offsets, config.matrix, config.rotation, config.axes_map)
            .with_unit_scale(config.units.scale(config.device.range))
    }

    pub fn offsets(&self) -> ThreeAxes {
        self.offsets
    }

    pub fn matrix(&self) -> &[[f32; 3]; 3] {
        &self.matrix
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn axes_map(&self) -> &AxesMap {
        &self.axes_map
    }

    pub fn unit_scale(&self) -> f32 {
        self.unit_scale
    }

    pub fn apply(&self, raw: &RawSample) -> CalibratedSample {
        let mapped = self.axes_map.apply(raw.to_axes().as_array());
        let mut v = self.rotation.apply(mapped);
        v.sub(&self.offsets);

        let c = v.as_array();
        let m = &self.matrix;
        let mut field = ThreeAxes::new(
            m[0][0] * c[0] + m[0][1] * c[1] + m[0][2] * c[2],
            m[1][0] * c[0] + m[1][1] * c[1] + m[1][2] * c[2],
            m[2][0] * c[0] + m[2][1] * c[1] + m[2][2] * c[2],
        );
        field.scale(self.unit_scale);

        CalibratedSample { field }
    }
}
