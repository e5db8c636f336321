use bitflags::bitflags;

macro_rules! registers {
    (
        $enum_name:ident, $slice_name:ident {
            $($name:ident = $val:expr),* $(,)?
        }
    ) => {
        #[repr(u8)]
        #[derive(Copy, Clone, Debug, PartialEq, Eq)]
        pub enum $enum_name {
            $($name = $val),*
        }

        pub const $slice_name: &[$enum_name] = &[
            $($enum_name::$name),*
        ];

        impl $enum_name {
            pub fn name(&self) -> &'static str {
                match self {
                    $($enum_name::$name => stringify!($name),)*
                }
            }
        }

        impl Register for $enum_name {
            fn addr(self) -> u8 {
                self as u8
            }
        }

        impl NamedRegister for $enum_name {
            fn name(&self) -> &'static str {
                self.name()
            }
        }

        impl From<$enum_name> for u8 {
            fn from(r: $enum_name) -> u8 {
                r as u8
            }
        }
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegOp {
    Read,
    Write,
}

pub trait NamedRegister: Register {
    fn name(&self) -> &'static str;
}

pub trait Register: Copy {
    fn addr(self) -> u8;
}

#[derive(Clone, Copy, Debug)]
pub struct RegConfig<R: Register> {
    pub op: RegOp,
    pub reg: R,
    pub value: u8,
}

registers! {
    MagReg, MAG_REGS {
        ChipId = 0x00,
        OutXL = 0x01,
        OutXH = 0x02,
        OutYL = 0x03,
        OutYH = 0x04,
        OutZL = 0x05,
        OutZH = 0x06,
        Status = 0x09,
        Control1 = 0x0A,
        Control2 = 0x0B,
        AxisSign = 0x29,
    }
}

pub const CHIP_ID: u8 = 0x80;

/// Length of the X/Y/Z burst starting at `OutXL`.
pub const DATA_BLOCK_LEN: usize = 6;

/// Value the vendor reference code writes to `AxisSign`.
pub const AXIS_SIGN_DEFAULT: u8 = 0x06;

/* STATUS
 * B7   B6   B5   B4   B3   B2   B1   B0
 * 0    0    0    0    0    0    OVFL DRDY
*/
bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct StatusFlags: u8 {
        const OVFL = 1 << 1;
        const DRDY = 1 << 0;
    }
}

/* CONTROL_1
 * B7   B6   B5   B4   B3   B2   B1   B0
 * OSR2 OSR2 OSR1 OSR1 ODR  ODR  MODE MODE
*/
pub const MAG_MODE_LOC: u8 = 0;
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MagMode {
    Suspend     = 0,
    Normal      = 1,
    Single      = 2,
    Continuous  = 3,
}

pub const MAG_ODR_LOC: u8 = 2;
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MagOdr {
    Hz10    = 0,
    Hz50    = 1,
    Hz100   = 2,
    Hz200   = 3,
}

pub const MAG_OSR1_LOC: u8 = 4;
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MagOsr1 {
    X8  = 0,
    X4  = 1,
    X2  = 2,
    X1  = 3,
}

pub const MAG_OSR2_LOC: u8 = 6;
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MagOsr2 {
    X1  = 0,
    X2  = 1,
    X4  = 2,
    X8  = 3,
}

/* CONTROL_2
 * B7   B6   B5   B4   B3   B2   B1   B0
 * SOFT SELF 0    0    RNG  RNG  SR   SR
 * RST  TEST
*/
bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Control2Flags: u8 {
        const SOFT_RST  = 1 << 7;
        const SELF_TEST = 1 << 6;
    }
}

pub const MAG_SET_RESET_LOC: u8 = 0;
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MagSetReset {
    SetAndReset = 0,
    SetOnly     = 1,
    Off         = 2,
}

pub const MAG_RNG_LOC: u8 = 2;
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MagRange {
    G30 = 0,
    G12 = 1,
    G8  = 2,
    G2  = 3,
}

impl MagRange {
    /// Sensitivity in LSB per gauss.
    pub fn lsb_per_gauss(self) -> f32 {
        match self {
            MagRange::G30 => 1000.0,
            MagRange::G12 => 2500.0,
            MagRange::G8 => 3750.0,
            MagRange::G2 => 15000.0,
        }
    }
}
