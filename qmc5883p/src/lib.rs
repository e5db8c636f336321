#![cfg_attr(not(test), no_std)]

//! Driver for the QMC5883P 3-axis magnetometer.
//!
//! [`Qmc5883p`] owns a calibration model and a handle to the bus. The host
//! calls [`Qmc5883p::initialize`] once and then [`Qmc5883p::poll`] on every
//! tick; each successful poll publishes `field_strength_x/y/z` (and
//! optionally `field_strength`) to a [`PublishSink`].
//!
//! Poll failures never reach the caller. They are counted, a soft reset is
//! tried after [`FaultPolicy::fault_threshold`] consecutive failures, and
//! once [`FaultPolicy::reset_budget`] resets are spent the driver latches in
//! [`DriverState::Faulted`] until it is initialized again.

pub mod bus;
pub mod calibration;
pub mod configs;
pub mod registers;
pub mod sample;
pub mod types;

use core::fmt;
use core::marker::PhantomData;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{debug, error, info, trace, warn};

use registers::*;

pub use calibration::*;
pub use configs::*;
pub use sample::{decode, DecodeError, RawSample};
pub use types::*;

/// Trait alias to support both I2c<SevenBitAddress> and I2c without address mode.
pub trait CompatibleI2c<E>: I2c<Error = E> {}
impl<T, E> CompatibleI2c<E> for T where T: I2c<Error = E> {}

const RESET_SETTLE_MS: u32 = 10;
const CONFIG_SETTLE_MS: u32 = 10;
const DRDY_TIMEOUT_MS: u32 = 60;
const DRDY_POLL_MS: u32 = 4;

#[derive(Debug)]
pub enum Error<E> {
    Transport(E),
    Decode(DecodeError),
    /// Chip id register did not hold the expected value.
    Verification { expected: u8, found: u8 },
    Config(ConfigError),
}

impl<E> From<DecodeError> for Error<E> {
    fn from(e: DecodeError) -> Self {
        Error::Decode(e)
    }
}

impl<E> From<ConfigError> for Error<E> {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(e) => write!(f, "bus error: {:?}", e),
            Error::Decode(e) => write!(f, "decode error: {}", e),
            Error::Verification { expected, found } => {
                write!(f, "chip id {:#04x}, expected {:#04x}", found, expected)
            }
            Error::Config(e) => write!(f, "invalid config: {}", e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Uninitialized,
    Configuring,
    Ready,
    Faulted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotInitialized,
    /// Faulted with no automatic recovery left.
    Latched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Transport,
    Decode(DecodeError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollOutcome {
    Published(CalibratedSample),
    Skipped(SkipReason),
    Failed(FaultKind),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub published: u32,
    pub skipped: u32,
    pub failed: u32,
    /// Polls that found DRDY clear and read the block anyway.
    pub drdy_misses: u32,
    pub consecutive_faults: u8,
    /// Soft resets since the last good sample.
    pub reset_attempts: u8,
    pub total_resets: u32,
}

pub struct Qmc5883p<I2C, E, D, S> {
    i2c: I2C,
    delay: D,
    sink: S,
    config: Config,
    calibration: CalibrationModel,
    state: DriverState,
    latched: bool,
    stats: Stats,
    _error: PhantomData<E>,
}

impl<I2C, E, D, S> Qmc5883p<I2C, E, D, S> {
    pub fn i2c(&mut self) -> &mut I2C {
        &mut self.i2c
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn destroy(self) -> (I2C, D, S) {
        (self.i2c, self.delay, self.sink)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn calibration(&self) -> &CalibrationModel {
        &self.calibration
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Faulted with automatic recovery given up.
    pub fn is_latched(&self) -> bool {
        self.latched
    }

    pub fn is_healthy(&self) -> bool {
        self.state == DriverState::Ready
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Polling period the host should schedule `poll` at.
    pub fn update_interval_ms(&self) -> u32 {
        self.config.update_interval_ms
    }
}

impl<I2C, E, D, S> Qmc5883p<I2C, E, D, S>
where
    I2C: CompatibleI2c<E>,
    E: fmt::Debug,
    D: DelayNs,
    S: PublishSink,
{
    /// The calibration model is derived from `config`. Nothing is sent on the bus.
    pub fn new(i2c: I2C, delay: D, sink: S, config: Config) -> Self {
        Self {
            i2c,
            delay,
            sink,
            calibration: CalibrationModel::from_config(&config),
            config,
            state: DriverState::Uninitialized,
            latched: false,
            stats: Stats::default(),
            _error: PhantomData,
        }
    }

    pub fn read_reg(&mut self, reg: u8) -> Result<u8, Error<E>> {
        let mut buf = [0u8];
        self.i2c
            .write_read(self.config.address, &[reg], &mut buf)
            .map_err(Error::Transport)?;
        Ok(buf[0])
    }

    pub fn write_reg(&mut self, reg: u8, val: u8) -> Result<(), Error<E>> {
        self.i2c
            .write(self.config.address, &[reg, val])
            .map_err(Error::Transport)
    }

    pub fn read_bytes(&mut self, start_reg: u8, buffer: &mut [u8]) -> Result<(), Error<E>> {
        self.i2c
            .write_read(self.config.address, &[start_reg], buffer)
            .map_err(Error::Transport)
    }

    pub fn apply_config<R>(&mut self, config: &[RegConfig<R>]) -> Result<(), Error<E>>
    where
        R: Register + NamedRegister + Copy,
    {
        for entry in config {
            let addr = entry.reg.addr();
            match entry.op {
                RegOp::Write => {
                    debug!("write_reg {:<9}({:#04X}) = {:#04x}", entry.reg.name(), addr, entry.value);
                    self.write_reg(addr, entry.value)?
                }
                RegOp::Read => {
                    let data = self.read_reg(addr)?;
                    debug!("read_reg {:<9}({:#04X}) = {:#04x}", entry.reg.name(), addr, data);
                }
            }
        }
        Ok(())
    }

    pub fn dump_config<R>(&mut self, regs: &[R]) -> Result<(), Error<E>>
    where
        R: NamedRegister + Copy,
    {
        for reg in regs {
            let addr = reg.addr();
            let v = self.read_reg(addr)?;
            debug!("{:<9}({:#04x}): 0x{:02X} ({:>3}) 0b{:08b}", reg.name(), addr, v, v, v);
        }
        Ok(())
    }

    pub fn chip_id(&mut self) -> Result<u8, Error<E>> {
        self.read_reg(MagReg::ChipId.addr())
    }

    pub fn status(&mut self) -> Result<StatusFlags, Error<E>> {
        let raw = self.read_reg(MagReg::Status.addr())?;
        Ok(StatusFlags::from_bits_truncate(raw))
    }

    /// Polls STATUS until DRDY is set. `Ok(false)` on timeout.
    pub fn wait_for_data_ready(&mut self, timeout_ms: u32) -> Result<bool, Error<E>> {
        let mut waited = 0;
        loop {
            if self.status()?.contains(StatusFlags::DRDY) {
                return Ok(true);
            }
            if waited >= timeout_ms {
                return Ok(false);
            }
            self.delay.delay_ms(DRDY_POLL_MS);
            waited += DRDY_POLL_MS;
        }
    }

    /// One burst read of the X/Y/Z block, uncalibrated.
    pub fn read_raw(&mut self) -> Result<RawSample, Error<E>> {
        let mut buf = [0u8; DATA_BLOCK_LEN];
        self.read_bytes(MagReg::OutXL.addr(), &mut buf)?;
        Ok(decode(&buf)?)
    }

    /// Reset, verify and program the device.
    ///
    /// Safe to call again at any time; it clears a latched fault and the
    /// fault counters. On failure the driver is left latched in `Faulted`.
    pub fn initialize(&mut self) -> Result<(), Error<E>> {
        self.latched = false;
        self.stats.consecutive_faults = 0;
        self.stats.reset_attempts = 0;
        self.set_state(DriverState::Configuring);

        let result = self
            .config
            .validate()
            .map_err(Error::from)
            .and_then(|_| self.configure());

        match result {
            Ok(()) => {
                self.set_state(DriverState::Ready);
                Ok(())
            }
            Err(e) => {
                warn!("init failed (addr={:#04X}): {}", self.config.address, e);
                self.latch();
                Err(e)
            }
        }
    }

    /// Install a new config and calibration, then initialize.
    pub fn reconfigure(&mut self, config: Config) -> Result<(), Error<E>> {
        config.validate()?;
        self.calibration = CalibrationModel::from_config(&config);
        self.config = config;
        self.initialize()
    }

    /// Replace only the calibration model, then initialize.
    pub fn recalibrate(&mut self, calibration: CalibrationModel) -> Result<(), Error<E>> {
        self.calibration = calibration;
        self.initialize()
    }

    /// One read-decode-calibrate-publish cycle. Never fails.
    pub fn poll(&mut self) -> PollOutcome {
        match self.state {
            DriverState::Uninitialized | DriverState::Configuring => {
                return self.skip(SkipReason::NotInitialized);
            }
            DriverState::Faulted if self.latched => {
                return self.skip(SkipReason::Latched);
            }
            DriverState::Ready | DriverState::Faulted => {}
        }

        match self.sample() {
            Ok(sample) => {
                self.stats.consecutive_faults = 0;
                self.stats.reset_attempts = 0;
                self.stats.published = self.stats.published.wrapping_add(1);
                self.set_state(DriverState::Ready);
                self.publish(&sample);
                PollOutcome::Published(sample)
            }
            Err(e) => {
                let kind = match e {
                    Error::Decode(d) => FaultKind::Decode(d),
                    _ => FaultKind::Transport,
                };
                self.stats.failed = self.stats.failed.wrapping_add(1);
                warn!("poll failed: {}", e);
                self.record_fault();
                PollOutcome::Failed(kind)
            }
        }
    }

    fn configure(&mut self) -> Result<(), Error<E>> {
        self.apply_config(CONFIG_RESET)?;
        self.delay.delay_ms(RESET_SETTLE_MS);

        let found = self.chip_id()?;
        if found != CHIP_ID {
            return Err(Error::Verification {
                expected: CHIP_ID,
                found,
            });
        }

        let wakeup = self.config.device.wakeup_config();
        self.apply_config(&wakeup)?;
        self.delay.delay_ms(CONFIG_SETTLE_MS);

        // Some boards never raise DRDY here but sample fine afterwards.
        if !self.wait_for_data_ready(DRDY_TIMEOUT_MS)? {
            debug!("DRDY not set after {} ms", DRDY_TIMEOUT_MS);
        }

        info!("init OK (addr={:#04X}, chip id {:#04x})", self.config.address, found);
        Ok(())
    }

    /// DRDY is advisory: some boards never raise it, so a clear flag is
    /// counted and the block is read regardless. Stale or empty blocks are
    /// caught by the decoder.
    fn sample(&mut self) -> Result<CalibratedSample, Error<E>> {
        if !self.status()?.contains(StatusFlags::DRDY) {
            self.stats.drdy_misses = self.stats.drdy_misses.wrapping_add(1);
            trace!("DRDY clear, reading anyway");
        }
        let raw = self.read_raw()?;
        trace!("raw xyz=({}, {}, {})", raw.x, raw.y, raw.z);
        Ok(self.calibration.apply(&raw))
    }

    fn publish(&mut self, sample: &CalibratedSample) {
        self.sink.publish(Channel::FieldStrengthX, sample.field.x);
        self.sink.publish(Channel::FieldStrengthY, sample.field.y);
        self.sink.publish(Channel::FieldStrengthZ, sample.field.z);
        if self.config.publish_magnitude {
            self.sink.publish(Channel::FieldStrength, sample.magnitude());
        }
    }

    fn skip(&mut self, reason: SkipReason) -> PollOutcome {
        self.stats.skipped = self.stats.skipped.wrapping_add(1);
        PollOutcome::Skipped(reason)
    }

    fn record_fault(&mut self) {
        self.stats.consecutive_faults = self.stats.consecutive_faults.saturating_add(1);
        self.set_state(DriverState::Faulted);

        if self.stats.consecutive_faults >= self.config.fault_policy.fault_threshold {
            self.stats.consecutive_faults = 0;
            self.soft_reset();
        }
    }

    fn soft_reset(&mut self) {
        let budget = self.config.fault_policy.reset_budget;
        if self.stats.reset_attempts >= budget {
            error!("reset budget of {} spent, giving up", budget);
            self.latch();
            return;
        }

        self.stats.reset_attempts += 1;
        self.stats.total_resets = self.stats.total_resets.wrapping_add(1);
        warn!("repeated bad reads, soft reset {}/{}", self.stats.reset_attempts, budget);

        self.set_state(DriverState::Configuring);
        match self.configure() {
            Ok(()) => self.set_state(DriverState::Ready),
            Err(e @ Error::Verification { .. }) => {
                error!("soft reset failed verification: {}", e);
                self.latch();
            }
            Err(e) => {
                warn!("soft reset failed: {}", e);
                self.set_state(DriverState::Faulted);
            }
        }
    }

    fn latch(&mut self) {
        self.latched = true;
        self.set_state(DriverState::Faulted);
    }

    fn set_state(&mut self, next: DriverState) {
        let was_ready = self.state == DriverState::Ready;
        let is_ready = next == DriverState::Ready;
        self.state = next;
        if was_ready != is_ready {
            self.sink.availability(is_ready);
        }
    }
}
