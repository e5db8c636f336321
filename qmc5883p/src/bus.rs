//! Sharing one I2C bus between several drivers.
//!
//! Each call on a [`SharedI2c`] handle runs inside a critical section, so a
//! register write or a write-read burst is never interleaved with another
//! device's traffic, and nothing is held between calls.

use core::cell::RefCell;
use critical_section::Mutex;

use embedded_hal::i2c::{ErrorType, I2c, Operation, SevenBitAddress};

pub struct SharedBus<I2C> {
    bus: Mutex<RefCell<I2C>>,
}

impl<I2C> SharedBus<I2C> {
    pub const fn new(i2c: I2C) -> Self {
        Self {
            bus: Mutex::new(RefCell::new(i2c)),
        }
    }

    /// Handle for one device on the bus.
    pub fn device(&self) -> SharedI2c<'_, I2C> {
        SharedI2c { bus: &self.bus }
    }

    pub fn into_inner(self) -> I2C {
        self.bus.into_inner().into_inner()
    }
}

pub struct SharedI2c<'a, I2C> {
    bus: &'a Mutex<RefCell<I2C>>,
}

impl<I2C> Clone for SharedI2c<'_, I2C> {
    fn clone(&self) -> Self {
        Self { bus: self.bus }
    }
}

impl<I2C> SharedI2c<'_, I2C> {
    fn with<R>(&self, f: impl FnOnce(&mut I2C) -> R) -> R {
        critical_section::with(|cs| {
            let mut i2c = self.bus.borrow(cs).borrow_mut();
            f(&mut i2c)
        })
    }
}

impl<I2C: ErrorType> ErrorType for SharedI2c<'_, I2C> {
    type Error = I2C::Error;
}

impl<I2C: I2c> I2c for SharedI2c<'_, I2C> {
    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.with(|i2c| i2c.read(addr, buffer))
    }

    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        self.with(|i2c| i2c.write(addr, bytes))
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.with(|i2c| i2c.write_read(addr, bytes, buffer))
    }

    fn transaction(
        &mut self,
        addr: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.with(|i2c| i2c.transaction(addr, operations))
    }
}
