#![allow(dead_code)]

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation, SevenBitAddress};

use qmc5883p::registers::{MagReg, Register, CHIP_ID};
use qmc5883p::{Channel, Config, PublishSink, Qmc5883p};

/// Bus transaction as seen by the fake device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Txn {
    Write { reg: u8, data: Vec<u8> },
    Read { reg: u8, len: usize },
    Failed,
}

/// Register-level model of a QMC5883P.
///
/// Data registers report `sample` while CONTROL_1 selects a measuring mode;
/// a soft reset clears every writable register.
#[derive(Debug)]
pub struct FakeQmc {
    pub address: u8,
    pub chip_id: u8,
    pub sample: Option<[i16; 3]>,
    pub drdy: bool,
    pub fail_next: usize,
    pub fail_always: bool,
    pub log: Vec<Txn>,
    regs: [u8; 0x40],
    ptr: u8,
}

impl FakeQmc {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            chip_id: CHIP_ID,
            sample: None,
            drdy: true,
            fail_next: 0,
            fail_always: false,
            log: Vec::new(),
            regs: [0; 0x40],
            ptr: 0,
        }
    }

    pub fn with_sample(address: u8, sample: [i16; 3]) -> Self {
        let mut fake = Self::new(address);
        fake.sample = Some(sample);
        fake
    }

    pub fn reg(&self, reg: MagReg) -> u8 {
        self.regs[reg.addr() as usize]
    }

    pub fn writes(&self) -> Vec<(u8, u8)> {
        self.log
            .iter()
            .filter_map(|t| match t {
                Txn::Write { reg, data } => Some((*reg, data[0])),
                _ => None,
            })
            .collect()
    }

    pub fn soft_resets(&self) -> usize {
        self.writes()
            .iter()
            .filter(|&&(reg, val)| reg == MagReg::Control2.addr() && val == 0x80)
            .count()
    }

    fn measuring(&self) -> bool {
        self.regs[MagReg::Control1.addr() as usize] & 0x03 != 0
    }

    fn read_at(&self, addr: u8) -> u8 {
        match addr {
            0x00 => self.chip_id,
            0x01..=0x06 => match (self.measuring(), self.sample) {
                (true, Some(s)) => {
                    let idx = (addr - 1) as usize;
                    s[idx / 2].to_le_bytes()[idx % 2]
                }
                _ => 0,
            },
            0x09 => (self.measuring() && self.sample.is_some() && self.drdy) as u8,
            a => self.regs.get(a as usize).copied().unwrap_or(0),
        }
    }

    fn write_at(&mut self, addr: u8, value: u8) {
        if addr == MagReg::Control2.addr() && value & 0x80 != 0 {
            self.regs = [0; 0x40];
            return;
        }
        if let Some(slot) = self.regs.get_mut(addr as usize) {
            *slot = value;
        }
    }
}

impl ErrorType for FakeQmc {
    type Error = ErrorKind;
}

impl I2c for FakeQmc {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if self.fail_always || self.fail_next > 0 {
            self.fail_next = self.fail_next.saturating_sub(1);
            self.log.push(Txn::Failed);
            return Err(ErrorKind::Bus);
        }
        if address != self.address {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    let Some((&reg, data)) = bytes.split_first() else {
                        continue;
                    };
                    self.ptr = reg;
                    if !data.is_empty() {
                        self.log.push(Txn::Write {
                            reg,
                            data: data.to_vec(),
                        });
                        for &b in data {
                            self.write_at(self.ptr, b);
                            self.ptr = self.ptr.wrapping_add(1);
                        }
                    }
                }
                Operation::Read(buf) => {
                    self.log.push(Txn::Read {
                        reg: self.ptr,
                        len: buf.len(),
                    });
                    for b in buf.iter_mut() {
                        *b = self.read_at(self.ptr);
                        self.ptr = self.ptr.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct NoopDelay {
    pub elapsed_ns: u64,
}

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += ns as u64;
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub published: Vec<(Channel, f32)>,
    pub availability: Vec<bool>,
}

impl RecordingSink {
    pub fn values(&self, channel: Channel) -> Vec<f32> {
        self.published
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|&(_, v)| v)
            .collect()
    }

    pub fn last_xyz(&self) -> [f32; 3] {
        let last = |c| self.values(c).last().copied().unwrap_or(f32::NAN);
        [
            last(Channel::FieldStrengthX),
            last(Channel::FieldStrengthY),
            last(Channel::FieldStrengthZ),
        ]
    }
}

impl PublishSink for RecordingSink {
    fn publish(&mut self, channel: Channel, value: f32) {
        self.published.push((channel, value));
    }

    fn availability(&mut self, available: bool) {
        self.availability.push(available);
    }
}

pub type TestDriver = Qmc5883p<FakeQmc, ErrorKind, NoopDelay, RecordingSink>;

pub fn driver_with(fake: FakeQmc, config: Config) -> TestDriver {
    Qmc5883p::new(fake, NoopDelay::default(), RecordingSink::default(), config)
}

/// Initialized driver reading `sample`, with the bus log cleared.
pub fn ready_driver(sample: [i16; 3], config: Config) -> TestDriver {
    let mut driver = driver_with(FakeQmc::with_sample(config.address, sample), config);
    driver.initialize().unwrap();
    driver.i2c().log.clear();
    driver
}
