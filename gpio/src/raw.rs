//! GPIO driver for the BCM283x family (Raspberry Pi), poking the GPIO registers directly through
//! a memory mapping.
//!
//! This is the fastest backend available from userspace, which matters for the LCD enable pulse.
use crate::{GpioDriver, GpioError, GpioMode, GpioResult};
use bitvec::vec::BitVec;
use log::trace;
use memmap2::{MmapOptions, MmapRaw};
use std::fmt::{Debug, Formatter};
use std::fs::OpenOptions;
use std::sync::atomic::AtomicU8;

pub struct RawGpioDriver {
    mmap: MmapRaw,
    outputs: BitVec<AtomicU8>,
}

impl RawGpioDriver {
    const GPIO_BASE: u64 = 0x3F200000;

    const PIN_COUNT: usize = 58;

    const FUNCTION_INPUT: u8 = 0b000;
    const FUNCTION_OUTPUT: u8 = 0b001;

    fn create(path: &str, offset: u64) -> GpioResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)?;

        let mmap = MmapOptions::new()
            .offset(offset)
            .len(4096)
            .map_raw(&file)?;

        Ok(RawGpioDriver {
            mmap,
            outputs: BitVec::repeat(false, Self::PIN_COUNT),
        })
    }

    /// Maps the GPIO block through `/dev/gpiomem`, which exposes only the GPIO registers and
    /// doesn't require root.
    pub fn new_gpiomem() -> GpioResult<Self> {
        Self::create("/dev/gpiomem", 0)
    }

    /// Maps the GPIO block through `/dev/mem`. Requires root.
    pub fn new_mem() -> GpioResult<Self> {
        Self::create("/dev/mem", Self::GPIO_BASE)
    }

    fn raw_set_pin_function(&self, pin_index: usize, function: u8) -> GpioResult<()> {
        if function > 0b111 {
            return Err(GpioError::InvalidArgument);
        }

        if pin_index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }

        let mmap = self.mmap.as_mut_ptr() as *mut u32;
        // GPFSELn register
        let register_ptr = unsafe { mmap.add(pin_index / 10) };
        let shift = (pin_index % 10) * 3;

        let mut register_value = unsafe { register_ptr.read_volatile() };
        register_value &= !(0b111 << shift); // Clear the bits for this pin
        register_value |= (function as u32) << shift;
        unsafe { register_ptr.write_volatile(register_value) };

        trace!("Set pin function: pin_index={} function={:03b}", pin_index, function);

        Ok(())
    }

    fn raw_set_pin_output(&self, pin_index: usize, high: bool) -> GpioResult<()> {
        if pin_index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }

        let mmap = self.mmap.as_mut_ptr() as *mut u32;
        // GPSETn/GPCLRn register
        let register_ptr = unsafe { mmap.add(if high { 0x1c / 4 } else { 0x28 / 4 } + pin_index / 32) };
        let shift = pin_index % 32;

        unsafe { register_ptr.write_volatile(1 << shift) };

        Ok(())
    }
}

impl Debug for RawGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawGpioDriver({:?})", self.mmap.as_ptr().addr())
    }
}

impl GpioDriver for RawGpioDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(Self::PIN_COUNT)
    }

    fn set_pin_mode(&self, index: usize, mode: GpioMode) -> GpioResult<()> {
        if index >= self.count()? {
            return Err(GpioError::InvalidArgument);
        }

        let function = match mode {
            GpioMode::Input => Self::FUNCTION_INPUT,
            GpioMode::Output => Self::FUNCTION_OUTPUT,
        };
        self.raw_set_pin_function(index, function)?;
        self.outputs.set_aliased(index, mode == GpioMode::Output);
        Ok(())
    }

    fn write_pin(&self, index: usize, value: bool) -> GpioResult<()> {
        if index >= self.count()? || !self.outputs[index] {
            return Err(GpioError::InvalidArgument);
        }

        self.raw_set_pin_output(index, value)
    }
}
