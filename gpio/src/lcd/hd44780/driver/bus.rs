use crate::lcd::hd44780::command::BusWidth;
use crate::lcd::hd44780::driver::Register;
use crate::{GpioDriver, GpioError, GpioMode, GpioResult};
use log::trace;

/// Data lines of the bus, in order from the lowest bit.
///
/// In 4-bit mode the lines are the ones wired to DB4–DB7.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DataPins {
    Bus4Bit([usize; 4]),
    Bus8Bit([usize; 8]),
}

impl DataPins {
    pub fn width(&self) -> BusWidth {
        match self {
            DataPins::Bus4Bit(_) => BusWidth::FourBit,
            DataPins::Bus8Bit(_) => BusWidth::EightBit,
        }
    }

    pub fn pins(&self) -> &[usize] {
        match self {
            DataPins::Bus4Bit(pins) => pins,
            DataPins::Bus8Bit(pins) => pins,
        }
    }
}

/// The parallel bus between the host and the controller: 4 or 8 data lines, register select,
/// enable, and optionally read/write.
///
/// Without a R/W pin, the display's R/W line must be tied to GND (write). With one, it's still
/// only ever driven low, as nothing is read back.
///
/// # Timing
///
/// Every transmission puts the value on the data lines and pulses E: low for 1 µs, high for
/// 1 µs (the controller needs at least 450 ns), low again, and then waits 100 µs, as most
/// instructions take 37 µs to execute. Shorter waits make the controller silently drop or
/// garble the next transmission, so these are not tunable.
#[derive(Debug)]
pub struct ParallelBus<'a> {
    gpio: &'a dyn GpioDriver,
    pin_rs: usize,
    pin_rw: Option<usize>,
    pin_e: usize,
    data: DataPins,
}

impl<'a> ParallelBus<'a> {
    /// Minimum time E is held at each level during a pulse.
    pub const ENABLE_HOLD_US: u32 = 1;
    /// Time given to the controller to execute an instruction after each pulse.
    pub const SETTLE_US: u32 = 100;

    /// Creates the bus. Nothing is written until [Self::configure] is called.
    ///
    /// # Parameters
    ///
    /// - `gpio`: Driver owning the pins.
    /// - `pin_rs`: Register select output pin.
    /// - `pin_rw`: Optional read/write output pin.
    /// - `pin_e`: Enable output pin.
    /// - `data`: Data lines, which also fix the bus width for the lifetime of the bus.
    pub fn new(
        gpio: &'a dyn GpioDriver,
        pin_rs: usize,
        pin_rw: Option<usize>,
        pin_e: usize,
        data: DataPins,
    ) -> Self {
        ParallelBus {
            gpio,
            pin_rs,
            pin_rw,
            pin_e,
            data,
        }
    }

    pub fn width(&self) -> BusWidth {
        self.data.width()
    }

    /// Sets every line of the bus to output mode.
    pub fn configure(&mut self) -> GpioResult<()> {
        self.gpio.set_pin_mode(self.pin_rs, GpioMode::Output)?;
        if let Some(rw) = self.pin_rw {
            self.gpio.set_pin_mode(rw, GpioMode::Output)?;
        }
        self.gpio.set_pin_mode(self.pin_e, GpioMode::Output)?;
        for &pin in self.data.pins() {
            self.gpio.set_pin_mode(pin, GpioMode::Output)?;
        }
        Ok(())
    }

    /// Pulls RS, E and R/W low, the state the controller expects before the first instruction.
    pub fn idle(&mut self) -> GpioResult<()> {
        self.gpio.write_pin(self.pin_rs, false)?;
        self.gpio.write_pin(self.pin_e, false)?;
        self.set_write_direction()
    }

    /// Drives the RS line to select the given register.
    pub fn select(&mut self, register: Register) -> GpioResult<()> {
        self.gpio.write_pin(self.pin_rs, register.level())
    }

    /// Drives the R/W line low (write), if there is one.
    pub fn set_write_direction(&mut self) -> GpioResult<()> {
        match self.pin_rw {
            Some(rw) => self.gpio.write_pin(rw, false),
            None => Ok(()),
        }
    }

    /// Presents the low 4 bits of `value` on a 4-bit bus and pulses E.
    ///
    /// # Errors
    /// - `GpioError::NotSupported` on an 8-bit bus.
    pub fn transmit_nibble(&mut self, value: u8) -> GpioResult<()> {
        let DataPins::Bus4Bit(pins) = self.data else {
            return Err(GpioError::NotSupported);
        };
        trace!("Writing nibble: {:04b}", value & 0x0F);
        self.present(&pins, value)?;
        self.pulse_enable()
    }

    /// Presents `value` on an 8-bit bus and pulses E.
    ///
    /// # Errors
    /// - `GpioError::NotSupported` on a 4-bit bus, which needs two nibbles instead.
    pub fn transmit_byte(&mut self, value: u8) -> GpioResult<()> {
        let DataPins::Bus8Bit(pins) = self.data else {
            return Err(GpioError::NotSupported);
        };
        trace!("Writing byte: {:08b}", value);
        self.present(&pins, value)?;
        self.pulse_enable()
    }

    /// Waits at least `micros` microseconds.
    pub fn delay_us(&self, micros: u32) {
        self.gpio.delay_us(micros);
    }

    /// Puts the low bits of `value` on the given lines, LSb on the first one.
    fn present(&self, pins: &[usize], value: u8) -> GpioResult<()> {
        for (bit, &pin) in pins.iter().enumerate() {
            self.gpio.write_pin(pin, value & (1 << bit) != 0)?;
        }
        Ok(())
    }

    fn pulse_enable(&self) -> GpioResult<()> {
        self.gpio.write_pin(self.pin_e, false)?;
        self.gpio.delay_us(Self::ENABLE_HOLD_US);
        self.gpio.write_pin(self.pin_e, true)?;
        self.gpio.delay_us(Self::ENABLE_HOLD_US);
        self.gpio.write_pin(self.pin_e, false)?;
        self.gpio.delay_us(Self::SETTLE_US);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{GpioEvent, RecordingGpio};

    const RS: usize = 0;
    const RW: usize = 1;
    const E: usize = 2;

    #[test]
    fn configure_sets_every_line_to_output() {
        let gpio = RecordingGpio::new(12);
        let mut bus = ParallelBus::new(&gpio, RS, Some(RW), E, DataPins::Bus8Bit([4, 5, 6, 7, 8, 9, 10, 11]));
        bus.configure().unwrap();
        for pin in [RS, RW, E, 4, 5, 6, 7, 8, 9, 10, 11] {
            assert_eq!(gpio.mode(pin), Some(GpioMode::Output), "pin {}", pin);
        }
        assert_eq!(gpio.mode(3), Some(GpioMode::Input));
    }

    #[test]
    fn nibble_is_lsb_first_then_pulsed() {
        let gpio = RecordingGpio::new(8);
        let mut bus = ParallelBus::new(&gpio, RS, None, E, DataPins::Bus4Bit([4, 5, 6, 7]));
        bus.configure().unwrap();
        let mark = gpio.mark();
        bus.transmit_nibble(0b1010_0011).unwrap();

        use GpioEvent::*;
        assert_eq!(
            gpio.events_since(mark),
            vec![
                Write { index: 4, value: true },
                Write { index: 5, value: true },
                Write { index: 6, value: false },
                Write { index: 7, value: false },
                Write { index: E, value: false },
                Delay(1),
                Write { index: E, value: true },
                Delay(1),
                Write { index: E, value: false },
                Delay(100),
            ]
        );
    }

    #[test]
    fn width_mismatch_is_not_supported() {
        let gpio = RecordingGpio::new(12);
        let mut narrow = ParallelBus::new(&gpio, RS, None, E, DataPins::Bus4Bit([4, 5, 6, 7]));
        narrow.configure().unwrap();
        assert_eq!(narrow.transmit_byte(0x41), Err(GpioError::NotSupported));

        let mut wide = ParallelBus::new(&gpio, RS, None, E, DataPins::Bus8Bit([4, 5, 6, 7, 8, 9, 10, 11]));
        wide.configure().unwrap();
        assert_eq!(wide.transmit_nibble(0x3), Err(GpioError::NotSupported));
    }

    #[test]
    fn write_direction_only_touches_an_existing_rw_line() {
        let gpio = RecordingGpio::new(8);
        let mut bus = ParallelBus::new(&gpio, RS, None, E, DataPins::Bus4Bit([4, 5, 6, 7]));
        bus.configure().unwrap();
        let mark = gpio.mark();
        bus.set_write_direction().unwrap();
        assert!(gpio.events_since(mark).is_empty());

        let mut bus = ParallelBus::new(&gpio, RS, Some(RW), E, DataPins::Bus4Bit([4, 5, 6, 7]));
        bus.configure().unwrap();
        let mark = gpio.mark();
        bus.select(Register::Data).unwrap();
        bus.set_write_direction().unwrap();
        assert_eq!(
            gpio.events_since(mark),
            vec![
                GpioEvent::Write { index: RS, value: true },
                GpioEvent::Write { index: RW, value: false },
            ]
        );
    }
}
