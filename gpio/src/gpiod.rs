//! GpiodDriver implementation for managing GPIO pins using the gpiod library.
//!
//! Slower than the [raw](crate::raw) backend, but works on any board with a GPIO character
//! device and doesn't need access to `/dev/mem`.
use crate::{GpioDriver, GpioError, GpioMode, GpioResult};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};

/// GpiodDriver is a GPIO driver that uses the gpiod library to manage GPIO pins.
///
/// Every pin keeps its line requested for as long as it stays in the same mode.
pub struct GpiodDriver {
    chip: gpiod::Chip,
    outputs: RefCell<HashMap<usize, gpiod::Lines<gpiod::Output>>>,
    inputs: RefCell<HashMap<usize, gpiod::Lines<gpiod::Input>>>,
}

impl GpiodDriver {
    pub fn new(chip: gpiod::Chip) -> Self {
        Self {
            chip,
            outputs: RefCell::default(),
            inputs: RefCell::default(),
        }
    }

    /// Opens the GPIO chip at the given path, like `/dev/gpiochip0`.
    pub fn open(path: &str) -> GpioResult<Self> {
        Ok(Self::new(gpiod::Chip::new(path)?))
    }
}

impl Debug for GpiodDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodDriver({})", self.chip.name())
    }
}

impl GpioDriver for GpiodDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.chip.num_lines() as usize)
    }

    fn set_pin_mode(&self, index: usize, mode: GpioMode) -> GpioResult<()> {
        if index >= self.count()? {
            return Err(GpioError::InvalidArgument);
        }

        match mode {
            GpioMode::Output => {
                if self.outputs.borrow().contains_key(&index) {
                    return Ok(());
                }
                // The line has to be released before it can be requested again
                self.inputs.borrow_mut().remove(&index);
                let line = self.chip.request_lines(
                    gpiod::Options::output([index as u32])
                        .consumer(env!("CARGO_PKG_NAME")),
                )?;
                self.outputs.borrow_mut().insert(index, line);
            }
            GpioMode::Input => {
                if self.inputs.borrow().contains_key(&index) {
                    return Ok(());
                }
                self.outputs.borrow_mut().remove(&index);
                let line = self.chip.request_lines(
                    gpiod::Options::input([index as u32])
                        .consumer(env!("CARGO_PKG_NAME")),
                )?;
                self.inputs.borrow_mut().insert(index, line);
            }
        }

        Ok(())
    }

    fn write_pin(&self, index: usize, value: bool) -> GpioResult<()> {
        let outputs = self.outputs.borrow();
        let line = outputs.get(&index).ok_or(GpioError::InvalidArgument)?;
        line.set_values([value])?;
        Ok(())
    }
}
