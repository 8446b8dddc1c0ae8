//! A GPIO driver that drives nothing and remembers everything.
//!
//! [RecordingGpio] keeps a log of every mode change, level change and delay it was asked for.
//! Since the LCD controller has no way of answering, the log is the only way to check what a
//! driver actually did, so [RecordingGpio::strobes_since] decodes it the way the controller
//! would see it: one [Strobe] per falling edge of the enable line.
use crate::{GpioDriver, GpioError, GpioMode, GpioResult};
use std::cell::RefCell;
use std::collections::HashMap;

/// A single call made to the [RecordingGpio].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GpioEvent {
    Mode { index: usize, mode: GpioMode },
    Write { index: usize, value: bool },
    Delay(u32),
}

/// One falling edge of the enable line, which is when the controller latches the data lines.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Strobe {
    /// Level of the register select line at the falling edge.
    pub register_select: bool,
    /// Levels of the data lines at the falling edge, LSb on the first line.
    pub value: u8,
    /// Time the enable line was held high before falling.
    pub pulse_us: u32,
    /// Time spent waiting after the falling edge, before any line changed again.
    pub settle_us: u32,
    /// Position of the falling edge in the event log.
    pub position: usize,
}

#[derive(Debug)]
pub struct RecordingGpio {
    modes: RefCell<Vec<GpioMode>>,
    events: RefCell<Vec<GpioEvent>>,
}

impl RecordingGpio {
    /// Creates a fake with `count` pins, all of them starting as inputs.
    pub fn new(count: usize) -> Self {
        Self {
            modes: RefCell::new(vec![GpioMode::Input; count]),
            events: RefCell::default(),
        }
    }

    /// Gets a copy of the whole event log.
    pub fn events(&self) -> Vec<GpioEvent> {
        self.events.borrow().clone()
    }

    /// Gets the current length of the event log, to be passed to [Self::strobes_since] or
    /// [Self::events_since] later.
    pub fn mark(&self) -> usize {
        self.events.borrow().len()
    }

    /// Gets the events logged at or after the given mark.
    pub fn events_since(&self, mark: usize) -> Vec<GpioEvent> {
        self.events.borrow().iter().skip(mark).copied().collect()
    }

    /// Gets the mode the pin is currently in.
    pub fn mode(&self, index: usize) -> Option<GpioMode> {
        self.modes.borrow().get(index).copied()
    }

    /// Decodes the event log into enable strobes, returning the ones at or after the given mark.
    ///
    /// The whole log is replayed, so line levels set before the mark are taken into account.
    pub fn strobes_since(
        &self,
        mark: usize,
        enable: usize,
        register_select: usize,
        data: &[usize],
    ) -> Vec<Strobe> {
        let mut levels: HashMap<usize, bool> = HashMap::new();
        let mut strobes: Vec<Strobe> = Vec::new();
        let mut high_for: Option<u32> = None;
        let mut settling = false;

        for (position, event) in self.events.borrow().iter().enumerate() {
            match *event {
                GpioEvent::Write { index, value } => {
                    settling = false;
                    let previous = levels.insert(index, value);
                    if index != enable {
                        continue;
                    }
                    match (previous, value) {
                        (Some(true), false) => {
                            let value = data
                                .iter()
                                .enumerate()
                                .filter(|&(_, pin)| levels.get(pin).copied().unwrap_or(false))
                                .fold(0u8, |acc, (bit, _)| acc | (1 << bit));
                            strobes.push(Strobe {
                                register_select: levels
                                    .get(&register_select)
                                    .copied()
                                    .unwrap_or(false),
                                value,
                                pulse_us: high_for.take().unwrap_or(0),
                                settle_us: 0,
                                position,
                            });
                            settling = true;
                        }
                        (Some(true), true) => {}
                        (_, true) => high_for = Some(0),
                        _ => {}
                    }
                }
                GpioEvent::Delay(micros) => {
                    if let Some(high_for) = high_for.as_mut() {
                        *high_for += micros;
                    }
                    if settling {
                        if let Some(last) = strobes.last_mut() {
                            last.settle_us += micros;
                        }
                    }
                }
                GpioEvent::Mode { .. } => {}
            }
        }

        strobes.retain(|strobe| strobe.position >= mark);
        strobes
    }

    fn record(&self, event: GpioEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl GpioDriver for RecordingGpio {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.modes.borrow().len())
    }

    fn set_pin_mode(&self, index: usize, mode: GpioMode) -> GpioResult<()> {
        let mut modes = self.modes.borrow_mut();
        let slot = modes.get_mut(index).ok_or(GpioError::InvalidArgument)?;
        *slot = mode;
        self.record(GpioEvent::Mode { index, mode });
        Ok(())
    }

    fn write_pin(&self, index: usize, value: bool) -> GpioResult<()> {
        if self.mode(index) != Some(GpioMode::Output) {
            return Err(GpioError::InvalidArgument);
        }
        self.record(GpioEvent::Write { index, value });
        Ok(())
    }

    fn delay_us(&self, micros: u32) {
        self.record(GpioEvent::Delay(micros));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_to_inputs_are_rejected() {
        let gpio = RecordingGpio::new(4);
        assert_eq!(gpio.write_pin(1, true), Err(GpioError::InvalidArgument));
        assert_eq!(gpio.set_pin_mode(4, GpioMode::Output), Err(GpioError::InvalidArgument));
        assert!(gpio.events().is_empty());
    }

    #[test]
    fn strobes_latch_on_the_falling_edge() {
        let gpio = RecordingGpio::new(4);
        for pin in 0..4 {
            gpio.set_pin_mode(pin, GpioMode::Output).unwrap();
        }
        // E = 0, RS = 1, data = 2, 3
        gpio.write_pin(1, true).unwrap();
        gpio.write_pin(2, true).unwrap();
        gpio.write_pin(3, false).unwrap();
        gpio.write_pin(0, false).unwrap();
        gpio.write_pin(0, true).unwrap();
        gpio.delay_us(2);
        // Changing data while E is high doesn't count until E falls
        gpio.write_pin(3, true).unwrap();
        gpio.write_pin(0, false).unwrap();
        gpio.delay_us(100);
        gpio.delay_us(50);
        gpio.write_pin(1, false).unwrap();
        gpio.delay_us(10);

        let strobes = gpio.strobes_since(0, 0, 1, &[2, 3]);
        assert_eq!(strobes.len(), 1);
        assert_eq!(strobes[0].value, 0b11);
        assert!(strobes[0].register_select);
        assert_eq!(strobes[0].pulse_us, 2);
        assert_eq!(strobes[0].settle_us, 150);

        assert!(gpio.strobes_since(gpio.mark(), 0, 1, &[2, 3]).is_empty());
    }
}
