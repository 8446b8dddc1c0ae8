//! GPIO primitives and a character LCD driver built on top of them.
//!
//! The [GpioDriver] trait is everything the LCD driver needs from the platform: switching a pin
//! to output mode, driving it high or low, and waiting. Backends for the Raspberry Pi live in
//! [raw] and [gpiod], while [fake] records every call so the produced signal trace can be
//! inspected without hardware.
pub mod fake;
pub mod gpiod;
pub mod lcd;
pub mod raw;

use std::fmt::Debug;
use std::thread::sleep;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the operation is not supported here")]
    NotSupported,
    #[error("the device has not been initialized")]
    NotInitialized,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

/// Function of a GPIO pin.
///
/// Pins start as inputs on every supported platform, hence the default.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioMode {
    #[default] Input,
    Output,
}

/// A set of GPIO pins addressed by index.
///
/// All methods take `&self`, so a single driver can be shared by several devices, each of them
/// owning its own pin indices. Nothing here is synchronized: callers sharing one device between
/// threads have to serialize access themselves.
pub trait GpioDriver: Debug {
    /// Gets the amount of GPIO pins available.
    fn count(&self) -> GpioResult<usize>;

    /// Sets the function of the pin at the given index.
    ///
    /// Setting the mode a pin already has is not an error.
    fn set_pin_mode(&self, index: usize, mode: GpioMode) -> GpioResult<()>;

    /// Drives the pin at the given index high (`true`) or low (`false`).
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the index is out of range or the pin is not an output.
    fn write_pin(&self, index: usize, value: bool) -> GpioResult<()>;

    /// Blocks the calling thread for at least `micros` microseconds.
    fn delay_us(&self, micros: u32) {
        sleep(Duration::from_micros(micros.into()));
    }
}
