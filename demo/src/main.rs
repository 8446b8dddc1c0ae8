mod config;

use crate::config::{Backend, LcdConfig};
use charlcd_gpio::gpiod::GpiodDriver;
use charlcd_gpio::lcd::hd44780::command::Font;
use charlcd_gpio::lcd::hd44780::driver::GpioHD44780Driver;
use charlcd_gpio::lcd::text::TextExt;
use charlcd_gpio::raw::RawGpioDriver;
use charlcd_gpio::GpioDriver;
use dotenv::dotenv;
use eyre::{bail, WrapErr};
use log::{debug, info, warn};
use std::thread::sleep;
use std::time::Duration;
use sysinfo::System;
use time::OffsetDateTime;

const HEART: [u8; 8] = [
    0b00000,
    0b01010,
    0b11111,
    0b11111,
    0b01110,
    0b00100,
    0b00000,
    0b00000,
];

fn main() -> eyre::Result<()> {
    dotenv().ok();
    pretty_env_logger::init();

    const UNKNOWN_STR: &str = "???";

    info!(
        "Hello, {}!",
        System::name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!(
        "System ver {} kernel ver {}",
        System::long_os_version().as_deref().unwrap_or(UNKNOWN_STR),
        System::kernel_version().as_deref().unwrap_or(UNKNOWN_STR),
    );
    info!(
        "Hostname {}",
        System::host_name().as_deref().unwrap_or(UNKNOWN_STR)
    );
    info!("Architecture {}", System::cpu_arch());

    debug!("Loading config...");
    let config = LcdConfig::load()?;
    debug!("{:?}", config);

    let gpio: Box<dyn GpioDriver> = match &config.backend {
        Backend::GpioMem => Box::new(RawGpioDriver::new_gpiomem().wrap_err("Opening /dev/gpiomem")?),
        Backend::Mem => Box::new(RawGpioDriver::new_mem().wrap_err("Opening /dev/mem")?),
        Backend::Gpiod { chip } => {
            Box::new(GpiodDriver::open(chip).wrap_err_with(|| format!("Opening {}", chip))?)
        }
    };
    info!("GPIO driver ready, {} pins.", gpio.count()?);

    let mut lcd = match config.pins_data.len() {
        4 => GpioHD44780Driver::new_4bit(
            &*gpio,
            config.pin_rs,
            config.pin_rw,
            config.pin_e,
            config.pins_data[..].try_into()?,
        ),
        8 => GpioHD44780Driver::new_8bit(
            &*gpio,
            config.pin_rs,
            config.pin_rw,
            config.pin_e,
            config.pins_data[..].try_into()?,
        ),
        n => bail!("Expected 4 or 8 data pins, got {}", n),
    };

    let font = if config.tall_font { Font::Dots5x10 } else { Font::Dots5x8 };
    lcd.begin(config.columns, config.rows, font)?;
    debug!("{:?} initialized.", lcd);

    lcd.create_char(0, &HEART)?;
    lcd.set_cursor(0, 0)?;
    lcd.print("Hello \u{0}")?;

    info!("Starting clock...");
    loop {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| {
            warn!("Local offset unknown, using UTC.");
            OffsetDateTime::now_utc()
        });
        lcd.set_cursor(0, 1)?;
        lcd.print_fmt(format_args!(
            "{:02}:{:02}:{:02}",
            now.hour(),
            now.minute(),
            now.second()
        ))?;
        sleep(Duration::from_secs(1));
    }
}
