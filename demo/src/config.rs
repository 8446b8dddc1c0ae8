use std::env::var_os;
use std::ffi::OsStr;
use std::path::Path;
use std::str::FromStr;
use dotenv::var;
use eyre::{bail, eyre, WrapErr};
use serde::{Deserialize, Serialize};

/// How the pins are accessed.
#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Backend {
    /// Memory mapped `/dev/gpiomem`, doesn't need root.
    GpioMem,
    /// Memory mapped `/dev/mem`.
    Mem,
    /// The GPIO character device.
    Gpiod { chip: String },
}

#[derive(Serialize, Deserialize, Debug, Clone, Eq, PartialEq)]
pub struct LcdConfig {
    pub backend: Backend,
    pub pin_rs: usize,
    pub pin_rw: Option<usize>,
    pub pin_e: usize,
    /// 4 or 8 data pins, from the lowest one wired.
    pub pins_data: Vec<usize>,
    pub columns: u8,
    pub rows: u8,
    #[serde(default)]
    pub tall_font: bool,
}

impl LcdConfig {
    /// Loads the JSON file named by `CONFIG_FILE`, `lcd.json` by default.
    pub fn try_load() -> eyre::Result<Option<Self>> {
        let config_str = var_os("CONFIG_FILE");
        let config_str: &OsStr = config_str.as_deref().unwrap_or(OsStr::new("lcd.json"));
        Self::try_load_from(Path::new(config_str))
    }

    /// Loads the given JSON file. Only a missing file gives `None`, a broken one is an error.
    pub fn try_load_from(config_path: &Path) -> eyre::Result<Option<Self>> {
        if !config_path.exists() {
            return Ok(None);
        }
        let file = std::fs::File::open(config_path)
            .wrap_err_with(|| format!("Opening {}", config_path.display()))?;
        let reader = std::io::BufReader::new(file);
        let config = serde_json::from_reader(reader)
            .wrap_err_with(|| format!("Parsing {}", config_path.display()))?;
        Ok(Some(config))
    }

    /// Reads the `LCD_*` environment variables, falling back to the default wiring.
    pub fn from_env() -> eyre::Result<Self> {
        let defaults = LcdConfig::default();

        let backend = match var("LCD_BACKEND").ok().as_deref() {
            None => defaults.backend,
            Some("gpiomem") => Backend::GpioMem,
            Some("mem") => Backend::Mem,
            Some("gpiod") => Backend::Gpiod {
                chip: var("LCD_GPIO_CHIP").unwrap_or_else(|_| "/dev/gpiochip0".to_string()),
            },
            Some(other) => bail!("Unknown LCD_BACKEND: {}", other),
        };

        let pin_rw = match var("LCD_PIN_RW").ok().as_deref() {
            None => defaults.pin_rw,
            Some("" | "none") => None,
            Some(pin) => Some(pin.trim().parse().wrap_err("Invalid LCD_PIN_RW")?),
        };

        let pins_data = match var("LCD_PINS_DATA") {
            Ok(list) => parse_pin_list(&list)?,
            Err(_) => defaults.pins_data,
        };

        Ok(LcdConfig {
            backend,
            pin_rs: env_or("LCD_PIN_RS", defaults.pin_rs)?,
            pin_rw,
            pin_e: env_or("LCD_PIN_E", defaults.pin_e)?,
            pins_data,
            columns: env_or("LCD_COLUMNS", defaults.columns)?,
            rows: env_or("LCD_ROWS", defaults.rows)?,
            tall_font: env_or("LCD_TALL_FONT", defaults.tall_font)?,
        })
    }

    /// The config file if there is a valid one, the environment otherwise.
    pub fn load() -> eyre::Result<Self> {
        match Self::try_load()? {
            Some(config) => Ok(config),
            None => Self::from_env(),
        }
    }
}

impl Default for LcdConfig {
    fn default() -> Self {
        LcdConfig {
            backend: Backend::GpioMem,
            pin_rs: 22,
            pin_rw: Some(27),
            pin_e: 17,
            pins_data: vec![26, 16, 20, 21],
            columns: 16,
            rows: 2,
            tall_font: false,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> eyre::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Ok(value) => value.trim().parse().wrap_err_with(|| format!("Invalid {}", key)),
        Err(_) => Ok(default),
    }
}

/// Parses a comma separated list of pin numbers, like `26,16,20,21`.
pub fn parse_pin_list(list: &str) -> eyre::Result<Vec<usize>> {
    let pins = list
        .split(',')
        .map(str::trim)
        .filter(|pin| !pin.is_empty())
        .map(|pin| pin.parse().map_err(|_| eyre!("Invalid pin number: {:?}", pin)))
        .collect::<eyre::Result<Vec<usize>>>()?;
    if pins.len() != 4 && pins.len() != 8 {
        bail!("Expected 4 or 8 data pins, got {}", pins.len());
    }
    Ok(pins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_lists() {
        assert_eq!(parse_pin_list("26, 16,20,21").unwrap(), vec![26, 16, 20, 21]);
        assert_eq!(parse_pin_list("0,1,2,3,4,5,6,7,").unwrap().len(), 8);
        assert!(parse_pin_list("1,2,3").is_err());
        assert!(parse_pin_list("1,2,x,4").is_err());
    }

    #[test]
    fn json_layout() {
        let config: LcdConfig = serde_json::from_str(
            r#"{
                "backend": { "kind": "gpiod", "chip": "/dev/gpiochip4" },
                "pin_rs": 22,
                "pin_rw": null,
                "pin_e": 17,
                "pins_data": [26, 16, 20, 21],
                "columns": 20,
                "rows": 4
            }"#,
        )
        .unwrap();
        assert_eq!(config.backend, Backend::Gpiod { chip: "/dev/gpiochip4".to_string() });
        assert_eq!(config.pin_rw, None);
        assert_eq!(config.rows, 4);
        assert!(!config.tall_font);

        let config: LcdConfig = serde_json::from_str(&serde_json::to_string(&LcdConfig::default()).unwrap()).unwrap();
        assert_eq!(config.backend, Backend::GpioMem);
    }

    #[test]
    fn broken_config_file_is_an_error() {
        let dir = std::env::temp_dir();
        let missing = dir.join(format!("charlcd-missing-{}.json", std::process::id()));
        assert!(LcdConfig::try_load_from(&missing).unwrap().is_none());

        let broken = dir.join(format!("charlcd-broken-{}.json", std::process::id()));
        std::fs::write(&broken, r#"{"backend":"#).unwrap();
        let result = LcdConfig::try_load_from(&broken);
        std::fs::remove_file(&broken).unwrap();
        assert!(result.is_err());

        let valid = dir.join(format!("charlcd-valid-{}.json", std::process::id()));
        std::fs::write(&valid, serde_json::to_string(&LcdConfig::default()).unwrap()).unwrap();
        let result = LcdConfig::try_load_from(&valid);
        std::fs::remove_file(&valid).unwrap();
        assert_eq!(result.unwrap(), Some(LcdConfig::default()));
    }
}
