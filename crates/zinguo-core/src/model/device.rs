// ── Device domain types ──

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// Label used for model codes missing from the lookup table.
pub const GENERIC_MODEL_NAME: &str = "智能浴霸";

/// Reported when the device omits its software version.
pub const UNKNOWN_FIRMWARE: &str = "Unknown";

/// The five on/off channels of a bath heater.
///
/// The string form is the vendor field name.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, AsRefStr, IntoStaticStr, EnumString,
)]
#[strum(serialize_all = "camelCase")]
pub enum Switch {
    LightSwitch,
    WarmingSwitch1,
    WarmingSwitch2,
    WindSwitch,
    VentilationSwitch,
}

impl Switch {
    pub const ALL: [Switch; 5] = [
        Switch::LightSwitch,
        Switch::WarmingSwitch1,
        Switch::WarmingSwitch2,
        Switch::WindSwitch,
        Switch::VentilationSwitch,
    ];
}

/// Timed light switch-off. Firmware reports either a clock time or a
/// plain number of minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LightAutoClose {
    Schedule(AutoCloseSchedule),
    Minutes(i64),
}

impl LightAutoClose {
    /// `(hour, minute)` of the switch-off. Minutes are read as time of day.
    pub fn clock(&self) -> (i64, i64) {
        match self {
            Self::Schedule(s) => (i64::from(s.stop_hour), i64::from(s.stop_minute)),
            Self::Minutes(m) => (m.div_euclid(60), m.rem_euclid(60)),
        }
    }

    /// Whether the timer is armed. Plain minute values carry no flag.
    pub fn enabled(&self) -> bool {
        match self {
            Self::Schedule(s) => s.status,
            Self::Minutes(_) => true,
        }
    }
}

impl std::fmt::Display for LightAutoClose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (hour, minute) = self.clock();
        write!(f, "{hour:02}:{minute:02}")
    }
}

/// `lightAutoClose` in schedule form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoCloseSchedule {
    pub stop_hour: u8,
    pub stop_minute: u8,
    #[serde(default = "enabled_by_default")]
    pub status: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// Over-heat screen protection (`blackSetting`): the heater runs for
/// `open_time` minutes, then pauses for `pause_time` minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenProtection {
    pub status: bool,
    pub open_time: i64,
    pub pause_time: i64,
}

/// Combined heater/fan mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FanPreset {
    Off,
    Heat1,
    Heat2,
    Cool,
}

/// Normalized view of one bath heater, rebuilt on every poll.
///
/// Every switch is a plain boolean; vendor codes never leak past
/// [`convert`](crate::convert). Field names serialize to the vendor's
/// camelCase spelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct DeviceState {
    pub id: Option<String>,
    pub mac: Option<String>,
    pub name: Option<String>,
    pub online: bool,
    /// Degrees Celsius; absent when the device reports nothing parseable.
    pub temperature: Option<f64>,

    pub light_switch: bool,
    pub warming_switch1: bool,
    pub warming_switch2: bool,
    pub wind_switch: bool,
    pub ventilation_switch: bool,

    /// Minutes.
    pub ventilation_auto_close: Option<i64>,
    /// Minutes.
    pub warming_auto_close: Option<i64>,
    /// Over-heat cut-off, degrees Celsius.
    pub over_heat_auto_close: Option<i64>,
    pub light_auto_close: Option<LightAutoClose>,
    /// Offset added to the displayed temperature.
    pub temperature_calibration: Option<i64>,
    pub black_setting: Option<ScreenProtection>,
    pub comovement: Option<i64>,
    pub moto_version: Option<i64>,

    pub hardware_version: Option<String>,
    pub software_version: Option<String>,
    pub device_model: String,
    pub firmware_version: String,
}

impl DeviceState {
    pub fn switch(&self, switch: Switch) -> bool {
        match switch {
            Switch::LightSwitch => self.light_switch,
            Switch::WarmingSwitch1 => self.warming_switch1,
            Switch::WarmingSwitch2 => self.warming_switch2,
            Switch::WindSwitch => self.wind_switch,
            Switch::VentilationSwitch => self.ventilation_switch,
        }
    }

    pub fn set_switch(&mut self, switch: Switch, on: bool) {
        let slot = match switch {
            Switch::LightSwitch => &mut self.light_switch,
            Switch::WarmingSwitch1 => &mut self.warming_switch1,
            Switch::WarmingSwitch2 => &mut self.warming_switch2,
            Switch::WindSwitch => &mut self.wind_switch,
            Switch::VentilationSwitch => &mut self.ventilation_switch,
        };
        *slot = on;
    }

    /// Current fan preset. A running heater wins over plain airflow, and
    /// heater 1 wins over heater 2.
    pub fn fan_preset(&self) -> FanPreset {
        if self.warming_switch1 {
            FanPreset::Heat1
        } else if self.warming_switch2 {
            FanPreset::Heat2
        } else if self.wind_switch {
            FanPreset::Cool
        } else {
            FanPreset::Off
        }
    }
}
