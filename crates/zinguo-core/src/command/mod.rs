// ── Control commands ──
//
// A `ChangeSet` is the partial write a caller asks for: only the fields it
// wants to change. It is validated before any network traffic, then merged
// into a full vendor payload by [`payload::build`].

pub mod payload;

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use strum::{AsRefStr, Display, EnumString};

use crate::error::CoreError;
use crate::model::{AutoCloseSchedule, DeviceState, FanPreset, LightAutoClose, Switch};

/// Minutes accepted by the ventilation and warming auto-close timers.
pub const AUTO_CLOSE_MINUTES: RangeInclusive<i64> = 0..=60;

/// Over-heat cut-off thresholds in degrees Celsius.
pub const OVER_HEAT_CELSIUS: RangeInclusive<i64> = 35..=60;

/// Displayed-temperature offsets.
pub const TEMPERATURE_CALIBRATION: RangeInclusive<i64> = 0..=10;

/// Writable vendor fields. The string form is the vendor field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "camelCase")]
pub enum ControlKey {
    // ── Switches ──
    LightSwitch,
    WarmingSwitch1,
    WarmingSwitch2,
    WindSwitch,
    VentilationSwitch,
    TurnOffAll,

    // ── Parameters ──
    VentilationAutoClose,
    WarmingAutoClose,
    OverHeatAutoClose,
    LightAutoClose,
    TemperatureCalibration,
    Comovement,
    MotoVersion,
}

impl ControlKey {
    /// Keys that turn a write into a parameter command.
    pub const PARAMETERS: [ControlKey; 7] = [
        ControlKey::VentilationAutoClose,
        ControlKey::WarmingAutoClose,
        ControlKey::OverHeatAutoClose,
        ControlKey::LightAutoClose,
        ControlKey::TemperatureCalibration,
        ControlKey::Comovement,
        ControlKey::MotoVersion,
    ];

    pub fn is_parameter(self) -> bool {
        Self::PARAMETERS.contains(&self)
    }

    pub fn as_switch(self) -> Option<Switch> {
        match self {
            Self::LightSwitch => Some(Switch::LightSwitch),
            Self::WarmingSwitch1 => Some(Switch::WarmingSwitch1),
            Self::WarmingSwitch2 => Some(Switch::WarmingSwitch2),
            Self::WindSwitch => Some(Switch::WindSwitch),
            Self::VentilationSwitch => Some(Switch::VentilationSwitch),
            _ => None,
        }
    }

    /// Accepted range for numeric parameters that have one.
    pub fn range(self) -> Option<RangeInclusive<i64>> {
        match self {
            Self::VentilationAutoClose | Self::WarmingAutoClose => Some(AUTO_CLOSE_MINUTES),
            Self::OverHeatAutoClose => Some(OVER_HEAT_CELSIUS),
            Self::TemperatureCalibration => Some(TEMPERATURE_CALIBRATION),
            _ => None,
        }
    }
}

impl From<Switch> for ControlKey {
    fn from(switch: Switch) -> Self {
        match switch {
            Switch::LightSwitch => Self::LightSwitch,
            Switch::WarmingSwitch1 => Self::WarmingSwitch1,
            Switch::WarmingSwitch2 => Self::WarmingSwitch2,
            Switch::WindSwitch => Self::WindSwitch,
            Switch::VentilationSwitch => Self::VentilationSwitch,
        }
    }
}

/// A requested value, before vendor encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlValue {
    Flag(bool),
    Number(i64),
    Schedule(AutoCloseSchedule),
}

impl From<bool> for ControlValue {
    fn from(v: bool) -> Self {
        Self::Flag(v)
    }
}

impl From<i64> for ControlValue {
    fn from(v: i64) -> Self {
        Self::Number(v)
    }
}

impl From<AutoCloseSchedule> for ControlValue {
    fn from(v: AutoCloseSchedule) -> Self {
        Self::Schedule(v)
    }
}

/// How a write is merged into the outgoing payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum CommandKind {
    /// Full switch state, merged from cache.
    Switch,
    /// Configuration fields plus their companion fields only.
    Parameter,
}

/// A partial write: the fields a caller wants changed, nothing else.
///
/// Keys are kept sorted so the same request always yields the same payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    entries: BTreeMap<ControlKey, ControlValue>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: ControlKey, value: impl Into<ControlValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: ControlKey, value: impl Into<ControlValue>) {
        self.entries.insert(key, value.into());
    }

    pub fn get(&self, key: ControlKey) -> Option<&ControlValue> {
        self.entries.get(&key)
    }

    pub fn contains(&self, key: ControlKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ControlKey, &ControlValue)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ── Common writes ────────────────────────────────────────────────

    /// Turn one switch on or off.
    pub fn switch(switch: Switch, on: bool) -> Self {
        Self::new().with(switch.into(), on)
    }

    /// Heater/fan combination for a preset. The heater/wind coupling is
    /// applied later, when the payload is built.
    pub fn fan_preset(preset: FanPreset) -> Self {
        let (heat1, heat2, wind) = match preset {
            FanPreset::Off => (false, false, false),
            FanPreset::Heat1 => (true, false, false),
            FanPreset::Heat2 => (false, true, false),
            FanPreset::Cool => (false, false, true),
        };
        Self::new()
            .with(ControlKey::WarmingSwitch1, heat1)
            .with(ControlKey::WarmingSwitch2, heat2)
            .with(ControlKey::WindSwitch, wind)
    }

    /// Switch every channel off at once.
    pub fn turn_off_all() -> Self {
        Self::new().with(ControlKey::TurnOffAll, 1_i64)
    }

    /// Light switch-off time. The enabled flag of the current setting is
    /// kept; without one the timer is armed.
    pub fn light_auto_close(hour: u8, minute: u8, current: Option<&LightAutoClose>) -> Self {
        let status = match current {
            Some(LightAutoClose::Schedule(s)) => s.status,
            _ => true,
        };
        Self::new().with(
            ControlKey::LightAutoClose,
            AutoCloseSchedule {
                stop_hour: hour,
                stop_minute: minute,
                status,
            },
        )
    }

    // ── Classification ───────────────────────────────────────────────

    /// A write is a parameter command as soon as it touches any
    /// configuration key.
    pub fn kind(&self) -> CommandKind {
        if self.entries.keys().any(|k| k.is_parameter()) {
            CommandKind::Parameter
        } else {
            CommandKind::Switch
        }
    }

    /// Reject empty writes, mistyped values and out-of-range parameters.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.is_empty() {
            return Err(invalid("empty change set"));
        }

        for (key, value) in self.iter() {
            match (key, value) {
                (k, ControlValue::Flag(_)) if k.as_switch().is_some() => {}
                (ControlKey::TurnOffAll, ControlValue::Flag(_) | ControlValue::Number(0 | 1)) => {}
                (ControlKey::LightAutoClose, ControlValue::Schedule(s)) => {
                    if s.stop_hour > 23 || s.stop_minute > 59 {
                        return Err(invalid(format!(
                            "{key}: {:02}:{:02} is not a time of day",
                            s.stop_hour, s.stop_minute
                        )));
                    }
                }
                (ControlKey::Comovement | ControlKey::MotoVersion, ControlValue::Number(_)) => {}
                (k, ControlValue::Number(n)) if k.range().is_some() => {
                    if let Some(range) = k.range().filter(|r| !r.contains(n)) {
                        return Err(invalid(format!(
                            "{key}: {n} is outside {}..={}",
                            range.start(),
                            range.end()
                        )));
                    }
                }
                (k, v) => return Err(invalid(format!("{k} does not accept {v:?}"))),
            }
        }

        Ok(())
    }

    // ── Optimistic patch ─────────────────────────────────────────────

    /// Write the requested values into a cached state, as if the device had
    /// already applied them. Only the named fields change: no coupling, and
    /// `turnOffAll` (not a state field) is skipped. Returns `true` if any
    /// field was patched.
    pub fn apply_to(&self, state: &mut DeviceState) -> bool {
        let mut patched = false;
        for (key, value) in self.iter() {
            patched |= match (key, *value) {
                (k, ControlValue::Flag(on)) => match k.as_switch() {
                    Some(switch) => {
                        state.set_switch(switch, on);
                        true
                    }
                    None => false,
                },
                (ControlKey::VentilationAutoClose, ControlValue::Number(n)) => {
                    state.ventilation_auto_close = Some(n);
                    true
                }
                (ControlKey::WarmingAutoClose, ControlValue::Number(n)) => {
                    state.warming_auto_close = Some(n);
                    true
                }
                (ControlKey::OverHeatAutoClose, ControlValue::Number(n)) => {
                    state.over_heat_auto_close = Some(n);
                    true
                }
                (ControlKey::TemperatureCalibration, ControlValue::Number(n)) => {
                    state.temperature_calibration = Some(n);
                    true
                }
                (ControlKey::Comovement, ControlValue::Number(n)) => {
                    state.comovement = Some(n);
                    true
                }
                (ControlKey::MotoVersion, ControlValue::Number(n)) => {
                    state.moto_version = Some(n);
                    true
                }
                (ControlKey::LightAutoClose, ControlValue::Schedule(s)) => {
                    state.light_auto_close = Some(LightAutoClose::Schedule(s));
                    true
                }
                _ => false,
            };
        }
        patched
    }
}

impl FromIterator<(ControlKey, ControlValue)> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = (ControlKey, ControlValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

fn invalid(message: impl Into<String>) -> CoreError {
    CoreError::ValidationFailed {
        message: message.into(),
    }
}
