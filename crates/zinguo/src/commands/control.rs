//! Write-side handlers. Each refreshes first so the merged payload carries
//! the device's real switch state, sends one change-set, then prints the
//! reconciled state.

use zinguo_core::{ChangeSet, ControlKey, Coordinator, FanPreset, LightAutoClose, Switch};

use crate::cli::{Command, FanMode, GlobalOpts, OnOff, ParameterName, SwitchName};
use crate::error::CliError;

use super::{device, require_mac};

impl From<SwitchName> for Switch {
    fn from(name: SwitchName) -> Self {
        match name {
            SwitchName::Light => Switch::LightSwitch,
            SwitchName::Heater1 => Switch::WarmingSwitch1,
            SwitchName::Heater2 => Switch::WarmingSwitch2,
            SwitchName::Wind => Switch::WindSwitch,
            SwitchName::Ventilation => Switch::VentilationSwitch,
        }
    }
}

impl From<FanMode> for FanPreset {
    fn from(mode: FanMode) -> Self {
        match mode {
            FanMode::Off => FanPreset::Off,
            FanMode::Heat1 => FanPreset::Heat1,
            FanMode::Heat2 => FanPreset::Heat2,
            FanMode::Cool => FanPreset::Cool,
        }
    }
}

impl From<ParameterName> for ControlKey {
    fn from(name: ParameterName) -> Self {
        match name {
            ParameterName::VentilationAutoClose => ControlKey::VentilationAutoClose,
            ParameterName::WarmingAutoClose => ControlKey::WarmingAutoClose,
            ParameterName::OverHeatAutoClose => ControlKey::OverHeatAutoClose,
            ParameterName::TemperatureCalibration => ControlKey::TemperatureCalibration,
        }
    }
}

/// Parse `HH:MM`. Range checks happen in the change-set.
pub fn parse_clock(raw: &str) -> Result<(u8, u8), CliError> {
    let invalid = || CliError::Validation {
        field: "time".into(),
        reason: format!("expected HH:MM, got '{raw}'"),
    };

    let (hour, minute) = raw.trim().split_once(':').ok_or_else(invalid)?;
    let hour = hour.parse::<u8>().map_err(|_| invalid())?;
    let minute = minute.parse::<u8>().map_err(|_| invalid())?;
    Ok((hour, minute))
}

/// The change-set a write command asks for. `current` supplies the light
/// timer's enabled flag.
pub fn change_set_for(
    cmd: &Command,
    current: Option<&LightAutoClose>,
) -> Result<Option<ChangeSet>, CliError> {
    let change_set = match cmd {
        Command::Switch(args) => {
            ChangeSet::switch(args.switch.into(), matches!(args.state, OnOff::On))
        }
        Command::Fan(args) => ChangeSet::fan_preset(args.preset.into()),
        Command::Set(args) => ChangeSet::new().with(args.parameter.into(), args.value),
        Command::LightAutoClose(args) => {
            let (hour, minute) = parse_clock(&args.time)?;
            ChangeSet::light_auto_close(hour, minute, current)
        }
        Command::TurnOffAll => ChangeSet::turn_off_all(),
        _ => return Ok(None),
    };
    Ok(Some(change_set))
}

pub async fn handle(
    cmd: Command,
    coordinator: &Coordinator,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    require_mac(coordinator)?;

    // Reject bad input before touching the network.
    let Some(draft) = change_set_for(&cmd, None)? else {
        return Ok(());
    };
    draft.validate()?;

    let current = coordinator.refresh().await?;
    let change_set =
        change_set_for(&cmd, current.light_auto_close.as_ref())?.unwrap_or(draft);

    tracing::debug!(kind = %change_set.kind(), "sending change set");
    coordinator.try_send_control_command(&change_set).await?;

    if let Some(state) = coordinator.state() {
        device::print_state(&state, global)?;
    }
    Ok(())
}
