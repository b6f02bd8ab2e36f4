//! Read-side handlers: device listing, status, watch.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;
use tokio::sync::broadcast::error::RecvError;

use zinguo_core::{Coordinator, DeviceState, DeviceSummary, StateUpdate, UpdateKind};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::require_mac;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Online")]
    online: String,
}

impl From<&DeviceSummary> for DeviceRow {
    fn from(d: &DeviceSummary) -> Self {
        Self {
            mac: d.mac.clone(),
            name: d.name.clone().unwrap_or_default(),
            model: d.model.clone().unwrap_or_default(),
            online: if d.is_online() { "yes" } else { "no" }.into(),
        }
    }
}

// ── Detail views ────────────────────────────────────────────────────

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".into(), |v| v.to_string())
}

/// Key/value view of a device state.
pub fn detail(s: &DeviceState, color: bool) -> String {
    let light_auto_close = s.light_auto_close.as_ref().map(|l| {
        if l.enabled() {
            l.to_string()
        } else {
            format!("{l} (disabled)")
        }
    });

    let screen_protection = s.black_setting.map(|p| {
        format!(
            "{} (run {} min, pause {} min)",
            if p.status { "on" } else { "off" },
            p.open_time,
            p.pause_time
        )
    });

    [
        format!("Name:             {}", or_dash(s.name.as_deref())),
        format!("MAC:              {}", or_dash(s.mac.as_deref())),
        format!("Model:            {}", s.device_model),
        format!("Firmware:         {}", s.firmware_version),
        format!("Online:           {}", if s.online { "yes" } else { "no" }),
        format!(
            "Temperature:      {}",
            s.temperature.map_or_else(|| "-".into(), |t| format!("{t:.1} °C"))
        ),
        format!("Light:            {}", output::on_off(s.light_switch, color)),
        format!("Heater 1:         {}", output::on_off(s.warming_switch1, color)),
        format!("Heater 2:         {}", output::on_off(s.warming_switch2, color)),
        format!("Wind:             {}", output::on_off(s.wind_switch, color)),
        format!("Ventilation:      {}", output::on_off(s.ventilation_switch, color)),
        format!("Fan preset:       {}", s.fan_preset()),
        format!(
            "Ventilation stop: {}",
            or_dash(s.ventilation_auto_close.map(|m| format!("{m} min")))
        ),
        format!(
            "Warming stop:     {}",
            or_dash(s.warming_auto_close.map(|m| format!("{m} min")))
        ),
        format!(
            "Over-heat stop:   {}",
            or_dash(s.over_heat_auto_close.map(|c| format!("{c} °C")))
        ),
        format!("Light stop:       {}", or_dash(light_auto_close)),
        format!(
            "Calibration:      {}",
            or_dash(s.temperature_calibration)
        ),
        format!("Screen protect:   {}", or_dash(screen_protection)),
    ]
    .join("\n")
}

/// `key=value` lines for scripting.
fn plain(s: &DeviceState) -> String {
    [
        format!("online={}", s.online),
        format!("temperature={}", or_dash(s.temperature)),
        format!("light={}", s.light_switch),
        format!("heater1={}", s.warming_switch1),
        format!("heater2={}", s.warming_switch2),
        format!("wind={}", s.wind_switch),
        format!("ventilation={}", s.ventilation_switch),
        format!("fan={}", s.fan_preset()),
    ]
    .join("\n")
}

/// One-line summary for `watch`.
fn summary_line(update: &StateUpdate) -> String {
    let s = &update.state;
    let flag = |on: bool| if on { "on" } else { "off" };
    format!(
        "{} {:<10} temp={} light={} heater1={} heater2={} wind={} ventilation={}",
        update.at.format("%H:%M:%S"),
        update.kind,
        or_dash(s.temperature),
        flag(s.light_switch),
        flag(s.warming_switch1),
        flag(s.warming_switch2),
        flag(s.wind_switch),
        flag(s.ventilation_switch),
    )
}

/// Print a state in the selected format.
pub fn print_state(state: &DeviceState, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let out = output::render_single(&global.output, state, |s| detail(s, color), plain)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn list(coordinator: &Coordinator, global: &GlobalOpts) -> Result<(), CliError> {
    let devices = coordinator.list_devices().await?;
    let out = output::render_list(
        &global.output,
        &devices,
        |d| DeviceRow::from(d),
        |d| d.mac.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn status(coordinator: &Coordinator, global: &GlobalOpts) -> Result<(), CliError> {
    require_mac(coordinator)?;
    let state = coordinator.refresh().await?;
    let mut shown = (*state).clone();
    shown.name = coordinator.name();
    print_state(&shown, global)
}

#[derive(Serialize)]
struct WatchEvent<'a> {
    kind: UpdateKind,
    at: DateTime<Utc>,
    state: &'a DeviceState,
}

impl<'a> From<&'a StateUpdate> for WatchEvent<'a> {
    fn from(update: &'a StateUpdate) -> Self {
        Self {
            kind: update.kind,
            at: update.at,
            state: &update.state,
        }
    }
}

/// One line (or one YAML document) per update.
fn print_update(update: &StateUpdate, global: &GlobalOpts) -> Result<(), CliError> {
    let out = match global.output {
        OutputFormat::Table | OutputFormat::Plain => summary_line(update),
        OutputFormat::Json | OutputFormat::JsonCompact => {
            serde_json::to_string(&WatchEvent::from(update))?
        }
        OutputFormat::Yaml => {
            let doc = serde_yaml::to_string(&WatchEvent::from(update))?;
            format!("---\n{}", doc.trim_end())
        }
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn watch(coordinator: &Coordinator, global: &GlobalOpts) -> Result<(), CliError> {
    require_mac(coordinator)?;

    let mut updates = coordinator.updates();
    coordinator.start().await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            update = updates.recv() => match update {
                Ok(update) => print_update(&update, global)?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "watch output fell behind");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    Ok(())
}
