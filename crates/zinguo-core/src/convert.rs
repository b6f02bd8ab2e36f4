// ── Vendor-to-domain conversions ──
//
// The only place that knows the vendor's encodings: switch codes (1 = on,
// 2 = off), the model code table and the loosely typed raw record. The rest
// of the crate sees booleans and `DeviceState`.

use serde_json::{Map, Value, json};

use zinguo_api::RawDeviceRecord;

use crate::command::ControlValue;
use crate::model::{
    AutoCloseSchedule, DeviceState, GENERIC_MODEL_NAME, LightAutoClose, ScreenProtection, Switch,
    UNKNOWN_FIRMWARE,
};

/// Vendor code for "on".
pub const SWITCH_ON: i64 = 1;

/// Vendor code for "off". Never 0: the device ignores 0 and missing fields.
pub const SWITCH_OFF: i64 = 2;

/// Screen-protection run and pause time when the record omits them.
const DEFAULT_PROTECTION_MINUTES: i64 = 5;

/// Model codes from the vendor's device type list.
const MODEL_NAMES: &[(&str, &str)] = &[
    ("M1", "门窗报警器M2/M2S"),
    ("W1", "智能网关W1"),
    ("K2", "墙壁开关K2"),
    ("K2G", "开关群组K2G"),
    ("B2", "浴霸开关B2"),
    ("C2", "墙壁插座C2/C2S"),
    ("T2", "智能窗帘T2"),
    ("S2", "情景面板S2"),
    ("H2", "控制盒H2/H2S"),
    ("G6", "迎宾广告机G6"),
];

// ── Encode / decode boundary ─────────────────────────────────────────

pub fn encode_switch(on: bool) -> i64 {
    if on { SWITCH_ON } else { SWITCH_OFF }
}

/// `1` is on; `2`, missing and any unknown code are off.
pub fn decode_switch(raw: Option<&Value>) -> bool {
    raw.and_then(Value::as_i64) == Some(SWITCH_ON)
}

/// Wire form of a requested value: flags become switch codes, everything
/// else passes through.
pub fn encode_value(value: &ControlValue) -> Value {
    match value {
        ControlValue::Flag(on) => json!(encode_switch(*on)),
        ControlValue::Number(n) => json!(n),
        ControlValue::Schedule(s) => json!({
            "stopHour": s.stop_hour,
            "stopMinute": s.stop_minute,
            "status": s.status,
        }),
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Human-readable model name; unknown codes get the generic label.
pub fn model_name(code: Option<&str>) -> &'static str {
    code.and_then(|c| MODEL_NAMES.iter().find(|(k, _)| *k == c))
        .map_or(GENERIC_MODEL_NAME, |(_, name)| *name)
}

/// Temperature as a number. Numeric strings are accepted; anything else,
/// including NaN, is dropped.
fn parse_temperature(raw: Option<&Value>) -> Option<f64> {
    let value = match raw? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    value.is_finite().then_some(value)
}

fn parse_int(raw: Option<&Value>) -> Option<i64> {
    match raw? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_string(raw: Option<&Value>) -> Option<String> {
    match raw? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_flag(raw: Option<&Value>) -> Option<bool> {
    match raw? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n == SWITCH_ON),
        _ => None,
    }
}

fn clock_part(raw: Option<&Value>) -> u8 {
    parse_int(raw)
        .and_then(|n| u8::try_from(n).ok())
        .unwrap_or_default()
}

fn parse_light_auto_close(raw: Option<&Value>) -> Option<LightAutoClose> {
    match raw? {
        Value::Object(obj) => Some(LightAutoClose::Schedule(AutoCloseSchedule {
            stop_hour: clock_part(obj.get("stopHour")),
            stop_minute: clock_part(obj.get("stopMinute")),
            status: parse_flag(obj.get("status")).unwrap_or(true),
        })),
        other => parse_int(Some(other)).map(LightAutoClose::Minutes),
    }
}

/// `blackSetting` object. Missing times read as the app's 5 minutes.
fn parse_black_setting(raw: Option<&Value>) -> Option<ScreenProtection> {
    let obj = raw?.as_object()?;
    Some(ScreenProtection {
        status: parse_flag(obj.get("status")).unwrap_or(false),
        open_time: parse_int(obj.get("openTime")).unwrap_or(DEFAULT_PROTECTION_MINUTES),
        pause_time: parse_int(obj.get("pauseTime")).unwrap_or(DEFAULT_PROTECTION_MINUTES),
    })
}

// ── Normalization ────────────────────────────────────────────────────

/// Build the typed device view from a raw `getDeviceByMac` record.
///
/// Never fails: unknown codes and missing fields fall back to off /
/// absent / the generic model label.
pub fn normalize(raw: &RawDeviceRecord) -> DeviceState {
    let switch = |s: Switch| decode_switch(raw.get(s.as_ref()));
    let software_version = parse_string(raw.get("softwareVersion"));

    DeviceState {
        id: parse_string(raw.get("_id")),
        mac: parse_string(raw.get("mac")),
        name: parse_string(raw.get("name")),
        online: parse_flag(raw.get("online")).unwrap_or(false),
        temperature: parse_temperature(raw.get("temperature")),

        light_switch: switch(Switch::LightSwitch),
        warming_switch1: switch(Switch::WarmingSwitch1),
        warming_switch2: switch(Switch::WarmingSwitch2),
        wind_switch: switch(Switch::WindSwitch),
        ventilation_switch: switch(Switch::VentilationSwitch),

        ventilation_auto_close: parse_int(raw.get("ventilationAutoClose")),
        warming_auto_close: parse_int(raw.get("warmingAutoClose")),
        over_heat_auto_close: parse_int(raw.get("overHeatAutoClose")),
        light_auto_close: parse_light_auto_close(raw.get("lightAutoClose")),
        temperature_calibration: parse_int(raw.get("temperatureCalibration")),
        black_setting: parse_black_setting(raw.get("blackSetting")),
        comovement: parse_int(raw.get("comovement")),
        moto_version: parse_int(raw.get("motoVersion")),

        hardware_version: parse_string(raw.get("hardwareVersion")),
        device_model: model_name(raw.get("model").and_then(Value::as_str)).to_owned(),
        firmware_version: software_version
            .clone()
            .unwrap_or_else(|| UNKNOWN_FIRMWARE.to_owned()),
        software_version,
    }
}

/// Every switch of a state as vendor codes, keyed by field name.
pub fn encode_switches(state: Option<&DeviceState>) -> Map<String, Value> {
    Switch::ALL
        .iter()
        .map(|s| {
            let on = state.is_some_and(|st| st.switch(*s));
            (s.as_ref().to_owned(), json!(encode_switch(on)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn record(v: Value) -> RawDeviceRecord {
        match v {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn switch_codes_decode() {
        assert!(decode_switch(Some(&json!(1))));
        assert!(!decode_switch(Some(&json!(2))));
        assert!(!decode_switch(Some(&json!(0))));
        assert!(!decode_switch(Some(&json!(7))));
        assert!(!decode_switch(Some(&json!("1"))));
        assert!(!decode_switch(None));
    }

    #[test]
    fn off_is_two() {
        assert_eq!(encode_switch(true), 1);
        assert_eq!(encode_switch(false), 2);
        assert_eq!(encode_value(&ControlValue::Flag(false)), json!(2));
        assert_eq!(encode_value(&ControlValue::Number(45)), json!(45));
    }

    #[test]
    fn normalize_full_record() {
        let state = normalize(&record(json!({
            "_id": "5f1d",
            "mac": "AABBCCDDEEFF",
            "name": "Bathroom",
            "online": 1,
            "temperature": 23.5,
            "lightSwitch": 1,
            "warmingSwitch1": 2,
            "warmingSwitch2": 1,
            "windSwitch": 1,
            "ventilationSwitch": 3,
            "ventilationAutoClose": 15,
            "warmingAutoClose": 30,
            "overHeatAutoClose": 45,
            "lightAutoClose": { "stopHour": 23, "stopMinute": 15, "status": false },
            "temperatureCalibration": 2,
            "blackSetting": { "status": true, "openTime": 12, "pauseTime": 3 },
            "comovement": 3,
            "motoVersion": 2,
            "hardwareVersion": "1.0",
            "softwareVersion": "2.3.1",
            "model": "B2"
        })));

        assert_eq!(state.id.as_deref(), Some("5f1d"));
        assert!(state.online);
        assert_eq!(state.temperature, Some(23.5));
        assert!(state.light_switch);
        assert!(!state.warming_switch1);
        assert!(state.warming_switch2);
        assert!(state.wind_switch);
        assert!(!state.ventilation_switch);
        assert_eq!(state.ventilation_auto_close, Some(15));
        assert_eq!(state.over_heat_auto_close, Some(45));
        assert_eq!(
            state.light_auto_close,
            Some(LightAutoClose::Schedule(AutoCloseSchedule {
                stop_hour: 23,
                stop_minute: 15,
                status: false,
            }))
        );
        assert_eq!(state.temperature_calibration, Some(2));
        assert_eq!(
            state.black_setting,
            Some(ScreenProtection {
                status: true,
                open_time: 12,
                pause_time: 3,
            })
        );
        assert_eq!(state.device_model, "浴霸开关B2");
        assert_eq!(state.firmware_version, "2.3.1");
    }

    #[test]
    fn normalize_sparse_record() {
        let state = normalize(&record(json!({
            "mac": "AABBCCDDEEFF",
            "temperature": "n/a",
            "lightAutoClose": 90,
            "blackSetting": { "status": 1 },
            "model": "ZZ9"
        })));

        assert!(!state.online);
        assert_eq!(state.temperature, None);
        for s in Switch::ALL {
            assert!(!state.switch(s), "{s} should default to off");
        }
        assert_eq!(state.light_auto_close, Some(LightAutoClose::Minutes(90)));
        assert_eq!(state.temperature_calibration, None);
        assert_eq!(
            state.black_setting,
            Some(ScreenProtection {
                status: true,
                open_time: 5,
                pause_time: 5,
            })
        );
        assert_eq!(state.device_model, GENERIC_MODEL_NAME);
        assert_eq!(state.firmware_version, UNKNOWN_FIRMWARE);
        assert_eq!(state.software_version, None);
    }

    #[test]
    fn temperature_accepts_numeric_strings() {
        assert_eq!(parse_temperature(Some(&json!("21.0"))), Some(21.0));
        assert_eq!(parse_temperature(Some(&json!(19))), Some(19.0));
        assert_eq!(parse_temperature(Some(&json!("NaN"))), None);
        assert_eq!(parse_temperature(Some(&json!(null))), None);
    }

    #[test]
    fn known_model_codes() {
        assert_eq!(model_name(Some("W1")), "智能网关W1");
        assert_eq!(model_name(Some("K2G")), "开关群组K2G");
        assert_eq!(model_name(None), GENERIC_MODEL_NAME);
    }

    #[test]
    fn encode_switches_defaults_to_off() {
        let encoded = encode_switches(None);
        assert_eq!(encoded.len(), 5);
        assert!(encoded.values().all(|v| *v == json!(2)));
    }
}
