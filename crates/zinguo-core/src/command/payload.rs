// ── Control payload builder ──
//
// Turns a `ChangeSet` into the full `yuBaControl` body. A switch write
// always carries the complete switch state so that channels the caller
// did not mention keep their cached value; a parameter write carries only
// its companion fields and the requested changes.

use serde_json::{Map, Value, json};

use super::{ChangeSet, CommandKind, ControlKey};
use crate::convert::{SWITCH_ON, encode_switches, encode_value};
use crate::model::{DeviceState, Switch};

/// `comovement` sent with parameter writes when the cache has none.
pub const DEFAULT_COMOVEMENT: i64 = 3;

/// `motoVersion` sent with parameter writes when the cache has none.
pub const DEFAULT_MOTO_VERSION: i64 = 2;

/// Build the complete control body for one write.
///
/// `cached` is the last known state; without one every switch is sent as
/// off. Pure and deterministic: the same inputs always give the same body.
pub fn build(
    change_set: &ChangeSet,
    cached: Option<&DeviceState>,
    mac: &str,
    account: &str,
) -> Map<String, Value> {
    let kind = change_set.kind();

    let mut payload = Map::new();
    payload.insert("mac".into(), json!(mac));
    payload.insert("masterUser".into(), json!(account));
    payload.insert("setParamter".into(), json!(kind == CommandKind::Parameter));
    payload.insert("action".into(), json!(false));

    match kind {
        CommandKind::Parameter => {
            let comovement = cached
                .and_then(|s| s.comovement)
                .unwrap_or(DEFAULT_COMOVEMENT);
            let moto_version = cached
                .and_then(|s| s.moto_version)
                .unwrap_or(DEFAULT_MOTO_VERSION);
            payload.insert(ControlKey::Comovement.to_string(), json!(comovement));
            payload.insert(ControlKey::MotoVersion.to_string(), json!(moto_version));

            for (key, value) in change_set.iter() {
                payload.insert(key.to_string(), encode_value(value));
            }
        }
        CommandKind::Switch => {
            let mut switches = encode_switches(cached);
            switches.insert(ControlKey::TurnOffAll.to_string(), json!(0));

            for (key, value) in change_set.iter() {
                switches.insert(key.to_string(), encode_value(value));
            }

            // The device must not heat without airflow.
            let heating = [Switch::WarmingSwitch1, Switch::WarmingSwitch2]
                .iter()
                .any(|s| switches.get(s.as_ref()) == Some(&json!(SWITCH_ON)));
            if heating {
                switches.insert(Switch::WindSwitch.to_string(), json!(SWITCH_ON));
            }

            payload.extend(switches);
        }
    }

    payload
}
