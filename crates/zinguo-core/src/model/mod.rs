// ── Domain model ──

pub mod device;

pub use device::{
    AutoCloseSchedule, DeviceState, FanPreset, GENERIC_MODEL_NAME, LightAutoClose,
    ScreenProtection, Switch, UNKNOWN_FIRMWARE,
};
