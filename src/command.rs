//! Property table and delta encoding.
//!
//! A command is a comma-joined list of `<prefix><code>` segments, e.g.
//! `PW1,MD3,TS22`. The API applies a whole command atomically.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::capabilities::Capabilities;
use crate::catalog::Category;
use crate::codec::{codes_match, decode, encode, wire_f64};
use crate::model::UnitModel;
use crate::range::{apply_offset, clamp, format_temperature, strip_offset};
use crate::types::{DesiredState, RawState, StateValue, UnitState};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Property {
    Power,
    Mode,
    AutoMode,
    SetTemperature,
    RoomTemperature,
    FanSpeed,
    AirDirectionV,
    AirDirectionH,
    Standby,
}

impl Property {
    pub fn descriptor(&self) -> &'static Descriptor {
        // PROPERTIES is declared in enum order.
        &PROPERTIES[*self as usize]
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descriptor().name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    /// Wire code looked up through the unit model.
    Coded(Category),
    /// Already a display value; `offset` marks temperatures.
    Raw { offset: bool },
    /// `"1"` is on, anything else off.
    Flag,
}

#[derive(Debug, Clone, Copy)]
pub struct Descriptor {
    pub property: Property,
    pub name: &'static str,
    pub key: &'static str,
    pub trackable: bool,
    pub form: Form,
}

pub const PROPERTIES: &[Descriptor] = &[
    Descriptor {
        property: Property::Power,
        name: "power",
        key: "power",
        trackable: true,
        form: Form::Coded(Category::Power),
    },
    Descriptor {
        property: Property::Mode,
        name: "mode",
        key: "setmode",
        trackable: true,
        form: Form::Coded(Category::Mode),
    },
    Descriptor {
        property: Property::AutoMode,
        name: "autoMode",
        key: "automode",
        trackable: false,
        form: Form::Coded(Category::Mode),
    },
    Descriptor {
        property: Property::SetTemperature,
        name: "setTemperature",
        key: "settemp",
        trackable: true,
        form: Form::Raw { offset: true },
    },
    Descriptor {
        property: Property::RoomTemperature,
        name: "roomTemperature",
        key: "roomtemp",
        trackable: false,
        form: Form::Raw { offset: true },
    },
    Descriptor {
        property: Property::FanSpeed,
        name: "fanSpeed",
        key: "setfan",
        trackable: true,
        form: Form::Coded(Category::Fan),
    },
    Descriptor {
        property: Property::AirDirectionV,
        name: "airDirectionV",
        key: "airdir",
        trackable: true,
        form: Form::Coded(Category::AirDirectionV),
    },
    Descriptor {
        property: Property::AirDirectionH,
        name: "airDirectionH",
        key: "airdirh",
        trackable: true,
        form: Form::Coded(Category::AirDirectionH),
    },
    Descriptor {
        property: Property::Standby,
        name: "standby",
        key: "standby",
        trackable: false,
        form: Form::Flag,
    },
];

pub fn trackable() -> impl Iterator<Item = &'static Descriptor> {
    PROPERTIES.iter().filter(|d| d.trackable)
}

/// Render one property of a raw snapshot for display.
pub fn normalize_value(
    descriptor: &Descriptor,
    model: &UnitModel,
    raw: &RawState,
    offset: f64,
) -> Option<StateValue> {
    let value = raw.get(descriptor.key)?;
    match descriptor.form {
        Form::Coded(category) => Some(StateValue::Token(decode(model, category, value))),
        Form::Raw { offset: with_offset } => {
            let t = wire_f64(value)?;
            Some(StateValue::Number(if with_offset {
                apply_offset(t, offset)
            } else {
                t
            }))
        }
        Form::Flag => {
            let on = raw.get_string(descriptor.key).as_deref() == Some("1");
            Some(StateValue::Token(if on { "on" } else { "off" }.to_string()))
        }
    }
}

pub fn normalize(model: &UnitModel, raw: &RawState, offset: f64) -> UnitState {
    let token = |p: Property| match normalize_value(p.descriptor(), model, raw, offset) {
        Some(StateValue::Token(s)) => Some(s),
        _ => None,
    };
    let number = |p: Property| match normalize_value(p.descriptor(), model, raw, offset) {
        Some(StateValue::Number(n)) => Some(n),
        _ => None,
    };
    UnitState {
        power: token(Property::Power),
        mode: token(Property::Mode),
        auto_mode: token(Property::AutoMode),
        standby: token(Property::Standby),
        fan_speed: token(Property::FanSpeed),
        set_temperature: number(Property::SetTemperature),
        room_temperature: number(Property::RoomTemperature),
        air_direction_v: token(Property::AirDirectionV),
        air_direction_h: token(Property::AirDirectionH),
    }
}

/// One wire request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    segments: Vec<(Property, String)>,
}

impl Command {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn contains(&self, property: Property) -> bool {
        self.segments.iter().any(|(p, _)| *p == property)
    }

    fn push(&mut self, property: Property, segment: String) {
        self.segments.push((property, segment));
    }

    fn split_off(&mut self, property: Property) -> Option<Command> {
        let idx = self.segments.iter().position(|(p, _)| *p == property)?;
        let segment = self.segments.remove(idx);
        Some(Command {
            segments: vec![segment],
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (_, segment)) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

/// Everything the encoder needs to know about a unit.
#[derive(Debug, Clone, Copy)]
pub struct EncodeContext<'a> {
    pub model: &'a UnitModel,
    pub capabilities: &'a Capabilities,
    pub offset: f64,
}

/// Check a desired state against the unit model without looking at any
/// current state.
pub fn validate(model: &UnitModel, desired: &DesiredState) -> Result<()> {
    if let Some(t) = desired.set_temperature
        && !t.is_finite()
    {
        return Err(Error::InvalidValue(format!("temperature {t}")));
    }
    for descriptor in trackable() {
        if let (Form::Coded(category), Some(token)) = (descriptor.form, desired.token(descriptor.property)) {
            encode(model, category, token)?;
        }
    }
    Ok(())
}

/// Encode the difference between `current` and `desired` as one composite
/// command. All validation happens here, before anything touches the wire.
///
/// When the mode changes the temperature is re-clamped against the new mode's
/// bounds, even if the caller did not ask for a temperature.
pub fn build_delta(ctx: EncodeContext<'_>, current: &RawState, desired: &DesiredState) -> Result<Command> {
    validate(ctx.model, desired)?;

    let mode_key = Property::Mode.descriptor().key;
    let temp_key = Property::SetTemperature.descriptor().key;

    let current_mode = current.get_string(mode_key);
    let desired_mode = desired
        .mode
        .as_deref()
        .map(|token| encode(ctx.model, Category::Mode, token))
        .transpose()?;
    let mode_changes = match (desired_mode, current_mode.as_deref()) {
        (Some(new), Some(old)) => !codes_match(new, old),
        (Some(_), None) => true,
        _ => false,
    };
    let target_mode = desired_mode.map(str::to_string).or(current_mode);

    let current_temp = current.get(temp_key).and_then(wire_f64);
    let requested = desired
        .set_temperature
        .map(|t| strip_offset(t, ctx.offset))
        .or(if mode_changes { current_temp } else { None });
    let effective = requested.map(|t| match target_mode.as_deref() {
        Some(mode) => clamp(ctx.capabilities, mode, t),
        None => t,
    });

    let mut command = Command::default();
    for descriptor in trackable() {
        match descriptor.form {
            Form::Coded(category) => {
                let Some(token) = desired.token(descriptor.property) else {
                    continue;
                };
                let code = encode(ctx.model, category, token)?;
                let unchanged = current
                    .get_string(descriptor.key)
                    .is_some_and(|cur| codes_match(code, &cur));
                if !unchanged {
                    let prefix = ctx.model.prefix(category).unwrap_or_default();
                    command.push(descriptor.property, format!("{prefix}{code}"));
                }
            }
            Form::Raw { .. } => {
                let Some(t) = effective else {
                    continue;
                };
                if current_temp.is_some_and(|cur| (cur - t).abs() < 1e-6) {
                    continue;
                }
                let prefix = ctx
                    .model
                    .prefix(Category::Temperature)
                    .ok_or_else(|| Error::Unsupported {
                        category: Category::Temperature,
                        value: format_temperature(t),
                    })?;
                command.push(descriptor.property, format!("{prefix}{}", format_temperature(t)));
            }
            Form::Flag => {}
        }
    }

    Ok(command)
}

/// Split a delta into the wire requests to send, in order.
///
/// The remote end does not clamp temperatures when the mode changes, so a
/// temperature adjustment that accompanies a mode change goes out first as its
/// own request.
pub fn plan_commands(ctx: EncodeContext<'_>, current: &RawState, desired: &DesiredState) -> Result<Vec<Command>> {
    let mut delta = build_delta(ctx, current, desired)?;
    let mut commands = Vec::new();
    if delta.contains(Property::Mode)
        && let Some(temperature) = delta.split_off(Property::SetTemperature)
    {
        commands.push(temperature);
    }
    if !delta.is_empty() {
        commands.push(delta);
    }
    Ok(commands)
}
