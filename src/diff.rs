use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::codec::{codes_match, wire_string};
use crate::command::{Property, normalize_value, trackable};
use crate::model::UnitModel;
use crate::types::{RawState, StateValue};

pub(crate) type StateDiff = (
    BTreeMap<Property, StateValue>,
    BTreeMap<Property, StateValue>,
);

/// Compare two snapshots over the trackable properties. Only properties the
/// previous snapshot actually had are considered.
pub(crate) fn diff_states(
    previous: &RawState,
    current: &RawState,
    model: &UnitModel,
    offset: f64,
) -> Option<StateDiff> {
    let mut before = BTreeMap::new();
    let mut after = BTreeMap::new();

    for descriptor in trackable() {
        let Some(old) = previous.get(descriptor.key).and_then(wire_string) else {
            continue;
        };
        let new = current.get(descriptor.key).and_then(wire_string);
        if new.as_deref().is_some_and(|new| codes_match(&old, new)) {
            continue;
        }
        if let Some(v) = normalize_value(descriptor, model, previous, offset) {
            before.insert(descriptor.property, v);
        }
        if let Some(v) = normalize_value(descriptor, model, current, offset) {
            after.insert(descriptor.property, v);
        }
    }

    if before.is_empty() && after.is_empty() {
        None
    } else {
        Some((before, after))
    }
}

/// Current and previous snapshots for one unit.
///
/// A state fetch moves Current into Previous before overwriting it. A command
/// response replaces Current and clears Previous, so the next fetch diffs
/// against what the unit reported right after our command.
#[derive(Debug, Clone, Default)]
pub(crate) struct StateTracker {
    tracking: bool,
    current: Option<RawState>,
    previous: Option<RawState>,
}

impl StateTracker {
    #[cfg(test)]
    pub fn new(tracking: bool) -> Self {
        Self {
            tracking,
            ..Default::default()
        }
    }

    pub fn with_state(tracking: bool, current: Option<RawState>) -> Self {
        Self {
            tracking,
            current,
            ..Default::default()
        }
    }

    pub fn current(&self) -> Option<&RawState> {
        self.current.as_ref()
    }

    #[cfg(test)]
    pub fn previous(&self) -> Option<&RawState> {
        self.previous.as_ref()
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        let Some(current) = &self.current else {
            return false;
        };
        match (now - current.fetched_at).to_std() {
            Ok(age) => age <= max_age,
            // fetched_at in the future; clock moved backwards
            Err(_) => true,
        }
    }

    /// Store a polled snapshot and report what changed since the last one.
    pub fn record_fetch(&mut self, fresh: RawState, model: &UnitModel, offset: f64) -> Option<StateDiff> {
        if !self.tracking {
            self.current = Some(fresh);
            return None;
        }

        self.previous = self.current.replace(fresh);

        let previous = self.previous.as_ref()?;
        let current = self.current.as_ref()?;
        diff_states(previous, current, model, offset)
    }

    pub fn record_command(&mut self, response: RawState) {
        self.current = Some(response);
        self.previous = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::Capabilities;
    use serde_json::json;

    fn model() -> UnitModel {
        UnitModel::resolve(&Capabilities {
            fanstage: Some(3),
            ..Default::default()
        })
    }

    fn raw(v: serde_json::Value) -> RawState {
        RawState::from_response(v)
    }

    #[test]
    fn first_fetch_never_reports() {
        let mut tracker = StateTracker::new(true);
        let diff = tracker.record_fetch(raw(json!({"setmode": "3"})), &model(), 0.0);
        assert!(diff.is_none());
        assert!(tracker.previous().is_none());
        assert!(tracker.current().is_some());
    }

    #[test]
    fn external_change_is_reported_normalized() {
        let m = model();
        let mut tracker = StateTracker::new(true);
        tracker.record_fetch(raw(json!({"setmode": "3", "settemp": "24", "roomtemp": "20"})), &m, 0.5);
        let (before, after) = tracker
            .record_fetch(raw(json!({"setmode": "1", "settemp": "24.0", "roomtemp": "21"})), &m, 0.5)
            .expect("mode change should be reported");

        assert_eq!(before.len(), 1);
        assert_eq!(before[&Property::Mode], StateValue::Token("cool".into()));
        assert_eq!(after[&Property::Mode], StateValue::Token("heat".into()));
        assert!(!after.contains_key(&Property::RoomTemperature));
    }

    #[test]
    fn temperature_change_includes_offset() {
        let m = model();
        let mut tracker = StateTracker::new(true);
        tracker.record_fetch(raw(json!({"settemp": "21"})), &m, 1.0);
        let (before, after) = tracker
            .record_fetch(raw(json!({"settemp": 23})), &m, 1.0)
            .unwrap();
        assert_eq!(before[&Property::SetTemperature], StateValue::Number(22.0));
        assert_eq!(after[&Property::SetTemperature], StateValue::Number(24.0));
    }

    #[test]
    fn unchanged_fetch_is_silent() {
        let m = model();
        let mut tracker = StateTracker::new(true);
        tracker.record_fetch(raw(json!({"power": 1, "setfan": "2"})), &m, 0.0);
        assert!(tracker.record_fetch(raw(json!({"power": "1", "setfan": 2})), &m, 0.0).is_none());
    }

    #[test]
    fn own_command_is_not_reported() {
        let m = model();
        let mut tracker = StateTracker::new(true);
        tracker.record_fetch(raw(json!({"power": 1, "setfan": 2})), &m, 0.0);
        tracker.record_command(raw(json!({"power": 0, "setfan": 2})));
        assert!(tracker.previous().is_none());

        assert!(tracker.record_fetch(raw(json!({"power": "0", "setfan": "2"})), &m, 0.0).is_none());
    }

    #[test]
    fn external_change_after_command_is_reported() {
        let m = model();
        let mut tracker = StateTracker::new(true);
        tracker.record_fetch(raw(json!({"power": 1, "setfan": 2})), &m, 0.0);
        tracker.record_command(raw(json!({"power": 0, "setfan": 2})));

        let (before, after) = tracker
            .record_fetch(raw(json!({"power": 0, "setfan": 5})), &m, 0.0)
            .expect("fan change after the command should be reported");
        assert_eq!(before.len(), 1);
        assert_eq!(before[&Property::FanSpeed], StateValue::Token("1".into()));
        assert_eq!(after[&Property::FanSpeed], StateValue::Token("3".into()));
        assert!(tracker.previous().is_some());
    }

    #[test]
    fn tracking_disabled_keeps_no_previous() {
        let m = model();
        let mut tracker = StateTracker::new(false);
        tracker.record_fetch(raw(json!({"setmode": "3"})), &m, 0.0);
        assert!(tracker.record_fetch(raw(json!({"setmode": "1"})), &m, 0.0).is_none());
        assert!(tracker.previous().is_none());
    }

    #[test]
    fn freshness_window() {
        let tracker = StateTracker::new(false);
        assert!(!tracker.is_fresh(Utc::now(), Duration::from_secs(60)));

        let mut state = raw(json!({}));
        state.fetched_at = Utc::now() - chrono::Duration::seconds(120);
        let tracker = StateTracker::with_state(false, Some(state));
        assert!(!tracker.is_fresh(Utc::now(), Duration::from_secs(60)));
        assert!(tracker.is_fresh(Utc::now(), Duration::from_secs(300)));
    }
}
