//! Sensor-triggered reporter: turns a rising-edge fire signal from the
//! home sensor feed into exactly one incident per process lifetime.

use serde::Deserialize;
use std::collections::HashMap;

use crate::incidents::model::{CreateIncidentPayload, GeoPoint};

/// Reading that denotes a detected fire condition.
pub const FIRE_SENTINEL: i64 = 1;

/// Fixed location reported for sensor-created incidents (the sensor
/// deployment site).
pub const SENSOR_LOCATION: GeoPoint = GeoPoint {
    latitude: 12.9141,
    longitude: 74.856,
};

const PLACEHOLDER_IMAGE: &str = "https://placehold.co/100x100/e2e8f0/334155?text=Fire";

/// The feed node's value: a single number or a map of sensor-id to
/// number, depending on deployment.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FeedValue {
    Single(i64),
    BySensor(HashMap<String, i64>),
}

impl FeedValue {
    fn contains_sentinel(&self) -> bool {
        match self {
            FeedValue::Single(value) => *value == FIRE_SENTINEL,
            FeedValue::BySensor(values) => values.values().any(|v| *v == FIRE_SENTINEL),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Armed,
    Fired,
}

/// One-shot latch over the sensor feed. `Armed` is the initial state;
/// the first sentinel reading trips it to `Fired`, which persists for
/// the rest of the process lifetime unless the resulting create fails,
/// in which case `rearm` puts it back so the next qualifying reading
/// retries. Non-sentinel readings are ignored in either state.
#[derive(Debug)]
pub struct SensorTrigger {
    state: TriggerState,
    location: GeoPoint,
}

impl SensorTrigger {
    pub fn new() -> SensorTrigger {
        SensorTrigger::at(SENSOR_LOCATION)
    }

    /// Latch for a sensor deployed somewhere other than the default
    /// site; the location flows into every draft it emits.
    pub fn at(location: GeoPoint) -> SensorTrigger {
        SensorTrigger {
            state: TriggerState::Armed,
            location,
        }
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    /// Feed one reading through the latch. Returns the incident draft
    /// to create on the Armed -> Fired transition, `None` otherwise.
    pub fn observe(&mut self, value: &FeedValue) -> Option<CreateIncidentPayload> {
        if self.state == TriggerState::Fired {
            return None;
        }
        if !value.contains_sentinel() {
            return None;
        }
        self.state = TriggerState::Fired;
        Some(fire_alert_draft(self.location))
    }

    /// Reset after a failed create so the next sentinel reading can
    /// retry. This is the only automatic retry policy in the system.
    pub fn rearm(&mut self) {
        self.state = TriggerState::Armed;
    }
}

impl Default for SensorTrigger {
    fn default() -> Self {
        SensorTrigger::new()
    }
}

/// The fixed incident template for a sensor-detected fire.
pub fn fire_alert_draft(location: GeoPoint) -> CreateIncidentPayload {
    CreateIncidentPayload {
        title: "Fire at household".to_string(),
        description: "Home sensor detected fire".to_string(),
        intensity: Some(4),
        location: Some(location),
        image_url: Some(PLACEHOLDER_IMAGE.to_string()),
        police_help: true,
        fire_help: true,
        ambulance_help: false,
        other_help: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_process_lifetime() {
        let mut trigger = SensorTrigger::new();
        let reading = FeedValue::Single(FIRE_SENTINEL);

        let first = trigger.observe(&reading);
        assert!(first.is_some());
        assert_eq!(trigger.state(), TriggerState::Fired);

        // Second sentinel in succession creates nothing.
        assert!(trigger.observe(&reading).is_none());
        assert_eq!(trigger.state(), TriggerState::Fired);
    }

    #[test]
    fn ignores_non_sentinel_readings() {
        let mut trigger = SensorTrigger::new();
        assert!(trigger.observe(&FeedValue::Single(0)).is_none());
        assert!(trigger.observe(&FeedValue::Single(37)).is_none());
        assert_eq!(trigger.state(), TriggerState::Armed);
    }

    #[test]
    fn any_sensor_in_a_map_can_trip_the_latch() {
        let mut trigger = SensorTrigger::new();
        let mut values = HashMap::new();
        values.insert("kitchen".to_string(), 0);
        values.insert("hallway".to_string(), FIRE_SENTINEL);
        assert!(trigger.observe(&FeedValue::BySensor(values)).is_some());
    }

    #[test]
    fn rearm_allows_a_retry_after_create_failure() {
        let mut trigger = SensorTrigger::new();
        let reading = FeedValue::Single(FIRE_SENTINEL);

        assert!(trigger.observe(&reading).is_some());
        trigger.rearm();
        assert_eq!(trigger.state(), TriggerState::Armed);
        assert!(trigger.observe(&reading).is_some());
    }

    #[test]
    fn draft_matches_the_fire_alert_template() {
        let draft = fire_alert_draft(SENSOR_LOCATION);
        assert_eq!(draft.title, "Fire at household");
        assert_eq!(draft.description, "Home sensor detected fire");
        assert_eq!(draft.intensity, Some(4));
        assert_eq!(draft.location, Some(SENSOR_LOCATION));
        assert!(draft.police_help && draft.fire_help);
        assert!(!draft.ambulance_help && !draft.other_help);
    }

    #[test]
    fn configured_location_flows_into_the_emitted_draft() {
        let site = GeoPoint {
            latitude: 13.0827,
            longitude: 80.2707,
        };
        let mut trigger = SensorTrigger::at(site);
        let draft = trigger.observe(&FeedValue::Single(FIRE_SENTINEL)).unwrap();
        assert_eq!(draft.location, Some(site));
    }

    #[test]
    fn feed_value_accepts_both_wire_shapes() {
        let single: FeedValue = serde_json::from_str("1").unwrap();
        assert!(single.contains_sentinel());
        let map: FeedValue = serde_json::from_str(r#"{"kitchen": 0, "hallway": 1}"#).unwrap();
        assert!(map.contains_sentinel());
    }
}
