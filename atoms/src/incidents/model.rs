use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Workflow stage of an incident. Transitions are one-directional:
/// NEW -> PENDING -> DONE, no stage may be skipped, DONE is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IncidentStatus {
    New,
    Pending,
    Done,
}

impl IncidentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            IncidentStatus::New => "NEW",
            IncidentStatus::Pending => "PENDING",
            IncidentStatus::Done => "DONE",
        }
    }

    pub fn parse(s: &str) -> Option<IncidentStatus> {
        match s {
            "NEW" => Some(IncidentStatus::New),
            "PENDING" => Some(IncidentStatus::Pending),
            "DONE" => Some(IncidentStatus::Done),
            _ => None,
        }
    }

    /// The only legal next stage, or `None` once the incident is DONE.
    pub fn next(self) -> Option<IncidentStatus> {
        match self {
            IncidentStatus::New => Some(IncidentStatus::Pending),
            IncidentStatus::Pending => Some(IncidentStatus::Done),
            IncidentStatus::Done => None,
        }
    }
}

/// Status as read from the store. Normalization happens once, here, at
/// the read boundary: a wholly-absent field becomes `Known(NEW)`, while
/// a string outside the enum is preserved as `Unrecognized` so that the
/// status-count aggregation can exclude it from every bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusField {
    Known(IncidentStatus),
    Unrecognized(String),
}

impl StatusField {
    pub fn from_stored(raw: Option<&str>) -> StatusField {
        match raw {
            None => StatusField::Known(IncidentStatus::New),
            Some(s) => match IncidentStatus::parse(s) {
                Some(status) => StatusField::Known(status),
                None => StatusField::Unrecognized(s.to_string()),
            },
        }
    }

    /// Display/workflow default: anything not recognized behaves as NEW.
    pub fn effective(&self) -> IncidentStatus {
        match self {
            StatusField::Known(status) => *status,
            StatusField::Unrecognized(_) => IncidentStatus::New,
        }
    }

    /// Enum value for bucketing, `None` for unrecognized strings.
    pub fn known(&self) -> Option<IncidentStatus> {
        match self {
            StatusField::Known(status) => Some(*status),
            StatusField::Unrecognized(_) => None,
        }
    }

    /// Sort key for the status-priority ordering. Unrecognized statuses
    /// sort last.
    pub fn sort_priority(&self) -> u8 {
        match self {
            StatusField::Known(IncidentStatus::New) => 1,
            StatusField::Known(IncidentStatus::Pending) => 2,
            StatusField::Known(IncidentStatus::Done) => 3,
            StatusField::Unrecognized(_) => 99,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StatusField::Known(status) => status.as_str(),
            StatusField::Unrecognized(s) => s,
        }
    }
}

impl Default for StatusField {
    fn default() -> Self {
        StatusField::Known(IncidentStatus::New)
    }
}

impl Serialize for StatusField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StatusField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(StatusField::from_stored(raw.as_deref()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// A reported emergency event, tracked through its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Severity self-report, 1-10.
    pub intensity: Option<u8>,
    /// Reporter device position at submission time; absent when the
    /// reporter denied geolocation.
    pub location: Option<GeoPoint>,
    /// Set once the photo upload completed; consumers show a
    /// placeholder when absent.
    pub image_url: Option<String>,
    /// Assigned at creation, never mutated.
    pub datetime: DateTime<Utc>,
    #[serde(default)]
    pub status: StatusField,
    pub police_help: bool,
    pub fire_help: bool,
    pub ambulance_help: bool,
    pub other_help: bool,
}

/// Draft submitted by the report form or the sensor-triggered reporter.
/// `id`, `datetime`, and `status` are assigned by the store client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateIncidentPayload {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub intensity: Option<u8>,
    pub location: Option<GeoPoint>,
    pub image_url: Option<String>,
    #[serde(default)]
    pub police_help: bool,
    #[serde(default)]
    pub fire_help: bool,
    #[serde(default)]
    pub ambulance_help: bool,
    #[serde(default)]
    pub other_help: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusPayload {
    pub status: IncidentStatus,
}

/// Pre-submit validation: title and description are the only required
/// fields. Returns one message per failing field; an empty list means
/// the draft may be submitted. No I/O happens before this passes.
pub fn validate_draft(payload: &CreateIncidentPayload) -> Vec<(&'static str, &'static str)> {
    let mut errors = Vec::new();
    if payload.title.trim().is_empty() {
        errors.push(("title", "Title is required."));
    }
    if payload.description.trim().is_empty() {
        errors.push(("description", "Description is required."));
    }
    errors
}

/// Parses a stored datetime string. The collection holds both RFC 3339
/// strings and bare ISO-8601 without an offset, so both are accepted.
pub fn parse_datetime_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    None
}

/// Store-native timestamps arrive as epoch seconds.
pub fn datetime_from_epoch_seconds(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_status_normalizes_to_new() {
        assert_eq!(
            StatusField::from_stored(None),
            StatusField::Known(IncidentStatus::New)
        );
    }

    #[test]
    fn unrecognized_status_is_preserved_but_behaves_as_new() {
        let status = StatusField::from_stored(Some("ESCALATED"));
        assert_eq!(status, StatusField::Unrecognized("ESCALATED".to_string()));
        assert_eq!(status.effective(), IncidentStatus::New);
        assert_eq!(status.known(), None);
        assert_eq!(status.sort_priority(), 99);
    }

    #[test]
    fn transitions_are_single_step_and_done_is_terminal() {
        assert_eq!(IncidentStatus::New.next(), Some(IncidentStatus::Pending));
        assert_eq!(IncidentStatus::Pending.next(), Some(IncidentStatus::Done));
        assert_eq!(IncidentStatus::Done.next(), None);
    }

    #[test]
    fn validates_required_fields() {
        let payload = CreateIncidentPayload {
            title: "  ".to_string(),
            description: String::new(),
            intensity: None,
            location: None,
            image_url: None,
            police_help: false,
            fire_help: false,
            ambulance_help: false,
            other_help: false,
        };
        let errors = validate_draft(&payload);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0], ("title", "Title is required."));
        assert_eq!(errors[1], ("description", "Description is required."));
    }

    #[test]
    fn accepts_both_datetime_representations() {
        let iso = parse_datetime_str("2023-03-06T12:30:00.000Z").unwrap();
        let bare = parse_datetime_str("2023-03-06T12:30:00").unwrap();
        assert_eq!(iso, bare);
        let epoch = datetime_from_epoch_seconds(iso.timestamp()).unwrap();
        assert_eq!(epoch, iso);
        assert!(parse_datetime_str("not-a-date").is_none());
    }

    #[test]
    fn status_round_trips_through_json() {
        let status: StatusField = serde_json::from_str("\"PENDING\"").unwrap();
        assert_eq!(status, StatusField::Known(IncidentStatus::Pending));
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"PENDING\"");
    }
}
