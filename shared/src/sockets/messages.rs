use serde::Serialize;

use beacon_atoms::incidents::model::Incident;

/// Broadcast message pushed to every live subscriber whenever the
/// incident collection changes. Each emission carries the full,
/// re-sorted collection; subscribers must treat it as a replacement
/// snapshot, never a delta.
#[derive(Debug, Serialize)]
pub struct SnapshotMessage {
    pub r#type: String,
    pub incidents: Vec<Incident>,
}

impl SnapshotMessage {
    pub fn new(incidents: Vec<Incident>) -> SnapshotMessage {
        SnapshotMessage {
            r#type: "incidents_snapshot".to_string(),
            incidents,
        }
    }
}
