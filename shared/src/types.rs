// ========== INCIDENT ==========
pub use beacon_atoms::incidents::model::{
    CreateIncidentPayload, GeoPoint, Incident, IncidentStatus, StatusField, UpdateStatusPayload,
};

// ========== VIEWS ==========
pub use beacon_atoms::incidents::views::{MapMarker, StatusBadge, StatusCounts};

// ========== SENSOR ==========
pub use beacon_atoms::sensor::{FeedValue, SensorTrigger, TriggerState};
