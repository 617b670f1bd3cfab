//! Pure derivations over an in-memory incident list. Nothing here
//! mutates its input; every function returns a fresh collection, so two
//! dashboards can derive independent views from the same snapshot.

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Serialize;

use super::model::{Incident, IncidentStatus, StatusField};

pub const MARKER_COLOR_NEW: &str = "#ef4444";
pub const MARKER_COLOR_PENDING: &str = "#f59e0b";

/// Stable sort by status priority: NEW first, then PENDING, then DONE,
/// unrecognized statuses last. The input arrives datetime-descending,
/// and ties keep that relative order.
pub fn status_priority_sort(incidents: &[Incident]) -> Vec<Incident> {
    let mut sorted = incidents.to_vec();
    sorted.sort_by_key(|incident| incident.status.sort_priority());
    sorted
}

/// User-facing category tabs on the list pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryFilter {
    All,
    Status(IncidentStatus),
}

impl CategoryFilter {
    /// Maps the tab labels ("All" / "New" / "Pending" / "Completed") to
    /// stored status values.
    pub fn parse_label(label: &str) -> Option<CategoryFilter> {
        match label.to_ascii_lowercase().as_str() {
            "all" => Some(CategoryFilter::All),
            "new" => Some(CategoryFilter::Status(IncidentStatus::New)),
            "pending" => Some(CategoryFilter::Status(IncidentStatus::Pending)),
            "completed" => Some(CategoryFilter::Status(IncidentStatus::Done)),
            _ => None,
        }
    }
}

/// Category tabs match the stored status exactly. An absent status was
/// already normalized to NEW at the read boundary and lands under the
/// "New" tab; an unrecognized status string matches no tab and shows
/// only under "All".
pub fn filter_by_category(incidents: &[Incident], filter: CategoryFilter) -> Vec<Incident> {
    match filter {
        CategoryFilter::All => incidents.to_vec(),
        CategoryFilter::Status(wanted) => incidents
            .iter()
            .filter(|incident| incident.status.known() == Some(wanted))
            .cloned()
            .collect(),
    }
}

/// Date buckets offered by the dashboard filter. Weeks start on Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    Today,
    Yesterday,
    ThisWeek,
    AllTime,
}

impl DateRange {
    pub fn parse_label(label: &str) -> Option<DateRange> {
        match label.to_ascii_lowercase().as_str() {
            "today" => Some(DateRange::Today),
            "yesterday" => Some(DateRange::Yesterday),
            "week" | "this_week" => Some(DateRange::ThisWeek),
            "all" | "all_time" => Some(DateRange::AllTime),
            _ => None,
        }
    }
}

pub fn filter_by_range(
    incidents: &[Incident],
    range: DateRange,
    now: DateTime<Utc>,
) -> Vec<Incident> {
    let today = now.date_naive();
    incidents
        .iter()
        .filter(|incident| {
            let date = incident.datetime.date_naive();
            match range {
                DateRange::Today => date == today,
                DateRange::Yesterday => Some(date) == today.pred_opt(),
                DateRange::ThisWeek => {
                    let monday =
                        today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
                    date >= monday && date <= today
                }
                DateRange::AllTime => true,
            }
        })
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub new: usize,
    pub pending: usize,
    pub done: usize,
}

/// Counts incidents per workflow stage. Unlike display defaulting, an
/// unrecognized status string lands in no bucket at all; only a
/// wholly-absent field (already normalized to NEW at the read boundary)
/// counts as NEW.
pub fn status_counts(incidents: &[Incident]) -> StatusCounts {
    incidents
        .iter()
        .fold(StatusCounts::default(), |mut counts, incident| {
            match incident.status.known() {
                Some(IncidentStatus::New) => counts.new += 1,
                Some(IncidentStatus::Pending) => counts.pending += 1,
                Some(IncidentStatus::Done) => counts.done += 1,
                None => {}
            }
            counts
        })
}

/// One map pin. The consumer replaces its whole marker set with each
/// derivation; there is no incremental diffing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapMarker {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub color: &'static str,
    pub title: String,
    pub description: String,
    pub status: String,
}

/// Markers for the dashboard map: located NEW and PENDING incidents
/// only. DONE incidents are omitted entirely, as are unrecognized
/// statuses.
pub fn map_markers(incidents: &[Incident]) -> Vec<MapMarker> {
    incidents
        .iter()
        .filter_map(|incident| {
            let status = incident.status.known()?;
            let color = match status {
                IncidentStatus::New => MARKER_COLOR_NEW,
                IncidentStatus::Pending => MARKER_COLOR_PENDING,
                IncidentStatus::Done => return None,
            };
            let location = incident.location.as_ref()?;
            Some(MapMarker {
                id: incident.id.clone(),
                latitude: location.latitude,
                longitude: location.longitude,
                color,
                title: incident.title.clone(),
                description: incident.description.clone(),
                status: status.as_str().to_string(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusBadge {
    pub label: &'static str,
    pub color: &'static str,
}

/// Card badge mapping. An unrecognized status renders a neutral badge
/// with the literal label "NEW" substituted for display.
pub fn status_badge(status: &StatusField) -> StatusBadge {
    match status {
        StatusField::Known(IncidentStatus::New) => StatusBadge {
            label: "NEW",
            color: "red",
        },
        StatusField::Known(IncidentStatus::Pending) => StatusBadge {
            label: "PENDING",
            color: "yellow",
        },
        StatusField::Known(IncidentStatus::Done) => StatusBadge {
            label: "DONE",
            color: "green",
        },
        StatusField::Unrecognized(_) => StatusBadge {
            label: "NEW",
            color: "gray",
        },
    }
}

/// Status the card's action button advances to, or `None` for the
/// disabled terminal control on DONE incidents.
pub fn next_action(status: &StatusField) -> Option<IncidentStatus> {
    status.effective().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incidents::model::GeoPoint;
    use chrono::TimeZone;

    fn incident(id: &str, status: StatusField, datetime: DateTime<Utc>) -> Incident {
        Incident {
            id: id.to_string(),
            title: format!("incident {id}"),
            description: "test".to_string(),
            intensity: Some(4),
            location: Some(GeoPoint {
                latitude: 12.9141,
                longitude: 74.856,
            }),
            image_url: None,
            datetime,
            status,
            police_help: false,
            fire_help: false,
            ambulance_help: false,
            other_help: false,
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn status_sort_is_stable() {
        let input = vec![
            incident("1", StatusField::Known(IncidentStatus::Pending), at(2024, 5, 3, 9)),
            incident("2", StatusField::Known(IncidentStatus::New), at(2024, 5, 2, 9)),
            incident("3", StatusField::Known(IncidentStatus::Pending), at(2024, 5, 1, 9)),
        ];
        let sorted = status_priority_sort(&input);
        let ids: Vec<&str> = sorted.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1", "3"]);
        // Input untouched.
        assert_eq!(input[0].id, "1");
    }

    #[test]
    fn unrecognized_status_sorts_last() {
        let input = vec![
            incident("1", StatusField::Unrecognized("ESCALATED".into()), at(2024, 5, 3, 9)),
            incident("2", StatusField::Known(IncidentStatus::Done), at(2024, 5, 2, 9)),
        ];
        let sorted = status_priority_sort(&input);
        assert_eq!(sorted[0].id, "2");
        assert_eq!(sorted[1].id, "1");
    }

    #[test]
    fn category_filter_matches_stored_status_exactly() {
        let input = vec![
            incident("1", StatusField::Known(IncidentStatus::Done), at(2024, 5, 3, 9)),
            incident("2", StatusField::Unrecognized("ESCALATED".into()), at(2024, 5, 2, 9)),
            // A document with no status field, normalized on read.
            incident("3", StatusField::from_stored(None), at(2024, 5, 1, 9)),
        ];
        let filter = CategoryFilter::parse_label("New").unwrap();
        let filtered = filter_by_category(&input, filter);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "3");
        // The unrecognized status matches no tab at all.
        let completed = CategoryFilter::parse_label("Completed").unwrap();
        assert_eq!(filter_by_category(&input, completed).len(), 1);
        let pending = CategoryFilter::parse_label("Pending").unwrap();
        assert!(filter_by_category(&input, pending).is_empty());
        assert_eq!(filter_by_category(&input, CategoryFilter::All).len(), 3);
        assert!(CategoryFilter::parse_label("archived").is_none());
    }

    #[test]
    fn today_bucket_uses_calendar_day_boundaries() {
        let now = at(2024, 5, 3, 0);
        let input = vec![
            // Same calendar day, any time.
            incident("1", StatusField::default(), at(2024, 5, 3, 23)),
            // Previous calendar day, just over 24h earlier than 23:00.
            incident("2", StatusField::default(), at(2024, 5, 2, 23)),
        ];
        let today = filter_by_range(&input, DateRange::Today, now);
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].id, "1");
        let yesterday = filter_by_range(&input, DateRange::Yesterday, now);
        assert_eq!(yesterday.len(), 1);
        assert_eq!(yesterday[0].id, "2");
    }

    #[test]
    fn this_week_starts_on_monday() {
        // 2024-05-03 is a Friday; the week began Monday 2024-04-29.
        let now = at(2024, 5, 3, 12);
        let input = vec![
            incident("mon", StatusField::default(), at(2024, 4, 29, 0)),
            incident("sun", StatusField::default(), at(2024, 4, 28, 23)),
        ];
        let week = filter_by_range(&input, DateRange::ThisWeek, now);
        assert_eq!(week.len(), 1);
        assert_eq!(week[0].id, "mon");
        assert_eq!(filter_by_range(&input, DateRange::AllTime, now).len(), 2);
    }

    #[test]
    fn counts_exclude_unrecognized_but_default_absent_to_new() {
        let input = vec![
            // from_stored(None) models a document with no status field.
            incident("1", StatusField::from_stored(None), at(2024, 5, 3, 9)),
            incident("2", StatusField::Known(IncidentStatus::Pending), at(2024, 5, 3, 9)),
            incident("3", StatusField::Known(IncidentStatus::Done), at(2024, 5, 3, 9)),
            incident("4", StatusField::Unrecognized("ESCALATED".into()), at(2024, 5, 3, 9)),
        ];
        let counts = status_counts(&input);
        assert_eq!(
            counts,
            StatusCounts {
                new: 1,
                pending: 1,
                done: 1
            }
        );
    }

    #[test]
    fn markers_cover_exactly_located_new_and_pending() {
        let mut unlocated = incident("unlocated", StatusField::default(), at(2024, 5, 3, 9));
        unlocated.location = None;
        let mut input = vec![
            incident("new", StatusField::default(), at(2024, 5, 3, 9)),
            incident("pending", StatusField::Known(IncidentStatus::Pending), at(2024, 5, 3, 9)),
            incident("done", StatusField::Known(IncidentStatus::Done), at(2024, 5, 3, 9)),
            unlocated,
        ];
        let markers = map_markers(&input);
        let ids: Vec<&str> = markers.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "pending"]);
        assert_eq!(markers[0].color, MARKER_COLOR_NEW);
        assert_eq!(markers[1].color, MARKER_COLOR_PENDING);

        // Advancing an incident to DONE removes its marker on the next
        // full-replace derivation; unchanged incidents keep exactly one.
        input[1].status = StatusField::Known(IncidentStatus::Done);
        let after = map_markers(&input);
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].id, "new");
    }

    #[test]
    fn badge_and_action_for_unrecognized_status() {
        let status = StatusField::Unrecognized("ESCALATED".into());
        let badge = status_badge(&status);
        assert_eq!(badge.label, "NEW");
        assert_eq!(badge.color, "gray");
        assert_eq!(next_action(&status), Some(IncidentStatus::Pending));
        assert_eq!(
            next_action(&StatusField::Known(IncidentStatus::Done)),
            None
        );
    }
}
