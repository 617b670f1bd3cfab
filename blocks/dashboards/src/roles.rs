use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Serialize;

use beacon_atoms::error::error_response;
use beacon_atoms::incidents::model::Incident;
use beacon_atoms::incidents::views::{
    self, CategoryFilter, DateRange, MapMarker, StatusCounts,
};
use beacon_atoms::incidents::service;

/// Responder roles. Every role sees the same incident collection; the
/// role only drives navigation and labelling on the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponderRole {
    Police,
    FireBrigade,
    Ambulance,
    Ngo,
}

impl ResponderRole {
    pub fn parse(segment: &str) -> Option<ResponderRole> {
        match segment {
            "police" => Some(ResponderRole::Police),
            "firebrigade" => Some(ResponderRole::FireBrigade),
            "ambulance" => Some(ResponderRole::Ambulance),
            "ngo" => Some(ResponderRole::Ngo),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ResponderRole::Police => "Police",
            ResponderRole::FireBrigade => "Fire Brigade",
            ResponderRole::Ambulance => "Ambulance",
            ResponderRole::Ngo => "NGO",
        }
    }
}

/// Everything one role dashboard renders in a single response: stat
/// cards over the full collection, the filtered and status-sorted list,
/// and the replacement marker set for the map pane.
#[derive(Debug, Serialize)]
pub struct DashboardPayload {
    pub role: ResponderRole,
    pub role_label: &'static str,
    pub counts: StatusCounts,
    pub incidents: Vec<Incident>,
    pub markers: Vec<MapMarker>,
}

/// GET /dashboards/{role}?category=&range=
pub async fn role_dashboard(
    client: &DynamoClient,
    table_name: &str,
    role: ResponderRole,
    category: Option<&str>,
    range: Option<&str>,
) -> Result<Response<Body>, Error> {
    let category = match category.map(CategoryFilter::parse_label) {
        Some(None) => return bad_request(format!("unknown category '{}'", category.unwrap_or(""))),
        Some(Some(filter)) => filter,
        None => CategoryFilter::All,
    };
    let range = match range.map(DateRange::parse_label) {
        Some(None) => return bad_request(format!("unknown range '{}'", range.unwrap_or(""))),
        Some(Some(range)) => range,
        None => DateRange::AllTime,
    };

    let all = match service::list_incidents(client, table_name).await {
        Ok(incidents) => incidents,
        Err(e) => {
            tracing::error!("Failed to load {} dashboard: {}", role.label(), e);
            return error_response(&e);
        }
    };

    // Counts and markers always reflect the full collection; only the
    // card list respects the tab and date filters.
    let counts = views::status_counts(&all);
    let markers = views::map_markers(&all);
    let filtered = views::filter_by_range(&all, range, chrono::Utc::now());
    let filtered = views::filter_by_category(&filtered, category);
    let incidents = views::status_priority_sort(&filtered);

    let payload = DashboardPayload {
        role,
        role_label: role.label(),
        counts,
        incidents,
        markers,
    };

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .body(serde_json::to_string(&payload)?.into())
        .map_err(Box::new)?)
}

fn bad_request(message: String) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .header("Content-Type", "application/json")
        .body(serde_json::json!({ "error": message }).to_string().into())
        .map_err(Box::new)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_role_segment() {
        assert_eq!(ResponderRole::parse("police"), Some(ResponderRole::Police));
        assert_eq!(
            ResponderRole::parse("firebrigade"),
            Some(ResponderRole::FireBrigade)
        );
        assert_eq!(
            ResponderRole::parse("ambulance"),
            Some(ResponderRole::Ambulance)
        );
        assert_eq!(ResponderRole::parse("ngo"), Some(ResponderRole::Ngo));
        assert_eq!(ResponderRole::parse("admin"), None);
    }
}
