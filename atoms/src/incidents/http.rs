use aws_sdk_dynamodb::Client as DynamoClient;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Deserialize;

use super::model::{CreateIncidentPayload, UpdateStatusPayload};
use super::service::PhotoUpload;
use super::{model, service, views};
use crate::error::error_response;

fn json_response(status: StatusCode, body: String) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(body.into())
        .map_err(Box::new)?)
}

/// GET /incidents?category=&range=&limit=
///
/// Returns the collection newest-first, then applies the list-page
/// derivations: category tab, date bucket, status-priority sort.
pub async fn list_incidents(
    client: &DynamoClient,
    table_name: &str,
    category: Option<&str>,
    range: Option<&str>,
    limit: Option<usize>,
) -> Result<Response<Body>, Error> {
    let incidents = match service::list_incidents(client, table_name).await {
        Ok(incidents) => incidents,
        Err(e) => {
            tracing::error!("Failed to list incidents: {}", e);
            return error_response(&e);
        }
    };

    let category = match category {
        Some(label) => match views::CategoryFilter::parse_label(label) {
            Some(filter) => filter,
            None => {
                return json_response(
                    StatusCode::BAD_REQUEST,
                    serde_json::json!({"error": format!("unknown category '{}'", label)})
                        .to_string(),
                )
            }
        },
        None => views::CategoryFilter::All,
    };
    let range = match range {
        Some(label) => match views::DateRange::parse_label(label) {
            Some(range) => range,
            None => {
                return json_response(
                    StatusCode::BAD_REQUEST,
                    serde_json::json!({"error": format!("unknown range '{}'", label)}).to_string(),
                )
            }
        },
        None => views::DateRange::AllTime,
    };

    let filtered = views::filter_by_range(&incidents, range, chrono::Utc::now());
    let filtered = views::filter_by_category(&filtered, category);
    let mut sorted = views::status_priority_sort(&filtered);
    if let Some(limit) = limit {
        sorted.truncate(limit);
    }

    let counts = views::status_counts(&incidents);
    json_response(
        StatusCode::OK,
        serde_json::json!({ "incidents": sorted, "counts": counts }).to_string(),
    )
}

/// GET /incidents/recent?limit= - the dashboard's "recent accidents"
/// panel, datetime descending.
pub async fn recent_incidents(
    client: &DynamoClient,
    table_name: &str,
    limit: usize,
) -> Result<Response<Body>, Error> {
    match service::fetch_recent(client, table_name, limit).await {
        Ok(incidents) => json_response(
            StatusCode::OK,
            serde_json::json!({ "incidents": incidents }).to_string(),
        ),
        Err(e) => {
            tracing::error!("Failed to fetch recent incidents: {}", e);
            error_response(&e)
        }
    }
}

/// GET /incidents/{id} - detail view payload: the incident plus the
/// derived badge and the action the card may offer.
pub async fn get_incident(
    client: &DynamoClient,
    table_name: &str,
    incident_id: &str,
) -> Result<Response<Body>, Error> {
    match service::get_incident(client, table_name, incident_id).await {
        Ok(incident) => {
            let badge = views::status_badge(&incident.status);
            let next_action = views::next_action(&incident.status);
            json_response(
                StatusCode::OK,
                serde_json::json!({
                    "incident": incident,
                    "badge": badge,
                    "next_action": next_action,
                })
                .to_string(),
            )
        }
        Err(e) => error_response(&e),
    }
}

/// Inline photo attached to a report submission.
#[derive(Debug, Deserialize)]
pub struct PhotoRequest {
    pub filename: String,
    pub data_base64: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitReportRequest {
    #[serde(flatten)]
    pub draft: CreateIncidentPayload,
    pub photo: Option<PhotoRequest>,
}

/// POST /incidents - the report submission. Field validation happens
/// before any I/O. A draft may carry an inline photo, in which case the
/// upload must resolve before the document write; a draft whose photo
/// was staged earlier via POST /uploads arrives with its final image
/// URL instead.
pub async fn create_incident<U, UFut>(
    client: &DynamoClient,
    table_name: &str,
    body: &[u8],
    uploader: U,
) -> Result<Response<Body>, Error>
where
    U: FnOnce(PhotoUpload) -> UFut,
    UFut: std::future::Future<Output = Result<String, crate::Error>>,
{
    let request: SubmitReportRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                serde_json::json!({"error": format!("invalid payload: {}", e)}).to_string(),
            )
        }
    };

    let field_errors = model::validate_draft(&request.draft);
    if !field_errors.is_empty() {
        let mut errors = serde_json::Map::new();
        for (field, message) in field_errors {
            errors.insert(field.to_string(), serde_json::Value::String(message.to_string()));
        }
        return json_response(
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "errors": errors }).to_string(),
        );
    }

    let photo = match request.photo {
        Some(photo) => match STANDARD.decode(&photo.data_base64) {
            Ok(bytes) => Some(PhotoUpload {
                filename: photo.filename,
                bytes,
                content_type: photo.content_type,
            }),
            Err(e) => {
                return json_response(
                    StatusCode::BAD_REQUEST,
                    serde_json::json!({"error": format!("invalid base64 photo: {}", e)})
                        .to_string(),
                )
            }
        },
        None => None,
    };

    match service::submit_report(client, table_name, request.draft, photo, uploader).await {
        Ok(incident) => {
            tracing::info!("Created incident {}", incident.id);
            json_response(StatusCode::CREATED, serde_json::to_string(&incident)?)
        }
        Err(e) => {
            tracing::error!("Failed to create incident: {}", e);
            error_response(&e)
        }
    }
}

/// POST /incidents/{id}/status - the card action button. Body carries
/// the stage the button advances to; anything but the single legal next
/// step is rejected.
pub async fn advance_status(
    client: &DynamoClient,
    table_name: &str,
    incident_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let payload: UpdateStatusPayload = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                serde_json::json!({"error": format!("invalid payload: {}", e)}).to_string(),
            )
        }
    };

    match service::update_status(client, table_name, incident_id, payload.status).await {
        Ok(incident) => {
            tracing::info!(
                "Incident {} advanced to {}",
                incident.id,
                incident.status.as_str()
            );
            json_response(StatusCode::OK, serde_json::to_string(&incident)?)
        }
        Err(e) => {
            tracing::warn!("Status update rejected for {}: {}", incident_id, e);
            error_response(&e)
        }
    }
}
