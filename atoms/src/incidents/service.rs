use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::model::{
    datetime_from_epoch_seconds, parse_datetime_str, CreateIncidentPayload, GeoPoint, Incident,
    IncidentStatus, StatusField,
};
use crate::error::Error;

const INCIDENT_PK: &str = "INCIDENT";

fn incident_sk(id: &str) -> String {
    format!("INCIDENT#{}", id)
}

/// Load the full incident collection, newest first (pure domain logic,
/// no HTTP). Ordering is applied here rather than in the store; the
/// collection is small and every caller wants the same descending
/// datetime order.
pub async fn list_incidents(
    client: &DynamoClient,
    table_name: &str,
) -> Result<Vec<Incident>, Error> {
    let result = client
        .query()
        .table_name(table_name)
        .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
        .expression_attribute_values(":pk", AttributeValue::S(INCIDENT_PK.to_string()))
        .expression_attribute_values(":sk_prefix", AttributeValue::S("INCIDENT#".to_string()))
        .send()
        .await
        .map_err(|e| Error::Store(format!("DynamoDB query error: {}", e)))?;

    let mut incidents = Vec::new();
    for item in result.items() {
        match from_item(item) {
            Some(incident) => incidents.push(incident),
            None => tracing::warn!("Skipping malformed incident item: {:?}", item.get("SK")),
        }
    }

    incidents.sort_by(|a, b| b.datetime.cmp(&a.datetime));
    Ok(incidents)
}

/// One-shot read of the N most recent incidents.
pub async fn fetch_recent(
    client: &DynamoClient,
    table_name: &str,
    limit: usize,
) -> Result<Vec<Incident>, Error> {
    let mut incidents = list_incidents(client, table_name).await?;
    incidents.truncate(limit);
    Ok(incidents)
}

pub async fn get_incident(
    client: &DynamoClient,
    table_name: &str,
    incident_id: &str,
) -> Result<Incident, Error> {
    let result = client
        .get_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(INCIDENT_PK.to_string()))
        .key("SK", AttributeValue::S(incident_sk(incident_id)))
        .send()
        .await
        .map_err(|e| Error::Store(format!("DynamoDB get_item error: {}", e)))?;

    result
        .item()
        .and_then(from_item)
        .ok_or_else(|| Error::NotFound(format!("incident {}", incident_id)))
}

/// Create a new incident. The store assigns the id, the creation
/// datetime, and status NEW; the draft never carries any of the three.
pub async fn create_incident(
    client: &DynamoClient,
    table_name: &str,
    payload: CreateIncidentPayload,
) -> Result<Incident, Error> {
    let errors = super::model::validate_draft(&payload);
    if let Some((field, message)) = errors.first() {
        return Err(Error::Validation(format!("{}: {}", field, message)));
    }

    let incident_id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now();

    let mut builder = client
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(INCIDENT_PK.to_string()))
        .item("SK", AttributeValue::S(incident_sk(&incident_id)))
        .item("title", AttributeValue::S(payload.title.clone()))
        .item("description", AttributeValue::S(payload.description.clone()))
        .item("datetime", AttributeValue::S(now.to_rfc3339()))
        .item("status", AttributeValue::S(IncidentStatus::New.as_str().to_string()))
        .item("police_help", AttributeValue::Bool(payload.police_help))
        .item("fire_help", AttributeValue::Bool(payload.fire_help))
        .item("ambulance_help", AttributeValue::Bool(payload.ambulance_help))
        .item("other_help", AttributeValue::Bool(payload.other_help));

    if let Some(intensity) = payload.intensity {
        builder = builder.item("intensity", AttributeValue::N(intensity.to_string()));
    }
    if let Some(location) = &payload.location {
        builder = builder.item("location", location_attr(location));
    }
    if let Some(image_url) = &payload.image_url {
        builder = builder.item("image_url", AttributeValue::S(image_url.clone()));
    }

    builder
        .send()
        .await
        .map_err(|e| Error::Store(format!("DynamoDB put_item error: {}", e)))?;

    Ok(Incident {
        id: incident_id,
        title: payload.title,
        description: payload.description,
        intensity: payload.intensity,
        location: payload.location,
        image_url: payload.image_url,
        datetime: now,
        status: StatusField::Known(IncidentStatus::New),
        police_help: payload.police_help,
        fire_help: payload.fire_help,
        ambulance_help: payload.ambulance_help,
        other_help: payload.other_help,
    })
}

/// Advance an incident one stage. The requested status must be the
/// single legal next step from the current effective status; DONE
/// accepts no further action. The write itself is unconditional, so
/// two responders racing on the same incident end last-writer-wins
/// with no conflict detection.
pub async fn update_status(
    client: &DynamoClient,
    table_name: &str,
    incident_id: &str,
    requested: IncidentStatus,
) -> Result<Incident, Error> {
    let mut incident = get_incident(client, table_name, incident_id).await?;

    let current = incident.status.effective();
    let next = current.next().ok_or_else(|| {
        Error::Transition(format!("incident {} is already DONE", incident_id))
    })?;
    if requested != next {
        return Err(Error::Transition(format!(
            "only {} is reachable from {}",
            next.as_str(),
            current.as_str()
        )));
    }

    client
        .update_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(INCIDENT_PK.to_string()))
        .key("SK", AttributeValue::S(incident_sk(incident_id)))
        .update_expression("SET #status = :status")
        .expression_attribute_names("#status", "status")
        .expression_attribute_values(":status", AttributeValue::S(next.as_str().to_string()))
        .send()
        .await
        .map_err(|e| Error::Store(format!("DynamoDB update_item error: {}", e)))?;

    incident.status = StatusField::Known(next);
    Ok(incident)
}

/// A captured photo riding along with a report submission.
#[derive(Debug)]
pub struct PhotoUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// The report submission sequence. When a photo rides along, its
/// upload must resolve before the incident write begins; the resulting
/// URL lands on the draft. An upload failure aborts the whole
/// submission and no record is created. The uploader is passed in so
/// the blob store stays out of this crate.
pub async fn submit_report<U, UFut>(
    client: &DynamoClient,
    table_name: &str,
    mut draft: CreateIncidentPayload,
    photo: Option<PhotoUpload>,
    uploader: U,
) -> Result<Incident, Error>
where
    U: FnOnce(PhotoUpload) -> UFut,
    UFut: std::future::Future<Output = Result<String, Error>>,
{
    if let Some(photo) = photo {
        draft.image_url = Some(uploader(photo).await?);
    }
    create_incident(client, table_name, draft).await
}

fn location_attr(location: &GeoPoint) -> AttributeValue {
    let mut map = HashMap::new();
    map.insert(
        "latitude".to_string(),
        AttributeValue::N(location.latitude.to_string()),
    );
    map.insert(
        "longitude".to_string(),
        AttributeValue::N(location.longitude.to_string()),
    );
    AttributeValue::M(map)
}

/// Parse a stored item into an `Incident`, applying the normalization
/// rules once at the read boundary: missing status becomes NEW, the
/// datetime attribute may be either an epoch-seconds number or an
/// ISO-8601 string. Items with no parseable datetime are dropped (they
/// cannot take part in any ordered view).
pub fn from_item(item: &HashMap<String, AttributeValue>) -> Option<Incident> {
    let sk = item.get("SK").and_then(|v| v.as_s().ok())?;
    let incident_id = sk.strip_prefix("INCIDENT#")?;
    let datetime = parse_datetime_attr(item.get("datetime")?)?;

    let location = item.get("location").and_then(|v| v.as_m().ok()).and_then(|m| {
        let latitude = m.get("latitude")?.as_n().ok()?.parse().ok()?;
        let longitude = m.get("longitude")?.as_n().ok()?.parse().ok()?;
        Some(GeoPoint {
            latitude,
            longitude,
        })
    });

    Some(Incident {
        id: incident_id.to_string(),
        title: item
            .get("title")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default(),
        description: item
            .get("description")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
            .unwrap_or_default(),
        intensity: item
            .get("intensity")
            .and_then(|v| v.as_n().ok())
            .and_then(|n| n.parse().ok()),
        location,
        image_url: item
            .get("image_url")
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string()),
        datetime,
        status: StatusField::from_stored(
            item.get("status").and_then(|v| v.as_s().ok()).map(|s| s.as_str()),
        ),
        police_help: item
            .get("police_help")
            .and_then(|v| v.as_bool().ok())
            .copied()
            .unwrap_or(false),
        fire_help: item
            .get("fire_help")
            .and_then(|v| v.as_bool().ok())
            .copied()
            .unwrap_or(false),
        ambulance_help: item
            .get("ambulance_help")
            .and_then(|v| v.as_bool().ok())
            .copied()
            .unwrap_or(false),
        other_help: item
            .get("other_help")
            .and_then(|v| v.as_bool().ok())
            .copied()
            .unwrap_or(false),
    })
}

fn parse_datetime_attr(attr: &AttributeValue) -> Option<DateTime<Utc>> {
    if let Ok(n) = attr.as_n() {
        return datetime_from_epoch_seconds(n.parse::<f64>().ok()? as i64);
    }
    parse_datetime_str(attr.as_s().ok()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_item(id: &str, datetime: AttributeValue) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();
        item.insert("PK".to_string(), AttributeValue::S(INCIDENT_PK.to_string()));
        item.insert("SK".to_string(), AttributeValue::S(incident_sk(id)));
        item.insert("title".to_string(), AttributeValue::S("Gas leak".to_string()));
        item.insert(
            "description".to_string(),
            AttributeValue::S("Smell near market".to_string()),
        );
        item.insert("datetime".to_string(), datetime);
        item
    }

    #[test]
    fn parses_iso_datetime_and_defaults_missing_fields() {
        let item = base_item("abc", AttributeValue::S("2023-03-06T12:30:00.000Z".to_string()));
        let incident = from_item(&item).unwrap();
        assert_eq!(incident.id, "abc");
        assert_eq!(incident.status, StatusField::Known(IncidentStatus::New));
        assert_eq!(incident.location, None);
        assert_eq!(incident.image_url, None);
        assert!(!incident.police_help);
    }

    #[test]
    fn parses_epoch_datetime_and_location_map() {
        let mut item = base_item("abc", AttributeValue::N("1678105800".to_string()));
        let mut location = HashMap::new();
        location.insert("latitude".to_string(), AttributeValue::N("12.9".to_string()));
        location.insert("longitude".to_string(), AttributeValue::N("77.6".to_string()));
        item.insert("location".to_string(), AttributeValue::M(location));
        item.insert("status".to_string(), AttributeValue::S("PENDING".to_string()));

        let incident = from_item(&item).unwrap();
        assert_eq!(incident.datetime.timestamp(), 1_678_105_800);
        assert_eq!(
            incident.location,
            Some(GeoPoint {
                latitude: 12.9,
                longitude: 77.6
            })
        );
        assert_eq!(incident.status, StatusField::Known(IncidentStatus::Pending));
    }

    #[test]
    fn drops_items_without_a_parseable_datetime() {
        let item = base_item("abc", AttributeValue::S("not-a-date".to_string()));
        assert!(from_item(&item).is_none());
    }

    #[tokio::test]
    async fn upload_failure_aborts_the_submission_before_any_write() {
        // A client with no credentials or endpoint: any store call made
        // through it surfaces as Error::Store, so the Upload error below
        // proves the write was never attempted.
        let config = aws_sdk_dynamodb::Config::builder()
            .behavior_version(aws_sdk_dynamodb::config::BehaviorVersion::latest())
            .build();
        let client = DynamoClient::from_conf(config);

        let draft = CreateIncidentPayload {
            title: "Gas leak".to_string(),
            description: "Smell near market".to_string(),
            intensity: None,
            location: None,
            image_url: None,
            police_help: false,
            fire_help: true,
            ambulance_help: false,
            other_help: false,
        };
        let photo = PhotoUpload {
            filename: "scene.jpg".to_string(),
            bytes: vec![0xff, 0xd8],
            content_type: Some("image/jpeg".to_string()),
        };

        let result = submit_report(&client, "incidents-test", draft, Some(photo), |_| async {
            Err(Error::Upload("bucket unavailable".to_string()))
        })
        .await;

        match result {
            Err(Error::Upload(message)) => assert!(message.contains("bucket unavailable")),
            other => panic!("expected the upload error to surface unchanged, got {:?}", other),
        }
    }
}
