use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::Deserialize;
use std::env;
use std::sync::{Arc, Mutex};

use beacon_atoms::incidents::model::GeoPoint;
use beacon_atoms::incidents::service;
use beacon_atoms::sensor::{FeedValue, SensorTrigger, SENSOR_LOCATION};

/// One delivery from the realtime sensor feed: the watched node's
/// current value, either a single reading or per-sensor readings.
#[derive(Debug, Deserialize)]
struct SensorEvent {
    data: FeedValue,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::tracing::init_default_subscriber();

    let config = aws_config::load_from_env().await;
    let dynamo_client = aws_sdk_dynamodb::Client::new(&config);
    let table_name = env::var("TABLE_NAME").unwrap_or_else(|_| "beacon".to_string());

    // The deployment site defaults to the pilot household.
    let location = GeoPoint {
        latitude: env_coord("SENSOR_LOCATION_LAT", SENSOR_LOCATION.latitude),
        longitude: env_coord("SENSOR_LOCATION_LON", SENSOR_LOCATION.longitude),
    };

    // The one-shot latch lives for the whole warm process, so a burst
    // of sentinel readings still creates exactly one incident.
    let trigger = Arc::new(Mutex::new(SensorTrigger::at(location)));

    run(service_fn(move |event: LambdaEvent<SensorEvent>| {
        let dynamo_client = dynamo_client.clone();
        let table_name = table_name.clone();
        let trigger = trigger.clone();
        async move { handle_reading(event, &dynamo_client, &table_name, &trigger).await }
    }))
    .await
}

fn env_coord(name: &str, default: f64) -> f64 {
    env::var(name).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

async fn handle_reading(
    event: LambdaEvent<SensorEvent>,
    dynamo_client: &aws_sdk_dynamodb::Client,
    table_name: &str,
    trigger: &Mutex<SensorTrigger>,
) -> Result<serde_json::Value, Error> {
    // The guard must not be held across the store call.
    let draft = {
        let mut trigger = trigger.lock().expect("trigger lock poisoned");
        trigger.observe(&event.payload.data)
    };

    let Some(draft) = draft else {
        return Ok(serde_json::json!({ "created": false }));
    };

    tracing::info!("Fire detected! Creating incident from sensor feed.");
    match service::create_incident(dynamo_client, table_name, draft).await {
        Ok(incident) => {
            tracing::info!("Created sensor-triggered incident {}", incident.id);
            Ok(serde_json::json!({ "created": true, "incident_id": incident.id }))
        }
        Err(e) => {
            // Re-arm so the next qualifying reading retries the create.
            // The invocation itself succeeds; a runtime-level retry
            // would replay the same reading against a Fired latch.
            tracing::error!("Failed to create sensor-triggered incident: {}", e);
            let mut trigger = trigger.lock().expect("trigger lock poisoned");
            trigger.rearm();
            Ok(serde_json::json!({ "created": false, "error": e.to_string() }))
        }
    }
}
