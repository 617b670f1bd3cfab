use aws_lambda_events::event::dynamodb::Event as DynamoStreamEvent;
use aws_sdk_apigatewaymanagement::primitives::Blob;
use aws_sdk_apigatewaymanagement::Client as ApiGatewayClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use std::env;

use beacon_atoms::incidents::service;
use beacon_shared::sockets::connections;
use beacon_shared::sockets::messages::SnapshotMessage;

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::tracing::init_default_subscriber();

    let config = aws_config::load_from_env().await;
    let dynamo_client = DynamoClient::new(&config);

    let ws_endpoint = env::var("WS_ENDPOINT").expect("WS_ENDPOINT must be set");
    let apigw_config = aws_sdk_apigatewaymanagement::config::Builder::from(&config)
        .endpoint_url(ws_endpoint)
        .build();
    let apigw_client = ApiGatewayClient::from_conf(apigw_config);

    let table_name = env::var("TABLE_NAME").unwrap_or_else(|_| "beacon".to_string());

    run(service_fn(move |event: LambdaEvent<Value>| {
        let dynamo_client = dynamo_client.clone();
        let apigw_client = apigw_client.clone();
        let table_name = table_name.clone();
        async move { function_handler(event, &dynamo_client, &apigw_client, &table_name).await }
    }))
    .await
}

/// One binary serves both event sources: DynamoDB stream batches (push a
/// fresh snapshot to every subscriber) and WebSocket lifecycle routes
/// ($connect / $disconnect maintain the subscriber registry).
async fn function_handler(
    event: LambdaEvent<Value>,
    dynamo_client: &DynamoClient,
    apigw_client: &ApiGatewayClient,
    table_name: &str,
) -> Result<Value, Error> {
    let payload = event.payload;

    if let Some(records) = payload.get("Records").and_then(|v| v.as_array()) {
        // Connection registry writes also land on the stream; those alone
        // do not warrant a broadcast.
        let touches_incidents = records.iter().any(|r| {
            r.pointer("/dynamodb/Keys/SK/S")
                .and_then(|v| v.as_str())
                .map(|sk| sk.starts_with("INCIDENT#"))
                .unwrap_or(false)
        });
        if !touches_incidents {
            return Ok(serde_json::json!({ "statusCode": 200, "pushed": 0 }));
        }

        let stream_event: DynamoStreamEvent = serde_json::from_value(payload)?;
        return handle_stream_batch(stream_event, dynamo_client, apigw_client, table_name).await;
    }

    let route_key = payload
        .pointer("/requestContext/routeKey")
        .and_then(|v| v.as_str());
    let connection_id = payload
        .pointer("/requestContext/connectionId")
        .and_then(|v| v.as_str());

    match (route_key, connection_id) {
        (Some("$connect"), Some(id)) => {
            tracing::info!("WebSocket connect: {}", id);
            connections::register_connection(dynamo_client, table_name, id).await?;
            Ok(serde_json::json!({ "statusCode": 200 }))
        }
        (Some("$disconnect"), Some(id)) => {
            tracing::info!("WebSocket disconnect: {}", id);
            connections::remove_connection(dynamo_client, table_name, id).await?;
            Ok(serde_json::json!({ "statusCode": 200 }))
        }
        _ => {
            tracing::warn!("Unrecognized event shape, ignoring");
            Ok(serde_json::json!({ "statusCode": 200 }))
        }
    }
}

/// Any change to the incident collection pushes the whole collection
/// again. Subscribers replace their copy wholesale rather than patching
/// individual records.
async fn handle_stream_batch(
    stream_event: DynamoStreamEvent,
    dynamo_client: &DynamoClient,
    apigw_client: &ApiGatewayClient,
    table_name: &str,
) -> Result<Value, Error> {
    let mut inserts = 0usize;
    let mut modifies = 0usize;
    for record in &stream_event.records {
        match record.event_name.as_str() {
            "INSERT" => inserts += 1,
            "MODIFY" => modifies += 1,
            _ => {}
        }
    }

    tracing::info!(
        "Incident stream batch: {} inserts, {} modifies",
        inserts,
        modifies
    );

    let incidents = service::list_incidents(dynamo_client, table_name).await?;
    let message = serde_json::to_vec(&SnapshotMessage::new(incidents))?;

    let connection_ids = connections::list_connections(dynamo_client, table_name).await?;
    let mut pushed = 0usize;
    for connection_id in connection_ids {
        let result = apigw_client
            .post_to_connection()
            .connection_id(&connection_id)
            .data(Blob::new(message.clone()))
            .send()
            .await;

        match result {
            Ok(_) => pushed += 1,
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_gone_exception() {
                    tracing::info!("Connection {} gone, pruning", connection_id);
                    connections::remove_connection(dynamo_client, table_name, &connection_id)
                        .await?;
                } else {
                    tracing::warn!("Push to {} failed: {}", connection_id, service_err);
                }
            }
        }
    }

    Ok(serde_json::json!({ "statusCode": 200, "pushed": pushed }))
}
