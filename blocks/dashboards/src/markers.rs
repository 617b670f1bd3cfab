use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_http::{http::StatusCode, Body, Error, Response};

use beacon_atoms::error::error_response;
use beacon_atoms::incidents::{service, views};

/// GET /markers - the map pane's replacement marker set. The client
/// removes every existing marker and draws exactly this list, so stale
/// pins can never linger after a status change.
pub async fn list_markers(
    client: &DynamoClient,
    table_name: &str,
) -> Result<Response<Body>, Error> {
    let incidents = match service::list_incidents(client, table_name).await {
        Ok(incidents) => incidents,
        Err(e) => {
            tracing::error!("Failed to load markers: {}", e);
            return error_response(&e);
        }
    };

    let markers = views::map_markers(&incidents);
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .body(serde_json::json!({ "markers": markers }).to_string().into())
        .map_err(Box::new)?)
}
