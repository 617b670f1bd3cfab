use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;

use beacon_atoms::error::Error;

const CONNECTION_PK: &str = "CONNECTION";

fn connection_sk(connection_id: &str) -> String {
    format!("CONNECTION#{}", connection_id)
}

/// Register a live WebSocket subscriber ($connect).
pub async fn register_connection(
    client: &DynamoClient,
    table_name: &str,
    connection_id: &str,
) -> Result<(), Error> {
    client
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(CONNECTION_PK.to_string()))
        .item("SK", AttributeValue::S(connection_sk(connection_id)))
        .item(
            "connected_at",
            AttributeValue::S(chrono::Utc::now().to_rfc3339()),
        )
        .send()
        .await
        .map_err(|e| Error::Store(format!("DynamoDB put_item error: {}", e)))?;
    Ok(())
}

/// Drop a subscriber, either on $disconnect or when the gateway reports
/// the connection gone during a push.
pub async fn remove_connection(
    client: &DynamoClient,
    table_name: &str,
    connection_id: &str,
) -> Result<(), Error> {
    client
        .delete_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(CONNECTION_PK.to_string()))
        .key("SK", AttributeValue::S(connection_sk(connection_id)))
        .send()
        .await
        .map_err(|e| Error::Store(format!("DynamoDB delete_item error: {}", e)))?;
    Ok(())
}

/// All currently registered connection ids.
pub async fn list_connections(
    client: &DynamoClient,
    table_name: &str,
) -> Result<Vec<String>, Error> {
    let result = client
        .query()
        .table_name(table_name)
        .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
        .expression_attribute_values(":pk", AttributeValue::S(CONNECTION_PK.to_string()))
        .expression_attribute_values(":sk_prefix", AttributeValue::S("CONNECTION#".to_string()))
        .send()
        .await
        .map_err(|e| Error::Store(format!("DynamoDB query error: {}", e)))?;

    let mut connections = Vec::new();
    for item in result.items() {
        if let Some(sk) = item.get("SK").and_then(|v| v.as_s().ok()) {
            if let Some(connection_id) = sk.strip_prefix("CONNECTION#") {
                connections.push(connection_id.to_string());
            }
        }
    }
    Ok(connections)
}
