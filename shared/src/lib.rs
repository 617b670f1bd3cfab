pub mod auth;
pub mod sockets;
pub mod storage;
pub mod types;

use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use aws_sdk_s3::Client as S3Client;

/// Shared AWS clients, constructed once per process and passed to the
/// components that need them.
pub struct AppState {
    pub dynamo_client: DynamoClient,
    pub s3_client: S3Client,
    pub cognito_client: CognitoClient,
}

impl AppState {
    pub async fn from_env() -> AppState {
        let config = aws_config::load_from_env().await;
        AppState {
            dynamo_client: DynamoClient::new(&config),
            s3_client: S3Client::new(&config),
            cognito_client: CognitoClient::new(&config),
        }
    }
}
