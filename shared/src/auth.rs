//! Phone-based OTP login gate. The flow is an opaque Cognito
//! custom-auth exchange: the phone number starts a challenge, the SMS
//! code answers it, and the resulting access token rides in an HttpOnly
//! session cookie. Core incident logic only ever sees the
//! authenticated-user handle this module produces.

use aws_sdk_cognitoidentityprovider::types::{AuthFlowType, ChallengeNameType};
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Deserialize;
use sha2::Sha256;

pub const SESSION_COOKIE: &str = "beacon_session";

const SESSION_MAX_AGE_SECS: u32 = 3600;

const ALLOWED_ORIGINS: &[&str] = &["http://localhost:3000", "https://beacon-response.app"];

pub fn get_cors_origin(request_origin: Option<&str>) -> String {
    match request_origin {
        Some(origin) if ALLOWED_ORIGINS.contains(&origin) => origin.to_string(),
        _ => ALLOWED_ORIGINS[ALLOWED_ORIGINS.len() - 1].to_string(),
    }
}

/// Cognito SECRET_HASH: base64(HMAC-SHA256(client_secret, username + client_id)).
fn secret_hash(client_secret: &str, username: &str, client_id: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(client_secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(username.as_bytes());
    mac.update(client_id.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

pub struct AuthContext {
    pub user_id: String,
    pub set_cookies: Vec<String>,
}

#[derive(Deserialize)]
struct StartLoginRequest {
    phone: String,
}

#[derive(Deserialize)]
struct VerifyCodeRequest {
    phone: String,
    code: String,
    session: String,
}

fn json_response(status: StatusCode, body: String) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(body.into())
        .map_err(Box::new)?)
}

/// POST /auth/login - begin the OTP exchange. Returns the challenge
/// session the client must echo back together with the SMS code.
pub async fn start_login(
    client: &CognitoClient,
    client_id: &str,
    client_secret: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let req: StartLoginRequest = match serde_json::from_slice(body) {
        Ok(req) => req,
        Err(e) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                serde_json::json!({"error": format!("invalid payload: {}", e)}).to_string(),
            )
        }
    };

    let result = client
        .initiate_auth()
        .auth_flow(AuthFlowType::CustomAuth)
        .client_id(client_id)
        .auth_parameters("USERNAME", &req.phone)
        .auth_parameters("SECRET_HASH", secret_hash(client_secret, &req.phone, client_id))
        .send()
        .await;

    match result {
        Ok(output) => {
            let session = output.session().unwrap_or_default();
            json_response(
                StatusCode::OK,
                serde_json::json!({ "session": session }).to_string(),
            )
        }
        Err(e) => {
            tracing::warn!("OTP challenge initiation failed: {}", e);
            json_response(
                StatusCode::UNAUTHORIZED,
                serde_json::json!({"error": "Could not start login"}).to_string(),
            )
        }
    }
}

/// POST /auth/verify - answer the OTP challenge. On success the access
/// token is set as the session cookie.
pub async fn verify_code(
    client: &CognitoClient,
    client_id: &str,
    client_secret: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let req: VerifyCodeRequest = match serde_json::from_slice(body) {
        Ok(req) => req,
        Err(e) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                serde_json::json!({"error": format!("invalid payload: {}", e)}).to_string(),
            )
        }
    };

    let result = client
        .respond_to_auth_challenge()
        .client_id(client_id)
        .challenge_name(ChallengeNameType::CustomChallenge)
        .session(&req.session)
        .challenge_responses("USERNAME", &req.phone)
        .challenge_responses("ANSWER", &req.code)
        .challenge_responses(
            "SECRET_HASH",
            secret_hash(client_secret, &req.phone, client_id),
        )
        .send()
        .await;

    let access_token = match result {
        Ok(output) => output
            .authentication_result()
            .and_then(|r| r.access_token())
            .map(|t| t.to_string()),
        Err(e) => {
            tracing::warn!("OTP verification failed: {}", e);
            None
        }
    };

    match access_token {
        Some(token) => Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", "application/json")
            .header("Set-Cookie", session_cookie(&token))
            .body(serde_json::json!({"message": "ok"}).to_string().into())
            .map_err(Box::new)?),
        None => json_response(
            StatusCode::UNAUTHORIZED,
            serde_json::json!({"error": "Invalid code"}).to_string(),
        ),
    }
}

fn session_cookie(token: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; Secure; SameSite=None; Max-Age={}",
        SESSION_COOKIE, token, SESSION_MAX_AGE_SECS
    )
}

pub fn clear_cookie(name: &str) -> String {
    format!("{}=; Path=/; HttpOnly; Secure; SameSite=None; Max-Age=0", name)
}

fn cookie_value<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}

/// Resolve the session cookie to an authenticated-user handle. On
/// failure returns the 401 response the caller should pass through;
/// the operation behind the gate is never attempted.
pub async fn authenticate_cookie_request(
    client: &CognitoClient,
    cookie_header: Option<&str>,
) -> Result<AuthContext, Response<Body>> {
    let unauthorized = || {
        Response::builder()
            .status(StatusCode::UNAUTHORIZED)
            .header("Content-Type", "application/json")
            .body(
                serde_json::json!({"error": "Not authenticated"})
                    .to_string()
                    .into(),
            )
            .unwrap_or_default()
    };

    let token = match cookie_header.and_then(|h| cookie_value(h, SESSION_COOKIE)) {
        Some(token) if !token.is_empty() => token.to_string(),
        _ => return Err(unauthorized()),
    };

    match client.get_user().access_token(&token).send().await {
        Ok(output) => Ok(AuthContext {
            user_id: output.username().to_string(),
            set_cookies: vec![],
        }),
        Err(e) => {
            tracing::warn!("Session validation failed: {}", e);
            Err(unauthorized())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_a_stable_secret_hash() {
        let a = secret_hash("secret", "+15550100", "client");
        let b = secret_hash("secret", "+15550100", "client");
        assert_eq!(a, b);
        assert_ne!(a, secret_hash("secret", "+15550101", "client"));
    }

    #[test]
    fn extracts_the_session_cookie() {
        let header = format!("theme=dark; {}=tok123; other=1", SESSION_COOKIE);
        assert_eq!(cookie_value(&header, SESSION_COOKIE), Some("tok123"));
        assert_eq!(cookie_value("theme=dark", SESSION_COOKIE), None);
    }

    #[test]
    fn cors_origin_falls_back_to_the_production_origin() {
        assert_eq!(
            get_cors_origin(Some("http://localhost:3000")),
            "http://localhost:3000"
        );
        assert_eq!(
            get_cors_origin(Some("https://evil.example")),
            "https://beacon-response.app"
        );
        assert_eq!(get_cors_origin(None), "https://beacon-response.app");
    }
}
