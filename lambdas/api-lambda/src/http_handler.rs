use base64::{engine::general_purpose::STANDARD, Engine as _};
use beacon_atoms as atoms;
use beacon_shared::{auth, storage, AppState};
use dashboards_block::{markers, roles};
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use serde::Deserialize;
use std::env;
use std::sync::Arc;

use lambda_http::http::header::{HeaderValue, SET_COOKIE, VARY};

fn with_set_cookies(mut resp: Response<Body>, cookies: &[String]) -> Response<Body> {
    let headers = resp.headers_mut();
    for cookie in cookies {
        if let Ok(v) = HeaderValue::from_str(cookie) {
            headers.append(SET_COOKIE, v);
        }
    }
    resp
}

fn with_cors_headers(mut resp: Response<Body>, request_origin: Option<&str>) -> Response<Body> {
    let cors_origin = auth::get_cors_origin(request_origin);

    let headers = resp.headers_mut();
    headers.insert(
        "Access-Control-Allow-Origin",
        HeaderValue::from_str(&cors_origin)
            .unwrap_or_else(|_| HeaderValue::from_static("https://beacon-response.app")),
    );
    headers.insert(
        "Access-Control-Allow-Credentials",
        HeaderValue::from_static("true"),
    );
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET,POST,PUT,PATCH,DELETE,OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type,Authorization,Cookie"),
    );
    headers.append(VARY, HeaderValue::from_static("Origin"));

    resp
}

fn finalize_response(
    resp: Result<Response<Body>, Error>,
    request_origin: Option<&str>,
    cookies: &[String],
) -> Result<Response<Body>, Error> {
    resp.map(|r| with_cors_headers(with_set_cookies(r, cookies), request_origin))
}

#[derive(Deserialize)]
struct UploadPhotoRequest {
    filename: String,
    data_base64: String,
    content_type: Option<String>,
}

/// Main Lambda handler - routes requests to auth, incident, upload, and
/// dashboard endpoints.
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method();
    let path = event.uri().path();
    let body = event.body();
    let request_origin = event.headers().get("Origin").and_then(|v| v.to_str().ok());
    tracing::info!("API Lambda invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if method == "OPTIONS" {
        let resp = Response::builder()
            .status(StatusCode::OK)
            .body(Body::Empty)
            .map_err(Box::new)?;
        return Ok(with_cors_headers(resp, request_origin));
    }

    // OTP login exchange (no session required)
    if path.starts_with("/auth") {
        let client_id = env::var("COGNITO_CLIENT_ID").expect("COGNITO_CLIENT_ID must be set");
        let client_secret =
            env::var("COGNITO_CLIENT_SECRET").expect("COGNITO_CLIENT_SECRET must be set");

        return match (method, path) {
            (&Method::POST, "/auth/login") => finalize_response(
                auth::start_login(&state.cognito_client, &client_id, &client_secret, body).await,
                request_origin,
                &[],
            ),
            (&Method::POST, "/auth/verify") => finalize_response(
                auth::verify_code(&state.cognito_client, &client_id, &client_secret, body).await,
                request_origin,
                &[],
            ),
            _ => finalize_response(method_not_allowed(), request_origin, &[]),
        };
    }

    if path.starts_with("/logout") {
        return match method {
            &Method::POST => {
                let resp = Response::builder()
                    .status(StatusCode::OK)
                    .header("Content-Type", "application/json")
                    .header("Set-Cookie", auth::clear_cookie(auth::SESSION_COOKIE))
                    .body(serde_json::json!({"message": "ok"}).to_string().into())
                    .map_err(Box::new)?;
                finalize_response(Ok(resp), request_origin, &[])
            }
            _ => finalize_response(method_not_allowed(), request_origin, &[]),
        };
    }

    // Everything else sits behind the session cookie gate.
    let table_name = env::var("TABLE_NAME").unwrap_or_else(|_| "beacon".to_string());
    let cookie_header = event.headers().get("Cookie").and_then(|v| v.to_str().ok());

    let auth_ctx =
        match auth::authenticate_cookie_request(&state.cognito_client, cookie_header).await {
            Ok(ctx) => ctx,
            Err(resp) => return Ok(with_cors_headers(resp, request_origin)),
        };
    tracing::info!("Authenticated request from user {}", auth_ctx.user_id);

    // Incident routes
    if path.starts_with("/incidents") {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let params = event.query_string_parameters();
        let category = params.first("category");
        let range = params.first("range");
        let limit = params.first("limit").and_then(|l| l.parse::<usize>().ok());

        let resp = match (method, parts.as_slice()) {
            // GET /incidents - filtered, status-sorted list plus counts
            (&Method::GET, ["incidents"]) => {
                atoms::incidents::http::list_incidents(
                    &state.dynamo_client,
                    &table_name,
                    category,
                    range,
                    limit,
                )
                .await
            }
            // POST /incidents - report submission; an inline photo is
            // uploaded before the document write
            (&Method::POST, ["incidents"]) => {
                let bucket_name =
                    env::var("S3_BUCKET_NAME").unwrap_or_else(|_| "beacon-app".to_string());
                let s3_client = state.s3_client.clone();
                atoms::incidents::http::create_incident(
                    &state.dynamo_client,
                    &table_name,
                    body,
                    move |photo| async move {
                        storage::upload_photo(
                            &s3_client,
                            &bucket_name,
                            &photo.filename,
                            photo.bytes,
                            photo.content_type.as_deref(),
                        )
                        .await
                    },
                )
                .await
            }
            // GET /incidents/recent - dashboard recent panel
            (&Method::GET, ["incidents", "recent"]) => {
                atoms::incidents::http::recent_incidents(
                    &state.dynamo_client,
                    &table_name,
                    limit.unwrap_or(3),
                )
                .await
            }
            // GET /incidents/{id} - detail view
            (&Method::GET, ["incidents", incident_id]) => {
                atoms::incidents::http::get_incident(&state.dynamo_client, &table_name, incident_id)
                    .await
            }
            // POST /incidents/{id}/status - advance one stage
            (&Method::POST, ["incidents", incident_id, "status"]) => {
                atoms::incidents::http::advance_status(
                    &state.dynamo_client,
                    &table_name,
                    incident_id,
                    body,
                )
                .await
            }
            _ => not_found(),
        };

        return finalize_response(resp, request_origin, &auth_ctx.set_cookies);
    }

    // Photo upload (S3). The form calls this first and only writes the
    // incident document once the URL comes back.
    if path == "/uploads" {
        let resp = match method {
            &Method::POST => {
                let request: UploadPhotoRequest = serde_json::from_slice(body)?;
                let bucket_name =
                    env::var("S3_BUCKET_NAME").unwrap_or_else(|_| "beacon-app".to_string());
                match STANDARD.decode(&request.data_base64) {
                    Ok(bytes) => {
                        match storage::upload_photo(
                            &state.s3_client,
                            &bucket_name,
                            &request.filename,
                            bytes,
                            request.content_type.as_deref(),
                        )
                        .await
                        {
                            Ok(url) => Ok(Response::builder()
                                .status(StatusCode::CREATED)
                                .header("Content-Type", "application/json")
                                .body(serde_json::json!({ "url": url }).to_string().into())
                                .map_err(Box::new)?),
                            Err(e) => {
                                tracing::error!("Photo upload failed: {}", e);
                                atoms::error::error_response(&e)
                            }
                        }
                    }
                    Err(e) => Ok(Response::builder()
                        .status(StatusCode::BAD_REQUEST)
                        .header("Content-Type", "application/json")
                        .body(
                            serde_json::json!({"error": format!("invalid base64 payload: {}", e)})
                                .to_string()
                                .into(),
                        )
                        .map_err(Box::new)?),
                }
            }
            _ => method_not_allowed(),
        };

        return finalize_response(resp, request_origin, &auth_ctx.set_cookies);
    }

    // Map markers
    if path == "/markers" {
        let resp = match method {
            &Method::GET => markers::list_markers(&state.dynamo_client, &table_name).await,
            _ => method_not_allowed(),
        };
        return finalize_response(resp, request_origin, &auth_ctx.set_cookies);
    }

    // Role dashboards
    if path.starts_with("/dashboards") {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let params = event.query_string_parameters();

        let resp = match (method, parts.as_slice()) {
            (&Method::GET, ["dashboards", role_segment]) => {
                match roles::ResponderRole::parse(role_segment) {
                    Some(role) => {
                        roles::role_dashboard(
                            &state.dynamo_client,
                            &table_name,
                            role,
                            params.first("category"),
                            params.first("range"),
                        )
                        .await
                    }
                    None => not_found(),
                }
            }
            _ => not_found(),
        };

        return finalize_response(resp, request_origin, &auth_ctx.set_cookies);
    }

    // No matching route
    tracing::warn!("No route matched - Method: {} Path: {}", method, path);
    finalize_response(not_found(), request_origin, &auth_ctx.set_cookies)
}

fn not_found() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(serde_json::json!({"error": "Not found"}).to_string().into())
        .map_err(Box::new)?)
}

fn method_not_allowed() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header("Content-Type", "application/json")
        .body(
            serde_json::json!({"error": "Method not allowed"})
                .to_string()
                .into(),
        )
        .map_err(Box::new)?)
}
