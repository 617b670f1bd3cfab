use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;

use beacon_atoms::error::Error;

/// Store a captured photo and return its fetchable URL. Write-once:
/// the key embeds the upload instant, so a resubmitted form never
/// overwrites an earlier photo. Callers must not create the incident
/// document until this resolves.
pub async fn upload_photo(
    client: &S3Client,
    bucket_name: &str,
    filename: &str,
    bytes: Vec<u8>,
    content_type: Option<&str>,
) -> Result<String, Error> {
    let key = format!(
        "images/{}_{}",
        chrono::Utc::now().timestamp_millis(),
        sanitize_filename(filename)
    );

    let mut builder = client
        .put_object()
        .bucket(bucket_name)
        .key(&key)
        .body(ByteStream::from(bytes));
    if let Some(content_type) = content_type {
        builder = builder.content_type(content_type);
    }

    builder
        .send()
        .await
        .map_err(|e| Error::Upload(format!("S3 put_object error: {}", e)))?;

    Ok(format!("https://{}.s3.amazonaws.com/{}", bucket_name, key))
}

fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "photo".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_unsafe_filename_characters() {
        assert_eq!(sanitize_filename("my photo (1).jpg"), "my-photo--1-.jpg");
        assert_eq!(sanitize_filename("ok_name-2.png"), "ok_name-2.png");
        assert_eq!(sanitize_filename(""), "photo");
    }
}
