//! Events document storage in S3.

use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use tracing::{debug, warn};

use crate::models::EventCollection;
use crate::{Error, Result};

/// The events document together with the version it was read at.
#[derive(Debug, Clone)]
pub struct StoredEvents {
    pub events: EventCollection,
    /// ETag of the object, `None` if the store did not report one.
    pub version: Option<String>,
}

/// Read and conditionally replace the shared events document.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Fetch the whole collection.
    async fn load(&self) -> Result<StoredEvents>;

    /// Overwrite the whole collection.
    ///
    /// With `expected_version` set, the write only lands if the stored object
    /// still has that version; otherwise `Error::Conflict` is returned.
    async fn save(&self, events: &EventCollection, expected_version: Option<&str>) -> Result<()>;
}

/// Events document kept as a single JSON object in a bucket.
pub struct S3EventStore {
    client: S3Client,
    bucket: String,
    key: String,
}

impl S3EventStore {
    pub fn new(client: S3Client, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    fn location(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

/// Map a failed read. A missing key is `NotFound`, anything else is an AWS error.
fn read_error<R>(err: SdkError<GetObjectError, R>, location: &str) -> Error
where
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let missing = err
        .as_service_error()
        .map(|se| se.is_no_such_key())
        .unwrap_or(false);
    if missing {
        Error::NotFound(location.to_string())
    } else {
        Error::aws("Failed to read events document", err)
    }
}

/// Map a failed conditional write from its HTTP status.
///
/// 412 when the ETag moved on, 409 when another conditional write is in flight.
fn write_error<E: std::error::Error>(err: E, status: Option<u16>, location: &str) -> Error {
    match status {
        Some(412) | Some(409) => Error::Conflict(format!("{} changed since it was read", location)),
        _ => Error::aws("Failed to write events document", err),
    }
}

#[async_trait]
impl EventStore for S3EventStore {
    async fn load(&self) -> Result<StoredEvents> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .send()
            .await
            .map_err(|e| read_error(e, &self.location()))?;

        let version = response.e_tag().map(str::to_string);
        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| Error::aws("Failed to read events document body", e))?
            .into_bytes();

        let events = EventCollection::from_slice(&bytes)?;
        debug!(count = events.len(), version = ?version, "Loaded events document");

        Ok(StoredEvents { events, version })
    }

    async fn save(&self, events: &EventCollection, expected_version: Option<&str>) -> Result<()> {
        let body = events.to_vec()?;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&self.key)
            .content_type("application/json")
            .body(ByteStream::from(body));

        match expected_version {
            Some(etag) => request = request.if_match(etag),
            None => warn!(key = %self.key, "Writing events document without a version check"),
        }

        request.send().await.map_err(|e| {
            let status = e.raw_response().map(|r| r.status().as_u16());
            write_error(e, status, &self.location())
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::operation::put_object::PutObjectError;
    use aws_sdk_s3::types::error::NoSuchKey;

    const LOCATION: &str = "s3://event-site/events.json";

    #[test]
    fn test_missing_key_is_not_found() {
        let err = SdkError::<GetObjectError, ()>::service_error(
            GetObjectError::NoSuchKey(NoSuchKey::builder().build()),
            (),
        );

        match read_error(err, LOCATION) {
            Error::NotFound(location) => assert_eq!(location, LOCATION),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_other_read_failures_keep_their_cause() {
        let err = SdkError::<GetObjectError, ()>::timeout_error("read timed out");

        let mapped = read_error(err, LOCATION);
        assert!(matches!(mapped, Error::Aws(_)));
        let message = mapped.to_string();
        assert!(message.contains("Failed to read events document"));
        assert!(message.contains("read timed out"));
    }

    #[test]
    fn test_precondition_failures_are_conflicts() {
        for status in [412, 409] {
            let err = SdkError::<PutObjectError, ()>::timeout_error("unused");
            match write_error(err, Some(status), LOCATION) {
                Error::Conflict(message) => assert!(message.contains(LOCATION)),
                other => panic!("status {} should be a conflict, got {:?}", status, other),
            }
        }
    }

    #[test]
    fn test_other_write_failures_are_aws_errors() {
        let err = SdkError::<PutObjectError, ()>::timeout_error("write timed out");
        let mapped = write_error(err, Some(500), LOCATION);
        assert!(matches!(mapped, Error::Aws(_)));
        assert!(mapped.to_string().contains("write timed out"));

        let err = SdkError::<PutObjectError, ()>::timeout_error("no response");
        assert!(matches!(write_error(err, None, LOCATION), Error::Aws(_)));
    }
}
