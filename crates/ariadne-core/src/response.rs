//! The response value produced by resource methods and filters.

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::Serialize;

use crate::chunked::ChunkedResponse;
use crate::error::{ProcessingError, ProcessingResult};

/// Content length reported to the container when it is not known up front.
pub const UNKNOWN_LENGTH: i64 = -1;

/// Response body.
#[derive(Debug, Clone, Default)]
pub enum Entity {
    /// No body.
    #[default]
    Empty,
    /// A body known in full.
    Bytes(Bytes),
    /// A body streamed chunk by chunk until the buffer is closed.
    Chunked(ChunkedResponse<Bytes>),
}

/// A response on its way to the container.
///
/// # Example
///
/// ```
/// use ariadne_core::ContainerResponse;
/// use http::StatusCode;
///
/// let response = ContainerResponse::ok().with_text("hello");
/// assert_eq!(response.status(), StatusCode::OK);
/// assert_eq!(response.content_length(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct ContainerResponse {
    status: StatusCode,
    headers: HeaderMap,
    entity: Entity,
}

impl ContainerResponse {
    /// Creates an empty response with the given status.
    #[must_use]
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            entity: Entity::Empty,
        }
    }

    /// `200 OK` with no body.
    #[must_use]
    pub fn ok() -> Self {
        Self::new(StatusCode::OK)
    }

    /// `204 No Content`.
    #[must_use]
    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT)
    }

    /// `404 Not Found`.
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }

    /// Creates a `200 OK` response streaming the given chunks.
    #[must_use]
    pub fn chunked(chunks: ChunkedResponse<Bytes>) -> Self {
        Self::ok().with_entity(Entity::Chunked(chunks))
    }

    /// Returns the status.
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the headers.
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the headers for in-place modification.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns the entity.
    pub const fn entity(&self) -> &Entity {
        &self.entity
    }

    /// Returns `true` if the entity is streamed.
    pub const fn is_chunked(&self) -> bool {
        matches!(self.entity, Entity::Chunked(_))
    }

    /// Length to announce to the container: `0` for no body, the byte count
    /// for a full body and [`UNKNOWN_LENGTH`] for a chunked body.
    pub fn content_length(&self) -> i64 {
        match &self.entity {
            Entity::Empty => 0,
            Entity::Bytes(bytes) => i64::try_from(bytes.len()).unwrap_or(UNKNOWN_LENGTH),
            Entity::Chunked(_) => UNKNOWN_LENGTH,
        }
    }

    /// Replaces the status.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Takes the entity out, leaving [`Entity::Empty`].
    pub fn take_entity(&mut self) -> Entity {
        std::mem::take(&mut self.entity)
    }

    /// Replaces the status.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Sets a header, replacing existing values.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Replaces the entity.
    #[must_use]
    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entity = entity;
        self
    }

    /// Sets a byte body.
    #[must_use]
    pub fn with_bytes(self, body: impl Into<Bytes>) -> Self {
        self.with_entity(Entity::Bytes(body.into()))
    }

    /// Sets a `text/plain` body.
    #[must_use]
    pub fn with_text(self, body: impl Into<String>) -> Self {
        self.with_header(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        )
        .with_bytes(body.into())
    }

    /// Sets an `application/json` body.
    pub fn with_json<T: Serialize>(self, value: &T) -> ProcessingResult<Self> {
        let body = serde_json::to_vec(value).map_err(ProcessingError::handler)?;
        Ok(self
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_bytes(body))
    }
}

impl Default for ContainerResponse {
    fn default() -> Self {
        Self::no_content()
    }
}
