//! Writing responses to the container.
//!
//! The responder turns the outcome of a request into calls on the
//! container's [`ContainerResponseWriter`]: response filters first, then
//! exception mapping for failures, then status, headers and entity.
//! Streamed entities are drained chunk by chunk until the producer closes
//! the buffer.

use std::io::{self, Write};

use ariadne_core::{
    ChunkedResponse, ContainerResponse, ContainerResponseWriter, Entity, ProcessingError,
    ProcessingResult, RequestHead,
};
use ariadne_telemetry::fields;
use bytes::Bytes;
use http::Method;
use tracing::{debug, error, warn, Span};

use crate::exception::ExceptionMappers;
use crate::filter::ResponseFilterChain;

/// Writes responses and failures.
#[derive(Debug, Clone, Default)]
pub struct Responder {
    filters: ResponseFilterChain,
    mappers: ExceptionMappers,
}

impl Responder {
    /// Creates a responder.
    pub const fn new(filters: ResponseFilterChain, mappers: ExceptionMappers) -> Self {
        Self { filters, mappers }
    }

    /// Writes the outcome of a request.
    ///
    /// A failure is mapped to a response when a mapper claims it. A failure
    /// nobody maps is reported through
    /// [`ContainerResponseWriter::failure`] and returned.
    ///
    /// # Errors
    ///
    /// Returns unmapped failures and failures to write.
    pub async fn respond<W>(
        &self,
        head: &RequestHead,
        outcome: ProcessingResult<ContainerResponse>,
        writer: &mut W,
    ) -> ProcessingResult<()>
    where
        W: ContainerResponseWriter + ?Sized,
    {
        let response = match outcome.and_then(|response| self.filtered(head, response)) {
            Ok(response) => response,
            Err(err) => match self.recover(head, err) {
                Ok(response) => response,
                Err(err) => {
                    error!(error = %err, "Request failed");
                    writer.failure(&err);
                    return Err(err);
                }
            },
        };

        if let Err(err) = write_response(head, response, writer).await {
            warn!(error = %err, "Failed to write response");
            writer.failure(&err);
            return Err(err);
        }
        Ok(())
    }

    fn filtered(
        &self,
        head: &RequestHead,
        mut response: ContainerResponse,
    ) -> ProcessingResult<ContainerResponse> {
        if let Err(err) = self.filters.apply(head, &mut response) {
            // The response is discarded; release its producer.
            if let Entity::Chunked(chunks) = response.entity() {
                chunks.close();
            }
            return Err(err);
        }
        Ok(response)
    }

    fn recover(
        &self,
        head: &RequestHead,
        err: ProcessingError,
    ) -> ProcessingResult<ContainerResponse> {
        let Some(response) = self.mappers.map(&err) else {
            return Err(err);
        };
        debug!(error = %err, status = response.status().as_u16(), "Mapped failure");
        self.filtered(head, response)
    }
}

async fn write_response<W>(
    head: &RequestHead,
    mut response: ContainerResponse,
    writer: &mut W,
) -> ProcessingResult<()>
where
    W: ContainerResponseWriter + ?Sized,
{
    let content_length = response.content_length();
    let entity = response.take_entity();
    let skip_body = head.method == Method::HEAD;

    Span::current().record(fields::HTTP_STATUS, response.status().as_u16());

    {
        let sink = match writer.write_status_and_headers(content_length, &response) {
            Ok(sink) => sink,
            Err(err) => {
                if let Entity::Chunked(chunks) = &entity {
                    chunks.close();
                }
                return Err(err.into());
            }
        };

        match entity {
            Entity::Empty => {}
            Entity::Bytes(body) => {
                if !skip_body {
                    sink.write_all(&body)?;
                    sink.flush()?;
                }
            }
            Entity::Chunked(chunks) => {
                let stream = Streaming(chunks);
                if !skip_body {
                    drain(&stream.0, sink).await?;
                }
            }
        }
    }

    writer.finish()?;
    debug!(
        status = response.status().as_u16(),
        content_length, "Response written"
    );
    Ok(())
}

/// Closes a streamed entity when the responder lets go of it, including
/// when writing is abandoned midway.
struct Streaming(ChunkedResponse<Bytes>);

impl Drop for Streaming {
    fn drop(&mut self) {
        self.0.close();
    }
}

async fn drain(chunks: &ChunkedResponse<Bytes>, sink: &mut (dyn Write + Send)) -> io::Result<()> {
    loop {
        match chunks.next_chunk().await {
            Some(chunk) => {
                sink.write_all(&chunk)?;
                sink.flush()?;
            }
            None if chunks.is_closed() => return Ok(()),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ariadne_core::{BufferedResponseWriter, ContainerRequest};
    use http::StatusCode;

    use crate::exception::ExceptionMapper;
    use crate::filter::{FnResponseFilter, ResponseFilter};

    /// Accepts the commit and then fails every write.
    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct DisconnectingWriter {
        sink: BrokenPipe,
        finished: bool,
        failed: bool,
    }

    impl ContainerResponseWriter for DisconnectingWriter {
        fn write_status_and_headers(
            &mut self,
            _content_length: i64,
            _response: &ContainerResponse,
        ) -> io::Result<&mut (dyn Write + Send)> {
            Ok(&mut self.sink)
        }

        fn finish(&mut self) -> io::Result<()> {
            self.finished = true;
            Ok(())
        }

        fn failure(&mut self, _error: &ProcessingError) {
            self.failed = true;
        }
    }

    fn head(method: Method) -> RequestHead {
        ContainerRequest::new(method, "/".parse().unwrap()).head()
    }

    #[tokio::test]
    async fn test_writes_bytes_entity() {
        let mut writer = BufferedResponseWriter::new();
        let captured = writer.captured();

        Responder::default()
            .respond(&head(Method::GET), Ok(ContainerResponse::ok().with_text("hi")), &mut writer)
            .await
            .unwrap();

        let captured = captured.lock();
        assert_eq!(captured.status, Some(StatusCode::OK));
        assert_eq!(captured.content_length, Some(2));
        assert_eq!(captured.body_text(), "hi");
        assert_eq!(captured.finish_count, 1);
    }

    #[tokio::test]
    async fn test_head_skips_body_but_keeps_length() {
        let mut writer = BufferedResponseWriter::new();
        let captured = writer.captured();

        Responder::default()
            .respond(&head(Method::HEAD), Ok(ContainerResponse::ok().with_text("hello")), &mut writer)
            .await
            .unwrap();

        let captured = captured.lock();
        assert_eq!(captured.content_length, Some(5));
        assert!(captured.body.is_empty());
        assert!(captured.is_finished());
    }

    #[tokio::test]
    async fn test_drains_chunked_entity() {
        let chunks = ChunkedResponse::new();
        let producer = chunks.clone();
        tokio::spawn(async move {
            for part in ["a", "b", "c"] {
                producer.write(Bytes::from_static(part.as_bytes())).unwrap();
            }
            producer.close_when_drained().await;
        });

        let mut writer = BufferedResponseWriter::new();
        let captured = writer.captured();
        Responder::default()
            .respond(&head(Method::GET), Ok(ContainerResponse::chunked(chunks)), &mut writer)
            .await
            .unwrap();

        let captured = captured.lock();
        assert_eq!(captured.content_length, Some(-1));
        assert_eq!(captured.body_text(), "abc");
        assert_eq!(captured.chunks.len(), 3);
        assert_eq!(captured.finish_count, 1);
    }

    #[tokio::test]
    async fn test_write_failure_closes_chunked_entity() {
        let chunks = ChunkedResponse::new();
        chunks.write(Bytes::from_static(b"x")).unwrap();

        let mut writer = DisconnectingWriter {
            sink: BrokenPipe,
            finished: false,
            failed: false,
        };
        let err = Responder::default()
            .respond(&head(Method::GET), Ok(ContainerResponse::chunked(chunks.clone())), &mut writer)
            .await
            .unwrap_err();

        assert!(matches!(err, ProcessingError::Io(_)));
        assert!(chunks.is_closed());
        assert!(writer.failed);
        assert!(!writer.finished);
    }

    #[tokio::test]
    async fn test_unmapped_failure_reported_to_container() {
        let mut writer = BufferedResponseWriter::new();
        let captured = writer.captured();

        let err = Responder::default()
            .respond(
                &head(Method::GET),
                Err(ProcessingError::handler(anyhow::anyhow!("db down"))),
                &mut writer,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ProcessingError::Handler { .. }));
        let captured = captured.lock();
        assert_eq!(captured.failure.as_deref(), Some("Handler failed: db down"));
        assert_eq!(captured.status, None);
    }

    #[tokio::test]
    async fn test_mapped_failure_is_filtered_and_written() {
        let mapper: Arc<dyn ExceptionMapper> = Arc::new(|err: &ProcessingError| {
            Some(ContainerResponse::new(StatusCode::BAD_GATEWAY).with_text(err.to_string()))
        });
        let tag: Arc<dyn ResponseFilter> = Arc::new(FnResponseFilter::new(
            "tag",
            |_: &RequestHead, response: &mut ContainerResponse| {
                response
                    .headers_mut()
                    .insert("x-filtered", http::HeaderValue::from_static("1"));
                Ok(())
            },
        ));
        let responder = Responder::new(
            ResponseFilterChain::new([tag]),
            ExceptionMappers::new([mapper]),
        );

        let mut writer = BufferedResponseWriter::new();
        let captured = writer.captured();
        responder
            .respond(
                &head(Method::GET),
                Err(ProcessingError::handler(anyhow::anyhow!("upstream"))),
                &mut writer,
            )
            .await
            .unwrap();

        let captured = captured.lock();
        assert_eq!(captured.status, Some(StatusCode::BAD_GATEWAY));
        assert_eq!(captured.headers.get("x-filtered").unwrap(), "1");
        assert_eq!(captured.body_text(), "Handler failed: upstream");
    }

    #[tokio::test]
    async fn test_response_filter_failure_is_mapped() {
        let failing: Arc<dyn ResponseFilter> = Arc::new(FnResponseFilter::new(
            "sign",
            |_: &RequestHead, response: &mut ContainerResponse| {
                if response.status() == StatusCode::OK {
                    anyhow::bail!("no key");
                }
                Ok(())
            },
        ));
        let mapper: Arc<dyn ExceptionMapper> = Arc::new(|err: &ProcessingError| {
            matches!(err, ProcessingError::ResponseFilter { .. })
                .then(|| ContainerResponse::new(StatusCode::INTERNAL_SERVER_ERROR))
        });
        let responder = Responder::new(
            ResponseFilterChain::new([failing]),
            ExceptionMappers::new([mapper]),
        );

        let mut writer = BufferedResponseWriter::new();
        let captured = writer.captured();
        responder
            .respond(&head(Method::GET), Ok(ContainerResponse::ok()), &mut writer)
            .await
            .unwrap();
        assert_eq!(
            captured.lock().status,
            Some(StatusCode::INTERNAL_SERVER_ERROR)
        );
    }
}
