//! Concurrent streaming requests on pooled executors.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use ariadne_core::{
    inflector_fn, BufferedResponseWriter, ChunkedResponse, ContainerRequest, ContainerResponse,
    ContainerResponseWriter, ProcessingError,
};
use ariadne_router::Resource;
use ariadne_server::{ApplicationHandler, ExecutorKind, ServerConfig};
use bytes::Bytes;
use http::HeaderValue;
use tokio::sync::oneshot;

const REQUESTS: usize = 8;
const CHUNKS_PER_REQUEST: usize = 20;

fn streaming_app(pool_size: usize) -> ApplicationHandler {
    let stream = inflector_fn("stream", |request: ContainerRequest| async move {
        let tag = request.param("tag").unwrap_or_default().to_owned();
        let thread = std::thread::current()
            .name()
            .unwrap_or_default()
            .to_owned();
        let chunks = ChunkedResponse::for_request(&request);

        let producer = chunks.clone();
        tokio::spawn(async move {
            for i in 0..CHUNKS_PER_REQUEST {
                if producer.send(Bytes::from(format!("{tag}:{i};"))).await.is_err() {
                    return;
                }
                tokio::task::yield_now().await;
            }
            producer.close_when_drained().await;
        });

        let thread = match HeaderValue::from_str(&thread) {
            Ok(value) => value,
            Err(err) => return Err(ProcessingError::handler(err)),
        };
        Ok(ContainerResponse::chunked(chunks).with_header(
            http::header::HeaderName::from_static("x-worker"),
            thread,
        ))
    });

    let config = ServerConfig::builder()
        .requesting_executor(ExecutorKind::Pooled { size: pool_size })
        .thread_name("stream-worker")
        .chunk_poll_interval(Duration::from_millis(50))
        .chunk_capacity(4)
        .build();

    ApplicationHandler::builder()
        .config(config)
        .resource(Resource::builder("/stream/{tag}").get(stream).build().unwrap())
        .build()
        .unwrap()
}

fn expected_body(tag: usize) -> String {
    (0..CHUNKS_PER_REQUEST).map(|i| format!("{tag}:{i};")).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_streams_are_isolated() {
    let app = streaming_app(REQUESTS);

    let mut handles = Vec::new();
    for tag in 0..REQUESTS {
        let app = app.clone();
        handles.push(tokio::spawn(async move {
            let writer = BufferedResponseWriter::new();
            let captured = writer.captured();
            app.handle(ContainerRequest::get(&format!("/stream/{tag}")), writer)
                .await
                .map(|()| (tag, captured))
        }));
    }

    let all = tokio::time::timeout(Duration::from_secs(30), futures_util::future::join_all(handles))
        .await
        .expect("streams did not complete in time");

    for joined in all {
        let (tag, captured) = joined.unwrap().unwrap();
        let captured = captured.lock();
        assert_eq!(captured.content_length, Some(-1));
        assert_eq!(captured.body_text(), expected_body(tag));
        assert_eq!(captured.chunks.len(), CHUNKS_PER_REQUEST);
        assert_eq!(captured.finish_count, 1);

        let worker = captured.headers.get("x-worker").unwrap().to_str().unwrap();
        assert!(worker.starts_with("stream-worker-req-"), "ran on {worker}");
    }

    app.shutdown();
}

/// Commits, then fails every write as if the peer went away.
struct GoneAway;

impl Write for GoneAway {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::ErrorKind::ConnectionReset.into())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct DisconnectedWriter(GoneAway);

impl ContainerResponseWriter for DisconnectedWriter {
    fn write_status_and_headers(
        &mut self,
        _content_length: i64,
        _response: &ContainerResponse,
    ) -> io::Result<&mut (dyn Write + Send)> {
        Ok(&mut self.0)
    }

    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disconnect_stops_producer() {
    let (stopped_tx, stopped_rx) = oneshot::channel();
    let stopped_tx = Arc::new(parking_lot::Mutex::new(Some(stopped_tx)));

    let endless = inflector_fn("endless", move |request: ContainerRequest| {
        let stopped_tx = Arc::clone(&stopped_tx);
        async move {
            let chunks = ChunkedResponse::for_request(&request);
            let producer = chunks.clone();
            tokio::spawn(async move {
                let mut written = 0_usize;
                while producer.write(Bytes::from_static(b"tick")).is_ok() {
                    written += 1;
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                if let Some(tx) = stopped_tx.lock().take() {
                    let _ = tx.send(written);
                }
            });
            Ok(ContainerResponse::chunked(chunks))
        }
    });

    let app = ApplicationHandler::builder()
        .config(
            ServerConfig::builder()
                .requesting_executor(ExecutorKind::Pooled { size: 1 })
                .chunk_poll_interval(Duration::from_millis(20))
                .build(),
        )
        .resource(Resource::builder("/ticks").get(endless).build().unwrap())
        .build()
        .unwrap();

    let result = app
        .handle(ContainerRequest::get("/ticks"), DisconnectedWriter(GoneAway))
        .await;
    assert!(matches!(result, Err(ProcessingError::Io(_))));

    let written = tokio::time::timeout(Duration::from_secs(5), stopped_rx)
        .await
        .expect("producer kept running after disconnect")
        .unwrap();
    assert!(written >= 1);

    app.shutdown();
}

#[tokio::test]
async fn test_requests_after_shutdown_are_rejected() {
    let app = streaming_app(1);
    app.shutdown();

    let writer = BufferedResponseWriter::new();
    let captured = writer.captured();
    let result = app.handle(ContainerRequest::get("/stream/x"), writer).await;

    assert!(matches!(result, Err(ProcessingError::Executor { .. })));
    assert!(captured.lock().failure.is_some());
}

#[tokio::test]
async fn test_abandoned_producer_does_not_stall_response() {
    let abandoned = inflector_fn("abandoned", |request: ContainerRequest| async move {
        let chunks = ChunkedResponse::for_request(&request);
        let producer = chunks.clone();
        producer.write(Bytes::from_static(b"partial")).unwrap();
        drop(producer);
        Ok(ContainerResponse::chunked(chunks))
    });

    let app = ApplicationHandler::builder()
        .config(
            ServerConfig::builder()
                .chunk_poll_interval(Duration::from_millis(20))
                .build(),
        )
        .resource(Resource::builder("/partial").get(abandoned).build().unwrap())
        .build()
        .unwrap();

    let writer = BufferedResponseWriter::new();
    let captured = writer.captured();
    tokio::time::timeout(
        Duration::from_secs(2),
        app.handle(ContainerRequest::get("/partial"), writer),
    )
    .await
    .expect("response never completed")
    .unwrap();

    let captured = captured.lock();
    assert_eq!(captured.body_text(), "partial");
    assert_eq!(captured.finish_count, 1);

    app.shutdown();
}

#[tokio::test]
async fn test_rejected_response_closes_stream_and_reports_failure() {
    let (stopped_tx, stopped_rx) = oneshot::channel();
    let stopped_tx = Arc::new(parking_lot::Mutex::new(Some(stopped_tx)));

    let ticks = inflector_fn("ticks", move |request: ContainerRequest| {
        let stopped_tx = Arc::clone(&stopped_tx);
        async move {
            let chunks = ChunkedResponse::for_request(&request);
            let producer = chunks.clone();
            tokio::spawn(async move {
                while producer.write(Bytes::from_static(b"tick")).is_ok() {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                if let Some(tx) = stopped_tx.lock().take() {
                    let _ = tx.send(());
                }
            });
            Ok(ContainerResponse::chunked(chunks))
        }
    });

    let app = ApplicationHandler::builder()
        .config(
            ServerConfig::builder()
                .requesting_executor(ExecutorKind::Direct)
                .responding_executor(ExecutorKind::Pooled { size: 1 })
                .build(),
        )
        .resource(Resource::builder("/ticks").get(ticks).build().unwrap())
        .build()
        .unwrap();
    app.shutdown();

    let writer = BufferedResponseWriter::new();
    let captured = writer.captured();
    let result = app.handle(ContainerRequest::get("/ticks"), writer).await;

    assert!(matches!(result, Err(ProcessingError::Executor { .. })));
    {
        let captured = captured.lock();
        assert!(captured.failure.is_some());
        assert_eq!(captured.finish_count, 0);
    }

    tokio::time::timeout(Duration::from_secs(5), stopped_rx)
        .await
        .expect("producer kept writing to an abandoned response")
        .unwrap();
}
