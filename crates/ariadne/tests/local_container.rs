//! Hosting an application in an in-process container through the facade.

use ariadne::core::CapturedResponse;
use ariadne::prelude::*;
use bytes::Bytes;
use http::{HeaderValue, StatusCode};

/// Serves requests by calling the handler directly.
#[derive(Debug)]
struct LocalContainer {
    app: ApplicationHandler,
}

impl LocalContainer {
    async fn serve(&self, path: &str) -> (ProcessingResult<()>, CapturedResponse) {
        let writer = BufferedResponseWriter::new();
        let captured = writer.captured();
        let result = self.app.handle(ContainerRequest::get(path), writer).await;
        let snapshot = captured.lock().clone();
        (result, snapshot)
    }
}

fn application() -> ApplicationHandler {
    let events = inflector_fn("events", |request| async move {
        let chunks = ChunkedResponse::for_request(&request);
        let producer = chunks.clone();
        tokio::spawn(async move {
            for event in ["created", "updated", "deleted"] {
                if producer.send(Bytes::from(format!("{event}\n"))).await.is_err() {
                    return;
                }
            }
            producer.close_when_drained().await;
        });
        Ok(ContainerResponse::chunked(chunks))
    });

    ApplicationHandler::builder()
        .config(ServerConfig::builder().base_path("/feed").build())
        .response_filter(FnResponseFilter::new(
            "server-header",
            |_: &RequestHead, response: &mut ContainerResponse| -> anyhow::Result<()> {
                response
                    .headers_mut()
                    .insert(http::header::SERVER, HeaderValue::from_static("ariadne"));
                Ok(())
            },
        ))
        .resource(Resource::builder("/events").get(events).build().unwrap())
        .build()
        .unwrap()
}

fn factory() -> ContainerFactory<ApplicationHandler> {
    ContainerFactory::new()
        // Declines applications that are not mounted under a base path.
        .with_provider_fn(|app: &ApplicationHandler| {
            Ok(app
                .config()
                .normalized_base_path()
                .map(|_| LocalContainer { app: app.clone() }))
        })
}

#[tokio::test]
async fn test_streams_through_local_container() {
    let container: LocalContainer = factory().create_container(&application()).unwrap();

    let (result, captured) = container.serve("/feed/events").await;
    result.unwrap();

    assert_eq!(captured.status, Some(StatusCode::OK));
    assert_eq!(captured.headers.get(http::header::SERVER).unwrap(), "ariadne");
    assert_eq!(captured.body_text(), "created\nupdated\ndeleted\n");
}

#[tokio::test]
async fn test_outside_base_path_is_not_found() {
    let container: LocalContainer = factory().create_container(&application()).unwrap();

    let (result, captured) = container.serve("/events").await;
    result.unwrap();

    assert_eq!(captured.status, Some(StatusCode::NOT_FOUND));
    assert_eq!(captured.headers.get(http::header::SERVER).unwrap(), "ariadne");
}

#[test]
fn test_provider_declines_unmounted_application() {
    let app = ApplicationHandler::builder().build().unwrap();
    let err = factory().create_container::<LocalContainer>(&app).unwrap_err();
    assert!(matches!(err, ProcessingError::UnsupportedContainer { .. }));
}
