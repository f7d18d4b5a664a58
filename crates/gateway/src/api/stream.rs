//! Streaming Transport: a [`ChatSession`] as a chunked HTTP body.
//!
//! Plain-text mode writes the answer's word chunks and nothing else; a
//! failed run simply ends the body early. SSE mode frames every
//! [`ChatEvent`], including `error`. The response is built before the
//! first chunk exists.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::http::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};

use crate::runtime::{ChatEvent, ChatSession};

pub const THREAD_ID_HEADER: &str = "x-thread-id";
pub const THREAD_CREATED_HEADER: &str = "x-thread-created";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wire {
    PlainText,
    EventStream,
}

impl Wire {
    pub fn negotiate(headers: &HeaderMap) -> Self {
        let wants_sse = headers
            .get_all(ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.contains("text/event-stream"));
        if wants_sse {
            Self::EventStream
        } else {
            Self::PlainText
        }
    }
}

pub fn into_response(session: ChatSession, wire: Wire) -> Response {
    let ChatSession {
        thread_id,
        created,
        mut events,
        cancel,
    } = session;
    // Moved into the body stream: dropping the body cancels the run.
    let guard = cancel.drop_guard();

    let headers = [
        (HeaderName::from_static(THREAD_ID_HEADER), thread_id),
        (HeaderName::from_static(THREAD_CREATED_HEADER), created.to_string()),
        (HeaderName::from_static("x-accel-buffering"), "no".to_string()),
    ];

    match wire {
        Wire::PlainText => {
            let body = async_stream::stream! {
                let _guard = guard;
                while let Some(event) = events.recv().await {
                    match event {
                        ChatEvent::Delta { text } => yield Ok::<_, Infallible>(Bytes::from(text)),
                        ChatEvent::Done { .. } => {}
                        ChatEvent::Error { .. } => break,
                    }
                }
            };
            (
                [
                    (CONTENT_TYPE, "text/plain; charset=utf-8"),
                    (CACHE_CONTROL, "no-cache"),
                ],
                headers,
                Body::from_stream(body),
            )
                .into_response()
        }
        Wire::EventStream => {
            let stream = async_stream::stream! {
                let _guard = guard;
                while let Some(event) = events.recv().await {
                    let data = serde_json::to_string(&event).unwrap_or_default();
                    yield Ok::<_, Infallible>(Event::default().event(event.name()).data(data));
                }
            };
            (headers, Sse::new(stream).keep_alive(KeepAlive::default())).into_response()
        }
    }
}
