//! Gives every request an ID and a `tracing` span.
//!
//! The ID is taken from an incoming `X-Request-Id` header when present (so
//! that a reverse proxy's IDs carry through) and is echoed back on the
//! response. Handlers obtain the span through the [`TracingSpan`] guard and
//! instrument their database work with it.

use std::time::Instant;

use rocket::{
    Data, Request, Response,
    fairing::{Fairing, Info, Kind},
    http::Status,
    request::{self, FromRequest},
};
use tracing::Span;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

/// A request's ID.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequestId {
    type Error = ();

    async fn from_request(
        request: &'r Request<'_>,
    ) -> request::Outcome<Self, Self::Error> {
        // `local_cache` runs the closure at most once per request
        request::Outcome::Success(
            request
                .local_cache(|| {
                    RequestId(
                        request
                            .headers()
                            .get_one(REQUEST_ID_HEADER)
                            .filter(|id| is_acceptable_id(id))
                            .map(ToString::to_string)
                            .unwrap_or_else(|| Uuid::new_v4().to_string()),
                    )
                })
                .clone(),
        )
    }
}

/// Client supplied IDs end up in logs, so only short printable ones are
/// reused.
fn is_acceptable_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// The span opened for the current request.
pub struct TracingSpan<T = Span>(pub T);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for TracingSpan {
    type Error = ();

    async fn from_request(
        request: &'r Request<'_>,
    ) -> request::Outcome<Self, ()> {
        match request.local_cache(|| TracingSpan::<Option<Span>>(None)) {
            TracingSpan(Some(span)) => {
                request::Outcome::Success(TracingSpan(span.clone()))
            }
            TracingSpan(None) => {
                request::Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}

struct RequestStart(Option<Instant>);

pub struct RequestTracingFairing;

#[rocket::async_trait]
impl Fairing for RequestTracingFairing {
    fn info(&self) -> Info {
        Info {
            name: "Request tracing",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        req.local_cache(|| RequestStart(Some(Instant::now())));

        let request_id = match req.guard::<RequestId>().await {
            request::Outcome::Success(id) => id,
            _ => return,
        };
        let user_agent = req.headers().get_one("User-Agent").unwrap_or("");

        let span = tracing::info_span!(
            "request",
            otel.name = %format!("{} {}", req.method(), req.uri().path()),
            http.method = %req.method(),
            http.uri = %req.uri().path(),
            http.user_agent = %user_agent,
            http.status_code = tracing::field::Empty,
            http.elapsed_ms = tracing::field::Empty,
            http.request_id = %request_id,
        );
        span.in_scope(|| {
            tracing::debug!("received request");
            sentry::configure_scope(|scope| {
                scope.set_tag("request_id", &request_id);
            });
        });
        req.local_cache(|| TracingSpan::<Option<Span>>(Some(span)));
    }

    async fn on_response<'r>(
        &self,
        req: &'r Request<'_>,
        res: &mut Response<'r>,
    ) {
        let request_id = req.guard::<RequestId>().await;

        if let Some(span) =
            req.local_cache(|| TracingSpan::<Option<Span>>(None)).0.as_ref()
        {
            let elapsed_ms = req
                .local_cache(|| RequestStart(None))
                .0
                .map(|start| start.elapsed().as_millis() as u64)
                .unwrap_or_default();

            span.record("http.status_code", res.status().code);
            span.record("http.elapsed_ms", elapsed_ms);
            span.in_scope(|| {
                if res.status().code >= 500 {
                    tracing::error!(status = %res.status(), elapsed_ms, "request failed");
                } else {
                    tracing::info!(status = %res.status(), elapsed_ms, "request completed");
                }
            });
        }

        if let request::Outcome::Success(request_id) = request_id {
            res.set_raw_header(REQUEST_ID_HEADER, request_id.0);
        }
    }
}
