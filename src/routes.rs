use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::{Stream, StreamExt};

use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, with_status, Json, WithStatus};
use warp::{Filter, Reply};

use crate::environment::Environment;
use crate::errors::BackendError;
use crate::log::{error, info, Logger};
use crate::rate_limit::UNKNOWN_CLIENT;

mod handlers;
pub mod ops;
mod query;
mod rejection;
mod response;

pub use internal::*;

/// The header carrying the admin shared secret.
pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

/// The largest registration body accepted. Registrations are a few
/// hundred bytes; media is uploaded elsewhere and only linked.
pub const MAX_CONTENT_LENGTH: u64 = 64 * 1024;

/// All public routes, with rejections rendered as JSON.
pub fn make_api(
    environment: Environment,
) -> impl Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone {
    let logger = environment.logger.clone();

    make_register_route(environment.clone())
        .or(make_contests_route(environment.clone()))
        .or(make_registrations_route(environment))
        .recover(move |r| format_rejection(logger.clone(), r))
}

pub async fn format_rejection(
    logger: Arc<Logger>,
    rej: reject::Rejection,
) -> Result<WithStatus<Json>, reject::Rejection> {
    if let Some(r) = rej.find::<rejection::Rejection>() {
        let e = &r.error;
        let status = status_code_for(e);

        if status.is_server_error() {
            error!(logger, "Backend error"; "context" => ?r.context, "error" => ?r.error, "status" => %status, "message" => %r.error);
        } else {
            info!(logger, "Request rejected"; "context" => ?r.context, "status" => %status, "message" => %r.error);
        }

        return Ok(with_status(json(&r.flatten()), status));
    }

    Err(rej)
}

fn status_code_for(e: &BackendError) -> StatusCode {
    use BackendError::*;

    match e {
        RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        UnreadableBody(..)
        | MalformedRegistration(..)
        | MissingFields
        | InvalidRegistration(..)
        | InvalidContestFilter(..) => StatusCode::BAD_REQUEST,
        Unauthorized => StatusCode::UNAUTHORIZED,
        Sqlx { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Extracts the key a client is rate-limited and audited under: the
/// first `x-forwarded-for` entry, then `x-real-ip`, then the peer
/// address.
pub fn client_address(
) -> impl Filter<Extract = (String,), Error = reject::Rejection> + Clone {
    warp::header::optional::<String>("x-forwarded-for")
        .and(warp::header::optional::<String>("x-real-ip"))
        .and(warp::addr::remote())
        .map(
            |forwarded: Option<String>, real_ip: Option<String>, remote: Option<SocketAddr>| {
                resolve_client(forwarded.as_deref(), real_ip.as_deref(), remote)
            },
        )
}

/// Reads the whole request body, up to `limit` bytes, whether or not
/// it is sent with a `content-length`. Oversized or broken bodies are
/// handed to the handler as errors so they still pass the rate limiter.
pub fn body_within(
    limit: u64,
) -> impl Filter<Extract = (Result<Bytes, BackendError>,), Error = reject::Rejection> + Clone {
    warp::header::optional::<u64>("content-length")
        .and(warp::body::stream())
        .and_then(move |declared: Option<u64>, stream| async move {
            let body = match declared {
                Some(length) if length > limit => Err(BackendError::PayloadTooLarge { limit }),
                _ => collect_within(stream, limit).await,
            };

            Ok::<_, Infallible>(body)
        })
}

async fn collect_within<S, B>(stream: S, limit: u64) -> Result<Bytes, BackendError>
where
    S: Stream<Item = Result<B, warp::Error>>,
    B: Buf,
{
    futures::pin_mut!(stream);

    let mut body = BytesMut::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(BackendError::UnreadableBody)?;

        if (body.len() + chunk.remaining()) as u64 > limit {
            return Err(BackendError::PayloadTooLarge { limit });
        }

        body.put(chunk);
    }

    Ok(body.freeze())
}

fn resolve_client(
    forwarded: Option<&str>,
    real_ip: Option<&str>,
    remote: Option<SocketAddr>,
) -> String {
    fn non_blank(v: Option<&str>) -> Option<&str> {
        v.map(str::trim).filter(|v| !v.is_empty())
    }

    let first_hop = forwarded.and_then(|f| f.split(',').next());

    non_blank(first_hop)
        .or_else(|| non_blank(real_ip))
        .map(ToOwned::to_owned)
        .or_else(|| remote.map(|a| a.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_owned())
}

mod internal {
    use warp::filters::BoxedFilter;
    use warp::path::end;
    use warp::Filter;
    use warp::Reply;
    use warp::{get as g, header, path as p, post, query};

    use super::{body_within, client_address, handlers, query as q, ADMIN_SECRET_HEADER, MAX_CONTENT_LENGTH};
    use crate::environment::Environment;

    type Route = BoxedFilter<(Box<dyn Reply>,)>;

    macro_rules! route_filter {
        ($route_variable:ident; $first:expr) => (let $route_variable = $route_variable.and($first););
        ($route_variable:ident; $first:expr, $($rest:expr),+) => (
            let $route_variable = $route_variable.and($first);
            route_filter!($route_variable; $($rest),+);
        )
    }

    macro_rules! route {
        ($name:ident => $handler:ident, $route_variable:ident; $($filters:expr),+) => (
            pub fn $name(environment: Environment) -> Route {
                let $route_variable = warp::any().map(move || environment.clone());

                route_filter!($route_variable; $($filters),+);

                $route_variable.and_then(handlers::$handler)
                    .boxed()
            }
        );
    }

    route!(make_register_route => register, rt; p("register"), end(), post(), client_address(), body_within(MAX_CONTENT_LENGTH));
    route!(make_contests_route => contests, rt; p("contests"), end(), g());
    route!(make_registrations_route => registrations, rt; p("admin"), p("registrations"), end(), g(), header::optional::<String>(ADMIN_SECRET_HEADER), query::<q::RegistrationsQuery>());
}
