//! Routes for the operations port. Never exposed publicly.

use std::convert::Infallible;

use tokio::sync::mpsc;
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, Reply};
use warp::Filter;

use super::response::SuccessResponse;
use crate::log;

pub fn make_healthz_route(
) -> impl Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone {
    warp::path("healthz").and(warp::get()).map(|| {
        json(&SuccessResponse::Healthz {
            revision: log::REVISION,
            timestamp: log::BUILD_TIMESTAMP,
            version: log::VERSION,
        })
    })
}

/// Asks the servers to shut down gracefully.
pub fn make_termination_route(
    terminate: mpsc::Sender<()>,
) -> impl Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone {
    warp::path("terminate").and(warp::post()).and_then(move || {
        let terminate = terminate.clone();

        async move {
            // a closed channel means shutdown is already under way
            let _ = terminate.send(()).await;
            Ok::<_, Infallible>(StatusCode::NO_CONTENT)
        }
    })
}
