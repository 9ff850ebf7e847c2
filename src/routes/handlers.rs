use std::time::{Duration, Instant};

use bytes::Bytes;
use time::OffsetDateTime;
use warp::{
    http::{header, StatusCode},
    reject,
    reply::{json, with_header, with_status, Reply},
};

use crate::contest::{Contest, ContestFilter};
use crate::db::Filter;
use crate::environment::Environment;
use crate::errors::BackendError;
use crate::export::{csv_filename, render_csv};
use crate::log::{debug, info, o, trace};
use crate::registration::{NewRegistration, Submission};
use crate::routes::{
    query::RegistrationsQuery,
    rejection::{Context, Rejection},
    response::{AppliedFilters, SuccessResponse},
};
use crate::validation::validate;

const SERVER_TIMING_HEADER: &str = "server-timing";
const REGISTERED_MESSAGE: &str = "Registration successful!";

type RouteResult = Result<Box<dyn Reply>, reject::Rejection>;

macro_rules! timed {
    ($($body:tt)+) => {{
        let start = Instant::now();

        // TODO when `try` blocks are stabilized, we can wrap the body
        // and return the headers even on errors
        let result = { $($body)+ };

        Ok(Box::new(with_header(
            result,
            SERVER_TIMING_HEADER,
            format_server_timing(start.elapsed()),
        )) as Box<dyn Reply>)
    }};
}

pub async fn register(
    environment: Environment,
    client: String,
    body: Result<Bytes, BackendError>,
) -> RouteResult {
    timed! {
        let logger = environment.logger.new(o!("client" => client.clone()));
        let error_handler = |e: BackendError| Rejection::new(Context::register(&client), e);

        if !environment.limiter.allow(&client) {
            return Err(error_handler(BackendError::RateLimited { client: client.clone() }).into());
        }

        let body = body.map_err(error_handler)?;

        let submission: Submission = serde_json::from_slice(&body)
            .map_err(BackendError::MalformedRegistration)
            .map_err(error_handler)?;

        if !submission.has_required_fields() {
            return Err(error_handler(BackendError::MissingFields).into());
        }

        validate(&submission)
            .map_err(BackendError::InvalidRegistration)
            .map_err(error_handler)?;

        let registration = NewRegistration::from_submission(submission, client.as_str());
        trace!(logger, "Storing registration"; "contest" => %registration.contest());

        let registration = environment
            .db
            .create(registration)
            .await
            .map_err(error_handler)?;

        info!(logger, "Registration stored"; "id" => %registration.id(), "contest" => %registration.contest());

        // notifications never hold up or fail the response
        drop(environment.notifier.dispatch(&registration));

        with_status(
            json(&SuccessResponse::Registered {
                success: true,
                message: REGISTERED_MESSAGE,
                id: *registration.id(),
            }),
            StatusCode::CREATED,
        )
    }
}

pub async fn contests(_environment: Environment) -> RouteResult {
    timed! {
        json(&SuccessResponse::Contests {
            success: true,
            data: Contest::catalogue(),
        })
    }
}

pub async fn registrations(
    environment: Environment,
    secret: Option<String>,
    query: RegistrationsQuery,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| {
            Rejection::new(
                Context::registrations(query.contest.as_deref(), query.search.as_deref()),
                e,
            )
        };

        if !is_authorized(&environment.config.admin_secret, secret.as_deref()) {
            return Err(error_handler(BackendError::Unauthorized).into());
        }

        let contest = ContestFilter::parse(query.contest.as_deref())
            .map_err(BackendError::InvalidContestFilter)
            .map_err(error_handler)?;
        let filter = Filter::new(contest.contest(), query.search.as_deref());

        let registrations = environment
            .db
            .query(&filter)
            .await
            .map_err(error_handler)?;

        debug!(environment.logger, "Listing registrations"; "count" => registrations.len(), "filter" => ?filter, "csv" => query.wants_csv());

        if query.wants_csv() {
            let filename = csv_filename(OffsetDateTime::now_utc().date());

            Box::new(with_header(
                with_header(
                    render_csv(&registrations),
                    header::CONTENT_TYPE,
                    mime::TEXT_CSV_UTF_8.as_ref(),
                ),
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            )) as Box<dyn Reply>
        } else {
            Box::new(json(&SuccessResponse::Registrations {
                success: true,
                total: registrations.len(),
                data: registrations,
                filters: AppliedFilters {
                    contest: contest.as_str(),
                    search: filter.search.as_deref(),
                },
                sheet_url: environment.config.sheet_url.as_ref().map(|u| u.as_str()),
            })) as Box<dyn Reply>
        }
    }
}

/// Compares the supplied secret without short-circuiting on the first
/// differing byte. An empty configured secret admits nobody.
fn is_authorized(expected: &str, supplied: Option<&str>) -> bool {
    let supplied = match supplied {
        Some(s) if !expected.is_empty() => s.as_bytes(),
        _ => return false,
    };
    let expected = expected.as_bytes();

    if supplied.len() != expected.len() {
        return false;
    }

    expected
        .iter()
        .zip(supplied)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

fn format_server_timing(duration: Duration) -> String {
    format!("handler;dur={:.1}", duration.as_secs_f64() * 1000.0)
}
