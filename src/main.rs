use std::error::Error;
use std::sync::Arc;

use futures::future::FutureExt;
use tokio::sync::mpsc;
use warp::Filter;

use festival::config::{get_optional_variable, get_variable, Config, EmailSettings};
use festival::db::PgDb;
use festival::environment::Environment;
use festival::log::{info, initialize_logger};
use festival::notify::Notifier;
use festival::rate_limit::RateLimiter;
use festival::routes;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let logger = initialize_logger();

    let main_port: u16 = get_variable("FESTIVAL_PORT")
        .parse()
        .expect("parse FESTIVAL_PORT as u16");
    let ops_port: u16 = get_variable("FESTIVAL_OPS_PORT")
        .parse()
        .expect("parse FESTIVAL_OPS_PORT as u16");

    info!(logger, "Starting..."; "main_port" => main_port, "ops_port" => ops_port);
    let logger = Arc::new(logger);

    info!(logger, "Creating database pool...");
    let connection_string = get_variable("FESTIVAL_DB_CONNECTION_STRING");
    let pool = sqlx::Pool::connect(&connection_string)
        .await
        .expect("create database pool from FESTIVAL_DB_CONNECTION_STRING");
    let db = PgDb::new(pool);
    db.ensure_schema().await?;
    let db = Arc::new(db);

    let config = Config::from_env();
    let limiter = Arc::new(RateLimiter::new(config.rate_limit(), config.rate_limit_window()));

    let webhook = get_optional_variable("FESTIVAL_SHEETS_WEBHOOK").map(|u| {
        url::Url::parse(&u).expect("parse FESTIVAL_SHEETS_WEBHOOK as a URL")
    });
    let notifier = Notifier::from_settings(
        logger.clone(),
        config.notify_timeout(),
        webhook,
        EmailSettings::from_env(),
    )?;
    info!(logger, "Notifications configured"; "sinks" => ?notifier.sink_names());

    let environment = Environment::new(logger.clone(), db, limiter, notifier, config);

    let (termination_sender, mut termination_receiver) = mpsc::channel::<()>(1);

    let should_terminate = async move {
        termination_receiver.recv().await;
    }
    .shared();

    let ctrlc = {
        let should_terminate = should_terminate.clone();
        let termination_sender = termination_sender.clone();

        let signal = tokio::signal::ctrl_c();

        async move {
            tokio::select! {
                _ = should_terminate => {},
                _ = signal => {
                    let _ = termination_sender.send(()).await;
                }
            }
        }
    };

    let main_server = {
        let should_terminate = should_terminate.clone();

        let (_, main_server) = warp::serve(routes::make_api(environment))
            .bind_with_graceful_shutdown(([0, 0, 0, 0], main_port), async {
                should_terminate.await;
            });

        main_server
    };

    let ops_server = {
        let should_terminate = should_terminate.clone();

        let routes = routes::ops::make_healthz_route()
            .or(routes::ops::make_termination_route(termination_sender));

        let (_, ops_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], ops_port), async {
                should_terminate.await;
            });

        ops_server
    };

    tokio::join!(ctrlc, main_server, ops_server);

    info!(logger, "Exiting gracefully...");

    Ok(())
}
