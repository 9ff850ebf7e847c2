//! Best-effort propagation of stored registrations to the spreadsheet
//! webhook and the optional email channel.

use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use tokio::task::JoinHandle;
use url::Url;

use crate::config::EmailSettings;
use crate::contest::Contest;
use crate::errors::NotifyError;
use crate::log::{debug, o, warn, Logger};
use crate::registration::{format_timestamp, Registration};

/// A destination for registration notices.
pub trait Sink: Send + Sync {
    /// A short name for logs.
    fn name(&self) -> &'static str;

    /// Delivers one notice.
    fn send(&self, registration: &Registration) -> BoxFuture<Result<(), NotifyError>>;
}

/// The body posted to the spreadsheet webhook.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload<'a> {
    name: &'a str,
    age: Option<i16>,
    whatsapp: &'a str,
    email: Option<&'a str>,
    contest: Contest,
    message: Option<&'a str>,
    number_of_children: Option<i16>,
    photo_url: Option<&'a str>,
    video_url: Option<&'a str>,
    timestamp: String,
}

impl<'a> From<&'a Registration> for WebhookPayload<'a> {
    fn from(r: &'a Registration) -> Self {
        WebhookPayload {
            name: &r.name,
            age: r.age,
            whatsapp: &r.whatsapp,
            email: r.email.as_deref(),
            contest: r.contest,
            message: r.message.as_deref(),
            number_of_children: r.number_of_children,
            photo_url: r.photo_url.as_deref(),
            video_url: r.video_url.as_deref(),
            timestamp: format_timestamp(r.created_at),
        }
    }
}

/// Posts each registration as JSON to a spreadsheet webhook.
pub struct WebhookSink {
    client: reqwest::Client,
    url: Url,
}

impl WebhookSink {
    pub fn new(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }
}

impl Sink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn send(&self, registration: &Registration) -> BoxFuture<Result<(), NotifyError>> {
        let request = self
            .client
            .post(self.url.clone())
            .json(&WebhookPayload::from(registration));

        post(self.name(), request).boxed()
    }
}

/// Emails a summary of each registration through the SendGrid API.
pub struct EmailSink {
    client: reqwest::Client,
    settings: EmailSettings,
}

impl EmailSink {
    pub fn new(client: reqwest::Client, settings: EmailSettings) -> Self {
        Self { client, settings }
    }
}

#[derive(Serialize)]
struct MailRequest<'a> {
    personalizations: [Personalization<'a>; 1],
    from: Address<'a>,
    subject: String,
    content: [Content; 1],
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: [Address<'a>; 1],
}

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct Content {
    #[serde(rename = "type")]
    kind: &'static str,
    value: String,
}

/// The plain-text body of a notification email.
pub fn email_body(r: &Registration) -> String {
    let or_missing = |v: Option<&str>| v.unwrap_or("Not provided").to_owned();
    let yes_no = |v: &Option<String>| if v.is_some() { "Yes" } else { "No" };

    format!(
        "New registration received:\n\n\
         Name: {}\n\
         Age: {}\n\
         WhatsApp: {}\n\
         Email: {}\n\
         Contest: {}\n\
         Number of children: {}\n\
         Message: {}\n\
         Photo: {}\n\
         Video: {}\n\
         Timestamp: {}\n\
         Registration ID: {}\n",
        r.name,
        or_missing(r.age.map(|a| a.to_string()).as_deref()),
        r.whatsapp,
        or_missing(r.email.as_deref()),
        r.contest,
        or_missing(r.number_of_children.map(|n| n.to_string()).as_deref()),
        or_missing(r.message.as_deref()),
        yes_no(&r.photo_url),
        yes_no(&r.video_url),
        format_timestamp(r.created_at),
        r.id,
    )
}

impl Sink for EmailSink {
    fn name(&self) -> &'static str {
        "email"
    }

    fn send(&self, registration: &Registration) -> BoxFuture<Result<(), NotifyError>> {
        let mail = MailRequest {
            personalizations: [Personalization {
                to: [Address {
                    email: &self.settings.recipient,
                }],
            }],
            from: Address {
                email: &self.settings.sender,
            },
            subject: format!("New Registration - {} Contest", registration.contest),
            content: [Content {
                kind: "text/plain",
                value: email_body(registration),
            }],
        };

        let request = self
            .client
            .post(self.settings.endpoint.clone())
            .bearer_auth(&self.settings.api_key)
            .json(&mail);

        post(self.name(), request).boxed()
    }
}

async fn post(sink: &'static str, request: reqwest::RequestBuilder) -> Result<(), NotifyError> {
    let response = request
        .send()
        .await
        .map_err(|source| NotifyError::Request { sink, source })?;

    let status = response.status();

    if status.is_success() {
        Ok(())
    } else {
        Err(NotifyError::Status { sink, status })
    }
}

/// Fans a stored registration out to every configured sink.
#[derive(Clone)]
pub struct Notifier {
    logger: Arc<Logger>,
    sinks: Vec<Arc<dyn Sink>>,
    timeout: Duration,
}

/// The tasks started by one [`Notifier::dispatch`]. Dropping it leaves
/// them running.
#[must_use = "drop explicitly to fire and forget"]
pub struct Dispatch {
    handles: Vec<JoinHandle<()>>,
}

impl Dispatch {
    /// Waits until every attempt has finished, failed or timed out.
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Notifier {
    pub fn new(logger: Arc<Logger>, timeout: Duration) -> Self {
        Self {
            logger,
            sinks: vec![],
            timeout,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Builds the sinks the configuration enables: the webhook if a
    /// URL is given, email if every credential is present.
    pub fn from_settings(
        logger: Arc<Logger>,
        timeout: Duration,
        webhook: Option<Url>,
        email: Option<EmailSettings>,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| NotifyError::Request {
                sink: "client",
                source,
            })?;

        let mut notifier = Notifier::new(logger, timeout);

        if let Some(url) = webhook {
            notifier = notifier.with_sink(Arc::new(WebhookSink::new(client.clone(), url)));
        }

        if let Some(settings) = email {
            notifier = notifier.with_sink(Arc::new(EmailSink::new(client, settings)));
        }

        Ok(notifier)
    }

    pub fn sink_names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Starts one bounded attempt per sink and returns immediately.
    /// Failures and overruns are logged and otherwise ignored.
    pub fn dispatch(&self, registration: &Registration) -> Dispatch {
        let handles = self
            .sinks
            .iter()
            .map(|sink| {
                let sink = sink.clone();
                let registration = registration.clone();
                let timeout = self.timeout;
                let logger = self
                    .logger
                    .new(o!("sink" => sink.name(), "id" => registration.id.to_string()));

                tokio::spawn(async move {
                    let attempt = tokio::time::timeout(timeout, sink.send(&registration)).await;

                    match attempt {
                        Ok(Ok(())) => debug!(logger, "Notification delivered"),
                        Ok(Err(e)) => warn!(logger, "Notification failed"; "error" => %e, "detail" => ?e),
                        Err(_) => {
                            let e = NotifyError::TimedOut { sink: sink.name() };
                            warn!(logger, "Notification abandoned"; "error" => %e, "timeout_ms" => timeout.as_millis() as u64);
                        }
                    }
                })
            })
            .collect();

        Dispatch { handles }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use futures::future::{BoxFuture, FutureExt};
    use time::OffsetDateTime;
    use tokio::sync::mpsc;
    use url::Url;
    use uuid::Uuid;
    use warp::Filter;

    use super::*;
    use crate::log::discard;
    use crate::registration::{NewRegistration, Submission};

    fn registration() -> Registration {
        let submission = Submission {
            name: Some("Asha Rao".to_owned()),
            whatsapp: Some("9876543210".to_owned()),
            age: Some(34),
            contest: Contest::SuperMom,
            number_of_children: Some(2),
            ..Default::default()
        };

        NewRegistration::from_submission(submission, "10.1.1.1")
            .into_registration(Uuid::new_v4(), OffsetDateTime::now_utc())
    }

    struct Slow;

    impl Sink for Slow {
        fn name(&self) -> &'static str {
            "slow"
        }

        fn send(&self, _: &Registration) -> BoxFuture<Result<(), NotifyError>> {
            tokio::time::sleep(Duration::from_secs(30)).map(Ok).boxed()
        }
    }

    struct Counting(Arc<AtomicUsize>);

    impl Sink for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn send(&self, _: &Registration) -> BoxFuture<Result<(), NotifyError>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            futures::future::ready(Ok(())).boxed()
        }
    }

    /// Serves a webhook receiver on an ephemeral port, forwarding every
    /// body it receives.
    fn receiver(status: warp::http::StatusCode) -> (Url, mpsc::UnboundedReceiver<serde_json::Value>) {
        let (sender, received) = mpsc::unbounded_channel();

        let route = warp::post()
            .and(warp::body::json())
            .map(move |body: serde_json::Value| {
                let _ = sender.send(body);
                warp::reply::with_status(warp::reply(), status)
            });

        let (address, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        let url = Url::parse(&format!("http://{}/hook", address)).unwrap();

        (url, received)
    }

    #[test]
    fn payload_carries_the_sheet_fields() {
        let r = registration();
        let value = serde_json::to_value(WebhookPayload::from(&r)).unwrap();

        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();

        assert_eq!(
            keys,
            vec![
                "age", "contest", "email", "message", "name", "numberOfChildren", "photoUrl",
                "timestamp", "videoUrl", "whatsapp"
            ]
        );
        assert_eq!(value["contest"], "SUPERMOM");
        assert_eq!(value["whatsapp"], "9876543210");
    }

    #[test]
    fn email_body_summarizes() {
        let body = email_body(&registration());

        assert!(body.contains("Name: Asha Rao"));
        assert!(body.contains("Email: Not provided"));
        assert!(body.contains("Number of children: 2"));
        assert!(body.contains("Photo: No"));
    }

    #[tokio::test]
    async fn webhook_receives_payload() {
        let (url, mut received) = receiver(warp::http::StatusCode::OK);

        let sink = WebhookSink::new(reqwest::Client::new(), url);
        let r = registration();

        sink.send(&r).await.expect("deliver webhook");

        let body = received.recv().await.expect("receive payload");
        assert_eq!(body["name"], "Asha Rao");
        assert_eq!(body["numberOfChildren"], 2);
    }

    #[tokio::test]
    async fn webhook_error_status_is_a_failure() {
        let (url, _received) = receiver(warp::http::StatusCode::INTERNAL_SERVER_ERROR);

        let sink = WebhookSink::new(reqwest::Client::new(), url);

        match sink.send(&registration()).await {
            Err(NotifyError::Status { status, .. }) => assert_eq!(status.as_u16(), 500),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[tokio::test]
    async fn email_goes_to_the_configured_endpoint() {
        let (endpoint, mut received) = receiver(warp::http::StatusCode::ACCEPTED);

        let sink = EmailSink::new(
            reqwest::Client::new(),
            EmailSettings {
                api_key: "key".to_owned(),
                recipient: "organizer@example.com".to_owned(),
                sender: "noreply@example.com".to_owned(),
                endpoint,
            },
        );

        sink.send(&registration()).await.expect("deliver email");

        let mail = received.recv().await.expect("receive mail request");
        assert_eq!(mail["subject"], "New Registration - SUPERMOM Contest");
        assert_eq!(mail["personalizations"][0]["to"][0]["email"], "organizer@example.com");
        assert_eq!(mail["from"]["email"], "noreply@example.com");
    }

    #[tokio::test]
    async fn dispatch_does_not_wait_for_slow_sinks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let notifier = Notifier::new(Arc::new(discard()), Duration::from_millis(100))
            .with_sink(Arc::new(Slow))
            .with_sink(Arc::new(Counting(counter.clone())));

        let start = Instant::now();
        let dispatch = notifier.dispatch(&registration());
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(dispatch.len(), 2);

        dispatch.join().await;

        assert!(start.elapsed() < Duration::from_secs(5), "slow sink was cut off");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_webhook_is_absorbed() {
        let url = Url::parse("http://127.0.0.1:9/unreachable").unwrap();
        let notifier = Notifier::from_settings(
            Arc::new(discard()),
            Duration::from_millis(500),
            Some(url),
            None,
        )
        .expect("build notifier");

        assert_eq!(notifier.sink_names(), vec!["webhook"]);

        notifier.dispatch(&registration()).join().await;
    }

    #[test]
    fn no_configuration_means_no_sinks() {
        let notifier =
            Notifier::from_settings(Arc::new(discard()), Duration::from_secs(1), None, None)
                .expect("build notifier");

        assert!(notifier.sink_names().is_empty());
        assert!(notifier.dispatch(&registration()).is_empty());
    }
}
