use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::rate_limit::{DEFAULT_LIMIT, DEFAULT_WINDOW};

/// Default bound on a single notification attempt.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// The SendGrid endpoint used unless `FESTIVAL_SENDGRID_ENDPOINT` says otherwise.
pub const DEFAULT_SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

/// Returns the value of the named environment variable if it exists or panics.
pub fn get_variable(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| panic!("must define {} environment variable", name))
}

/// Returns the value of the named environment variable, treating a
/// blank value the same as an absent one.
pub fn get_optional_variable(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parses the named environment variable, falling back to `default`
/// if it isn't set. Panics if it is set but malformed.
pub fn parse_variable<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match get_optional_variable(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("parse {} ({:?}): {}", name, raw, e)),
        None => default,
    }
}

/// Runtime settings shared by the request handlers.
#[derive(Clone, Debug)]
pub struct Config {
    /// The shared secret expected in the admin header.
    pub(crate) admin_secret: String,

    /// Link to the public spreadsheet, shown to operators only.
    pub(crate) sheet_url: Option<Url>,

    /// Submissions allowed per client per window.
    pub(crate) rate_limit: u32,

    /// Length of a rate-limiting window.
    pub(crate) rate_limit_window: Duration,

    /// Upper bound on each notification attempt.
    pub(crate) notify_timeout: Duration,
}

impl Config {
    pub fn new(admin_secret: impl Into<String>) -> Self {
        Self {
            admin_secret: admin_secret.into(),
            sheet_url: None,
            rate_limit: DEFAULT_LIMIT,
            rate_limit_window: DEFAULT_WINDOW,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }

    pub fn with_sheet_url(mut self, sheet_url: Option<Url>) -> Self {
        self.sheet_url = sheet_url;
        self
    }

    pub fn with_rate_limit(mut self, limit: u32, window: Duration) -> Self {
        self.rate_limit = limit;
        self.rate_limit_window = window;
        self
    }

    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    /// Reads the handler settings from the environment.
    pub fn from_env() -> Self {
        let sheet_url = get_optional_variable("FESTIVAL_SHEETS_URL")
            .map(|u| Url::parse(&u).unwrap_or_else(|e| panic!("parse FESTIVAL_SHEETS_URL: {}", e)));

        let window: u64 = parse_variable(
            "FESTIVAL_RATE_LIMIT_WINDOW_SECONDS",
            DEFAULT_WINDOW.as_secs(),
        );
        let timeout: u64 = parse_variable(
            "FESTIVAL_NOTIFY_TIMEOUT_SECONDS",
            DEFAULT_NOTIFY_TIMEOUT.as_secs(),
        );

        Config::new(get_variable("FESTIVAL_ADMIN_SECRET"))
            .with_sheet_url(sheet_url)
            .with_rate_limit(
                parse_variable("FESTIVAL_RATE_LIMIT", DEFAULT_LIMIT),
                Duration::from_secs(window),
            )
            .with_notify_timeout(Duration::from_secs(timeout))
    }

    pub fn rate_limit(&self) -> u32 {
        self.rate_limit
    }

    pub fn rate_limit_window(&self) -> Duration {
        self.rate_limit_window
    }

    pub fn notify_timeout(&self) -> Duration {
        self.notify_timeout
    }
}

/// Credentials for the optional email channel. All three values must
/// be present for the channel to be enabled.
#[derive(Clone, Debug)]
pub struct EmailSettings {
    pub api_key: String,
    pub recipient: String,
    pub sender: String,
    pub endpoint: Url,
}

impl EmailSettings {
    pub fn from_env() -> Option<Self> {
        let api_key = get_optional_variable("SENDGRID_API_KEY")?;
        let recipient = get_optional_variable("FESTIVAL_NOTIFICATION_EMAIL")?;
        let sender = get_optional_variable("FESTIVAL_NOTIFICATION_SENDER")?;

        let endpoint = get_optional_variable("FESTIVAL_SENDGRID_ENDPOINT")
            .unwrap_or_else(|| DEFAULT_SENDGRID_ENDPOINT.to_owned());
        let endpoint = Url::parse(&endpoint)
            .unwrap_or_else(|e| panic!("parse FESTIVAL_SENDGRID_ENDPOINT: {}", e));

        Some(Self {
            api_key,
            recipient,
            sender,
            endpoint,
        })
    }
}
