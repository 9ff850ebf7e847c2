use serde::Serialize;
use warp::reject;

use crate::errors::BackendError;
use crate::validation::Field;

#[derive(Debug)]
pub struct Rejection {
    pub(crate) context: Context,
    pub(crate) error: BackendError,
}

impl Rejection {
    pub fn new(context: Context, error: BackendError) -> Self {
        Rejection { context, error }
    }

    /// The body sent to the client. Only the public message leaves the
    /// process; the context stays in the logs.
    pub fn flatten(&self) -> FlattenedRejection {
        FlattenedRejection {
            error: self.error.public_message(),
            field: self.error.field(),
        }
    }
}

impl reject::Reject for Rejection {}

#[derive(Debug, Serialize)]
pub struct FlattenedRejection {
    pub(crate) error: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) field: Option<Field>,
}

#[derive(Clone, Debug)]
pub enum Context {
    Register { client: String },
    Registrations {
        contest: Option<String>,
        search: Option<String>,
    },
}

impl Context {
    pub fn register(client: &str) -> Context {
        Context::Register {
            client: client.to_owned(),
        }
    }

    pub fn registrations(contest: Option<&str>, search: Option<&str>) -> Context {
        Context::Registrations {
            contest: contest.map(ToOwned::to_owned),
            search: search.map(ToOwned::to_owned),
        }
    }
}
