use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::contest::{Contest, Requirement};
use crate::normalization::{self, digits_only, normalize_text};

/// A registration as submitted by a visitor, before validation.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// The registrant's name.
    #[serde(default)]
    pub name: Option<String>,

    /// The registrant's age in years.
    #[serde(default)]
    pub age: Option<i64>,

    /// The WhatsApp number, in whatever format the visitor typed it.
    #[serde(default)]
    pub whatsapp: Option<String>,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    pub email: Option<String>,

    /// The contest entered; plain registration if absent or null.
    #[serde(default, deserialize_with = "contest_or_default")]
    pub contest: Contest,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    pub message: Option<String>,

    /// How many children the registrant has. Only meaningful for some contests.
    #[serde(default)]
    pub number_of_children: Option<i64>,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    pub photo_url: Option<String>,

    #[serde(default, deserialize_with = "normalization::deserialize_option")]
    pub video_url: Option<String>,
}

impl Submission {
    /// Whether the two fields every registration needs were supplied at all.
    pub fn has_required_fields(&self) -> bool {
        let present = |f: &Option<String>| f.as_deref().map_or(false, |s| !s.trim().is_empty());

        present(&self.name) && present(&self.whatsapp)
    }
}

fn contest_or_default<'de, D>(deserializer: D) -> Result<Contest, D::Error>
where
    D: Deserializer<'de>,
{
    let contest: Option<Contest> = Deserialize::deserialize(deserializer)?;
    Ok(contest.unwrap_or_default())
}

/// A validated registration, normalized and ready to be stored.
#[derive(Clone, Debug, PartialEq)]
pub struct NewRegistration {
    pub(crate) name: String,
    pub(crate) age: Option<i16>,
    pub(crate) whatsapp: String,
    pub(crate) email: Option<String>,
    pub(crate) contest: Contest,
    pub(crate) message: Option<String>,
    pub(crate) number_of_children: Option<i16>,
    pub(crate) photo_url: Option<String>,
    pub(crate) video_url: Option<String>,
    pub(crate) ip_address: String,
}

impl NewRegistration {
    /// Shapes a submission that has already passed validation for
    /// storage. Fields the chosen contest doesn't use are dropped.
    pub fn from_submission(submission: Submission, ip_address: impl Into<String>) -> Self {
        let Submission {
            name,
            age,
            whatsapp,
            email,
            contest,
            message,
            number_of_children,
            photo_url,
            video_url,
        } = submission;

        let number_of_children = match contest.requirements().children {
            Requirement::Required => number_of_children.map(|n| n as i16),
            Requirement::NotApplicable => None,
        };

        NewRegistration {
            name: normalize_text(name.unwrap_or_default()),
            age: age.map(|a| a as i16),
            whatsapp: digits_only(whatsapp.unwrap_or_default()),
            email,
            contest,
            message,
            number_of_children,
            photo_url,
            video_url,
            ip_address: ip_address.into(),
        }
    }

    pub fn whatsapp(&self) -> &str {
        &self.whatsapp
    }

    pub fn contest(&self) -> Contest {
        self.contest
    }

    /// Attaches the identity assigned by the store.
    pub fn into_registration(self, id: Uuid, created_at: OffsetDateTime) -> Registration {
        Registration {
            id,
            name: self.name,
            age: self.age,
            whatsapp: self.whatsapp,
            email: self.email,
            contest: self.contest,
            message: self.message,
            number_of_children: self.number_of_children,
            photo_url: self.photo_url,
            video_url: self.video_url,
            created_at,
            ip_address: self.ip_address,
        }
    }
}

/// A stored registration. Never modified once created.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) age: Option<i16>,
    pub(crate) whatsapp: String,
    pub(crate) email: Option<String>,
    pub(crate) contest: Contest,
    pub(crate) message: Option<String>,
    pub(crate) number_of_children: Option<i16>,
    pub(crate) photo_url: Option<String>,
    pub(crate) video_url: Option<String>,

    #[serde(serialize_with = "serialize_timestamp")]
    pub(crate) created_at: OffsetDateTime,

    pub(crate) ip_address: String,
}

impl Registration {
    pub fn id(&self) -> &Uuid {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn whatsapp(&self) -> &str {
        &self.whatsapp
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn contest(&self) -> Contest {
        self.contest
    }

    pub fn number_of_children(&self) -> Option<i16> {
        self.number_of_children
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn ip_address(&self) -> &str {
        &self.ip_address
    }
}

/// Formats a timestamp as RFC 3339, the ISO-8601 profile used in
/// every external representation.
pub fn format_timestamp(timestamp: OffsetDateTime) -> String {
    timestamp.format(time::Format::Rfc3339)
}

fn serialize_timestamp<S>(timestamp: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_timestamp(*timestamp))
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::{NewRegistration, Submission};
    use crate::contest::Contest;

    fn parse(json: &str) -> Submission {
        serde_json::from_str(json).expect("parse submission")
    }

    #[test]
    fn missing_contest_defaults_to_none() {
        let submission = parse(r#"{"name": "Asha Rao", "whatsapp": "9876543210"}"#);

        assert_eq!(submission.contest, Contest::None);
        assert!(submission.has_required_fields());
    }

    #[test]
    fn blank_required_fields_count_as_missing() {
        assert!(!parse(r#"{"name": "  ", "whatsapp": "9876543210"}"#).has_required_fields());
        assert!(!parse(r#"{"name": "Asha"}"#).has_required_fields());
    }

    #[test]
    fn shaping_normalizes_and_drops_inapplicable_fields() {
        let submission = parse(
            r#"{"name": " Asha Rao ", "whatsapp": "98765 43210", "contest": "GENERAL",
                "numberOfChildren": 3, "email": "  ", "message": " hello "}"#,
        );

        let new = NewRegistration::from_submission(submission, "10.0.0.1");

        assert_eq!(new.name, "Asha Rao");
        assert_eq!(new.whatsapp(), "9876543210");
        assert_eq!(new.number_of_children, None);
        assert_eq!(new.email, None);
        assert_eq!(new.message.as_deref(), Some("hello"));
        assert_eq!(new.ip_address, "10.0.0.1");
    }

    #[test]
    fn super_mom_keeps_children() {
        let submission = parse(
            r#"{"name": "Meera", "whatsapp": "9876543210", "contest": "SUPERMOM", "numberOfChildren": 2}"#,
        );

        let new = NewRegistration::from_submission(submission, "unknown");

        assert_eq!(new.number_of_children, Some(2));
    }

    #[test]
    fn stored_records_serialize_in_camel_case() {
        let submission = parse(r#"{"name": "Asha", "whatsapp": "9876543210", "photoUrl": "https://x.example/p.jpg"}"#);
        let registration = NewRegistration::from_submission(submission, "1.2.3.4")
            .into_registration(Uuid::nil(), OffsetDateTime::unix_epoch());

        let value = serde_json::to_value(&registration).unwrap();

        assert_eq!(value["photoUrl"], "https://x.example/p.jpg");
        assert_eq!(value["ipAddress"], "1.2.3.4");
        assert_eq!(value["contest"], "NONE");
        assert!(value["createdAt"]
            .as_str()
            .unwrap()
            .starts_with("1970-01-01T00:00:00"));
        assert!(value["numberOfChildren"].is_null());
    }
}
