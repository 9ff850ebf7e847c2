//! Field rules for incoming registrations.
//!
//! Every rule is checked independently and all violations are
//! reported together, so a client fixing one field at a time sees the
//! remaining problems on the next attempt.

use std::fmt;

use serde::Serialize;
use url::Url;

use crate::contest::Requirement;
use crate::normalization::digits_only;
use crate::registration::Submission;

pub const MIN_AGE: i64 = 1;
pub const MAX_AGE: i64 = 120;
pub const MIN_CHILDREN: i64 = 1;
pub const MAX_CHILDREN: i64 = 20;

/// The submission fields that rules apply to, named as on the wire.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Name,
    Age,
    Whatsapp,
    Email,
    NumberOfChildren,
    PhotoUrl,
    VideoUrl,
}

/// Why a field was rejected.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    Missing,
    InvalidCharacters,
    InvalidMobileNumber,
    InvalidEmail,
    OutOfRange,
    InvalidUrl,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct Violation {
    pub field: Field,
    pub reason: Reason,
}

impl Violation {
    fn new(field: Field, reason: Reason) -> Self {
        Self { field, reason }
    }

    /// The message shown to the visitor.
    pub fn message(&self) -> &'static str {
        use Field::*;
        use Reason::*;

        match (self.field, self.reason) {
            (Name, Missing) => "Name is required",
            (Name, _) => "Name can only contain letters and spaces",
            (Whatsapp, Missing) => "WhatsApp number is required",
            (Whatsapp, _) => "Please enter a valid 10-digit mobile number",
            (Email, _) => "Please enter a valid email address (e.g., user@gmail.com)",
            (Age, _) => "Please enter a valid age (1-120)",
            (NumberOfChildren, _) => "Please enter the number of children (1-20)",
            (PhotoUrl, _) => "Photo link must be an http or https URL",
            (VideoUrl, _) => "Video link must be an http or https URL",
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// A non-empty list of violations.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn first(&self) -> &Violation {
        &self.0[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Violation> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: Field) -> bool {
        self.0.iter().any(|v| v.field == field)
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.first(), f)
    }
}

/// Checks every field rule against a submission.
pub fn validate(submission: &Submission) -> Result<(), Violations> {
    let mut violations = vec![];
    let mut check = |field: Field, result: Result<(), Reason>| {
        if let Err(reason) = result {
            violations.push(Violation::new(field, reason));
        }
    };

    check(Field::Name, check_name(submission.name.as_deref()));
    check(Field::Age, check_optional_range(submission.age, MIN_AGE, MAX_AGE));
    check(Field::Whatsapp, check_whatsapp(submission.whatsapp.as_deref()));
    check(Field::Email, check_optional(submission.email.as_deref(), check_email));

    if submission.contest.requirements().children == Requirement::Required {
        check(
            Field::NumberOfChildren,
            check_required_range(submission.number_of_children, MIN_CHILDREN, MAX_CHILDREN),
        );
    }

    check(Field::PhotoUrl, check_optional(submission.photo_url.as_deref(), check_media_url));
    check(Field::VideoUrl, check_optional(submission.video_url.as_deref(), check_media_url));

    if violations.is_empty() {
        Ok(())
    } else {
        Err(Violations(violations))
    }
}

/// Letters and whitespace only, after trimming.
pub fn check_name(name: Option<&str>) -> Result<(), Reason> {
    let name = name.map(str::trim).unwrap_or_default();

    if name.is_empty() {
        Err(Reason::Missing)
    } else if name
        .chars()
        .all(|c| c.is_ascii_alphabetic() || c.is_whitespace())
    {
        Ok(())
    } else {
        Err(Reason::InvalidCharacters)
    }
}

/// Ten digits starting with 6 to 9, once everything else is stripped.
pub fn check_whatsapp(whatsapp: Option<&str>) -> Result<(), Reason> {
    let whatsapp = match whatsapp.map(str::trim) {
        None | Some("") => return Err(Reason::Missing),
        Some(w) => digits_only(w),
    };

    match whatsapp.as_bytes() {
        [first, ..] if whatsapp.len() == 10 && (b'6'..=b'9').contains(first) => Ok(()),
        _ => Err(Reason::InvalidMobileNumber),
    }
}

/// `local@domain.tld`: one `@`, no whitespace, and a dot inside the
/// domain with something on either side of it.
pub fn check_email(email: &str) -> Result<(), Reason> {
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = match parts.next() {
        Some(d) => d,
        None => return Err(Reason::InvalidEmail),
    };

    let clean = |s: &str| !s.is_empty() && !s.contains(|c: char| c == '@' || c.is_whitespace());
    let dotted = domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len());

    if clean(local) && clean(domain) && dotted {
        Ok(())
    } else {
        Err(Reason::InvalidEmail)
    }
}

fn check_media_url(raw: &str) -> Result<(), Reason> {
    match Url::parse(raw) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
        _ => Err(Reason::InvalidUrl),
    }
}

fn check_optional(
    value: Option<&str>,
    rule: impl Fn(&str) -> Result<(), Reason>,
) -> Result<(), Reason> {
    value.map_or(Ok(()), rule)
}

fn check_optional_range(value: Option<i64>, min: i64, max: i64) -> Result<(), Reason> {
    match value {
        Some(v) if v < min || v > max => Err(Reason::OutOfRange),
        _ => Ok(()),
    }
}

fn check_required_range(value: Option<i64>, min: i64, max: i64) -> Result<(), Reason> {
    match value {
        None => Err(Reason::Missing),
        v => check_optional_range(v, min, max),
    }
}
