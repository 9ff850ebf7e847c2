use time::Date;

use crate::registration::{format_timestamp, Registration};

/// Column headers, in output order.
pub const COLUMNS: [&str; 12] = [
    "ID",
    "Name",
    "Age",
    "WhatsApp",
    "Email",
    "Contest",
    "Message",
    "Number of Children",
    "Photo URL",
    "Video URL",
    "Registration Date",
    "IP Address",
];

/// Renders registrations as CSV: a header line, then one line per
/// registration, with every field quoted. Line breaks inside a field
/// become spaces so each registration stays on a single line.
pub fn render_csv(registrations: &[Registration]) -> String {
    let mut lines = Vec::with_capacity(registrations.len() + 1);

    lines.push(render_line(COLUMNS.iter().copied()));

    for r in registrations {
        let age = r.age.map(|a| a.to_string()).unwrap_or_default();
        let children = r
            .number_of_children
            .map(|n| n.to_string())
            .unwrap_or_default();
        let id = r.id.to_string();
        let created_at = format_timestamp(r.created_at);

        lines.push(render_line(
            [
                id.as_str(),
                r.name.as_str(),
                age.as_str(),
                r.whatsapp.as_str(),
                r.email.as_deref().unwrap_or_default(),
                r.contest.as_str(),
                r.message.as_deref().unwrap_or_default(),
                children.as_str(),
                r.photo_url.as_deref().unwrap_or_default(),
                r.video_url.as_deref().unwrap_or_default(),
                created_at.as_str(),
                r.ip_address.as_str(),
            ]
            .iter()
            .copied(),
        ));
    }

    lines.join("\n")
}

/// The attachment name for an export made on `date`.
pub fn csv_filename(date: Date) -> String {
    format!("registrations-{}.csv", date.format("%F"))
}

fn render_line<'a>(fields: impl Iterator<Item = &'a str>) -> String {
    fields.map(quote).collect::<Vec<_>>().join(",")
}

fn quote(field: &str) -> String {
    let flattened = field.replace("\r\n", " ").replace(&['\r', '\n'][..], " ");

    format!("\"{}\"", flattened.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use time::{Date, OffsetDateTime};
    use uuid::Uuid;

    use super::*;
    use crate::contest::Contest;
    use crate::registration::{NewRegistration, Submission};

    fn registration(name: &str, message: Option<&str>) -> Registration {
        let submission = Submission {
            name: Some(name.to_owned()),
            whatsapp: Some("9876543210".to_owned()),
            email: Some("asha@example.com".to_owned()),
            contest: Contest::SuperMom,
            number_of_children: Some(3),
            message: message.map(ToOwned::to_owned),
            ..Default::default()
        };

        NewRegistration::from_submission(submission, "203.0.113.9")
            .into_registration(Uuid::nil(), OffsetDateTime::unix_epoch())
    }

    /// Splits a line of quoted fields; good enough for fields without
    /// embedded commas.
    fn fields(line: &str) -> Vec<&str> {
        line.split(',').collect()
    }

    #[test]
    fn one_line_per_registration_plus_header() {
        let registrations: Vec<_> = (0..3).map(|_| registration("Asha", None)).collect();

        let csv = render_csv(&registrations);

        assert_eq!(csv.lines().count(), 4);
        assert!(!csv.ends_with('\n'));
    }

    #[test]
    fn empty_export_is_just_the_header() {
        let csv = render_csv(&[]);

        assert_eq!(csv.lines().count(), 1);
        assert_eq!(fields(&csv).len(), COLUMNS.len());
        assert!(csv.starts_with("\"ID\",\"Name\",\"Age\""));
    }

    #[test]
    fn fields_are_quoted_in_column_order() {
        let csv = render_csv(&[registration("Asha", Some("hello"))]);
        let row = csv.lines().nth(1).unwrap();
        let row = fields(row);

        assert_eq!(row.len(), 12);
        assert!(row.iter().all(|f| f.starts_with('"') && f.ends_with('"')));
        assert_eq!(row[0], format!("\"{}\"", Uuid::nil()));
        assert_eq!(row[1], "\"Asha\"");
        assert_eq!(row[2], "\"\"");
        assert_eq!(row[3], "\"9876543210\"");
        assert_eq!(row[4], "\"asha@example.com\"");
        assert_eq!(row[5], "\"SUPERMOM\"");
        assert_eq!(row[6], "\"hello\"");
        assert_eq!(row[7], "\"3\"");
        assert_eq!(row[8], "\"\"");
        assert!(row[10].starts_with("\"1970-01-01T00:00:00"));
        assert_eq!(row[11], "\"203.0.113.9\"");
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        let csv = render_csv(&[registration("Asha", Some("say \"hi\""))]);

        assert!(csv.contains("\"say \"\"hi\"\"\""));
    }

    #[test]
    fn multi_line_messages_stay_on_one_line() {
        let registrations = vec![
            registration("Asha", Some("line one\nline two")),
            registration("Meera", Some("first\r\nsecond\rthird")),
        ];

        let csv = render_csv(&registrations);

        assert_eq!(csv.lines().count(), 3);
        assert!(csv.contains("\"line one line two\""));
        assert!(csv.contains("\"first second third\""));
    }

    #[test]
    fn filename_uses_the_date() {
        assert_eq!(csv_filename(Date::try_from_ymd(2026, 10, 19).unwrap()), "registrations-2026-10-19.csv");
    }
}
