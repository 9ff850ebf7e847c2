use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct RegistrationsQuery {
    pub contest: Option<String>,
    pub search: Option<String>,
    pub export: Option<String>,
}

impl RegistrationsQuery {
    /// Whether the listing should be sent as a CSV attachment.
    pub fn wants_csv(&self) -> bool {
        self.export
            .as_deref()
            .map_or(false, |e| e.trim().eq_ignore_ascii_case("csv"))
    }
}
