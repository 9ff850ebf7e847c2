use serde::Serialize;
use uuid::Uuid;

use crate::contest::ContestInfo;
use crate::registration::Registration;

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SuccessResponse<'a> {
    Contests {
        success: bool,
        data: Vec<ContestInfo>,
    },
    Healthz {
        revision: Option<&'a str>,
        timestamp: Option<&'a str>,
        version: &'a str,
    },
    Registered {
        success: bool,
        message: &'a str,
        id: Uuid,
    },
    Registrations {
        success: bool,
        data: Vec<Registration>,
        total: usize,
        filters: AppliedFilters<'a>,
        #[serde(rename = "sheetUrl", skip_serializing_if = "Option::is_none")]
        sheet_url: Option<&'a str>,
    },
}

/// The filters an admin listing was actually produced with.
#[derive(Debug, Serialize)]
pub struct AppliedFilters<'a> {
    pub contest: &'a str,
    pub search: Option<&'a str>,
}
