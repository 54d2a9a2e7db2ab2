//! Wire shapes for the three upstreams. Only the fields the sync jobs read
//! or write are modelled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── NPWD (OData) ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ODataPage<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NpwdPrn {
    pub evidence_no: String,
    pub evidence_status_code: String,
    #[serde(default)]
    pub status_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub issued_to_entity_id: Option<String>,
    #[serde(default)]
    pub evidence_tonnes: Option<f64>,
    #[serde(default)]
    pub evidence_material: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NpwdProducer {
    #[serde(rename = "EPRId")]
    pub epr_id: String,
    pub producer_name: String,
    pub company_reg_no: Option<String>,
    pub status_code: String,
}

// ── RREPW ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RrepwPage<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RrepwPrn {
    pub prn_number: String,
    pub status: PrnStatus,
    pub status_updated_at: DateTime<Utc>,
    #[serde(default)]
    pub organisation_id: Option<String>,
    #[serde(default)]
    pub tonnage: Option<f64>,
    #[serde(default)]
    pub material: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RrepwStatusUpdate {
    pub status: PrnStatus,
    pub status_updated_at: Option<DateTime<Utc>>,
    pub source: &'static str,
}

/// PRN lifecycle states as RREPW names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrnStatus {
    AwaitingAcceptance,
    Accepted,
    Rejected,
    Cancelled,
    AwaitingCancellation,
}

impl PrnStatus {
    /// NPWD evidence status code for this state.
    pub fn npwd_code(self) -> &'static str {
        match self {
            PrnStatus::AwaitingAcceptance => "EV-AWACCEP",
            PrnStatus::Accepted => "EV-ACCEP",
            PrnStatus::Rejected => "EV-REJECT",
            PrnStatus::Cancelled => "EV-CANCEL",
            PrnStatus::AwaitingCancellation => "EV-AWACCEP-EPR",
        }
    }

    pub fn from_npwd_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "EV-AWACCEP" => Some(PrnStatus::AwaitingAcceptance),
            "EV-ACCEP" | "EV-ACCEPT" => Some(PrnStatus::Accepted),
            "EV-REJECT" => Some(PrnStatus::Rejected),
            "EV-CANCEL" => Some(PrnStatus::Cancelled),
            "EV-AWACCEP-EPR" => Some(PrnStatus::AwaitingCancellation),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PrnStatus::AwaitingAcceptance => "awaiting_acceptance",
            PrnStatus::Accepted => "accepted",
            PrnStatus::Rejected => "rejected",
            PrnStatus::Cancelled => "cancelled",
            PrnStatus::AwaitingCancellation => "awaiting_cancellation",
        }
    }
}

/// NPWD PATCH body row for a PRN status change.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NpwdPrnUpdate {
    pub evidence_no: String,
    pub evidence_status_code: &'static str,
    pub status_date: DateTime<Utc>,
}

impl From<&RrepwPrn> for NpwdPrnUpdate {
    fn from(prn: &RrepwPrn) -> Self {
        Self {
            evidence_no: prn.prn_number.clone(),
            evidence_status_code: prn.status.npwd_code(),
            status_date: prn.status_updated_at,
        }
    }
}

// ── Waste organisations ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organisation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub companies_house_number: Option<String>,
    #[serde(default)]
    pub status: OrganisationStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganisationStatus {
    #[default]
    Registered,
    Cancelled,
    #[serde(other)]
    Other,
}

impl From<&Organisation> for NpwdProducer {
    fn from(org: &Organisation) -> Self {
        let status_code = match org.status {
            OrganisationStatus::Registered => "PR-REGISTERED",
            OrganisationStatus::Cancelled => "PR-CANCELLED",
            OrganisationStatus::Other => "PR-PENDING",
        };
        Self {
            epr_id: org.id.clone(),
            producer_name: org.name.clone(),
            company_reg_no: org.companies_house_number.clone(),
            status_code: status_code.to_string(),
        }
    }
}
