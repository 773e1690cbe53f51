use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{AppError, AppResult, GetField};

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static email pattern"));

pub const NAME_LEN: (usize, usize) = (2, 100);
pub const EMAIL_MAX_LEN: usize = 255;
pub const MESSAGE_LEN: (usize, usize) = (10, 1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    New,
    Read,
    Replied,
    Archived,
}

impl SubmissionStatus {
    pub const ALL: [SubmissionStatus; 4] = [Self::New, Self::Read, Self::Replied, Self::Archived];

    pub fn as_str(&self) -> &'static str {
        use SubmissionStatus::*;
        match self {
            New => "new",
            Read => "read",
            Replied => "replied",
            Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Branding,
    Web,
    Social,
    Packaging,
    Print,
    Logo,
    Other,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        use ProjectType::*;
        match self {
            Branding => "branding",
            Web => "web",
            Social => "social",
            Packaging => "packaging",
            Print => "print",
            Logo => "logo",
            Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        use ProjectType::*;
        match self {
            Branding => "Brand Identity",
            Web => "Web Design",
            Social => "Social Media",
            Packaging => "Packaging",
            Print => "Print & Marketing",
            Logo => "Logo Design",
            Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BudgetRange {
    #[serde(rename = "under-1k")]
    Under1k,
    #[serde(rename = "1k-5k")]
    From1kTo5k,
    #[serde(rename = "5k-10k")]
    From5kTo10k,
    #[serde(rename = "10k-25k")]
    From10kTo25k,
    #[serde(rename = "25k+")]
    Over25k,
}

impl BudgetRange {
    pub fn as_str(&self) -> &'static str {
        use BudgetRange::*;
        match self {
            Under1k => "under-1k",
            From1kTo5k => "1k-5k",
            From5kTo10k => "5k-10k",
            From10kTo25k => "10k-25k",
            Over25k => "25k+",
        }
    }

    pub fn label(&self) -> &'static str {
        use BudgetRange::*;
        match self {
            Under1k => "Under $1,000",
            From1kTo5k => "$1,000 - $5,000",
            From5kTo10k => "$5,000 - $10,000",
            From10kTo25k => "$10,000 - $25,000",
            Over25k => "$25,000+",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

macro_rules! str_enum_impl {
    ($T:ty, $kind:literal, [$($V:expr),+ $(,)?]) => {
        impl FromStr for $T {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                [$($V),+]
                    .into_iter()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| UnknownVariant { kind: $kind, value: s.to_owned() })
            }
        }

        impl fmt::Display for $T {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum_impl!(SubmissionStatus, "status", [
    SubmissionStatus::New,
    SubmissionStatus::Read,
    SubmissionStatus::Replied,
    SubmissionStatus::Archived,
]);
str_enum_impl!(ProjectType, "project type", [
    ProjectType::Branding, ProjectType::Web, ProjectType::Social, ProjectType::Packaging,
    ProjectType::Print, ProjectType::Logo, ProjectType::Other,
]);
str_enum_impl!(BudgetRange, "budget range", [
    BudgetRange::Under1k, BudgetRange::From1kTo5k, BudgetRange::From5kTo10k,
    BudgetRange::From10kTo25k, BudgetRange::Over25k,
]);

/// A stored contact submission. Only `status` ever changes after insertion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactSubmission {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub project_type: Option<ProjectType>,
    pub budget_range: Option<BudgetRange>,
    pub message: String,
    pub user_id: Option<String>,
    pub status: SubmissionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A validated, normalized submission ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubmission {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub project_type: Option<ProjectType>,
    pub budget_range: Option<BudgetRange>,
    pub message: String,
    pub user_id: Option<String>,
}

impl NewSubmission {
    /// Validates the raw request body in order (name, email, message, then the
    /// enumerated optionals), stopping at the first failure.
    pub fn from_json(body: &Value) -> AppResult<NewSubmission> {
        let name = body.str_field("name").map(str::trim);
        let Some(name) = name.filter(|name| within(name, NAME_LEN)) else {
            return Err(AppError::validation("Name must be between 2 and 100 characters"));
        };

        let email = body.str_field("email").map(str::trim);
        let Some(email) = email
            .filter(|email| EMAIL_PATTERN.is_match(email) && email.chars().count() <= EMAIL_MAX_LEN)
        else {
            return Err(AppError::validation("Please provide a valid email address"));
        };

        let message = body.str_field("message").map(str::trim);
        let Some(message) = message.filter(|message| within(message, MESSAGE_LEN)) else {
            return Err(AppError::validation("Message must be between 10 and 1000 characters"));
        };

        let project_type = optional(body, "projectType")
            .map(|raw| raw.parse::<ProjectType>())
            .transpose()
            .map_err(|_| AppError::validation("Please select a valid project type"))?;

        let budget_range = optional(body, "budgetRange")
            .map(|raw| raw.parse::<BudgetRange>())
            .transpose()
            .map_err(|_| AppError::validation("Please select a valid budget range"))?;

        Ok(NewSubmission {
            name: name.to_owned(),
            email: email.to_lowercase(),
            phone: optional(body, "phone").map(str::to_owned),
            company: optional(body, "company").map(str::to_owned),
            project_type,
            budget_range,
            message: message.to_owned(),
            user_id: optional(body, "userId").map(str::to_owned),
        })
    }
}

fn within(value: &str, (min, max): (usize, usize)) -> bool {
    let len = value.chars().count();
    (min..=max).contains(&len)
}

/// Absent, non-string and blank values all normalize to `None`.
fn optional<'a>(body: &'a Value, field: &str) -> Option<&'a str> {
    body.str_field(field).map(str::trim).filter(|value| !value.is_empty())
}
