use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::credentials::PasswordDigest;

/// Identifier wrapper for submitted enquiries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnquiryId(pub String);

impl fmt::Display for EnquiryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generated login identifier, e.g. `DPLR254821`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StudentId(pub String);

impl StudentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payload captured by the public "join" form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnquirySubmission {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub course: String,
    #[serde(default)]
    pub notes: String,
}

impl EnquirySubmission {
    /// Field presence checks applied at intake.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            ("full_name", &self.full_name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("course", &self.course),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(field));
            }
        }
        if !self.email.contains('@') {
            return Err(ValidationError::InvalidEmail(self.email.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
}

/// Lifecycle of an enquiry from submission to account issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnquiryStatus {
    Pending,
    IdGenerated,
    Contacted,
    Rejected,
}

impl EnquiryStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EnquiryStatus::Pending => "pending",
            EnquiryStatus::IdGenerated => "id_generated",
            EnquiryStatus::Contacted => "contacted",
            EnquiryStatus::Rejected => "rejected",
        }
    }

    /// Operator-facing badge text.
    pub const fn display_name(self) -> &'static str {
        match self {
            EnquiryStatus::Pending => "Pending",
            EnquiryStatus::IdGenerated => "ID Generated",
            EnquiryStatus::Contacted => "Contacted",
            EnquiryStatus::Rejected => "Rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "id_generated" => Some(Self::IdGenerated),
            "contacted" => Some(Self::Contacted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Whether an operator may set this status by hand.
    pub const fn is_manual(self) -> bool {
        !matches!(self, EnquiryStatus::IdGenerated)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enquiry {
    pub id: EnquiryId,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub course: String,
    pub notes: String,
    pub submitted_at: DateTime<Utc>,
    pub status: EnquiryStatus,
    pub student_id: Option<StudentId>,
}

impl Enquiry {
    pub fn from_submission(
        id: EnquiryId,
        submission: EnquirySubmission,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        let EnquirySubmission {
            full_name,
            email,
            phone,
            course,
            notes,
        } = submission;

        Self {
            id,
            full_name: full_name.trim().to_string(),
            email: email.trim().to_string(),
            phone: phone.trim().to_string(),
            course: course.trim().to_string(),
            notes,
            submitted_at,
            status: EnquiryStatus::Pending,
            student_id: None,
        }
    }

    pub fn view(&self) -> EnquiryView {
        EnquiryView {
            id: self.id.clone(),
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            course: self.course.clone(),
            notes: self.notes.clone(),
            submitted_at: self.submitted_at,
            status: self.status.label(),
            status_label: self.status.display_name(),
            student_id: self.student_id.clone(),
        }
    }
}

/// Serialized representation of an enquiry for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct EnquiryView {
    pub id: EnquiryId,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub course: String,
    pub notes: String,
    pub submitted_at: DateTime<Utc>,
    pub status: &'static str,
    pub status_label: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<StudentId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
}

/// Login account issued to a provisioned student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentAccount {
    pub student_id: StudentId,
    pub email: String,
    pub full_name: String,
    pub phone: String,
    pub course: String,
    pub password: PasswordDigest,
    pub role: Role,
    pub enquiry_id: EnquiryId,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

impl StudentAccount {
    pub fn view(&self) -> StudentAccountView {
        StudentAccountView {
            student_id: self.student_id.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            course: self.course.clone(),
            role: self.role,
            enquiry_id: self.enquiry_id.clone(),
            created_at: self.created_at,
            is_active: self.is_active,
        }
    }
}

/// Account fields safe to hand back to callers; never includes the credential.
#[derive(Debug, Clone, Serialize)]
pub struct StudentAccountView {
    pub student_id: StudentId,
    pub email: String,
    pub full_name: String,
    pub course: String,
    pub role: Role,
    pub enquiry_id: EnquiryId,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

/// Search and status criteria for the operator enquiry list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnquiryFilter {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<EnquiryStatus>,
}

impl EnquiryFilter {
    pub fn matches(&self, enquiry: &Enquiry) -> bool {
        if let Some(status) = self.status {
            if enquiry.status != status {
                return false;
            }
        }

        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let needle = term.to_lowercase();
                enquiry.full_name.to_lowercase().contains(&needle)
                    || enquiry.email.to_lowercase().contains(&needle)
                    || enquiry.phone.contains(term)
            }
        }
    }
}

/// Counters shown above the enquiry list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnquiryStats {
    pub total: usize,
    pub pending: usize,
    pub id_generated: usize,
    pub contacted: usize,
    pub rejected: usize,
    pub this_week: usize,
}

impl EnquiryStats {
    pub fn collect<'a>(enquiries: impl IntoIterator<Item = &'a Enquiry>, now: DateTime<Utc>) -> Self {
        let week_ago = now - chrono::Duration::days(7);
        let mut stats = Self::default();
        for enquiry in enquiries {
            stats.total += 1;
            match enquiry.status {
                EnquiryStatus::Pending => stats.pending += 1,
                EnquiryStatus::IdGenerated => stats.id_generated += 1,
                EnquiryStatus::Contacted => stats.contacted += 1,
                EnquiryStatus::Rejected => stats.rejected += 1,
            }
            if enquiry.submitted_at >= week_ago {
                stats.this_week += 1;
            }
        }
        stats
    }
}
