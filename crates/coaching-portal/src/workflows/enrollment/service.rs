use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::http::StatusCode;
use serde::Serialize;
use tracing::{error, info, warn};

use super::clock::{Clock, SystemClock};
use super::credentials::{CredentialError, PasswordDigest, StudentIdGenerator};
use super::domain::{
    Enquiry, EnquiryFilter, EnquiryId, EnquiryStats, EnquiryStatus, EnquirySubmission, EnquiryView,
    Role, StudentAccount, StudentAccountView, StudentId, ValidationError,
};
use super::notification::CredentialNotifier;
use super::repository::{AccountRepository, EnquiryRepository, RepositoryError};
use crate::config::EnrollmentConfig;

/// Service composing the enquiry store, account store, ID generator and notifier.
pub struct EnrollmentService<E, A, N> {
    enquiries: Arc<E>,
    accounts: Arc<A>,
    notifier: Arc<N>,
    generator: StudentIdGenerator,
    clock: Arc<dyn Clock>,
    config: EnrollmentConfig,
}

static ENQUIRY_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_enquiry_id() -> EnquiryId {
    let id = ENQUIRY_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    EnquiryId(format!("enq-{id:06}"))
}

impl<E, A, N> EnrollmentService<E, A, N>
where
    E: EnquiryRepository + 'static,
    A: AccountRepository + 'static,
    N: CredentialNotifier + 'static,
{
    pub fn new(enquiries: Arc<E>, accounts: Arc<A>, notifier: Arc<N>, config: EnrollmentConfig) -> Self {
        let generator = StudentIdGenerator::new(&config.student_id_prefix);
        Self {
            enquiries,
            accounts,
            notifier,
            generator,
            clock: Arc::new(SystemClock),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the ID generator, e.g. with a seeded one.
    pub fn with_generator(mut self, generator: StudentIdGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn config(&self) -> &EnrollmentConfig {
        &self.config
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Record a new enquiry from the public join form.
    pub fn submit_enquiry(
        &self,
        submission: EnquirySubmission,
    ) -> Result<Enquiry, ProvisioningError> {
        submission.validate()?;

        let enquiry = Enquiry::from_submission(next_enquiry_id(), submission, self.clock.now());
        let stored = self
            .enquiries
            .insert(enquiry)
            .map_err(persistence(PersistenceStage::Intake))?;

        info!(enquiry_id = %stored.id, course = %stored.course, "enquiry received");
        Ok(stored)
    }

    pub fn get_enquiry(&self, id: &EnquiryId) -> Result<Enquiry, ProvisioningError> {
        self.enquiries
            .fetch(id)
            .map_err(persistence(PersistenceStage::Lookup))?
            .ok_or_else(|| ProvisioningError::NotFound(id.clone()))
    }

    /// Enquiries matching `filter`, newest submission first.
    pub fn list_enquiries(&self, filter: &EnquiryFilter) -> Result<Vec<Enquiry>, ProvisioningError> {
        let mut enquiries: Vec<Enquiry> = self
            .enquiries
            .list()
            .map_err(persistence(PersistenceStage::Lookup))?
            .into_iter()
            .filter(|enquiry| filter.matches(enquiry))
            .collect();
        enquiries.sort_by(|a, b| {
            b.submitted_at
                .cmp(&a.submitted_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(enquiries)
    }

    pub fn enquiry_stats(&self) -> Result<EnquiryStats, ProvisioningError> {
        let enquiries = self
            .enquiries
            .list()
            .map_err(persistence(PersistenceStage::Lookup))?;
        Ok(EnquiryStats::collect(&enquiries, self.clock.now()))
    }

    /// Operator status edit. `id_generated` is reserved for [`Self::provision`], and a
    /// provisioned enquiry cannot go back to `pending`.
    pub fn update_status(
        &self,
        id: &EnquiryId,
        status: EnquiryStatus,
    ) -> Result<Enquiry, ProvisioningError> {
        if !status.is_manual() {
            return Err(ProvisioningError::ManualStatusNotAllowed(status));
        }

        let mut enquiry = self.get_enquiry(id)?;
        if status == EnquiryStatus::Pending {
            if let Some(student_id) = &enquiry.student_id {
                return Err(ProvisioningError::AlreadyProvisioned {
                    enquiry_id: id.clone(),
                    student_id: student_id.clone(),
                });
            }
        }
        enquiry.status = status;
        self.enquiries
            .update(enquiry.clone())
            .map_err(persistence(PersistenceStage::StatusUpdate))?;

        info!(enquiry_id = %id, status = status.label(), "enquiry status changed");
        Ok(enquiry)
    }

    /// Turn an enquiry into an active student account and notify the student.
    ///
    /// Account and status writes fail the call; notification failures do not.
    pub fn provision(&self, id: &EnquiryId) -> Result<ProvisioningOutcome, ProvisioningError> {
        let mut enquiry = self.get_enquiry(id)?;

        if self.config.require_pending && enquiry.status != EnquiryStatus::Pending {
            return Err(ProvisioningError::NotPending {
                enquiry_id: id.clone(),
                status: enquiry.status,
            });
        }

        let now = self.clock.now();
        let student_id = self.generator.generate(now);
        let policy = self.config.credential_policy;
        let password = policy.initial_password(&enquiry.full_name);
        if policy.is_guessable() {
            warn!(%student_id, "issuing name-derived default password");
        }

        let digest = PasswordDigest::new(&password)?;
        let account = StudentAccount {
            student_id: student_id.clone(),
            email: enquiry.email.clone(),
            full_name: enquiry.full_name.clone(),
            phone: enquiry.phone.clone(),
            course: enquiry.course.clone(),
            password: digest,
            role: Role::Student,
            enquiry_id: enquiry.id.clone(),
            created_at: now,
            is_active: true,
        };
        let account = self
            .accounts
            .insert(account)
            .map_err(persistence(PersistenceStage::AccountWrite))?;

        enquiry.status = EnquiryStatus::IdGenerated;
        enquiry.student_id = Some(student_id.clone());
        if let Err(source) = self.enquiries.update(enquiry.clone()) {
            self.compensate(&student_id);
            return Err(ProvisioningError::Persistence {
                stage: PersistenceStage::StatusUpdate,
                source,
            });
        }

        info!(enquiry_id = %enquiry.id, %student_id, "student account provisioned");

        let notification = match self.notifier.send_credentials(
            &enquiry.full_name,
            &enquiry.email,
            &student_id,
            &password,
        ) {
            Ok(()) => NotificationOutcome::Sent,
            Err(err) => {
                warn!(
                    %student_id,
                    error = %err,
                    "credentials not delivered; student must be informed manually"
                );
                NotificationOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        };

        Ok(ProvisioningOutcome {
            student_id,
            password,
            account,
            enquiry,
            notification,
        })
    }

    /// Accounts ever issued for `enquiry_id`.
    pub fn accounts_for_enquiry(
        &self,
        enquiry_id: &EnquiryId,
    ) -> Result<Vec<StudentAccount>, ProvisioningError> {
        self.accounts
            .for_enquiry(enquiry_id)
            .map_err(persistence(PersistenceStage::Lookup))
    }

    /// Student ID + password login for the student portal.
    pub fn authenticate_student(
        &self,
        student_id: &str,
        password: &str,
    ) -> Result<StudentAccount, ProvisioningError> {
        let id = StudentId(student_id.trim().to_ascii_uppercase());
        let account = self
            .accounts
            .fetch(&id)
            .map_err(persistence(PersistenceStage::Lookup))?
            .ok_or(ProvisioningError::InvalidLogin)?;

        if !account.password.verify(password) {
            return Err(ProvisioningError::InvalidLogin);
        }
        if !account.is_active {
            return Err(ProvisioningError::AccountInactive(id));
        }
        Ok(account)
    }

    fn compensate(&self, student_id: &StudentId) {
        match self.accounts.remove(student_id) {
            Ok(()) => warn!(%student_id, "rolled back account after failed status update"),
            Err(err) => error!(
                %student_id,
                error = %err,
                "account left behind after failed status update"
            ),
        }
    }
}

/// Whether the credential notification reached the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Sent,
    Failed { reason: String },
}

/// Result of a successful provisioning call. The plaintext password is only available here.
#[derive(Debug, Clone)]
pub struct ProvisioningOutcome {
    pub student_id: StudentId,
    pub password: String,
    pub account: StudentAccount,
    pub enquiry: Enquiry,
    pub notification: NotificationOutcome,
}

impl ProvisioningOutcome {
    pub fn notification_failed(&self) -> bool {
        matches!(self.notification, NotificationOutcome::Failed { .. })
    }

    pub fn view(&self) -> ProvisioningView {
        let notification = match &self.notification {
            NotificationOutcome::Sent => NotificationView {
                status: "sent",
                warning: None,
            },
            NotificationOutcome::Failed { reason } => NotificationView {
                status: "failed",
                warning: Some(format!(
                    "Student ID generated, but the email notification failed ({reason}). \
                     Please inform the student manually."
                )),
            },
        };

        ProvisioningView {
            student_id: self.student_id.clone(),
            password: self.password.clone(),
            enquiry: self.enquiry.view(),
            account: self.account.view(),
            notification,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisioningView {
    pub student_id: StudentId,
    pub password: String,
    pub enquiry: EnquiryView,
    pub account: StudentAccountView,
    pub notification: NotificationView,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationView {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceStage {
    Intake,
    Lookup,
    AccountWrite,
    StatusUpdate,
}

impl fmt::Display for PersistenceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PersistenceStage::Intake => "store enquiry",
            PersistenceStage::Lookup => "read enrollment records",
            PersistenceStage::AccountWrite => "create student account",
            PersistenceStage::StatusUpdate => "update enquiry status",
        };
        f.write_str(label)
    }
}

fn persistence(stage: PersistenceStage) -> impl FnOnce(RepositoryError) -> ProvisioningError {
    move |source| ProvisioningError::Persistence { stage, source }
}

/// Error raised by the enrollment service.
#[derive(Debug, thiserror::Error)]
pub enum ProvisioningError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("enquiry {0} not found")]
    NotFound(EnquiryId),
    #[error("enquiry {enquiry_id} is already {}", .status.label())]
    NotPending {
        enquiry_id: EnquiryId,
        status: EnquiryStatus,
    },
    #[error("status {} can only be set by provisioning", .0.label())]
    ManualStatusNotAllowed(EnquiryStatus),
    #[error("enquiry {enquiry_id} already has Student ID {student_id}")]
    AlreadyProvisioned {
        enquiry_id: EnquiryId,
        student_id: StudentId,
    },
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("failed to {stage}: {source}")]
    Persistence {
        stage: PersistenceStage,
        #[source]
        source: RepositoryError,
    },
    #[error("invalid Student ID or password")]
    InvalidLogin,
    #[error("student account {0} is inactive")]
    AccountInactive(StudentId),
}

impl ProvisioningError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProvisioningError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ProvisioningError::NotFound(_) => StatusCode::NOT_FOUND,
            ProvisioningError::NotPending { .. }
            | ProvisioningError::ManualStatusNotAllowed(_)
            | ProvisioningError::AlreadyProvisioned { .. }
            | ProvisioningError::Persistence {
                source: RepositoryError::Conflict,
                ..
            } => StatusCode::CONFLICT,
            ProvisioningError::Persistence { .. } | ProvisioningError::Credential(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProvisioningError::InvalidLogin => StatusCode::UNAUTHORIZED,
            ProvisioningError::AccountInactive(_) => StatusCode::FORBIDDEN,
        }
    }
}
