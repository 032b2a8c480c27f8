//! Student enquiry intake and account provisioning.
//!
//! An enquiry submitted through the public join form waits in `pending` until an operator
//! provisions it: a Student ID and initial password are issued, a student account is
//! written, the enquiry moves to `id_generated`, and the credentials are emailed on a
//! best-effort basis.

pub mod clock;
pub mod credentials;
pub mod domain;
pub mod notification;
pub mod repository;
pub mod router;
pub mod service;
pub mod sessions;

#[cfg(test)]
mod tests;

pub use clock::{Clock, FixedClock, SystemClock};
pub use credentials::{
    derive_default_password, is_well_formed, CredentialError, CredentialPolicy, PasswordDigest,
    StudentIdGenerator,
};
pub use domain::{
    Enquiry, EnquiryFilter, EnquiryId, EnquiryStats, EnquiryStatus, EnquirySubmission,
    EnquiryView, Role, StudentAccount, StudentAccountView, StudentId, ValidationError,
};
pub use notification::{
    CredentialNotifier, DeliveryRecord, DeliveryStatus, EmailMessage, EmailNotifier,
    MailTransport, NotificationError, TracingMailTransport,
};
pub use repository::{AccountRepository, EnquiryRepository, RepositoryError};
pub use router::{enrollment_router, PortalState};
pub use service::{
    EnrollmentService, NotificationOutcome, PersistenceStage, ProvisioningError,
    ProvisioningOutcome, ProvisioningView,
};
pub use sessions::{AdminSession, AdminSessions, SessionError};
