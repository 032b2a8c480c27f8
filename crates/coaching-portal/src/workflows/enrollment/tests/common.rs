use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::config::{AdminConfig, EnrollmentConfig};
use crate::workflows::enrollment::clock::FixedClock;
use crate::workflows::enrollment::credentials::StudentIdGenerator;
use crate::workflows::enrollment::domain::{
    Enquiry, EnquiryId, EnquirySubmission, StudentAccount, StudentId,
};
use crate::workflows::enrollment::notification::{CredentialNotifier, NotificationError};
use crate::workflows::enrollment::repository::{
    AccountRepository, EnquiryRepository, RepositoryError,
};
use crate::workflows::enrollment::sessions::AdminSessions;
use crate::workflows::enrollment::EnrollmentService;

pub(super) type TestService = EnrollmentService<MemoryEnquiries, MemoryAccounts, RecordingNotifier>;

pub(super) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 4, 10, 0, 0).unwrap()
}

pub(super) fn amit_submission() -> EnquirySubmission {
    EnquirySubmission {
        full_name: "Amit Kumar".to_string(),
        email: "amit@x.com".to_string(),
        phone: "9876543210".to_string(),
        course: "NEET".to_string(),
        notes: "Evening batch preferred".to_string(),
    }
}

pub(super) fn rahul_submission() -> EnquirySubmission {
    EnquirySubmission {
        full_name: "Rahul Sharma".to_string(),
        email: "rahul.sharma@example.com".to_string(),
        phone: "9123456780".to_string(),
        course: "JEE Main".to_string(),
        notes: String::new(),
    }
}

pub(super) fn admin_config() -> AdminConfig {
    AdminConfig {
        email: "admin@dopplercoaching.com".to_string(),
        password: "admin123".to_string(),
        session_ttl_minutes: 60,
    }
}

pub(super) fn build_service_with<A: AccountRepository + 'static>(
    enquiries: Arc<MemoryEnquiries>,
    accounts: Arc<A>,
    notifier: Arc<RecordingNotifier>,
    config: EnrollmentConfig,
) -> EnrollmentService<MemoryEnquiries, A, RecordingNotifier> {
    EnrollmentService::new(enquiries, accounts, notifier, config)
        .with_clock(Arc::new(FixedClock(fixed_now())))
        .with_generator(StudentIdGenerator::seeded("DPLR", 2025))
}

pub(super) fn build_service(
    config: EnrollmentConfig,
) -> (
    TestService,
    Arc<MemoryEnquiries>,
    Arc<MemoryAccounts>,
    Arc<RecordingNotifier>,
) {
    let enquiries = Arc::new(MemoryEnquiries::default());
    let accounts = Arc::new(MemoryAccounts::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let service = build_service_with(
        enquiries.clone(),
        accounts.clone(),
        notifier.clone(),
        config,
    );
    (service, enquiries, accounts, notifier)
}

pub(super) fn sessions() -> Arc<AdminSessions> {
    Arc::new(AdminSessions::new(
        &admin_config(),
        Arc::new(FixedClock(fixed_now())),
    ))
}

#[derive(Default)]
pub(super) struct MemoryEnquiries {
    records: Mutex<HashMap<EnquiryId, Enquiry>>,
    fail_updates: AtomicBool,
}

impl MemoryEnquiries {
    pub(super) fn fail_updates(&self) {
        self.fail_updates.store(true, Ordering::SeqCst);
    }

    pub(super) fn stored(&self, id: &EnquiryId) -> Enquiry {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .get(id)
            .cloned()
            .expect("enquiry stored")
    }
}

impl EnquiryRepository for MemoryEnquiries {
    fn insert(&self, enquiry: Enquiry) -> Result<Enquiry, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&enquiry.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(enquiry.id.clone(), enquiry.clone());
        Ok(enquiry)
    }

    fn update(&self, enquiry: Enquiry) -> Result<(), RepositoryError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("write quota exceeded".to_string()));
        }
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        match guard.get_mut(&enquiry.id) {
            Some(slot) => {
                *slot = enquiry;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &EnquiryId) -> Result<Option<Enquiry>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Enquiry>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.values().cloned().collect())
    }
}

#[derive(Default)]
pub(super) struct MemoryAccounts {
    records: Mutex<HashMap<StudentId, StudentAccount>>,
}

impl MemoryAccounts {
    pub(super) fn all(&self) -> Vec<StudentAccount> {
        self.records
            .lock()
            .expect("repository mutex poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub(super) fn deactivate(&self, id: &StudentId) {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if let Some(account) = guard.get_mut(id) {
            account.is_active = false;
        }
    }
}

impl AccountRepository for MemoryAccounts {
    fn insert(&self, account: StudentAccount) -> Result<StudentAccount, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&account.student_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(account.student_id.clone(), account.clone());
        Ok(account)
    }

    fn fetch(&self, id: &StudentId) -> Result<Option<StudentAccount>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn remove(&self, id: &StudentId) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.remove(id).map(|_| ()).ok_or(RepositoryError::NotFound)
    }

    fn for_enquiry(&self, enquiry_id: &EnquiryId) -> Result<Vec<StudentAccount>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|account| &account.enquiry_id == enquiry_id)
            .cloned()
            .collect())
    }
}

pub(super) struct UnavailableAccounts;

impl AccountRepository for UnavailableAccounts {
    fn insert(&self, _account: StudentAccount) -> Result<StudentAccount, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &StudentId) -> Result<Option<StudentAccount>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn remove(&self, _id: &StudentId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn for_enquiry(&self, _enquiry_id: &EnquiryId) -> Result<Vec<StudentAccount>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Accepts writes but cannot delete, so compensation fails.
#[derive(Default)]
pub(super) struct UndeletableAccounts {
    pub(super) inner: MemoryAccounts,
}

impl AccountRepository for UndeletableAccounts {
    fn insert(&self, account: StudentAccount) -> Result<StudentAccount, RepositoryError> {
        self.inner.insert(account)
    }

    fn fetch(&self, id: &StudentId) -> Result<Option<StudentAccount>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn remove(&self, _id: &StudentId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("delete permission denied".to_string()))
    }

    fn for_enquiry(&self, enquiry_id: &EnquiryId) -> Result<Vec<StudentAccount>, RepositoryError> {
        self.inner.for_enquiry(enquiry_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct SentCredentials {
    pub(super) name: String,
    pub(super) email: String,
    pub(super) student_id: StudentId,
    pub(super) password: String,
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    sent: Mutex<Vec<SentCredentials>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub(super) fn failing() -> Self {
        Self {
            fail: AtomicBool::new(true),
            ..Default::default()
        }
    }

    pub(super) fn sent(&self) -> Vec<SentCredentials> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

impl CredentialNotifier for RecordingNotifier {
    fn send_credentials(
        &self,
        student_name: &str,
        student_email: &str,
        student_id: &StudentId,
        password: &str,
    ) -> Result<(), NotificationError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotificationError::Transport("smtp relay refused".to_string()));
        }
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(SentCredentials {
                name: student_name.to_string(),
                email: student_email.to_string(),
                student_id: student_id.clone(),
                password: password.to_string(),
            });
        Ok(())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
