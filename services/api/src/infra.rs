use coaching_portal::workflows::enrollment::{
    AccountRepository, EmailNotifier, Enquiry, EnquiryId, EnquiryRepository, EnrollmentService,
    RepositoryError, StudentAccount, StudentId, TracingMailTransport,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

pub(crate) type PortalService = EnrollmentService<
    InMemoryEnquiryRepository,
    InMemoryAccountRepository,
    EmailNotifier<TracingMailTransport>,
>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryEnquiryRepository {
    records: Arc<Mutex<HashMap<EnquiryId, Enquiry>>>,
}

impl EnquiryRepository for InMemoryEnquiryRepository {
    fn insert(&self, enquiry: Enquiry) -> Result<Enquiry, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&enquiry.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(enquiry.id.clone(), enquiry.clone());
        Ok(enquiry)
    }

    fn update(&self, enquiry: Enquiry) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&enquiry.id) {
            guard.insert(enquiry.id.clone(), enquiry);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
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

#[derive(Default, Clone)]
pub(crate) struct InMemoryAccountRepository {
    records: Arc<Mutex<HashMap<StudentId, StudentAccount>>>,
}

impl AccountRepository for InMemoryAccountRepository {
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
