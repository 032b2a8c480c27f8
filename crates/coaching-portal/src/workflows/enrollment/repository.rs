use super::domain::{Enquiry, EnquiryId, StudentAccount, StudentId};

/// Storage abstraction over the enquiry collection.
pub trait EnquiryRepository: Send + Sync {
    fn insert(&self, enquiry: Enquiry) -> Result<Enquiry, RepositoryError>;
    fn update(&self, enquiry: Enquiry) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &EnquiryId) -> Result<Option<Enquiry>, RepositoryError>;
    fn list(&self) -> Result<Vec<Enquiry>, RepositoryError>;
}

/// Storage abstraction over student accounts, keyed by student ID.
pub trait AccountRepository: Send + Sync {
    /// Must fail with [`RepositoryError::Conflict`] when the student ID is taken.
    fn insert(&self, account: StudentAccount) -> Result<StudentAccount, RepositoryError>;
    fn fetch(&self, id: &StudentId) -> Result<Option<StudentAccount>, RepositoryError>;
    fn remove(&self, id: &StudentId) -> Result<(), RepositoryError>;
    fn for_enquiry(&self, enquiry_id: &EnquiryId) -> Result<Vec<StudentAccount>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
