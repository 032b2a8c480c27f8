//! Student ID generation and credential handling for newly provisioned accounts.

use std::fmt;
use std::sync::Mutex;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Datelike, Utc};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::domain::StudentId;

const DEFAULT_PASSWORD_SUFFIX: &str = "123";
const ONE_TIME_PASSWORD_LEN: usize = 12;
const SALT_LEN: usize = 16;

/// Issues `PREFIX` + two-digit year + four random digits. The prefix is upper-cased.
///
/// No uniqueness check happens here; the account store rejects duplicates.
pub struct StudentIdGenerator {
    prefix: String,
    rng: Mutex<StdRng>,
}

impl StudentIdGenerator {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_ascii_uppercase(),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(prefix: &str, seed: u64) -> Self {
        Self {
            prefix: prefix.to_ascii_uppercase(),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn generate(&self, now: DateTime<Utc>) -> StudentId {
        let suffix: u16 = {
            let mut rng = match self.rng.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            rng.gen_range(1000..=9999)
        };
        format_student_id(&self.prefix, now.year(), suffix)
    }
}

impl fmt::Debug for StudentIdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudentIdGenerator")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

pub fn format_student_id(prefix: &str, year: i32, suffix: u16) -> StudentId {
    StudentId(format!("{prefix}{:02}{suffix:04}", year.rem_euclid(100)))
}

/// Check that `candidate` has the `PREFIX` + 6 digits shape.
pub fn is_well_formed(prefix: &str, candidate: &str) -> bool {
    candidate
        .strip_prefix(prefix)
        .map(|rest| rest.len() == 6 && rest.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

/// Lowercased first name followed by `123`. Guessable; see [`CredentialPolicy`].
pub fn derive_default_password(full_name: &str) -> String {
    let first = full_name.split_whitespace().next().unwrap_or_default();
    format!("{}{DEFAULT_PASSWORD_SUFFIX}", first.to_lowercase())
}

pub fn random_one_time_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ONE_TIME_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

/// How the initial password of a new account is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialPolicy {
    #[default]
    NameDerived,
    RandomOneTime,
}

impl CredentialPolicy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "name_derived" | "name-derived" | "legacy" => Some(Self::NameDerived),
            "random" | "random_one_time" | "one_time" => Some(Self::RandomOneTime),
            _ => None,
        }
    }

    pub fn initial_password(self, full_name: &str) -> String {
        match self {
            CredentialPolicy::NameDerived => derive_default_password(full_name),
            CredentialPolicy::RandomOneTime => random_one_time_password(),
        }
    }

    pub const fn is_guessable(self) -> bool {
        matches!(self, CredentialPolicy::NameDerived)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("failed to hash password: {0}")]
    Hash(String),
}

/// Argon2id password hash in PHC string form (`$argon2id$v=19$...`).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PasswordDigest(String);

impl PasswordDigest {
    pub fn new(password: &str) -> Result<Self, CredentialError> {
        let salt_bytes: [u8; SALT_LEN] = rand::thread_rng().gen();
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|err| CredentialError::Hash(err.to_string()))?;
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| CredentialError::Hash(err.to_string()))?;
        Ok(Self(hash.to_string()))
    }

    pub fn verify(&self, password: &str) -> bool {
        match PasswordHash::new(&self.0) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    pub fn as_phc(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordDigest(argon2)")
    }
}

impl From<PasswordDigest> for String {
    fn from(value: PasswordDigest) -> Self {
        value.0
    }
}

impl TryFrom<String> for PasswordDigest {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match PasswordHash::new(&value) {
            Ok(parsed) if parsed.algorithm.as_str().starts_with("argon2") => {}
            _ => return Err("password digest must be an argon2 PHC string".to_string()),
        }
        Ok(Self(value))
    }
}
