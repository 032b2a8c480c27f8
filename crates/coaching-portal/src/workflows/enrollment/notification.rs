use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::clock::{Clock, SystemClock};
use super::domain::StudentId;

pub const CREDENTIALS_SUBJECT: &str = "Your Doppler Coaching Student ID";

/// Outbound hook that tells a student their new login details.
pub trait CredentialNotifier: Send + Sync {
    fn send_credentials(
        &self,
        student_name: &str,
        student_email: &str,
        student_id: &StudentId,
        password: &str,
    ) -> Result<(), NotificationError>;

    /// Delivery attempts recorded by the notifier, newest last.
    fn deliveries(&self) -> Vec<DeliveryRecord> {
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotificationError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
    #[error("recipient '{0}' rejected")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Transport that actually moves an [`EmailMessage`].
pub trait MailTransport: Send + Sync {
    fn deliver(&self, message: &EmailMessage) -> Result<(), NotificationError>;
}

/// Writes the envelope to the log instead of sending mail.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMailTransport;

impl MailTransport for TracingMailTransport {
    fn deliver(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        info!(to = %message.to, subject = %message.subject, "credential email queued");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryRecord {
    pub recipient_email: String,
    pub subject: String,
    pub status: DeliveryStatus,
    pub timestamp: DateTime<Utc>,
    pub student_id: StudentId,
}

pub fn render_credentials_email(
    student_name: &str,
    student_email: &str,
    student_id: &StudentId,
    password: &str,
    portal_url: &str,
) -> EmailMessage {
    let body = format!(
        "Dear {student_name},\n\n\
         Welcome to Doppler Coaching Center!\n\n\
         Your Student ID has been generated successfully:\n\n\
         Student ID: {student_id}\n\
         Password: {password}\n\n\
         You can now login to your student portal at:\n\
         {portal_url}/login/student-id\n\n\
         Please keep your Student ID and password secure.\n\n\
         Best regards,\n\
         Doppler Coaching Team\n"
    );

    EmailMessage {
        to: student_email.to_string(),
        subject: CREDENTIALS_SUBJECT.to_string(),
        body,
    }
}

/// Email-backed notifier keeping an audit trail of every attempt.
pub struct EmailNotifier<T> {
    transport: T,
    portal_url: String,
    clock: Arc<dyn Clock>,
    log: Mutex<Vec<DeliveryRecord>>,
}

impl<T: MailTransport> EmailNotifier<T> {
    pub fn new(transport: T, portal_url: impl Into<String>) -> Self {
        Self::with_clock(transport, portal_url, Arc::new(SystemClock))
    }

    pub fn with_clock(transport: T, portal_url: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            portal_url: portal_url.into(),
            clock,
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn record(&self, message: &EmailMessage, student_id: &StudentId, status: DeliveryStatus) {
        let entry = DeliveryRecord {
            recipient_email: message.to.clone(),
            subject: message.subject.clone(),
            status,
            timestamp: self.clock.now(),
            student_id: student_id.clone(),
        };
        match self.log.lock() {
            Ok(mut log) => log.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

impl<T: MailTransport> CredentialNotifier for EmailNotifier<T> {
    fn send_credentials(
        &self,
        student_name: &str,
        student_email: &str,
        student_id: &StudentId,
        password: &str,
    ) -> Result<(), NotificationError> {
        let message = render_credentials_email(
            student_name,
            student_email,
            student_id,
            password,
            &self.portal_url,
        );

        match self.transport.deliver(&message) {
            Ok(()) => {
                self.record(&message, student_id, DeliveryStatus::Sent);
                Ok(())
            }
            Err(err) => {
                warn!(%student_id, to = %message.to, error = %err, "credential email failed");
                self.record(&message, student_id, DeliveryStatus::Failed);
                Err(err)
            }
        }
    }

    fn deliveries(&self) -> Vec<DeliveryRecord> {
        match self.log.lock() {
            Ok(log) => log.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::enrollment::clock::FixedClock;
    use chrono::TimeZone;

    #[derive(Default)]
    struct CapturingTransport {
        sent: Mutex<Vec<EmailMessage>>,
        fail: bool,
    }

    impl MailTransport for CapturingTransport {
        fn deliver(&self, message: &EmailMessage) -> Result<(), NotificationError> {
            if self.fail {
                return Err(NotificationError::Transport("smtp timeout".to_string()));
            }
            self.sent.lock().expect("mutex").push(message.clone());
            Ok(())
        }
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2025, 7, 1, 8, 30, 0).unwrap(),
        ))
    }

    #[test]
    fn email_carries_credentials_and_login_link() {
        let id = StudentId("DPLR251234".to_string());
        let message = render_credentials_email(
            "Amit Kumar",
            "amit@x.com",
            &id,
            "amit123",
            "https://portal.example.com",
        );
        assert_eq!(message.to, "amit@x.com");
        assert_eq!(message.subject, CREDENTIALS_SUBJECT);
        assert!(message.body.starts_with("Dear Amit Kumar,"));
        assert!(message.body.contains("Student ID: DPLR251234"));
        assert!(message.body.contains("Password: amit123"));
        assert!(message
            .body
            .contains("https://portal.example.com/login/student-id"));
    }

    #[test]
    fn successful_delivery_is_logged_as_sent() {
        let notifier = EmailNotifier::with_clock(
            CapturingTransport::default(),
            "https://dopplercoaching.com",
            clock(),
        );
        let id = StudentId("DPLR259999".to_string());
        notifier
            .send_credentials("Rahul Sharma", "rahul@x.com", &id, "rahul123")
            .expect("delivery succeeds");

        assert_eq!(notifier.transport().sent.lock().expect("mutex").len(), 1);
        let log = notifier.deliveries();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].status, DeliveryStatus::Sent);
        assert_eq!(log[0].student_id, id);
        assert_eq!(log[0].recipient_email, "rahul@x.com");
    }

    #[test]
    fn failed_delivery_is_logged_and_returned() {
        let transport = CapturingTransport {
            fail: true,
            ..Default::default()
        };
        let notifier = EmailNotifier::with_clock(transport, "https://dopplercoaching.com", clock());
        let id = StudentId("DPLR251111".to_string());

        let err = notifier
            .send_credentials("Rahul Sharma", "rahul@x.com", &id, "rahul123")
            .expect_err("transport fails");
        assert_eq!(err, NotificationError::Transport("smtp timeout".to_string()));

        let log = notifier.deliveries();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].status, DeliveryStatus::Failed);
    }
}
