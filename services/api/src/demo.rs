use crate::infra::{InMemoryAccountRepository, InMemoryEnquiryRepository};
use clap::Args;
use coaching_portal::config::EnrollmentConfig;
use coaching_portal::error::AppError;
use coaching_portal::workflows::enrollment::{
    CredentialNotifier, CredentialPolicy, EmailMessage, EmailNotifier, EnquiryFilter,
    EnquirySubmission, EnrollmentService, MailTransport, NotificationError, NotificationOutcome,
    ProvisioningError, ProvisioningOutcome,
};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Full name on the enquiry
    #[arg(long, default_value = "Amit Kumar")]
    pub(crate) name: String,
    /// Contact email on the enquiry
    #[arg(long, default_value = "amit@x.com")]
    pub(crate) email: String,
    /// Contact phone on the enquiry
    #[arg(long, default_value = "9876543210")]
    pub(crate) phone: String,
    /// Course the student enquired about
    #[arg(long, default_value = "NEET")]
    pub(crate) course: String,
    /// Simulate an unreachable mail relay
    #[arg(long)]
    pub(crate) fail_notification: bool,
    /// Reject provisioning once the enquiry has left `pending`
    #[arg(long)]
    pub(crate) require_pending: bool,
    /// Issue a random one-time password instead of the name-derived default
    #[arg(long)]
    pub(crate) random_password: bool,
}

/// Console transport; fails every message when `offline` is set.
#[derive(Debug, Default)]
struct ConsoleTransport {
    offline: bool,
}

impl MailTransport for ConsoleTransport {
    fn deliver(&self, message: &EmailMessage) -> Result<(), NotificationError> {
        if self.offline {
            return Err(NotificationError::Transport(
                "demo relay is offline".to_string(),
            ));
        }
        println!("\n--- email to {} ---", message.to);
        println!("Subject: {}\n", message.subject);
        println!("{}", message.body);
        println!("--- end of email ---");
        Ok(())
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        name,
        email,
        phone,
        course,
        fail_notification,
        require_pending,
        random_password,
    } = args;

    let config = EnrollmentConfig {
        require_pending,
        credential_policy: if random_password {
            CredentialPolicy::RandomOneTime
        } else {
            CredentialPolicy::NameDerived
        },
        ..EnrollmentConfig::default()
    };
    let notifier = Arc::new(EmailNotifier::new(
        ConsoleTransport {
            offline: fail_notification,
        },
        config.portal_url.clone(),
    ));
    let service = EnrollmentService::new(
        Arc::new(InMemoryEnquiryRepository::default()),
        Arc::new(InMemoryAccountRepository::default()),
        notifier,
        config,
    );

    println!("Enquiry provisioning demo");
    let enquiry = service.submit_enquiry(EnquirySubmission {
        full_name: name,
        email,
        phone,
        course,
        notes: String::new(),
    })?;
    println!(
        "Enquiry {} from {} <{}> for {} is {}",
        enquiry.id,
        enquiry.full_name,
        enquiry.email,
        enquiry.course,
        enquiry.status.display_name()
    );

    let outcome = service.provision(&enquiry.id)?;
    render_outcome(&outcome);

    println!("\nOperator clicks \"Generate Student ID\" again");
    match service.provision(&enquiry.id) {
        Ok(second) => println!(
            "- issued a second account {} for the same enquiry",
            second.student_id
        ),
        Err(err @ ProvisioningError::NotPending { .. }) => println!("- rejected: {err}"),
        Err(err) => return Err(err.into()),
    }

    let stats = service.enquiry_stats()?;
    let listed = service.list_enquiries(&EnquiryFilter::default())?;
    println!(
        "\nEnquiries: {} total, {} pending, {} with IDs generated",
        stats.total, stats.pending, stats.id_generated
    );
    for enquiry in &listed {
        let student = enquiry
            .student_id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "- {} | {} | {} | {}",
            enquiry.id,
            enquiry.full_name,
            enquiry.status.display_name(),
            student
        );
    }

    println!("\nEmail delivery log");
    for record in service.notifier().deliveries() {
        println!(
            "- {} | {} | {:?} | {}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.recipient_email,
            record.status,
            record.student_id
        );
    }

    Ok(())
}

fn render_outcome(outcome: &ProvisioningOutcome) {
    println!("\nStudent ID generated");
    println!("- Student ID: {}", outcome.student_id);
    println!("- Password: {}", outcome.password);
    println!("- Account active: {}", outcome.account.is_active);
    println!("- Enquiry status: {}", outcome.enquiry.status.display_name());

    match &outcome.notification {
        NotificationOutcome::Sent => println!("- Credentials emailed to {}", outcome.account.email),
        NotificationOutcome::Failed { reason } => println!(
            "- WARNING: email notification failed ({reason}); please inform the student manually"
        ),
    }
}
