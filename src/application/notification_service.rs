use std::sync::Arc;

use crate::domain::errors::DomainError;
use crate::domain::notification::{render_email, EmailJob, NotificationTemplate};
use crate::domain::ports::{Mailer, OutgoingEmail};

pub struct NotificationService {
    mailer: Arc<dyn Mailer>,
}

impl NotificationService {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    /// Renders the template into the branded document and sends it now.
    pub async fn send(&self, job: &EmailJob) -> Result<(), DomainError> {
        let missing: Vec<&str> = [
            ("to", &job.to),
            ("subject", &job.subject),
            ("template", &job.template),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect();
        if !missing.is_empty() {
            return Err(DomainError::validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        let template = NotificationTemplate::parse(&job.template);
        if let NotificationTemplate::Other(name) = &template {
            log::warn!("Unknown email template {name}; sending generic rendering");
        }

        self.mailer
            .send(OutgoingEmail {
                to: job.to.clone(),
                subject: job.subject.clone(),
                html: render_email(&template, &job.data),
            })
            .await
    }
}
