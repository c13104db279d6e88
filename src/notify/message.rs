use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::contacts::{title_case, ContactBook, MessageTemplate};
use super::transport::MessageTransport;
use super::Notifier;

/// One rendered alert for one recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AlertMessage {
    pub recipient_name: String,
    pub recipient_address: String,
    pub subject: String,
    /// Rendered template, sent as HTML.
    pub html_body: String,
    /// Snapshot image attached to the alert.
    pub attachment: PathBuf,
    /// Hex SHA-256 of the attachment bytes.
    pub attachment_sha256: String,
}

/// Sends an alert to everyone in the contacts file.
///
/// The contacts file and the template are re-read on every alert, so edits
/// take effect without a restart.
pub struct ContactNotifier {
    contacts_path: PathBuf,
    message_path: PathBuf,
    subject: String,
    cooldown_secs: u64,
    transport: Box<dyn MessageTransport>,
}

impl ContactNotifier {
    pub fn new(
        contacts_path: PathBuf,
        message_path: PathBuf,
        subject: String,
        cooldown_secs: u64,
        transport: Box<dyn MessageTransport>,
    ) -> Self {
        Self {
            contacts_path,
            message_path,
            subject,
            cooldown_secs,
            transport,
        }
    }

    /// Render one message per contact.
    pub fn compose(&self, snapshot: &Path) -> Result<Vec<AlertMessage>> {
        let contacts = ContactBook::load(&self.contacts_path)?;
        let template = MessageTemplate::load(&self.message_path)?;
        let bytes = std::fs::read(snapshot)
            .with_context(|| format!("read snapshot {}", snapshot.display()))?;
        let digest = hex::encode(Sha256::digest(&bytes));

        contacts
            .contacts()
            .iter()
            .map(|contact| -> Result<AlertMessage> {
                let values = HashMap::from([
                    ("PERSON_NAME", title_case(&contact.name)),
                    ("SECONDS", self.cooldown_secs.to_string()),
                ]);
                let html_body = template
                    .render(&values)
                    .with_context(|| format!("render {}", self.message_path.display()))?;
                Ok(AlertMessage {
                    recipient_name: contact.name.clone(),
                    recipient_address: contact.address.clone(),
                    subject: self.subject.clone(),
                    html_body,
                    attachment: snapshot.to_path_buf(),
                    attachment_sha256: digest.clone(),
                })
            })
            .collect()
    }
}

impl Notifier for ContactNotifier {
    fn send(&self, snapshot: &Path) -> Result<()> {
        let messages = self.compose(snapshot)?;
        log::info!(
            "sending alert to {} contacts via {}",
            messages.len(),
            self.transport.name()
        );

        let mut failed = 0usize;
        for message in &messages {
            if let Err(err) = self.transport.deliver(message) {
                failed += 1;
                log::error!(
                    "alert to {} failed: {:#}",
                    message.recipient_address,
                    err
                );
            }
        }
        if failed > 0 {
            return Err(anyhow!(
                "{} of {} alert deliveries failed",
                failed,
                messages.len()
            ));
        }
        Ok(())
    }
}
