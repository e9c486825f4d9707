//! Best-effort fan-out of one message to many recipients.

use std::sync::Arc;

use crate::{
    domain::{MessageRef, Recipient},
    messaging::port::MessagingPort,
    Result,
};

/// Result of one delivery attempt.
#[derive(Debug)]
pub struct Delivery {
    pub recipient: Recipient,
    pub result: Result<MessageRef>,
}

/// Per-recipient outcomes, in attempt order.
#[derive(Debug, Default)]
pub struct ForwardReport {
    pub deliveries: Vec<Delivery>,
}

impl ForwardReport {
    pub fn attempted(&self) -> usize {
        self.deliveries.len()
    }

    pub fn delivered(&self) -> usize {
        self.deliveries.iter().filter(|d| d.result.is_ok()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &Delivery> {
        self.deliveries.iter().filter(|d| d.result.is_err())
    }
}

#[derive(Clone)]
pub struct ForwardEngine {
    messenger: Arc<dyn MessagingPort>,
}

impl ForwardEngine {
    pub fn new(messenger: Arc<dyn MessagingPort>) -> Self {
        Self { messenger }
    }

    /// Forward `message` to every recipient in order.
    ///
    /// A failing recipient is logged and skipped; it never stops the rest of
    /// the batch, and nothing is retried.
    pub async fn forward(&self, recipients: &[Recipient], message: MessageRef) -> ForwardReport {
        let mut report = ForwardReport::default();

        for &recipient in recipients {
            tracing::info!(
                from = %message.chat_id,
                to = %recipient,
                "forwarding message"
            );

            let result = self.messenger.forward(recipient, message).await;
            if let Err(e) = &result {
                tracing::warn!(to = %recipient, error = %e, "failed to forward message");
            }

            report.deliveries.push(Delivery { recipient, result });
        }

        report
    }
}
