//! User-facing error notifications.
//!
//! The cart reports failures to the shopper through a [`Notifier`]; the UI
//! decides how to present them (toast, banner, status line). Message text is
//! part of the user-visible contract and comes from [`NotificationMessages`].

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::Locale;
use crate::error::{CartError, CartOperation};

/// Sink for user-facing error messages. Fire-and-forget.
pub trait Notifier: Send + Sync + 'static {
    /// Surface `message` to the shopper.
    fn notify_error(&self, message: &str);
}

impl<T: Notifier> Notifier for Arc<T> {
    fn notify_error(&self, message: &str) {
        (**self).notify_error(message);
    }
}

/// Notifier that writes messages to the log at `warn` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_error(&self, message: &str) {
        tracing::warn!(notification = %message, "Cart notification");
    }
}

/// Notifier that forwards messages to a UI task over a channel.
///
/// Messages sent after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<String>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end the UI reads from.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify_error(&self, message: &str) {
        if self.sender.send(message.to_string()).is_err() {
            tracing::debug!(notification = %message, "Notification receiver dropped");
        }
    }
}

/// The four user-facing failure messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessages {
    /// Requested quantity exceeds available stock.
    pub stock_exceeded: String,
    /// Adding a product failed.
    pub add_failed: String,
    /// Removing a product failed.
    pub remove_failed: String,
    /// Changing a product's quantity failed.
    pub update_failed: String,
}

impl NotificationMessages {
    /// English messages.
    #[must_use]
    pub fn english() -> Self {
        Self {
            stock_exceeded: "requested quantity exceeds stock".to_string(),
            add_failed: "failed to add product".to_string(),
            remove_failed: "failed to remove product".to_string(),
            update_failed: "failed to update product quantity".to_string(),
        }
    }

    /// Brazilian Portuguese messages, as the storefront has always shown them.
    #[must_use]
    pub fn portuguese() -> Self {
        Self {
            stock_exceeded: "Quantidade solicitada fora de estoque".to_string(),
            add_failed: "Erro na adição do produto".to_string(),
            remove_failed: "Erro na remoção do produto".to_string(),
            update_failed: "Erro na alteração de quantidade do produto".to_string(),
        }
    }

    /// Messages for `locale`.
    #[must_use]
    pub fn for_locale(locale: Locale) -> Self {
        match locale {
            Locale::English => Self::english(),
            Locale::BrazilianPortuguese => Self::portuguese(),
        }
    }

    /// Message shown to the shopper for `error`.
    ///
    /// Stock violations share one message across operations; every other
    /// failure collapses into the operation's generic message.
    #[must_use]
    pub fn for_error(&self, error: &CartError) -> &str {
        match error {
            CartError::StockExceeded { .. } => &self.stock_exceeded,
            CartError::NotFound { operation, .. } | CartError::Upstream { operation, .. } => {
                self.failure(*operation)
            }
        }
    }

    /// Generic failure message for `operation`.
    #[must_use]
    pub fn failure(&self, operation: CartOperation) -> &str {
        match operation {
            CartOperation::Add => &self.add_failed,
            CartOperation::Remove => &self.remove_failed,
            CartOperation::UpdateAmount => &self.update_failed,
        }
    }
}

impl Default for NotificationMessages {
    fn default() -> Self {
        Self::english()
    }
}
