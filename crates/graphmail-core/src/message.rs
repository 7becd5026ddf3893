//! Outbound message model.

use std::path::Path;

/// A sender mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    /// Mailbox address.
    pub address: String,
    /// Optional display name.
    pub name: Option<String>,
}

impl Sender {
    /// Creates a sender without a display name.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A file attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// File name shown to recipients.
    pub name: String,
    /// MIME type.
    pub content_type: String,
    /// Raw content.
    pub data: Vec<u8>,
}

impl Attachment {
    /// Creates an attachment from raw bytes.
    #[must_use]
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data,
        }
    }

    /// Reads an attachment from disk, guessing the content type from the extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map_or_else(|| "attachment".to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self::new(name, content_type_for(path), data))
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "log" => "text/plain",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

/// An email message to send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// Sender override; the configured default applies when absent.
    pub from: Option<Sender>,
    /// Recipient addresses.
    pub to: Vec<String>,
    /// CC addresses.
    pub cc: Vec<String>,
    /// BCC addresses.
    pub bcc: Vec<String>,
    /// Subject line.
    pub subject: String,
    /// Body content.
    pub body: String,
    /// Whether `body` is HTML rather than plain text.
    pub is_html: bool,
    /// Attachments.
    pub attachments: Vec<Attachment>,
}

impl OutgoingMessage {
    /// Creates a plain text message.
    #[must_use]
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            ..Self::default()
        }
    }

    /// Adds a recipient.
    #[must_use]
    pub fn to(mut self, recipient: impl Into<String>) -> Self {
        self.to.push(recipient.into());
        self
    }

    /// Adds a CC recipient.
    #[must_use]
    pub fn cc(mut self, recipient: impl Into<String>) -> Self {
        self.cc.push(recipient.into());
        self
    }

    /// Adds a BCC recipient.
    #[must_use]
    pub fn bcc(mut self, recipient: impl Into<String>) -> Self {
        self.bcc.push(recipient.into());
        self
    }

    /// Marks the body as HTML.
    #[must_use]
    pub const fn html(mut self, is_html: bool) -> Self {
        self.is_html = is_html;
        self
    }

    /// Overrides the sender.
    #[must_use]
    pub fn from(mut self, sender: Sender) -> Self {
        self.from = Some(sender);
        self
    }

    /// Adds an attachment.
    #[must_use]
    pub fn attach(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let message = OutgoingMessage::new("Hello", "<p>Hi</p>")
            .to("a@contoso.com")
            .to("b@contoso.com")
            .cc("c@contoso.com")
            .bcc("d@contoso.com")
            .html(true)
            .from(Sender::new("noreply@contoso.com").with_name("Contoso"));

        assert_eq!(message.to, vec!["a@contoso.com", "b@contoso.com"]);
        assert_eq!(message.cc, vec!["c@contoso.com"]);
        assert_eq!(message.bcc, vec!["d@contoso.com"]);
        assert!(message.is_html);
        assert_eq!(message.from.unwrap().name.as_deref(), Some("Contoso"));
    }

    #[test]
    fn test_content_type_guess() {
        assert_eq!(content_type_for(Path::new("report.PDF")), "application/pdf");
        assert_eq!(content_type_for(Path::new("notes.txt")), "text/plain");
        assert_eq!(content_type_for(Path::new("blob")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_attachment_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        tokio::fs::write(&path, b"a,b\n1,2\n").await.unwrap();

        let attachment = Attachment::from_path(&path).await.unwrap();
        assert_eq!(attachment.name, "data.csv");
        assert_eq!(attachment.content_type, "text/csv");
        assert_eq!(attachment.data, b"a,b\n1,2\n");
    }
}
