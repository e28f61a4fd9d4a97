use std::path::Path;

use mail_parser::{Address, Message, MessageParser, MimeHeaders};

use super::{read_source, Converter};
use crate::error::ConvertError;
use crate::render::text::render_text_pdf;
use crate::walker::ConversionRoute;

pub struct EmailConverter;

impl EmailConverter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EmailConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for EmailConverter {
    fn route(&self) -> ConversionRoute {
        ConversionRoute::Email
    }

    fn convert(&self, path: &Path) -> Result<Vec<u8>, ConvertError> {
        let _span = tracing::info_span!("converter.email").entered();

        let raw = read_source(path)?;
        let text = render_email_text(&raw)?;
        render_text_pdf(&text)
    }
}

/// Printable rendering of a message: header block, rule, body text and the
/// names of any attachments.
pub fn render_email_text(raw: &[u8]) -> Result<String, ConvertError> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| ConvertError::Email("Failed to parse email message".to_string()))?;

    if message.headers().is_empty() {
        return Err(ConvertError::Email("message has no headers".to_string()));
    }

    let mut text = String::new();
    text.push_str(&format!("From: {}\n", addresses(message.from())));
    text.push_str(&format!("To: {}\n", addresses(message.to())));
    if message.cc().is_some() {
        text.push_str(&format!("Cc: {}\n", addresses(message.cc())));
    }
    text.push_str(&format!(
        "Subject: {}\n",
        message.subject().unwrap_or("(no subject)")
    ));
    text.push_str(&format!(
        "Date: {}\n",
        message
            .date()
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "(no date)".to_string())
    ));
    text.push_str(&"=".repeat(50));
    text.push_str("\n\n");
    text.push_str(&body_text(&message));

    let attachments: Vec<String> = message
        .attachments()
        .filter_map(|part| part.attachment_name().map(str::to_string))
        .collect();
    if !attachments.is_empty() {
        text.push_str("\n\nAttachments:\n");
        for name in attachments {
            text.push_str(&format!("  - {}\n", name));
        }
    }

    Ok(text)
}

fn body_text(message: &Message<'_>) -> String {
    let mut parts = Vec::new();
    let mut index = 0;
    while let Some(part) = message.body_text(index) {
        let trimmed = part.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed.to_string());
        }
        index += 1;
    }

    if parts.is_empty() {
        "(no body)".to_string()
    } else {
        parts.join("\n\n")
    }
}

fn addresses(address: Option<&Address<'_>>) -> String {
    address
        .and_then(|a| a.first())
        .map(format_address)
        .unwrap_or_else(|| "(unknown)".to_string())
}

fn format_address(addr: &mail_parser::Addr) -> String {
    if let Some(name) = addr.name() {
        format!("{} <{}>", name, addr.address().unwrap_or_default())
    } else {
        addr.address().unwrap_or_default().to_string()
    }
}
