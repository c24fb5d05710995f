use super::{
    files, handler, payload, HandlerResult, ParamSpec, ParamType, ToolArgs, ToolDescriptor,
    ToolRegistryBuilder,
};
use crate::context::ToolContext;
use crate::error::ToolError;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Strips formatting from a phone number and checks it is 7-15 digits.
pub fn normalize_phone(raw: &str) -> Result<String, ToolError> {
    let digits: String = raw
        .trim()
        .trim_start_matches('+')
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();

    let all_digits = !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit());
    if !all_digits || !(7..=15).contains(&digits.len()) {
        return Err(ToolError::invalid_input(format!("Invalid phone number: {}", raw.trim())));
    }
    Ok(digits)
}

pub fn whatsapp_url(phone: &str, message: &str) -> String {
    format!(
        "https://api.whatsapp.com/send?phone={}&text={}",
        phone,
        urlencoding::encode(message)
    )
}

/// Opens a prefilled WhatsApp chat in the browser. The user still presses
/// send, so success means the chat was opened, not that it was delivered.
pub async fn send_whatsapp_message(ctx: Arc<ToolContext>, args: ToolArgs) -> HandlerResult {
    let (Some(phone), Some(message)) = (args.string("phone_number"), args.string("message")) else {
        return Err(ToolError::invalid_input("Phone number and message required"));
    };
    let phone = normalize_phone(&phone)?;
    let url = whatsapp_url(&phone, &message);

    info!("💬 Opening WhatsApp chat with {}", phone);
    files::open_with_default(&ctx, url.clone()).await?;

    Ok(payload(json!({
        "sent_to": phone,
        "message": message,
        "url": url,
        "dispatched": true,
    })))
}

pub fn register(builder: &mut ToolRegistryBuilder) {
    builder.register(
        ToolDescriptor::new(
            "send_whatsapp_message",
            concat!(
                "Send a WhatsApp message using WhatsApp Web. Requires WhatsApp Web login ",
                "in the browser. Example: phone_number='918765432100', message='Hello!'"
            ),
            handler(send_whatsapp_message),
        )
        .param(ParamSpec::required(
            "phone_number",
            ParamType::String,
            "Recipient number with country code",
        ))
        .param(ParamSpec::required("message", ParamType::String, "Message text")),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_formatting_is_stripped() {
        assert_eq!(normalize_phone("+91 87654-32100").unwrap(), "918765432100");
        assert_eq!(normalize_phone("(555) 123.4567").unwrap(), "5551234567");
    }

    #[test]
    fn bad_phones_are_rejected() {
        assert!(normalize_phone("12345").is_err());
        assert!(normalize_phone("call me maybe").is_err());
        assert!(normalize_phone("1234567890123456").is_err());
    }

    #[test]
    fn message_is_percent_encoded() {
        assert_eq!(
            whatsapp_url("918765432100", "Hi & bye?"),
            "https://api.whatsapp.com/send?phone=918765432100&text=Hi%20%26%20bye%3F"
        );
    }
}
