//! Outgoing account mail. Only the envelope and template parameters are
//! built here; rendering belongs to whoever delivers the message.

use ff_config::MailSettings;
use ff_core::models::User;
use ff_core::traits::MailMessage;
use serde_json::json;

fn message(settings: &MailSettings, to: &str, subject: &str, template: &str, params: serde_json::Value) -> MailMessage {
    MailMessage {
        to: to.to_string(),
        sender: settings.sender.clone(),
        subject: format!("{} {}", settings.subject_prefix, subject),
        template: template.to_string(),
        params,
    }
}

pub fn confirm_account(settings: &MailSettings, user: &User, token: &str) -> MailMessage {
    message(
        settings,
        &user.email,
        "Confirm Your Account",
        "auth/email/confirm",
        json!({ "username": user.username, "token": token }),
    )
}

pub fn reset_password(settings: &MailSettings, user: &User, token: &str) -> MailMessage {
    message(
        settings,
        &user.email,
        "Reset Your Password",
        "auth/email/reset_password",
        json!({ "username": user.username, "token": token }),
    )
}

/// Sent to the new address, which proves ownership by redeeming the token.
pub fn change_email(settings: &MailSettings, user: &User, new_email: &str, token: &str) -> MailMessage {
    message(
        settings,
        new_email,
        "Confirm your email address",
        "auth/email/change_email",
        json!({ "username": user.username, "token": token }),
    )
}
