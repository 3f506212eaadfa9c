// src/models/pre_registration.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

use super::auth::Role;

// Pré-cadastro aprovado por um administrador (pre_registered_users/{email})
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreRegistration {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub password_set: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub password_set_at: Option<DateTime<Utc>>,
}

fn validate_email_shape(email: &str) -> Result<(), ValidationError> {
    if email.contains('@') {
        Ok(())
    } else {
        Err(ValidationError::new("email").with_message("email_invalid".into()))
    }
}

fn validate_phone_digits(phone: &str) -> Result<(), ValidationError> {
    if phone.chars().filter(char::is_ascii_digit).count() >= 10 {
        Ok(())
    } else {
        Err(ValidationError::new("phone").with_message("phone_too_short".into()))
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    #[validate(length(min = 2, message = "name_too_short"))]
    #[schema(example = "Maria Souza")]
    pub name: String,

    #[validate(custom(function = "validate_email_shape"))]
    #[schema(example = "maria@studio.com")]
    pub email: String,

    #[validate(custom(function = "validate_phone_digits"))]
    #[schema(example = "(11) 99999-0000")]
    pub phone: String,

    #[validate(required(message = "role_required"))]
    pub role: Option<Role>,
}

// --- POLÍTICA DE SENHA ---

/// Regras da política de senha; a lista das violadas volta no erro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum PasswordRule {
    MinLength,
    Uppercase,
    Lowercase,
    Digit,
    Special,
    Blocklisted,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PasswordStrength {
    pub score: u8,
    pub label: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, email: &str, phone: &str, role: Option<Role>) -> InviteRequest {
        InviteRequest {
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            role,
        }
    }

    #[test]
    fn invite_request_checks_every_field() {
        let ok = request("Maria", "maria@studio.com", "(11) 99999-0000", Some(Role::User));
        assert!(ok.validate().is_ok());

        let errors = request("M", "maria.studio.com", "1234", None).validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("phone"));
        assert!(fields.contains_key("role"));
    }

    #[test]
    fn phone_counts_only_digits() {
        assert!(validate_phone_digits("(11) 9999-000").is_err());
        assert!(validate_phone_digits("(11) 9999-0000").is_ok());
    }
}
