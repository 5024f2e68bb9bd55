//! Sign-in and registration forms. Validation runs before any request.

use tracing::info;

use pmap_types::User;

use crate::api::ApiClient;
use crate::auth::AuthStore;
use crate::error::{ClientError, ValidationError};

pub const MIN_PASSWORD_LEN: usize = 6;

/// `local@domain.tld`: one `@`, no whitespace, a dot inside the domain and
/// none leading it.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    let (local, domain) = email.split_once('@').ok_or(ValidationError::MalformedEmail)?;

    let well_formed = !local.is_empty()
        && !domain.contains('@')
        && !domain.starts_with('.')
        && !email.chars().any(char::is_whitespace)
        && domain
            .rsplit_once('.')
            .is_some_and(|(name, tld)| !name.is_empty() && !tld.is_empty() && !name.ends_with('.'));

    if well_formed {
        Ok(())
    } else {
        Err(ValidationError::MalformedEmail)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.email.trim().is_empty() {
            return Err(ValidationError::Required("Email"));
        }
        if self.password.is_empty() {
            return Err(ValidationError::Required("Password"));
        }
        Ok(())
    }

    pub async fn submit(&self, api: &ApiClient, session: &AuthStore) -> Result<User, ClientError> {
        self.validate()?;
        session.login(api, self.email.trim(), &self.password).await
    }
}

#[derive(Debug, Clone, Default)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub repeat_password: String,
}

impl RegisterForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.email.trim().is_empty() {
            return Err(ValidationError::Required("Email"));
        }
        if self.password.is_empty() {
            return Err(ValidationError::Required("Password"));
        }
        if self.repeat_password.is_empty() {
            return Err(ValidationError::Required("Password confirmation"));
        }
        validate_email(&self.email)?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort { min: MIN_PASSWORD_LEN });
        }
        if self.password != self.repeat_password {
            return Err(ValidationError::PasswordMismatch);
        }
        Ok(())
    }

    /// Register, then sign straight in with the same credentials.
    pub async fn submit(&self, api: &ApiClient, session: &AuthStore) -> Result<User, ClientError> {
        self.validate()?;
        let email = self.email.trim();
        let outcome = api.register(email, &self.password).await?;
        info!("Registered {} ({})", email, outcome.status);
        session.login(api, email, &self.password).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(email: &str, password: &str, repeat: &str) -> RegisterForm {
        RegisterForm {
            email: email.into(),
            password: password.into(),
            repeat_password: repeat.into(),
        }
    }

    #[test]
    fn email_shapes() {
        assert!(validate_email("ann@example.com").is_ok());
        assert!(validate_email(" ann.lee@mail.example.org ").is_ok());
        for bad in ["annexample.com", "@example.com", "ann@example", "ann@.com", "ann@example.", "ann@.a.com", "a b@example.com", "a@b@c.com"] {
            assert_eq!(validate_email(bad), Err(ValidationError::MalformedEmail), "{}", bad);
        }
    }

    #[test]
    fn register_validation_order() {
        assert_eq!(form("", "secret1", "secret1").validate(), Err(ValidationError::Required("Email")));
        assert_eq!(form("ann@example.com", "", "").validate(), Err(ValidationError::Required("Password")));
        assert_eq!(form("nope", "secret1", "secret1").validate(), Err(ValidationError::MalformedEmail));
        assert_eq!(
            form("ann@example.com", "abc", "abc").validate(),
            Err(ValidationError::PasswordTooShort { min: MIN_PASSWORD_LEN })
        );
        assert_eq!(
            form("ann@example.com", "secret1", "secret2").validate(),
            Err(ValidationError::PasswordMismatch)
        );
        assert_eq!(form("ann@example.com", "secret1", "secret1").validate(), Ok(()));
    }

    #[test]
    fn login_requires_both_fields() {
        let login = LoginForm {
            email: "ann@example.com".into(),
            password: String::new(),
        };
        assert_eq!(login.validate(), Err(ValidationError::Required("Password")));
    }
}
