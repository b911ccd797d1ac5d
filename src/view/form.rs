//! Login/registration form model.

use crate::api::{AuthMode, Credentials};
use crate::error::{Error, Result};

/// Fallback when the backend gives no `detail`.
pub const AUTH_ERROR_TEXT: &str = "Authorization failed";

/// Shown when the backend cannot be reached.
pub const NETWORK_ERROR_TEXT: &str = "Network error. Check that the backend is running.";

/// Username/password form with a login/register toggle and inline error.
#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    mode: AuthMode,
    error: Option<String>,
}

impl LoginForm {
    #[must_use]
    pub fn new(mode: AuthMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Switch between login and registration. Clears the error.
    pub fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
        self.error = None;
    }

    /// Heading for the current mode.
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self.mode {
            AuthMode::Login => "Log in",
            AuthMode::Register => "Register",
        }
    }

    /// Inline error from the last submission.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Validate and build the request body. Clears the previous error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when a field is blank; the message is
    /// also stored as the inline error.
    pub fn submit(&mut self) -> Result<Credentials> {
        self.error = None;
        if self.username.trim().is_empty() || self.password.is_empty() {
            let message = "Username and password are required".to_string();
            self.error = Some(message.clone());
            return Err(Error::InvalidInput(message));
        }
        Ok(Credentials {
            username: self.username.trim().to_string(),
            password: self.password.clone(),
        })
    }

    /// Record a failed submission as the inline error.
    pub fn fail(&mut self, error: &Error) {
        self.error = Some(auth_error_text(error));
    }
}

/// Text to show for a failed login/registration.
#[must_use]
pub fn auth_error_text(error: &Error) -> String {
    match error {
        Error::Transport(_) => NETWORK_ERROR_TEXT.to_string(),
        Error::InvalidInput(message) => message.clone(),
        other => other
            .detail()
            .map_or_else(|| AUTH_ERROR_TEXT.to_string(), str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_are_rejected() {
        let mut form = LoginForm::new(AuthMode::Login);
        form.username = "  ".to_string();
        form.password = "secret".to_string();

        assert!(matches!(form.submit(), Err(Error::InvalidInput(_))));
        assert_eq!(form.error(), Some("Username and password are required"));
    }

    #[test]
    fn submit_builds_credentials() {
        let mut form = LoginForm::new(AuthMode::Register);
        form.username = " a ".to_string();
        form.password = "b".to_string();

        let creds = form.submit().unwrap();
        assert_eq!(creds.username, "a");
        assert_eq!(creds.password, "b");
        assert!(form.error().is_none());
    }

    #[test]
    fn toggle_switches_mode_and_clears_error() {
        let mut form = LoginForm::new(AuthMode::Login);
        form.fail(&Error::Transport("down".to_string()));
        assert!(form.error().is_some());

        form.toggle_mode();
        assert_eq!(form.mode(), AuthMode::Register);
        assert_eq!(form.title(), "Register");
        assert!(form.error().is_none());
    }

    #[test]
    fn error_text_prefers_backend_detail() {
        let err = Error::from_status(401, Some("Incorrect username or password".to_string()));
        assert_eq!(auth_error_text(&err), "Incorrect username or password");
    }

    #[test]
    fn error_text_fallbacks() {
        assert_eq!(auth_error_text(&Error::from_status(500, None)), AUTH_ERROR_TEXT);
        assert_eq!(
            auth_error_text(&Error::Transport("refused".to_string())),
            NETWORK_ERROR_TEXT
        );
    }
}
