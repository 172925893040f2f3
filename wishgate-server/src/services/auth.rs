use wishgate_core::Password;

/// Password check for the SSH "password" method.
///
/// There is exactly one secret and no accounts: the username is ignored and
/// anyone who knows the secret gets a session.
#[derive(Debug, Clone)]
pub struct PasswordAuth {
    secret: Password,
}

impl PasswordAuth {
    pub fn new(secret: Password) -> Self {
        Self { secret }
    }

    pub fn verify_password(&self, provided: &str) -> bool {
        self.secret.matches(provided)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_the_exact_secret() {
        let auth = PasswordAuth::new(Password::new("test"));

        assert!(auth.verify_password("test"));
        for wrong in ["wrong", "TEST", "test\n", " test", "tes", ""] {
            assert!(!auth.verify_password(wrong), "{wrong:?} must be rejected");
        }
    }

    #[test]
    fn empty_secret_only_matches_empty_password() {
        let auth = PasswordAuth::new(Password::new(""));
        assert!(auth.verify_password(""));
        assert!(!auth.verify_password("x"));
    }
}
