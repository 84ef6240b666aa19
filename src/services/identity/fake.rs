//! Test doubles for the identity provider.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use super::verifier::{IdentityVerifier, VerifiedToken, VerifierError};

/// RSA key pair used to sign test ID tokens and service-account assertions.
pub const TEST_KEY_PEM: &str = include_str!("testdata/rsa_test_key.pem");
pub const TEST_KEY_N: &str = "50hEPmnvkIoiZ3TgfKb6KT-45z3tO8k0qKFhEhOB7mKOaTwlaToHPy1ytiud3n-LHkJ2pz4lYcVlSiDsePQM4X-hkdTfKdzmF4-pacnrYgsubGkUTcDBlPNAgnh-VUTdsI9meglMI6lKsCg8KkJdErTHisEzKsd6Hvmn2ioW_aavnr0s-uAZftcgPKTt4EvOj71W_0R3kzto-e0vidJx4MX8Yb6RZVJp5Xc2kGAYOOzqNAEjQGLsqJy4ivQWfGtd3xNJ9reRL1jKiVBw3EYNMdTDnGBjPfhETj6w5lbVWResRwrJeB9vnDdXyb5xIJtm4WE57X28EgLVqJlVMG5Rgw";
pub const TEST_KEY_E: &str = "AQAB";
pub const TEST_KID: &str = "test-key";

/// In-memory provider: tokens and roles are registered up front, calls are counted.
#[derive(Default)]
pub struct FakeVerifier {
    tokens: Mutex<HashMap<String, VerifiedToken>>,
    roles: Mutex<HashMap<String, String>>,
    unavailable: Mutex<bool>,
    verify_calls: AtomicUsize,
    get_role_calls: AtomicUsize,
}

impl FakeVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `token` as valid for `subject_id`, expiring `ttl_secs` from now.
    pub fn with_token(self, token: &str, subject_id: &str, name: &str, ttl_secs: i64) -> Self {
        self.tokens.lock().unwrap().insert(
            token.to_string(),
            VerifiedToken {
                subject_id: subject_id.to_string(),
                subject_name: name.to_string(),
                expires_at_epoch_seconds: Utc::now().timestamp() + ttl_secs,
                role: None,
            },
        );
        self
    }

    pub fn with_role(self, subject_id: &str, role: &str) -> Self {
        self.roles
            .lock()
            .unwrap()
            .insert(subject_id.to_string(), role.to_string());
        self
    }

    /// Make every call fail with `Unavailable` from now on.
    pub fn go_down(&self) {
        *self.unavailable.lock().unwrap() = true;
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn get_role_calls(&self) -> usize {
        self.get_role_calls.load(Ordering::SeqCst)
    }

    pub fn role_of(&self, subject_id: &str) -> Option<String> {
        self.roles.lock().unwrap().get(subject_id).cloned()
    }

    fn check_up(&self) -> Result<(), VerifierError> {
        if *self.unavailable.lock().unwrap() {
            return Err(VerifierError::Unavailable("fake provider down".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityVerifier for FakeVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, VerifierError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.check_up()?;

        self.tokens
            .lock()
            .unwrap()
            .get(token)
            .cloned()
            .ok_or_else(|| VerifierError::InvalidToken("unknown token".to_string()))
    }

    async fn get_role(&self, subject_id: &str) -> Result<String, VerifierError> {
        self.get_role_calls.fetch_add(1, Ordering::SeqCst);
        self.check_up()?;

        self.roles
            .lock()
            .unwrap()
            .get(subject_id)
            .cloned()
            .ok_or(VerifierError::NotFound)
    }

    async fn set_role(&self, subject_id: &str, role: &str) -> Result<(), VerifierError> {
        self.check_up()?;

        let mut roles = self.roles.lock().unwrap();
        match roles.get_mut(subject_id) {
            Some(current) => {
                *current = role.to_string();
                Ok(())
            }
            None => Err(VerifierError::NotFound),
        }
    }
}
