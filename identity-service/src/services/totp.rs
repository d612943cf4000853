//! Time-based one-time-password engine and backup codes.

use rand::Rng;
use totp_rs::{Algorithm, Secret, TOTP};

use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

pub const BACKUP_CODE_COUNT: usize = 10;

const TOTP_DIGITS: usize = 6;
const TOTP_STEP: u64 = 30;
/// Accepted drift in 30-second steps on either side of now. Two steps
/// (±60 s) absorbs device clock skew at the cost of a wider replay window;
/// this is a deliberate usability tradeoff.
const TOTP_SKEW: u8 = 2;

/// Everything the client needs to enroll an authenticator: the base32
/// secret (also the manual-entry key), the otpauth URI, and a scannable QR
/// rendering of it.
#[derive(Debug, Clone)]
pub struct TwoFactorEnrollment {
    pub secret: String,
    pub otpauth_url: String,
    /// PNG as a `data:image/png;base64,...` URL.
    pub qr_code: String,
}

#[derive(Clone)]
pub struct TotpEngine {
    issuer: String,
}

impl TotpEngine {
    pub fn new(issuer: String) -> Self {
        Self { issuer }
    }

    fn build(&self, secret_bytes: Vec<u8>, account: &str) -> Result<TOTP, anyhow::Error> {
        TOTP::new(
            Algorithm::SHA1,
            TOTP_DIGITS,
            TOTP_SKEW,
            TOTP_STEP,
            secret_bytes,
            Some(self.issuer.clone()),
            account.to_string(),
        )
        .map_err(|e| anyhow::anyhow!("TOTP init error: {}", e))
    }

    /// Generate a fresh shared secret bound to this issuer and account.
    pub fn generate_enrollment(
        &self,
        account_email: &str,
    ) -> Result<TwoFactorEnrollment, anyhow::Error> {
        let secret = Secret::generate_secret();
        let secret_bytes = secret
            .to_bytes()
            .map_err(|e| anyhow::anyhow!("Secret generation error: {:?}", e))?;

        let totp = self.build(secret_bytes, account_email)?;
        let qr = totp
            .get_qr_base64()
            .map_err(|e| anyhow::anyhow!("QR generation error: {}", e))?;

        Ok(TwoFactorEnrollment {
            secret: totp.get_secret_base32(),
            otpauth_url: totp.get_url(),
            qr_code: format!("data:image/png;base64,{}", qr),
        })
    }

    /// Verify a submitted code against a stored base32 secret at the
    /// current time, within the skew window. Malformed secrets verify as
    /// false rather than erroring: they can only come from tampered state.
    pub fn verify(&self, secret_base32: &str, code: &str) -> bool {
        let Ok(secret_bytes) = Secret::Encoded(secret_base32.to_string()).to_bytes() else {
            return false;
        };
        let Ok(totp) = self.build(secret_bytes, "account") else {
            return false;
        };
        totp.check_current(code).unwrap_or(false)
    }

    /// One batch of single-use recovery codes: 4 random bytes each,
    /// uppercase hex.
    pub fn generate_backup_codes(&self) -> Vec<String> {
        let mut rng = rand::thread_rng();
        (0..BACKUP_CODE_COUNT)
            .map(|_| {
                let bytes: [u8; 4] = rng.gen();
                hex::encode(bytes).to_uppercase()
            })
            .collect()
    }

    /// Hash each code independently with the same adaptive hash used for
    /// passwords.
    pub fn hash_backup_codes(&self, codes: &[String]) -> Result<Vec<String>, anyhow::Error> {
        codes
            .iter()
            .map(|code| hash_password(&Password::new(code.clone())).map(|h| h.into_string()))
            .collect()
    }

    /// Linear scan for a matching backup code. Returns the index of the
    /// matched hash so the caller can remove exactly one consumed code.
    pub fn find_backup_code(&self, hashes: &[String], candidate: &str) -> Option<usize> {
        let candidate = Password::new(candidate.to_string());
        hashes.iter().position(|hash| {
            verify_password(&candidate, &PasswordHashString::new(hash.clone())).is_ok()
        })
    }
}
