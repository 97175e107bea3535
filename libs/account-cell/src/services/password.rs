use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use tracing::instrument;

use crate::models::{PasswordStrength, PasswordStrengthResult};

pub const MIN_PASSWORD_LENGTH: usize = 8;
const RECOMMENDED_LENGTH: usize = 12;
const SYMBOLS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?/~";

const COMMON_FRAGMENTS: [&str; 10] = [
    "password", "123456", "qwerty", "letmein", "welcome",
    "admin", "iloveyou", "abc123", "111111", "monkey",
];

/// Words an attacker would try first against this service.
const SERVICE_WORDS: [&str; 5] = ["therapy", "therapist", "counsel", "booking", "session"];

/// Argon2 hashing plus a heuristic strength score out of 100.
pub struct PasswordSecurityService;

impl PasswordSecurityService {
    #[instrument(skip(password))]
    pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        Ok(Argon2::default().hash_password(password.as_bytes(), &salt)?.to_string())
    }

    /// `Ok(false)` for a wrong password; `Err` only when the stored hash is unreadable.
    #[instrument(skip(password, hash))]
    pub fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
        let parsed = PasswordHash::new(hash)?;
        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(password))]
    pub fn validate_password_strength(password: &str) -> PasswordStrengthResult {
        let mut issues = Vec::new();
        let length = password.chars().count();

        let mut score: i32 = if length >= RECOMMENDED_LENGTH {
            25
        } else if length >= MIN_PASSWORD_LENGTH {
            issues.push(format!("Use at least {} characters", RECOMMENDED_LENGTH));
            15
        } else {
            issues.push(format!("Password must be at least {} characters long", MIN_PASSWORD_LENGTH));
            0
        };

        let classes: [(&str, fn(char) -> bool); 4] = [
            ("a lowercase letter", char::is_lowercase),
            ("an uppercase letter", char::is_uppercase),
            ("a number", |c: char| c.is_ascii_digit()),
            ("a special character", |c: char| SYMBOLS.contains(c)),
        ];
        for (name, present) in classes {
            if password.chars().any(present) {
                score += 15;
            } else {
                issues.push(format!("Add {}", name));
            }
        }

        let lowered = password.to_lowercase();
        let penalties: [(bool, i32, &str); 4] = [
            (has_run(password), 20, "Avoid sequences like abc or 123"),
            (has_triple(password), 15, "Avoid repeating a character three times"),
            (COMMON_FRAGMENTS.iter().any(|f| lowered.contains(f)), 50, "Avoid common passwords"),
            (SERVICE_WORDS.iter().any(|w| lowered.contains(w)), 10, "Avoid words related to this service"),
        ];
        for (hit, cost, issue) in penalties {
            if hit {
                score -= cost;
                issues.push(issue.to_string());
            }
        }

        let score = score.clamp(0, 100) as u8;
        let strength = if length < MIN_PASSWORD_LENGTH {
            PasswordStrength::Weak
        } else {
            match score {
                0..=25 => PasswordStrength::Weak,
                26..=50 => PasswordStrength::Fair,
                51..=75 => PasswordStrength::Good,
                _ => PasswordStrength::Strong,
            }
        };

        PasswordStrengthResult { strength, score, issues }
    }
}

/// Three consecutive alphanumerics that step by one, up or down.
fn has_run(password: &str) -> bool {
    let chars: Vec<char> = password.chars().collect();
    chars.windows(3).any(|w| {
        w.iter().all(|c| c.is_ascii_alphanumeric()) && {
            let first = i64::from(u32::from(w[1])) - i64::from(u32::from(w[0]));
            let second = i64::from(u32::from(w[2])) - i64::from(u32::from(w[1]));
            first == second && first.abs() == 1
        }
    })
}

fn has_triple(password: &str) -> bool {
    let chars: Vec<char> = password.chars().collect();
    chars.windows(3).any(|w| w[0] == w[1] && w[1] == w[2])
}
