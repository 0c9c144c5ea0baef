use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use chrono::NaiveDateTime;
use db::team::{JOIN_CODE_ALPHABET, JOIN_CODE_LEN};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use rocket::request::FlashMessage;
use ui::FlashKind;
use uuid::Uuid;

use crate::error::Error;

/// Format of `<input type="datetime-local">` values.
pub const DATETIME_LOCAL: &str = "%Y-%m-%dT%H:%M";

pub fn short_random(n: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(n)
        .map(char::from)
        .collect()
}

/// Public ids are time ordered, so they sort roughly by creation.
pub fn gen_public_id() -> String {
    Uuid::now_v7().to_string()
}

pub fn gen_join_code<R: Rng>(rng: &mut R) -> String {
    (0..JOIN_CODE_LEN)
        .map(|_| {
            JOIN_CODE_ALPHABET[rng.gen_range(0..JOIN_CODE_ALPHABET.len())]
                as char
        })
        .collect()
}

pub fn hash_password(password: &str) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::PasswordHash(e.to_string()))
}

/// A stored hash that does not parse never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "stored password hash is malformed");
            false
        }
    }
}

pub fn flash_of(msg: Option<FlashMessage<'_>>) -> Option<(FlashKind, String)> {
    msg.map(|msg| (FlashKind::of_str(msg.kind()), msg.message().to_string()))
}

/// Trims optional form input, treating blank input as absent.
pub fn non_empty(input: Option<&str>) -> Option<String> {
    input
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

pub fn parse_datetime_local(input: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(input.trim(), DATETIME_LOCAL).ok()
}

#[cfg(test)]
mod tests {
    use db::team::Team;
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn join_codes_use_the_unambiguous_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let code = gen_join_code(&mut rng);
            assert_eq!(Team::normalize_join_code(&code), Some(code));
        }
    }

    #[test]
    fn passwords_verify_against_their_hash() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("battery staple", &hash));
        assert!(!verify_password("correct horse", "not a hash"));
    }

    #[test]
    fn blank_input_is_absent() {
        assert_eq!(non_empty(Some("  ")), None);
        assert_eq!(non_empty(Some(" Hall A ")), Some("Hall A".to_string()));
        assert_eq!(non_empty(None), None);
    }

    #[test]
    fn datetime_local_inputs() {
        let t = parse_datetime_local("2025-10-03T09:30").unwrap();
        assert_eq!(t.format(DATETIME_LOCAL).to_string(), "2025-10-03T09:30");
        assert!(parse_datetime_local("03/10/2025").is_none());
    }
}
