use crate::database::{DbError, UserDb};
use crate::model::{SessionUser, User};
use log::{debug, info};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Please fill in all required fields")]
    MissingFields,
    #[error("Please enter your full name")]
    MissingName,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("User already exists with this email")]
    EmailTaken,
    #[error("Something went wrong. Please try again.")]
    Db(#[from] DbError),
    #[error("Something went wrong. Please try again.")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Accounts that exist on every start.
const SEED_USERS: &[(&str, &str, &str)] = &[
    ("John Doe", "john@example.com", "password123"),
    ("Jane Smith", "jane@example.com", "password123"),
    ("Mike Johnson", "mike@example.com", "password123"),
];

pub fn seed_users<D: UserDb>(db: &D, bcrypt_cost: u32) -> Result<(), AuthError> {
    for (name, email, password) in SEED_USERS {
        if db.get_user_by_email(email)?.is_some() {
            continue;
        }
        let id = db.add_user(&User {
            name: (*name).to_owned(),
            email: (*email).to_owned(),
            password_hash: bcrypt::hash(password, bcrypt_cost)?,
        })?;
        debug!("Seeded user {} as {:?}", email, id);
    }
    Ok(())
}

pub fn login<D: UserDb>(db: &D, email: &str, password: &str) -> Result<SessionUser, AuthError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AuthError::MissingFields);
    }
    if let Some((id, user)) = db.get_user_by_email(email)? {
        if bcrypt::verify(password, &user.password_hash)? {
            info!("User {} logged in", id);
            return Ok(SessionUser {
                id,
                name: user.name,
                email: user.email,
            });
        }
    }
    Err(AuthError::InvalidCredentials)
}

pub fn signup<D: UserDb>(
    db: &D,
    name: &str,
    email: &str,
    password: &str,
    bcrypt_cost: u32,
) -> Result<SessionUser, AuthError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AuthError::MissingFields);
    }
    if name.trim().is_empty() {
        return Err(AuthError::MissingName);
    }
    let user = User {
        name: name.trim().to_owned(),
        email: email.trim().to_owned(),
        password_hash: bcrypt::hash(password, bcrypt_cost)?,
    };
    let id = db.add_user(&user)?.ok_or(AuthError::EmailTaken)?;
    info!("User {} signed up", id);
    Ok(SessionUser {
        id,
        name: user.name,
        email: user.email,
    })
}

/// Reads the session cookie payload. Anything unreadable counts as signed out.
pub fn decode_session(identity: Option<String>) -> Option<SessionUser> {
    let raw = identity?;
    match serde_json::from_str(&raw) {
        Ok(user) => Some(user),
        Err(err) => {
            debug!("Ignoring unreadable session: {}", err);
            None
        }
    }
}

pub fn encode_session(user: &SessionUser) -> String {
    // A struct of plain strings and integers always serializes.
    serde_json::to_string(user).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> sled::Db {
        let db = sled::Config::new().temporary(true).open().unwrap();
        seed_users(&db, 4).unwrap();
        db
    }

    #[test]
    fn seeded_login() {
        let db = db();
        let user = login(&db, "jane@example.com", "password123").unwrap();
        assert_eq!(user.name, "Jane Smith");
    }

    #[test]
    fn login_failures_look_alike() {
        let db = db();
        let unknown = login(&db, "nobody@example.com", "password123").unwrap_err();
        let wrong = login(&db, "john@example.com", "hunter2").unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert_eq!(wrong.to_string(), "Invalid email or password");
    }

    #[test]
    fn signup_validation() {
        let db = db();
        assert!(matches!(
            signup(&db, "", "new@example.com", "secret", 4),
            Err(AuthError::MissingName)
        ));
        assert!(matches!(
            signup(&db, "New", "", "secret", 4),
            Err(AuthError::MissingFields)
        ));
        assert!(matches!(
            signup(&db, "Johnny", "john@example.com", "secret", 4),
            Err(AuthError::EmailTaken)
        ));
        let user = signup(&db, "New Person", "new@example.com", "secret", 4).unwrap();
        assert_eq!(login(&db, "new@example.com", "secret").unwrap(), user);
    }

    #[test]
    fn session_cookie() {
        let user = SessionUser {
            id: 3,
            name: "Mike Johnson".to_owned(),
            email: "mike@example.com".to_owned(),
        };
        assert_eq!(decode_session(Some(encode_session(&user))), Some(user));
        assert_eq!(decode_session(Some("garbage".to_owned())), None);
        assert_eq!(decode_session(None), None);
    }
}
