use crate::library::Library;
use crate::model::*;
use log::warn;
use sled::transaction::{TransactionError, Transactional};
use std::convert::TryInto;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),
    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("bad index entry for {0}")]
    BadIndex(String),
}

pub type DbResult<T> = Result<T, DbError>;

fn serialize_id(id: u64) -> [u8; 8] {
    id.to_le_bytes()
}

fn deserialize_id<V: AsRef<[u8]>>(id: V) -> Option<u64> {
    id.as_ref().try_into().ok().map(u64::from_le_bytes)
}

pub trait UserDb {
    /// Returns `None` if the email is already taken.
    fn add_user(&self, user: &User) -> DbResult<Option<u64>>;
    fn get_user(&self, id: u64) -> DbResult<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> DbResult<Option<(u64, User)>>;
}

const USERS: &[u8] = b"users";
const USERS_EMAIL: &[u8] = b"USERS_EMAIL";

fn email_key(email: &str) -> Vec<u8> {
    email.trim().to_lowercase().into_bytes()
}

impl UserDb for sled::Db {
    fn add_user(&self, user: &User) -> DbResult<Option<u64>> {
        let users = self.open_tree(USERS)?;
        let users_email = self.open_tree(USERS_EMAIL)?;
        let id = self.generate_id()?;
        let encoded = bincode::serialize(user)?;
        let key = email_key(&user.email);
        if let Err(err) = (&users, &users_email).transaction(|(users, users_email)| {
            if users_email.insert(key.as_slice(), &serialize_id(id))?.is_some() {
                sled::transaction::abort(())?;
            }
            users.insert(&serialize_id(id), encoded.as_slice())?;
            Ok(())
        }) {
            match err {
                TransactionError::Storage(e) => return Err(e.into()),
                TransactionError::Abort(_) => return Ok(None),
            };
        }
        Ok(Some(id))
    }

    fn get_user(&self, id: u64) -> DbResult<Option<User>> {
        let users = self.open_tree(USERS)?;
        match users.get(serialize_id(id))? {
            Some(data) => Ok(Some(bincode::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    fn get_user_by_email(&self, email: &str) -> DbResult<Option<(u64, User)>> {
        let users_email = self.open_tree(USERS_EMAIL)?;
        let raw_id = match users_email.get(email_key(email))? {
            Some(raw_id) => raw_id,
            None => return Ok(None),
        };
        let id = deserialize_id(&raw_id).ok_or_else(|| DbError::BadIndex(email.to_owned()))?;
        let user = self
            .get_user(id)?
            .ok_or_else(|| DbError::BadIndex(email.to_owned()))?;
        Ok(Some((id, user)))
    }
}

/// Persistent library records, one JSON document per user.
pub trait LibraryDb {
    /// Missing or unreadable records load as an empty library.
    fn load_library(&self, user_id: u64) -> DbResult<Library>;
    fn save_library(&self, user_id: u64, library: &Library) -> DbResult<()>;
}

fn library_key(user_id: u64) -> String {
    format!("library/{}", user_id)
}

impl LibraryDb for sled::Db {
    fn load_library(&self, user_id: u64) -> DbResult<Library> {
        let key = library_key(user_id);
        match self.get(key.as_bytes())? {
            Some(data) => Ok(serde_json::from_slice(&data).unwrap_or_else(|err| {
                warn!("Discarding unreadable {}: {}", key, err);
                Library::new()
            })),
            None => Ok(Library::new()),
        }
    }

    fn save_library(&self, user_id: u64, library: &Library) -> DbResult<()> {
        let data = serde_json::to_vec(library)?;
        self.insert(library_key(user_id).as_bytes(), data)?;
        Ok(())
    }
}

/// Per-user settings, stored like libraries.
pub trait SettingsDb {
    /// Missing or unreadable records load as the defaults.
    fn load_settings(&self, user_id: u64) -> DbResult<Settings>;
    fn save_settings(&self, user_id: u64, settings: &Settings) -> DbResult<()>;
}

fn settings_key(user_id: u64) -> String {
    format!("settings/{}", user_id)
}

impl SettingsDb for sled::Db {
    fn load_settings(&self, user_id: u64) -> DbResult<Settings> {
        let key = settings_key(user_id);
        match self.get(key.as_bytes())? {
            Some(data) => Ok(serde_json::from_slice(&data).unwrap_or_else(|err| {
                warn!("Discarding unreadable {}: {}", key, err);
                Settings::default()
            })),
            None => Ok(Settings::default()),
        }
    }

    fn save_settings(&self, user_id: u64, settings: &Settings) -> DbResult<()> {
        self.insert(settings_key(user_id).as_bytes(), serde_json::to_vec(settings)?)?;
        Ok(())
    }
}
