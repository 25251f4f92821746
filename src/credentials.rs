//! Persisted credentials.
//!
//! A [`Credential`] is stored as two cookie entries, `token` and `user`, that
//! are always written and cleared in the same storage write.
//! [`Credentials::resolve()`] is the only way the rest of the crate reads them
//! back, so the transport, the route guard and session reconciliation can
//! never disagree about whether somebody is logged in.

use cookie::{Cookie, SameSite};
use serde_derive::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    collections::BTreeMap,
    fmt::Debug,
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

/// The cookie holding the raw bearer token.
pub const TOKEN_COOKIE: &str = "token";
/// The cookie holding the JSON-serialized [`User`].
pub const USER_COOKIE: &str = "user";

/// A user record as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// Any other fields the backend sent along, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn new<N, E>(name: N, email: E) -> Self
    where
        N: Into<String>,
        E: Into<String>,
    {
        User {
            name: name.into(),
            email: email.into(),
            extra: Map::new(),
        }
    }

    /// The user's initials, as shown in an avatar bubble.
    pub fn initials(&self) -> String {
        self.name
            .split_whitespace()
            .take(2)
            .filter_map(|word| word.chars().next())
            .flat_map(char::to_uppercase)
            .collect()
    }
}

/// A bearer token and the user it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub token: String,
    pub user: User,
}

/// A single cookie entry, kept as its percent-encoded `Set-Cookie` form.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCookie(Cookie<'static>);

impl StoredCookie {
    /// A site-wide cookie with the lax cross-site policy.
    pub fn site_wide<N, V>(name: N, value: V) -> Self
    where
        N: Into<String>,
        V: Into<String>,
    {
        StoredCookie(
            Cookie::build((name.into(), value.into()))
                .path("/")
                .same_site(SameSite::Lax)
                .build(),
        )
    }

    pub fn name(&self) -> &str { self.0.name() }

    pub fn value(&self) -> &str { self.0.value() }

    pub fn path(&self) -> Option<&str> { self.0.path() }

    pub fn same_site(&self) -> Option<SameSite> { self.0.same_site() }
}

/// Every cookie in a jar, keyed by name.
pub type Cookies = BTreeMap<String, StoredCookie>;

/// The on-disk form of a jar: cookie name to `Set-Cookie` string.
fn encode_jar(cookies: &Cookies) -> BTreeMap<&str, String> {
    cookies
        .iter()
        .map(|(name, cookie)| (name.as_str(), cookie.0.encoded().to_string()))
        .collect()
}

fn decode_jar(raw: BTreeMap<String, String>) -> Result<Cookies, StorageError> {
    raw.into_iter()
        .map(|(name, header)| -> Result<_, StorageError> {
            let cookie = Cookie::parse_encoded(header)?;
            Ok((name, StoredCookie(cookie)))
        })
        .collect()
}

/// Somewhere cookies can be kept between runs.
///
/// Implementations must make [`CredentialStorage::store()`] replace the whole
/// jar in one step, otherwise a crash could leave a `token` without its
/// `user`.
pub trait CredentialStorage: Debug + Send + Sync {
    fn load(&self) -> Result<Cookies, StorageError>;
    fn store(&self, cookies: &Cookies) -> Result<(), StorageError>;
}

/// Errors that may occur while reading or writing a cookie jar.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Unable to access the credential store")]
    Io(#[from] io::Error),
    #[error("The credential store is corrupted")]
    Json(#[from] serde_json::Error),
    #[error("The credential store holds a malformed cookie")]
    Cookie(#[from] cookie::ParseError),
}

/// A cookie jar that only lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    cookies: Mutex<Cookies>,
}

impl MemoryStorage {
    pub fn new() -> Self { MemoryStorage::default() }

    pub fn with_cookies(cookies: Cookies) -> Self {
        MemoryStorage {
            cookies: Mutex::new(cookies),
        }
    }
}

impl CredentialStorage for MemoryStorage {
    fn load(&self) -> Result<Cookies, StorageError> {
        Ok(self
            .cookies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn store(&self, cookies: &Cookies) -> Result<(), StorageError> {
        *self.cookies.lock().unwrap_or_else(PoisonError::into_inner) =
            cookies.clone();
        Ok(())
    }
}

/// A cookie jar kept in a single JSON file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        FileStorage { path: path.into() }
    }

    pub fn path(&self) -> &Path { &self.path }
}

impl CredentialStorage for FileStorage {
    fn load(&self) -> Result<Cookies, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => decode_jar(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Cookies::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, cookies: &Cookies) -> Result<(), StorageError> {
        let contents = serde_json::to_string_pretty(&encode_jar(cookies))?;

        // rename is atomic, so readers see either the old jar or the new one
        let temp = self.path.with_extension("tmp");
        fs::write(&temp, contents)?;
        fs::rename(&temp, &self.path)?;

        log::trace!("Saved {} cookies to {}", cookies.len(), self.path.display());
        Ok(())
    }
}

/// The single entry point for reading and writing persisted credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    storage: Arc<dyn CredentialStorage>,
}

impl Credentials {
    pub fn new(storage: Arc<dyn CredentialStorage>) -> Self {
        Credentials { storage }
    }

    /// An in-memory jar, mostly useful for tests.
    pub fn in_memory() -> Self { Credentials::new(Arc::new(MemoryStorage::new())) }

    /// Work out who (if anyone) is logged in.
    ///
    /// Both cookies must be present and the `user` cookie must hold a valid
    /// user record. Anything else counts as "no credential".
    pub fn resolve(&self) -> Option<Credential> {
        let cookies = match self.storage.load() {
            Ok(cookies) => cookies,
            Err(e) => {
                log::warn!("Unable to read the stored credentials: {}", e);
                return None;
            },
        };

        let token = cookies.get(TOKEN_COOKIE).map(StoredCookie::value);
        let user = cookies.get(USER_COOKIE).map(StoredCookie::value);

        match (token, user) {
            (Some(token), Some(user)) if !token.is_empty() => {
                match serde_json::from_str(user) {
                    Ok(user) => Some(Credential {
                        token: token.to_string(),
                        user,
                    }),
                    Err(e) => {
                        log::warn!("Ignoring a malformed user cookie: {}", e);
                        None
                    },
                }
            },
            (None, None) => None,
            _ => {
                log::warn!("Ignoring a partially stored credential");
                None
            },
        }
    }

    /// The bearer token to send with requests, if there is one.
    pub fn token(&self) -> Option<String> { self.resolve().map(|c| c.token) }

    /// Does the jar hold any credential cookie at all, even a broken one?
    pub fn has_entries(&self) -> bool {
        match self.storage.load() {
            Ok(cookies) => {
                cookies.contains_key(TOKEN_COOKIE)
                    || cookies.contains_key(USER_COOKIE)
            },
            Err(_) => false,
        }
    }

    /// Save both cookies in one write.
    pub fn persist(&self, credential: &Credential) -> Result<(), StorageError> {
        let user = serde_json::to_string(&credential.user)?;

        let mut cookies = self.storage.load()?;
        cookies.insert(
            TOKEN_COOKIE.to_string(),
            StoredCookie::site_wide(TOKEN_COOKIE, credential.token.clone()),
        );
        cookies.insert(
            USER_COOKIE.to_string(),
            StoredCookie::site_wide(USER_COOKIE, user),
        );
        self.storage.store(&cookies)?;

        log::debug!("Stored credentials for {}", credential.user.email);
        Ok(())
    }

    /// Remove both cookies in one write.
    pub fn clear(&self) -> Result<(), StorageError> {
        let mut cookies = self.storage.load()?;
        let had_token = cookies.remove(TOKEN_COOKIE).is_some();
        let had_user = cookies.remove(USER_COOKIE).is_some();

        if had_token || had_user {
            self.storage.store(&cookies)?;
            log::debug!("Cleared the stored credentials");
        }

        Ok(())
    }
}
