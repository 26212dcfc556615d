//! Read access to the content-addressed object store.
use std::io;
use std::io::Read;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Connect timeout for the IPFS API. Reads are not bounded, since packs
/// can be large.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A stream of bytes read from the store.
pub type Reader = Box<dyn io::Read + Send + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    /// Nothing is stored at the given path.
    #[error("`{0}` not found in store")]
    NotFound(String),
    /// The store could not be reached.
    #[error("`{0}`: transport error: {1}")]
    Transport(String, String),
    /// The store answered with an unexpected error status.
    #[error("`{0}`: store returned status {1}: {2}")]
    Status(String, u16, String),
    /// Reading the response body failed.
    #[error("`{0}`: i/o error: {1}")]
    Io(String, #[source] io::Error),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// A content-addressed, read-only object store.
///
/// Paths are absolute store paths, eg. `/ipfs/<root>/HEAD`. Implementations
/// don't cache or retry.
pub trait Store {
    /// Open the content at `path` for reading.
    fn open(&self, path: &str) -> Result<Reader, Error>;

    /// Read the full content at `path`.
    fn get(&self, path: &str) -> Result<Vec<u8>, Error> {
        let mut bytes = Vec::new();
        self.open(path)?
            .read_to_end(&mut bytes)
            .map_err(|e| Error::Io(path.to_owned(), e))?;

        Ok(bytes)
    }
}

impl<T: Store + ?Sized> Store for &T {
    fn open(&self, path: &str) -> Result<Reader, Error> {
        (**self).open(path)
    }
}

/// Error body returned by the IPFS API.
#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "Message")]
    message: String,
}

/// Client for the `cat` endpoint of an IPFS node's HTTP API.
pub struct Ipfs {
    agent: ureq::Agent,
    base: String,
}

impl Ipfs {
    /// Create a client for the API listening on `api`, eg. `127.0.0.1:5001`.
    pub fn new(api: &str, user_agent: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .user_agent(user_agent)
            .build();

        Self {
            agent,
            base: format!("http://{api}/api/v0"),
        }
    }
}

impl Store for Ipfs {
    fn open(&self, path: &str) -> Result<Reader, Error> {
        log::debug!(target: "store", "cat {path}");

        match self
            .agent
            .post(&format!("{}/cat", self.base))
            .query("arg", path)
            .call()
        {
            Ok(response) => Ok(Box::new(response.into_reader())),
            Err(ureq::Error::Status(code, response)) => {
                let message = response
                    .into_json::<ApiError>()
                    .map(|e| e.message)
                    .unwrap_or_default();
                log::debug!(target: "store", "cat {path}: {code}: {message}");

                if is_not_found(&message) {
                    Err(Error::NotFound(path.to_owned()))
                } else {
                    Err(Error::Status(path.to_owned(), code, message))
                }
            }
            Err(ureq::Error::Transport(e)) => Err(Error::Transport(path.to_owned(), e.to_string())),
        }
    }
}

/// Whether an IPFS API error message means the path doesn't resolve.
fn is_not_found(message: &str) -> bool {
    let message = message.to_lowercase();

    ["no link named", "not found", "does not exist"]
        .iter()
        .any(|m| message.contains(m))
}
