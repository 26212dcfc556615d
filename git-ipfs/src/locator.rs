//! Remote URLs and the store paths derived from them.
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// The only URL scheme served by this helper.
pub const SCHEME: &str = "ipfs";

#[derive(Debug, Error)]
pub enum UrlError {
    /// Failed to parse.
    #[error(transparent)]
    Parse(#[from] url::ParseError),
    /// Unsupported URL scheme.
    #[error("{0}: unsupported scheme: expected `ipfs://`")]
    UnsupportedScheme(url::Url),
    /// Missing host.
    #[error("{0}: missing root")]
    MissingRoot(url::Url),
}

/// A git remote URL.
///
/// `ipfs://<root>/[<path>]`
///
/// Eg. `ipfs://QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG/repo.git`, where the
/// host is the IPFS root and the path leads to a bare repository under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Url {
    pub root: String,
    pub path: String,
}

impl FromStr for Url {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = url::Url::parse(s)?;
        Url::try_from(url)
    }
}

impl TryFrom<url::Url> for Url {
    type Error = UrlError;

    fn try_from(url: url::Url) -> Result<Self, Self::Error> {
        if url.scheme() != SCHEME {
            return Err(Self::Error::UnsupportedScheme(url));
        }
        let root = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_owned(),
            _ => return Err(Self::Error::MissingRoot(url)),
        };

        Ok(Url {
            root,
            path: url.path().to_owned(),
        })
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}://{}{}", self.root, self.path)
    }
}

/// Root path of a repository inside the object store, eg.
/// `/ipfs/<root>/repo.git`.
///
/// Derived once from the remote URL, and immutable from then on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryLocator(String);

impl RepositoryLocator {
    /// Path of `rel` inside the repository, eg. `info/refs`.
    pub fn join(&self, rel: &str) -> String {
        let rel = rel.trim_start_matches('/');
        if rel.is_empty() {
            self.0.clone()
        } else {
            format!("{}/{rel}", self.0)
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&Url> for RepositoryLocator {
    fn from(url: &Url) -> Self {
        let mut path = format!("/{SCHEME}/{}", url.root);
        for segment in url.path.split('/').filter(|s| !s.is_empty()) {
            path.push('/');
            path.push_str(segment);
        }
        Self(path)
    }
}

impl fmt::Display for RepositoryLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Path of a loose object relative to the repository, eg.
/// `objects/e6/9de29bb2d1d6434b8b29ae775ad8c2e48c5391`.
pub fn loose_path(oid: impl fmt::Display) -> String {
    let hex = oid.to_string();
    let (dir, file) = hex.split_at(hex.len().min(2));

    format!("objects/{dir}/{file}")
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    const ROOT: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";

    #[test]
    fn test_url_parse() {
        let url = Url::from_str(&format!("ipfs://{ROOT}/repo.git")).unwrap();

        assert_eq!(url.root, ROOT);
        assert_eq!(url.path, "/repo.git");
        assert_eq!(url.to_string(), format!("ipfs://{ROOT}/repo.git"));
    }

    #[test]
    fn test_url_without_path() {
        let url = Url::from_str(&format!("ipfs://{ROOT}")).unwrap();
        let locator = RepositoryLocator::from(&url);

        assert_eq!(locator.as_str(), format!("/ipfs/{ROOT}"));
        assert_eq!(locator.join("HEAD"), format!("/ipfs/{ROOT}/HEAD"));
    }

    #[test]
    fn test_url_unsupported_scheme() {
        assert!(matches!(
            Url::from_str(&format!("ipns://{ROOT}/repo.git")),
            Err(UrlError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            Url::from_str("https://example.com/repo.git"),
            Err(UrlError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_url_missing_root() {
        assert!(matches!(
            Url::from_str("ipfs:repo.git"),
            Err(UrlError::MissingRoot(_))
        ));
        assert!(matches!(Url::from_str("repo.git"), Err(UrlError::Parse(_))));
    }

    #[test]
    fn test_loose_path() {
        assert_eq!(
            loose_path("e69de29bb2d1d6434b8b29ae775ad8c2e48c5391"),
            "objects/e6/9de29bb2d1d6434b8b29ae775ad8c2e48c5391"
        );
    }

    #[test]
    fn test_locator_join() {
        let url = Url::from_str(&format!("ipfs://{ROOT}//nested//repo.git/")).unwrap();
        let locator = RepositoryLocator::from(&url);

        assert_eq!(locator.to_string(), format!("/ipfs/{ROOT}/nested/repo.git"));
        assert_eq!(
            locator.join("info/refs"),
            format!("/ipfs/{ROOT}/nested/repo.git/info/refs")
        );
        assert_eq!(
            locator.join("/objects/pack/pack-1.pack"),
            format!("/ipfs/{ROOT}/nested/repo.git/objects/pack/pack-1.pack")
        );
    }
}
