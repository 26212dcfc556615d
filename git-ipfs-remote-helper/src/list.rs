use std::collections::HashMap;
use std::io;
use std::str;

use thiserror::Error;

use git_ipfs::store::{self, Store};

use crate::{parse_oid, Context};

/// Manifest of references published alongside the repository.
pub const MANIFEST: &str = "info/refs";
/// Symbolic reference to the default branch.
pub const HEAD: &str = "HEAD";
/// Prefix of a symbolic `HEAD` descriptor.
pub const HEAD_PREFIX: &[u8] = b"ref: ";

#[derive(Debug, Error)]
pub enum Error {
    /// Store error.
    #[error(transparent)]
    Store(#[from] store::Error),
    /// The manifest isn't valid UTF-8.
    #[error("processing {MANIFEST}: invalid utf-8: {0}")]
    Encoding(#[from] str::Utf8Error),
    /// A manifest line isn't of the form `<oid>\t<refname>`.
    #[error("processing {MANIFEST}: malformed line {line}: {content:?}")]
    MalformedManifest { line: usize, content: String },
    /// The `HEAD` descriptor isn't symbolic.
    #[error("illegal {HEAD} descriptor: {0:?}")]
    MalformedHead(String),
    /// `HEAD` points to a reference missing from the manifest.
    #[error("unknown {HEAD} reference {0:?}")]
    UnresolvedHead(String),
}

/// Reference name to object id, as published in the manifest.
pub type ReferenceMap = HashMap<String, git2::Oid>;

/// The references of the remote repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct References {
    /// The reference `HEAD` points to, eg. `refs/heads/master`.
    pub head_ref: String,
    /// What `HEAD` resolves to.
    pub head: git2::Oid,
    pub refs: ReferenceMap,
}

impl References {
    /// Write the response to a `list` command: `HEAD` first, then every
    /// reference in no particular order, then a blank line.
    pub fn write<W: io::Write>(&self, mut w: W) -> io::Result<()> {
        writeln!(w, "{} {HEAD}", self.head)?;
        for (name, oid) in &self.refs {
            writeln!(w, "{oid} {name}")?;
        }
        writeln!(w)
    }
}

/// List refs for fetching (`git fetch` and `git ls-remote`).
///
/// Both the manifest and `HEAD` are read from the store on every call.
pub fn resolve<S: Store>(ctx: &Context<S>) -> Result<References, Error> {
    let manifest = ctx.store.get(&ctx.locator.join(MANIFEST))?;
    let refs = parse_manifest(&manifest)?;

    let head = ctx.store.get(&ctx.locator.join(HEAD))?;
    let head_ref = parse_head(&head)?;
    let Some(head) = refs.get(&head_ref).copied() else {
        return Err(Error::UnresolvedHead(head_ref));
    };
    log::debug!(target: "list", "Resolved {HEAD} to {head_ref} ({head})");

    Ok(References {
        head_ref,
        head,
        refs,
    })
}

/// Parse an `info/refs` manifest.
///
/// Later lines win over earlier lines naming the same reference.
pub fn parse_manifest(bytes: &[u8]) -> Result<ReferenceMap, Error> {
    let mut refs = ReferenceMap::new();

    for (i, line) in str::from_utf8(bytes)?.lines().enumerate() {
        let malformed = || Error::MalformedManifest {
            line: i + 1,
            content: line.to_owned(),
        };
        let (oid, name) = match line.split('\t').collect::<Vec<_>>().as_slice() {
            [oid, name] if !name.is_empty() => (parse_oid(oid).ok_or_else(malformed)?, *name),
            _ => return Err(malformed()),
        };
        log::trace!(target: "list", "Got ref {name} ({oid})");

        if refs.insert(name.to_owned(), oid).is_some() {
            log::warn!(target: "list", "Duplicate ref {name} in {MANIFEST}, keeping {oid}");
        }
    }
    Ok(refs)
}

/// Parse a `HEAD` descriptor into the name of the reference it points to.
pub fn parse_head(bytes: &[u8]) -> Result<String, Error> {
    let Some(target) = bytes.strip_prefix(HEAD_PREFIX) else {
        return Err(Error::MalformedHead(
            String::from_utf8_lossy(bytes).into_owned(),
        ));
    };
    let target = str::from_utf8(target)
        .map_err(|_| Error::MalformedHead(String::from_utf8_lossy(bytes).into_owned()))?;

    Ok(target.trim().to_owned())
}
