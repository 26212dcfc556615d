use std::collections::{HashMap, HashSet};
use std::io;
use std::io::{BufRead, BufReader, Read};
use std::iter;
use std::str;

use flate2::read::ZlibDecoder;
use thiserror::Error;

use git_ipfs::locator::loose_path;
use git_ipfs::store::{self, Store};

use crate::{parse_oid, Context};

/// List of packs published alongside the repository.
pub const PACK_LIST: &str = "objects/info/packs";

/// Tree entry mode of a submodule commit, which isn't part of this repository.
const GITLINK_MODE: u32 = 0o160000;
/// Longest loose object header we accept, `<kind> <size>\0`.
const MAX_HEADER_LEN: u64 = 32;

#[derive(Debug, Error)]
pub enum Error {
    /// Store error.
    #[error(transparent)]
    Store(#[from] store::Error),
    /// Git error.
    #[error("git: {0}")]
    Git(#[from] git2::Error),
    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// A loose object could not be decoded.
    #[error("object {oid}: {reason}")]
    Corrupt { oid: git2::Oid, reason: String },
    /// A loose object's content doesn't hash to the id it was stored under.
    #[error("object stored as {expected} hashes to {actual}")]
    Mismatch {
        expected: git2::Oid,
        actual: git2::Oid,
    },
    /// The pack list has a line we can't make sense of.
    #[error("processing {PACK_LIST}: malformed line {0:?}")]
    MalformedPackList(String),
    /// None of the published packs has the object.
    #[error("object {0} not found in any pack")]
    PackNotFound(git2::Oid),
    /// Neither the loose nor the packed object could be retrieved.
    #[error("fetching {oid} failed: {source}")]
    Exhausted {
        oid: git2::Oid,
        #[source]
        source: Box<Error>,
    },
}

/// How an object made it into the local repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    /// The object was already present.
    Present,
    /// The object and what it references were fetched as loose objects.
    Loose { objects: usize },
    /// The object was found in the given pack.
    Packed { pack: String },
}

/// Fetch an object, and everything it references, into the local repository.
///
/// Loose objects are tried first. On any failure, the published packs are
/// tried instead, and their error is the one reported.
///
/// Objects only ever land in the local repository together with everything
/// they reference: loose objects after their whole closure was retrieved,
/// packs as a whole. An object that exists locally is therefore complete.
pub fn run<S: Store>(ctx: &Context<S>, oid: git2::Oid) -> Result<Fetched, Error> {
    let odb = ctx.repo.odb()?;
    if odb.exists(oid) {
        log::debug!(target: "fetch", "Object {oid} is already present");
        return Ok(Fetched::Present);
    }

    match loose(ctx, &odb, oid) {
        Ok(objects) => {
            log::debug!(target: "fetch", "Fetched {oid} as {objects} loose object(s)");
            return Ok(Fetched::Loose { objects });
        }
        Err(Error::Store(e)) if e.is_not_found() => {
            log::debug!(target: "fetch", "Loose fetch of {oid} incomplete: {e}");
        }
        Err(e) => {
            log::warn!(target: "fetch", "Loose fetch of {oid} failed: {e}");
        }
    }

    match packed(ctx, &odb, oid) {
        Ok(pack) => {
            log::debug!(target: "fetch", "Fetched {oid} from {pack}");
            Ok(Fetched::Packed { pack })
        }
        Err(e) => Err(Error::Exhausted {
            oid,
            source: Box::new(e),
        }),
    }
}

/// A loose object that was retrieved and verified, but not yet written.
struct Staged {
    kind: git2::ObjectType,
    data: Vec<u8>,
    refs: Vec<git2::Oid>,
}

/// Fetch `oid` and every object reachable from it that we don't already
/// have, one loose object at a time. Returns the number of objects written.
///
/// Nothing is written unless the whole closure could be retrieved.
fn loose<S: Store>(ctx: &Context<S>, odb: &git2::Odb, oid: git2::Oid) -> Result<usize, Error> {
    let mut queue = vec![oid];
    let mut staged = HashMap::new();

    while let Some(oid) = queue.pop() {
        if staged.contains_key(&oid) || odb.exists(oid) {
            continue;
        }
        let bytes = ctx.store.get(&ctx.locator.join(&loose_path(oid)))?;
        let (kind, data) = inflate(oid, &bytes)?;
        let actual = git2::Oid::hash_object(kind, &data)?;

        if actual != oid {
            return Err(Error::Mismatch {
                expected: oid,
                actual,
            });
        }
        let refs = references(oid, kind, &data)?;
        log::trace!(target: "fetch", "Retrieved {kind} {oid}");

        queue.extend(refs.iter().copied());
        staged.insert(oid, Staged { kind, data, refs });
    }
    write(odb, oid, &staged)?;

    Ok(staged.len())
}

/// Write staged objects reachable from `root`, each one after the objects it
/// references.
fn write(
    odb: &git2::Odb,
    root: git2::Oid,
    staged: &HashMap<git2::Oid, Staged>,
) -> Result<(), Error> {
    let mut written = HashSet::new();
    let mut stack = vec![(root, false)];

    while let Some((oid, expanded)) = stack.pop() {
        // Objects that aren't staged were already present.
        let Some(object) = staged.get(&oid) else {
            continue;
        };
        if written.contains(&oid) {
            continue;
        }
        if expanded {
            odb.write(object.kind, &object.data)?;
            written.insert(oid);
            log::trace!(target: "fetch", "Wrote {} {oid}", object.kind);
        } else {
            stack.push((oid, true));
            stack.extend(
                object
                    .refs
                    .iter()
                    .filter(|r| !written.contains(*r))
                    .map(|r| (*r, false)),
            );
        }
    }
    Ok(())
}

/// Decode a zlib-compressed loose object into its type and content.
///
/// No more than the size declared in the header, plus one byte, is inflated.
fn inflate(oid: git2::Oid, bytes: &[u8]) -> Result<(git2::ObjectType, Vec<u8>), Error> {
    let corrupt = |reason: &str| Error::Corrupt {
        oid,
        reason: reason.to_owned(),
    };
    let mut reader = BufReader::new(ZlibDecoder::new(bytes));
    let mut header = Vec::new();

    reader
        .by_ref()
        .take(MAX_HEADER_LEN)
        .read_until(0, &mut header)
        .map_err(|e| corrupt(&format!("inflate: {e}")))?;
    if header.pop() != Some(0) {
        return Err(corrupt("missing header"));
    }
    let header = str::from_utf8(&header).map_err(|_| corrupt("invalid header"))?;
    let (kind, size) = header
        .split_once(' ')
        .ok_or_else(|| corrupt("invalid header"))?;
    let kind = git2::ObjectType::from_str(kind)
        .filter(|k| *k != git2::ObjectType::Any)
        .ok_or_else(|| corrupt(&format!("unknown object type {kind:?}")))?;
    let size = size.parse::<u64>().map_err(|_| corrupt("invalid size"))?;

    let mut data = Vec::new();
    reader
        .take(size.saturating_add(1))
        .read_to_end(&mut data)
        .map_err(|e| corrupt(&format!("inflate: {e}")))?;

    let len = data.len() as u64;
    if len > size {
        return Err(corrupt(&format!("more than {size} bytes")));
    }
    if len < size {
        return Err(corrupt(&format!("expected {size} bytes, got {len}")));
    }
    Ok((kind, data))
}

/// Objects referenced by a decoded object: the tree and parents of a commit,
/// the entries of a tree except submodules, the target of a tag.
fn references(
    oid: git2::Oid,
    kind: git2::ObjectType,
    data: &[u8],
) -> Result<Vec<git2::Oid>, Error> {
    let corrupt = |reason: &str| Error::Corrupt {
        oid,
        reason: reason.to_owned(),
    };
    let id = |value: &[u8]| {
        str::from_utf8(value)
            .ok()
            .and_then(parse_oid)
            .ok_or_else(|| corrupt("invalid object id in header"))
    };

    match kind {
        git2::ObjectType::Commit => {
            let mut tree = None;
            let mut parents = Vec::new();

            for (key, value) in headers(data) {
                match key {
                    b"tree" => tree = Some(id(value)?),
                    b"parent" => parents.push(id(value)?),
                    _ => {}
                }
            }
            let tree = tree.ok_or_else(|| corrupt("commit without tree"))?;

            Ok(iter::once(tree).chain(parents).collect())
        }
        git2::ObjectType::Tag => {
            let (_, target) = headers(data)
                .find(|(key, _)| *key == b"object")
                .ok_or_else(|| corrupt("tag without target"))?;

            Ok(vec![id(target)?])
        }
        git2::ObjectType::Tree => {
            let mut refs = Vec::new();
            let mut rest = data;

            while !rest.is_empty() {
                // `<mode> <name>\0<20-byte id>`
                let nul = rest
                    .iter()
                    .position(|b| *b == 0)
                    .ok_or_else(|| corrupt("truncated tree entry"))?;
                let (entry, tail) = rest.split_at(nul);
                let tail = &tail[1..];
                if tail.len() < 20 {
                    return Err(corrupt("truncated tree entry"));
                }
                let (entry_id, tail) = tail.split_at(20);
                let mode = entry
                    .split(|b| *b == b' ')
                    .next()
                    .and_then(|m| str::from_utf8(m).ok())
                    .and_then(|m| u32::from_str_radix(m, 8).ok())
                    .ok_or_else(|| corrupt("invalid tree entry mode"))?;

                if mode != GITLINK_MODE {
                    refs.push(git2::Oid::from_bytes(entry_id)?);
                }
                rest = tail;
            }
            Ok(refs)
        }
        _ => Ok(vec![]),
    }
}

/// `<key> <value>` header lines of a commit or tag, up to the message.
fn headers(data: &[u8]) -> impl Iterator<Item = (&[u8], &[u8])> {
    data.split(|b| *b == b'\n')
        .take_while(|line| !line.is_empty())
        .filter_map(|line| {
            let space = line.iter().position(|b| *b == b' ')?;
            let (key, value) = line.split_at(space);

            Some((key, &value[1..]))
        })
}

/// Download published packs until one of them has `oid`. Returns the name
/// of that pack.
fn packed<S: Store>(ctx: &Context<S>, odb: &git2::Odb, oid: git2::Oid) -> Result<String, Error> {
    let list = ctx.store.get(&ctx.locator.join(PACK_LIST))?;

    for pack in parse_pack_list(&list)? {
        let mut reader = ctx
            .store
            .open(&ctx.locator.join(&format!("objects/pack/{pack}")))?;
        let mut writer = odb.packwriter()?;

        io::copy(&mut reader, &mut writer)?;
        writer.commit()?;
        odb.refresh()?;

        if odb.exists(oid) {
            return Ok(pack);
        }
        log::debug!(target: "fetch", "Pack {pack} does not have {oid}");
    }
    Err(Error::PackNotFound(oid))
}

/// Parse the pack list: one `P <name>.pack` line per pack. Other kinds of
/// lines are ignored.
pub fn parse_pack_list(bytes: &[u8]) -> Result<Vec<String>, Error> {
    let list = String::from_utf8_lossy(bytes);
    let mut packs = Vec::new();

    for line in list.lines() {
        let Some(name) = line.strip_prefix("P ") else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || name.contains('/') || !name.ends_with(".pack") {
            return Err(Error::MalformedPackList(line.to_owned()));
        }
        packs.push(name.to_owned());
    }
    Ok(packs)
}
