//! A git remote helper for repositories published on IPFS.
//!
//! Git runs `git-remote-ipfs <remote> ipfs://<root>/<path>` and speaks the
//! remote helper protocol with it over stdin and stdout. Only `list` and
//! `fetch` are served: published repositories are immutable.
#![cfg_attr(not(test), warn(clippy::unwrap_used))]
pub mod coordinator;
pub mod fetch;
pub mod list;

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::{env, io, thread};

use crossbeam_channel as chan;
use thiserror::Error;

use git_ipfs::locator::UrlError;
use git_ipfs::store::Store;
use git_ipfs::version::Version;
use git_ipfs::{config, Config, Ipfs, RepositoryLocator, Url};
use git_ipfs_signals::Signal;

use crate::coordinator::Coordinator;

pub const VERSION: Version<'static> = Version {
    name: "git-remote-ipfs",
    version: env!("CARGO_PKG_VERSION"),
    git_head: env!("GIT_HEAD"),
};

/// Capabilities advertised to git, one per line.
pub const CAPABILITIES: &[&str] = &["fetch", "push"];

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid arguments received.
    #[error("invalid arguments: {0:?}")]
    InvalidArguments(Vec<String>),
    /// Error with the remote url.
    #[error("invalid remote url: {0}")]
    RemoteUrl(#[from] UrlError),
    /// Missing or invalid environment.
    #[error(transparent)]
    Config(#[from] config::Error),
    /// The local repository couldn't be opened.
    #[error("local repository `{0}`: {1}")]
    Repository(PathBuf, #[source] git2::Error),
    /// Invalid command received.
    #[error("invalid command `{0}`")]
    InvalidCommand(String),
    /// A `fetch` command without an object id and a ref name.
    #[error("malformed `fetch` command `{0}`")]
    MalformedFetch(String),
    /// Listing refs failed.
    #[error("list: {0}")]
    List(#[from] list::Error),
    /// Fetching an object failed.
    #[error("fetch: {0}")]
    Fetch(#[from] fetch::Error),
    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// The session was ended by a signal.
    #[error("interrupted by {0}")]
    Interrupted(Signal),
    /// A unit of work ended without reporting how.
    #[error("helper task ended unexpectedly")]
    Abandoned,
}

impl Error {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidArguments(_) | Self::RemoteUrl(_) | Self::Config(_) => 2,
            _ => 1,
        }
    }
}

/// Everything a session needs: where the repository lives in the store,
/// how to reach the store, and the local repository to fetch into.
pub struct Context<S> {
    pub locator: RepositoryLocator,
    pub store: S,
    pub repo: git2::Repository,
}

impl<S: Store> Context<S> {
    pub fn new(locator: RepositoryLocator, store: S, repo: git2::Repository) -> Self {
        Self {
            locator,
            store,
            repo,
        }
    }
}

/// Parse the remote URL out of the helper's arguments.
///
/// Git passes the remote name and the URL, or only the URL when none was
/// configured.
pub fn parse_args(args: Vec<String>) -> Result<Url, Error> {
    match args.as_slice() {
        [url] | [_, url] => Ok(url.parse::<Url>()?),
        _ => Err(Error::InvalidArguments(args)),
    }
}

/// Run the IPFS remote helper, with the process environment and arguments.
pub fn run() -> Result<(), Error> {
    let url = parse_args(env::args().skip(1).collect())?;
    let config = Config::from_env()?;
    let locator = RepositoryLocator::from(&url);
    log::debug!(target: "remote-helper", "Remote {url} at {locator}, GIT_DIR={:?}", config.git_dir);

    let repo = git2::Repository::open(&config.git_dir)
        .map_err(|e| Error::Repository(config.git_dir.clone(), e))?;
    let store = Ipfs::new(&config.api, &VERSION.user_agent());
    let ctx = Context::new(locator, store, repo);

    let coordinator = Coordinator::new();
    let (notify, signals) = chan::bounded(1);
    git_ipfs_signals::install(notify)?;

    let reporter = coordinator.reporter();
    thread::Builder::new()
        .name("signals".to_owned())
        .spawn(move || {
            if let Ok(signal) = signals.recv() {
                log::debug!(target: "remote-helper", "Received {signal}");
                reporter.report(Err(Error::Interrupted(signal)));
            }
        })?;

    let reporter = coordinator.reporter();
    thread::Builder::new()
        .name("protocol".to_owned())
        .spawn(move || {
            let stdin = io::stdin();
            let stdout = io::stdout();

            reporter.report(speak(&ctx, stdin.lock(), stdout.lock()));
        })?;

    coordinator.wait()
}

/// Speak the remote helper protocol until the end of the command batch, or
/// the end of input.
///
/// See <https://git-scm.com/docs/gitremote-helpers>.
pub fn speak<S: Store, R: BufRead, W: Write>(
    ctx: &Context<S>,
    mut input: R,
    mut output: W,
) -> Result<(), Error> {
    let mut line = String::new();

    loop {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            log::debug!(target: "remote-helper", "End of input");
            return Ok(());
        }
        let text = line.trim_end_matches(['\n', '\r']);
        log::trace!(target: "remote-helper", "git> {text}");

        match text {
            "capabilities" => {
                for capability in CAPABILITIES {
                    writeln!(output, "{capability}")?;
                }
                writeln!(output)?;
            }
            // Also covers `list for-push`.
            text if text.starts_with("list") => {
                let refs = list::resolve(ctx)?;
                refs.write(&mut output)?;
            }
            text if text.starts_with("fetch ") => {
                let (oid, refname) = match text.split(' ').collect::<Vec<_>>().as_slice() {
                    ["fetch", oid, refname] => (
                        parse_oid(oid).ok_or_else(|| Error::MalformedFetch(text.to_owned()))?,
                        *refname,
                    ),
                    _ => return Err(Error::MalformedFetch(text.to_owned())),
                };
                log::info!(target: "remote-helper", "Fetching {refname} ({oid})");

                let fetched = fetch::run(ctx, oid)?;
                log::debug!(target: "remote-helper", "Fetched {oid}: {fetched:?}");
                writeln!(output)?;
            }
            // An empty line ends the command batch, and the session with it.
            "" => {
                log::debug!(target: "remote-helper", "End of command batch");
                writeln!(output)?;
                writeln!(output)?;
                output.flush()?;

                return Ok(());
            }
            _ => return Err(Error::InvalidCommand(text.to_owned())),
        }
        output.flush()?;
    }
}

/// Parse a full-length, hex-encoded object id.
pub(crate) fn parse_oid(s: &str) -> Option<git2::Oid> {
    if s.len() != 40 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    git2::Oid::from_str(s).ok()
}
