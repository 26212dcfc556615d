use std::fmt;
use std::io;

/// Program version, as reported by `--version` and in the HTTP user agent.
///
/// The program version follows [semantic versioning](https://semver.org).
/// Development builds carry the git head as build metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version<'a> {
    pub name: &'a str,
    pub version: &'a str,
    pub git_head: &'a str,
}

impl Version<'_> {
    /// Short form used to identify ourselves to the IPFS API.
    pub fn user_agent(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }
}

impl fmt::Display for Version<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version.ends_with("-dev") {
            write!(f, "{} {}+{}", self.name, self.version, self.git_head)
        } else {
            write!(f, "{} {} ({})", self.name, self.version, self.git_head)
        }
    }
}

/// Print program version.
///
/// Adjust with caution, third party applications parse the string for version info.
pub fn print(mut w: impl io::Write, version: &Version) -> Result<(), io::Error> {
    writeln!(w, "{version}")
}
