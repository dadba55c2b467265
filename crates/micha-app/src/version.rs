//! `MAJOR.MINOR.PATCH` engine version.
//!
//! Only the core triple is accepted; pre-release and build suffixes such as
//! `0.0.1-beta` are rejected.

use std::fmt;
use std::str::FromStr;

use tracing::error;

/// Why a version string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error("unable to parse version \"{input}\": expected 3 parts, found {found}")]
    WrongPartCount { input: String, found: usize },

    #[error("unable to parse version \"{input}\": `{part}` is not a non-negative integer")]
    InvalidNumber { input: String, part: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// The version of the `micha-app` crate itself.
    pub fn engine() -> Result<Self, VersionError> {
        env!("CARGO_PKG_VERSION").parse()
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s).inspect_err(|e| error!("{e}"))
    }
}

fn parse(s: &str) -> Result<Version, VersionError> {
    let parts: Vec<&str> = s.split('.').collect();
    let [major, minor, patch] = parts[..] else {
        return Err(VersionError::WrongPartCount {
            input: s.to_string(),
            found: parts.len(),
        });
    };

    let number = |part: &str| {
        part.parse::<u32>()
            .map_err(|_| VersionError::InvalidNumber {
                input: s.to_string(),
                part: part.to_string(),
            })
    };

    Ok(Version::new(number(major)?, number(minor)?, number(patch)?))
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_core_version() {
        assert_eq!("0.0.1".parse(), Ok(Version::new(0, 0, 1)));
        assert_eq!("10.20.30".parse::<Version>().unwrap().to_string(), "10.20.30");
    }

    #[test]
    fn test_wrong_part_count() {
        assert_eq!(
            "1.2".parse::<Version>(),
            Err(VersionError::WrongPartCount {
                input: "1.2".to_string(),
                found: 2
            })
        );
        assert!("1.2.3.4".parse::<Version>().is_err());
        assert!("".parse::<Version>().is_err());
    }

    #[test]
    fn test_non_numeric_parts() {
        let err = "a.b.c".parse::<Version>().unwrap_err();
        assert!(matches!(err, VersionError::InvalidNumber { ref part, .. } if part == "a"));
        assert!("1.2.3-beta".parse::<Version>().is_err());
        assert!("1.-2.3".parse::<Version>().is_err());
    }

    #[test]
    fn test_ordering() {
        assert!(Version::new(0, 1, 0) > Version::new(0, 0, 9));
        assert!(Version::new(1, 0, 0) > Version::new(0, 99, 99));
    }

    #[test]
    fn test_engine_version_parses() {
        assert!(Version::engine().is_ok());
    }
}
