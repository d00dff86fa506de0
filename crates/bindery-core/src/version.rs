//! Library version and the host runtime version gate.
//!
//! ```
//! use bindery_core::version::{Version, check_host_version};
//!
//! assert!(check_host_version(Version::new(3, 4, 0)).is_err());
//! assert!(check_host_version(Version::new(3, 12, 1)).is_ok());
//! assert_eq!(Version::dev(2, 11, 0, 1).to_string(), "2.11.0.dev1");
//! ```

use std::cmp::Ordering;
use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

/// Release level of a version, ordered from least to most stable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, IntoPrimitive, TryFromPrimitive,
)]
#[repr(u8)]
pub enum ReleaseLevel {
    /// Development snapshot.
    Dev = 0x0,
    /// Alpha pre-release.
    Alpha = 0xA,
    /// Beta pre-release.
    Beta = 0xB,
    /// Release candidate.
    Candidate = 0xC,
    /// Final release.
    #[default]
    Final = 0xF,
}

impl ReleaseLevel {
    fn suffix(self) -> &'static str {
        match self {
            ReleaseLevel::Dev => ".dev",
            ReleaseLevel::Alpha => "a",
            ReleaseLevel::Beta => "b",
            ReleaseLevel::Candidate => "rc",
            ReleaseLevel::Final => "",
        }
    }
}

/// A `major.minor.patch` version with a release level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    pub level: ReleaseLevel,
    pub serial: u8,
}

impl Version {
    /// A final release.
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self {
            major,
            minor,
            patch,
            level: ReleaseLevel::Final,
            serial: 0,
        }
    }

    /// A development snapshot.
    pub const fn dev(major: u8, minor: u8, patch: u8, serial: u8) -> Self {
        Self {
            major,
            minor,
            patch,
            level: ReleaseLevel::Dev,
            serial,
        }
    }

    /// Same version with a different release level.
    pub const fn with_level(mut self, level: ReleaseLevel, serial: u8) -> Self {
        self.level = level;
        self.serial = serial;
        self
    }

    /// Check if this is a final release.
    pub fn is_final(&self) -> bool {
        self.level == ReleaseLevel::Final
    }

    /// Packed form: `0xMMmmppLS`.
    ///
    /// The serial gets a single nibble, so versions with a serial above 15
    /// have no packed form and return `None`.
    pub fn to_hex(&self) -> Option<u32> {
        if self.serial > 0xF {
            return None;
        }
        Some(
            (u32::from(self.major) << 24)
                | (u32::from(self.minor) << 16)
                | (u32::from(self.patch) << 8)
                | (u32::from(u8::from(self.level)) << 4)
                | u32::from(self.serial),
        )
    }

    /// Unpack a version produced by [`to_hex`](Self::to_hex).
    pub fn from_hex(hex: u32) -> Option<Self> {
        let level = ReleaseLevel::try_from(((hex >> 4) & 0xF) as u8).ok()?;
        Some(Self {
            major: (hex >> 24) as u8,
            minor: (hex >> 16) as u8,
            patch: (hex >> 8) as u8,
            level,
            serial: (hex & 0xF) as u8,
        })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch, self.level, self.serial).cmp(&(
            other.major,
            other.minor,
            other.patch,
            other.level,
            other.serial,
        ))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.is_final() {
            write!(f, "{}{}", self.level.suffix(), self.serial)?;
        }
        Ok(())
    }
}

/// Version of this library.
pub const VERSION: Version = Version::new(0, 1, 0);

/// Oldest host runtime the binding layer supports.
pub const MIN_HOST_VERSION: Version = Version::new(3, 5, 0);

/// [`VERSION`] as a string.
pub fn version_string() -> String {
    VERSION.to_string()
}

/// [`VERSION`] as a `(major, minor, patch, level)` tuple.
pub fn version_info() -> (u8, u8, u8, String) {
    let level = if VERSION.is_final() {
        String::new()
    } else {
        format!("{}{}", VERSION.level.suffix().trim_start_matches('.'), VERSION.serial)
    };
    (VERSION.major, VERSION.minor, VERSION.patch, level)
}

/// Version gate failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("bindery does not support host versions < {minimum} (found {found})")]
    Unsupported { found: Version, minimum: Version },
}

/// Fail when `host` is older than [`MIN_HOST_VERSION`].
pub fn check_host_version(host: Version) -> Result<(), VersionError> {
    if host < MIN_HOST_VERSION {
        return Err(VersionError::Unsupported {
            found: host,
            minimum: MIN_HOST_VERSION,
        });
    }
    Ok(())
}
