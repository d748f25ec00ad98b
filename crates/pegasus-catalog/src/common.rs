//! Types shared by all catalogs: profiles and system information.

use std::fmt;
use std::str::FromStr;

use crate::error::CatalogError;

/// A namespaced key/value profile attached to a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CatalogProfile {
    pub namespace: String,
    pub key: String,
    pub value: String,
}

impl CatalogProfile {
    pub fn new(
        namespace: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into().to_ascii_lowercase(),
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Adds `profile`, replacing any existing profile in the same namespace and key.
pub fn upsert_profile(profiles: &mut Vec<CatalogProfile>, profile: CatalogProfile) {
    match profiles
        .iter_mut()
        .find(|p| p.namespace == profile.namespace && p.key == profile.key)
    {
        Some(existing) => existing.value = profile.value,
        None => profiles.push(profile),
    }
}

/// Processor architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Arch {
    X86,
    #[default]
    X86_64,
    Ppc,
    Ppc64,
    Ppc64le,
    Ia64,
    Sparcv7,
    Sparcv9,
    Aarch64,
}

impl Arch {
    pub fn as_str(self) -> &'static str {
        match self {
            Arch::X86 => "x86",
            Arch::X86_64 => "x86_64",
            Arch::Ppc => "ppc",
            Arch::Ppc64 => "ppc_64",
            Arch::Ppc64le => "ppc64le",
            Arch::Ia64 => "ia64",
            Arch::Sparcv7 => "sparcv7",
            Arch::Sparcv9 => "sparcv9",
            Arch::Aarch64 => "aarch64",
        }
    }
}

impl FromStr for Arch {
    type Err = CatalogError;

    /// Accepts current names and the legacy `INTEL32`, `INTEL64` and `AMD64`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "x86" | "intel32" | "i386" | "i686" => Arch::X86,
            "x86_64" | "amd64" => Arch::X86_64,
            "ppc" => Arch::Ppc,
            "ppc_64" | "ppc64" => Arch::Ppc64,
            "ppc64le" => Arch::Ppc64le,
            "ia64" | "intel64" => Arch::Ia64,
            "sparcv7" => Arch::Sparcv7,
            "sparcv9" => Arch::Sparcv9,
            "aarch64" | "arm64" => Arch::Aarch64,
            other => return Err(CatalogError::invalid(format!("unknown architecture '{other}'"))),
        })
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Os {
    #[default]
    Linux,
    Sunos,
    Aix,
    Macosx,
    Windows,
    Freebsd,
}

impl Os {
    pub fn as_str(self) -> &'static str {
        match self {
            Os::Linux => "linux",
            Os::Sunos => "sunos",
            Os::Aix => "aix",
            Os::Macosx => "macosx",
            Os::Windows => "windows",
            Os::Freebsd => "freebsd",
        }
    }
}

impl FromStr for Os {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "linux" => Os::Linux,
            "sunos" | "solaris" => Os::Sunos,
            "aix" => Os::Aix,
            "macosx" | "darwin" | "osx" => Os::Macosx,
            "windows" => Os::Windows,
            "freebsd" => Os::Freebsd,
            other => return Err(CatalogError::invalid(format!("unknown operating system '{other}'"))),
        })
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The platform an executable or site runs on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SysInfo {
    pub arch: Arch,
    pub os: Os,
    pub os_release: Option<String>,
    pub os_version: Option<String>,
    pub glibc: Option<String>,
}

impl SysInfo {
    pub fn new(arch: Arch, os: Os) -> Self {
        Self {
            arch,
            os,
            ..Default::default()
        }
    }

    /// Parses the column form `ARCH::OS[:VERSION[:GLIBC]]`.
    pub fn parse_column(s: &str) -> Result<Self, CatalogError> {
        let (arch, rest) = s
            .split_once("::")
            .ok_or_else(|| CatalogError::invalid(format!("sysinfo '{s}' is not ARCH::OS")))?;
        let mut parts = rest.split(':');
        let os = parts.next().unwrap_or_default().parse()?;
        let os_version = parts.next().filter(|v| !v.is_empty()).map(str::to_string);
        let glibc = parts.next().filter(|v| !v.is_empty()).map(str::to_string);
        Ok(Self {
            arch: arch.parse()?,
            os,
            os_release: None,
            os_version,
            glibc,
        })
    }

    /// Renders the column form, upper-cased.
    pub fn to_column(&self) -> String {
        let mut out = format!(
            "{}::{}",
            self.arch.as_str().to_ascii_uppercase(),
            self.os.as_str().to_ascii_uppercase()
        );
        if let Some(version) = &self.os_version {
            out.push(':');
            out.push_str(version);
            if let Some(glibc) = &self.glibc {
                out.push(':');
                out.push_str(glibc);
            }
        }
        out
    }
}
