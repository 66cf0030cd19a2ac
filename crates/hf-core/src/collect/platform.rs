//! Platform identity facts: kernel, architecture, hostname, distribution.
//!
//! # Data Sources
//! - `uname(2)` - kernel name, release, machine
//! - `gethostname(2)` / resolver canonical name - hostname and fqdn
//! - `/etc/os-release` - primary distribution identity
//! - Legacy vendor release files - fallback distribution identity, with an
//!   override table correcting known-wrong vendor self-identification
//! - `lsb_release -a` - fills fields the files left absent

use super::probe::{self, read_file};
use super::selector::Collector;
use hf_common::Fragment;
use regex::Regex;
use std::ffi::{CStr, CString};
use std::path::PathBuf;
use tracing::debug;

/// Kernel identity from `uname(2)`.
#[derive(Debug, Clone)]
pub struct UnameInfo {
    /// Kernel name, e.g. "Linux".
    pub sysname: String,
    /// Node name as the kernel knows it.
    pub nodename: String,
    /// Kernel release, e.g. "6.1.0-13-amd64".
    pub release: String,
    /// Machine hardware name, e.g. "x86_64".
    pub machine: String,
}

/// Read kernel identity via `uname(2)`.
pub fn uname() -> Option<UnameInfo> {
    let mut uts: libc::utsname = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::uname(&mut uts) };
    if rc != 0 {
        return None;
    }
    Some(UnameInfo {
        sysname: cstr_field(&uts.sysname),
        nodename: cstr_field(&uts.nodename),
        release: cstr_field(&uts.release),
        machine: cstr_field(&uts.machine),
    })
}

/// Convert a fixed-size C string field to an owned String.
fn cstr_field(field: &[libc::c_char]) -> String {
    unsafe { CStr::from_ptr(field.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

/// Collapse raw machine strings into a canonical architecture class.
///
/// The whole i386 family reports as `i386`; `amd64` reports as `x86_64`;
/// 32-bit ARM variants collapse to `arm`. Anything unrecognized passes
/// through untouched.
pub fn normalize_architecture(machine: &str) -> String {
    match machine {
        "i386" | "i486" | "i586" | "i686" => "i386".to_string(),
        "x86_64" | "amd64" => "x86_64".to_string(),
        m if m.starts_with("armv") => "arm".to_string(),
        m => m.to_string(),
    }
}

/// Short hostname via `gethostname(2)`, truncated at the first dot.
pub fn hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return None;
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    let name = String::from_utf8_lossy(&buf[..end]).into_owned();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Resolver canonical name for the host, the usual source of the fqdn.
pub fn lookup_fqdn(host: &str) -> Option<String> {
    let c_host = CString::new(host).ok()?;
    let mut hints: libc::addrinfo = unsafe { std::mem::zeroed() };
    hints.ai_flags = libc::AI_CANONNAME;
    hints.ai_family = libc::AF_UNSPEC;
    hints.ai_socktype = libc::SOCK_STREAM;

    let mut res: *mut libc::addrinfo = std::ptr::null_mut();
    let rc = unsafe { libc::getaddrinfo(c_host.as_ptr(), std::ptr::null(), &hints, &mut res) };
    if rc != 0 || res.is_null() {
        return None;
    }

    let canonname = unsafe { (*res).ai_canonname };
    let fqdn = if canonname.is_null() {
        None
    } else {
        Some(
            unsafe { CStr::from_ptr(canonname) }
                .to_string_lossy()
                .into_owned(),
        )
    };
    unsafe { libc::freeaddrinfo(res) };
    fqdn.filter(|name| !name.is_empty())
}

/// Distribution identity assembled from release files and tools.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Distribution {
    /// Distribution name, e.g. "Ubuntu", "CentOS".
    pub name: Option<String>,
    /// Version number string, e.g. "22.04".
    pub version: Option<String>,
    /// Release codename, e.g. "jammy".
    pub release: Option<String>,
}

impl Distribution {
    fn is_complete(&self) -> bool {
        self.name.is_some() && self.version.is_some() && self.release.is_some()
    }

    /// Fill absent fields from another source, never overwriting.
    fn fill_from(&mut self, other: Distribution) {
        if self.name.is_none() {
            self.name = other.name;
        }
        if self.version.is_none() {
            self.version = other.version;
        }
        if self.release.is_none() {
            self.release = other.release;
        }
    }
}

/// Parse `/etc/os-release` style `KEY=value` lines.
///
/// Values may be double-quoted. Unrecognized lines are skipped.
pub fn parse_os_release_content(content: &str) -> Option<Distribution> {
    let mut dist = Distribution::default();

    for line in content.lines() {
        let Some((key, raw_value)) = line.split_once('=') else {
            continue;
        };
        let value = raw_value.trim().trim_matches('"').to_string();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "NAME" => dist.name = Some(value),
            "VERSION_ID" => dist.version = Some(value),
            "VERSION_CODENAME" => dist.release = Some(value),
            _ => {}
        }
    }

    if dist.name.is_none() {
        None
    } else {
        Some(dist)
    }
}

/// Legacy vendor release files, checked in order after os-release. The
/// second element is the vendor the file claims to be from; the content
/// may prove otherwise (see [`correct_vendor`]).
const RELEASE_FILES: &[(&str, &str)] = &[
    ("etc/redhat-release", "RedHat"),
    ("etc/vmware-release", "VMwareESX"),
    ("etc/openwrt_release", "OpenWrt"),
    ("etc/system-release", "Amazon"),
    ("etc/alpine-release", "Alpine"),
    ("etc/arch-release", "Archlinux"),
    ("etc/SuSE-release", "SuSE"),
    ("etc/gentoo-release", "Gentoo"),
    ("etc/UnitedLinux-release", "SLES"),
    ("etc/debian_version", "Debian"),
];

/// Correct known-wrong vendor self-identification.
///
/// Several vendors ship a release file under another vendor's name: CentOS
/// and Scientific Linux both carry `/etc/redhat-release`, and UnitedLinux
/// descendants identify as SLES. The file content decides.
pub fn correct_vendor(default_name: &str, content: &str) -> String {
    if content.contains("CentOS") {
        "CentOS".to_string()
    } else if content.contains("Scientific Linux") {
        "Scientific".to_string()
    } else if content.contains("Red Hat Enterprise Linux") {
        "RedHat".to_string()
    } else if content.contains("Fedora") {
        "Fedora".to_string()
    } else if content.contains("SUSE Linux Enterprise Server") {
        "SLES".to_string()
    } else if content.contains("openSUSE") {
        "openSUSE".to_string()
    } else {
        default_name.to_string()
    }
}

/// Parse a legacy one-line release file into a distribution record.
///
/// Handles both prose forms ("CentOS release 6.10 (Final)") and bare
/// version files ("12.4" in `debian_version`).
pub fn parse_legacy_release(default_name: &str, content: &str) -> Distribution {
    let content = content.trim();
    let name = correct_vendor(default_name, content);

    // Bare version file: the whole content is the version.
    if content
        .chars()
        .next()
        .map(|c| c.is_ascii_digit())
        .unwrap_or(false)
    {
        return Distribution {
            name: Some(name),
            version: Some(content.to_string()),
            release: None,
        };
    }

    let version_re = Regex::new(r"release (\d[\w.]*)").expect("static regex");
    let codename_re = Regex::new(r"\(([^)]+)\)").expect("static regex");

    Distribution {
        name: Some(name),
        version: version_re
            .captures(content)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
        release: codename_re
            .captures(content)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
    }
}

/// Parse `lsb_release -a` output.
///
/// Format: "Distributor ID:\tUbuntu" / "Release:\t22.04" / "Codename:\tjammy".
pub fn parse_lsb_release_content(content: &str) -> Option<Distribution> {
    let mut dist = Distribution::default();

    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "Distributor ID" => dist.name = Some(value),
            "Release" => dist.version = Some(value),
            "Codename" => dist.release = Some(value),
            _ => {}
        }
    }

    if dist.name.is_none() && dist.version.is_none() {
        None
    } else {
        Some(dist)
    }
}

/// Platform identity collector for Linux.
pub struct LinuxPlatform {
    root: PathBuf,
}

impl LinuxPlatform {
    pub fn new() -> Self {
        Self { root: PathBuf::from("/") }
    }

    /// Rooted construction for tests with fixture trees.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve distribution identity: os-release first, then the legacy
    /// file table, then `lsb_release` for whatever is still absent.
    fn resolve_distribution(&self) -> Distribution {
        let mut dist = read_file(self.root.join("etc/os-release"))
            .and_then(|content| parse_os_release_content(&content))
            .unwrap_or_default();

        if !dist.is_complete() {
            for (rel_path, default_name) in RELEASE_FILES {
                if let Some(content) = read_file(self.root.join(rel_path)) {
                    dist.fill_from(parse_legacy_release(default_name, &content));
                    break;
                }
            }
        }

        if !dist.is_complete() {
            if let Some(out) = probe::run("lsb_release", &["-a"]) {
                if out.success() {
                    if let Some(lsb) = parse_lsb_release_content(&out.stdout) {
                        dist.fill_from(lsb);
                    }
                }
            }
        }

        dist
    }
}

impl Default for LinuxPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for LinuxPlatform {
    fn topic(&self) -> &'static str {
        "platform"
    }

    fn collect(&self) -> Fragment {
        let mut fragment = Fragment::new();

        if let Some(info) = uname() {
            fragment.insert("kernel".into(), info.sysname.clone().into());
            fragment.insert("kernel_release".into(), info.release.clone().into());
            fragment.insert("machine".into(), info.machine.clone().into());
            fragment.insert(
                "architecture".into(),
                normalize_architecture(&info.machine).into(),
            );
        }

        if let Some(name) = hostname() {
            let short = name.split('.').next().unwrap_or(&name).to_string();
            let fqdn = lookup_fqdn(&name).unwrap_or_else(|| name.clone());
            fragment.insert("hostname".into(), short.into());
            fragment.insert("fqdn".into(), fqdn.into());
        }

        let dist = self.resolve_distribution();
        if let Some(name) = dist.name {
            fragment.insert("distribution".into(), name.into());
        } else {
            debug!("distribution identity unavailable");
        }
        if let Some(version) = dist.version {
            fragment.insert("distribution_version".into(), version.into());
        }
        if let Some(release) = dist.release {
            fragment.insert("distribution_release".into(), release.into());
        }

        fragment
    }
}
