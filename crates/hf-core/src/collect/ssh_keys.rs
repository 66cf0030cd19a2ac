//! SSH public host key facts.
//!
//! Reads the fixed well-known key files under `/etc/ssh` and publishes the
//! key material (the second field of the public key line). Absent key
//! types are skipped.

use super::probe::read_file;
use super::selector::Collector;
use hf_common::Fragment;
use std::path::PathBuf;

const KEY_TYPES: &[&str] = &["rsa", "dsa", "ecdsa", "ed25519"];

/// SSH host key collector.
pub struct SshHostKeys {
    etc_root: PathBuf,
}

impl SshHostKeys {
    pub fn new() -> Self {
        Self {
            etc_root: PathBuf::from("/etc"),
        }
    }

    /// Rooted construction for tests with fixture trees.
    pub fn with_etc_root(etc_root: impl Into<PathBuf>) -> Self {
        Self {
            etc_root: etc_root.into(),
        }
    }
}

impl Default for SshHostKeys {
    fn default() -> Self {
        Self::new()
    }
}

impl Collector for SshHostKeys {
    fn topic(&self) -> &'static str {
        "ssh_keys"
    }

    fn collect(&self) -> Fragment {
        let mut fragment = Fragment::new();

        for key_type in KEY_TYPES {
            let path = self
                .etc_root
                .join(format!("ssh/ssh_host_{}_key.pub", key_type));
            let Some(content) = read_file(&path) else {
                continue;
            };
            // Format: "<algorithm> <base64 key> [comment]"
            let Some(key) = content.split_whitespace().nth(1) else {
                continue;
            };
            fragment.insert(
                format!("ssh_host_key_{}_public", key_type),
                key.to_string().into(),
            );
        }

        fragment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_present_key_types() {
        let dir = tempfile::tempdir().unwrap();
        let ssh = dir.path().join("ssh");
        std::fs::create_dir_all(&ssh).unwrap();
        std::fs::write(
            ssh.join("ssh_host_ed25519_key.pub"),
            "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIKx7 root@db01\n",
        )
        .unwrap();
        std::fs::write(ssh.join("ssh_host_rsa_key.pub"), "ssh-rsa AAAAB3NzaC1yc2E=\n").unwrap();

        let fragment = SshHostKeys::with_etc_root(dir.path()).collect();
        assert_eq!(
            fragment
                .get("ssh_host_key_ed25519_public")
                .unwrap()
                .as_str(),
            Some("AAAAC3NzaC1lZDI1NTE5AAAAIKx7")
        );
        assert_eq!(
            fragment.get("ssh_host_key_rsa_public").unwrap().as_str(),
            Some("AAAAB3NzaC1yc2E=")
        );
        assert!(!fragment.contains_key("ssh_host_key_dsa_public"));
    }

    #[test]
    fn test_malformed_key_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let ssh = dir.path().join("ssh");
        std::fs::create_dir_all(&ssh).unwrap();
        std::fs::write(ssh.join("ssh_host_rsa_key.pub"), "only-one-field\n").unwrap();

        let fragment = SshHostKeys::with_etc_root(dir.path()).collect();
        assert!(fragment.is_empty());
    }
}
