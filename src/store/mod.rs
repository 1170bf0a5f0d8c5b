//-
// Copyright (c) 2023, Jason Lingle
//
// This file is part of Postadm.
//
// Postadm is free software: you can  redistribute it and/or modify it under
// the terms of  the GNU General Public License as  published by the Free
// Software Foundation, either version 3 of  the License, or (at your option)
// any later version.
//
// Postadm is distributed  in the hope that it will  be useful, but WITHOUT
// ANY WARRANTY; without even the  implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along
// with Postadm. If not, see <http://www.gnu.org/licenses/>.

//! The directory-backed administration endpoint.
//!
//! `DirStore` administers a mail store laid out as one directory per
//! domain, each containing one directory per account:
//!
//! ```text
//! <root>/
//!   example.com/
//!     aliases.toml
//!     groups.toml
//!     bob/
//!       account.toml
//!       forward
//!       mail/...
//! ```
//!
//! `mail/` holds message data; it is size-scanned but never parsed.
//! Configuration rewrites are staged to a temporary file on the same
//! filesystem and renamed into place.

use std::fs;
use std::io::{self, Read, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::admin::endpoint::{
    AccountChanges, AccountSnapshot, Endpoint, MailboxStore, NewAccount,
    StatusCode,
};
use crate::support::error::Error;
use crate::support::file_ops::{self, IgnoreKinds};
use crate::support::safe_name::{is_safe_domain, is_safe_name};

pub mod backup;
pub mod config;

use self::config::{AccountConfig, CredConfig, DomainAliases, DomainGroups};

/// The status codes `DirStore` reports. Opaque to the record processor;
/// documented here for the operator.
pub mod status {
    use crate::admin::endpoint::StatusCode;

    pub const OK: StatusCode = StatusCode::OK;
    pub const NO_SUCH_DOMAIN: StatusCode = StatusCode(2);
    pub const NO_SUCH_ACCOUNT: StatusCode = StatusCode(3);
    pub const ACCOUNT_EXISTS: StatusCode = StatusCode(4);
    /// Returned for any name that is refused as a path component, before
    /// the filesystem is touched.
    pub const NAME_NOT_ALLOWED: StatusCode = StatusCode(5);
}

/// Given the root of an account directory, return the path of the
/// account's configuration file.
pub fn account_config_file(account_dir: &Path) -> PathBuf {
    account_dir.join("account.toml")
}

pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: PathBuf) -> Self {
        DirStore { root }
    }

    fn domain_dir(&self, domain: &str) -> PathBuf {
        self.root.join(domain)
    }

    fn account_dir(&self, domain: &str, name: &str) -> PathBuf {
        self.domain_dir(domain).join(name)
    }

    fn load_account(
        &self,
        account_dir: &Path,
    ) -> Result<AccountConfig, Error> {
        let mut data = Vec::new();
        fs::File::open(account_config_file(account_dir))?
            .read_to_end(&mut data)?;

        let config: AccountConfig = toml::from_slice(&data)?;
        Ok(config)
    }

    fn store_account(
        &self,
        account_dir: &Path,
        config: &AccountConfig,
    ) -> Result<(), Error> {
        let data =
            toml::to_vec(config).expect("TOML serialisation failed");
        file_ops::spit(
            account_dir,
            account_config_file(account_dir),
            true,
            0o600,
            &data,
        )?;
        Ok(())
    }

    fn snapshot(
        &self,
        account_dir: &Path,
        name: &str,
    ) -> Result<AccountSnapshot, Error> {
        let config = self.load_account(account_dir)?;

        let mail_size_bytes = match dir_size(&account_dir.join("mail")) {
            Ok(n) => n,
            Err(e) if io::ErrorKind::NotFound == e.kind() => 0,
            Err(e) => return Err(e.into()),
        };

        Ok(AccountSnapshot {
            name: name.to_owned(),
            display_name: config.display_name,
            quota_bytes: config.quota_bytes,
            enabled: config.enabled,
            forward_to: config.forward_to,
            mail_size_bytes,
        })
    }

    /// Runs the shared existence checks, yielding the account directory
    /// if both names are safe and both directories exist.
    fn locate(
        &self,
        domain: &str,
        name: &str,
    ) -> Result<PathBuf, StatusCode> {
        if !is_safe_domain(domain) || !is_safe_name(name) {
            return Err(status::NAME_NOT_ALLOWED);
        }

        let domain_dir = self.domain_dir(domain);
        if !domain_dir.is_dir() {
            return Err(status::NO_SUCH_DOMAIN);
        }

        let account_dir = domain_dir.join(name);
        if !account_dir.is_dir() {
            return Err(status::NO_SUCH_ACCOUNT);
        }

        Ok(account_dir)
    }
}

impl Endpoint for DirStore {
    fn create_account(
        &mut self,
        account: &NewAccount,
    ) -> Result<StatusCode, Error> {
        if !is_safe_domain(&account.domain) || !is_safe_name(&account.name)
        {
            return Ok(status::NAME_NOT_ALLOWED);
        }

        let domain_dir = self.domain_dir(&account.domain);
        if !domain_dir.is_dir() {
            return Ok(status::NO_SUCH_DOMAIN);
        }

        let account_dir = domain_dir.join(&account.name);
        if account_dir.exists() {
            return Ok(status::ACCOUNT_EXISTS);
        }

        let config = AccountConfig {
            credentials: CredConfig::new(&account.password),
            display_name: account.display_name.clone(),
            quota_bytes: account.quota_bytes,
            enabled: true,
            forward_to: None,
        };
        let config_toml =
            toml::to_vec(&config).expect("TOML serialisation failed");

        fs::DirBuilder::new().mode(0o750).create(&account_dir)?;
        fs::DirBuilder::new()
            .mode(0o750)
            .create(account_dir.join("mail"))?;
        fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .mode(0o600)
            .open(account_config_file(&account_dir))?
            .write_all(&config_toml)?;

        Ok(status::OK)
    }

    fn delete_account(
        &mut self,
        domain: &str,
        name: &str,
    ) -> Result<StatusCode, Error> {
        let account_dir = match self.locate(domain, name) {
            Ok(dir) => dir,
            Err(status) => return Ok(status),
        };

        fs::remove_dir_all(&account_dir)?;
        Ok(status::OK)
    }

    fn fetch_account(
        &mut self,
        domain: &str,
        name: &str,
    ) -> Result<(StatusCode, Option<AccountSnapshot>), Error> {
        let account_dir = match self.locate(domain, name) {
            Ok(dir) => dir,
            Err(status) => return Ok((status, None)),
        };

        let snapshot = self.snapshot(&account_dir, name)?;
        Ok((status::OK, Some(snapshot)))
    }

    fn update_account(
        &mut self,
        domain: &str,
        name: &str,
        changes: &AccountChanges,
    ) -> Result<StatusCode, Error> {
        let account_dir = match self.locate(domain, name) {
            Ok(dir) => dir,
            Err(status) => return Ok(status),
        };

        let mut config = self.load_account(&account_dir)?;
        if let Some(ref password) = changes.password {
            config.credentials = CredConfig::new(password);
        }
        if let Some(quota_bytes) = changes.quota_bytes {
            config.quota_bytes = quota_bytes;
        }
        if let Some(enabled) = changes.enabled {
            config.enabled = enabled;
        }
        if let Some(ref forward_to) = changes.forward_to {
            config.forward_to = Some(forward_to.clone());
        }

        self.store_account(&account_dir, &config)?;
        Ok(status::OK)
    }

    fn remove_aliases(
        &mut self,
        domain: &str,
        name: &str,
    ) -> Result<StatusCode, Error> {
        if let Err(status) = self.locate(domain, name) {
            return Ok(status);
        }

        let domain_dir = self.domain_dir(domain);
        let path = domain_dir.join("aliases.toml");
        let data = fs::read(&path).ignore_not_found()?;
        let mut aliases: DomainAliases = toml::from_slice(&data)?;

        let removed = aliases.remove_target(name);
        if 0 != removed {
            let data =
                toml::to_vec(&aliases).expect("TOML serialisation failed");
            file_ops::spit(&domain_dir, &path, true, 0o640, &data)?;
        }

        debug!("{}@{}: removed {} alias(es)", name, domain, removed);
        Ok(status::OK)
    }

    fn remove_from_groups(
        &mut self,
        domain: &str,
        name: &str,
    ) -> Result<StatusCode, Error> {
        if let Err(status) = self.locate(domain, name) {
            return Ok(status);
        }

        let domain_dir = self.domain_dir(domain);
        let path = domain_dir.join("groups.toml");
        let data = fs::read(&path).ignore_not_found()?;
        let mut groups: DomainGroups = toml::from_slice(&data)?;

        let changed = groups.remove_member(name);
        if 0 != changed {
            let data =
                toml::to_vec(&groups).expect("TOML serialisation failed");
            file_ops::spit(&domain_dir, &path, true, 0o640, &data)?;
        }

        debug!("{}@{}: left {} group(s)", name, domain, changed);
        Ok(status::OK)
    }

    fn list_domains(&mut self) -> Result<Vec<String>, Error> {
        let mut domains = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }

            if let Ok(name) = entry.file_name().into_string() {
                if is_safe_domain(&name) {
                    domains.push(name);
                }
            }
        }

        domains.sort();
        Ok(domains)
    }

    fn list_accounts(
        &mut self,
        domain: &str,
    ) -> Result<Vec<AccountSnapshot>, Error> {
        if !is_safe_domain(domain) {
            return Err(Error::UnsafeName);
        }

        let domain_dir = self.domain_dir(domain);
        if !domain_dir.is_dir() {
            return Err(Error::NoSuchDomain);
        }

        let mut accounts = Vec::new();
        for entry in fs::read_dir(&domain_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }

            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            if !is_safe_name(&name) {
                continue;
            }

            match self.snapshot(&entry.path(), &name) {
                Ok(snapshot) => accounts.push(snapshot),
                Err(e) => {
                    // A directory without a readable account.toml is not
                    // an account.
                    warn!(
                        "{}@{}: skipped unreadable account: {}",
                        name, domain, e
                    );
                },
            }
        }

        accounts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(accounts)
    }

    fn status_message(&self, status: StatusCode) -> Option<&'static str> {
        match status {
            status::NO_SUCH_DOMAIN => Some("no such domain"),
            status::NO_SUCH_ACCOUNT => Some("no such account"),
            status::ACCOUNT_EXISTS => Some("account already exists"),
            status::NAME_NOT_ALLOWED => Some("name not allowed"),
            _ => None,
        }
    }
}

impl MailboxStore for DirStore {
    fn archive_account(
        &mut self,
        domain: &str,
        name: &str,
        dest: &Path,
    ) -> Result<PathBuf, Error> {
        let account_dir = self.checked_account_dir(domain, name)?;
        backup::archive_directory(&account_dir, domain, name, dest)
    }

    fn write_forward_marker(
        &mut self,
        domain: &str,
        name: &str,
        forward_to: &str,
    ) -> Result<(), Error> {
        let account_dir = self.checked_account_dir(domain, name)?;
        file_ops::spit(
            &account_dir,
            account_dir.join("forward"),
            true,
            0o640,
            format!("{}\n", forward_to).as_bytes(),
        )?;
        Ok(())
    }
}

impl DirStore {
    /// `locate`, with the statuses mapped onto the error channel for the
    /// `MailboxStore` operations, which have no status code to return.
    fn checked_account_dir(
        &self,
        domain: &str,
        name: &str,
    ) -> Result<PathBuf, Error> {
        self.locate(domain, name).map_err(|status| match status {
            status::NO_SUCH_DOMAIN => Error::NoSuchDomain,
            status::NO_SUCH_ACCOUNT => Error::NoSuchAccount,
            _ => Error::UnsafeName,
        })
    }
}

fn dir_size(dir: &Path) -> io::Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let md = entry.metadata()?;
        if md.is_dir() {
            total += dir_size(&entry.path())?;
        } else {
            total += md.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod test {
    use super::*;

    fn fixture() -> (tempfile::TempDir, DirStore) {
        let root = tempfile::TempDir::new().unwrap();
        fs::create_dir(root.path().join("example.com")).unwrap();
        let store = DirStore::new(root.path().to_owned());
        (root, store)
    }

    fn new_bob() -> NewAccount {
        NewAccount {
            domain: "example.com".to_owned(),
            name: "bob".to_owned(),
            password: "hunter2".to_owned(),
            display_name: Some("Bob Kelso".to_owned()),
            quota_bytes: 1 << 20,
        }
    }

    #[test]
    fn create_and_fetch_round_trip() {
        let (root, mut store) = fixture();

        assert_eq!(status::OK, store.create_account(&new_bob()).unwrap());

        let account_dir = root.path().join("example.com/bob");
        assert!(account_dir.join("account.toml").is_file());
        assert!(account_dir.join("mail").is_dir());

        fs::write(account_dir.join("mail/msg1"), b"0123456789").unwrap();

        let (status, snapshot) =
            store.fetch_account("example.com", "bob").unwrap();
        assert_eq!(status::OK, status);

        let snapshot = snapshot.unwrap();
        assert_eq!("bob", snapshot.name);
        assert_eq!(Some("Bob Kelso".to_owned()), snapshot.display_name);
        assert_eq!(1 << 20, snapshot.quota_bytes);
        assert!(snapshot.enabled);
        assert_eq!(None, snapshot.forward_to);
        assert_eq!(10, snapshot.mail_size_bytes);
    }

    #[test]
    fn create_requires_an_existing_domain() {
        let (root, mut store) = fixture();

        let account = NewAccount {
            domain: "nowhere.test".to_owned(),
            ..new_bob()
        };
        assert_eq!(
            status::NO_SUCH_DOMAIN,
            store.create_account(&account).unwrap()
        );
        assert!(!root.path().join("nowhere.test").exists());
    }

    #[test]
    fn create_rejects_duplicates() {
        let (_root, mut store) = fixture();

        assert_eq!(status::OK, store.create_account(&new_bob()).unwrap());
        assert_eq!(
            status::ACCOUNT_EXISTS,
            store.create_account(&new_bob()).unwrap()
        );
    }

    #[test]
    fn create_rejects_unsafe_names() {
        let (root, mut store) = fixture();

        for name in &["../evil", "a/b", ".hidden", "bob@example.com", ""] {
            let account = NewAccount {
                name: (*name).to_owned(),
                ..new_bob()
            };
            assert_eq!(
                status::NAME_NOT_ALLOWED,
                store.create_account(&account).unwrap(),
                "accepted {:?}",
                name
            );
        }

        let account = NewAccount {
            domain: "bad domain".to_owned(),
            ..new_bob()
        };
        assert_eq!(
            status::NAME_NOT_ALLOWED,
            store.create_account(&account).unwrap()
        );

        assert!(!root.path().join("evil").exists());
    }

    #[test]
    fn delete_removes_the_account_tree() {
        let (root, mut store) = fixture();
        store.create_account(&new_bob()).unwrap();
        fs::write(
            root.path().join("example.com/bob/mail/msg1"),
            b"Subject: hi\n",
        )
        .unwrap();

        assert_eq!(
            status::OK,
            store.delete_account("example.com", "bob").unwrap()
        );
        assert!(!root.path().join("example.com/bob").exists());

        assert_eq!(
            status::NO_SUCH_ACCOUNT,
            store.delete_account("example.com", "bob").unwrap()
        );
        let (status, snapshot) =
            store.fetch_account("example.com", "bob").unwrap();
        assert_eq!(status::NO_SUCH_ACCOUNT, status);
        assert!(snapshot.is_none());
    }

    #[test]
    fn delete_in_unknown_domain_reports_the_domain() {
        let (_root, mut store) = fixture();
        assert_eq!(
            status::NO_SUCH_DOMAIN,
            store.delete_account("nowhere.test", "bob").unwrap()
        );
    }

    #[test]
    fn update_applies_each_change() {
        let (_root, mut store) = fixture();
        store.create_account(&new_bob()).unwrap();

        assert_eq!(
            status::OK,
            store
                .update_account(
                    "example.com",
                    "bob",
                    &AccountChanges {
                        quota_bytes: Some(0),
                        enabled: Some(false),
                        forward_to: Some("hr@corp.example".to_owned()),
                        ..AccountChanges::default()
                    },
                )
                .unwrap()
        );

        let (_, snapshot) =
            store.fetch_account("example.com", "bob").unwrap();
        let snapshot = snapshot.unwrap();
        assert_eq!(0, snapshot.quota_bytes);
        assert!(!snapshot.enabled);
        assert_eq!(
            Some("hr@corp.example".to_owned()),
            snapshot.forward_to
        );
        // Untouched fields keep their values.
        assert_eq!(Some("Bob Kelso".to_owned()), snapshot.display_name);
    }

    #[test]
    fn update_password_replaces_credentials() {
        let (root, mut store) = fixture();
        store.create_account(&new_bob()).unwrap();

        let config_path =
            root.path().join("example.com/bob/account.toml");
        let before: AccountConfig =
            toml::from_slice(&fs::read(&config_path).unwrap()).unwrap();

        assert_eq!(
            status::OK,
            store
                .update_account(
                    "example.com",
                    "bob",
                    &AccountChanges {
                        password: Some("s3cret".to_owned()),
                        ..AccountChanges::default()
                    },
                )
                .unwrap()
        );

        let after: AccountConfig =
            toml::from_slice(&fs::read(&config_path).unwrap()).unwrap();
        assert_ne!(
            before.credentials.password_hash,
            after.credentials.password_hash
        );
        assert_ne!(
            before.credentials.password_salt,
            after.credentials.password_salt
        );
    }

    #[test]
    fn update_missing_account_reports_status() {
        let (_root, mut store) = fixture();
        assert_eq!(
            status::NO_SUCH_ACCOUNT,
            store
                .update_account(
                    "example.com",
                    "bob",
                    &AccountChanges::default(),
                )
                .unwrap()
        );
    }

    #[test]
    fn remove_aliases_rewrites_only_when_matched() {
        let (root, mut store) = fixture();
        store.create_account(&new_bob()).unwrap();

        let path = root.path().join("example.com/aliases.toml");
        fs::write(
            &path,
            b"[aliases]\nsales = \"bob\"\ninfo = \"alice\"\n",
        )
        .unwrap();

        assert_eq!(
            status::OK,
            store.remove_aliases("example.com", "bob").unwrap()
        );

        let aliases: DomainAliases =
            toml::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(
            vec!["info"],
            aliases.aliases.keys().collect::<Vec<_>>()
        );
    }

    #[test]
    fn remove_aliases_without_alias_file_is_ok() {
        let (_root, mut store) = fixture();
        store.create_account(&new_bob()).unwrap();

        assert_eq!(
            status::OK,
            store.remove_aliases("example.com", "bob").unwrap()
        );
    }

    #[test]
    fn remove_from_groups_strips_membership() {
        let (root, mut store) = fixture();
        store.create_account(&new_bob()).unwrap();

        let path = root.path().join("example.com/groups.toml");
        fs::write(
            &path,
            b"[groups]\nstaff = [\"alice\", \"bob\"]\nsales = [\"bob\"]\n",
        )
        .unwrap();

        assert_eq!(
            status::OK,
            store.remove_from_groups("example.com", "bob").unwrap()
        );

        let groups: DomainGroups =
            toml::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(vec!["alice".to_owned()], groups.groups["staff"]);
        assert!(groups.groups["sales"].is_empty());
    }

    #[test]
    fn list_domains_reports_sorted_safe_dirs() {
        let (root, mut store) = fixture();
        fs::create_dir(root.path().join("aaa.test")).unwrap();
        fs::create_dir(root.path().join(".git")).unwrap();
        fs::write(root.path().join("README"), b"not a domain\n").unwrap();

        assert_eq!(
            vec!["aaa.test".to_owned(), "example.com".to_owned()],
            store.list_domains().unwrap()
        );
    }

    #[test]
    fn list_accounts_snapshots_sorted_by_name() {
        let (_root, mut store) = fixture();
        store.create_account(&new_bob()).unwrap();
        store
            .create_account(&NewAccount {
                name: "alice".to_owned(),
                display_name: None,
                ..new_bob()
            })
            .unwrap();

        let accounts = store.list_accounts("example.com").unwrap();
        assert_eq!(
            vec!["alice", "bob"],
            accounts
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
        );

        assert!(matches!(
            store.list_accounts("nowhere.test"),
            Err(Error::NoSuchDomain)
        ));
    }

    #[test]
    fn forward_marker_contents() {
        let (root, mut store) = fixture();
        store.create_account(&new_bob()).unwrap();

        store
            .write_forward_marker("example.com", "bob", "hr@corp.example")
            .unwrap();
        assert_eq!(
            "hr@corp.example\n",
            fs::read_to_string(
                root.path().join("example.com/bob/forward")
            )
            .unwrap()
        );

        assert!(matches!(
            store.write_forward_marker(
                "example.com",
                "nobody",
                "hr@corp.example"
            ),
            Err(Error::NoSuchAccount)
        ));
    }

    #[test]
    fn archive_account_requires_the_account() {
        let (root, mut store) = fixture();

        assert!(matches!(
            store.archive_account(
                "example.com",
                "bob",
                &root.path().join("backups"),
            ),
            Err(Error::NoSuchAccount)
        ));

        store.create_account(&new_bob()).unwrap();
        let artefact = store
            .archive_account(
                "example.com",
                "bob",
                &root.path().join("backups"),
            )
            .unwrap();
        assert!(0 < artefact.metadata().unwrap().len());
    }
}
