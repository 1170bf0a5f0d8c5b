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

//! The TOML documents the directory store keeps on disk: per-account
//! `account.toml`, and per-domain `aliases.toml` and `groups.toml`.

use std::collections::BTreeMap;

use rand::{rngs::OsRng, Rng};
use serde::{Deserialize, Serialize};

mod b64 {
    use base64;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Vec<u8>,
        ser: S,
    ) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&base64::encode(bytes))
    }

    pub fn deserialize<'a, D: Deserializer<'a>>(
        de: D,
    ) -> Result<Vec<u8>, D::Error> {
        use serde::de::Error;
        String::deserialize(de).and_then(|s| {
            base64::decode(&s).map_err(|err| Error::custom(err.to_string()))
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum PasswordType {
    Argon2i_V13_M4096_T10_L1,
}

/// One account, stored in "account.toml" at the root of the account
/// directory.
///
/// `credentials` must stay the last field so that the TOML serialiser
/// emits the plain values before opening the `[credentials]` table.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AccountConfig {
    #[serde(default)]
    pub display_name: Option<String>,
    /// Storage limit in bytes. 0 means unlimited.
    #[serde(default)]
    pub quota_bytes: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub forward_to: Option<String>,
    pub credentials: CredConfig,
}

fn default_enabled() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CredConfig {
    #[serde(with = "b64")]
    pub password_hash: Vec<u8>,
    #[serde(with = "b64")]
    pub password_salt: Vec<u8>,
    pub password_type: PasswordType,
}

impl CredConfig {
    /// Hashes `password` under a fresh random salt, so repeated calls with
    /// the same password yield distinct objects.
    pub fn new(password: &str) -> Self {
        let salt: [u8; 32] = OsRng.gen();
        let password_hash =
            argon2::hash_raw(password.as_bytes(), &salt, &argon2_config())
                .expect("argon2 hash failed");

        CredConfig {
            password_hash,
            password_salt: salt[..].to_owned(),
            password_type: PasswordType::Argon2i_V13_M4096_T10_L1,
        }
    }
}

fn argon2_config() -> argon2::Config<'static> {
    argon2::Config {
        hash_length: 32,
        lanes: 1,
        mem_cost: 4096,
        thread_mode: argon2::ThreadMode::Sequential,
        time_cost: 10,
        variant: argon2::Variant::Argon2i,
        version: argon2::Version::Version13,
        ..argon2::Config::default()
    }
}

/// The alias table for one domain, stored in "aliases.toml" at the root of
/// the domain directory. Keys are alias names, values the account the
/// alias delivers to.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct DomainAliases {
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

impl DomainAliases {
    /// Drops every alias delivering to `account`, returning how many were
    /// dropped.
    pub fn remove_target(&mut self, account: &str) -> usize {
        let before = self.aliases.len();
        self.aliases.retain(|_, target| target != account);
        before - self.aliases.len()
    }
}

/// The distribution groups for one domain, stored in "groups.toml" at the
/// root of the domain directory. Keys are group names, values the member
/// account names.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct DomainGroups {
    #[serde(default)]
    pub groups: BTreeMap<String, Vec<String>>,
}

impl DomainGroups {
    /// Strips `account` from every member list, returning how many groups
    /// changed.
    pub fn remove_member(&mut self, account: &str) -> usize {
        let mut changed = 0;
        for members in self.groups.values_mut() {
            let before = members.len();
            members.retain(|member| member != account);
            if before != members.len() {
                changed += 1;
            }
        }
        changed
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fresh_credentials_verify_against_the_password() {
        let cred = CredConfig::new("hunter2");

        assert!(argon2::verify_raw(
            b"hunter2",
            &cred.password_salt,
            &cred.password_hash,
            &argon2_config(),
        )
        .unwrap());
        assert!(!argon2::verify_raw(
            b"hunter3",
            &cred.password_salt,
            &cred.password_hash,
            &argon2_config(),
        )
        .unwrap());
    }

    #[test]
    fn fresh_credentials_use_distinct_salts() {
        let a = CredConfig::new("hunter2");
        let b = CredConfig::new("hunter2");
        assert_ne!(a.password_salt, b.password_salt);
        assert_ne!(a.password_hash, b.password_hash);
    }

    #[test]
    fn alias_removal_touches_only_matching_targets() {
        let mut aliases: DomainAliases = toml::from_slice(
            br#"
            [aliases]
            sales = "bob"
            info = "alice"
            postmaster = "bob"
            "#,
        )
        .unwrap();

        assert_eq!(2, aliases.remove_target("bob"));
        assert_eq!(0, aliases.remove_target("bob"));
        assert_eq!(
            vec!["info"],
            aliases.aliases.keys().collect::<Vec<_>>()
        );
    }

    #[test]
    fn group_removal_strips_the_member_everywhere() {
        let mut groups: DomainGroups = toml::from_slice(
            br#"
            [groups]
            staff = ["alice", "bob"]
            sales = ["bob"]
            board = ["alice"]
            "#,
        )
        .unwrap();

        assert_eq!(2, groups.remove_member("bob"));
        assert_eq!(
            vec!["alice".to_owned()],
            groups.groups["staff"]
        );
        assert!(groups.groups["sales"].is_empty());
        assert_eq!(vec!["alice".to_owned()], groups.groups["board"]);
    }

    #[test]
    fn empty_documents_parse_as_empty_tables() {
        let aliases: DomainAliases = toml::from_slice(b"").unwrap();
        assert!(aliases.aliases.is_empty());

        let groups: DomainGroups = toml::from_slice(b"").unwrap();
        assert!(groups.groups.is_empty());
    }
}
