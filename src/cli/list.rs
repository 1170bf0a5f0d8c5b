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

use super::main::ListSubcommand;
use crate::admin::endpoint::{AccountSnapshot, Endpoint};
use crate::store::DirStore;
use crate::support::error::Error;
use crate::support::sysexits::*;

pub(super) fn run(cmd: ListSubcommand, store: &mut DirStore) {
    let domains = match cmd.domain {
        Some(domain) => vec![domain],
        None => match store.list_domains() {
            Ok(domains) => domains,
            Err(e) => die!(EX_UNAVAILABLE, "Unable to list domains: {}", e),
        },
    };

    for (ix, domain) in domains.iter().enumerate() {
        let accounts = match store.list_accounts(domain) {
            Ok(accounts) => accounts,
            Err(e @ Error::NoSuchDomain) => {
                die!(EX_NOHOST, "Unable to list '{}': {}", domain, e)
            },
            Err(e @ Error::UnsafeName) => {
                die!(EX_USAGE, "Unable to list '{}': {}", domain, e)
            },
            Err(e) => {
                die!(EX_UNAVAILABLE, "Unable to list '{}': {}", domain, e)
            },
        };

        if 0 != ix {
            println!();
        }
        println!("{}:", domain);

        if accounts.is_empty() {
            println!("  (no accounts)");
        }
        for account in &accounts {
            println!("  {}", describe_account(account));
        }
    }
}

fn describe_account(account: &AccountSnapshot) -> String {
    let mut s = account.name.clone();
    if let Some(ref display_name) = account.display_name {
        s.push_str(&format!(" ({})", display_name));
    }
    if !account.enabled {
        s.push_str(" [disabled]");
    }

    s.push_str(&format!(
        ", {} used of {}",
        format_size(account.mail_size_bytes),
        match account.quota_bytes {
            0 => "unlimited".to_owned(),
            quota => format_size(quota),
        }
    ));

    if let Some(ref forward_to) = account.forward_to {
        s.push_str(&format!(", forwards to {}", forward_to));
    }
    s
}

fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "kB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while 1024.0 <= value && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }

    if 0 == unit {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn format_size_picks_sensible_units() {
        assert_eq!("0 B", format_size(0));
        assert_eq!("999 B", format_size(999));
        assert_eq!("1.0 kB", format_size(1024));
        assert_eq!("1.5 MB", format_size(3 * 1024 * 1024 / 2));
        assert_eq!("2.0 GB", format_size(2 * 1024 * 1024 * 1024));
    }

    #[test]
    fn describe_account_mentions_what_is_set() {
        let mut account = AccountSnapshot {
            name: "bob".to_owned(),
            display_name: Some("Bob Kelso".to_owned()),
            quota_bytes: 0,
            enabled: true,
            forward_to: None,
            mail_size_bytes: 512,
        };
        assert_eq!(
            "bob (Bob Kelso), 512 B used of unlimited",
            describe_account(&account)
        );

        account.display_name = None;
        account.enabled = false;
        account.quota_bytes = 1 << 20;
        account.forward_to = Some("hr@corp.example".to_owned());
        assert_eq!(
            "bob [disabled], 512 B used of 1.0 MB, \
             forwards to hr@corp.example",
            describe_account(&account)
        );
    }
}
