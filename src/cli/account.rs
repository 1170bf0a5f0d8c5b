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

//! The one-shot `account` subcommands.
//!
//! Unlike batch runs, these are operator-facing single operations, so an
//! endpoint failure terminates the process with a status describing what
//! went wrong.

use rand::{rngs::OsRng, Rng};

use super::main::{
    AccountAddSubcommand, AccountPasswdSubcommand, AccountQuotaSubcommand,
    AccountRmSubcommand, AccountStatusSubcommand, AccountSubcommand,
};
use crate::admin::endpoint::{
    AccountChanges, Endpoint, NewAccount, StatusCode,
};
use crate::store::{status, DirStore};
use crate::support::error::Error;
use crate::support::sysexits::*;

pub(super) fn run(cmd: AccountSubcommand, store: &mut DirStore) {
    match cmd {
        AccountSubcommand::Add(cmd) => add(cmd, store),
        AccountSubcommand::Rm(cmd) => rm(cmd, store),
        AccountSubcommand::Quota(cmd) => quota(cmd, store),
        AccountSubcommand::Passwd(cmd) => passwd(cmd, store),
        AccountSubcommand::Status(cmd) => set_status(cmd, store),
    }
}

fn add(cmd: AccountAddSubcommand, store: &mut DirStore) {
    let subject = format!("{}@{}", cmd.account, cmd.domain);
    let (password, generated) = obtain_password(cmd.prompt_password);

    let result = store.create_account(&NewAccount {
        domain: cmd.domain,
        name: cmd.account,
        password: password.clone(),
        display_name: cmd.name,
        quota_bytes: cmd.quota,
    });
    check(store, "create", &subject, result);

    println!("Created {}", subject);
    if generated {
        println!("Password: {}", password);
    }
}

fn rm(cmd: AccountRmSubcommand, store: &mut DirStore) {
    let subject = format!("{}@{}", cmd.account, cmd.domain);

    let result = store.delete_account(&cmd.domain, &cmd.account);
    check(store, "delete", &subject, result);

    println!("Deleted {}", subject);
}

fn quota(cmd: AccountQuotaSubcommand, store: &mut DirStore) {
    let subject = format!("{}@{}", cmd.account, cmd.domain);

    let result = store.update_account(
        &cmd.domain,
        &cmd.account,
        &AccountChanges {
            quota_bytes: Some(cmd.quota),
            ..AccountChanges::default()
        },
    );
    check(store, "change quota for", &subject, result);

    if 0 == cmd.quota {
        println!("Quota for {} is now unlimited", subject);
    } else {
        println!("Quota for {} is now {} bytes", subject, cmd.quota);
    }
}

fn passwd(cmd: AccountPasswdSubcommand, store: &mut DirStore) {
    let subject = format!("{}@{}", cmd.account, cmd.domain);
    let (password, generated) = obtain_password(cmd.prompt_password);

    let result = store.update_account(
        &cmd.domain,
        &cmd.account,
        &AccountChanges {
            password: Some(password.clone()),
            ..AccountChanges::default()
        },
    );
    check(store, "reset password for", &subject, result);

    println!("Password for {} reset", subject);
    if generated {
        println!("Password: {}", password);
    }
}

fn set_status(cmd: AccountStatusSubcommand, store: &mut DirStore) {
    let enabled = match cmd.state.as_str() {
        "enabled" => true,
        "disabled" => false,
        other => die!(
            EX_USAGE,
            "Expected 'enabled' or 'disabled', got '{}'",
            other
        ),
    };

    let subject = format!("{}@{}", cmd.account, cmd.domain);
    let result = store.update_account(
        &cmd.domain,
        &cmd.account,
        &AccountChanges {
            enabled: Some(enabled),
            ..AccountChanges::default()
        },
    );
    check(store, "change status of", &subject, result);

    println!("{} is now {}", subject, cmd.state);
}

/// Prompts for a password, or generates one. The second element of the
/// return value is whether the password was generated and so needs to be
/// shown to the operator.
fn obtain_password(prompt: bool) -> (String, bool) {
    if prompt {
        let password = match rpassword::read_password_from_tty(Some(
            "Password: ",
        ))
        .and_then(|a| {
            rpassword::read_password_from_tty(Some("Confirm: "))
                .map(|b| (a, b))
        }) {
            Err(e) => die!(EX_NOINPUT, "Failed to read password: {}", e),
            Ok((a, b)) if a != b => {
                die!(EX_DATAERR, "Passwords don't match")
            },
            Ok((a, _)) if a.is_empty() => {
                die!(EX_NOINPUT, "No password given")
            },
            Ok((a, _)) => a,
        };
        (password, false)
    } else {
        let data: [u8; 8] = OsRng.gen();
        (base64::encode(data), true)
    }
}

/// Terminates the process when a one-shot operation did not succeed,
/// translating the store's status codes into the conventional sysexits.
fn check(
    store: &DirStore,
    what: &str,
    subject: &str,
    result: Result<StatusCode, Error>,
) {
    let status = match result {
        Ok(status) => status,
        Err(e) => {
            die!(EX_UNAVAILABLE, "Unable to {} '{}': {}", what, subject, e)
        },
    };

    if status.is_ok() {
        return;
    }

    eprintln!(
        "Unable to {} '{}': {}",
        what,
        subject,
        store.describe_status(status)
    );
    match status {
        status::NO_SUCH_DOMAIN => EX_NOHOST.exit(),
        status::NO_SUCH_ACCOUNT => EX_NOUSER.exit(),
        status::ACCOUNT_EXISTS => EX_CANTCREAT.exit(),
        status::NAME_NOT_ALLOWED => EX_USAGE.exit(),
        _ => EX_UNAVAILABLE.exit(),
    }
}
