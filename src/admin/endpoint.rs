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

//! The abstract interface to the mail account administration endpoint.
//!
//! Every operation returns `Result<StatusCode, Error>`, which gives each
//! call two distinct failure channels:
//!
//! - `Ok(status)` with a non-zero status is a failure *reported by the
//!   endpoint* (account missing, name rejected, and so forth). The code is
//!   opaque to the caller and is surfaced to the operator verbatim,
//!   together with [`Endpoint::status_message`] text when there is any.
//!
//! - `Err(_)` is a transport fault: the endpoint could not be consulted at
//!   all. During batch processing these are caught per record; they never
//!   abort a run.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::support::error::Error;

/// Status code returned by the administration endpoint.
///
/// Zero is success. Any other value is an opaque failure code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusCode(pub i32);

impl StatusCode {
    pub const OK: Self = StatusCode(0);

    pub fn is_ok(self) -> bool {
        0 == self.0
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything needed to bring a new account into existence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAccount {
    pub domain: String,
    pub name: String,
    /// The initial credential, in the clear. The endpoint is responsible
    /// for whatever hashing it applies at rest.
    pub password: String,
    pub display_name: Option<String>,
    /// Storage limit in bytes. 0 means unlimited.
    pub quota_bytes: u64,
}

/// A point-in-time view of one account, as reported by the endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub name: String,
    pub display_name: Option<String>,
    /// Storage limit in bytes. 0 means unlimited.
    pub quota_bytes: u64,
    pub enabled: bool,
    pub forward_to: Option<String>,
    /// Bytes currently consumed by stored mail.
    pub mail_size_bytes: u64,
}

/// A partial update to an existing account. `Some` fields are applied;
/// `None` fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccountChanges {
    pub password: Option<String>,
    pub quota_bytes: Option<u64>,
    pub enabled: Option<bool>,
    pub forward_to: Option<String>,
}

/// The mail account administration endpoint.
///
/// The shipped implementation is `store::DirStore`, which operates on the
/// mail server's on-disk layout directly; tests substitute scripted
/// recording stubs.
pub trait Endpoint {
    fn create_account(
        &mut self,
        account: &NewAccount,
    ) -> Result<StatusCode, Error>;

    fn delete_account(
        &mut self,
        domain: &str,
        name: &str,
    ) -> Result<StatusCode, Error>;

    /// Looks the account up. The snapshot is present exactly when the
    /// status is success.
    fn fetch_account(
        &mut self,
        domain: &str,
        name: &str,
    ) -> Result<(StatusCode, Option<AccountSnapshot>), Error>;

    /// Applies `changes` to the account. Used for quota, credential,
    /// status, and forwarding-address changes.
    fn update_account(
        &mut self,
        domain: &str,
        name: &str,
        changes: &AccountChanges,
    ) -> Result<StatusCode, Error>;

    /// Deletes every alias in `domain` that targets the account.
    fn remove_aliases(
        &mut self,
        domain: &str,
        name: &str,
    ) -> Result<StatusCode, Error>;

    /// Strips the account from every group in `domain`.
    fn remove_from_groups(
        &mut self,
        domain: &str,
        name: &str,
    ) -> Result<StatusCode, Error>;

    /// All mail domains the endpoint administers.
    fn list_domains(&mut self) -> Result<Vec<String>, Error>;

    /// Snapshots of every account in `domain`.
    fn list_accounts(
        &mut self,
        domain: &str,
    ) -> Result<Vec<AccountSnapshot>, Error>;

    /// Human-readable text for a failure status, if the endpoint has any.
    fn status_message(&self, status: StatusCode) -> Option<&'static str> {
        let _ = status;
        None
    }

    /// Renders a failure `status` with its message where one exists.
    fn describe_status(&self, status: StatusCode) -> String {
        match self.status_message(status) {
            Some(message) => format!("status {}: {}", status, message),
            None => format!("status {}", status),
        }
    }
}

/// Direct filesystem-level access to mailbox data, used only by the
/// offboarding workflow. Split from `Endpoint` because it bypasses the
/// administrative interface entirely.
pub trait MailboxStore {
    /// Packages the account's mailbox directory into a single compressed
    /// artefact under `dest`, returning the path of the artefact.
    fn archive_account(
        &mut self,
        domain: &str,
        name: &str,
        dest: &Path,
    ) -> Result<PathBuf, Error>;

    /// Writes the filesystem-level forwarding marker for the account.
    ///
    /// This duplicates the endpoint's forwarding field on purpose: the two
    /// mechanisms are independent and both are driven best-effort during
    /// offboarding.
    fn write_forward_marker(
        &mut self,
        domain: &str,
        name: &str,
        forward_to: &str,
    ) -> Result<(), Error>;
}
