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

//! The data model for batch runs: operation kinds, input records, and the
//! results they produce.

use std::fmt;
use std::str::FromStr;

use crate::admin::endpoint::{AccountChanges, NewAccount};
use crate::support::error::Error;

/// Canonical field names used in batch input.
pub mod fields {
    pub const DOMAIN: &str = "domain";
    pub const ACCOUNT: &str = "account";
    pub const PASSWORD: &str = "password";
    pub const NAME: &str = "name";
    pub const QUOTA: &str = "quota";
    pub const ENABLED: &str = "enabled";
}

/// The closed set of operations a batch run can apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    CreateAccount,
    DeleteAccount,
    SetQuota,
    ResetCredential,
    SetStatus,
}

impl OperationKind {
    /// Every kind, in a stable order, for help text.
    pub const ALL: &'static [Self] = &[
        OperationKind::CreateAccount,
        OperationKind::DeleteAccount,
        OperationKind::SetQuota,
        OperationKind::ResetCredential,
        OperationKind::SetStatus,
    ];

    pub fn name(self) -> &'static str {
        match self {
            OperationKind::CreateAccount => "create-account",
            OperationKind::DeleteAccount => "delete-account",
            OperationKind::SetQuota => "set-quota",
            OperationKind::ResetCredential => "reset-credential",
            OperationKind::SetStatus => "set-status",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        OperationKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| Error::UnknownOperation(s.to_owned()))
    }
}

/// One row of batch input: the 1-based row number (the header row is not
/// counted) plus the row's named fields.
///
/// Fields keep their input order but are looked up by name. A field whose
/// value is empty after trimming is indistinguishable from an absent one.
#[derive(Clone, Debug, Default)]
pub struct Record {
    pub row: u32,
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new(row: u32) -> Self {
        Record {
            row,
            fields: Vec::new(),
        }
    }

    /// Sets a field, replacing any earlier value under the same name.
    pub fn set(&mut self, name: &str, value: &str) {
        if let Some(field) =
            self.fields.iter_mut().find(|field| name == field.0)
        {
            field.1 = value.to_owned();
        } else {
            self.fields.push((name.to_owned(), value.to_owned()));
        }
    }

    /// Gets a field, trimmed. Absent and empty are both `None`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| name == field.0)
            .map(|field| field.1.trim())
            .filter(|value| !value.is_empty())
    }

    /// `account@domain`, when both parts are present, for logs and result
    /// listings.
    pub fn subject(&self) -> Option<String> {
        match (self.get(fields::ACCOUNT), self.get(fields::DOMAIN)) {
            (Some(account), Some(domain)) => {
                Some(format!("{}@{}", account, domain))
            },
            _ => None,
        }
    }
}

/// Why a record failed validation. Rendered into the result detail; the
/// endpoint is never contacted for a record that produces one of these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldError {
    Missing(&'static str),
    Invalid(&'static str, String),
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::Missing(name) => {
                write!(f, "missing field `{}`", name)
            },
            FieldError::Invalid(name, reason) => {
                write!(f, "invalid field `{}`: {}", name, reason)
            },
        }
    }
}

/// A fully validated endpoint request, one shape per call the endpoint
/// exposes. `SetQuota`, `ResetCredential`, and `SetStatus` all become
/// `Update` requests with different change sets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    Create(NewAccount),
    Delete {
        domain: String,
        account: String,
    },
    Update {
        domain: String,
        account: String,
        changes: AccountChanges,
    },
}

impl Request {
    /// Validates `record` against the requirements of `kind`.
    ///
    /// `Err` carries the per-record failure detail; it never aborts a run.
    pub fn build(
        kind: OperationKind,
        record: &Record,
    ) -> Result<Self, FieldError> {
        let domain = require(record, fields::DOMAIN)?.to_owned();
        let account = require(record, fields::ACCOUNT)?.to_owned();

        match kind {
            OperationKind::CreateAccount => {
                let password = require(record, fields::PASSWORD)?.to_owned();
                // An absent quota means unlimited.
                let quota_bytes = match record.get(fields::QUOTA) {
                    Some(raw) => parse_quota(raw)?,
                    None => 0,
                };

                Ok(Request::Create(NewAccount {
                    domain,
                    name: account,
                    password,
                    display_name: record
                        .get(fields::NAME)
                        .map(str::to_owned),
                    quota_bytes,
                }))
            },

            OperationKind::DeleteAccount => {
                Ok(Request::Delete { domain, account })
            },

            OperationKind::SetQuota => {
                let quota_bytes =
                    parse_quota(require(record, fields::QUOTA)?)?;
                Ok(Request::Update {
                    domain,
                    account,
                    changes: AccountChanges {
                        quota_bytes: Some(quota_bytes),
                        ..AccountChanges::default()
                    },
                })
            },

            OperationKind::ResetCredential => {
                let password = require(record, fields::PASSWORD)?.to_owned();
                Ok(Request::Update {
                    domain,
                    account,
                    changes: AccountChanges {
                        password: Some(password),
                        ..AccountChanges::default()
                    },
                })
            },

            OperationKind::SetStatus => {
                let raw = require(record, fields::ENABLED)?;
                let enabled = parse_enabled(raw).ok_or_else(|| {
                    FieldError::Invalid(
                        fields::ENABLED,
                        format!(
                            "`{}` is not one of yes/no/true/false/1/0",
                            raw
                        ),
                    )
                })?;
                Ok(Request::Update {
                    domain,
                    account,
                    changes: AccountChanges {
                        enabled: Some(enabled),
                        ..AccountChanges::default()
                    },
                })
            },
        }
    }
}

fn require<'a>(
    record: &'a Record,
    name: &'static str,
) -> Result<&'a str, FieldError> {
    record.get(name).ok_or(FieldError::Missing(name))
}

fn parse_quota(raw: &str) -> Result<u64, FieldError> {
    raw.parse::<u64>()
        .map_err(|e| FieldError::Invalid(fields::QUOTA, e.to_string()))
}

fn parse_enabled(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => Some(true),
        "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// How one record fared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Outcome::Success => write!(f, "success"),
            Outcome::Failure => write!(f, "failure"),
        }
    }
}

/// The result of applying the operation to one record.
#[derive(Clone, Debug, PartialEq)]
pub struct OperationResult {
    /// Row number of the record this result is for.
    pub row: u32,
    /// `account@domain` when derivable from the record.
    pub subject: Option<String>,
    pub outcome: Outcome,
    /// The failure detail; `None` on success.
    pub detail: Option<String>,
}

/// What a completed run produced: one result per input record, in input
/// order.
///
/// The tallies are derived from `results`, so `succeeded() + failed()`
/// always equals `total()`.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub kind: OperationKind,
    pub results: Vec<OperationResult>,
}

impl RunSummary {
    pub fn new(kind: OperationKind) -> Self {
        RunSummary {
            kind,
            results: Vec::new(),
        }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results
            .iter()
            .filter(|r| Outcome::Success == r.outcome)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| Outcome::Failure == r.outcome)
            .count()
    }

    /// Percentage of records that succeeded. An empty run is 100%: nothing
    /// failed.
    pub fn success_rate(&self) -> f64 {
        if self.results.is_empty() {
            100.0
        } else {
            100.0 * self.succeeded() as f64 / self.results.len() as f64
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> Record {
        let mut record = Record::new(1);
        for (name, value) in pairs {
            record.set(name, value);
        }
        record
    }

    #[test]
    fn operation_kind_names_round_trip() {
        for &kind in OperationKind::ALL {
            assert_eq!(kind, kind.name().parse().unwrap());
            assert_eq!(kind.name(), kind.to_string());
        }

        assert!("frobnicate".parse::<OperationKind>().is_err());
        // Names are exact; no case folding.
        assert!("Create-Account".parse::<OperationKind>().is_err());
    }

    #[test]
    fn record_fields_trim_and_treat_empty_as_absent() {
        let record = record(&[
            ("domain", " example.com "),
            ("account", "bob"),
            ("name", "   "),
        ]);

        assert_eq!(Some("example.com"), record.get("domain"));
        assert_eq!(None, record.get("name"));
        assert_eq!(None, record.get("quota"));
        assert_eq!(Some("bob@example.com".to_owned()), record.subject());
    }

    #[test]
    fn record_set_replaces_existing_field() {
        let mut record = record(&[("account", "bob")]);
        record.set("account", "alice");
        assert_eq!(Some("alice"), record.get("account"));
    }

    #[test]
    fn subject_requires_both_parts() {
        assert_eq!(None, record(&[("account", "bob")]).subject());
        assert_eq!(None, record(&[("domain", "example.com")]).subject());
    }

    #[test]
    fn build_create_account() {
        let request = Request::build(
            OperationKind::CreateAccount,
            &record(&[
                ("domain", "example.com"),
                ("account", "bob"),
                ("password", "hunter2"),
                ("name", "Bob Kelso"),
                ("quota", "1048576"),
            ]),
        )
        .unwrap();

        assert_eq!(
            Request::Create(NewAccount {
                domain: "example.com".to_owned(),
                name: "bob".to_owned(),
                password: "hunter2".to_owned(),
                display_name: Some("Bob Kelso".to_owned()),
                quota_bytes: 1048576,
            }),
            request
        );
    }

    #[test]
    fn build_create_account_defaults_to_unlimited_quota() {
        let request = Request::build(
            OperationKind::CreateAccount,
            &record(&[
                ("domain", "example.com"),
                ("account", "bob"),
                ("password", "hunter2"),
            ]),
        )
        .unwrap();

        match request {
            Request::Create(account) => {
                assert_eq!(0, account.quota_bytes);
                assert_eq!(None, account.display_name);
            },
            r => panic!("unexpected request: {:?}", r),
        }
    }

    #[test]
    fn build_reports_first_missing_field() {
        assert_eq!(
            Err(FieldError::Missing("domain")),
            Request::build(OperationKind::DeleteAccount, &record(&[])),
        );
        assert_eq!(
            Err(FieldError::Missing("account")),
            Request::build(
                OperationKind::DeleteAccount,
                &record(&[("domain", "example.com")]),
            ),
        );
        assert_eq!(
            Err(FieldError::Missing("password")),
            Request::build(
                OperationKind::CreateAccount,
                &record(&[
                    ("domain", "example.com"),
                    ("account", "bob"),
                    ("password", ""),
                ]),
            ),
        );
    }

    #[test]
    fn missing_field_detail_text() {
        assert_eq!(
            "missing field `quota`",
            FieldError::Missing("quota").to_string()
        );
    }

    #[test]
    fn build_rejects_unparseable_quota() {
        let err = Request::build(
            OperationKind::SetQuota,
            &record(&[
                ("domain", "example.com"),
                ("account", "bob"),
                ("quota", "12MB"),
            ]),
        )
        .unwrap_err();

        match &err {
            FieldError::Invalid("quota", _) => (),
            e => panic!("unexpected error: {:?}", e),
        }
        assert!(err.to_string().starts_with("invalid field `quota`: "));
    }

    #[test]
    fn build_set_quota() {
        assert_eq!(
            Ok(Request::Update {
                domain: "example.com".to_owned(),
                account: "bob".to_owned(),
                changes: AccountChanges {
                    quota_bytes: Some(0),
                    ..AccountChanges::default()
                },
            }),
            Request::build(
                OperationKind::SetQuota,
                &record(&[
                    ("domain", "example.com"),
                    ("account", "bob"),
                    ("quota", "0"),
                ]),
            ),
        );
    }

    #[test]
    fn build_reset_credential() {
        assert_eq!(
            Ok(Request::Update {
                domain: "example.com".to_owned(),
                account: "bob".to_owned(),
                changes: AccountChanges {
                    password: Some("s3cret".to_owned()),
                    ..AccountChanges::default()
                },
            }),
            Request::build(
                OperationKind::ResetCredential,
                &record(&[
                    ("domain", "example.com"),
                    ("account", "bob"),
                    ("password", "s3cret"),
                ]),
            ),
        );
    }

    #[test]
    fn build_set_status_accepts_the_usual_tokens() {
        for (raw, expected) in &[
            ("yes", true),
            ("Yes", true),
            ("TRUE", true),
            ("1", true),
            ("no", false),
            ("false", false),
            ("0", false),
        ] {
            let request = Request::build(
                OperationKind::SetStatus,
                &record(&[
                    ("domain", "example.com"),
                    ("account", "bob"),
                    ("enabled", *raw),
                ]),
            )
            .unwrap();

            match request {
                Request::Update { changes, .. } => {
                    assert_eq!(Some(*expected), changes.enabled, "{}", raw)
                },
                r => panic!("unexpected request: {:?}", r),
            }
        }
    }

    #[test]
    fn build_rejects_unknown_status_token() {
        let err = Request::build(
            OperationKind::SetStatus,
            &record(&[
                ("domain", "example.com"),
                ("account", "bob"),
                ("enabled", "maybe"),
            ]),
        )
        .unwrap_err();

        assert_eq!(
            "invalid field `enabled`: \
             `maybe` is not one of yes/no/true/false/1/0",
            err.to_string()
        );
    }

    #[test]
    fn summary_tallies_partition_the_results() {
        let mut summary = RunSummary::new(OperationKind::DeleteAccount);
        for (row, outcome) in [
            Outcome::Success,
            Outcome::Failure,
            Outcome::Success,
            Outcome::Failure,
            Outcome::Failure,
        ]
        .iter()
        .enumerate()
        {
            summary.results.push(OperationResult {
                row: row as u32 + 1,
                subject: None,
                outcome: *outcome,
                detail: None,
            });
        }

        assert_eq!(5, summary.total());
        assert_eq!(2, summary.succeeded());
        assert_eq!(3, summary.failed());
        assert_eq!(summary.total(), summary.succeeded() + summary.failed());
        assert_eq!(40.0, summary.success_rate());
    }

    #[test]
    fn empty_summary_has_full_success_rate() {
        let summary = RunSummary::new(OperationKind::SetQuota);
        assert_eq!(0, summary.total());
        assert_eq!(100.0, summary.success_rate());
    }
}
