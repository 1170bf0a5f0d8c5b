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

//! The offboarding workflow for departing users.
//!
//! Offboarding scans every domain the endpoint administers, and in each
//! domain where the account exists runs a fixed, ordered sequence of
//! steps: optional backup, disable, alias removal, optional forwarding,
//! group removal. The sequence is materialised as data
//! ([`OffboardStep`]); iterating it is what enforces the policy that
//! every step runs even when earlier ones failed. There is no rollback
//! and no terminal error state at the per-account level.
//!
//! Disabling the login comes before everything else that can fail, which
//! is the ordering the whole workflow exists for.

use std::path::PathBuf;

use log::{debug, info, warn};

use crate::admin::endpoint::{
    AccountChanges, Endpoint, MailboxStore, StatusCode,
};
use crate::admin::model::Outcome;
use crate::support::error::Error;

/// One step of the offboarding sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OffboardStep {
    Backup,
    Disable,
    RemoveAliases,
    SetForwarding,
    RemoveFromGroups,
}

impl OffboardStep {
    /// Short imperative phrase for logs and reports.
    pub fn describe(self) -> &'static str {
        match self {
            OffboardStep::Backup => "back up mailbox",
            OffboardStep::Disable => "disable account",
            OffboardStep::RemoveAliases => "remove aliases",
            OffboardStep::SetForwarding => "set forwarding",
            OffboardStep::RemoveFromGroups => "remove from groups",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct OffboardOptions {
    /// Address mail should be redirected to. The forwarding step is only
    /// scheduled when this is set.
    pub forward_to: Option<String>,
    /// Archive the mailbox before anything is changed.
    pub backup: bool,
    /// Where backup artefacts are placed.
    pub backup_dir: Option<PathBuf>,
    /// Probe and report, but never invoke a mutating call.
    pub dry_run: bool,
}

/// The outcome of one step.
#[derive(Clone, Debug, PartialEq)]
pub struct StepResult {
    pub step: OffboardStep,
    pub outcome: Outcome,
    pub detail: Option<String>,
}

/// Everything that happened to one domain's copy of the account.
#[derive(Clone, Debug)]
pub struct OffboardReport {
    pub domain: String,
    pub account: String,
    /// One entry per scheduled step, in execution order. Always complete:
    /// a failed step still has successors recorded after it.
    pub steps: Vec<StepResult>,
}

impl OffboardReport {
    pub fn failed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| Outcome::Failure == s.outcome)
            .count()
    }
}

/// Offboards `account` in every domain it exists in, returning one report
/// per matched domain.
///
/// `Err` is possible only when the domain list itself cannot be fetched;
/// everything after that point is folded into the reports.
pub fn offboard<T: Endpoint + MailboxStore>(
    target: &mut T,
    account: &str,
    options: &OffboardOptions,
) -> Result<Vec<OffboardReport>, Error> {
    let domains = target.list_domains()?;
    info!(
        "offboard {}: scanning {} domain(s)",
        account,
        domains.len()
    );

    let mut reports = Vec::new();
    for domain in &domains {
        match target.fetch_account(domain, account) {
            Ok((status, Some(_))) if status.is_ok() => {
                reports.push(offboard_in_domain(
                    target, domain, account, options,
                ));
            },
            Ok((status, _)) => {
                debug!(
                    "offboard {}: not present in {} ({})",
                    account,
                    domain,
                    target.describe_status(status)
                );
            },
            Err(e) => {
                // The remaining domains still get their turn.
                warn!(
                    "offboard {}: unable to check {}: {}",
                    account, domain, e
                );
            },
        }
    }

    Ok(reports)
}

/// The step order for one account. Built once per match; fixed thereafter.
fn step_list(options: &OffboardOptions) -> Vec<OffboardStep> {
    let mut steps = Vec::with_capacity(5);
    if options.backup {
        steps.push(OffboardStep::Backup);
    }
    steps.push(OffboardStep::Disable);
    steps.push(OffboardStep::RemoveAliases);
    if options.forward_to.is_some() {
        steps.push(OffboardStep::SetForwarding);
    }
    steps.push(OffboardStep::RemoveFromGroups);
    steps
}

fn offboard_in_domain<T: Endpoint + MailboxStore>(
    target: &mut T,
    domain: &str,
    account: &str,
    options: &OffboardOptions,
) -> OffboardReport {
    info!("offboard {}@{}: starting", account, domain);

    let steps = step_list(options);
    let mut report = OffboardReport {
        domain: domain.to_owned(),
        account: account.to_owned(),
        steps: Vec::with_capacity(steps.len()),
    };

    // Every step runs regardless of what the steps before it reported.
    for step in steps {
        report
            .steps
            .push(run_step(target, domain, account, step, options));
    }

    report
}

fn run_step<T: Endpoint + MailboxStore>(
    target: &mut T,
    domain: &str,
    account: &str,
    step: OffboardStep,
    options: &OffboardOptions,
) -> StepResult {
    if options.dry_run {
        info!(
            "offboard {}@{}: would {}",
            account,
            domain,
            step.describe()
        );
        return StepResult {
            step,
            outcome: Outcome::Success,
            detail: None,
        };
    }

    let (outcome, detail) = match step {
        OffboardStep::Backup => {
            backup_step(target, domain, account, options)
        },

        OffboardStep::Disable => {
            let result = target.update_account(
                domain,
                account,
                &AccountChanges {
                    enabled: Some(false),
                    ..AccountChanges::default()
                },
            );
            classify(target, result)
        },

        OffboardStep::RemoveAliases => {
            let result = target.remove_aliases(domain, account);
            classify(target, result)
        },

        OffboardStep::SetForwarding => match options.forward_to {
            Some(ref addr) => forward_step(target, domain, account, addr),
            // Not scheduled without an address.
            None => (Outcome::Success, None),
        },

        OffboardStep::RemoveFromGroups => {
            let result = target.remove_from_groups(domain, account);
            classify(target, result)
        },
    };

    match outcome {
        Outcome::Success => info!(
            "offboard {}@{}: {}: {}",
            account,
            domain,
            step.describe(),
            detail.as_deref().unwrap_or("ok")
        ),
        Outcome::Failure => warn!(
            "offboard {}@{}: {}: {}",
            account,
            domain,
            step.describe(),
            detail.as_deref().unwrap_or("failed")
        ),
    }

    StepResult {
        step,
        outcome,
        detail,
    }
}

fn backup_step<T: Endpoint + MailboxStore>(
    target: &mut T,
    domain: &str,
    account: &str,
    options: &OffboardOptions,
) -> (Outcome, Option<String>) {
    let dest = match options.backup_dir {
        Some(ref dir) => dir,
        None => {
            return (
                Outcome::Failure,
                Some(Error::NoBackupDir.to_string()),
            )
        },
    };

    match target.archive_account(domain, account, dest) {
        Ok(path) => (
            Outcome::Success,
            Some(format!("archived to {}", path.display())),
        ),
        Err(e) => (Outcome::Failure, Some(e.to_string())),
    }
}

/// The forwarding address lives in two independent places, the account's
/// endpoint field and a marker file in the mailbox tree. Neither is
/// authoritative; both are written best-effort, and a failure of either
/// fails the step without stopping the other.
fn forward_step<T: Endpoint + MailboxStore>(
    target: &mut T,
    domain: &str,
    account: &str,
    forward_to: &str,
) -> (Outcome, Option<String>) {
    let mut problems = Vec::new();

    let endpoint_result = target.update_account(
        domain,
        account,
        &AccountChanges {
            forward_to: Some(forward_to.to_owned()),
            ..AccountChanges::default()
        },
    );
    if let (Outcome::Failure, Some(detail)) =
        classify(target, endpoint_result)
    {
        problems.push(format!("endpoint: {}", detail));
    }

    if let Err(e) = target.write_forward_marker(domain, account, forward_to)
    {
        problems.push(format!("marker: {}", e));
    }

    if problems.is_empty() {
        (Outcome::Success, None)
    } else {
        (Outcome::Failure, Some(problems.join("; ")))
    }
}

fn classify(
    endpoint: &impl Endpoint,
    result: Result<StatusCode, Error>,
) -> (Outcome, Option<String>) {
    match result {
        Ok(status) if status.is_ok() => (Outcome::Success, None),
        Ok(status) => {
            (Outcome::Failure, Some(endpoint.describe_status(status)))
        },
        Err(e) => (Outcome::Failure, Some(e.to_string())),
    }
}
