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

//! The batch record processor.
//!
//! A run applies one operation kind to an ordered sequence of records,
//! strictly sequentially and with no retries. Every record produces exactly
//! one result, in input order. A failure on one record never blocks the
//! records after it; typical inputs are tens to hundreds of independent
//! accounts, and one bad row must not abort the batch.

use std::thread;
use std::time::Duration;

use log::{error, info, warn};

use crate::admin::endpoint::{Endpoint, StatusCode};
use crate::admin::model::{
    OperationKind, OperationResult, Outcome, Record, Request, RunSummary,
};
use crate::support::error::Error;

#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Validate and log, but never invoke a mutating endpoint call.
    /// Records that pass validation count as successes.
    pub dry_run: bool,
    /// Slept between consecutive records to bound the request rate
    /// against the endpoint. No correctness role.
    pub delay: Duration,
}

/// Applies `kind` to every record, in order, against `endpoint`.
///
/// Per-record failures of any sort are folded into the summary; this
/// function itself cannot fail once invoked.
pub fn run(
    kind: OperationKind,
    records: &[Record],
    endpoint: &mut impl Endpoint,
    options: &RunOptions,
) -> RunSummary {
    let mut summary = RunSummary::new(kind);
    summary.results.reserve(records.len());

    for (ix, record) in records.iter().enumerate() {
        if 0 != ix {
            thread::sleep(options.delay);
        }

        summary
            .results
            .push(process_record(kind, record, endpoint, options));
    }

    summary
}

fn process_record(
    kind: OperationKind,
    record: &Record,
    endpoint: &mut impl Endpoint,
    options: &RunOptions,
) -> OperationResult {
    let subject = record.subject();

    let request = match Request::build(kind, record) {
        Ok(request) => request,
        Err(e) => {
            warn!("row {}: {}", record.row, e);
            return OperationResult {
                row: record.row,
                subject,
                outcome: Outcome::Failure,
                detail: Some(e.to_string()),
            };
        },
    };

    // Validation guarantees domain and account are present.
    let who = subject.as_deref().unwrap_or("?").to_owned();

    if options.dry_run {
        info!("row {}: would apply {} to {}", record.row, kind, who);
        return OperationResult {
            row: record.row,
            subject,
            outcome: Outcome::Success,
            detail: None,
        };
    }

    let (outcome, detail) = match dispatch(&request, endpoint) {
        Ok(status) if status.is_ok() => {
            info!("row {}: {} {}: ok", record.row, kind, who);
            (Outcome::Success, None)
        },
        Ok(status) => {
            let detail = endpoint.describe_status(status);
            warn!("row {}: {} {}: {}", record.row, kind, who, detail);
            (Outcome::Failure, Some(detail))
        },
        Err(e) => {
            error!("row {}: {} {}: {}", record.row, kind, who, e);
            (Outcome::Failure, Some(e.to_string()))
        },
    };

    OperationResult {
        row: record.row,
        subject,
        outcome,
        detail,
    }
}

fn dispatch(
    request: &Request,
    endpoint: &mut impl Endpoint,
) -> Result<StatusCode, Error> {
    match request {
        Request::Create(account) => endpoint.create_account(account),
        Request::Delete { domain, account } => {
            endpoint.delete_account(domain, account)
        },
        Request::Update {
            domain,
            account,
            changes,
        } => endpoint.update_account(domain, account, changes),
    }
}
