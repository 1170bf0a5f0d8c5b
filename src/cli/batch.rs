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

//! The `batch` subcommand: CSV in, record processor, tally out.
//!
//! Once the input file has been read successfully, the process exits 0
//! regardless of how many records failed; failures are data, reported in
//! the tally and the optional results file. Only setup faults (unreadable
//! input, malformed CSV) abort.

use std::fs;
use std::path::Path;
use std::time::Duration;

use super::main::BatchSubcommand;
use crate::admin::model::{Record, RunSummary};
use crate::admin::processor::{self, RunOptions};
use crate::store::DirStore;
use crate::support::sysexits::*;
use crate::support::system_config::SystemConfig;

pub(super) fn run(
    cmd: BatchSubcommand,
    system_config: &SystemConfig,
    store: &mut DirStore,
) {
    let records = read_records(&cmd.input);

    let options = RunOptions {
        dry_run: cmd.dry_run,
        delay: Duration::from_millis(
            cmd.delay_ms.unwrap_or(system_config.batch.delay_ms),
        ),
    };

    let summary = processor::run(cmd.kind, &records, store, &options);

    if let Some(ref path) = cmd.results {
        if let Err(e) = write_results(path, &summary) {
            die!(
                EX_CANTCREAT,
                "Unable to write results to '{}': {}",
                path.display(),
                e
            );
        }
    }

    println!(
        "{}{}: {} record(s), {} succeeded, {} failed ({:.1}% success)",
        summary.kind,
        if cmd.dry_run { " (dry run)" } else { "" },
        summary.total(),
        summary.succeeded(),
        summary.failed(),
        summary.success_rate()
    );
}

/// Reads the whole input up front, so a structurally bad file aborts the
/// run before any record has been applied.
fn read_records(path: &Path) -> Vec<Record> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) => {
            die!(EX_NOINPUT, "Unable to read '{}': {}", path.display(), e)
        },
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => {
            die!(
                EX_DATAERR,
                "Malformed CSV in '{}': {}",
                path.display(),
                e
            )
        },
    };

    let mut records = Vec::new();
    for (ix, row) in reader.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                die!(
                    EX_DATAERR,
                    "Malformed CSV in '{}': {}",
                    path.display(),
                    e
                )
            },
        };

        // Short rows leave trailing fields absent; extra values beyond
        // the headers have no name and are dropped.
        let mut record = Record::new(ix as u32 + 1);
        for (name, value) in headers.iter().zip(row.iter()) {
            record.set(name, value);
        }
        records.push(record);
    }

    records
}

fn write_results(path: &Path, summary: &RunSummary) -> csv::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&["row", "domain", "account", "outcome", "detail"])?;

    for result in &summary.results {
        let (account, domain) = match result.subject {
            Some(ref subject) => {
                let mut parts = subject.splitn(2, '@');
                (parts.next().unwrap_or(""), parts.next().unwrap_or(""))
            },
            None => ("", ""),
        };

        let row = result.row.to_string();
        let outcome = result.outcome.to_string();
        writer.write_record(&[
            row.as_str(),
            domain,
            account,
            outcome.as_str(),
            result.detail.as_deref().unwrap_or(""),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
