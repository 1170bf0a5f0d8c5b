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

use super::main::OffboardSubcommand;
use crate::admin::offboard::{offboard, OffboardOptions};
use crate::store::DirStore;
use crate::support::sysexits::*;
use crate::support::system_config::SystemConfig;

pub(super) fn run(
    cmd: OffboardSubcommand,
    system_config: &SystemConfig,
    store: &mut DirStore,
) {
    let backup_dir = cmd
        .backup_dir
        .or_else(|| system_config.backup.dir.clone());
    if cmd.backup && backup_dir.is_none() {
        die!(
            EX_CONFIG,
            "--backup requires --backup-dir or a configured [backup] dir"
        );
    }

    let options = OffboardOptions {
        forward_to: cmd.forward,
        backup: cmd.backup,
        backup_dir,
        dry_run: cmd.dry_run,
    };

    let reports = match offboard(store, &cmd.account, &options) {
        Ok(reports) => reports,
        Err(e) => die!(EX_UNAVAILABLE, "Unable to scan domains: {}", e),
    };

    if reports.is_empty() {
        println!("'{}' does not exist in any domain", cmd.account);
    }

    let mut failed_steps = 0;
    for report in &reports {
        println!("{}@{}:", report.account, report.domain);
        for step in &report.steps {
            match step.detail {
                Some(ref detail) => println!(
                    "  {}: {}: {}",
                    step.step.describe(),
                    step.outcome,
                    detail
                ),
                None => {
                    println!("  {}: {}", step.step.describe(), step.outcome)
                },
            }
        }
        failed_steps += report.failed_steps();
    }

    println!(
        "{} domain(s) matched, {} step(s) failed{}",
        reports.len(),
        failed_steps,
        if cmd.dry_run { " (dry run)" } else { "" }
    );
}
