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

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The system-wide configuration for Postadm.
///
/// This is stored in a file named `postadm.toml` under the Postadm root,
/// which is typically `/usr/local/etc/postadm` or `/etc/postadm`.
#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct SystemConfig {
    /// Where the mail store lives.
    pub store: StoreConfig,

    /// Defaults for batch runs.
    #[serde(default)]
    pub batch: BatchConfig,

    /// Event log configuration.
    ///
    /// A `logging.toml` next to `postadm.toml` overrides this entirely; see
    /// the log4rs file format documentation.
    #[serde(default)]
    pub log: LogConfig,

    /// Where offboarding backups are placed.
    #[serde(default)]
    pub backup: BackupConfig,
}

// The Default implementation of StoreConfig is not useful in the real
// world, but is helpful for tests.
#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct StoreConfig {
    /// The root of the mailbox tree, containing one directory per mail
    /// domain.
    pub root: PathBuf,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Fixed delay, in milliseconds, slept between consecutive records in a
    /// batch run. This only bounds the request rate against the store; it
    /// has no correctness role.
    pub delay_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig { delay_ms: 0 }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct LogConfig {
    /// If set, every event is appended to this file as a timestamped,
    /// levelled line, in addition to whatever the console shows.
    pub file: Option<PathBuf>,

    /// Minimum level written to the log file: "error", "warn", "info",
    /// "debug" or "trace".
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            file: None,
            level: "info".to_owned(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BackupConfig {
    /// Directory receiving offboarding backup artefacts. May be overridden
    /// with `--backup-dir`.
    pub dir: Option<PathBuf>,
}
