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

use std::fs;
use std::io::Read;
use std::mem;
use std::path::{Path, PathBuf};

use structopt::StructOpt;

use crate::store::DirStore;
use crate::support::sysexits::*;
use crate::support::system_config::SystemConfig;

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
enum Command {
    /// Manage a single account.
    Account(AccountSubcommand),
    /// List the accounts of one domain or of every domain.
    List(ListSubcommand),
    /// Apply one operation to every record of a CSV file.
    Batch(BatchSubcommand),
    /// Run the offboarding workflow for a departing user.
    ///
    /// The account is looked up in every domain; wherever it exists, its
    /// mailbox is optionally archived, the account is disabled, its aliases
    /// are removed, its mail is optionally forwarded, and it is removed
    /// from every group. Steps that fail are reported but never stop the
    /// remaining steps or domains.
    Offboard(OffboardSubcommand),
}

impl Command {
    fn common_options(&mut self) -> CommonOptions {
        match *self {
            Command::Account(ref mut cmd) => cmd.common_options(),
            Command::List(ref mut c) => mem::take(&mut c.common),
            Command::Batch(ref mut c) => mem::take(&mut c.common),
            Command::Offboard(ref mut c) => mem::take(&mut c.common),
        }
    }
}

#[derive(StructOpt, Default)]
pub(super) struct CommonOptions {
    /// The directory containing `postadm.toml` etc
    /// [default: /etc/postadm or /usr/local/etc/postadm]
    #[structopt(long, parse(from_os_str))]
    root: Option<PathBuf>,
}

#[derive(StructOpt)]
pub(super) enum AccountSubcommand {
    /// Create a new account.
    ///
    /// Unless --prompt-password is given, an initial password is generated
    /// and printed to standard output.
    Add(AccountAddSubcommand),
    /// Delete an account and all mail stored in it.
    Rm(AccountRmSubcommand),
    /// Change an account's storage quota.
    Quota(AccountQuotaSubcommand),
    /// Reset an account's password.
    Passwd(AccountPasswdSubcommand),
    /// Enable or disable an account.
    Status(AccountStatusSubcommand),
}

impl AccountSubcommand {
    fn common_options(&mut self) -> CommonOptions {
        match *self {
            AccountSubcommand::Add(ref mut c) => mem::take(&mut c.common),
            AccountSubcommand::Rm(ref mut c) => mem::take(&mut c.common),
            AccountSubcommand::Quota(ref mut c) => mem::take(&mut c.common),
            AccountSubcommand::Passwd(ref mut c) => {
                mem::take(&mut c.common)
            },
            AccountSubcommand::Status(ref mut c) => {
                mem::take(&mut c.common)
            },
        }
    }
}

#[derive(StructOpt)]
pub(super) struct AccountAddSubcommand {
    #[structopt(flatten)]
    pub(super) common: CommonOptions,

    /// The mail domain the account belongs to.
    #[structopt(short, long)]
    pub(super) domain: String,

    /// Prompt for the password instead of generating one.
    #[structopt(long)]
    pub(super) prompt_password: bool,

    /// Display name for the account.
    #[structopt(short, long)]
    pub(super) name: Option<String>,

    /// Storage quota in bytes. 0 means unlimited.
    #[structopt(short, long, default_value = "0")]
    pub(super) quota: u64,

    /// Name of the account to create.
    pub(super) account: String,
}

#[derive(StructOpt)]
pub(super) struct AccountRmSubcommand {
    #[structopt(flatten)]
    pub(super) common: CommonOptions,

    /// The mail domain the account belongs to.
    #[structopt(short, long)]
    pub(super) domain: String,

    /// Name of the account to delete.
    pub(super) account: String,
}

#[derive(StructOpt)]
pub(super) struct AccountQuotaSubcommand {
    #[structopt(flatten)]
    pub(super) common: CommonOptions,

    /// The mail domain the account belongs to.
    #[structopt(short, long)]
    pub(super) domain: String,

    /// Name of the account to change.
    pub(super) account: String,

    /// The new quota in bytes. 0 means unlimited.
    pub(super) quota: u64,
}

#[derive(StructOpt)]
pub(super) struct AccountPasswdSubcommand {
    #[structopt(flatten)]
    pub(super) common: CommonOptions,

    /// The mail domain the account belongs to.
    #[structopt(short, long)]
    pub(super) domain: String,

    /// Prompt for the password instead of generating one.
    #[structopt(long)]
    pub(super) prompt_password: bool,

    /// Name of the account to change.
    pub(super) account: String,
}

#[derive(StructOpt)]
pub(super) struct AccountStatusSubcommand {
    #[structopt(flatten)]
    pub(super) common: CommonOptions,

    /// The mail domain the account belongs to.
    #[structopt(short, long)]
    pub(super) domain: String,

    /// Name of the account to change.
    pub(super) account: String,

    /// The new status, either `enabled` or `disabled`.
    pub(super) state: String,
}

#[derive(StructOpt)]
pub(super) struct ListSubcommand {
    #[structopt(flatten)]
    pub(super) common: CommonOptions,

    /// List only this domain.
    #[structopt(short, long)]
    pub(super) domain: Option<String>,
}

#[derive(StructOpt)]
pub(super) struct BatchSubcommand {
    #[structopt(flatten)]
    pub(super) common: CommonOptions,

    /// The operation to apply: create-account, delete-account, set-quota,
    /// reset-credential, or set-status.
    pub(super) kind: crate::admin::model::OperationKind,

    /// The CSV file to read records from. The header row names the
    /// columns; each following row is one record.
    #[structopt(short, long, parse(from_os_str))]
    pub(super) input: PathBuf,

    /// Validate every record and log what would happen, but never touch
    /// the store.
    #[structopt(long)]
    pub(super) dry_run: bool,

    /// Milliseconds slept between consecutive records, overriding the
    /// configured default.
    #[structopt(long)]
    pub(super) delay_ms: Option<u64>,

    /// Write a per-record results CSV to this file.
    #[structopt(long, parse(from_os_str))]
    pub(super) results: Option<PathBuf>,
}

#[derive(StructOpt)]
pub(super) struct OffboardSubcommand {
    #[structopt(flatten)]
    pub(super) common: CommonOptions,

    /// Redirect the account's mail to this address.
    #[structopt(short, long)]
    pub(super) forward: Option<String>,

    /// Archive each matched mailbox before anything is changed.
    #[structopt(short, long)]
    pub(super) backup: bool,

    /// Where to place backup archives, overriding the configured
    /// directory.
    #[structopt(long, parse(from_os_str))]
    pub(super) backup_dir: Option<PathBuf>,

    /// Report what would be done without changing anything.
    #[structopt(long)]
    pub(super) dry_run: bool,

    /// Name of the departing account.
    pub(super) account: String,
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let mut cmd = Command::from_clap(&match Command::clap().get_matches_safe()
    {
        Ok(matches) => matches,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        },
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        },
    });

    let common = cmd.common_options();
    let root = common.root.unwrap_or_else(|| {
        if Path::new("/etc/postadm/postadm.toml").is_file() {
            "/etc/postadm".to_owned().into()
        } else if Path::new("/usr/local/etc/postadm/postadm.toml").is_file() {
            "/usr/local/etc/postadm".to_owned().into()
        } else {
            eprintln!(
                "Neither /etc/postadm nor /usr/local/etc/postadm looks like\n\
                 the Postadm root; use --root=/path/to/postadm if your\n\
                 installation is elsewhere."
            );
            EX_CONFIG.exit()
        }
    });

    let system_config_path = root.join("postadm.toml");
    let mut system_config_toml = Vec::new();
    if let Err(e) = fs::File::open(&system_config_path)
        .and_then(|mut f| f.read_to_end(&mut system_config_toml))
    {
        eprintln!("Error reading '{}': {}", system_config_path.display(), e);
        EX_CONFIG.exit();
    }

    let system_config: SystemConfig =
        match toml::from_slice(&system_config_toml) {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Error in config file at '{}': {}",
                    system_config_path.display(),
                    e
                );
                EX_CONFIG.exit()
            },
        };

    init_logging(&root, &system_config);

    let mut store = DirStore::new(system_config.store.root.clone());

    match cmd {
        Command::Account(cmd) => super::account::run(cmd, &mut store),
        Command::List(cmd) => super::list::run(cmd, &mut store),
        Command::Batch(cmd) => {
            super::batch::run(cmd, &system_config, &mut store)
        },
        Command::Offboard(cmd) => {
            super::offboard::run(cmd, &system_config, &mut store)
        },
    }
}

fn init_logging(root: &Path, system_config: &SystemConfig) {
    // A logging.toml next to postadm.toml takes over entirely.
    let log_config_file = root.join("logging.toml");
    if log_config_file.is_file() {
        log4rs::init_file(
            log_config_file,
            log4rs::file::Deserializers::new(),
        )
        .expect("Failed to initialise logging");
        return;
    }

    let level = match system_config.log.level.parse::<log::LevelFilter>() {
        Ok(level) => level,
        Err(_) => {
            eprintln!("Invalid [log] level '{}'", system_config.log.level);
            EX_CONFIG.exit()
        },
    };

    let interactive = Ok(true) == nix::unistd::isatty(2);
    if !interactive && system_config.log.file.is_none() {
        // Non-interactive with no log file configured; use syslog like the
        // rest of the mail system.
        let formatter = syslog::Formatter3164 {
            facility: syslog::Facility::LOG_MAIL,
            hostname: None,
            process: env!("CARGO_PKG_NAME").to_owned(),
            pid: nix::unistd::getpid().as_raw(),
        };

        let logger =
            syslog::unix(formatter).expect("Failed to connect to syslog");
        log::set_boxed_logger(Box::new(syslog::BasicLogger::new(logger)))
            .map(|_| log::set_max_level(level))
            .expect("Failed to initialise logging");
        return;
    }

    let mut config = log4rs::config::Config::builder();
    let mut log_root = log4rs::config::Root::builder();

    if interactive {
        let console = log4rs::append::console::ConsoleAppender::builder()
            .target(log4rs::append::console::Target::Stderr)
            .encoder(Box::new(log4rs::encode::pattern::PatternEncoder::new(
                "{h({l:>5})} {m}{n}",
            )))
            .build();
        config = config.appender(
            log4rs::config::Appender::builder()
                .build("console", Box::new(console)),
        );
        log_root = log_root.appender("console");
    }

    if let Some(ref file) = system_config.log.file {
        let appender = log4rs::append::file::FileAppender::builder()
            .append(true)
            .encoder(Box::new(log4rs::encode::pattern::PatternEncoder::new(
                "{d(%Y-%m-%d %H:%M:%S)} {l:>5} {m}{n}",
            )))
            .build(file);
        let appender = match appender {
            Ok(appender) => appender,
            Err(e) => {
                eprintln!(
                    "Unable to open log file '{}': {}",
                    file.display(),
                    e
                );
                EX_CONFIG.exit()
            },
        };

        config = config.appender(
            log4rs::config::Appender::builder()
                .build("file", Box::new(appender)),
        );
        log_root = log_root.appender("file");
    }

    let config = config
        .build(log_root.build(level))
        .expect("Failed to initialise logging");
    log4rs::init_config(config).expect("Failed to initialise logging");
}
