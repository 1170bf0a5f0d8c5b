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

//! Packaging of account directories into single-file backup artefacts.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::prelude::*;
use log::info;

use crate::support::error::Error;

/// Packages `account_dir` into `<dest>/<domain>-<name>-<timestamp>.tar.zst`,
/// creating `dest` if needed, and returns the artefact path.
///
/// Entries inside the archive are rooted at `<domain>/<name>/`. The
/// artefact is staged as a temporary file in `dest` and only renamed into
/// place once fully written, so a crash cannot leave a plausible-looking
/// truncated archive behind.
pub fn archive_directory(
    account_dir: &Path,
    domain: &str,
    name: &str,
    dest: &Path,
) -> Result<PathBuf, Error> {
    fs::create_dir_all(dest)?;

    let timestamp = Utc::now().format("%Y%m%dT%H%M%SZ");
    let artefact =
        dest.join(format!("{}-{}-{}.tar.zst", domain, name, timestamp));

    let mut tf = tempfile::NamedTempFile::new_in(dest)?;
    {
        let encoder = zstd::Encoder::new(tf.as_file_mut(), 5)?;
        let mut builder = tar::Builder::new(encoder);
        builder
            .append_dir_all(format!("{}/{}", domain, name), account_dir)?;
        builder.into_inner()?.finish()?;
    }
    tf.as_file_mut().sync_all()?;
    tf.persist_noclobber(&artefact).map_err(|e| e.error)?;

    info!(
        "{}@{}: archived mailbox to {}",
        name,
        domain,
        artefact.display()
    );
    Ok(artefact)
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;

    #[test]
    fn archive_contains_the_whole_account_tree() {
        let root = tempfile::TempDir::new().unwrap();
        let account_dir = root.path().join("bob");
        fs::create_dir_all(account_dir.join("mail/cur")).unwrap();
        fs::write(account_dir.join("account.toml"), b"enabled = true\n")
            .unwrap();
        fs::File::create(account_dir.join("mail/cur/msg1"))
            .unwrap()
            .write_all(b"Subject: hi\n\nhello\n")
            .unwrap();

        let dest = tempfile::TempDir::new().unwrap();
        let artefact = archive_directory(
            &account_dir,
            "example.com",
            "bob",
            dest.path(),
        )
        .unwrap();

        let file_name = artefact.file_name().unwrap().to_str().unwrap();
        assert!(file_name.starts_with("example.com-bob-"));
        assert!(file_name.ends_with(".tar.zst"));

        let mut archive = tar::Archive::new(
            zstd::Decoder::new(fs::File::open(&artefact).unwrap()).unwrap(),
        );
        let mut paths = archive
            .entries()
            .unwrap()
            .map(|entry| {
                entry
                    .unwrap()
                    .path()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect::<Vec<_>>();
        paths.sort();

        assert!(
            paths.contains(&"example.com/bob/account.toml".to_owned()),
            "{:?}",
            paths
        );
        assert!(
            paths.contains(&"example.com/bob/mail/cur/msg1".to_owned()),
            "{:?}",
            paths
        );
    }
}
