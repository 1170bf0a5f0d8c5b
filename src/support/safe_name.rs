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

use lazy_static::lazy_static;
use regex::Regex;

/// Determine whether the given account name is "safe".
///
/// Account names become file system elements under the domain directory, so
/// this excludes empty names and patterns that cause directory traversal or
/// other unwanted behaviours. `@` is also excluded since account names are
/// the unqualified local part; a qualified address here would usually mean
/// the operator swapped two columns in a batch file.
///
/// This does not care about whether the name is ultimately a valid file
/// name; for that, we simply rely on the OS rejecting it.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty() &&
        // Block directory traversal through .. and creation of hidden files
        // on UNIX
        name.chars().next() != Some('.') &&
        name.find('/').is_none() &&
        // Only a path separator on Windows, but always block since it has
        // high potential of causing problems
        name.find('\\').is_none() &&
        name.find('@').is_none() &&
        // Don't allow any ASCII control characters
        name.find(|c| c < ' ' || c == '\x7F').is_none()
}

lazy_static! {
    static ref DOMAIN_PATTERN: Regex = Regex::new(
        "^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?\
         (\\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$",
    )
    .unwrap();
}

/// Determine whether the given domain name is safe to use as a directory
/// name and plausible as a mail domain.
///
/// This is stricter than `is_safe_name` since domains come from DNS: ASCII
/// letters, digits and hyphens in dot-separated labels, no label starting
/// or ending with a hyphen. IDNs are expected in their punycode form.
pub fn is_safe_domain(name: &str) -> bool {
    name.len() <= 253 && DOMAIN_PATTERN.is_match(name)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_is_safe_name() {
        assert!(is_safe_name("jsmith"));
        assert!(is_safe_name("john.smith"));
        assert!(is_safe_name("Entwürfe"));
        assert!(is_safe_name("郵便"));
        assert!(is_safe_name("smith-j_2"));
        assert!(!is_safe_name(""));
        assert!(!is_safe_name("."));
        assert!(!is_safe_name(".."));
        assert!(!is_safe_name(".hidden"));
        assert!(!is_safe_name("foo/bar"));
        assert!(!is_safe_name("/foo"));
        assert!(!is_safe_name("foo\\bar"));
        assert!(!is_safe_name("jsmith@example.org"));
        assert!(!is_safe_name("foo\0"));
        assert!(!is_safe_name("foo\r"));
        assert!(!is_safe_name("fo\x7Fo"));
    }

    #[test]
    fn test_is_safe_domain() {
        assert!(is_safe_domain("example.org"));
        assert!(is_safe_domain("example"));
        assert!(is_safe_domain("mail.example.co.uk"));
        assert!(is_safe_domain("xn--bcher-kva.example"));
        assert!(is_safe_domain("a.b"));
        assert!(!is_safe_domain(""));
        assert!(!is_safe_domain("."));
        assert!(!is_safe_domain(".example.org"));
        assert!(!is_safe_domain("example.org."));
        assert!(!is_safe_domain("-example.org"));
        assert!(!is_safe_domain("example-.org"));
        assert!(!is_safe_domain("exa mple.org"));
        assert!(!is_safe_domain("example..org"));
        assert!(!is_safe_domain("example/org"));
        assert!(!is_safe_domain("郵便.example"));
    }
}
