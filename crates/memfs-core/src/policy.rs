// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Platform path policy: separators, roots, name folding and attribute views

use serde::{Deserialize, Serialize};

use crate::error::{FsError, FsResult};
use crate::types::AttributeView;

/// Platform flavor an instance emulates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flavor {
    Posix,
    Windows,
}

impl Flavor {
    pub fn default_case_sensitivity(&self) -> CaseSensitivity {
        match self {
            Flavor::Posix => CaseSensitivity::Sensitive,
            Flavor::Windows => CaseSensitivity::Insensitive,
        }
    }
}

/// How names are compared
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseSensitivity {
    Sensitive,
    Insensitive,
}

const POSIX_VIEWS: &[AttributeView] = &[AttributeView::Basic, AttributeView::Owner, AttributeView::Posix];
const WINDOWS_VIEWS: &[AttributeView] = &[AttributeView::Basic, AttributeView::Owner, AttributeView::Dos];

const WINDOWS_ILLEGAL: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

/// Platform rules threaded through parsing, resolution and attribute access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathPolicy {
    flavor: Flavor,
    case: CaseSensitivity,
}

impl PathPolicy {
    pub fn new(flavor: Flavor, case: CaseSensitivity) -> Self {
        Self { flavor, case }
    }

    pub fn posix() -> Self {
        Self::new(Flavor::Posix, CaseSensitivity::Sensitive)
    }

    pub fn windows() -> Self {
        Self::new(Flavor::Windows, CaseSensitivity::Insensitive)
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn case_sensitivity(&self) -> CaseSensitivity {
        self.case
    }

    /// Separator used when rendering paths
    pub fn separator(&self) -> char {
        match self.flavor {
            Flavor::Posix => '/',
            Flavor::Windows => '\\',
        }
    }

    pub fn is_separator(&self, c: char) -> bool {
        match self.flavor {
            Flavor::Posix => c == '/',
            Flavor::Windows => c == '\\' || c == '/',
        }
    }

    /// Key used for equality, hashing, ordering and directory lookups
    pub fn canonical_name(&self, name: &str) -> String {
        match self.case {
            CaseSensitivity::Sensitive => name.to_string(),
            CaseSensitivity::Insensitive => name.to_lowercase(),
        }
    }

    pub(crate) fn validate_name(&self, input: &str, name: &str) -> FsResult<()> {
        let bad = match self.flavor {
            Flavor::Posix => name.contains('\0'),
            Flavor::Windows => name
                .chars()
                .any(|c| c.is_control() || WINDOWS_ILLEGAL.contains(&c)),
        };
        if bad {
            return Err(FsError::InvalidPath {
                input: input.to_string(),
                reason: "illegal character in name",
            });
        }
        Ok(())
    }

    /// Split a path string into its root display form and the remainder.
    pub(crate) fn split_root<'a>(&self, input: &'a str) -> FsResult<(Option<String>, &'a str)> {
        match self.flavor {
            Flavor::Posix => {
                if input.starts_with('/') {
                    Ok((Some("/".to_string()), input.trim_start_matches('/')))
                } else {
                    Ok((None, input))
                }
            }
            Flavor::Windows => self.split_windows_root(input),
        }
    }

    fn split_windows_root<'a>(&self, input: &'a str) -> FsResult<(Option<String>, &'a str)> {
        let invalid = |reason| FsError::InvalidPath {
            input: input.to_string(),
            reason,
        };
        let mut chars = input.chars();
        let first = chars.next();
        let second = chars.next();
        let third = chars.next();

        match (first, second) {
            (Some(a), Some(b)) if self.is_separator(a) && self.is_separator(b) => {
                Err(invalid("UNC paths are not supported"))
            }
            (Some(a), _) if self.is_separator(a) => Err(invalid("path has no drive letter")),
            (Some(letter), Some(':')) if letter.is_ascii_alphabetic() => match third {
                Some(sep) if self.is_separator(sep) => {
                    let rest = input[2..].trim_start_matches(|c| self.is_separator(c));
                    Ok((Some(format!("{letter}:\\")), rest))
                }
                _ => Err(invalid("drive-relative paths are not supported")),
            },
            _ => Ok((None, input)),
        }
    }

    /// Root key; drive letters fold regardless of the name rule.
    pub(crate) fn root_key(&self, display: &str) -> String {
        match self.flavor {
            Flavor::Posix => display.to_string(),
            Flavor::Windows => display.to_lowercase(),
        }
    }

    pub fn supported_views(&self) -> &'static [AttributeView] {
        match self.flavor {
            Flavor::Posix => POSIX_VIEWS,
            Flavor::Windows => WINDOWS_VIEWS,
        }
    }

    pub fn supports_view(&self, view: AttributeView) -> bool {
        self.supported_views().contains(&view)
    }
}
