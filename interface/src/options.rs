/*
 * Copyright 2020 Nikhil Marathe <nsm.nikhil@gmail.com>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::{collections::BTreeMap, str::FromStr};

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum OptionsError {
    #[error("option {key} must be true or false, found '{value}'")]
    InvalidBool { key: String, value: String },
    #[error("line {line}: missing key")]
    Malformed { line: usize },
}

/// Project-wide options, as found in `gradle.properties`.
///
/// This is a snapshot taken once when the plugin is applied. Plugins receive it explicitly rather
/// than looking options up through the host.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProjectOptions {
    values: BTreeMap<String, String>,
}

impl ProjectOptions {
    pub fn new() -> ProjectOptions {
        ProjectOptions::default()
    }

    pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> ProjectOptions {
        self.set(key, value);
        self
    }

    pub fn set<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Missing options are `false`.
    pub fn get_bool(&self, key: &str) -> Result<bool, OptionsError> {
        match self.get(key) {
            None => Ok(false),
            Some(v) if v.eq_ignore_ascii_case("true") => Ok(true),
            Some(v) if v.eq_ignore_ascii_case("false") => Ok(false),
            Some(v) => Err(OptionsError::InvalidBool {
                key: key.to_owned(),
                value: v.to_owned(),
            }),
        }
    }

    /// Comma separated list, entries trimmed, empty entries dropped.
    pub fn get_list(&self, key: &str) -> Vec<&str> {
        self.get(key)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromStr for ProjectOptions {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut options = ProjectOptions::new();
        for (i, line) in s.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            // The key ends at the first separator or whitespace. A bare key has an empty value.
            let end = line
                .find(|c: char| c == '=' || c == ':' || c.is_whitespace())
                .unwrap_or(line.len());
            let key = &line[..end];
            if key.is_empty() {
                return Err(OptionsError::Malformed { line: i + 1 });
            }
            let rest = line[end..].trim_start();
            let value = rest
                .strip_prefix(|c: char| c == '=' || c == ':')
                .unwrap_or(rest)
                .trim_start();
            options.set(key, value);
        }
        Ok(options)
    }
}
