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

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IncrementalPaths {
    pub analysis: PathBuf,
    pub classfile_backup: PathBuf,
}

/// Keeps a name usable as exactly one path component. Bytes outside `[A-Za-z0-9_-]` become `%XX`
/// and the empty name becomes a lone `%`, which no other name can produce.
fn escape(component: &str) -> String {
    if component.is_empty() {
        return "%".to_owned();
    }
    let mut escaped = String::with_capacity(component.len());
    for b in component.bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'-' => escaped.push(b as char),
            _ => escaped.push_str(&format!("%{:02X}", b)),
        }
    }
    escaped
}

/// Where the compiler of `task` keeps its incremental state for `variant`:
/// `<build>/intermediates/<language>/<variant>/<task>/`.
pub fn incremental_paths(
    build_dir: &Path,
    language: &str,
    variant: &str,
    task: &str,
) -> IncrementalPaths {
    let root = build_dir
        .join("intermediates")
        .join(language)
        .join(escape(variant))
        .join(escape(task));
    IncrementalPaths {
        analysis: root.join("incremental.analysis"),
        classfile_backup: root.join("classfile.bak"),
    }
}
