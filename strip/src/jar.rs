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

use std::io::{self, Read, Seek, Write};

use thiserror::Error;
use tracing::debug;
use zip::{result::ZipError, write::SimpleFileOptions, ZipArchive, ZipWriter};

use crate::classfile::{self, ClassFileError};

#[derive(Debug, Error)]
pub enum EntryError {
    #[error(transparent)]
    Zip(#[from] ZipError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("could not rewrite {entry}")]
    Class {
        entry: String,
        #[source]
        source: ClassFileError,
    },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StripReport {
    pub rewritten: usize,
    pub copied: usize,
}

/// Accessor classes are small; a larger declared size is read without preallocating for it.
const MAX_PREALLOCATION: u64 = 1 << 20;

/// The declared size comes from the archive, which may be corrupt.
fn capacity_hint(declared: u64) -> usize {
    declared.min(MAX_PREALLOCATION) as usize
}

/// `pkg/R.class` and its inner classes, `pkg/R$id.class` and so on.
pub fn is_accessor_class(name: &str) -> bool {
    name.ends_with(".class") && (name.ends_with("/R.class") || name.contains("/R$"))
}

/// Streams every entry of `input` into `output` in order. Accessor classes are rewritten without
/// their final modifiers, every other entry is copied still compressed.
pub fn strip_archive<R, W>(
    input: &mut ZipArchive<R>,
    output: &mut ZipWriter<W>,
    erase_field_constants: bool,
) -> Result<StripReport, EntryError>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let mut report = StripReport::default();
    for index in 0..input.len() {
        let raw = input.by_index_raw(index)?;
        if !is_accessor_class(raw.name()) {
            output.raw_copy_file(raw)?;
            report.copied += 1;
            continue;
        }
        drop(raw);

        let mut entry = input.by_index(index)?;
        let name = entry.name().to_owned();
        let mut bytes = Vec::with_capacity(capacity_hint(entry.size()));
        entry.read_to_end(&mut bytes)?;
        let stripped = classfile::strip_final(&bytes, erase_field_constants).map_err(|source| {
            EntryError::Class {
                entry: name.clone(),
                source,
            }
        })?;

        let mut options = SimpleFileOptions::default().compression_method(entry.compression());
        if let Some(modified) = entry.last_modified() {
            options = options.last_modified_time(modified);
        }
        if let Some(mode) = entry.unix_mode() {
            options = options.unix_permissions(mode);
        }
        output.start_file(name.as_str(), options)?;
        output.write_all(&stripped)?;
        debug!("stripped final modifiers from {}", name);
        report.rewritten += 1;
    }
    Ok(report)
}
