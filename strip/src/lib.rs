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

//! Produces a copy of a generated `R.jar` whose accessor classes can be subclassed.

use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use tempfile::{NamedTempFile, PersistError};
use thiserror::Error;
use tracing::{info, warn};
use zip::{result::ZipError, ZipArchive, ZipWriter};

pub mod classfile;
pub mod jar;

pub use classfile::{AccessSummary, ClassFileError, ACC_FINAL};
pub use jar::{is_accessor_class, strip_archive, EntryError, StripReport};

#[derive(Debug, Error)]
pub enum StripError {
    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} is not a readable archive")]
    Archive {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("could not strip {path}")]
    Entry {
        path: PathBuf,
        #[source]
        source: EntryError,
    },
    #[error("could not move the stripped archive to {path}")]
    Persist {
        path: PathBuf,
        #[source]
        source: PersistError,
    },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StripOptions {
    /// Drop `ConstantValue` from accessor fields so their values are read at run time.
    pub erase_field_constants: bool,
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> StripError {
    let path = path.to_owned();
    move |source| StripError::Io { path, source }
}

/// Writes the stripped form of the first existing file in `candidates` to `output`. With no such
/// file `output` is an empty archive.
///
/// The archive is assembled in a temporary file next to `output` and only renamed over it once
/// complete, so a failure never leaves a partial jar at `output`.
pub fn strip_final_modifiers(
    candidates: &[PathBuf],
    output: &Path,
    options: StripOptions,
) -> Result<StripReport, StripError> {
    let mut existing = candidates.iter().filter(|c| c.is_file());
    let input = existing.next();
    if existing.next().is_some() {
        warn!(
            "{} candidate archives for {}, only the first is used",
            candidates.len(),
            output.display()
        );
    }

    let dir = match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_owned(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(io_err(&dir))?;
    let mut temp = NamedTempFile::new_in(&dir).map_err(io_err(&dir))?;

    let report = {
        let mut writer = ZipWriter::new(BufWriter::new(temp.as_file_mut()));
        let report = match input {
            Some(path) => {
                let file = File::open(path).map_err(io_err(path))?;
                let mut archive =
                    ZipArchive::new(BufReader::new(file)).map_err(|source| StripError::Archive {
                        path: path.clone(),
                        source,
                    })?;
                strip_archive(&mut archive, &mut writer, options.erase_field_constants).map_err(
                    |source| StripError::Entry {
                        path: path.clone(),
                        source,
                    },
                )?
            }
            None => StripReport::default(),
        };
        let mut buffered = writer.finish().map_err(|source| StripError::Archive {
            path: output.to_owned(),
            source,
        })?;
        buffered.flush().map_err(io_err(output))?;
        report
    };

    temp.persist(output).map_err(|source| StripError::Persist {
        path: output.to_owned(),
        source,
    })?;
    match input {
        Some(path) => info!(
            "stripped {} accessor classes from {} into {}",
            report.rewritten,
            path.display(),
            output.display()
        ),
        None => info!("no accessor archive, wrote empty {}", output.display()),
    }
    Ok(report)
}
