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

//! Classpath of the secondary compile.
//!
//! The compiler resolves a symbol from the first root that has it, so order is significant:
//! accessor classes first, then the primary task's classpath, then the variant's, and the boot
//! classpath last so it never shadows generated or instrumented classes.

use std::path::{Path, PathBuf};

use graft_interface::{Classpath, Provider};

/// Everything the composed classpath is made of.
#[derive(Debug, Clone)]
pub struct ClasspathInputs {
    /// Jars providing the resource accessor classes. When set, any other entry with the
    /// `accessor_name` file name is dropped so these are the only accessors the compiler sees.
    pub accessors: Option<Vec<PathBuf>>,
    pub accessor_name: String,
    pub primary: Provider<Classpath>,
    pub variant: Provider<Classpath>,
    pub boot: Provider<Classpath>,
    /// Never on the classpath, typically the compile's own destination.
    pub exclude: Vec<PathBuf>,
}

/// Union with first-writer-wins, in the order described above.
pub fn merge(
    accessors: Option<&[PathBuf]>,
    accessor_name: &str,
    primary: &Classpath,
    variant: &Classpath,
    boot: &Classpath,
    exclude: &[PathBuf],
) -> Classpath {
    let is_accessor = |path: &Path| {
        accessors.is_some() && path.file_name().map_or(false, |n| n == accessor_name)
    };
    let mut composed = Classpath::new();
    let mut push = |path: &PathBuf| {
        if !exclude.contains(path) {
            composed.push(path.clone());
        }
    };
    accessors.into_iter().flatten().for_each(&mut push);
    primary
        .iter()
        .chain(variant.iter())
        .filter(|p| !is_accessor(p.as_path()))
        .for_each(&mut push);
    boot.iter().for_each(&mut push);
    composed
}

/// A classpath that is only worked out when someone asks for it.
pub fn compose(inputs: ClasspathInputs) -> Provider<Classpath> {
    Provider::from_fn(move || {
        let primary = inputs.primary.get()?;
        let variant = inputs.variant.get()?;
        let boot = inputs.boot.get()?;
        Ok(merge(
            inputs.accessors.as_deref(),
            &inputs.accessor_name,
            &primary,
            &variant,
            &boot,
            &inputs.exclude,
        ))
    })
}
