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

use std::path::PathBuf;

use crate::provider::{Classpath, Provider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantKind {
    Application,
    Library,
    DynamicFeature,
    AndroidTest,
    UnitTest,
}

/// Handed out when bytecode is registered as generated before the primary compile. Passing it back
/// to [`Variant::compile_classpath`] leaves that bytecode out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationToken(pub u64);

/// How a task's class output joins the variant's bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BytecodeRegistration {
    /// Appended to the classes every downstream consumer reads.
    AppendToClasses,
    /// Registered as generated bytecode the primary compile reads from its classpath.
    PreCompileGenerated,
}

/// What a plugin needs to know about one build variant, whatever kind of variant it is.
pub trait Variant: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> VariantKind;

    /// Absent for variants that compile nothing.
    fn primary_compile_task(&self) -> Option<String>;

    fn compile_classpath(&self, exclude: Option<RegistrationToken>) -> Provider<Classpath>;

    /// Generated java-like source folders that belong to this variant alone.
    fn java_source_directories(&self) -> Vec<PathBuf>;

    /// Names of the source sets merged into this variant, lowest priority first.
    fn source_sets(&self) -> Vec<String>;

    /// The task producing the resource accessor jar, if the variant has resources.
    fn resource_artifact_task(&self) -> Option<String>;
}

/// `debug` -> `Debug`. Used wherever a task name embeds a variant name.
pub fn capitalized(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The parts of the host's primary compile task a plugin may read and rewrite.
#[derive(Debug, Clone)]
pub struct PrimaryCompile {
    pub classpath: Provider<Classpath>,
    pub annotation_processor_path: Provider<Classpath>,
    pub sources: Vec<PathBuf>,
    pub excluded: Vec<PathBuf>,
    pub destination: PathBuf,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn capitalize() {
        assert_eq!(capitalized("freeDebug"), "FreeDebug");
        assert_eq!(capitalized(""), "");
    }
}
