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

use graft_interface::{capitalized, BytecodeRegistration};

/// When the secondary compile's classpath is resolved.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ClasspathMode {
    /// While the variant is spliced.
    Eager,
    /// Right before the compiler runs.
    #[default]
    Deferred,
}

/// Which sources the secondary compile takes over from the primary one.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    /// All of the variant's java-like sources go to the secondary compiler, which compiles both
    /// languages; the primary task is left with nothing to compile.
    #[default]
    Joint,
    /// Only the secondary language's own directories move; the primary task excludes them.
    Split,
}

/// Every name and switch the splicer works with. `<V>` in a template stands for the capitalized
/// variant name.
#[derive(Debug, Clone)]
pub struct SpliceConfig {
    pub plugin_name: String,
    pub language: String,
    pub display_name: String,
    pub primary_display_name: String,
    pub source_extension: String,
    pub version_property: String,
    pub platform_plugins: Vec<String>,
    pub toolchain_configuration: String,
    pub runtime_group: String,
    pub accessor_artifact: String,
    pub derived_artifact_kind: String,
    pub derived_artifact_name: String,
    pub strip_task_template: String,
    pub resources_task_template: String,
    pub consumer_templates: Vec<String>,
    pub classpath_mode: ClasspathMode,
    pub bytecode_registration: BytecodeRegistration,
    pub source_mode: SourceMode,
    pub erase_field_constants: bool,
    pub expose_accessors_to_ide: bool,
}

impl Default for SpliceConfig {
    fn default() -> Self {
        let strings = |v: &[&str]| -> Vec<String> { v.iter().map(|s| s.to_string()).collect() };
        SpliceConfig {
            plugin_name: "scala-android".into(),
            language: "scala".into(),
            display_name: "Scala".into(),
            primary_display_name: "Java".into(),
            source_extension: "scala".into(),
            version_property: "scala.scalaVersion".into(),
            platform_plugins: strings(&[
                "com.android.application",
                "com.android.library",
                "com.android.dynamic-feature",
                "com.android.test",
            ]),
            toolchain_configuration: "scalaToolchainRuntimeClasspath".into(),
            runtime_group: "org.scala-lang".into(),
            accessor_artifact: "R.jar".into(),
            derived_artifact_kind: "scala_r".into(),
            derived_artifact_name: "safe_r.jar".into(),
            strip_task_template: "strip<V>RJar".into(),
            resources_task_template: "process<V>Resources".into(),
            consumer_templates: strings(&[
                "dexBuilder<V>",
                "transform<V>ClassesWithAsm",
                "bundle<V>ClassesToCompileJar",
                "bundle<V>ClassesToRuntimeJar",
                "lintAnalyze<V>",
                "lintVitalAnalyze<V>",
                "generate<V>LintModel",
                "generate<V>LintVitalReportModel",
                "merge<V>JavaResource",
                "process<V>JavaRes",
            ]),
            classpath_mode: ClasspathMode::default(),
            bytecode_registration: BytecodeRegistration::AppendToClasses,
            source_mode: SourceMode::default(),
            erase_field_constants: false,
            expose_accessors_to_ide: true,
        }
    }
}

pub fn expand(template: &str, variant: &str) -> String {
    template.replace("<V>", &capitalized(variant))
}

/// `2.13.12` -> 2, `3.3.1` -> 3.
pub fn language_major(version: &str) -> Option<u32> {
    version.split('.').next()?.trim().parse().ok()
}

impl SpliceConfig {
    /// `compileDebugJavaWithJavac` -> `compileDebugScalaWithScalac`. A primary name that does not
    /// mention the primary language falls back to `compile<V>Scala`.
    pub fn secondary_task_name(&self, primary: &str, variant: &str) -> String {
        if primary.contains(&self.primary_display_name) {
            primary.replace(&self.primary_display_name, &self.display_name)
        } else {
            format!("compile{}{}", capitalized(variant), self.display_name)
        }
    }

    pub fn intermediates(&self, build_dir: &Path, variant: &str) -> PathBuf {
        build_dir
            .join("intermediates")
            .join(&self.language)
            .join(variant)
    }

    pub fn destination(&self, build_dir: &Path, variant: &str) -> PathBuf {
        self.intermediates(build_dir, variant).join("classes")
    }

    /// `intermediates/<kind>/<variant>/<name>`
    pub fn derived_artifact(&self, build_dir: &Path, variant: &str) -> PathBuf {
        build_dir
            .join("intermediates")
            .join(&self.derived_artifact_kind)
            .join(variant)
            .join(&self.derived_artifact_name)
    }

    /// Major versions whose compiler cannot extend the final accessor classes.
    pub fn needs_stripped_accessors(&self, version: &str) -> bool {
        language_major(version) == Some(2)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn secondary_names() {
        let config = SpliceConfig::default();
        assert_eq!(
            config.secondary_task_name("compileDebugJavaWithJavac", "debug"),
            "compileDebugScalaWithScalac"
        );
        assert_eq!(
            config.secondary_task_name("compileFreeReleaseUnitTestJavaWithJavac", "freeReleaseUnitTest"),
            "compileFreeReleaseUnitTestScalaWithScalac"
        );
        assert_eq!(config.secondary_task_name("kompile", "debug"), "compileDebugScala");
    }

    #[test]
    fn paths() {
        let config = SpliceConfig::default();
        let build = Path::new("/p/build");
        assert_eq!(
            config.destination(build, "debug"),
            Path::new("/p/build/intermediates/scala/debug/classes")
        );
        assert_eq!(
            config.derived_artifact(build, "debug"),
            Path::new("/p/build/intermediates/scala_r/debug/safe_r.jar")
        );
    }

    #[test]
    fn majors() {
        assert_eq!(language_major("2.13.12"), Some(2));
        assert_eq!(language_major("3.3.1-RC1"), Some(3));
        assert_eq!(language_major("latest"), None);
        let config = SpliceConfig::default();
        assert!(config.needs_stripped_accessors("2.12.18"));
        assert!(!config.needs_stripped_accessors("3.4.0"));
    }

    #[test]
    fn templates() {
        assert_eq!(expand("lintAnalyze<V>", "freeDebug"), "lintAnalyzeFreeDebug");
    }
}
