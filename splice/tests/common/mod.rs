#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use graft_interface::project::Project;
use graft_splice::{CompileRequest, LanguageCompiler, ScalaAndroidPlugin, SpliceConfig};

/// Stands in for scalac: remembers every request and leaves a class file behind.
#[derive(Default)]
pub struct RecordingCompiler {
    requests: Mutex<Vec<CompileRequest>>,
}

impl RecordingCompiler {
    pub fn requests(&self) -> Vec<CompileRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl LanguageCompiler for RecordingCompiler {
    fn compile(&self, request: &CompileRequest) -> anyhow::Result<()> {
        fs::write(request.destination.join("Main.class"), b"\xca\xfe\xba\xbe")?;
        self.requests.lock().unwrap().push(request.clone());
        Ok(())
    }
}

pub fn write_source(root: &Path, relative: &str) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "object Main").unwrap();
    path
}

pub fn android_project(root: &Path) -> Project {
    Project::new(root)
        .with_plugin("com.android.application")
        .with_boot_classpath(vec![root.join("sdk").join("android.jar")])
}

pub fn plugin_with(config: SpliceConfig) -> (ScalaAndroidPlugin, Arc<RecordingCompiler>) {
    let compiler = Arc::new(RecordingCompiler::default());
    let plugin = ScalaAndroidPlugin::with_config(config, compiler.clone());
    (plugin, compiler)
}

pub fn plugin() -> (ScalaAndroidPlugin, Arc<RecordingCompiler>) {
    plugin_with(SpliceConfig::default())
}
