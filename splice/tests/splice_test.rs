mod common;

use common::*;
use std::path::PathBuf;

use graft_interface::{
    project::Project, BytecodeRegistration, Classpath, Dependency, Host, HostError, Plugin,
    ProjectOptions, Provider, RegistrationToken, Variant, VariantKind,
};
use graft_splice::{
    ClasspathMode, ConfigurationError, SourceMode, SpliceConfig, SpliceError, Splicer,
};
use graft_tasks::Edge;
use insta::assert_snapshot;
use tempfile::TempDir;

fn scala_2(project: &mut Project, plugin: &graft_splice::ScalaAndroidPlugin) {
    project
        .evaluate(plugin, |_| plugin.scala_version().set("2.13.12".to_owned()))
        .unwrap();
}

fn debug_project(dir: &TempDir) -> Project {
    let mut project = android_project(dir.path());
    project
        .add_android_variant("debug", VariantKind::Application)
        .unwrap();
    project
}

#[test]
fn splices_the_secondary_compile_in_front_of_the_primary() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "src/main/scala/Main.scala");
    let mut project = debug_project(&dir);
    let (plugin, _) = plugin();
    scala_2(&mut project, &plugin);

    assert_snapshot!(project.tasks().to_string(), @r###"
    assembleDebug (Default)
      depends on dexBuilderDebug
    bundleDebugClassesToCompileJar (Default)
      depends on compileDebugJavaWithJavac
      depends on compileDebugScalaWithScalac
    compileDebugJavaWithJavac (JavaCompile)
      depends on compileDebugScalaWithScalac
      depends on generateDebugRFile
      depends on preDebugBuild
      must run after processDebugResources
    compileDebugScalaWithScalac (ScalaCompile)
      depends on generateDebugRFile
      depends on preDebugBuild
      depends on stripDebugRJar
    dexBuilderDebug (Default)
      depends on compileDebugJavaWithJavac
      depends on compileDebugScalaWithScalac
    generateDebugRFile (GenerateRFile)
    preDebugBuild (Default)
    processDebugResources (ProcessResources)
    stripDebugRJar (StripFinalModifier)
      depends on generateDebugRFile
    "###);

    let tasks = project.tasks();
    let primary = tasks.named("compileDebugJavaWithJavac").unwrap();
    assert!(project.primary_compile(primary).unwrap().sources.is_empty());
    assert_eq!(
        project.appended_classes("debug").unwrap(),
        vec![dir.path().join("build/intermediates/scala/debug/classes")]
    );
}

#[test]
fn building_runs_the_compiler_with_the_composed_inputs() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "src/main/scala/Main.scala");
    let root = dir.path();
    let mut project = debug_project(&dir).with_configuration_files(
        "scalaToolchainRuntimeClasspath",
        vec![root.join("toolchain/scala-compiler.jar")],
    );
    project
        .add_variant_classpath("debug", vec![root.join("libs/a.jar")])
        .unwrap();
    project
        .set_annotation_processor_path("debug", vec![root.join("libs/processor.jar")])
        .unwrap();
    let (plugin, compiler) = plugin();
    scala_2(&mut project, &plugin);

    let report = project.execute(&["assembleDebug"]).unwrap();
    let position = |name: &str| report.executed.iter().position(|t| t == name).unwrap();
    assert!(position("stripDebugRJar") < position("compileDebugScalaWithScalac"));

    let requests = compiler.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    let build = root.join("build");
    assert_eq!(request.task, "compileDebugScalaWithScalac");
    assert_eq!(
        request.classpath.entries(),
        &[
            build.join("intermediates/scala_r/debug/safe_r.jar"),
            root.join("libs/a.jar"),
            root.join("sdk/android.jar"),
        ]
    );
    assert_eq!(
        request.sources,
        vec![
            root.join("src/main/java"),
            root.join("src/main/scala"),
            root.join("src/debug/java"),
            build.join("generated/source/buildConfig/debug"),
        ]
    );
    assert_eq!(
        request.annotation_processor_path.entries(),
        &[root.join("libs/processor.jar")]
    );
    assert_eq!(
        request.toolchain_classpath.entries(),
        &[root.join("toolchain/scala-compiler.jar")]
    );
    assert_eq!(
        request.incremental.analysis,
        build.join("intermediates/scala/debug/compileDebugScalaWithScalac/incremental.analysis")
    );
    assert!(build.join("intermediates/scala_r/debug/safe_r.jar").is_file());
    assert!(build.join("intermediates/scala/debug/classes/Main.class").is_file());
}

#[test]
fn consumers_wait_for_the_secondary_compile() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "src/debug/scala/Debug.scala");
    let mut project = debug_project(&dir);
    let (plugin, _) = plugin();
    scala_2(&mut project, &plugin);

    let tasks = project.tasks();
    let secondary = tasks.named("compileDebugScalaWithScalac").unwrap();
    for consumer in &[
        "compileDebugJavaWithJavac",
        "dexBuilderDebug",
        "bundleDebugClassesToCompileJar",
        "assembleDebug",
    ] {
        assert!(
            tasks.is_ordered_after(tasks.named(consumer).unwrap(), secondary),
            "{} should run after the secondary compile",
            consumer
        );
    }
    assert!(!tasks.is_ordered_after(secondary, tasks.named("compileDebugJavaWithJavac").unwrap()));
}

#[test]
fn variant_without_sources_keeps_its_graph() {
    let dir = TempDir::new().unwrap();
    let mut project = debug_project(&dir);
    let before = project.tasks().edge_count();
    let (plugin, compiler) = plugin();
    scala_2(&mut project, &plugin);

    let tasks = project.tasks();
    let secondary = tasks.named("compileDebugScalaWithScalac").unwrap();
    assert!(!tasks.task(secondary).is_enabled());
    assert_eq!(tasks.edge_count(), before);
    assert!(tasks.find("stripDebugRJar").is_none());
    let primary = tasks.named("compileDebugJavaWithJavac").unwrap();
    assert!(!project.primary_compile(primary).unwrap().sources.is_empty());
    assert!(project.appended_classes("debug").unwrap().is_empty());

    let report = project.execute(&["assembleDebug"]).unwrap();
    assert!(report.executed.is_empty());
    assert!(compiler.requests().is_empty());
}

#[test]
fn evaluating_twice_changes_nothing() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "src/main/scala/Main.scala");
    let mut project = debug_project(&dir);
    let (plugin, _) = plugin();
    scala_2(&mut project, &plugin);
    let graph = project.tasks().to_string();

    plugin.after_evaluate(&mut project).unwrap();
    assert_eq!(project.tasks().to_string(), graph);
    assert_eq!(project.appended_classes("debug").unwrap().len(), 1);
    assert_eq!(project.dependencies().keys("debugCompileOnly").len(), 1);
    assert_eq!(project.dependencies().keys("implementation").len(), 1);
}

#[test]
fn applying_the_plugin_twice_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_source(root, "src/main/scala/Main.scala");
    let mut project = debug_project(&dir);
    let (plugin, _) = plugin();
    scala_2(&mut project, &plugin);
    let graph = project.tasks().to_string();

    scala_2(&mut project, &plugin);
    assert_eq!(project.tasks().to_string(), graph);

    let scala = root.join("src/main/scala");
    let main = project.source_set("main").unwrap();
    assert_eq!(main.java.dirs().iter().filter(|d| **d == scala).count(), 1);
    assert_eq!(main.extension("scala").unwrap().dirs(), &[scala]);
    assert_eq!(project.dependencies().keys("implementation").len(), 1);
    assert_eq!(project.dependencies().keys("debugCompileOnly").len(), 1);
    assert_eq!(project.appended_classes("debug").unwrap().len(), 1);
}

#[test]
fn platform_plugin_is_required() {
    let dir = TempDir::new().unwrap();
    let mut project = Project::new(dir.path());
    let (plugin, _) = plugin();
    let err = project.evaluate(&plugin, |_| {}).unwrap_err();
    assert!(matches!(
        err,
        SpliceError::Configuration(ConfigurationError::MissingPlatformPlugin { .. })
    ));
    assert_eq!(
        err.to_string(),
        "You must apply the Android plugin or the Android library plugin before using the scala-android plugin"
    );
}

#[test]
fn version_is_required_after_evaluation() {
    let dir = TempDir::new().unwrap();
    let mut project = debug_project(&dir);
    let (plugin, _) = plugin();
    let err = project.evaluate(&plugin, |_| {}).unwrap_err();
    assert!(matches!(
        err,
        SpliceError::Configuration(ConfigurationError::MissingVersion { .. })
    ));
    assert!(err
        .to_string()
        .starts_with("scala.scalaVersion property needs to be specified"));
}

#[test]
fn jetifier_must_ignore_the_runtime() {
    let dir = TempDir::new().unwrap();
    let options: ProjectOptions = "android.enableJetifier=true\n".parse().unwrap();
    let mut project = android_project(dir.path()).with_options(options);
    let (plugin, _) = plugin();
    let err = plugin.apply(&mut project).unwrap_err();
    assert!(err.to_string().contains("android.jetifier.ignorelist=scala"));

    let options: ProjectOptions =
        "android.enableJetifier=true\nandroid.jetifier.ignorelist=scala-library\n"
            .parse()
            .unwrap();
    let mut project = android_project(dir.path()).with_options(options);
    assert!(plugin.apply(&mut project).is_ok());
}

#[test]
fn source_sets_learn_the_language_directory() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_source(root, "src/main/scala/Main.scala");
    write_source(root, "src/androidTest/scala/MainTest.scala");
    let mut project = android_project(root);
    let (plugin, _) = plugin();
    project
        .evaluate(&plugin, |p| {
            p.add_source_set("androidTest");
            p.add_source_set("release");
            plugin.scala_version().set("2.13.12".to_owned());
        })
        .unwrap();

    for name in &["main", "androidTest"] {
        let set = project.source_set(name).unwrap();
        let scala = root.join("src").join(name).join("scala");
        assert!(set.java.contains(&scala));
        assert_eq!(set.extension("scala").unwrap().dirs(), &[scala]);
    }
    let release = project.source_set("release").unwrap();
    assert!(release.extension("scala").is_none());
    assert_eq!(release.java.dirs().len(), 1);

    let runtime = |configuration: &str| -> Vec<String> {
        project
            .dependencies()
            .resolve_modules(configuration)
            .unwrap()
            .iter()
            .map(|c| c.to_string())
            .collect()
    };
    assert_eq!(runtime("implementation"), vec!["org.scala-lang:scala-library:2.13.12"]);
    assert_eq!(
        runtime("androidTestImplementation"),
        vec!["org.scala-lang:scala-library:2.13.12"]
    );
}

#[test]
fn scala_3_compiles_against_the_original_accessors() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "src/main/scala/Main.scala");
    let mut project = debug_project(&dir);
    let (plugin, compiler) = plugin();
    project
        .evaluate(&plugin, |_| plugin.scala_version().set("3.3.1".to_owned()))
        .unwrap();

    assert!(project.tasks().find("stripDebugRJar").is_none());
    assert_eq!(
        project.dependencies().resolve_modules("implementation").unwrap()[0].to_string(),
        "org.scala-lang:scala3-library_3:3.3.1"
    );

    project.execute(&["compileDebugJavaWithJavac"]).unwrap();
    let requests = compiler.requests();
    assert_eq!(
        requests[0].classpath.entries(),
        &[project.r_jar("debug"), dir.path().join("sdk/android.jar")]
    );
}

#[test]
fn deferred_classpath_sees_late_additions() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "src/main/scala/Main.scala");
    let late = dir.path().join("libs/late.jar");

    let mut project = debug_project(&dir);
    let (plugin, compiler) = plugin();
    scala_2(&mut project, &plugin);
    project.add_variant_classpath("debug", vec![late.clone()]).unwrap();
    project.execute(&["compileDebugScalaWithScalac"]).unwrap();
    assert!(compiler.requests()[0].classpath.contains(&late));

    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "src/main/scala/Main.scala");
    let mut project = debug_project(&dir);
    let (plugin, compiler) = plugin_with(SpliceConfig {
        classpath_mode: ClasspathMode::Eager,
        ..SpliceConfig::default()
    });
    scala_2(&mut project, &plugin);
    project.add_variant_classpath("debug", vec![late.clone()]).unwrap();
    project.execute(&["compileDebugScalaWithScalac"]).unwrap();
    assert!(!compiler.requests()[0].classpath.contains(&late));
}

#[test]
fn split_sources_leave_java_to_the_primary() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_source(root, "src/main/scala/Main.scala");
    let mut project = debug_project(&dir);
    let (plugin, compiler) = plugin_with(SpliceConfig {
        source_mode: SourceMode::Split,
        ..SpliceConfig::default()
    });
    scala_2(&mut project, &plugin);

    let tasks = project.tasks();
    let primary = tasks.named("compileDebugJavaWithJavac").unwrap();
    let resources = tasks.named("processDebugResources").unwrap();
    assert!(!tasks.has_edge(primary, resources, Edge::MustRunAfter));
    let compile = project.primary_compile(primary).unwrap();
    assert!(compile.sources.contains(&root.join("src/main/java")));
    assert_eq!(compile.excluded, vec![root.join("src/main/scala")]);

    project.execute(&["compileDebugScalaWithScalac"]).unwrap();
    assert_eq!(compiler.requests()[0].sources, vec![root.join("src/main/scala")]);
}

#[test]
fn generated_bytecode_is_kept_off_its_own_classpath() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "src/main/scala/Main.scala");
    let mut project = debug_project(&dir);
    let (plugin, compiler) = plugin_with(SpliceConfig {
        bytecode_registration: BytecodeRegistration::PreCompileGenerated,
        ..SpliceConfig::default()
    });
    scala_2(&mut project, &plugin);

    let destination = dir.path().join("build/intermediates/scala/debug/classes");
    let primary = project.tasks().named("compileDebugJavaWithJavac").unwrap();
    let primary_classpath = project
        .primary_compile(primary)
        .unwrap()
        .classpath
        .get()
        .unwrap();
    assert!(primary_classpath.contains(&destination));
    assert!(project.appended_classes("debug").unwrap().is_empty());

    project.execute(&["compileDebugJavaWithJavac"]).unwrap();
    assert!(!compiler.requests()[0].classpath.contains(&destination));
}

#[test]
fn variants_without_a_primary_compile_are_skipped() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "src/main/scala/Main.scala");
    let mut project = debug_project(&dir);
    project.add_bare_variant("debugUnitTest", VariantKind::UnitTest);
    let (plugin, _) = plugin();
    scala_2(&mut project, &plugin);

    let names: Vec<&str> = project.tasks().tasks().map(|(_, t)| t.name()).collect();
    assert!(!names.iter().any(|n| n.contains("UnitTest")));
    assert!(names.contains(&"compileDebugScalaWithScalac"));
}

#[test]
fn accessors_are_exposed_to_the_ide() {
    let dir = TempDir::new().unwrap();
    let mut project = debug_project(&dir);
    let (plugin, _) = plugin();
    scala_2(&mut project, &plugin);

    let declared = project.dependencies().dependencies("debugCompileOnly");
    assert_eq!(declared.len(), 1);
    match declared[0] {
        Dependency::FileTree { root, include } => {
            assert_eq!(root, &dir.path().join("build"));
            assert_eq!(include, "**/debug/**/R.jar");
        }
        other => panic!("unexpected dependency {:?}", other),
    }
}

/// Names a task the host does not know as a compile task.
struct MisdeclaredVariant;

impl Variant for MisdeclaredVariant {
    fn name(&self) -> &str {
        "debug"
    }

    fn kind(&self) -> VariantKind {
        VariantKind::Application
    }

    fn primary_compile_task(&self) -> Option<String> {
        Some("assembleDebug".to_owned())
    }

    fn compile_classpath(&self, _exclude: Option<RegistrationToken>) -> Provider<Classpath> {
        Provider::of(Classpath::new())
    }

    fn java_source_directories(&self) -> Vec<PathBuf> {
        vec![]
    }

    fn source_sets(&self) -> Vec<String> {
        vec!["main".to_owned()]
    }

    fn resource_artifact_task(&self) -> Option<String> {
        None
    }
}

#[test]
fn primary_task_must_be_a_compile_task() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "src/main/scala/Main.scala");
    let mut project = debug_project(&dir);
    let edges = project.tasks().edge_count();
    let (_, compiler) = plugin();
    let config = SpliceConfig::default();
    let splicer = Splicer::new(&config, "2.13.12", compiler);

    let err = splicer.splice(&mut project, &MisdeclaredVariant).unwrap_err();
    match err {
        SpliceError::Host(HostError::NotACompileTask(task)) => assert_eq!(task, "assembleDebug"),
        other => panic!("unexpected {:?}", other),
    }
    assert!(project.tasks().find("compileDebugScala").is_none());
    assert_eq!(project.tasks().edge_count(), edges);
}
