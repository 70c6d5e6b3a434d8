use haex_config::{DisplayMode, ExtensionManifest, ManifestLoader};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Log sink shared with a scoped `tracing` subscriber.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("log buffer lock")).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn load_with_logs(loader: &ManifestLoader) -> (Option<ExtensionManifest>, String) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let manifest = tracing::subscriber::with_default(subscriber, || loader.load());
    (manifest, logs.contents())
}

fn write_manifest(root: &Path, contents: &str) {
    let dir = root.join("haextension");
    fs::create_dir_all(&dir).expect("failed to create haextension dir");
    fs::write(dir.join("manifest.json"), contents).expect("failed to write manifest");
}

fn write_package(root: &Path, contents: &str) {
    fs::write(root.join("package.json"), contents).expect("failed to write package.json");
}

#[test]
fn version_falls_back_to_package_descriptor() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    write_manifest(
        dir.path(),
        r#"{"name": "notes", "publicKey": "b4f1c2", "entry": "index.html"}"#,
    );
    write_package(dir.path(), r#"{"name": "notes-pkg", "version": "1.2.3"}"#);

    let manifest = ManifestLoader::new(dir.path())
        .load()
        .expect("manifest should resolve");

    assert_eq!(manifest.name, "notes");
    assert_eq!(manifest.version, "1.2.3");
    assert_eq!(manifest.public_key.as_deref(), Some("b4f1c2"));
    assert_eq!(manifest.entry.as_deref(), Some("index.html"));
}

#[test]
fn missing_name_everywhere_yields_none() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    write_manifest(dir.path(), r#"{"version": "1.0.0"}"#);
    write_package(dir.path(), r#"{"version": "1.0.0"}"#);

    let (manifest, logs) = load_with_logs(&ManifestLoader::new(dir.path()));
    assert!(manifest.is_none());
    assert!(logs.contains("WARN"), "{logs}");
    assert!(logs.contains("lacks name or version"), "{logs}");
    assert!(logs.contains("extension metadata unavailable"), "{logs}");
}

#[test]
fn missing_manifest_file_yields_none() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    write_package(dir.path(), r#"{"name": "notes", "version": "1.0.0"}"#);

    let (manifest, logs) = load_with_logs(&ManifestLoader::new(dir.path()));
    assert!(manifest.is_none());
    assert!(logs.contains("WARN"), "{logs}");
    assert!(logs.contains("no extension manifest at"), "{logs}");
    assert!(logs.contains("extension metadata unavailable"), "{logs}");
}

#[test]
fn resolved_manifest_logs_no_warning() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    write_manifest(dir.path(), r#"{"name": "notes", "version": "1.0.0"}"#);

    let (manifest, logs) = load_with_logs(&ManifestLoader::new(dir.path()));
    assert!(manifest.is_some());
    assert!(!logs.contains("WARN"), "{logs}");
}

#[test]
fn malformed_manifest_yields_none() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    write_manifest(dir.path(), "{ not json");

    assert!(ManifestLoader::new(dir.path()).load().is_none());
}

#[test]
fn malformed_package_descriptor_is_ignored() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    write_manifest(
        dir.path(),
        r#"{"name": "notes", "version": "2.0.0", "displayMode": "window"}"#,
    );
    write_package(dir.path(), "not json either");

    let manifest = ManifestLoader::new(dir.path())
        .load()
        .expect("manifest alone is complete");
    assert_eq!(manifest.version, "2.0.0");
    assert_eq!(manifest.display_mode, DisplayMode::Window);
}

#[test]
fn manifest_values_win_over_package_descriptor() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    write_manifest(
        dir.path(),
        r#"{"name": "notes", "version": "2.0.0", "description": "From manifest"}"#,
    );
    write_package(
        dir.path(),
        r#"{"name": "pkg", "version": "9.9.9", "description": "From package", "homepage": "https://example.com"}"#,
    );

    let manifest = ManifestLoader::new(dir.path())
        .load()
        .expect("manifest should resolve");
    assert_eq!(manifest.name, "notes");
    assert_eq!(manifest.version, "2.0.0");
    assert_eq!(manifest.description.as_deref(), Some("From manifest"));
    assert_eq!(manifest.homepage.as_deref(), Some("https://example.com"));
}

#[test]
fn custom_manifest_path_is_honoured() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    fs::write(
        dir.path().join("extension.json"),
        r#"{"name": "custom", "version": "0.3.0"}"#,
    )
    .expect("failed to write manifest");

    let manifest = ManifestLoader::new(dir.path())
        .with_manifest_path("extension.json")
        .load()
        .expect("manifest should resolve");
    assert_eq!(manifest.name, "custom");
}
