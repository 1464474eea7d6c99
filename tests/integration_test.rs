use assert_cmd::Command;
use assert_cmd::cargo;
use modkeeper::device::LocalDevice;
use modkeeper::download::HttpFetcher;
use modkeeper::error::ModError;
use modkeeper::http::HttpClient;
use modkeeper::manager::ModManager;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::{TempDir, tempdir};
use zip::ZipWriter;
use zip::write::FileOptions;

const APP: &str = "com.example.game";

fn package(id: &str, version: &str) -> Value {
    json!({
        "_QPVersion": "0.1.1",
        "id": id,
        "name": id,
        "author": "tester",
        "version": version,
        "packageId": APP,
        "modFiles": [],
        "libraryFiles": [],
        "dependencies": []
    })
}

fn library(id: &str, version: &str, file: &str) -> Value {
    let mut lib = package(id, version);
    lib["isLibrary"] = json!(true);
    lib["libraryFiles"] = json!([file]);
    lib
}

fn with_mod_file(mut manifest: Value, file: &str) -> Value {
    manifest["modFiles"] = json!([file]);
    manifest
}

fn depending_on(mut manifest: Value, id: &str, range: &str, url: Option<&str>) -> Value {
    let mut dependency = json!({ "id": id, "version": range });
    if let Some(url) = url {
        dependency["downloadIfMissing"] = json!(url);
    }
    manifest["dependencies"]
        .as_array_mut()
        .unwrap()
        .push(dependency);
    manifest
}

/// Zip holding `mod.json` plus a stub for every file the manifest references.
fn archive_bytes(manifest: &Value) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options: FileOptions<()> = FileOptions::default();

    zip.start_file("mod.json", options).unwrap();
    zip.write_all(manifest.to_string().as_bytes()).unwrap();

    for list in ["modFiles", "libraryFiles"] {
        for file in manifest[list].as_array().unwrap() {
            let name = file.as_str().unwrap();
            zip.start_file(name, options).unwrap();
            zip.write_all(format!("contents of {}", name).as_bytes())
                .unwrap();
        }
    }

    zip.finish().unwrap().into_inner()
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempdir().unwrap(),
        }
    }

    fn device_root(&self) -> PathBuf {
        self.dir.path().join("device")
    }

    fn manager(&self) -> ModManager<LocalDevice, HttpFetcher> {
        ModManager::new(
            APP,
            LocalDevice::new(self.device_root()),
            HttpFetcher::new(HttpClient::new(reqwest::Client::new())),
        )
    }

    fn archive(&self, manifest: &Value) -> PathBuf {
        let path = self.dir.path().join(format!(
            "{}-{}.qmod",
            manifest["id"].as_str().unwrap(),
            manifest["version"].as_str().unwrap()
        ));
        std::fs::write(&path, archive_bytes(manifest)).unwrap();
        path
    }

    fn lib_file(&self, name: &str) -> PathBuf {
        self.device_root()
            .join("sdcard/Android/data")
            .join(APP)
            .join("files/libs")
            .join(name)
    }

    fn mod_file(&self, name: &str) -> PathBuf {
        self.device_root()
            .join("sdcard/Android/data")
            .join(APP)
            .join("files/mods")
            .join(name)
    }

    fn extract_dir(&self, id: &str) -> PathBuf {
        self.device_root()
            .join("sdcard/ModData")
            .join(APP)
            .join("installedMods")
            .join(id)
    }

    fn saved_manifest(&self, id: &str) -> Value {
        let text = std::fs::read_to_string(self.extract_dir(id).join("mod.json")).unwrap();
        serde_json::from_str(&text).unwrap()
    }
}

async fn import_all(manager: &mut ModManager<LocalDevice, HttpFetcher>, fixture: &Fixture, manifests: &[Value]) {
    for manifest in manifests {
        manager.import(&fixture.archive(manifest)).await.unwrap();
    }
}

fn mod_error(err: &anyhow::Error) -> &ModError {
    err.downcast_ref::<ModError>()
        .unwrap_or_else(|| panic!("expected ModError, got {:#}", err))
}

fn is_installed(manager: &ModManager<LocalDevice, HttpFetcher>, id: &str) -> bool {
    manager.package(id).unwrap().is_installed()
}

#[test_log::test(tokio::test)]
async fn test_shared_library_survives_until_last_consumer_is_uninstalled() {
    let fixture = Fixture::new();
    let mut manager = fixture.manager();
    manager.load_installed().await.unwrap();

    import_all(
        &mut manager,
        &fixture,
        &[
            library("shared", "1.0.0", "libshared.so"),
            depending_on(with_mod_file(package("first", "1.0.0"), "libfirst.so"), "shared", "^1.0.0", None),
            depending_on(with_mod_file(package("second", "1.0.0"), "libsecond.so"), "shared", "^1.0.0", None),
        ],
    )
    .await;

    manager.install("first").await.unwrap();
    manager.install("second").await.unwrap();
    assert!(is_installed(&manager, "shared"));
    assert!(fixture.lib_file("libshared.so").exists());

    manager.uninstall("first", false).await.unwrap();
    assert!(!fixture.mod_file("libfirst.so").exists());
    assert!(fixture.lib_file("libshared.so").exists());
    assert!(is_installed(&manager, "shared"));

    manager.uninstall("second", false).await.unwrap();
    assert!(!fixture.lib_file("libshared.so").exists());
    assert!(!is_installed(&manager, "shared"));
    // Disabled, not deleted
    assert!(manager.registry().contains("shared"));
    assert_eq!(fixture.saved_manifest("shared")["isInstalled"], json!(false));
}

#[test_log::test(tokio::test)]
async fn test_uninstalling_twice_is_a_noop() {
    let fixture = Fixture::new();
    let mut manager = fixture.manager();
    manager.load_installed().await.unwrap();
    import_all(&mut manager, &fixture, &[with_mod_file(package("solo", "1.0.0"), "libsolo.so")]).await;

    manager.install("solo").await.unwrap();
    manager.uninstall("solo", false).await.unwrap();
    let saved = std::fs::metadata(fixture.extract_dir("solo").join("mod.json"))
        .unwrap()
        .modified()
        .unwrap();

    manager.uninstall("solo", false).await.unwrap();

    let after = std::fs::metadata(fixture.extract_dir("solo").join("mod.json"))
        .unwrap()
        .modified()
        .unwrap();
    assert_eq!(saved, after);
    assert!(!is_installed(&manager, "solo"));
}

#[test_log::test(tokio::test)]
async fn test_upgrade_breaking_a_dependent_is_rejected() {
    let fixture = Fixture::new();
    let mut manager = fixture.manager();
    manager.load_installed().await.unwrap();

    import_all(
        &mut manager,
        &fixture,
        &[
            library("base", "1.0.0", "libbase.so"),
            depending_on(package("consumer", "1.0.0"), "base", "[1.0,1.5)", None),
        ],
    )
    .await;
    manager.install("consumer").await.unwrap();

    let err = manager
        .import(&fixture.archive(&library("base", "2.0.0", "libbase.so")))
        .await
        .unwrap_err();

    match mod_error(&err) {
        ModError::UnsafeUpgrade { violations, .. } => {
            assert_eq!(violations.len(), 1);
            assert_eq!(violations[0].dependent, "consumer");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(err.to_string().contains("consumer"));
    assert_eq!(manager.package("base").unwrap().version().to_string(), "1.0.0");
    assert!(is_installed(&manager, "base"));
    assert!(fixture.lib_file("libbase.so").exists());
}

#[test_log::test(tokio::test)]
async fn test_compatible_upgrade_replaces_package() {
    let fixture = Fixture::new();
    let mut manager = fixture.manager();
    manager.load_installed().await.unwrap();
    import_all(&mut manager, &fixture, &[with_mod_file(package("hats", "1.0.0"), "libhats.so")]).await;
    manager.install("hats").await.unwrap();

    manager
        .import(&fixture.archive(&with_mod_file(package("hats", "1.1.0"), "libhats.so")))
        .await
        .unwrap();

    let hats = manager.package("hats").unwrap();
    assert_eq!(hats.version().to_string(), "1.1.0");
    assert!(!hats.is_installed());
    assert!(!fixture.mod_file("libhats.so").exists());
    assert_eq!(fixture.saved_manifest("hats")["version"], json!("1.1.0"));
}

#[test_log::test(tokio::test)]
async fn test_downgrade_is_always_rejected() {
    let fixture = Fixture::new();
    let mut manager = fixture.manager();
    manager.load_installed().await.unwrap();
    import_all(&mut manager, &fixture, &[package("hats", "2.0.0")]).await;

    let err = manager
        .import(&fixture.archive(&package("hats", "1.9.9")))
        .await
        .unwrap_err();

    assert!(matches!(mod_error(&err), ModError::Downgrade { .. }));
    assert_eq!(manager.package("hats").unwrap().version().to_string(), "2.0.0");
}

#[test_log::test(tokio::test)]
async fn test_cyclic_dependencies_are_detected_before_copying() {
    let fixture = Fixture::new();
    let mut manager = fixture.manager();
    manager.load_installed().await.unwrap();
    import_all(
        &mut manager,
        &fixture,
        &[
            depending_on(with_mod_file(package("a", "1.0.0"), "liba.so"), "b", "*", None),
            depending_on(with_mod_file(package("b", "1.0.0"), "libb.so"), "c", "*", None),
            depending_on(with_mod_file(package("c", "1.0.0"), "libc.so"), "a", "*", None),
        ],
    )
    .await;

    let err = manager.install("a").await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "Recursive dependency detected: a depends on b depends on c depends on a"
    );
    for file in ["liba.so", "libb.so", "libc.so"] {
        assert!(!fixture.mod_file(file).exists());
    }
    assert!(manager.registry().all().all(|p| !p.is_installed()));
}

#[test_log::test(tokio::test)]
async fn test_missing_dependency_is_downloaded_and_installed() {
    let mut server = mockito::Server::new_async().await;
    let fetched = server
        .mock("GET", "/shared.qmod")
        .with_status(200)
        .with_body(archive_bytes(&library("shared", "1.2.0", "libshared.so")))
        .expect(1)
        .create_async()
        .await;

    let fixture = Fixture::new();
    let mut manager = fixture.manager();
    manager.load_installed().await.unwrap();
    let url = format!("{}/shared.qmod", server.url());
    import_all(
        &mut manager,
        &fixture,
        &[depending_on(with_mod_file(package("hats", "1.0.0"), "libhats.so"), "shared", "^1.0.0", Some(&url))],
    )
    .await;

    manager.install("hats").await.unwrap();

    fetched.assert_async().await;
    assert!(is_installed(&manager, "hats"));
    assert!(is_installed(&manager, "shared"));
    assert!(fixture.lib_file("libshared.so").exists());
    assert!(fixture.mod_file("libhats.so").exists());
}

#[test_log::test(tokio::test)]
async fn test_download_of_wrong_package_is_cleaned_up() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("GET", "/shared.qmod")
        .with_status(200)
        .with_body(archive_bytes(&library("impostor", "1.0.0", "libimpostor.so")))
        .create_async()
        .await;

    let fixture = Fixture::new();
    let mut manager = fixture.manager();
    manager.load_installed().await.unwrap();
    let url = format!("{}/shared.qmod", server.url());
    import_all(
        &mut manager,
        &fixture,
        &[depending_on(package("hats", "1.0.0"), "shared", "*", Some(&url))],
    )
    .await;

    let err = manager.install("hats").await.unwrap_err();

    match mod_error(&err) {
        ModError::FetchedWrongId { expected, actual } => {
            assert_eq!(expected, "shared");
            assert_eq!(actual, "impostor");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!manager.registry().contains("impostor"));
    assert!(!fixture.extract_dir("impostor").exists());
    assert!(!fixture.lib_file("libimpostor.so").exists());
    assert!(!is_installed(&manager, "hats"));
}

#[test_log::test(tokio::test)]
async fn test_incompatible_dependency_is_upgraded_in_place() {
    let mut server = mockito::Server::new_async().await;
    let fetched = server
        .mock("GET", "/shared-2.qmod")
        .with_status(200)
        .with_body(archive_bytes(&library("shared", "2.0.0", "libshared.so")))
        .expect(1)
        .create_async()
        .await;

    let fixture = Fixture::new();
    let mut manager = fixture.manager();
    manager.load_installed().await.unwrap();
    import_all(&mut manager, &fixture, &[library("shared", "1.0.0", "libshared.so")]).await;
    manager.install("shared").await.unwrap();

    let url = format!("{}/shared-2.qmod", server.url());
    import_all(
        &mut manager,
        &fixture,
        &[depending_on(package("hats", "1.0.0"), "shared", "^2.0", Some(&url))],
    )
    .await;

    manager.install("hats").await.unwrap();

    fetched.assert_async().await;
    assert_eq!(manager.package("shared").unwrap().version().to_string(), "2.0.0");
    assert!(is_installed(&manager, "shared"));
    assert!(is_installed(&manager, "hats"));
    assert_eq!(manager.registry().len(), 2);
    assert_eq!(fixture.saved_manifest("shared")["version"], json!("2.0.0"));
    assert!(fixture.lib_file("libshared.so").exists());
}

#[test_log::test(tokio::test)]
async fn test_download_outside_required_range_is_cleaned_up() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("GET", "/shared.qmod")
        .with_status(200)
        .with_body(archive_bytes(&library("shared", "1.0.0", "libshared.so")))
        .create_async()
        .await;

    let fixture = Fixture::new();
    let mut manager = fixture.manager();
    manager.load_installed().await.unwrap();
    let url = format!("{}/shared.qmod", server.url());
    import_all(
        &mut manager,
        &fixture,
        &[depending_on(package("hats", "1.0.0"), "shared", "^2.0.0", Some(&url))],
    )
    .await;

    let err = manager.install("hats").await.unwrap_err();

    match mod_error(&err) {
        ModError::FetchedWrongVersion { id, version, range } => {
            assert_eq!(id, "shared");
            assert_eq!(version, "1.0.0");
            assert_eq!(range, "^2.0.0");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!manager.registry().contains("shared"));
    assert!(!fixture.extract_dir("shared").exists());
    assert!(!fixture.lib_file("libshared.so").exists());
    assert!(!is_installed(&manager, "hats"));
}

#[test_log::test(tokio::test)]
async fn test_reimporting_same_version_replaces_package() {
    let fixture = Fixture::new();
    let mut manager = fixture.manager();
    manager.load_installed().await.unwrap();
    let hats = with_mod_file(package("hats", "1.0.0"), "libhats.so");
    import_all(&mut manager, &fixture, &[hats.clone()]).await;
    manager.install("hats").await.unwrap();

    let id = manager.import(&fixture.archive(&hats)).await.unwrap();

    assert_eq!(id, "hats");
    assert_eq!(manager.registry().len(), 1);
    assert_eq!(manager.package("hats").unwrap().version().to_string(), "1.0.0");
    assert!(!is_installed(&manager, "hats"));
    assert!(!fixture.mod_file("libhats.so").exists());
    assert!(fixture.extract_dir("hats").join("mod.json").exists());
}

#[test_log::test(tokio::test)]
async fn test_startup_load_corrects_externally_removed_files() {
    let fixture = Fixture::new();
    {
        let mut manager = fixture.manager();
        manager.load_installed().await.unwrap();
        import_all(
            &mut manager,
            &fixture,
            &[
                library("shared", "1.0.0", "libshared.so"),
                depending_on(with_mod_file(package("hats", "1.0.0"), "libhats.so"), "shared", "*", None),
            ],
        )
        .await;
        manager.install("hats").await.unwrap();
    }

    std::fs::remove_file(fixture.lib_file("libshared.so")).unwrap();

    let mut manager = fixture.manager();
    assert_eq!(manager.load_installed().await.unwrap(), 2);

    assert!(is_installed(&manager, "hats"));
    assert!(!is_installed(&manager, "shared"));
    assert_eq!(fixture.saved_manifest("shared")["isInstalled"], json!(false));
    assert_eq!(fixture.saved_manifest("hats")["isInstalled"], json!(true));
}

#[test_log::test(tokio::test)]
async fn test_delete_collects_libraries_nothing_needs() {
    let fixture = Fixture::new();
    let mut manager = fixture.manager();
    manager.load_installed().await.unwrap();
    import_all(
        &mut manager,
        &fixture,
        &[
            library("bottom", "1.0.0", "libbottom.so"),
            depending_on(library("middle", "1.0.0", "libmiddle.so"), "bottom", "*", None),
            depending_on(with_mod_file(package("hats", "1.0.0"), "libhats.so"), "middle", "*", None),
        ],
    )
    .await;
    manager.install("hats").await.unwrap();
    assert!(is_installed(&manager, "bottom"));

    manager.delete("hats").await.unwrap();

    assert!(manager.registry().is_empty());
    for id in ["hats", "middle", "bottom"] {
        assert!(!fixture.extract_dir(id).exists());
    }
    assert!(!fixture.lib_file("libbottom.so").exists());
    assert!(!fixture.lib_file("libmiddle.so").exists());
}

#[test_log::test(tokio::test)]
async fn test_archive_missing_a_declared_file_is_rejected() {
    let fixture = Fixture::new();
    let mut manager = fixture.manager();

    let manifest = with_mod_file(package("hats", "1.0.0"), "libhats.so");
    let path = fixture.dir.path().join("broken.qmod");
    let mut zip = ZipWriter::new(std::fs::File::create(&path).unwrap());
    zip.start_file("mod.json", FileOptions::<()>::default())
        .unwrap();
    zip.write_all(manifest.to_string().as_bytes()).unwrap();
    zip.finish().unwrap();

    let err = manager.import(&path).await.unwrap_err();
    assert!(matches!(
        mod_error(&err),
        ModError::MissingArchiveFile { path, .. } if path == "libhats.so"
    ));
    assert!(!fixture.extract_dir("hats").exists());
}

fn modkeeper(device_root: &Path) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("modkeeper"));
    cmd.arg("--app")
        .arg(APP)
        .arg("--device-root")
        .arg(device_root);
    cmd
}

#[test]
fn test_end_to_end_import_install_list() {
    let fixture = Fixture::new();
    let archive = fixture.archive(&with_mod_file(package("hats", "1.0.0"), "libhats.so"));

    modkeeper(&fixture.device_root())
        .arg("import")
        .arg(&archive)
        .assert()
        .success()
        .stdout(predicate::str::contains("imported hats v1.0.0"));

    modkeeper(&fixture.device_root())
        .arg("install")
        .arg("hats")
        .assert()
        .success();

    modkeeper(&fixture.device_root())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("hats 1.0.0 (installed)"));

    assert!(fixture.mod_file("libhats.so").exists());
}

#[test]
fn test_end_to_end_unknown_mod_fails() {
    let fixture = Fixture::new();

    modkeeper(&fixture.device_root())
        .arg("install")
        .arg("missing")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No package with ID missing is loaded"));
}

#[test]
fn test_end_to_end_requires_application() {
    let fixture = Fixture::new();

    Command::new(cargo::cargo_bin!("modkeeper"))
        .env_remove("MODKEEPER_APP")
        .arg("--device-root")
        .arg(fixture.device_root())
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No application selected"));
}
