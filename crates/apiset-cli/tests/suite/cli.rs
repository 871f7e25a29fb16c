use apiset_classfile::{ClassFile, ConstValue, ElementValue};
use apiset_test_utils::{write_class_dir, write_jar, ClassFixture};
use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

const ACC_PUBLIC: u16 = 0x0001;
const ACC_STATIC: u16 = 0x0008;

fn apiset(temp: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("apiset"));
    cmd.current_dir(temp.path())
        .env_remove("APISET_CONFIG")
        .env("RUST_LOG", "off");
    cmd
}

/// Version 1 ships a class directory, version 2 a jar.
fn two_versions(temp: &TempDir) -> (String, String) {
    let v1 = temp.child("v1");
    write_class_dir(
        v1.path(),
        &[
            ClassFixture::class("p/A").method(ACC_PUBLIC, "f", "()V").build(),
            ClassFixture::class("p/Old").build(),
        ],
    )
    .unwrap();
    let v2 = temp.child("v2.jar");
    write_jar(
        v2.path(),
        &[
            ClassFixture::class("p/A")
                .method(ACC_PUBLIC, "f", "()V")
                .method(ACC_PUBLIC | ACC_STATIC, "g", "()V")
                .build(),
            ClassFixture::class("q/New").build(),
        ],
    )
    .unwrap();
    (
        format!("1={}", v1.path().display()),
        format!("2={}", v2.path().display()),
    )
}

fn exists_in(class: &ClassFile) -> Option<String> {
    let annotation = class
        .annotations()
        .find(|a| a.type_descriptor == "Lapiset/annotations/ExistsIn;")?;
    match annotation.element("version")? {
        ElementValue::Const(ConstValue::String(value)) => Some(value.clone()),
        _ => None,
    }
}

#[test]
fn generate_writes_one_class_per_superset_entry() {
    let temp = TempDir::new().unwrap();
    let (v1, v2) = two_versions(&temp);
    let out = temp.child("out");

    apiset(&temp)
        .args(["generate", "--root", &v1, "--root", &v2, "--out"])
        .arg(out.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("classes: 3"))
        .stdout(predicate::str::contains("wrote 3 classes"));

    out.child("p/A.class").assert(predicate::path::is_file());
    out.child("p/Old.class").assert(predicate::path::is_file());
    out.child("q/New.class").assert(predicate::path::is_file());

    let a = ClassFile::parse(&std::fs::read(out.child("p/A.class").path()).unwrap()).unwrap();
    assert_eq!(exists_in(&a).as_deref(), Some("1, 2"));
    let old = ClassFile::parse(&std::fs::read(out.child("p/Old.class").path()).unwrap()).unwrap();
    assert_eq!(exists_in(&old).as_deref(), Some("1"));
}

#[test]
fn stats_json_reports_roots_and_scopes() {
    let temp = TempDir::new().unwrap();
    let (v1, v2) = two_versions(&temp);

    let output = apiset(&temp)
        .args(["stats", "--json", "--root", &v1, "--root", &v2])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["classes"], 3);
    assert_eq!(json["roots"][0]["version"], "1");
    assert_eq!(json["roots"][0]["decoded"], 2);
    assert_eq!(json["roots"][1]["decoded"], 2);
    // The jar manifest is not a class and is never counted.
    assert_eq!(json["roots"][1]["skipped"], 0);
    assert_eq!(json["statistics"]["scopes"]["classes"]["success"], 1);
    assert_eq!(json["statistics"]["scopes"]["methods"]["success"], 1);
}

#[test]
fn dump_lists_filtered_classes() {
    let temp = TempDir::new().unwrap();
    let (v1, v2) = two_versions(&temp);

    apiset(&temp)
        .args(["dump", "--filter", "p/A", "--root", &v1, "--root", &v2])
        .assert()
        .success()
        .stdout(predicate::str::contains("[1, 2] public class p/A"))
        .stdout(predicate::str::contains("[2] public static method g()V"))
        .stdout(predicate::str::contains("q/New").not());
}

#[test]
fn undecodable_classes_fail_the_run_past_the_limit() {
    let temp = TempDir::new().unwrap();
    let (v1, v2) = two_versions(&temp);
    temp.child("v1/p/Broken.class").write_binary(b"not a class").unwrap();
    temp.child("apiset.toml")
        .write_str("[run]\nmax_decode_failures = 1\n")
        .unwrap();

    apiset(&temp)
        .args(["stats", "--root", &v1, "--root", &v2])
        .assert()
        .success();

    temp.child("v1/p/Broken2.class").write_binary(b"still not").unwrap();
    apiset(&temp)
        .args(["stats", "--root", &v1, "--root", &v2])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("2 class files failed to decode"));
}

#[test]
fn missing_root_is_an_error() {
    let temp = TempDir::new().unwrap();

    apiset(&temp)
        .args(["stats", "--root", "1=does-not-exist"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn invalid_config_is_an_error() {
    let temp = TempDir::new().unwrap();
    let (v1, _) = two_versions(&temp);
    temp.child("custom.toml").write_str("[run]\nshards = 0\n").unwrap();

    apiset(&temp)
        .args(["stats", "--config", "custom.toml", "--root", &v1])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("run.shards"));
}

#[test]
fn sharded_and_grouped_runs_agree_on_class_count() {
    let temp = TempDir::new().unwrap();
    let (v1, v2) = two_versions(&temp);
    temp.child("apiset.toml")
        .write_str("[merge]\ngroup_classes = true\n[run]\nshards = 4\n")
        .unwrap();

    apiset(&temp)
        .args(["stats", "--root", &v1, "--root", &v2])
        .assert()
        .success()
        .stdout(predicate::str::contains("classes: 3"));
}
