use capsule_test_utils::ContextBuilder;
use predicates::prelude::*;
use rstest::rstest;

mod common;

#[test]
fn test_run_without_args() {
    let ctx = common::capsule();
    let id = ctx.build_default(None);

    ctx.new_cmd()
        .args(["run", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("argc=0\n"))
        .stdout(predicate::str::contains("arg=").not());
}

#[test]
fn test_run_passes_hyphen_args_verbatim() {
    let ctx = common::capsule();
    ctx.build_default(Some("bot"));

    ctx.new_cmd()
        .args(["run", "bot", "--flag", "x"])
        .assert()
        .success()
        .stdout(predicate::str::contains("argc=2\narg=--flag\narg=x\n"));
}

#[test]
fn test_run_env_override() {
    let ctx = common::capsule();
    ctx.build_default(Some("bot"));

    ctx.new_cmd()
        .args(["run", "bot"])
        .assert()
        .success()
        .stdout(predicate::str::contains("greeting=from-runtime"));

    ctx.new_cmd()
        .args(["run", "-e", "GREETING=hi", "bot", "-x", "-e", "ignored=1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("greeting=hi"))
        .stdout(predicate::str::contains("arg=-x\narg=-e\narg=ignored=1\n"));
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(2)]
#[case(42)]
#[case(125)]
#[case(127)]
#[case(128)]
#[case(254)]
#[case(255)]
fn test_run_propagates_exit_code(#[case] code: i32) {
    let ctx = common::capsule();
    ctx.build_default(Some("bot"));

    ctx.new_cmd()
        .args(["run", "-e", &format!("EXIT_CODE={code}"), "bot"])
        .assert()
        .code(code);
}

#[test]
fn test_run_killed_by_signal() {
    let ctx = common::capsule();
    ctx.build_default(Some("bot"));

    ctx.new_cmd()
        .args(["run", "-e", "SIGNAL=KILL", "bot"])
        .assert()
        .code(137);
}

#[test]
fn test_run_missing_entrypoint() {
    let ctx = common::capsule();
    let id = ctx.build_default(None);
    let image = ctx.home.runtime().inspect(&id).unwrap();
    std::fs::remove_file(image.rootfs_dir().join("app/main.sh")).unwrap();

    ctx.new_cmd()
        .args(["run", &id])
        .assert()
        .code(127)
        .stderr(predicate::str::contains("entrypoint missing"));
}

#[test]
fn test_run_unknown_image() {
    let mut ctx = common::capsule();
    ctx.cmd
        .args(["run", "ghost:1"])
        .assert()
        .code(125)
        .stderr(predicate::str::contains("image not found"));
}

#[test]
fn test_run_rejects_malformed_env() {
    let ctx = common::capsule();
    ctx.build_default(Some("bot"));

    ctx.new_cmd()
        .args(["run", "-e", "NOVALUE", "bot"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("KEY=VALUE"));
}

#[test]
fn test_run_in_workdir_with_installed_package() {
    let ctx = common::capsule();
    let context = ContextBuilder::new()
        .file(
            "main.sh",
            "[ -f \"$PYTHONPATH/greet/__init__.py\" ] && echo installed\npwd\n",
        )
        .recipe_lines("env:\n  PYTHONPATH: ../lib/site-packages")
        .requirements("greet==1.0\n")
        .build();
    let id = ctx.build(&context, None);

    ctx.new_cmd()
        .args(["run", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("installed"))
        .stdout(predicate::str::contains("/rootfs/app\n"));
}
