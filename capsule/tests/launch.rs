//! Integration tests for launching built images.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use capsule::{BuildOptions, CapsuleError, CapsuleRuntime, Image, LaunchOptions};
use capsule_test_utils::{ContextBuilder, TestHome};
use tempfile::TempDir;

struct TestContext {
    runtime: CapsuleRuntime,
    image: Image,
    out_dir: TempDir,
    _home: TestHome,
}

impl TestContext {
    fn new() -> Self {
        Self::with_context(ContextBuilder::new())
    }

    fn with_context(builder: ContextBuilder) -> Self {
        let home = TestHome::new();
        let runtime = home.runtime_with_shell();
        let context = builder.build();
        let image = runtime
            .build_dir(context.path(), None, BuildOptions::default())
            .unwrap()
            .image;
        Self {
            runtime,
            image,
            out_dir: TempDir::new().unwrap(),
            _home: home,
        }
    }

    fn out_file(&self) -> PathBuf {
        self.out_dir.path().join("out.txt")
    }

    fn options(&self, extra: &[&str]) -> LaunchOptions {
        let out = format!("OUT_FILE={}", self.out_file().display());
        LaunchOptions::default()
            .with_env_pairs(std::iter::once(out.as_str()).chain(extra.iter().copied()))
            .unwrap()
    }

    async fn run(&self, args: &[&str], extra_env: &[&str]) -> (i32, Vec<String>) {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let outcome = self
            .runtime
            .launch(self.image.id().as_str(), &args, self.options(extra_env))
            .await
            .unwrap();
        let output = std::fs::read_to_string(self.out_file()).unwrap_or_default();
        (
            outcome.exit_code,
            output.lines().map(str::to_string).collect(),
        )
    }
}

fn value<'a>(lines: &'a [String], key: &str) -> Option<&'a str> {
    let prefix = format!("{key}=");
    lines.iter().find_map(|line| line.strip_prefix(prefix.as_str()))
}

// ============================================================================
// ARGUMENTS AND ENVIRONMENT
// ============================================================================

#[tokio::test]
async fn launch_without_args_passes_none() {
    let ctx = TestContext::new();
    let (code, lines) = ctx.run(&[], &[]).await;

    assert_eq!(code, 0);
    assert_eq!(value(&lines, "argc"), Some("0"));
    assert!(value(&lines, "arg").is_none());
}

#[tokio::test]
async fn launch_passes_args_verbatim_in_order() {
    let ctx = TestContext::new();
    let (code, lines) = ctx.run(&["--flag", "x", "two words", ""], &[]).await;

    assert_eq!(code, 0);
    assert_eq!(value(&lines, "argc"), Some("4"));
    let args: Vec<&str> = lines
        .iter()
        .filter_map(|line| line.strip_prefix("arg="))
        .collect();
    assert_eq!(args, vec!["--flag", "x", "two words", ""]);
}

#[tokio::test]
async fn launch_runs_in_private_instance_workdir() {
    let ctx = TestContext::new();
    let (_, lines) = ctx.run(&[], &[]).await;

    let scratch = ctx.runtime.layout().temp_dir().canonicalize().unwrap();
    let cwd = Path::new(value(&lines, "cwd").unwrap());
    assert!(cwd.starts_with(&scratch), "{}", cwd.display());
    assert!(cwd.ends_with("rootfs/app"));
    let instance = cwd.strip_prefix(&scratch).unwrap();
    assert!(instance.to_string_lossy().starts_with("instance-"));

    // the instance copy is gone once the process exits
    assert!(!cwd.exists());
}

#[tokio::test]
async fn env_precedence_runtime_recipe_override() {
    let ctx = TestContext::new();
    let (_, lines) = ctx.run(&[], &[]).await;
    assert_eq!(value(&lines, "greeting"), Some("from-runtime"));

    let ctx = TestContext::with_context(
        ContextBuilder::new().recipe_lines("env:\n  GREETING: from-recipe\n"),
    );
    let (_, lines) = ctx.run(&[], &[]).await;
    assert_eq!(value(&lines, "greeting"), Some("from-recipe"));

    let (_, lines) = ctx.run(&[], &["GREETING=from-cli"]).await;
    assert_eq!(value(&lines, "greeting"), Some("from-cli"));
}

#[tokio::test]
async fn launch_by_tag_and_prefix() {
    let home = TestHome::new();
    let runtime = home.runtime_with_shell();
    let context = ContextBuilder::new().build();
    let image = runtime
        .build_dir(
            context.path(),
            None,
            BuildOptions {
                tag: Some("bot".into()),
            },
        )
        .unwrap()
        .image;

    for reference in ["bot", "bot:latest", image.id().short(), image.id().as_str()] {
        let options = LaunchOptions::default()
            .with_env_pairs(["OUT_FILE=/dev/null"])
            .unwrap();
        let outcome = runtime.launch(reference, &[], options).await.unwrap();
        assert_eq!(&outcome.image_id, image.id());
        assert_eq!(outcome.exit_code, 0);
    }
}

// ============================================================================
// INSTANCE ISOLATION
// ============================================================================

const STATEFUL_APP: &str = r#"if [ -f state.txt ]; then exit 7; fi
echo written > state.txt
"#;

#[tokio::test]
async fn instances_do_not_share_written_files() {
    let ctx = TestContext::with_context(ContextBuilder::new().file("main.sh", STATEFUL_APP));

    let (first, _) = ctx.run(&[], &[]).await;
    let (second, _) = ctx.run(&[], &[]).await;

    assert_eq!(first, 0);
    assert_eq!(second, 0);
    assert!(!ctx.image.rootfs_dir().join("app/state.txt").exists());
}

#[tokio::test]
async fn instance_can_rewrite_shipped_files() {
    let app = "echo updated > data.json\n[ \"$(cat data.json)\" = updated ]\n";
    let ctx = TestContext::with_context(
        ContextBuilder::new()
            .file("main.sh", app)
            .file("data.json", "{}"),
    );

    let (code, _) = ctx.run(&[], &[]).await;
    assert_eq!(code, 0);
    assert_eq!(
        std::fs::read_to_string(ctx.image.rootfs_dir().join("app/data.json")).unwrap(),
        "{}"
    );
}

#[tokio::test]
async fn committed_image_files_are_read_only() {
    let ctx = TestContext::new();
    let mode = std::fs::metadata(ctx.image.rootfs_dir().join("app/main.sh"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o222, 0);
}

// ============================================================================
// EXIT CODES
// ============================================================================

#[tokio::test]
async fn exit_codes_propagate_verbatim() {
    let ctx = TestContext::new();
    for code in 0..=255 {
        let (actual, _) = ctx.run(&[], &[&format!("EXIT_CODE={code}")]).await;
        assert_eq!(actual, code);
    }
}

#[tokio::test]
async fn killed_process_reports_signal() {
    let ctx = TestContext::new();
    let args: Vec<String> = Vec::new();
    let outcome = ctx
        .runtime
        .launch(ctx.image.id().as_str(), &args, ctx.options(&["SIGNAL=TERM"]))
        .await
        .unwrap();

    assert_eq!(outcome.signal, Some(15));
    assert_eq!(outcome.exit_code, 143);
}

// ============================================================================
// FAILURES
// ============================================================================

#[tokio::test]
async fn missing_app_file_is_entrypoint_missing() {
    let ctx = TestContext::new();
    std::fs::remove_file(ctx.image.rootfs_dir().join("app/main.sh")).unwrap();

    let err = ctx
        .runtime
        .launch(ctx.image.id().as_str(), &[], ctx.options(&[]))
        .await
        .unwrap_err();
    assert!(matches!(err, CapsuleError::EntrypointMissing(_)), "{err}");
    assert_eq!(err.exit_code(), 127);
    assert!(!ctx.out_file().exists());
}

#[tokio::test]
async fn missing_interpreter_is_entrypoint_missing() {
    let ctx = TestContext::new();
    std::fs::remove_file(ctx.image.rootfs_dir().join("bin/sh")).unwrap();

    let err = ctx
        .runtime
        .launch(ctx.image.id().as_str(), &[], ctx.options(&[]))
        .await
        .unwrap_err();
    assert!(matches!(err, CapsuleError::EntrypointMissing(_)));
}

#[tokio::test]
async fn unknown_reference_is_image_not_found() {
    let home = TestHome::new();
    let runtime = home.runtime_with_shell();

    let err = runtime
        .launch("nothing:here", &[], LaunchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CapsuleError::ImageNotFound(_)));
    assert_eq!(err.exit_code(), 125);
}
