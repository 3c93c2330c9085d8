//! Fixtures shared by the capsule integration tests and the CLI tests.
//!
//! The fixture runtime uses `/bin/sh` as its interpreter (symlinked into the
//! runtime rootfs), so images built from it run anywhere without root.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use capsule::{CapsuleOptions, CapsuleRuntime};
use tempfile::TempDir;

/// Reference of the fixture runtime once imported.
pub const SHELL_RUNTIME: &str = "shell:1.0";

/// Image-absolute site-packages directory of the fixture runtime.
pub const SITE_PACKAGES: &str = "/lib/site-packages";

/// Application used by most contexts.
///
/// Prints its argument count, each argument, its cwd and `GREETING`, then
/// optionally kills itself with `$SIGNAL` and exits with `$EXIT_CODE`.
/// Output goes to `$OUT_FILE` when set.
pub const APP_SCRIPT: &str = r#"if [ -n "$OUT_FILE" ]; then exec > "$OUT_FILE"; fi
echo "argc=$#"
for arg in "$@"; do echo "arg=$arg"; done
echo "cwd=$(pwd)"
echo "greeting=${GREETING:-}"
if [ -n "$SIGNAL" ]; then kill -"$SIGNAL" $$; fi
exit "${EXIT_CODE:-0}"
"#;

// ============================================================================
// HOME
// ============================================================================

/// A temporary capsule home.
pub struct TestHome {
    dir: TempDir,
}

impl TestHome {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp home"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn options(&self) -> CapsuleOptions {
        CapsuleOptions {
            home_dir: self.dir.path().to_path_buf(),
        }
    }

    pub fn runtime(&self) -> CapsuleRuntime {
        CapsuleRuntime::new(self.options()).expect("create runtime")
    }

    /// Runtime with the fixture base runtime imported as [`SHELL_RUNTIME`].
    pub fn runtime_with_shell(&self) -> CapsuleRuntime {
        let runtime = self.runtime();
        let source = TempDir::new().expect("create runtime source");
        write_shell_runtime(source.path());
        runtime
            .import_runtime(SHELL_RUNTIME, source.path())
            .expect("import fixture runtime");
        runtime
    }
}

impl Default for TestHome {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// BASE RUNTIME
// ============================================================================

/// Write a prepared runtime directory (`runtime.json`, `rootfs/`,
/// `packages/`) into `dir`.
///
/// Package index:
/// - `greet` 1.0, 1.1, 2.0rc1
/// - `colors` 0.9 (ships `shared/util.py`)
/// - `clash` 1.0 (also ships `shared/util.py`)
pub fn write_shell_runtime(dir: &Path) {
    fs::create_dir_all(dir.join("rootfs/bin")).expect("create rootfs");
    std::os::unix::fs::symlink("/bin/sh", dir.join("rootfs/bin/sh")).expect("link interpreter");
    fs::create_dir_all(dir.join("rootfs/etc")).expect("create etc");
    fs::write(dir.join("rootfs/etc/os-release"), "NAME=capsule-fixture\n").expect("write etc");

    fs::write(
        dir.join("runtime.json"),
        format!(
            r#"{{
  "interpreter": "/bin/sh",
  "site_packages": "{SITE_PACKAGES}",
  "env": ["GREETING=from-runtime", "PATH=/usr/bin:/bin"]
}}"#
        ),
    )
    .expect("write runtime.json");

    for version in ["1.0", "1.1", "2.0rc1"] {
        write_package(dir, "greet", version, &[("greet/__init__.py", version)]);
    }
    write_package(
        dir,
        "colors",
        "0.9",
        &[("colors/__init__.py", "red"), ("shared/util.py", "colors")],
    );
    write_package(
        dir,
        "clash",
        "1.0",
        &[("clash/__init__.py", ""), ("shared/util.py", "clash")],
    );
}

fn write_package(dir: &Path, name: &str, version: &str, files: &[(&str, &str)]) {
    let root = dir.join("packages").join(name).join(version);
    for (path, content) in files {
        let path = root.join(path);
        fs::create_dir_all(path.parent().expect("package file parent")).expect("create package");
        fs::write(path, content).expect("write package file");
    }
}

// ============================================================================
// BUILD CONTEXT
// ============================================================================

/// Builder for temporary build contexts.
pub struct ContextBuilder {
    files: Vec<(PathBuf, String, u32)>,
    recipe: String,
}

impl ContextBuilder {
    /// Context with `main.sh` running [`APP_SCRIPT`] on [`SHELL_RUNTIME`].
    pub fn new() -> Self {
        Self {
            files: vec![(PathBuf::from("main.sh"), APP_SCRIPT.to_string(), 0o755)],
            recipe: format!("base: {SHELL_RUNTIME}\nentrypoint: main.sh\n"),
        }
    }

    /// Replace the whole recipe.
    pub fn recipe(mut self, recipe: &str) -> Self {
        self.recipe = recipe.to_string();
        self
    }

    /// Append lines to the recipe.
    pub fn recipe_lines(mut self, lines: &str) -> Self {
        self.recipe.push_str(lines);
        if !lines.ends_with('\n') {
            self.recipe.push('\n');
        }
        self
    }

    pub fn file(mut self, path: &str, content: &str) -> Self {
        self.files.push((PathBuf::from(path), content.to_string(), 0o644));
        self
    }

    pub fn requirements(self, content: &str) -> Self {
        self.file("requirements.txt", content)
    }

    pub fn without(mut self, path: &str) -> Self {
        self.files.retain(|(p, _, _)| p != Path::new(path));
        self
    }

    pub fn build(self) -> TempDir {
        let dir = TempDir::new().expect("create context");
        for (path, content, mode) in &self.files {
            let path = dir.path().join(path);
            fs::create_dir_all(path.parent().expect("context file parent")).expect("create dir");
            fs::write(&path, content).expect("write context file");
            fs::set_permissions(&path, fs::Permissions::from_mode(*mode)).expect("chmod");
        }
        fs::write(dir.path().join("capsule.yaml"), &self.recipe).expect("write recipe");
        dir
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
