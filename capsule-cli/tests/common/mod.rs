#![allow(dead_code)]

use assert_cmd::Command;
use std::path::Path;
use std::time::Duration;

use capsule_test_utils::{ContextBuilder, TestHome};
use tempfile::TempDir;

/// One isolated capsule home with the fixture runtime imported.
pub struct TestContext {
    pub cmd: Command,
    pub home: TestHome,
}

impl TestContext {
    /// A fresh command against this context's home
    pub fn new_cmd(&self) -> Command {
        command(self.home.path())
    }

    /// Build `context` and return the printed image id.
    pub fn build(&self, context: &TempDir, tag: Option<&str>) -> String {
        let mut cmd = self.new_cmd();
        cmd.arg("build").arg(context.path());
        if let Some(tag) = tag {
            cmd.args(["--tag", tag]);
        }
        let output = cmd.assert().success().get_output().stdout.clone();
        String::from_utf8(output).unwrap().trim().to_string()
    }

    /// Build the default fixture context.
    pub fn build_default(&self, tag: Option<&str>) -> String {
        let context = ContextBuilder::new().build();
        self.build(&context, tag)
    }
}

fn command(home: &Path) -> Command {
    let bin_path = env!("CARGO_BIN_EXE_capsule");
    let mut cmd = Command::new(bin_path);
    cmd.timeout(Duration::from_secs(60));
    cmd.arg("--home").arg(home);
    cmd.env_remove("CAPSULE_HOME");
    cmd.env_remove("RUST_LOG");
    cmd
}

pub fn capsule() -> TestContext {
    let home = TestHome::new();
    home.runtime_with_shell();
    TestContext {
        cmd: command(home.path()),
        home,
    }
}

/// Home without any base runtime.
pub fn empty_home() -> TestContext {
    let home = TestHome::new();
    TestContext {
        cmd: command(home.path()),
        home,
    }
}
