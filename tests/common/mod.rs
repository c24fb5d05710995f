#![allow(dead_code)]

use async_trait::async_trait;
use jarvis::config::Config;
use jarvis::context::{Engines, ToolContext};
use jarvis::error::ToolError;
use jarvis::exec::{CommandOutput, CommandRunner, CommandSpec, Launcher};
use jarvis::platform::Platform;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

type Script = Box<dyn Fn(&CommandSpec) -> Result<CommandOutput, ToolError> + Send + Sync>;

/// Records every command and answers from a script instead of the host.
pub struct ScriptedRunner {
    script: Script,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub fn new<F>(script: F) -> Arc<Self>
    where
        F: Fn(&CommandSpec) -> Result<CommandOutput, ToolError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Always exits with `code` and prints `stdout`.
    pub fn exiting(code: i32, stdout: &str) -> Arc<Self> {
        let stdout = stdout.to_string();
        Self::new(move |_| Ok(output(code, &stdout)))
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, ToolError> {
        self.calls.lock().unwrap().push(spec.clone());
        (self.script)(&spec)
    }
}

pub fn output(code: i32, stdout: &str) -> CommandOutput {
    CommandOutput {
        exit_code: Some(code),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

/// Remembers what would have been opened or launched.
#[derive(Default)]
pub struct RecordingLauncher {
    opened: Mutex<Vec<String>>,
    spawned: Mutex<Vec<(PathBuf, Vec<String>)>>,
}

impl RecordingLauncher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn spawned(&self) -> Vec<(PathBuf, Vec<String>)> {
        self.spawned.lock().unwrap().clone()
    }
}

impl Launcher for RecordingLauncher {
    fn open(&self, target: &str) -> Result<(), ToolError> {
        self.opened.lock().unwrap().push(target.to_string());
        Ok(())
    }

    fn spawn(&self, program: &Path, args: &[String]) -> Result<(), ToolError> {
        self.spawned.lock().unwrap().push((program.to_path_buf(), args.to_vec()));
        Ok(())
    }
}

/// Config whose default locations all live under `root`.
pub fn sandbox_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.paths.default_folder = root.join("NewFolder_Jarvis");
    config.paths.documents_dir = root.join("Documents");
    config.paths.videos_dir = root.join("Videos");
    config.paths.photos_dir = root.join("Pictures").join("JarvisPhotos");
    config
}

/// A context that can never touch the host: no engines, scripted runner,
/// recording launcher.
pub fn sandbox_context(
    root: &Path,
    platform: Platform,
    runner: Arc<ScriptedRunner>,
    launcher: Arc<RecordingLauncher>,
) -> Arc<ToolContext> {
    Arc::new(
        ToolContext::bare(sandbox_config(root))
            .with_platform(platform)
            .with_engines(Engines::none())
            .with_runner(runner)
            .with_launcher(launcher),
    )
}

/// Sandbox context whose commands all succeed silently.
pub fn quiet_context(root: &Path, platform: Platform) -> Arc<ToolContext> {
    sandbox_context(root, platform, ScriptedRunner::exiting(0, ""), RecordingLauncher::new())
}

/// Sandbox context that records launches; commands succeed silently.
pub fn launcher_context(
    root: &Path,
    platform: Platform,
    launcher: Arc<RecordingLauncher>,
) -> Arc<ToolContext> {
    sandbox_context(root, platform, ScriptedRunner::exiting(0, ""), launcher)
}

/// Sandbox context answering commands from `runner`.
pub fn runner_context(
    root: &Path,
    platform: Platform,
    runner: Arc<ScriptedRunner>,
) -> Arc<ToolContext> {
    sandbox_context(root, platform, runner, RecordingLauncher::new())
}
