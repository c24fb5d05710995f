//! Process-wide state handed to every tool handler.
//!
//! Optional engines (OCR, PDF text, camera, screen capture, speech) are
//! detected exactly once when the context is built. A missing engine is not
//! an error at startup; the tools that need it fail per call with a hint.

use crate::config::Config;
use crate::error::ToolError;
use crate::exec::{CommandRunner, CommandSpec, Launcher, SystemLauncher, SystemRunner};
use crate::platform::Platform;
use crate::utils::paths::{find_any_executable, find_executable};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// An optional capability resolved at startup.
#[derive(Debug, Clone)]
pub struct Dependency<T> {
    name: &'static str,
    hint: &'static str,
    resolved: Option<T>,
}

impl<T> Dependency<T> {
    pub fn new(name: &'static str, hint: &'static str, resolved: Option<T>) -> Self {
        Self { name, hint, resolved }
    }

    pub fn missing(name: &'static str, hint: &'static str) -> Self {
        Self::new(name, hint, None)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_available(&self) -> bool {
        self.resolved.is_some()
    }

    pub fn get(&self) -> Option<&T> {
        self.resolved.as_ref()
    }

    pub fn require(&self) -> Result<&T, ToolError> {
        self.resolved
            .as_ref()
            .ok_or(ToolError::DependencyUnavailable {
                dependency: self.name,
                hint: self.hint,
            })
    }
}

const OCR_HINT: &str = "Install Tesseract OCR and put it on PATH, or set JARVIS_TESSERACT.";
const PDF_HINT: &str = "Install poppler-utils (pdftotext), or set JARVIS_PDFTOTEXT.";
const CAMERA_HINT: &str = "Install ffmpeg (or fswebcam / imagesnap) to capture photos.";
const SCREEN_HINT: &str =
    "Install a screenshot tool (gnome-screenshot, scrot, grim or ImageMagick).";
const SPEECH_HINT: &str = "Install a speech engine such as espeak-ng.";

/// How screenshots are taken on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenBackend {
    PowerShell(PathBuf),
    ScreenCapture(PathBuf),
    GnomeScreenshot(PathBuf),
    Grim(PathBuf),
    Scrot(PathBuf),
    Import(PathBuf),
}

impl ScreenBackend {
    fn detect(platform: Platform) -> Option<Self> {
        match platform {
            Platform::Windows => find_any_executable(&["powershell", "pwsh"]).map(Self::PowerShell),
            Platform::MacOs => find_executable("screencapture").map(Self::ScreenCapture),
            Platform::Linux => find_executable("gnome-screenshot")
                .map(Self::GnomeScreenshot)
                .or_else(|| find_executable("grim").map(Self::Grim))
                .or_else(|| find_executable("scrot").map(Self::Scrot))
                .or_else(|| find_executable("import").map(Self::Import)),
        }
    }

    /// Full-screen capture into `output` (PNG).
    pub fn command(&self, output: &Path) -> CommandSpec {
        let out = output.to_string_lossy().to_string();
        match self {
            Self::PowerShell(ps) => {
                let script = format!(
                    "Add-Type -AssemblyName System.Drawing; \
                     Add-Type -AssemblyName System.Windows.Forms; \
                     $b = [System.Windows.Forms.Screen]::PrimaryScreen.Bounds; \
                     $bmp = New-Object System.Drawing.Bitmap $b.Width, $b.Height; \
                     $g = [System.Drawing.Graphics]::FromImage($bmp); \
                     $g.CopyFromScreen($b.X, $b.Y, 0, 0, $bmp.Size); \
                     $bmp.Save('{}'); $g.Dispose(); $bmp.Dispose()",
                    out.replace('\'', "''")
                );
                CommandSpec::new(ps.to_string_lossy()).args(["-NoProfile", "-Command"]).arg(script)
            }
            Self::ScreenCapture(bin) => CommandSpec::new(bin.to_string_lossy())
                .args(["-x", "-t", "png"])
                .arg(out),
            Self::GnomeScreenshot(bin) => {
                CommandSpec::new(bin.to_string_lossy()).arg("-f").arg(out)
            }
            Self::Grim(bin) => CommandSpec::new(bin.to_string_lossy()).arg(out),
            Self::Scrot(bin) => CommandSpec::new(bin.to_string_lossy()).arg("--overwrite").arg(out),
            Self::Import(bin) => CommandSpec::new(bin.to_string_lossy())
                .args(["-window", "root"])
                .arg(out),
        }
    }
}

/// How the camera is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraBackend {
    Ffmpeg(PathBuf),
    Fswebcam(PathBuf),
    Imagesnap(PathBuf),
}

impl CameraBackend {
    fn detect(config: &Config, platform: Platform) -> Option<Self> {
        if let Some(path) = &config.engines.ffmpeg {
            return Some(Self::Ffmpeg(path.clone()));
        }
        find_executable("ffmpeg").map(Self::Ffmpeg).or_else(|| match platform {
            Platform::Linux => find_executable("fswebcam").map(Self::Fswebcam),
            Platform::MacOs => find_executable("imagesnap").map(Self::Imagesnap),
            Platform::Windows => None,
        })
    }

    /// Grabs a single frame from camera `index` into `output` (JPEG).
    pub fn command(&self, platform: Platform, index: u32, output: &Path) -> CommandSpec {
        let out = output.to_string_lossy().to_string();
        match self {
            Self::Ffmpeg(bin) => {
                let (format, device) = match platform {
                    Platform::Windows => ("vfwcap", index.to_string()),
                    Platform::MacOs => ("avfoundation", index.to_string()),
                    Platform::Linux => ("v4l2", format!("/dev/video{}", index)),
                };
                CommandSpec::new(bin.to_string_lossy())
                    .args(["-hide_banner", "-loglevel", "error", "-f", format, "-i"])
                    .arg(device)
                    .args(["-frames:v", "1", "-y"])
                    .arg(out)
            }
            Self::Fswebcam(bin) => CommandSpec::new(bin.to_string_lossy())
                .arg("-d")
                .arg(format!("/dev/video{}", index))
                .args(["--no-banner", "-r", "1280x720"])
                .arg(out),
            Self::Imagesnap(bin) => {
                let mut spec = CommandSpec::new(bin.to_string_lossy()).arg("-q");
                if index > 0 {
                    spec = spec.arg("-d").arg(index.to_string());
                }
                spec.arg(out)
            }
        }
    }
}

/// Text-to-speech engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechBackend {
    PowerShell(PathBuf),
    Say(PathBuf),
    EspeakNg(PathBuf),
    Espeak(PathBuf),
    SpdSay(PathBuf),
}

impl SpeechBackend {
    fn detect(platform: Platform) -> Option<Self> {
        match platform {
            Platform::Windows => find_any_executable(&["powershell", "pwsh"]).map(Self::PowerShell),
            Platform::MacOs => find_executable("say").map(Self::Say),
            Platform::Linux => find_executable("espeak-ng")
                .map(Self::EspeakNg)
                .or_else(|| find_executable("espeak").map(Self::Espeak))
                .or_else(|| find_executable("spd-say").map(Self::SpdSay)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::PowerShell(_) => "System.Speech",
            Self::Say(_) => "say",
            Self::EspeakNg(_) => "espeak-ng",
            Self::Espeak(_) => "espeak",
            Self::SpdSay(_) => "spd-say",
        }
    }

    pub fn command(&self, text: &str) -> CommandSpec {
        match self {
            Self::PowerShell(ps) => {
                let script = format!(
                    "Add-Type -AssemblyName System.Speech; \
                     $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
                     $s.Speak('{}'); $s.Dispose()",
                    text.replace('\'', "''")
                );
                CommandSpec::new(ps.to_string_lossy()).args(["-NoProfile", "-Command"]).arg(script)
            }
            Self::Say(bin) | Self::EspeakNg(bin) | Self::Espeak(bin) => {
                CommandSpec::new(bin.to_string_lossy()).arg("--").arg(text)
            }
            Self::SpdSay(bin) => CommandSpec::new(bin.to_string_lossy())
                .arg("--wait")
                .arg("--")
                .arg(text),
        }
    }
}

/// Optional third-party engines, detected once.
#[derive(Debug, Clone)]
pub struct Engines {
    pub ocr: Dependency<PathBuf>,
    pub pdf_text: Dependency<PathBuf>,
    pub camera: Dependency<CameraBackend>,
    pub screen: Dependency<ScreenBackend>,
    pub speech: Dependency<SpeechBackend>,
}

impl Engines {
    pub fn detect(config: &Config, platform: Platform) -> Self {
        let ocr = config
            .engines
            .tesseract
            .clone()
            .or_else(|| find_executable("tesseract"));
        let pdf_text = config
            .engines
            .pdftotext
            .clone()
            .or_else(|| find_executable("pdftotext"));

        Self {
            ocr: Dependency::new("tesseract", OCR_HINT, ocr),
            pdf_text: Dependency::new("pdftotext", PDF_HINT, pdf_text),
            camera: Dependency::new(
                "camera capture",
                CAMERA_HINT,
                CameraBackend::detect(config, platform),
            ),
            screen: Dependency::new("screen capture", SCREEN_HINT, ScreenBackend::detect(platform)),
            speech: Dependency::new("text-to-speech", SPEECH_HINT, SpeechBackend::detect(platform)),
        }
    }

    /// No engines at all.
    pub fn none() -> Self {
        Self {
            ocr: Dependency::missing("tesseract", OCR_HINT),
            pdf_text: Dependency::missing("pdftotext", PDF_HINT),
            camera: Dependency::missing("camera capture", CAMERA_HINT),
            screen: Dependency::missing("screen capture", SCREEN_HINT),
            speech: Dependency::missing("text-to-speech", SPEECH_HINT),
        }
    }

    fn log_summary(&self) {
        let report = |name: &str, available: bool| {
            if available {
                info!("✅ {} available", name);
            } else {
                warn!("⚠️  {} not found; dependent tools will report it as unavailable", name);
            }
        };
        report(self.ocr.name(), self.ocr.is_available());
        report(self.pdf_text.name(), self.pdf_text.is_available());
        report(self.camera.name(), self.camera.is_available());
        report(self.screen.name(), self.screen.is_available());
        report(self.speech.name(), self.speech.is_available());
    }
}

/// Everything a handler may need. Built once, then shared read-only.
pub struct ToolContext {
    pub config: Config,
    pub platform: Platform,
    pub engines: Engines,
    pub runner: Arc<dyn CommandRunner>,
    pub launcher: Arc<dyn Launcher>,
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("config", &self.config)
            .field("platform", &self.platform)
            .field("engines", &self.engines)
            .finish()
    }
}

impl ToolContext {
    /// Detects engines on the host and wires the real runner and launcher.
    pub fn new(config: Config) -> Self {
        let platform = Platform::current();
        let engines = Engines::detect(&config, platform);
        engines.log_summary();
        Self {
            config,
            platform,
            engines,
            runner: Arc::new(SystemRunner),
            launcher: Arc::new(SystemLauncher),
        }
    }

    /// A context with no optional engines, for hosts where probing is unwanted.
    pub fn bare(config: Config) -> Self {
        Self {
            config,
            platform: Platform::current(),
            engines: Engines::none(),
            runner: Arc::new(SystemRunner),
            launcher: Arc::new(SystemLauncher),
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_engines(mut self, engines: Engines) -> Self {
        self.engines = engines;
        self
    }

    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = launcher;
        self
    }

    /// Runs `spec` through the configured runner with the default command
    /// timeout unless `spec` carries its own.
    pub async fn run(&self, spec: CommandSpec) -> Result<crate::exec::CommandOutput, ToolError> {
        let spec = match spec.timeout {
            Some(_) => spec,
            None => spec.timeout(self.config.limits.command_timeout()),
        };
        self.runner.run(spec).await
    }
}
