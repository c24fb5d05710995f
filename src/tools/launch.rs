//! Launching applications, media, settings panels and websites.
//!
//! Launches are fire-and-forget: the reply confirms that the request was
//! issued and names the target, nothing more.

use super::{
    files, handler, payload, HandlerResult, ParamSpec, ParamType, ToolArgs, ToolDescriptor,
    ToolRegistryBuilder,
};
use crate::context::ToolContext;
use crate::error::ToolError;
use crate::exec::run_blocking;
use crate::platform::Platform;
use crate::utils::paths::{find_any_executable, find_executable};
use regex::Regex;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use sysinfo::{Pid, System};
use tracing::info;

/// Searched in this order when no app or path matched.
pub const MEDIA_PATTERNS: &[&str] = &["*.mp4", "*.mp3", "*.mkv"];

/// Where a launch request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchTarget {
    Url(String),
    Program {
        /// Executables tried on `PATH`, first hit wins.
        candidates: &'static [&'static str],
        args: Vec<String>,
        /// Handed to the default-handler open when no candidate is found.
        shell_fallback: Option<&'static str>,
    },
}

impl LaunchTarget {
    fn program(candidates: &'static [&'static str]) -> Self {
        LaunchTarget::Program {
            candidates,
            args: Vec::new(),
            shell_fallback: None,
        }
    }

    fn mac_app(name: &str) -> Self {
        LaunchTarget::Program {
            candidates: &["open"],
            args: vec!["-a".to_string(), name.to_string()],
            shell_fallback: None,
        }
    }

    fn with_fallback(self, fallback: &'static str) -> Self {
        match self {
            LaunchTarget::Program { candidates, args, .. } => LaunchTarget::Program {
                candidates,
                args,
                shell_fallback: Some(fallback),
            },
            url => url,
        }
    }
}

pub fn google_search_url(query: &str) -> String {
    format!("https://www.google.com/search?q={}", urlencoding::encode(query))
}

pub fn youtube_search_url(query: &str) -> String {
    format!(
        "https://www.youtube.com/results?search_query={}",
        urlencoding::encode(query)
    )
}

/// Maps a spoken app name to a display label and a launch target.
pub fn resolve_common_app(
    app: &str,
    query: Option<&str>,
    platform: Platform,
) -> Result<(&'static str, LaunchTarget), ToolError> {
    let normalized = app.trim().to_lowercase();
    let resolved = match normalized.as_str() {
        "chrome" | "google chrome" => (
            "Google Chrome",
            match platform {
                Platform::Windows => LaunchTarget::program(&["chrome"]).with_fallback("chrome"),
                Platform::MacOs => LaunchTarget::mac_app("Google Chrome"),
                Platform::Linux => LaunchTarget::program(&[
                    "google-chrome",
                    "google-chrome-stable",
                    "chromium",
                    "chromium-browser",
                ]),
            },
        ),
        "youtube" => (
            "YouTube",
            LaunchTarget::Url(match query {
                Some(q) => youtube_search_url(q),
                None => "https://www.youtube.com".to_string(),
            }),
        ),
        "notepad" => (
            "Notepad",
            match platform {
                Platform::Windows => {
                    LaunchTarget::program(&["notepad"]).with_fallback("notepad.exe")
                }
                Platform::MacOs => LaunchTarget::mac_app("TextEdit"),
                Platform::Linux => LaunchTarget::program(&[
                    "gnome-text-editor",
                    "gedit",
                    "kate",
                    "mousepad",
                    "xed",
                ]),
            },
        ),
        "vscode" | "vs code" | "code" | "visual studio code" => (
            "Visual Studio Code",
            match platform {
                Platform::Windows => LaunchTarget::program(&["code"]).with_fallback("code"),
                _ => LaunchTarget::program(&["code"]),
            },
        ),
        "cursor" => (
            "Cursor Editor",
            match platform {
                Platform::Windows => LaunchTarget::program(&["cursor"]).with_fallback("cursor"),
                _ => LaunchTarget::program(&["cursor"]),
            },
        ),
        "whatsapp" => ("WhatsApp Web", LaunchTarget::Url("https://web.whatsapp.com/".to_string())),
        "google" | "search" => match query {
            Some(q) => ("Google Search", LaunchTarget::Url(google_search_url(q))),
            None => ("Google Home", LaunchTarget::Url("https://www.google.com".to_string())),
        },
        _ => return Err(ToolError::invalid_input(format!("Unsupported app: {}", app.trim()))),
    };
    Ok(resolved)
}

/// Issues the launch. Returns what was actually handed to the OS.
async fn launch(ctx: &ToolContext, label: &str, target: LaunchTarget) -> Result<String, ToolError> {
    let launcher = Arc::clone(&ctx.launcher);
    match target {
        LaunchTarget::Url(url) => {
            files::open_with_default(ctx, url.clone()).await?;
            Ok(url)
        }
        LaunchTarget::Program {
            candidates,
            args,
            shell_fallback,
        } => {
            if let Some(exe) = find_any_executable(candidates) {
                let shown = exe.to_string_lossy().to_string();
                info!("🚀 Launching {} ({})", label, shown);
                run_blocking("launch", None, move || launcher.spawn(&exe, &args)).await?;
                Ok(shown)
            } else if let Some(fallback) = shell_fallback {
                files::open_with_default(ctx, fallback.to_string()).await?;
                Ok(fallback.to_string())
            } else {
                Err(ToolError::not_found(format!("{} is not installed on this system", label)))
            }
        }
    }
}

pub async fn open_common_app(ctx: Arc<ToolContext>, args: ToolArgs) -> HandlerResult {
    let app = args.require_string("app")?;
    let query = args.string("query");
    let (label, target) = resolve_common_app(&app, query.as_deref(), ctx.platform)?;
    let launched = launch(&ctx, label, target).await?;
    Ok(payload(json!({
        "opened": label,
        "target": launched,
    })))
}

pub async fn run_application_or_media(ctx: Arc<ToolContext>, args: ToolArgs) -> HandlerResult {
    if let Some(requested) = args.string("app_name_or_path") {
        if let Some(exe) = find_executable(&requested) {
            let shown = exe.to_string_lossy().to_string();
            let launcher = Arc::clone(&ctx.launcher);
            info!("🚀 Running {}", shown);
            run_blocking("launch", None, move || launcher.spawn(&exe, &[])).await?;
            return Ok(payload(json!({ "ran": shown, "resolved_by": "executable" })));
        }

        let path = files::resolve_path(&requested)?;
        if path.exists() {
            let opened = files::display(&path);
            files::open_with_default(&ctx, opened.clone()).await?;
            return Ok(payload(json!({ "opened": opened, "resolved_by": "path" })));
        }
    }

    let folder: PathBuf = match args.string("folder") {
        Some(raw) => files::resolve_path(&raw)?,
        None => ctx.config.paths.videos_dir.clone(),
    };
    let media = if folder.is_dir() {
        run_blocking("media search", None, move || {
            Ok(files::first_match(&folder, MEDIA_PATTERNS))
        })
        .await?
    } else {
        None
    };

    match media {
        Some(found) => {
            let opened = files::display(&found);
            files::open_with_default(&ctx, opened.clone()).await?;
            Ok(payload(json!({ "opened": opened, "resolved_by": "media_search" })))
        }
        None => Err(ToolError::not_found("No file or app found")),
    }
}

/// Letters, digits, `-` and `.`; dots appear in macOS pane ids.
pub fn is_valid_settings_section(section: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9.\-]*$").is_ok_and(|re| re.is_match(section))
}

pub async fn open_quick_settings(ctx: Arc<ToolContext>, args: ToolArgs) -> HandlerResult {
    let section = args.string("section").unwrap_or_default();
    if !is_valid_settings_section(&section) {
        return Err(ToolError::invalid_input(format!("Invalid settings section: {}", section)));
    }

    let opened = match ctx.platform {
        Platform::Windows => {
            let uri = format!("ms-settings:{}", section);
            files::open_with_default(&ctx, uri.clone()).await?;
            uri
        }
        Platform::MacOs => {
            let uri = format!("x-apple.systempreferences:{}", section);
            files::open_with_default(&ctx, uri.clone()).await?;
            uri
        }
        Platform::Linux => {
            let args: Vec<String> = if section.is_empty() {
                Vec::new()
            } else {
                vec![section.clone()]
            };
            let target = LaunchTarget::Program {
                candidates: &["gnome-control-center", "systemsettings"],
                args,
                shell_fallback: None,
            };
            launch(&ctx, "Settings", target).await?
        }
    };

    Ok(payload(json!({ "opened": opened })))
}

pub async fn open_system_info(ctx: Arc<ToolContext>, _args: ToolArgs) -> HandlerResult {
    let target = match ctx.platform {
        Platform::Windows => LaunchTarget::program(&["msinfo32"]).with_fallback("msinfo32.exe"),
        Platform::MacOs => LaunchTarget::mac_app("System Information"),
        Platform::Linux => LaunchTarget::program(&[
            "gnome-system-monitor",
            "plasma-systemmonitor",
            "ksysguard",
        ]),
    };
    let launched = launch(&ctx, "System information", target).await?;
    Ok(payload(json!({
        "action": "opened_system_info",
        "target": launched,
    })))
}

/// Case-insensitive process name comparison, ignoring a `.exe` suffix.
pub fn process_name_matches(process: &str, wanted: &str) -> bool {
    fn normalize(name: &str) -> String {
        let lower = name.trim().to_lowercase();
        lower.strip_suffix(".exe").map(str::to_string).unwrap_or(lower)
    }
    let wanted = normalize(wanted);
    !wanted.is_empty() && normalize(process) == wanted
}

/// One row of the process table.
#[derive(Debug, Clone, Copy)]
pub struct ProcessEntry<'a> {
    pub pid: u32,
    pub name: &'a str,
    /// Linux lists threads next to processes; they are never targets.
    pub is_thread: bool,
}

/// Pids of the processes to terminate for `wanted`, excluding threads and
/// the current process.
pub fn select_targets<'a>(
    entries: impl IntoIterator<Item = ProcessEntry<'a>>,
    wanted: &str,
    own_pid: u32,
) -> Vec<u32> {
    let mut pids: Vec<u32> = entries
        .into_iter()
        .filter(|e| !e.is_thread && e.pid != own_pid && process_name_matches(e.name, wanted))
        .map(|e| e.pid)
        .collect();
    pids.sort_unstable();
    pids
}

pub async fn close_application(_ctx: Arc<ToolContext>, args: ToolArgs) -> HandlerResult {
    let name = args.require_string("name")?;
    let wanted = name.clone();

    let (matched, killed) = run_blocking("close_application", None, move || {
        let mut sys = System::new();
        sys.refresh_processes();

        let candidates = sys.processes().iter().map(|(pid, process)| ProcessEntry {
            pid: pid.as_u32(),
            name: process.name(),
            is_thread: process.thread_kind().is_some(),
        });
        let targets = select_targets(candidates, &wanted, std::process::id());

        let matched = targets.len();
        let mut killed: Vec<u32> = targets
            .into_iter()
            .filter(|pid| sys.process(Pid::from_u32(*pid)).is_some_and(|p| p.kill()))
            .collect();
        killed.sort_unstable();
        Ok((matched, killed))
    })
    .await?;

    if matched == 0 {
        return Err(ToolError::not_found(format!("No running application named {}", name)));
    }
    if killed.is_empty() {
        return Err(ToolError::execution(format!("Could not terminate {}", name)));
    }

    info!("🛑 Closed {} ({} processes)", name, killed.len());
    Ok(payload(json!({
        "name": name,
        "terminated": killed.len(),
        "pids": killed,
    })))
}

pub fn register(builder: &mut ToolRegistryBuilder) {
    builder
        .register(
            ToolDescriptor::new(
                "run_application_or_media",
                concat!(
                    "Run an application by name or path. If nothing matches, play the first ",
                    "video or audio file found in the folder (defaults to Videos)."
                ),
                handler(run_application_or_media),
            )
            .param(ParamSpec::optional(
                "app_name_or_path",
                ParamType::String,
                "Executable name or file path",
            ))
            .param(ParamSpec::optional("folder", ParamType::String, "Folder to search for media")),
        )
        .register(
            ToolDescriptor::new(
                "open_common_app",
                concat!(
                    "Open common apps or websites. Supported: chrome, youtube, notepad, ",
                    "vscode, cursor, whatsapp, google search."
                ),
                handler(open_common_app),
            )
            .param(ParamSpec::required("app", ParamType::String, "App or site to open"))
            .param(ParamSpec::optional(
                "query",
                ParamType::String,
                "Search text for google or youtube",
            )),
        )
        .register(
            ToolDescriptor::new(
                "open_quick_settings",
                "Open the system settings app.",
                handler(open_quick_settings),
            )
            .param(ParamSpec::optional(
                "section",
                ParamType::String,
                "Settings page, e.g. bluetooth or display",
            )),
        )
        .register(ToolDescriptor::new(
            "open_system_info",
            "Open the system information viewer.",
            handler(open_system_info),
        ))
        .register(
            ToolDescriptor::new(
                "close_application",
                "Close a running application by name.",
                handler(close_application),
            )
            .param(ParamSpec::required("name", ParamType::String, "Application or process name")),
        );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_queries_are_percent_encoded() {
        assert_eq!(
            google_search_url("rust & tokio?"),
            "https://www.google.com/search?q=rust%20%26%20tokio%3F"
        );
        assert!(youtube_search_url("lo-fi beats").ends_with("lo-fi%20beats"));
    }

    #[test]
    fn aliases_resolve_to_same_app() {
        for alias in ["vscode", "VS Code", " code "] {
            let (label, _) = resolve_common_app(alias, None, Platform::Linux).unwrap();
            assert_eq!(label, "Visual Studio Code");
        }
    }

    #[test]
    fn google_without_query_opens_home() {
        let (label, target) = resolve_common_app("google", None, Platform::Windows).unwrap();
        assert_eq!(label, "Google Home");
        assert_eq!(target, LaunchTarget::Url("https://www.google.com".to_string()));
    }

    #[test]
    fn windows_chrome_falls_back_to_shell() {
        let (_, target) = resolve_common_app("chrome", None, Platform::Windows).unwrap();
        match target {
            LaunchTarget::Program { shell_fallback, .. } => {
                assert_eq!(shell_fallback, Some("chrome"))
            }
            other => panic!("unexpected target {:?}", other),
        }
    }

    #[test]
    fn process_names_ignore_case_and_exe() {
        assert!(process_name_matches("Notepad.exe", "notepad"));
        assert!(process_name_matches("firefox", "Firefox.EXE"));
        assert!(!process_name_matches("firefox-bin", "firefox"));
        assert!(!process_name_matches("anything", "  "));
    }

    #[test]
    fn threads_and_self_are_not_targets() {
        let entry = |pid, name, is_thread| ProcessEntry { pid, name, is_thread };
        let table = [
            entry(200, "firefox", false),
            entry(201, "firefox", true),
            entry(202, "firefox", true),
            entry(150, "Firefox.exe", false),
            entry(300, "firefox-bin", false),
            entry(42, "firefox", false),
        ];
        assert_eq!(select_targets(table, "firefox", 42), vec![150, 200]);
        assert!(select_targets(table, "thunderbird", 42).is_empty());
    }

    #[test]
    fn settings_sections_allow_pane_ids() {
        assert!(is_valid_settings_section("com.apple.preference.security"));
        assert!(is_valid_settings_section("network-wifi"));
        assert!(is_valid_settings_section(""));
        assert!(!is_valid_settings_section("x; rm -rf /"));
        assert!(!is_valid_settings_section("../etc"));
    }
}
