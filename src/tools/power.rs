//! Power and session control: shutdown, restart, cancel, sleep, lock.

use super::{
    handler, payload, HandlerResult, ParamSpec, ParamType, ToolArgs, ToolDescriptor,
    ToolRegistryBuilder,
};
use crate::context::ToolContext;
use crate::error::ToolError;
use crate::exec::CommandSpec;
use crate::platform::Platform;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    Shutdown,
    Restart,
    CancelShutdown,
    Sleep,
    Lock,
}

impl PowerAction {
    pub fn label(&self) -> &'static str {
        match self {
            PowerAction::Shutdown => "shutdown",
            PowerAction::Restart => "restart",
            PowerAction::CancelShutdown => "cancel_shutdown",
            PowerAction::Sleep => "sleep",
            PowerAction::Lock => "lock_screen",
        }
    }

    /// The command that performs this action. `force` only affects
    /// shutdown and restart.
    pub fn command(&self, platform: Platform, force: bool) -> CommandSpec {
        match (platform, self) {
            (Platform::Windows, PowerAction::Shutdown) => {
                windows_shutdown("/s", force)
            }
            (Platform::Windows, PowerAction::Restart) => {
                windows_shutdown("/r", force)
            }
            (Platform::Windows, PowerAction::CancelShutdown) => {
                CommandSpec::new("shutdown").arg("/a")
            }
            (Platform::Windows, PowerAction::Sleep) => {
                CommandSpec::new("rundll32.exe").arg("powrprof.dll,SetSuspendState").arg("0,1,0")
            }
            (Platform::Windows, PowerAction::Lock) => {
                CommandSpec::new("rundll32.exe").arg("user32.dll,LockWorkStation")
            }

            (Platform::MacOs, PowerAction::Shutdown) if force => {
                CommandSpec::new("shutdown").args(["-h", "now"])
            }
            (Platform::MacOs, PowerAction::Shutdown) => {
                let script = "tell application \"System Events\" to shut down";
                CommandSpec::new("osascript").args(["-e", script])
            }
            (Platform::MacOs, PowerAction::Restart) if force => {
                CommandSpec::new("shutdown").args(["-r", "now"])
            }
            (Platform::MacOs, PowerAction::Restart) => {
                let script = "tell application \"System Events\" to restart";
                CommandSpec::new("osascript").args(["-e", script])
            }
            (Platform::MacOs, PowerAction::CancelShutdown) => {
                CommandSpec::new("killall").arg("shutdown")
            }
            (Platform::MacOs, PowerAction::Sleep) => CommandSpec::new("pmset").arg("sleepnow"),
            (Platform::MacOs, PowerAction::Lock) => {
                CommandSpec::new("pmset").arg("displaysleepnow")
            }

            (Platform::Linux, PowerAction::Shutdown) => systemctl("poweroff", force),
            (Platform::Linux, PowerAction::Restart) => systemctl("reboot", force),
            (Platform::Linux, PowerAction::CancelShutdown) => {
                CommandSpec::new("shutdown").arg("-c")
            }
            (Platform::Linux, PowerAction::Sleep) => CommandSpec::new("systemctl").arg("suspend"),
            (Platform::Linux, PowerAction::Lock) => {
                CommandSpec::new("loginctl").arg("lock-session")
            }
        }
    }
}

fn windows_shutdown(mode: &str, force: bool) -> CommandSpec {
    let spec = CommandSpec::new("shutdown").args([mode, "/t", "0"]);
    if force {
        spec.arg("/f")
    } else {
        spec
    }
}

fn systemctl(verb: &str, force: bool) -> CommandSpec {
    let spec = CommandSpec::new("systemctl").arg(verb);
    if force {
        spec.arg("--force")
    } else {
        spec
    }
}

/// Non-zero exit codes of the cancel command that just mean nothing was
/// scheduled.
///
/// * Windows `shutdown /a`: 1116, ERROR_SHUTDOWN_NOT_IN_PROGRESS.
/// * macOS `killall shutdown`: 1, no matching process.
/// * Linux `shutdown -c`: none; systemd exits 0 when nothing is pending.
pub fn benign_cancel_codes(platform: Platform) -> &'static [i32] {
    match platform {
        Platform::Windows => &[1116],
        Platform::MacOs => &[1],
        Platform::Linux => &[],
    }
}

async fn perform(ctx: &ToolContext, action: PowerAction, force: bool) -> HandlerResult {
    let spec = action.command(ctx.platform, force);
    let command = spec.display();
    info!("⚡ {}: {}", action.label(), command);

    let output = ctx.run(spec).await?;
    if !output.success() {
        return Err(ToolError::execution(format!(
            "{} failed: {}",
            action.label(),
            output.failure_message()
        )));
    }
    Ok(payload(json!({
        "action": action.label(),
        "command": command,
    })))
}

pub async fn shutdown_system(ctx: Arc<ToolContext>, args: ToolArgs) -> HandlerResult {
    perform(&ctx, PowerAction::Shutdown, args.bool("force")).await
}

pub async fn restart_system(ctx: Arc<ToolContext>, args: ToolArgs) -> HandlerResult {
    perform(&ctx, PowerAction::Restart, args.bool("force")).await
}

pub async fn sleep_system(ctx: Arc<ToolContext>, _args: ToolArgs) -> HandlerResult {
    perform(&ctx, PowerAction::Sleep, false).await
}

pub async fn lock_screen(ctx: Arc<ToolContext>, _args: ToolArgs) -> HandlerResult {
    perform(&ctx, PowerAction::Lock, false).await
}

pub async fn cancel_shutdown(ctx: Arc<ToolContext>, _args: ToolArgs) -> HandlerResult {
    let action = PowerAction::CancelShutdown;
    let output = ctx.run(action.command(ctx.platform, false)).await?;

    match output.exit_code {
        Some(0) => Ok(payload(json!({
            "action": action.label(),
            "cancelled": true,
        }))),
        Some(code) if benign_cancel_codes(ctx.platform).contains(&code) => Ok(payload(json!({
            "action": action.label(),
            "cancelled": false,
            "note": "No shutdown was scheduled",
        }))),
        _ => Err(ToolError::execution(format!(
            "Could not cancel shutdown: {}",
            output.failure_message()
        ))),
    }
}

fn force_param() -> ParamSpec {
    ParamSpec::optional("force", ParamType::Boolean, "Force-close running applications")
        .with_default(json!(false))
}

pub fn register(builder: &mut ToolRegistryBuilder) {
    builder
        .register(
            ToolDescriptor::new(
                "shutdown_system",
                "Shut down the computer immediately. Use force=true to force-close apps.",
                handler(shutdown_system),
            )
            .param(force_param()),
        )
        .register(
            ToolDescriptor::new(
                "restart_system",
                "Restart the computer immediately.",
                handler(restart_system),
            )
            .param(force_param()),
        )
        .register(ToolDescriptor::new(
            "cancel_shutdown",
            "Cancel a pending system shutdown or restart.",
            handler(cancel_shutdown),
        ))
        .register(ToolDescriptor::new(
            "sleep_system",
            "Put the computer to sleep.",
            handler(sleep_system),
        ))
        .register(ToolDescriptor::new(
            "lock_screen",
            "Lock the user session immediately.",
            handler(lock_screen),
        ));
}
