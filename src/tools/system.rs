//! Read-only host queries: battery, Wi-Fi, Bluetooth, machine info, time.

use super::{handler, payload, HandlerResult, ToolArgs, ToolDescriptor, ToolRegistryBuilder};
use crate::context::ToolContext;
use crate::error::ToolError;
use crate::exec::{run_blocking, CommandSpec};
use crate::platform::Platform;
use crate::utils::preview::Preview;
use chrono::Local;
use regex::Regex;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use sysinfo::System;

const LINUX_POWER_SUPPLY: &str = "/sys/class/power_supply";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryReading {
    pub percent: f64,
    pub plugged_in: bool,
}

/// Reads the first battery under a sysfs `power_supply` directory.
pub fn read_power_supply(root: &Path) -> Result<Option<BatteryReading>, ToolError> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ToolError::from_io(&root.display().to_string(), &e)),
    };

    let mut supplies: Vec<_> = entries.filter_map(Result::ok).map(|e| e.path()).collect();
    supplies.sort();

    let read = |dir: &Path, file: &str| {
        fs::read_to_string(dir.join(file))
            .map(|s| s.trim().to_string())
            .ok()
    };

    let ac_online = supplies.iter().any(|dir| {
        read(dir, "type").as_deref() == Some("Mains") && read(dir, "online").as_deref() == Some("1")
    });

    for dir in &supplies {
        if read(dir, "type").as_deref() != Some("Battery") {
            continue;
        }
        let Some(percent) = read(dir, "capacity").and_then(|c| c.parse::<f64>().ok()) else {
            continue;
        };
        let charging = matches!(read(dir, "status").as_deref(), Some("Charging") | Some("Full"));
        return Ok(Some(BatteryReading {
            percent,
            plugged_in: ac_online || charging,
        }));
    }
    Ok(None)
}

/// Parses `pmset -g batt` output.
pub fn parse_pmset(output: &str) -> Option<BatteryReading> {
    let percent = Regex::new(r"(\d+)%").ok()?.captures(output)?.get(1)?.as_str().parse().ok()?;
    Some(BatteryReading {
        percent,
        plugged_in: output.contains("AC Power"),
    })
}

/// Parses the JSON emitted for `Get-CimInstance Win32_Battery`.
/// BatteryStatus 2 means the machine is on AC power.
pub fn parse_win32_battery(output: &str) -> Option<BatteryReading> {
    let value: Value = serde_json::from_str(output.trim()).ok()?;
    let battery = match &value {
        Value::Array(items) => items.first()?.clone(),
        other => other.clone(),
    };
    Some(BatteryReading {
        percent: battery.get("EstimatedChargeRemaining")?.as_f64()?,
        plugged_in: battery.get("BatteryStatus").and_then(Value::as_i64) == Some(2),
    })
}

pub async fn get_battery_info(ctx: Arc<ToolContext>, _args: ToolArgs) -> HandlerResult {
    let reading = match ctx.platform {
        Platform::Linux => {
            let root = Path::new(LINUX_POWER_SUPPLY);
            run_blocking("battery", None, move || read_power_supply(root)).await?
        }
        Platform::MacOs => {
            let output = ctx.run(CommandSpec::new("pmset").args(["-g", "batt"])).await?;
            parse_pmset(&output.stdout)
        }
        Platform::Windows => {
            let output = ctx
                .run(CommandSpec::new("powershell").args([
                    "-NoProfile",
                    "-Command",
                    concat!(
                        "Get-CimInstance Win32_Battery | ",
                        "Select-Object EstimatedChargeRemaining,BatteryStatus | ConvertTo-Json"
                    ),
                ]))
                .await?;
            parse_win32_battery(&output.stdout)
        }
    };

    let reading = reading.ok_or_else(|| ToolError::not_found("No battery detected"))?;
    Ok(payload(json!({
        "percent": reading.percent,
        "plugged_in": reading.plugged_in,
    })))
}

pub fn wifi_command(platform: Platform) -> CommandSpec {
    match platform {
        Platform::Windows => CommandSpec::new("netsh").args(["wlan", "show", "interfaces"]),
        Platform::MacOs => CommandSpec::new("networksetup").args(["-getairportnetwork", "en0"]),
        Platform::Linux => {
            CommandSpec::new("nmcli").args(["-t", "-f", "ACTIVE,SSID", "dev", "wifi"])
        }
    }
}

/// Extracts the connected network name from the platform's Wi-Fi output.
pub fn parse_ssid(platform: Platform, output: &str) -> Option<String> {
    let pattern = match platform {
        Platform::Windows => r"(?m)^\s*SSID\s*:\s*(.+?)\s*$",
        Platform::MacOs => r"Current Wi-Fi Network:\s*(.+?)\s*$",
        Platform::Linux => r"(?m)^yes:(.+?)\s*$",
    };
    Regex::new(pattern)
        .ok()?
        .captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty())
}

pub async fn wifi_status(ctx: Arc<ToolContext>, _args: ToolArgs) -> HandlerResult {
    let output = ctx.run(wifi_command(ctx.platform)).await?;
    if !output.success() && output.stdout.is_empty() {
        return Err(ToolError::execution(format!(
            "Could not read Wi-Fi status: {}",
            output.failure_message()
        )));
    }

    let ssid = parse_ssid(ctx.platform, &output.stdout);
    let mut result = payload(json!({
        "connected": ssid.is_some(),
        "ssid": ssid,
    }));
    Preview::new(&output.stdout, ctx.config.limits.preview_chars).write_into(&mut result, "output");
    Ok(result)
}

pub fn bluetooth_command(platform: Platform) -> CommandSpec {
    match platform {
        Platform::Windows => CommandSpec::new("powershell").args([
            "-NoProfile",
            "-Command",
            "Get-PnpDevice -Class Bluetooth",
        ]),
        Platform::MacOs => CommandSpec::new("system_profiler").arg("SPBluetoothDataType"),
        Platform::Linux => CommandSpec::new("bluetoothctl").arg("devices"),
    }
}

pub async fn bluetooth_status(ctx: Arc<ToolContext>, _args: ToolArgs) -> HandlerResult {
    let output = ctx.run(bluetooth_command(ctx.platform)).await?;
    if !output.success() {
        return Err(ToolError::execution(format!(
            "Could not read Bluetooth status: {}",
            output.failure_message()
        )));
    }

    let mut result = payload(json!({}));
    Preview::new(&output.stdout, ctx.config.limits.preview_chars).write_into(&mut result, "output");
    Ok(result)
}

pub async fn system_info(_ctx: Arc<ToolContext>, _args: ToolArgs) -> HandlerResult {
    run_blocking("system_info", None, || {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu();

        Ok(payload(json!({
            "os": System::name(),
            "os_version": System::os_version(),
            "kernel": System::kernel_version(),
            "host": System::host_name(),
            "cpu_count": sys.cpus().len(),
            "total_memory_mb": sys.total_memory() / (1024 * 1024),
            "used_memory_mb": sys.used_memory() / (1024 * 1024),
            "uptime_seconds": System::uptime(),
        })))
    })
    .await
}

pub async fn get_formatted_datetime(_ctx: Arc<ToolContext>, _args: ToolArgs) -> HandlerResult {
    let now = Local::now();
    Ok(payload(json!({
        "iso": now.to_rfc3339(),
        "timestamp": now.timestamp(),
        "formatted": now.format("%Y-%m-%d %H:%M:%S %Z").to_string(),
        "timezone": now.format("%Z").to_string(),
        "spoken": now.format("%A, %-d %B %Y, %-I:%M %p").to_string(),
    })))
}

pub fn register(builder: &mut ToolRegistryBuilder) {
    builder
        .register(ToolDescriptor::new(
            "get_battery_info",
            "Return the battery percentage and whether the charger is plugged in.",
            handler(get_battery_info),
        ))
        .register(ToolDescriptor::new(
            "wifi_status",
            "Check the Wi-Fi connection and the network name.",
            handler(wifi_status),
        ))
        .register(ToolDescriptor::new(
            "bluetooth_status",
            "List Bluetooth devices known to the system.",
            handler(bluetooth_status),
        ))
        .register(ToolDescriptor::new(
            "system_info",
            "Report the operating system, CPU count, memory use and uptime.",
            handler(system_info),
        ))
        .register(ToolDescriptor::new(
            "get_formatted_datetime",
            "Return the current local date and time.",
            handler(get_formatted_datetime),
        ));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, file: &str, content: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(file), content).unwrap();
    }

    #[test]
    fn sysfs_battery_with_ac() {
        let root = tempfile::tempdir().unwrap();
        let bat = root.path().join("BAT0");
        write(&bat, "type", "Battery\n");
        write(&bat, "capacity", "87\n");
        write(&bat, "status", "Discharging\n");
        let ac = root.path().join("AC");
        write(&ac, "type", "Mains\n");
        write(&ac, "online", "1\n");

        let reading = read_power_supply(root.path()).unwrap().unwrap();
        assert_eq!(reading.percent, 87.0);
        assert!(reading.plugged_in);
    }

    #[test]
    fn sysfs_without_battery() {
        let root = tempfile::tempdir().unwrap();
        write(&root.path().join("AC"), "type", "Mains\n");
        assert_eq!(read_power_supply(root.path()).unwrap(), None);
        assert_eq!(read_power_supply(&root.path().join("missing")).unwrap(), None);
    }

    #[test]
    fn pmset_output() {
        let out = concat!(
            "Now drawing from 'AC Power'\n",
            " -InternalBattery-0 (id=1234)\t64%; charging; 1:02 remaining"
        );
        assert_eq!(parse_pmset(out), Some(BatteryReading { percent: 64.0, plugged_in: true }));
    }

    #[test]
    fn win32_battery_json() {
        let out = r#"{"EstimatedChargeRemaining": 42, "BatteryStatus": 1}"#;
        assert_eq!(
            parse_win32_battery(out),
            Some(BatteryReading { percent: 42.0, plugged_in: false })
        );
        assert_eq!(parse_win32_battery(""), None);
    }

    #[test]
    fn ssid_parsing_per_platform() {
        let netsh = concat!(
            "    Name                   : Wi-Fi\n",
            "    SSID                   : HomeNet\n",
            "    BSSID                  : aa:bb"
        );
        assert_eq!(parse_ssid(Platform::Windows, netsh).as_deref(), Some("HomeNet"));

        let nmcli = "no:Neighbour\nyes:Office 5G\n";
        assert_eq!(parse_ssid(Platform::Linux, nmcli).as_deref(), Some("Office 5G"));

        let mac = "You are not associated with an AirPort network.";
        assert_eq!(parse_ssid(Platform::MacOs, mac), None);
    }
}
