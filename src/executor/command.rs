//! Stats commands per remote OS
//!
//! Each OS kind runs one composite command that prints
//! `<free memory MB> <free disk GB> <cpu load>` on a single line, so a
//! collection costs exactly one remote round-trip.

use crate::{CpuLoad, OsKind, StatsRecord};

/// Free memory in MB, free space of `/` in GB and the 1-minute load average.
const LINUX_STATS_COMMAND: &str = r#"echo $(free -m | awk '/^Mem:/ {print $4}') $(df -BG / | awk 'NR==2 {gsub(/G/, "", $4); print $4}') $(cut -d' ' -f1 /proc/loadavg)"#;

/// Free memory in MB, free space of `C:` in GB and the average processor load
/// in percent. Formatted with the invariant culture so decimals use a dot.
const WINDOWS_STATS_COMMAND: &str = r#"powershell -NoProfile -NonInteractive -Command "$mem = [math]::Round((Get-CimInstance Win32_OperatingSystem).FreePhysicalMemory / 1KB); $disk = [math]::Round((Get-PSDrive C).Free / 1GB, 2); $cpu = (Get-CimInstance Win32_Processor | Measure-Object -Property LoadPercentage -Average).Average; [string]::Format([cultureinfo]::InvariantCulture, '{0} {1} {2}', $mem, $disk, $cpu)""#;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("expected 3 fields, got {count} in {output:?}")]
    FieldCount { count: usize, output: String },

    #[error("field `{field}` is not a non-negative number: {value:?}")]
    NotNumeric { field: &'static str, value: String },
}

/// The stats gathering capability of one OS kind.
pub trait StatsCommand: Send + Sync {
    /// Command line executed in the remote shell
    fn command_line(&self) -> &'static str;

    /// Parse the command's stdout
    fn parse(&self, output: &str) -> Result<StatsRecord, ParseError>;
}

pub struct LinuxStats;

pub struct WindowsStats;

impl StatsCommand for LinuxStats {
    fn command_line(&self) -> &'static str {
        LINUX_STATS_COMMAND
    }

    fn parse(&self, output: &str) -> Result<StatsRecord, ParseError> {
        let [memory, disk, load] = split_fields(output)?;
        Ok(StatsRecord {
            free_memory_mb: parse_megabytes(memory)?,
            free_disk_gb: parse_number("free_disk", disk)?,
            cpu_load: CpuLoad::LoadAverage(parse_number("cpu_load", load)?),
        })
    }
}

impl StatsCommand for WindowsStats {
    fn command_line(&self) -> &'static str {
        WINDOWS_STATS_COMMAND
    }

    fn parse(&self, output: &str) -> Result<StatsRecord, ParseError> {
        let [memory, disk, load] = split_fields(output)?;
        Ok(StatsRecord {
            free_memory_mb: parse_megabytes(memory)?,
            free_disk_gb: parse_number("free_disk", disk)?,
            cpu_load: CpuLoad::Percent(parse_number("cpu_load", load)?),
        })
    }
}

impl OsKind {
    pub fn stats_command(&self) -> &'static dyn StatsCommand {
        match self {
            OsKind::Linux => &LinuxStats,
            OsKind::Windows => &WindowsStats,
        }
    }
}

fn split_fields(output: &str) -> Result<[&str; 3], ParseError> {
    let fields: Vec<&str> = output.split_whitespace().collect();
    match fields.as_slice() {
        [memory, disk, load] => Ok([*memory, *disk, *load]),
        _ => Err(ParseError::FieldCount {
            count: fields.len(),
            output: output.trim().to_string(),
        }),
    }
}

fn parse_number(field: &'static str, value: &str) -> Result<f64, ParseError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| ParseError::NotNumeric {
            field,
            value: value.to_string(),
        })
}

fn parse_megabytes(value: &str) -> Result<u64, ParseError> {
    match value.parse::<u64>() {
        Ok(mb) => Ok(mb),
        Err(_) => parse_number("free_memory", value).map(|mb| mb.round() as u64),
    }
}
