//! Display helpers for the headless watcher.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageLevel {
    Unknown,
    Normal,
    Elevated,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Cpu,
    Memory,
    Disk,
}

impl Resource {
    // (elevated, critical) thresholds in percent
    fn thresholds(self) -> (f64, f64) {
        match self {
            Resource::Cpu => (50.0, 80.0),
            Resource::Memory => (60.0, 85.0),
            Resource::Disk => (70.0, 90.0),
        }
    }
}

pub fn usage_level(resource: Resource, percent: Option<f64>) -> UsageLevel {
    let Some(p) = percent.filter(|p| p.is_finite()) else {
        return UsageLevel::Unknown;
    };
    let (elevated, critical) = resource.thresholds();
    if p < elevated {
        UsageLevel::Normal
    } else if p < critical {
        UsageLevel::Elevated
    } else {
        UsageLevel::Critical
    }
}

/// `3d 4h 5m`, `4h 5m` or `5m`; `--` when unknown or zero.
pub fn format_duration(seconds: Option<f64>) -> String {
    let secs = match seconds {
        Some(s) if s.is_finite() && s > 0.0 => s as u64,
        _ => return "--".into(),
    };
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let mins = (secs % 3_600) / 60;
    if days > 0 {
        format!("{days}d {hours}h {mins}m")
    } else if hours > 0 {
        format!("{hours}h {mins}m")
    } else {
        format!("{mins}m")
    }
}

pub fn format_uptime(boot_time: Option<f64>, now: f64) -> String {
    format_duration(boot_time.filter(|b| *b > 0.0).map(|b| now - b))
}

pub fn format_percent(percent: Option<f64>) -> String {
    match percent {
        Some(p) if p.is_finite() => format!("{p:.1}%"),
        _ => "--%".into(),
    }
}
