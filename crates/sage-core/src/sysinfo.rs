//! Optional host facts that can be added to a question's context.
//!
//! Each source states up front whether it can run on this host; the first
//! available one is chosen once when the orchestrator is built.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

pub type SystemInfo = BTreeMap<String, String>;

pub trait SystemInfoSource: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap probe; must not fail.
    fn is_available(&self) -> bool;

    /// # Errors
    ///
    /// Returns an error if the underlying facts cannot be read.
    fn collect(&self) -> std::io::Result<SystemInfo>;
}

/// Reads `/proc` and `/etc/os-release` on Linux hosts.
#[derive(Debug, Clone)]
pub struct ProcfsInfo {
    root: PathBuf,
}

impl Default for ProcfsInfo {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
        }
    }
}

impl ProcfsInfo {
    /// Read from a different filesystem root, e.g. a container mount.
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read(&self, rel: &str) -> std::io::Result<String> {
        std::fs::read_to_string(self.root.join(rel))
    }

    fn read_opt(&self, rel: &str) -> Option<String> {
        self.read(rel)
            .ok()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
    }
}

impl SystemInfoSource for ProcfsInfo {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "procfs"
    }

    fn is_available(&self) -> bool {
        self.root.join("proc/meminfo").is_file()
    }

    fn collect(&self) -> std::io::Result<SystemInfo> {
        let mut info = SystemInfo::new();

        let meminfo = self.read("proc/meminfo")?;
        if let Some(kb) = meminfo_kb(&meminfo, "MemTotal") {
            info.insert("memory_total".into(), format!("{} MiB", kb / 1024));
        }
        if let Some(kb) = meminfo_kb(&meminfo, "MemAvailable") {
            info.insert("memory_available".into(), format!("{} MiB", kb / 1024));
        }

        if let Some(os) = self
            .read_opt("etc/os-release")
            .and_then(|s| os_release_name(&s))
        {
            info.insert("os".into(), os);
        }
        if let Some(kernel) = self.read_opt("proc/sys/kernel/osrelease") {
            info.insert("kernel".into(), kernel);
        }
        if let Some(host) = self.read_opt("proc/sys/kernel/hostname") {
            info.insert("hostname".into(), host);
        }
        if let Some(load) = self.read_opt("proc/loadavg") {
            let fields: Vec<&str> = load.split_whitespace().take(3).collect();
            info.insert("load_average".into(), fields.join(" "));
        }
        if let Some(uptime) = self
            .read_opt("proc/uptime")
            .and_then(|s| s.split_whitespace().next()?.parse::<f64>().ok())
        {
            info.insert("uptime".into(), format_uptime(uptime));
        }
        if let Some(cpuinfo) = self.read_opt("proc/cpuinfo") {
            if let Some(model) = cpuinfo
                .lines()
                .find_map(|l| l.strip_prefix("model name"))
                .and_then(|rest| rest.split_once(':'))
                .map(|(_, v)| v.trim().to_owned())
            {
                info.insert("cpu_model".into(), model);
            }
            let count = cpuinfo
                .lines()
                .filter(|l| l.starts_with("processor"))
                .count();
            if count > 0 {
                info.insert("cpu_count".into(), count.to_string());
            }
        }
        info.insert("arch".into(), std::env::consts::ARCH.into());

        Ok(info)
    }
}

/// Facts the standard library can report on any platform.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortableInfo;

impl SystemInfoSource for PortableInfo {
    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "portable"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn collect(&self) -> std::io::Result<SystemInfo> {
        let mut info = SystemInfo::new();
        info.insert("os".into(), std::env::consts::OS.into());
        info.insert("os_family".into(), std::env::consts::FAMILY.into());
        info.insert("arch".into(), std::env::consts::ARCH.into());
        if let Ok(n) = std::thread::available_parallelism() {
            info.insert("cpu_count".into(), n.to_string());
        }
        Ok(info)
    }
}

/// Candidates in preference order.
#[must_use]
pub fn default_sources() -> Vec<Arc<dyn SystemInfoSource>> {
    vec![Arc::new(ProcfsInfo::default()), Arc::new(PortableInfo)]
}

/// First candidate whose probe succeeds.
#[must_use]
pub fn select_source(
    candidates: Vec<Arc<dyn SystemInfoSource>>,
) -> Option<Arc<dyn SystemInfoSource>> {
    let selected = candidates.into_iter().find(|s| s.is_available());
    match &selected {
        Some(s) => tracing::debug!(source = s.name(), "system info source selected"),
        None => tracing::debug!("no system info source available"),
    }
    selected
}

fn meminfo_kb(meminfo: &str, key: &str) -> Option<u64> {
    meminfo.lines().find_map(|line| {
        let rest = line.strip_prefix(key)?.strip_prefix(':')?;
        rest.split_whitespace().next()?.parse().ok()
    })
}

fn os_release_name(content: &str) -> Option<String> {
    let field = |key: &str| {
        content.lines().find_map(|l| {
            l.strip_prefix(key)?
                .strip_prefix('=')
                .map(|v| v.trim().trim_matches('"').to_owned())
        })
    };
    field("PRETTY_NAME")
        .or_else(|| field("NAME"))
        .filter(|s| !s.is_empty())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn format_uptime(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    let (days, rem) = (total / 86_400, total % 86_400);
    let (hours, minutes) = (rem / 3600, (rem % 3600) / 60);
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else {
        format!("{hours}h {minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_root() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("proc/sys/kernel")).unwrap();
        std::fs::create_dir_all(root.join("etc")).unwrap();
        std::fs::write(
            root.join("proc/meminfo"),
            "MemTotal:       16303428 kB\nMemFree:         1203456 kB\nMemAvailable:    8151714 kB\n",
        )
        .unwrap();
        std::fs::write(
            root.join("etc/os-release"),
            "NAME=\"Kylin\"\nPRETTY_NAME=\"Kylin V10 (SP1)\"\nID=kylin\n",
        )
        .unwrap();
        std::fs::write(root.join("proc/sys/kernel/hostname"), "workstation\n").unwrap();
        std::fs::write(root.join("proc/sys/kernel/osrelease"), "5.4.18-110\n").unwrap();
        std::fs::write(root.join("proc/loadavg"), "0.52 0.48 0.40 1/512 12345\n").unwrap();
        std::fs::write(root.join("proc/uptime"), "93784.21 180000.00\n").unwrap();
        std::fs::write(
            root.join("proc/cpuinfo"),
            "processor\t: 0\nmodel name\t: Phytium FT-2000/4\n\nprocessor\t: 1\nmodel name\t: Phytium FT-2000/4\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn procfs_reads_fake_root() {
        let dir = fake_root();
        let source = ProcfsInfo::with_root(dir.path());
        assert!(source.is_available());

        let info = source.collect().unwrap();
        assert_eq!(info["memory_total"], "15921 MiB");
        assert_eq!(info["memory_available"], "7960 MiB");
        assert_eq!(info["os"], "Kylin V10 (SP1)");
        assert_eq!(info["hostname"], "workstation");
        assert_eq!(info["kernel"], "5.4.18-110");
        assert_eq!(info["load_average"], "0.52 0.48 0.40");
        assert_eq!(info["uptime"], "1d 2h 3m");
        assert_eq!(info["cpu_model"], "Phytium FT-2000/4");
        assert_eq!(info["cpu_count"], "2");
    }

    #[test]
    fn procfs_unavailable_without_meminfo() {
        let dir = tempfile::tempdir().unwrap();
        let source = ProcfsInfo::with_root(dir.path());
        assert!(!source.is_available());
        assert!(source.collect().is_err());
    }

    #[test]
    fn portable_always_available() {
        let info = PortableInfo.collect().unwrap();
        assert!(PortableInfo.is_available());
        assert_eq!(info["os"], std::env::consts::OS);
        assert_eq!(info["arch"], std::env::consts::ARCH);
    }

    #[test]
    fn selection_skips_unavailable_sources() {
        let dir = tempfile::tempdir().unwrap();
        let candidates: Vec<Arc<dyn SystemInfoSource>> = vec![
            Arc::new(ProcfsInfo::with_root(dir.path())),
            Arc::new(PortableInfo),
        ];
        let selected = select_source(candidates).unwrap();
        assert_eq!(selected.name(), "portable");
    }

    #[test]
    fn selection_can_find_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let candidates: Vec<Arc<dyn SystemInfoSource>> =
            vec![Arc::new(ProcfsInfo::with_root(dir.path()))];
        assert!(select_source(candidates).is_none());
    }

    #[test]
    fn os_release_falls_back_to_name() {
        assert_eq!(
            os_release_name("NAME=Debian\nID=debian\n").as_deref(),
            Some("Debian")
        );
        assert_eq!(os_release_name("ID=x\n"), None);
    }

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(59.0), "0h 0m");
        assert_eq!(format_uptime(3_725.0), "1h 2m");
    }
}
