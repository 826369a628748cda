use std::fs::{self, File};
use std::os::unix::fs::FileExt;

use super::{ProcessInfo, file_name};
use crate::error::{Error, Result};

pub(super) struct ModuleSpan {
    pub name: String,
    pub base: u64,
    pub size: u64,
}

/// Open `/proc/<pid>/mem`
pub(super) struct RawHandle(File);

impl RawHandle {
    pub(super) fn open(pid: u32) -> Result<Self> {
        let path = format!("/proc/{}/mem", pid);
        File::open(&path)
            .map(Self)
            .map_err(|e| Error::ProcessOpenFailed(format!("{}: {}", path, e)))
    }

    pub(super) fn read(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; size];
        self.0
            .read_exact_at(&mut buffer, address)
            .map_err(|e| Error::read_failed(address, e.to_string()))?;
        Ok(buffer)
    }
}

/// Executable name of a process: first `cmdline` argument, falling back to `comm`.
///
/// Wine processes carry the Windows path of the game in `cmdline`, while
/// `comm` is truncated to 15 characters.
fn process_name(pid: u32) -> Option<String> {
    if let Ok(cmdline) = fs::read(format!("/proc/{}/cmdline", pid)) {
        let first = cmdline.split(|&b| b == 0).next().unwrap_or_default();
        if !first.is_empty() {
            return Some(file_name(&String::from_utf8_lossy(first)).to_string());
        }
    }
    fs::read_to_string(format!("/proc/{}/comm", pid))
        .ok()
        .map(|comm| comm.trim_end().to_string())
}

pub(super) fn find_process(name: &str) -> Result<ProcessInfo> {
    let target = file_name(name);
    let entries = fs::read_dir("/proc")?;

    for entry in entries.flatten() {
        let Some(pid) = entry.file_name().to_str().and_then(|s| s.parse::<u32>().ok()) else {
            continue;
        };
        let Some(exe) = process_name(pid) else {
            continue;
        };
        if exe.eq_ignore_ascii_case(target) {
            return Ok(ProcessInfo { pid, name: exe });
        }
    }

    Err(Error::ProcessNotFound(name.to_string()))
}

/// One line of `/proc/<pid>/maps`: start, end and (possibly empty) path.
fn parse_maps_line(line: &str) -> Option<(u64, u64, &str)> {
    let range = line.split_whitespace().next()?;
    let (start, end) = range.split_once('-')?;
    let start = u64::from_str_radix(start, 16).ok()?;
    let end = u64::from_str_radix(end, 16).ok()?;
    // Paths may contain spaces; none of the fields before it contain '/'
    let path = line.find('/').map(|pos| line[pos..].trim_end()).unwrap_or("");
    Some((start, end, path))
}

/// Span of every mapping whose file name matches the module name.
///
/// Without a name, the module is the executable behind `/proc/<pid>/exe`.
pub(super) fn main_module(pid: u32, name: Option<&str>) -> Result<ModuleSpan> {
    let wanted = match name {
        Some(n) => file_name(n).to_string(),
        None => {
            let exe = fs::read_link(format!("/proc/{}/exe", pid))?;
            file_name(&exe.to_string_lossy()).to_string()
        }
    };

    let maps = fs::read_to_string(format!("/proc/{}/maps", pid))?;
    module_span(&maps, &wanted).ok_or_else(|| {
        Error::ModuleNotFound(format!("{} in PID {}", wanted, pid))
    })
}

fn module_span(maps: &str, wanted: &str) -> Option<ModuleSpan> {
    let mut span: Option<(u64, u64)> = None;

    for (start, end, path) in maps.lines().filter_map(parse_maps_line) {
        if path.is_empty() || !file_name(path).eq_ignore_ascii_case(wanted) {
            continue;
        }
        span = Some(match span {
            Some((lo, hi)) => (lo.min(start), hi.max(end)),
            None => (start, end),
        });
    }

    span.map(|(base, end)| ModuleSpan {
        name: wanted.to_string(),
        base,
        size: end - base,
    })
}
