//! Attachment to a running target process.
//!
//! Windows goes through the ToolHelp snapshot API and `ReadProcessMemory`.
//! Linux reads `/proc/<pid>/maps` and `/proc/<pid>/mem`, which covers games
//! running under Wine or Proton.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "windows")]
mod win32;

#[cfg(target_os = "linux")]
use linux as platform;
#[cfg(target_os = "windows")]
use win32 as platform;

use tracing::debug;

use crate::error::Result;
#[cfg(not(any(target_os = "windows", target_os = "linux")))]
use crate::error::Error;
use crate::memory::AddressSpace;

/// Basic information about a running process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
}

/// An opened target process and the span of its main module
pub struct ProcessHandle {
    pub pid: u32,
    pub module_name: String,
    pub base_address: u64,
    pub module_size: u64,
    #[cfg(any(target_os = "windows", target_os = "linux"))]
    raw: platform::RawHandle,
}

impl ProcessHandle {
    /// Open the process with the given PID and locate its main module.
    #[cfg(any(target_os = "windows", target_os = "linux"))]
    pub fn open(pid: u32) -> Result<Self> {
        let module = platform::main_module(pid, None)?;
        Self::open_with_module(pid, module)
    }

    /// Find a process by executable name (case-insensitive) and open it.
    #[cfg(any(target_os = "windows", target_os = "linux"))]
    pub fn find_and_open(name: &str) -> Result<Self> {
        let info = platform::find_process(name)?;
        debug!("Found {} (PID: {})", info.name, info.pid);
        let module = platform::main_module(info.pid, Some(name))?;
        Self::open_with_module(info.pid, module)
    }

    #[cfg(any(target_os = "windows", target_os = "linux"))]
    fn open_with_module(pid: u32, module: platform::ModuleSpan) -> Result<Self> {
        let raw = platform::RawHandle::open(pid)?;
        debug!(
            "Attached to PID {}: module {} at 0x{:X} (size 0x{:X})",
            pid, module.name, module.base, module.size
        );
        Ok(Self {
            pid,
            module_name: module.name,
            base_address: module.base,
            module_size: module.size,
            raw,
        })
    }

    #[cfg(any(target_os = "windows", target_os = "linux"))]
    pub fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        self.raw.read(address, size)
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux")))]
    pub fn open(pid: u32) -> Result<Self> {
        Err(Error::ProcessOpenFailed(format!(
            "PID {}: process attachment is not supported on this platform",
            pid
        )))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux")))]
    pub fn find_and_open(name: &str) -> Result<Self> {
        Err(Error::ProcessNotFound(format!(
            "{}: process attachment is not supported on this platform",
            name
        )))
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux")))]
    pub fn read_bytes(&self, address: u64, _size: usize) -> Result<Vec<u8>> {
        Err(Error::read_failed(address, "unsupported platform"))
    }

    pub fn info(&self) -> ProcessInfo {
        ProcessInfo {
            pid: self.pid,
            name: self.module_name.clone(),
        }
    }

    /// Span of the main module, the valid range for every search
    pub fn address_space(&self) -> AddressSpace {
        AddressSpace::new(self.base_address, self.module_size)
    }
}

/// Strip directories (either separator) from a path-like process name.
pub(crate) fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_handles_both_separators() {
        assert_eq!(file_name("C:\\Games\\Game-Win64-Shipping.exe"), "Game-Win64-Shipping.exe");
        assert_eq!(file_name("/home/u/.wine/drive_c/Game.exe"), "Game.exe");
        assert_eq!(file_name("Game.exe"), "Game.exe");
    }
}
