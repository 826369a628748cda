use std::ffi::c_void;
use std::mem::size_of;

use ::windows::Win32::Foundation::{CloseHandle, HANDLE};
use ::windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;
use ::windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, MODULEENTRY32W, Module32FirstW, Module32NextW, PROCESSENTRY32W,
    Process32FirstW, Process32NextW, TH32CS_SNAPMODULE, TH32CS_SNAPMODULE32, TH32CS_SNAPPROCESS,
};
use ::windows::Win32::System::Threading::{
    OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION, PROCESS_VM_READ,
};

use super::{ProcessInfo, file_name};
use crate::error::{Error, Result};

pub(super) struct ModuleSpan {
    pub name: String,
    pub base: u64,
    pub size: u64,
}

/// Owned Win32 handle, closed on drop
pub(super) struct RawHandle(HANDLE);

impl RawHandle {
    pub(super) fn open(pid: u32) -> Result<Self> {
        let handle =
            unsafe { OpenProcess(PROCESS_VM_READ | PROCESS_QUERY_LIMITED_INFORMATION, false, pid) }
                .map_err(|e| Error::ProcessOpenFailed(format!("PID {}: {}", pid, e)))?;
        Ok(Self(handle))
    }

    pub(super) fn read(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; size];
        let mut bytes_read = 0usize;

        unsafe {
            ReadProcessMemory(
                self.0,
                address as *const c_void,
                buffer.as_mut_ptr() as *mut c_void,
                size,
                Some(&mut bytes_read),
            )
        }
        .map_err(|e| Error::read_failed(address, e.to_string()))?;

        if bytes_read != size {
            return Err(Error::read_failed(
                address,
                format!("partial read: {} of {} bytes", bytes_read, size),
            ));
        }
        Ok(buffer)
    }
}

impl Drop for RawHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

fn wide_to_string(wide: &[u16]) -> String {
    let len = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    String::from_utf16_lossy(&wide[..len])
}

pub(super) fn find_process(name: &str) -> Result<ProcessInfo> {
    let target = file_name(name);
    let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }
        .map(RawHandle)
        .map_err(|e| Error::ProcessNotFound(format!("{}: {}", name, e)))?;

    let mut entry = PROCESSENTRY32W {
        dwSize: size_of::<PROCESSENTRY32W>() as u32,
        ..Default::default()
    };

    let mut more = unsafe { Process32FirstW(snapshot.0, &mut entry) }.is_ok();
    while more {
        let exe = wide_to_string(&entry.szExeFile);
        if exe.eq_ignore_ascii_case(target) {
            return Ok(ProcessInfo {
                pid: entry.th32ProcessID,
                name: exe,
            });
        }
        more = unsafe { Process32NextW(snapshot.0, &mut entry) }.is_ok();
    }

    Err(Error::ProcessNotFound(name.to_string()))
}

/// The main module is the first module of the snapshot unless a name is given.
pub(super) fn main_module(pid: u32, name: Option<&str>) -> Result<ModuleSpan> {
    let snapshot =
        unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, pid) }
            .map(RawHandle)
            .map_err(|e| Error::ProcessOpenFailed(format!("PID {}: {}", pid, e)))?;

    let mut entry = MODULEENTRY32W {
        dwSize: size_of::<MODULEENTRY32W>() as u32,
        ..Default::default()
    };

    let mut more = unsafe { Module32FirstW(snapshot.0, &mut entry) }.is_ok();
    while more {
        let module = wide_to_string(&entry.szModule);
        let wanted = name.is_none_or(|n| module.eq_ignore_ascii_case(file_name(n)));
        if wanted {
            return Ok(ModuleSpan {
                name: module,
                base: entry.modBaseAddr as u64,
                size: entry.modBaseSize as u64,
            });
        }
        more = unsafe { Module32NextW(snapshot.0, &mut entry) }.is_ok();
    }

    Err(Error::ModuleNotFound(format!(
        "{} in PID {}",
        name.unwrap_or("main module"),
        pid
    )))
}
