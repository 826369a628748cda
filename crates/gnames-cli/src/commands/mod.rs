pub mod find;
pub mod hex_utils;
pub mod hexdump;
pub mod image;

use std::path::PathBuf;

use anyhow::{Result, bail};
use gnames_core::{
    AddressSpace, GNamesSearcher, ProcessHandle, ReadMemory, SearchConfig, StructureKind,
};

/// Which process to attach to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Pid(u32),
    Name(String),
}

impl Target {
    pub fn from_args(name: Option<&str>, pid: Option<u32>) -> Result<Self> {
        match (pid, name) {
            (Some(pid), _) => Ok(Self::Pid(pid)),
            (None, Some(name)) => Ok(Self::Name(name.to_string())),
            (None, None) => bail!("Specify the target with --name or --pid"),
        }
    }

    pub fn open(&self) -> Result<ProcessHandle> {
        let process = match self {
            Self::Pid(pid) => ProcessHandle::open(*pid)?,
            Self::Name(name) => ProcessHandle::find_and_open(name)?,
        };
        Ok(process)
    }
}

/// Settings shared by the search commands
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub config: SearchConfig,
    /// Empty means the default order
    pub strategies: Vec<StructureKind>,
    pub json: bool,
    pub output: Option<PathBuf>,
    pub preview: usize,
}

impl SearchOptions {
    pub fn searcher<'a, R: ReadMemory + ?Sized>(
        &self,
        reader: &'a R,
        space: AddressSpace,
    ) -> Result<GNamesSearcher<'a, R>> {
        let searcher = GNamesSearcher::new(reader, space, &self.config)?;
        Ok(if self.strategies.is_empty() {
            searcher
        } else {
            searcher.with_strategies(&self.strategies)
        })
    }
}
