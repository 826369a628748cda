mod image;
pub mod layout;
mod pattern;
mod process;
mod reader;
mod space;

#[cfg(any(test, feature = "testing"))]
pub mod mock;

pub use image::ImageReader;
pub use pattern::{BytePattern, PatternByte};
pub use process::{ProcessHandle, ProcessInfo};
pub use reader::{MemoryReader, ReadMemory, SCAN_CHUNK_SIZE, scan_chunked};
pub use space::{
    AddressSpace, MAX_USER_ADDRESS, MIN_POINTER_VALUE, ModuleMemory, is_plausible_pointer,
    is_readable, is_user_space_pointer,
};

#[cfg(any(test, feature = "testing"))]
pub use mock::{MockMemoryBuilder, MockMemoryReader};
