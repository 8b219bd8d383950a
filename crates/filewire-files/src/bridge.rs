use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{FileError, Result};

/// Lowest handle value ever allocated, leaving the stdio range untouched.
const FIRST_HANDLE: u32 = 3;

/// Narrow interface through which request handlers touch files.
///
/// Handles are bridge-allocated `u32` descriptors; the protocol layer never
/// sees paths or file objects.
pub trait FileBridge {
    fn open_read_only(&mut self, path: &str) -> Result<u32>;
    fn open_write_only(&mut self, path: &str, truncate: bool) -> Result<u32>;
    fn read(&mut self, handle: u32, len: usize) -> Result<Vec<u8>>;
    fn write(&mut self, handle: u32, data: &[u8]) -> Result<u64>;
    fn set_pos(&mut self, handle: u32, offset: u64) -> Result<()>;
    fn offset(&mut self, handle: u32) -> Result<u64>;
    fn close(&mut self, handle: u32) -> Result<()>;
}

/// [`FileBridge`] over the local filesystem.
#[derive(Debug, Default)]
pub struct LocalFileBridge {
    files: HashMap<u32, File>,
    next_handle: u32,
}

impl LocalFileBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently open handles.
    pub fn open_count(&self) -> usize {
        self.files.len()
    }

    fn next_descriptor(&mut self) -> u32 {
        if self.next_handle < FIRST_HANDLE {
            self.next_handle = FIRST_HANDLE;
        }
        // The entire positive range cannot be occupied.
        while self.files.contains_key(&self.next_handle) {
            self.next_handle += 1;
        }
        self.next_handle
    }

    fn file_mut(&mut self, handle: u32) -> Result<&mut File> {
        self.files
            .get_mut(&handle)
            .ok_or(FileError::InvalidHandle(handle))
    }

    fn insert(&mut self, file: File, path: &str) -> u32 {
        let handle = self.next_descriptor();
        self.files.insert(handle, file);
        debug!(handle, path, "opened file");
        handle
    }
}

impl FileBridge for LocalFileBridge {
    fn open_read_only(&mut self, path: &str) -> Result<u32> {
        let file = File::open(Path::new(path))?;
        Ok(self.insert(file, path))
    }

    fn open_write_only(&mut self, path: &str, truncate: bool) -> Result<u32> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(truncate)
            .open(Path::new(path))?;
        Ok(self.insert(file, path))
    }

    fn read(&mut self, handle: u32, len: usize) -> Result<Vec<u8>> {
        let file = self.file_mut(handle)?;
        let mut buf = vec![0u8; len];
        let read = file.read(&mut buf)?;
        buf.truncate(read);
        Ok(buf)
    }

    fn write(&mut self, handle: u32, data: &[u8]) -> Result<u64> {
        let file = self.file_mut(handle)?;
        file.write_all(data)?;
        Ok(data.len() as u64)
    }

    fn set_pos(&mut self, handle: u32, offset: u64) -> Result<()> {
        let file = self.file_mut(handle)?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    fn offset(&mut self, handle: u32) -> Result<u64> {
        let file = self.file_mut(handle)?;
        Ok(file.stream_position()?)
    }

    fn close(&mut self, handle: u32) -> Result<()> {
        match self.files.remove(&handle) {
            Some(_) => {
                debug!(handle, "closed file");
                Ok(())
            }
            None => Err(FileError::InvalidHandle(handle)),
        }
    }
}
