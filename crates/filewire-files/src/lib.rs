//! Remote-file method suite for filewire.
//!
//! Exposes local file access to a remote peer through the RPC layer: open,
//! read, write, seek, and close on bridge-allocated handles, plus an
//! interactive select-file method whose answer arrives out-of-band from a
//! [`FilePicker`] (a UI dialog, typically) long after the request handler
//! has returned.

pub mod bridge;
pub mod error;
pub mod picker;
pub mod router;
pub mod wire;

pub use bridge::{FileBridge, LocalFileBridge};
pub use error::{FileError, Result};
pub use picker::{ContentInfo, FilePicker, NoPicker};
pub use router::{
    file_router, CLOSE, OFFSET, OPEN_READ_ONLY, OPEN_WRITE_ONLY, READ, SELECT_FILE, SET_POS,
    WRITE,
};
