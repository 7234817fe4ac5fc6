// LogTailer - platform/fs.rs
//
// Platform-specific file access for the local tail source.
// Tailed files are written by other processes, so they are opened without
// blocking the writer (Windows share modes) and identified by device/inode on
// Unix to notice rename-based rotation.

use std::fs::{File, Metadata, OpenOptions};
use std::io;
use std::path::Path;

/// Open `path` for reading while allowing concurrent writers, renames and
/// deletes.
pub fn open_shared(path: &Path) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true);

    #[cfg(windows)]
    {
        use std::os::windows::fs::OpenOptionsExt;
        // FILE_SHARE_READ | FILE_SHARE_WRITE | FILE_SHARE_DELETE
        options.share_mode(0x0000_0007);
    }

    options.open(path)
}

/// Whether two metadata snapshots describe the same underlying file.
///
/// Only Unix exposes a stable identity; elsewhere this always returns true and
/// rotation is detected by length alone.
pub fn same_file(a: &Metadata, b: &Metadata) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        a.dev() == b.dev() && a.ino() == b.ino()
    }
    #[cfg(not(unix))]
    {
        let _ = (a, b);
        true
    }
}

/// True when `path` currently names a different file than the one `opened`
/// describes. A missing path is not treated as rotated: the old handle is
/// still readable until a replacement appears.
pub fn path_rotated(path: &Path, opened: &Metadata) -> bool {
    match std::fs::metadata(path) {
        Ok(current) => !same_file(&current, opened),
        Err(_) => false,
    }
}
