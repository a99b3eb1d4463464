//! File helpers shared by the database and the PAC writer.
//!
//! Both the PAC file and the user-rule file are also touched by programs we
//! do not control (editors, browsers), so reads never lock and writes go
//! through a temp file in the same directory followed by a rename.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::Result;

/// Read a UTF-8 text file without taking an exclusive lock.
pub fn read_shared(path: &Path) -> Result<String> {
    // std opens with full share mode on Windows and never locks elsewhere.
    Ok(fs::read_to_string(path)?)
}

/// Replace `path` with `data` so readers see either the old or new content.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
