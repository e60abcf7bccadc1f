use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::Result;

/// Reads a text file and returns all its lines as a `Vec<String>`.
///
/// - Reads the entire file into memory
/// - Splits on `\n` / `\r\n`
pub(crate) fn read_file<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
	let mut contents = String::new();
	File::open(filename)?.read_to_string(&mut contents)?;
	Ok(contents.lines().map(str::to_owned).collect())
}

/// Returns the directory a file lives in (`.` for bare file names).
pub(crate) fn parent_dir(path: &Path) -> &Path {
	match path.parent() {
		Some(parent) if !parent.as_os_str().is_empty() => parent,
		_ => Path::new("."),
	}
}

/// Writes `bytes` to `path` without ever exposing a partial file.
///
/// - Creates missing parent directories
/// - Writes to a temporary file in the same directory
/// - Atomically renames it over `path`
pub(crate) fn write_atomic<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
	let path = path.as_ref();
	let dir = parent_dir(path);
	fs::create_dir_all(dir)?;

	let mut tmp = NamedTempFile::new_in(dir)?;
	tmp.write_all(bytes)?;
	tmp.as_file().sync_all()?;
	tmp.persist(path)?;
	Ok(())
}

/// Case-insensitive extension check.
///
/// Example: `model.BIN` has extension `"bin"`.
pub(crate) fn has_extension<P: AsRef<Path>>(path: P, extension: &str) -> bool {
	path.as_ref()
		.extension()
		.is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn write_atomic_creates_directories() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("a/b/c/out.txt");
		write_atomic(&path, b"first\nsecond").unwrap();
		assert_eq!(read_file(&path).unwrap(), vec!["first", "second"]);

		write_atomic(&path, b"replaced").unwrap();
		assert_eq!(read_file(&path).unwrap(), vec!["replaced"]);
	}

	#[test]
	fn parent_of_bare_name_is_current_dir() {
		assert_eq!(parent_dir(Path::new("model.json")), Path::new("."));
		assert_eq!(parent_dir(Path::new("data/model.json")), Path::new("data"));
	}

	#[test]
	fn extension_check() {
		assert!(has_extension("data/model.bin", "bin"));
		assert!(has_extension("model.BIN", "bin"));
		assert!(!has_extension("model.json", "bin"));
		assert!(!has_extension("model", "bin"));
	}
}
