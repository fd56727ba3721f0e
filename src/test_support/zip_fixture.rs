//! In-test zip archive builder.

#![allow(clippy::expect_used)]

use std::fs::File;
use std::io::Write;
use std::path::Path;

use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

/// One record to place in a fixture archive.
#[derive(Debug, Clone, Copy)]
pub enum FixtureEntry<'a> {
    /// Deflated file with the given contents.
    File(&'a str, &'a [u8]),
    /// Stored file with the given contents and Unix permission bits.
    FileWithMode(&'a str, &'a [u8], u32),
    /// Directory record.
    Dir(&'a str),
    /// Symbolic link record pointing at the given target.
    Symlink(&'a str, &'a str),
}

/// Writes a zip archive at `path` holding `entries` in order.
///
/// # Panics
///
/// Panics on any I/O or zip error.
pub fn write_zip(path: &Path, entries: &[FixtureEntry<'_>]) {
    let file = File::create(path).expect("create fixture archive");
    let mut writer = zip::ZipWriter::new(file);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        match *entry {
            FixtureEntry::File(name, contents) => {
                writer.start_file(name, deflated).expect("start file");
                writer.write_all(contents).expect("write contents");
            }
            FixtureEntry::FileWithMode(name, contents, mode) => {
                let options = SimpleFileOptions::default()
                    .compression_method(CompressionMethod::Stored)
                    .unix_permissions(mode);
                writer.start_file(name, options).expect("start file");
                writer.write_all(contents).expect("write contents");
            }
            FixtureEntry::Dir(name) => {
                writer.add_directory(name, deflated).expect("add directory");
            }
            FixtureEntry::Symlink(name, target) => {
                writer
                    .add_symlink(name, target, deflated)
                    .expect("add symlink");
            }
        }
    }

    writer.finish().expect("finish fixture archive");
}
