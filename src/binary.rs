//! Binary-file inclusion: streaming an external file's bytes directly
//! into a section's data, with an optional start offset and length.

use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::{
    cursor,
    diag::{DiagnosticMessage, Diagnostics},
    fstack::SrcLocation,
    section::Section,
};

/// Resolves an `INCBIN`-style file name against the engine's include
/// path list and hands back something seekable and readable. Kept as a
/// trait so tests can substitute an in-memory filesystem instead of
/// touching disk.
pub trait IncludeResolver {
    /// The concrete reader type this resolver hands back.
    type File: Read + Seek;

    /// Locate `name`, trying each configured include path in order.
    /// Returns the opened file and its total size in bytes.
    fn open(&self, name: &str) -> Result<(Self::File, u64), io::Error>;
}

/// An [`IncludeResolver`] that reads straight from the local filesystem,
/// trying `include_paths` in order before falling back to treating
/// `name` as already relative to the working directory.
pub struct FsIncludeResolver<'a> {
    /// Directories searched, in order, before giving up.
    pub include_paths: &'a [std::path::PathBuf],
}

impl<'a> IncludeResolver for FsIncludeResolver<'a> {
    type File = std::fs::File;

    fn open(&self, name: &str) -> Result<(Self::File, u64), io::Error> {
        let candidates = std::iter::once(Path::new(name).to_path_buf())
            .chain(self.include_paths.iter().map(|dir| dir.join(name)));

        let mut last_err = None;
        for candidate in candidates {
            match std::fs::File::open(&candidate) {
                Ok(file) => {
                    let size = file.metadata()?.len();
                    return Ok((file, size));
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, name.to_string())))
    }
}

/// Stream `length` bytes (or, if `None`, everything to end of file)
/// starting at `start` from `name` (resolved via `resolver`) into
/// `section` at `offset`.
pub fn include_binary_file<R: IncludeResolver>(
    resolver: &R,
    name: &str,
    start: u64,
    length: Option<u64>,
    section: &mut Section,
    offset: u32,
    loc: SrcLocation,
    diag: &mut dyn Diagnostics,
) -> Result<u32, ()> {
    let (mut file, size) = resolver.open(name).map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            diag.error(loc, DiagnosticMessage::IncludeFileNotFound { name: name.to_string() });
        } else {
            diag.error(loc, DiagnosticMessage::IncludeIoError { name: name.to_string(), kind: err.kind() });
        }
    })?;

    if start > size {
        diag.error(loc, DiagnosticMessage::IncludeStartBeyondEof { name: name.to_string(), start, size });
        return Err(());
    }

    let available = size - start;
    let length = length.unwrap_or(available);
    if length > available {
        diag.error(
            loc,
            DiagnosticMessage::IncludeLengthPastEof { name: name.to_string(), start, length, size },
        );
        return Err(());
    }

    file.seek(SeekFrom::Start(start))
        .map_err(|err| diag.error(loc, DiagnosticMessage::IncludeIoError { name: name.to_string(), kind: err.kind() }))?;

    let mut buf = vec![0u8; length as usize];
    file.read_exact(&mut buf)
        .map_err(|err| diag.error(loc, DiagnosticMessage::IncludeIoError { name: name.to_string(), kind: err.kind() }))?;

    cursor::write_bytes(section, offset, &buf, loc, diag)
}
