//! Positional byte sources the bit reader pulls from.

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;

/// Random-access byte source.
///
/// Reads take `&self`, so a lookahead read never disturbs whoever is
/// reading sequentially from the same source.
pub trait ByteSource {
    /// Reads up to `buf.len()` bytes starting at `pos`; `Ok(0)` at end.
    fn read_at(&self, buf: &mut [u8], pos: u64) -> io::Result<usize>;

    /// Total size in bytes.
    fn size(&self) -> u64;

    /// Fills `buf` completely or fails with `UnexpectedEof`.
    fn read_exact_at(&self, mut buf: &mut [u8], mut pos: u64) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read_at(buf, pos) {
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(n) => {
                    buf = &mut buf[n..];
                    pos += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl ByteSource for [u8] {
    fn read_at(&self, buf: &mut [u8], pos: u64) -> io::Result<usize> {
        let len = self.len() as u64;
        if pos >= len {
            return Ok(0);
        }
        let start = pos as usize;
        let n = buf.len().min(self.len() - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

impl ByteSource for Vec<u8> {
    fn read_at(&self, buf: &mut [u8], pos: u64) -> io::Result<usize> {
        self[..].read_at(buf, pos)
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

impl ByteSource for Bytes {
    fn read_at(&self, buf: &mut [u8], pos: u64) -> io::Result<usize> {
        self[..].read_at(buf, pos)
    }

    fn size(&self) -> u64 {
        self.len() as u64
    }
}

impl<T: ByteSource + ?Sized> ByteSource for &T {
    fn read_at(&self, buf: &mut [u8], pos: u64) -> io::Result<usize> {
        (**self).read_at(buf, pos)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}

impl<T: ByteSource + ?Sized> ByteSource for Arc<T> {
    fn read_at(&self, buf: &mut [u8], pos: u64) -> io::Result<usize> {
        (**self).read_at(buf, pos)
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}

/// A file opened once for the whole run, read with positional reads.
///
/// Targets without a positional `FileExt` fall back to seek + read under a
/// lock, so the sequential cursor and lookahead reads still never race.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    size: u64,
    #[cfg(not(any(unix, windows)))]
    seek_lock: std::sync::Mutex<()>,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file,
            size,
            #[cfg(not(any(unix, windows)))]
            seek_lock: std::sync::Mutex::new(()),
        })
    }
}

impl ByteSource for FileSource {
    #[cfg(unix)]
    fn read_at(&self, buf: &mut [u8], pos: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(&self.file, buf, pos)
    }

    #[cfg(windows)]
    fn read_at(&self, buf: &mut [u8], pos: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(&self.file, buf, pos)
    }

    #[cfg(not(any(unix, windows)))]
    fn read_at(&self, buf: &mut [u8], pos: u64) -> io::Result<usize> {
        use std::io::{Read, Seek, SeekFrom};

        let _guard = self
            .seek_lock
            .lock()
            .map_err(|_| io::Error::other("file source lock poisoned"))?;
        let mut file = &self.file;
        file.seek(SeekFrom::Start(pos))?;
        file.read(buf)
    }

    fn size(&self) -> u64 {
        self.size
    }
}
