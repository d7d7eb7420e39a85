use std::{
    ffi::OsStr,
    os::{
        fd::{AsFd, AsRawFd, BorrowedFd, RawFd},
        unix::ffi::OsStrExt,
    },
    path::Path,
};

use nix::{
    sys::inotify::{AddWatchFlags, InitFlags, Inotify},
    unistd::read,
};

// wd, mask, cookie, len. the name follows, padded with NULs up to len
pub const EVENT_HEADER_LEN: usize = std::mem::size_of::<libc::inotify_event>();

/// An entry showed up in the watched directory under a (possibly new) name.
pub const ARRIVAL: AddWatchFlags = AddWatchFlags::IN_CREATE.union(AddWatchFlags::IN_MOVED_TO);

/// Non-blocking, close-on-exec inotify instance. Closed on drop.
pub struct InotifyChannel {
    inotify: Inotify,
}

impl InotifyChannel {
    pub fn open() -> nix::Result<Self> {
        let inotify = Inotify::init(InitFlags::IN_NONBLOCK | InitFlags::IN_CLOEXEC)?;
        Ok(Self { inotify })
    }

    pub fn add_watch(&self, dir: &Path, mask: AddWatchFlags) -> nix::Result<()> {
        self.inotify.add_watch(dir, mask)?;
        Ok(())
    }

    /// Raw read of queued records, left undecoded. EAGAIN when nothing is queued.
    pub fn read(&self, buf: &mut [u8]) -> nix::Result<usize> {
        read(self.inotify.as_fd(), buf)
    }
}

impl AsFd for InotifyChannel {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inotify.as_fd()
    }
}

impl AsRawFd for InotifyChannel {
    fn as_raw_fd(&self) -> RawFd {
        self.inotify.as_fd().as_raw_fd()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EventRecord<'a> {
    pub wd: i32,
    pub mask: AddWatchFlags,
    pub cookie: u32,
    pub name: &'a OsStr,
}

impl EventRecord<'_> {
    pub fn is_arrival(&self) -> bool {
        self.mask.intersects(ARRIVAL)
    }
}

/// Walks the records in the bytes returned by one read().
///
/// Each record is advanced by its own `len` field, never a fixed stride.
/// A trailing partial header, or a name that runs past the end of the
/// buffer, ends the iteration instead of being decoded.
#[derive(Debug, Clone)]
pub struct EventRecords<'a> {
    buf: &'a [u8],
}

impl<'a> EventRecords<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }
}

fn ne_u32(b: &[u8], at: usize) -> u32 {
    u32::from_ne_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

impl<'a> Iterator for EventRecords<'a> {
    type Item = EventRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let buf = self.buf;
        let header = buf.get(..EVENT_HEADER_LEN)?;
        let name_len = ne_u32(header, 12) as usize;

        let Some(name) = EVENT_HEADER_LEN
            .checked_add(name_len)
            .and_then(|end| buf.get(EVENT_HEADER_LEN..end))
        else {
            // truncated: don't guess at the rest
            self.buf = &[];
            return None;
        };

        let record = EventRecord {
            wd: ne_u32(header, 0) as i32,
            mask: AddWatchFlags::from_bits_retain(ne_u32(header, 4)),
            cookie: ne_u32(header, 8),
            name: OsStr::from_bytes(match name.iter().position(|&b| b == 0) {
                Some(nul) => &name[..nul],
                None => name,
            }),
        };

        self.buf = &buf[EVENT_HEADER_LEN + name_len..];
        Some(record)
    }
}
