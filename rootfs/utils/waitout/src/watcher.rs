/*
 * waitout
 * block until a file appears at a path, with an optional timeout
 *
 * flow:
 * - optionally remove whatever is at the path first (best-effort)
 * - if the path already exists, done: no watch is ever armed
 * - otherwise arm an IN_CREATE|IN_MOVED_TO watch on the parent dir, then check once more
 * - poll the inotify fd against the shrinking deadline until the leaf name shows up
 *
 * assumptions:
 * - only the parent dir is watched. creating intermediate dirs, or replacing the parent dir, is not seen
 * - the deadline is measured on CLOCK_MONOTONIC from when the wait starts
 */

use std::{ffi::OsStr, path::Path};

use nix::{
    errno::Errno,
    sys::inotify::AddWatchFlags,
    unistd::{access, AccessFlags},
};
use tracing::{debug, trace};

use crate::{
    deadline::{Clock, Deadline, MonotonicClock, Remaining},
    error::{WaitError, WaitResult},
    sys::{
        inotify::{EventRecords, InotifyChannel, ARRIVAL, EVENT_HEADER_LEN},
        poll::poll_readable,
    },
    target::{WatchTarget, NAME_MAX},
};

// room for a few maximal records per read
pub const EVENT_BUF_LEN: usize = 4 * (EVENT_HEADER_LEN + NAME_MAX + 1);

#[derive(Debug, Clone)]
pub struct WaitConfig {
    pub target: WatchTarget,
    pub timeout_secs: Option<i64>,
    pub purge: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Outcome {
    Satisfied,
    Expired,
}

/// An armed watch. Dropping it releases the watch.
pub trait EventChannel {
    /// Ok(false) = nothing ready before the timeout.
    fn wait_readable(&mut self, timeout_ms: Option<u64>) -> nix::Result<bool>;
    fn read_events(&mut self, buf: &mut [u8]) -> nix::Result<usize>;
}

pub trait WatchBackend {
    type Channel: EventChannel;

    fn arm(&mut self, directory: &Path, mask: AddWatchFlags) -> WaitResult<Self::Channel>;
}

#[derive(Debug, Default, Copy, Clone)]
pub struct InotifyBackend;

impl WatchBackend for InotifyBackend {
    type Channel = InotifyChannel;

    fn arm(&mut self, directory: &Path, mask: AddWatchFlags) -> WaitResult<InotifyChannel> {
        let channel = InotifyChannel::open().map_err(WaitError::arm("inotify_init1"))?;
        channel
            .add_watch(directory, mask)
            .map_err(WaitError::arm("inotify_add_watch"))?;
        Ok(channel)
    }
}

impl EventChannel for InotifyChannel {
    fn wait_readable(&mut self, timeout_ms: Option<u64>) -> nix::Result<bool> {
        poll_readable(&*self, timeout_ms)
    }

    fn read_events(&mut self, buf: &mut [u8]) -> nix::Result<usize> {
        self.read(buf)
    }
}

fn exists(path: &Path) -> bool {
    access(path, AccessFlags::F_OK).is_ok()
}

// remove(3): unlink, or rmdir if it's an (empty) directory
fn purge(path: &Path) {
    let removed = std::fs::remove_file(path).or_else(|e| {
        match e.raw_os_error().map(Errno::from_raw) {
            Some(Errno::EISDIR | Errno::EPERM) => std::fs::remove_dir(path),
            _ => Err(e),
        }
    });
    match removed {
        Ok(()) => debug!("purged {}", path.display()),
        Err(e) => trace!("purge {}: {}", path.display(), e),
    }
}

pub struct Watcher<B, C> {
    backend: B,
    clock: C,
}

impl Watcher<InotifyBackend, MonotonicClock> {
    pub fn new() -> Self {
        Self::with_parts(InotifyBackend, MonotonicClock)
    }
}

impl Default for Watcher<InotifyBackend, MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: WatchBackend, C: Clock> Watcher<B, C> {
    pub fn with_parts(backend: B, clock: C) -> Self {
        Self { backend, clock }
    }

    pub fn wait_for(&mut self, config: &WaitConfig) -> WaitResult<Outcome> {
        let deadline = Deadline::start(config.timeout_secs, &self.clock)
            .map_err(WaitError::io("clock_gettime"))?;
        let target = &config.target;

        if config.purge {
            purge(target.path());
        }

        if exists(target.path()) {
            debug!("{} already exists", target.path().display());
            return Ok(Outcome::Satisfied);
        }

        let mut channel = self.backend.arm(target.directory(), ARRIVAL)?;
        debug!("watching {} for {:?}", target.directory().display(), target.leaf_name());

        // closes the window between the check above and add_watch
        if exists(target.path()) {
            debug!("{} appeared while arming", target.path().display());
            return Ok(Outcome::Satisfied);
        }

        event_loop(&mut channel, target.leaf_name(), &deadline, &self.clock)
    }
}

fn event_loop<Ch: EventChannel>(
    channel: &mut Ch,
    leaf_name: &OsStr,
    deadline: &Deadline,
    clock: &impl Clock,
) -> WaitResult<Outcome> {
    let mut buf = [0u8; EVENT_BUF_LEN];

    loop {
        // always re-check the deadline before blocking again
        let timeout_ms = match deadline
            .remaining(clock)
            .map_err(WaitError::io("clock_gettime"))?
        {
            Remaining::Expired => {
                debug!("deadline expired");
                return Ok(Outcome::Expired);
            }
            Remaining::Unbounded => None,
            Remaining::Millis(ms) => Some(ms),
        };

        match channel.wait_readable(timeout_ms) {
            Ok(true) => {}
            // timed out: loop around so the deadline check decides
            Ok(false) => continue,
            Err(Errno::EINTR) => {
                trace!("poll interrupted");
                continue;
            }
            Err(e) => return Err(WaitError::io("poll")(e)),
        }

        let n = match channel.read_events(&mut buf) {
            Ok(n) => n.min(buf.len()),
            Err(Errno::EAGAIN | Errno::EINTR) => continue,
            Err(e) => return Err(WaitError::io("read")(e)),
        };

        for record in EventRecords::new(&buf[..n]) {
            trace!("event {:?} {:?}", record.mask, record.name);
            if record.is_arrival() && record.name == leaf_name {
                return Ok(Outcome::Satisfied);
            }
        }
    }
}
