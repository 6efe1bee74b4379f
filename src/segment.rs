use crate::error::RecycleError;
use crate::identity::{slot_from_raw, slot_to_raw, Slot};
use crate::logging::{log_event, Severity};
use crate::register::ExitRegister;

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt as _;
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};

/// Marks a region written by this crate (layout version 1)
pub const SEGMENT_MAGIC: &[u8; 8] = b"BUMPYLF1";

/// Region layout: magic (8) | host instance id u32 LE (4) | slot u32 LE (4)
pub const SEGMENT_SIZE: u64 = 16;

const HOST_OFFSET: u64 = 8;
const SLOT_OFFSET: u64 = 12;

/// How `SharedSegment::open` obtained its region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentOrigin {
    /// First allocation for this host instance; the slot was set to none
    Created,
    /// Pre-existing region of the same host instance; the slot was kept
    Attached,
}

/// File-backed shared region holding the pending-exit slot
///
/// The mutex is an exclusive `flock()` on the segment file. Locks belong to
/// the open file description, so every worker (and every `SharedSegment` in
/// the same process) must open the file itself.
#[derive(Debug)]
pub struct SharedSegment {
    file: File,
    path: String,
    host_id: u32,
    origin: SegmentOrigin,
}

/// Returns the user-specific runtime directory for the segment
///
/// Priority order:
/// 1. $XDG_RUNTIME_DIR (if set, e.g., /run/user/1000/)
/// 2. /tmp (fallback, with UID suffix added to filename)
fn get_runtime_dir() -> String {
    std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string())
}

/// Returns the fixed segment path for this user
///
/// - With XDG_RUNTIME_DIR: $XDG_RUNTIME_DIR/bumpylife.shm
/// - Without XDG_RUNTIME_DIR: /tmp/bumpylife_<uid>.shm
pub fn default_segment_path() -> String {
    let runtime_dir = get_runtime_dir();
    let program_name = crate::PROGRAM_NAME;

    if runtime_dir != "/tmp" {
        format!("{}/{}.shm", runtime_dir, program_name)
    } else {
        let uid = unsafe { libc::getuid() };
        format!("/tmp/{}_{}.shm", program_name, uid)
    }
}

/// Identity of the supervising host process, used to tell a reload (same
/// supervisor) from a full restart (new supervisor)
pub fn host_instance_id() -> u32 {
    std::os::unix::process::parent_id()
}

/// Runs `op` with the exclusive lock held; the lock is released on every path
fn locked<T>(
    file: &File,
    op: impl FnOnce(&File) -> Result<T, RecycleError>,
) -> Result<T, RecycleError> {
    file.lock_exclusive().map_err(RecycleError::Lock)?;
    let file = scopeguard::guard(file, |f| {
        let _ = fs2::FileExt::unlock(f);
    });
    op(*file)
}

/// Opens the segment file without following a symlink, creating it
/// owner-only when `create` is set
fn open_segment_file(path: &str, create: bool) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(create)
        .mode(0o600)
        .custom_flags(libc::O_NOFOLLOW)
        .open(path)
}

/// Refuses a segment file belonging to another user: whoever can write the
/// slot chooses which process gets signalled
fn ensure_owner(file: &File, uid: u32) -> io::Result<()> {
    let owner = file.metadata()?.uid();
    if owner != uid {
        return Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("owned by uid {}, expected uid {}", owner, uid),
        ));
    }
    Ok(())
}

/// Reads `(host_id, raw_slot)`, or `None` if the region is short or foreign
fn read_header(file: &File) -> io::Result<Option<(u32, u32)>> {
    if file.metadata()?.len() < SEGMENT_SIZE {
        return Ok(None);
    }
    let mut buf = [0u8; SEGMENT_SIZE as usize];
    file.read_exact_at(&mut buf, 0)?;
    if &buf[..8] != SEGMENT_MAGIC {
        return Ok(None);
    }
    let host = u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
    let slot = u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);
    Ok(Some((host, slot)))
}

fn write_fresh(file: &File, host_id: u32) -> io::Result<()> {
    let mut buf = [0u8; SEGMENT_SIZE as usize];
    buf[..8].copy_from_slice(SEGMENT_MAGIC);
    buf[HOST_OFFSET as usize..SLOT_OFFSET as usize].copy_from_slice(&host_id.to_le_bytes());
    file.set_len(SEGMENT_SIZE)?;
    file.write_all_at(&buf, 0)
}

impl SharedSegment {
    /// Creates or attaches the segment for host instance `host_id`
    ///
    /// A region left by the same host instance is attached and its slot kept,
    /// so coordination state survives a configuration reload. Anything else
    /// (missing, truncated, foreign or older host) is reinitialized with an
    /// empty slot.
    ///
    /// # Errors
    /// Any failure is fatal for the subsystem and reported as `RecycleError::Segment`.
    pub fn open(path: &str, host_id: u32) -> Result<Self, RecycleError> {
        let segment_err = |source: io::Error| RecycleError::Segment {
            path: path.to_string(),
            source,
        };

        let file = open_segment_file(path, true).map_err(segment_err)?;
        ensure_owner(&file, unsafe { libc::getuid() }).map_err(segment_err)?;

        let (origin, slot) = locked(&file, |file| {
            match read_header(file).map_err(segment_err)? {
                Some((host, raw)) if host == host_id => {
                    Ok((SegmentOrigin::Attached, slot_from_raw(raw)))
                }
                _ => {
                    write_fresh(file, host_id).map_err(segment_err)?;
                    Ok((SegmentOrigin::Created, None))
                }
            }
        })?;

        match origin {
            SegmentOrigin::Created => {
                let _ = log_event(
                    Severity::Info,
                    &format!("Created shared segment {} for host {}", path, host_id),
                );
            }
            SegmentOrigin::Attached => {
                let _ = log_event(
                    Severity::Info,
                    &format!(
                        "Attached to shared segment {} (pending exit: {})",
                        path,
                        describe_slot(slot)
                    ),
                );
            }
        }

        Ok(SharedSegment {
            file,
            path: path.to_string(),
            host_id,
            origin,
        })
    }

    /// Attaches to an already initialized segment without touching it
    ///
    /// Used by inspection tools that are not part of any host instance.
    pub fn attach_existing(path: &str) -> Result<Self, RecycleError> {
        let file = match open_segment_file(path, false) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(RecycleError::SegmentUninitialized {
                    path: path.to_string(),
                })
            }
            Err(e) => {
                return Err(RecycleError::Segment {
                    path: path.to_string(),
                    source: e,
                })
            }
        };

        ensure_owner(&file, unsafe { libc::getuid() }).map_err(|source| RecycleError::Segment {
            path: path.to_string(),
            source,
        })?;

        let header = locked(&file, |file| Ok(read_header(file)?))?;
        let Some((host_id, _)) = header else {
            return Err(RecycleError::SegmentUninitialized {
                path: path.to_string(),
            });
        };

        Ok(SharedSegment {
            file,
            path: path.to_string(),
            host_id,
            origin: SegmentOrigin::Attached,
        })
    }

    pub fn origin(&self) -> SegmentOrigin {
        self.origin
    }

    pub fn host_id(&self) -> u32 {
        self.host_id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Detaches from the region. The stored slot is left as is.
    pub fn close(self) {
        drop(self.file);
    }
}

impl ExitRegister for SharedSegment {
    fn transact<F, T>(&self, op: F) -> Result<T, RecycleError>
    where
        F: FnOnce(&mut Slot) -> T,
    {
        locked(&self.file, |file| {
            let (_, raw) = read_header(file)?.ok_or_else(|| RecycleError::SegmentUninitialized {
                path: self.path.clone(),
            })?;
            let before = slot_from_raw(raw);
            let mut slot = before;
            let out = op(&mut slot);
            if slot != before {
                file.write_all_at(&slot_to_raw(slot).to_le_bytes(), SLOT_OFFSET)?;
            }
            Ok(out)
        })
    }
}

/// Human-readable slot value for logs and the CLI
pub fn describe_slot(slot: Slot) -> String {
    match slot {
        Some(worker) => worker.to_string(),
        None => "none".to_string(),
    }
}
