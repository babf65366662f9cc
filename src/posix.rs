//! Thin wrappers over the OS process-plumbing primitives.

use std::fs::{File, OpenOptions};
use std::io;

/// Create an OS pipe, returned as `(read_end, write_end)`.
///
/// Both ends are close-on-exec: a child only inherits the end that is
/// deliberately wired to one of its standard streams.
#[cfg(unix)]
pub fn pipe() -> io::Result<(File, File)> {
    use std::os::unix::io::FromRawFd;

    let mut fds = [0 as libc::c_int; 2];
    check_err(unsafe { libc::pipe(fds.as_mut_ptr()) })?;
    for fd in fds {
        if let Err(err) = check_err(unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) }) {
            unsafe {
                libc::close(fds[0]);
                libc::close(fds[1]);
            }
            return Err(err);
        }
    }
    Ok(unsafe { (File::from_raw_fd(fds[0]), File::from_raw_fd(fds[1])) })
}

#[cfg(not(unix))]
pub fn pipe() -> io::Result<(File, File)> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "pipelines require an OS pipe primitive",
    ))
}

#[cfg(unix)]
fn check_err(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(ret)
}

/// Open the platform null sink for writing.
pub fn dev_null() -> io::Result<File> {
    let path = if cfg!(windows) { "NUL" } else { "/dev/null" };
    OpenOptions::new().write(true).open(path)
}
