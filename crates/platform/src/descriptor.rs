use std::fs::File;
use std::io;

/// Closes `file`, surfacing the result of `close(2)`.
///
/// Dropping a [`File`] silently discards close failures. Writers that must
/// report deferred write errors (NFS, quota) call this instead.
#[cfg(unix)]
pub fn close_file(file: File) -> io::Result<()> {
    use std::os::fd::IntoRawFd;

    nix::unistd::close(file.into_raw_fd()).map_err(io::Error::from)
}

/// Closes `file`.
///
/// Handle close failures are not observable on this platform.
#[cfg(not(unix))]
pub fn close_file(file: File) -> io::Result<()> {
    drop(file);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn close_file_flushes_and_releases() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("closed.txt");
        let mut file = File::create(&path).expect("create");
        file.write_all(b"data").expect("write");

        close_file(file).expect("close");
        assert_eq!(std::fs::read(&path).expect("read"), b"data");
    }
}
