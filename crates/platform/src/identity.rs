/// Returns the effective user id of the current process.
///
/// `None` on platforms without POSIX user ids. Callers treat that as "not the
/// owner of anything", which disables metadata mutation entirely.
#[cfg(unix)]
#[must_use]
pub fn effective_uid() -> Option<u32> {
    Some(nix::unistd::geteuid().as_raw())
}

/// Returns the effective user id of the current process.
///
/// Always `None` on this platform.
#[cfg(not(unix))]
#[must_use]
pub fn effective_uid() -> Option<u32> {
    None
}

/// Reports whether `uid` is the superuser.
#[must_use]
pub const fn is_superuser(uid: u32) -> bool {
    uid == 0
}
