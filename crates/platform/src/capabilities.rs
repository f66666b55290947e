/// Filesystem capabilities that influence how entries are materialized.
///
/// The detected value for the running platform is returned by
/// [`Capabilities::detect`]. The explicit constructors exist so callers can
/// exercise the typed-link code paths on hosts that would never select them.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Capabilities {
    typed_links: bool,
    junctions_by_default: bool,
    ownership: bool,
}

impl Capabilities {
    /// Capabilities of the platform the binary was compiled for.
    #[must_use]
    pub const fn detect() -> Self {
        if cfg!(windows) {
            Self::windows()
        } else {
            Self::posix()
        }
    }

    /// POSIX semantics: untyped symlinks and uid/gid ownership.
    #[must_use]
    pub const fn posix() -> Self {
        Self {
            typed_links: false,
            junctions_by_default: false,
            ownership: true,
        }
    }

    /// Windows semantics: symlinks are created as either file or directory
    /// links, and directory links default to junctions because creating a
    /// directory symlink requires administrative rights.
    #[must_use]
    pub const fn windows() -> Self {
        Self {
            typed_links: true,
            junctions_by_default: true,
            ownership: false,
        }
    }

    /// Returns a copy with typed links toggled.
    #[must_use]
    pub const fn with_typed_links(mut self, typed: bool) -> Self {
        self.typed_links = typed;
        self
    }

    /// Returns a copy with the junction default toggled.
    #[must_use]
    pub const fn with_junctions_by_default(mut self, junctions: bool) -> Self {
        self.junctions_by_default = junctions;
        self
    }

    /// Returns a copy with POSIX ownership toggled.
    #[must_use]
    pub const fn with_ownership(mut self, ownership: bool) -> Self {
        self.ownership = ownership;
        self
    }

    /// Reports whether symlink creation must name the kind of the target.
    #[must_use]
    pub const fn typed_links(&self) -> bool {
        self.typed_links
    }

    /// Reports whether directory links default to junctions.
    #[must_use]
    pub const fn junctions_by_default(&self) -> bool {
        self.junctions_by_default
    }

    /// Reports whether the platform exposes POSIX ownership.
    ///
    /// Without it, reconciliation observes metadata but never changes it.
    #[must_use]
    pub const fn ownership(&self) -> bool {
        self.ownership
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::detect()
    }
}
