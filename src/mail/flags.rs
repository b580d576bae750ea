use bitflags::bitflags;

bitflags! {
    /// Per-message status bits, persisted as a single 32-bit cell.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MsgFlags: u32 {
        const READ = 0x0000_0001;
        const REPLIED = 0x0000_0002;
        /// User-flagged ("starred").
        const MARKED = 0x0000_0004;
        const EXPUNGED = 0x0000_0008;
        /// Subject carried a reply prefix when the header was added.
        const HAS_RE = 0x0000_0010;
        const ELIDED = 0x0000_0020;
        /// Body is available in offline storage.
        const OFFLINE = 0x0000_0080;
        const WATCHED = 0x0000_0100;
        const PARTIAL = 0x0000_0400;
        const QUEUED = 0x0000_0800;
        const FORWARDED = 0x0000_1000;
        const NEW = 0x0001_0000;
        const IGNORED = 0x0004_0000;
        /// Deleted on the server, pending expunge.
        const IMAP_DELETED = 0x0020_0000;
        const ATTACHMENT = 0x1000_0000;
    }
}

/// Message priority as persisted in the priority cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    NotSet,
    None,
    Lowest,
    Low,
    Normal,
    High,
    Highest,
}

impl Priority {
    pub fn as_u32(self) -> u32 {
        match self {
            Self::NotSet => 0,
            Self::None => 1,
            Self::Lowest => 2,
            Self::Low => 3,
            Self::Normal => 4,
            Self::High => 5,
            Self::Highest => 6,
        }
    }

    /// Unknown values map to `NotSet`.
    pub fn from_u32(value: u32) -> Self {
        match value {
            1 => Self::None,
            2 => Self::Lowest,
            3 => Self::Low,
            4 => Self::Normal,
            5 => Self::High,
            6 => Self::Highest,
            _ => Self::NotSet,
        }
    }
}
