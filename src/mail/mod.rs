pub mod flags;
pub mod header;
pub mod parser;
pub mod thread;

pub use flags::{MsgFlags, Priority};
pub use header::{HdrData, MsgHdr, MsgKey, NewHeader, is_pseudo_key};
pub use parser::{normalize_message_id, parse_header, parse_references};
pub use thread::{MsgThread, ThreadId};
