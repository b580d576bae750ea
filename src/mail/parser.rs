use mail_parser::{Address, MessageParser, MimeHeaders};

use super::flags::MsgFlags;
use super::header::NewHeader;

/// Strip surrounding whitespace and angle brackets from a message id.
pub fn normalize_message_id(raw: &str) -> String {
    raw.trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim()
        .to_string()
}

/// Split a References / In-Reply-To value into normalized ids, oldest first.
///
/// Bracketed ids are preferred; a value without brackets is split on whitespace.
/// Garbage yields an empty list.
pub fn parse_references(raw: &str) -> Vec<String> {
    let mut ids = Vec::new();
    let mut rest = raw;
    while let Some(start) = rest.find('<') {
        let Some(len) = rest[start..].find('>') else {
            break;
        };
        let id = normalize_message_id(&rest[start..start + len + 1]);
        if !id.is_empty() {
            ids.push(id);
        }
        rest = &rest[start + len + 1..];
    }

    if ids.is_empty() && !raw.contains('<') {
        ids = raw
            .split_whitespace()
            .filter(|token| token.contains('@'))
            .map(normalize_message_id)
            .collect();
    }
    ids
}

/// Build a header from a raw RFC 5322 message (or just its header block).
///
/// In-Reply-To is appended to the reference chain when References doesn't
/// already end with it.
pub fn parse_header(raw: &[u8], flags: MsgFlags) -> Option<NewHeader> {
    let message = MessageParser::default().parse(raw)?;

    let author = message.from().map(format_addresses).unwrap_or_default();
    let recipients = message.to().map(format_addresses).unwrap_or_default();
    let cc_list = message.cc().map(format_addresses).unwrap_or_default();
    let bcc_list = message.bcc().map(format_addresses).unwrap_or_default();

    let subject = message.subject().map(|s| s.to_string()).unwrap_or_default();

    let date = message.date().map(|d| d.to_timestamp()).unwrap_or_default();

    let message_id = message
        .message_id()
        .map(normalize_message_id)
        .unwrap_or_default();

    let mut references: Vec<String> = message
        .references()
        .as_text_list()
        .map(|ids| ids.iter().map(|s| normalize_message_id(s)).collect())
        .unwrap_or_default();

    let in_reply_to = message
        .in_reply_to()
        .as_text_list()
        .and_then(|ids| ids.first().map(|s| normalize_message_id(s)));
    if let Some(parent) = in_reply_to
        && !parent.is_empty()
        && references.last() != Some(&parent)
    {
        references.push(parent);
    }

    let charset = message
        .content_type()
        .and_then(|ct| ct.attribute("charset"))
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default();

    let mut flags = flags;
    if message.attachments().count() > 0 {
        flags |= MsgFlags::ATTACHMENT;
    }

    Some(NewHeader {
        flags,
        subject,
        author,
        recipients,
        cc_list,
        bcc_list,
        message_id,
        references,
        date,
        size: u32::try_from(raw.len()).unwrap_or(u32::MAX),
        charset,
        ..Default::default()
    })
}

fn format_addresses(address: &Address) -> String {
    address
        .iter()
        .filter_map(|addr| {
            let email = addr.address()?;
            Some(match addr.name() {
                Some(name) => format!("{} <{}>", name, email),
                None => email.to_string(),
            })
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_references() {
        assert_eq!(
            parse_references("<a@x> <b@x>\r\n\t<c@x>"),
            vec!["a@x", "b@x", "c@x"]
        );
        assert_eq!(parse_references("a@x b@x"), vec!["a@x", "b@x"]);
        assert!(parse_references("").is_empty());
        assert!(parse_references("<<>> garbage").is_empty());
        assert!(parse_references("<unterminated@x").is_empty());
    }

    #[test]
    fn test_parse_header() {
        let raw = b"From: Alice <alice@example.com>\r\n\
To: bob@example.com, Carol <carol@example.com>\r\n\
Subject: Re: Lunch\r\n\
Date: Fri, 24 Jan 2025 10:00:00 +0000\r\n\
Message-ID: <m3@example.com>\r\n\
References: <m1@example.com> <m2@example.com>\r\n\
In-Reply-To: <m2@example.com>\r\n\
Content-Type: text/plain; charset=UTF-8\r\n\
\r\n\
See you at noon.\r\n";

        let header = parse_header(raw, MsgFlags::NEW).unwrap();
        assert_eq!(header.author, "Alice <alice@example.com>");
        assert_eq!(
            header.recipients,
            "bob@example.com, Carol <carol@example.com>"
        );
        assert_eq!(header.subject, "Re: Lunch");
        assert_eq!(header.message_id, "m3@example.com");
        assert_eq!(header.references, vec!["m1@example.com", "m2@example.com"]);
        assert_eq!(header.date, 1_737_712_800);
        assert_eq!(header.charset, "utf-8");
        assert_eq!(header.size as usize, raw.len());
        assert!(header.flags.contains(MsgFlags::NEW));
        assert!(header.key.is_none());
    }

    #[test]
    fn test_in_reply_to_extends_references() {
        let raw = b"From: a@example.com\r\n\
Subject: Re: hi\r\n\
Message-ID: <child@example.com>\r\n\
In-Reply-To: <parent@example.com>\r\n\
\r\n\
body\r\n";

        let header = parse_header(raw, MsgFlags::empty()).unwrap();
        assert_eq!(header.references, vec!["parent@example.com"]);
    }
}
