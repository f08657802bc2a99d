//! Address-list parsing for `To`/`Cc`/`Bcc`/`From` header values
//! (RFC 5322 §3.4, leniently).

use super::message::{Recipient, RecipientType};

/// One mailbox from an address header.
///
/// # Examples
/// - `"Doe, John" <john@example.com>` → name `Doe, John`, email `john@example.com`
/// - `jane@example.com (Jane)` → name `Jane`, email `jane@example.com`
/// - `Undisclosed recipients` → name only
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Mailbox {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Mailbox {
    /// Parse a single mailbox. Never fails; unrecognized text becomes the
    /// name (or the email, if it contains `@`).
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::default();
        }

        // "Display Name <address>" or "<address>"
        if let Some(open) = find_unquoted(trimmed, '<') {
            let rest = &trimmed[open + 1..];
            let close = rest.find('>').unwrap_or(rest.len());
            return Self {
                name: non_blank(unquote(&trimmed[..open])),
                email: non_blank(rest[..close].trim().to_string()),
            };
        }

        // "address (Display Name)"
        if let (Some(open), true) = (trimmed.find('('), trimmed.ends_with(')')) {
            let address = trimmed[..open].trim();
            if address.contains('@') {
                return Self {
                    name: non_blank(trimmed[open + 1..trimmed.len() - 1].trim().to_string()),
                    email: Some(address.to_string()),
                };
            }
        }

        if trimmed.contains('@') && !trimmed.contains(char::is_whitespace) {
            Self {
                name: None,
                email: Some(trimmed.to_string()),
            }
        } else {
            Self {
                name: non_blank(unquote(trimmed)),
                email: None,
            }
        }
    }

    /// Parse a comma-separated list, keeping commas inside double quotes,
    /// angle brackets and comments. Empty entries are dropped, and group
    /// syntax (`team: a@b.com, c@d.com;`) is flattened.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        split_addresses(raw)
            .into_iter()
            .map(|part| Self::parse(strip_group(part)))
            .filter(|m| m.name.is_some() || m.email.is_some())
            .collect()
    }

    pub fn into_recipient(self, recipient_type: RecipientType) -> Recipient {
        Recipient {
            name: self.name,
            email: self.email,
            recipient_type,
        }
    }
}

/// Split on top-level commas.
fn split_addresses(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut angle = 0usize;
    let mut comment = 0usize;

    for (i, ch) in raw.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => angle += 1,
            '>' if !in_quotes => angle = angle.saturating_sub(1),
            '(' if !in_quotes => comment += 1,
            ')' if !in_quotes => comment = comment.saturating_sub(1),
            ',' if !in_quotes && angle == 0 && comment == 0 => {
                parts.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);
    parts
}

/// Position of `needle` outside double quotes.
fn find_unquoted(s: &str, needle: char) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, ch) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == needle && !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

/// Drop a group label (`name:`) and a trailing `;`.
fn strip_group(part: &str) -> &str {
    let part = part.trim().trim_end_matches(';');
    let Some(colon) = find_unquoted(part, ':') else {
        return part;
    };
    let before_angle = find_unquoted(part, '<').map_or(true, |lt| colon < lt);
    if before_angle && !part[..colon].contains('@') {
        &part[colon + 1..]
    } else {
        part
    }
}

/// Strip surrounding double quotes and unescape `\"` and `\\`.
fn unquote(s: &str) -> String {
    let trimmed = s.trim();
    let inner = trimmed
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(trimmed);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(ch);
    }
    out.trim().to_string()
}

fn non_blank(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_address() {
        let m = Mailbox::parse("user@example.com");
        assert_eq!(m.email.as_deref(), Some("user@example.com"));
        assert_eq!(m.name, None);
    }

    #[test]
    fn test_parse_angle_address() {
        let m = Mailbox::parse("<user@example.com>");
        assert_eq!(m.email.as_deref(), Some("user@example.com"));
        assert_eq!(m.name, None);
    }

    #[test]
    fn test_parse_name_and_address() {
        let m = Mailbox::parse("User One <user1@example.com>");
        assert_eq!(m.email.as_deref(), Some("user1@example.com"));
        assert_eq!(m.name.as_deref(), Some("User One"));
    }

    #[test]
    fn test_parse_quoted_name_with_escapes() {
        let m = Mailbox::parse(r#""The \"Boss\" <x>" <boss@example.com>"#);
        assert_eq!(m.name.as_deref(), Some(r#"The "Boss" <x>"#));
        assert_eq!(m.email.as_deref(), Some("boss@example.com"));
    }

    #[test]
    fn test_parse_comment_form() {
        let m = Mailbox::parse("jane@example.com (Jane Roe)");
        assert_eq!(m.name.as_deref(), Some("Jane Roe"));
        assert_eq!(m.email.as_deref(), Some("jane@example.com"));
    }

    #[test]
    fn test_parse_name_only() {
        let m = Mailbox::parse("Undisclosed recipients");
        assert_eq!(m.name.as_deref(), Some("Undisclosed recipients"));
        assert_eq!(m.email, None);
    }

    #[test]
    fn test_parse_list_with_quoted_commas() {
        let list = Mailbox::parse_list(
            r#""Doe, John" <a@b.com>, Jane <c@d.com>, "Smith, Bob, Jr." <e@f.com>"#,
        );
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].name.as_deref(), Some("Doe, John"));
        assert_eq!(list[1].name.as_deref(), Some("Jane"));
        assert_eq!(list[2].name.as_deref(), Some("Smith, Bob, Jr."));
        assert_eq!(list[2].email.as_deref(), Some("e@f.com"));
    }

    #[test]
    fn test_parse_list_skips_empty_entries() {
        let list = Mailbox::parse_list("a@b.com, , ,c@d.com,");
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_parse_list_flattens_groups() {
        let list = Mailbox::parse_list("Team: a@b.com, Bee <c@d.com>;, e@f.com");
        let emails: Vec<_> = list.iter().filter_map(|m| m.email.as_deref()).collect();
        assert_eq!(emails, ["a@b.com", "c@d.com", "e@f.com"]);
        assert!(Mailbox::parse_list("undisclosed-recipients:;").is_empty());
    }

    #[test]
    fn test_comma_in_comment_does_not_split() {
        let list = Mailbox::parse_list("a@b.com (Roe, Jane), c@d.com");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name.as_deref(), Some("Roe, Jane"));
    }

    #[test]
    fn test_into_recipient() {
        let r = Mailbox::parse("Bcc Person <p@q.com>").into_recipient(RecipientType::Bcc);
        assert_eq!(r.recipient_type, RecipientType::Bcc);
        assert_eq!(r.email.as_deref(), Some("p@q.com"));
    }
}
