//! Wire-format helpers: line framing and small lexical utilities.
//!
//! IRC is line oriented. The server side of the session reads raw bytes and
//! pushes them through a [`LineFramer`], which yields one protocol line per
//! LF, stripping a single trailing CR and holding partial fragments until
//! the next read completes them.

/// Accumulates raw bytes and yields complete protocol lines.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer another chunk of bytes from the transport.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pop the next complete line, without its LF and at most one trailing
    /// CR. Returns `None` until a full line is buffered.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// Strip trailing CR/LF characters.
pub fn trim_crlf(s: &str) -> &str {
    s.trim_end_matches(['\r', '\n'])
}

/// Normalize a channel name: trim CR/LF and ensure a leading `#`.
pub fn hash_prefixed(name: &str) -> String {
    let name = trim_crlf(name);
    if name.starts_with('#') {
        name.to_string()
    } else {
        format!("#{name}")
    }
}

/// Split a `@`/`+` status prefix off a NAMES token.
pub fn strip_status(token: &str) -> (&str, &str) {
    match token.as_bytes().first() {
        Some(b'@') => ("@", &token[1..]),
        Some(b'+') => ("+", &token[1..]),
        _ => ("", token),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framer_yields_complete_lines() {
        let mut framer = LineFramer::new();
        framer.push(b"PING :abc\r\n:server 001 nick :hi\n");
        assert_eq!(framer.next_line().as_deref(), Some("PING :abc"));
        assert_eq!(framer.next_line().as_deref(), Some(":server 001 nick :hi"));
        assert_eq!(framer.next_line(), None);
    }

    #[test]
    fn framer_buffers_partial_fragments() {
        let mut framer = LineFramer::new();
        framer.push(b"PING :ab");
        assert_eq!(framer.next_line(), None);
        framer.push(b"c\r\nPART");
        assert_eq!(framer.next_line().as_deref(), Some("PING :abc"));
        assert_eq!(framer.next_line(), None);
        framer.push(b" #x\n");
        assert_eq!(framer.next_line().as_deref(), Some("PART #x"));
    }

    #[test]
    fn framer_strips_one_cr_only() {
        let mut framer = LineFramer::new();
        framer.push(b"abc\r\r\n");
        assert_eq!(framer.next_line().as_deref(), Some("abc\r"));
    }

    #[test]
    fn hash_prefix_is_not_duplicated() {
        assert_eq!(hash_prefixed("general"), "#general");
        assert_eq!(hash_prefixed("#general\r\n"), "#general");
    }

    #[test]
    fn status_prefixes() {
        assert_eq!(strip_status("@Alice"), ("@", "Alice"));
        assert_eq!(strip_status("+Bob"), ("+", "Bob"));
        assert_eq!(strip_status("Carl"), ("", "Carl"));
    }
}
