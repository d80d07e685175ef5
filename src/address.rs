use lazy_static::lazy_static;
use regex::Regex;

/// Placeholder used when a MAIL/RCPT line carries no usable address.
pub const SENTINEL_ADDRESS: &str = "invalid@addr";

lazy_static! {
    static ref ENVELOPE_ADDRESS_RE: Regex =
        Regex::new(r"(?i)(?:MAIL|RCPT) (?:FROM|TO):.*<([^>]+)>").unwrap();
    static ref DISALLOWED_RE: Regex = Regex::new(r"[^a-zA-Z0-9@]+").unwrap();
}

/// Pulls the bracketed address out of a MAIL or RCPT line and scrubs it.
///
/// Lines without a non-empty `<...>` after `FROM:`/`TO:` yield
/// [`SENTINEL_ADDRESS`].
pub fn sanitize(line: &str) -> String {
    ENVELOPE_ADDRESS_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| scrub(m.as_str()))
        .unwrap_or_else(|| SENTINEL_ADDRESS.to_string())
}

/// Collapses every run of characters outside `[A-Za-z0-9@]` into one `.`.
pub fn scrub(address: &str) -> String {
    DISALLOWED_RE.replace_all(address, ".").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_address() {
        assert_eq!(sanitize("MAIL FROM:<user@example.com>"), "user@example.com");
        assert_eq!(sanitize("RCPT TO:<c@d.com>\r\n"), "c@d.com");
    }

    #[test]
    fn keywords_ignore_case() {
        assert_eq!(sanitize("mail from:<a@b.com>"), "a@b.com");
        assert_eq!(sanitize("Rcpt To:<a@b.com>"), "a@b.com");
    }

    #[test]
    fn disallowed_runs_become_single_dot() {
        assert_eq!(sanitize("RCPT TO:<a!b#c@x.com>"), "a.b.c@x.com");
        assert_eq!(sanitize("RCPT TO:<../../etc/passwd>"), ".etc.passwd");
        assert_eq!(sanitize("MAIL FROM:<\"john doe\"@x.org> SIZE=10"), ".john.doe.@x.org");
    }

    #[test]
    fn trailing_parameters_do_not_leak() {
        assert_eq!(sanitize("MAIL FROM:<a@b.com> BODY=8BITMIME"), "a@b.com");
    }

    #[test]
    fn missing_address_is_sentinel() {
        assert_eq!(sanitize("RCPT TO: c@d.com"), SENTINEL_ADDRESS);
        assert_eq!(sanitize("MAIL FROM:<>"), SENTINEL_ADDRESS);
        assert_eq!(sanitize("NOOP <a@b.com>"), SENTINEL_ADDRESS);
        assert_eq!(sanitize(""), SENTINEL_ADDRESS);
    }

    #[test]
    fn scrub_is_idempotent() {
        for line in [
            "MAIL FROM:<user@example.com>",
            "RCPT TO:<a!b#c@x.com>",
            "RCPT TO:<~~weird~~@@host>",
            "garbage",
        ] {
            let once = sanitize(line);
            assert_eq!(scrub(&once), once);
        }
    }
}
