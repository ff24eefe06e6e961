use nom::error::{Error, ErrorKind};
use nom::IResult;

pub(crate) fn whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t')
}

/// Characters allowed in a RFC3261 `token`
pub(crate) fn token(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '-' | '.' | '!' | '%' | '*' | '_' | '+' | '`' | '\'' | '~'
        )
}

/// Parse a quoted-string, returns the content between the quotes
pub(crate) fn parse_quoted(i: &str) -> IResult<&str, &str> {
    let Some(rest) = i.strip_prefix('"') else {
        return Err(nom::Err::Error(Error::new(i, ErrorKind::Char)));
    };

    let mut escaped = false;

    for (idx, c) in rest.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            '"' if !escaped => return Ok((&rest[idx + 1..], &rest[..idx])),
            _ => escaped = false,
        }
    }

    Err(nom::Err::Error(Error::new(i, ErrorKind::Char)))
}

/// Split a comma separated header value, ignoring commas inside quotes and `<>`
pub(crate) fn split_list(i: &str) -> impl Iterator<Item = &str> + '_ {
    let mut parts = vec![];
    let mut start = 0;
    let mut quoted = false;
    let mut bracketed = false;

    for (idx, c) in i.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '<' if !quoted => bracketed = true,
            '>' if !quoted => bracketed = false,
            ',' if !quoted && !bracketed => {
                parts.push(&i[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }

    parts.push(&i[start..]);

    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
}
