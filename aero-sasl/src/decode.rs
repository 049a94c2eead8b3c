use base64::Engine;
use nom::{
    bytes::complete::{take, take_while, take_while1},
    combinator::{eof, map, rest},
    error::{Error, ErrorKind},
    sequence::{terminated, tuple},
    IResult,
};

fn is_base64_core(c: u8) -> bool {
    c.is_ascii_alphanumeric()
        || c == 0x2b // +
        || c == 0x2f // /
}

fn is_base64_pad(c: u8) -> bool {
    c == 0x3d // =
}

fn base64(input: &[u8]) -> IResult<&[u8], Vec<u8>> {
    let (input, (b64, _)) =
        tuple((take_while1(is_base64_core), take_while(is_base64_pad)))(input)?;

    let data = base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(b64)
        .map_err(|_| nom::Err::Failure(Error::new(input, ErrorKind::TakeWhile1)))?;

    Ok((input, data))
}

fn not_null(c: u8) -> bool {
    c != 0x0
}

// authorization identity, login, password
pub fn auth_plain<'a>(input: &'a [u8]) -> IResult<&'a [u8], (&'a [u8], &'a [u8], &'a [u8])> {
    map(
        tuple((
            take_while(not_null),
            take(1usize),
            take_while(not_null),
            take(1usize),
            rest,
        )),
        |(authz, _, user, _, pass)| (authz, user, pass),
    )(input)
}

/// Decode a base64 PLAIN payload, as sent after `AUTHENTICATE PLAIN`.
/// Trailing CRLF is accepted.
pub fn plain_message(input: &[u8]) -> IResult<&[u8], (Vec<u8>, Vec<u8>, Vec<u8>)> {
    let (input, raw) = terminated(base64, tuple((take_while(is_crlf), eof)))(input)?;

    let (authz, user, pass) = match auth_plain(&raw) {
        Ok((_, (authz, user, pass))) => (authz.to_vec(), user.to_vec(), pass.to_vec()),
        Err(_) => return Err(nom::Err::Failure(Error::new(input, ErrorKind::Verify))),
    };

    Ok((input, (authz, user, pass)))
}

fn is_crlf(c: u8) -> bool {
    c == b'\r' || c == b'\n'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_plain() {
        let (_, (authz, user, pass)) = auth_plain(b"\0alice\0secret").unwrap();
        assert_eq!(authz, b"");
        assert_eq!(user, b"alice");
        assert_eq!(pass, b"secret");
    }

    #[test]
    fn test_plain_message() {
        let (rest, (authz, user, pass)) = plain_message(b"dQB1AHA=\r\n").unwrap();
        assert!(rest.is_empty());
        assert_eq!(authz, b"u");
        assert_eq!(user, b"u");
        assert_eq!(pass, b"p");
    }

    #[test]
    fn test_plain_message_missing_separator() {
        // base64("alice")
        assert!(plain_message(b"YWxpY2U=").is_err());
    }
}
