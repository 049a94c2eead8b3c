use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    combinator::{map, opt, value},
    multi::separated_list1,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    No,
    Bad,
    Preauth,
    Bye,
}

/// One server line, only split as far as the client needs it
#[derive(Debug, PartialEq)]
pub enum Response<'a> {
    /// `+ text`
    Continuation(&'a [u8]),
    /// `* text`
    Untagged(&'a [u8]),
    /// `tag status text`
    Tagged {
        tag: &'a [u8],
        status: Status,
        text: &'a [u8],
    },
}

fn is_text_char(c: u8) -> bool {
    c != b'\r' && c != b'\n'
}

fn is_tag_char(c: u8) -> bool {
    c.is_ascii_graphic()
        && !matches!(
            c,
            b'+' | b'*' | b'(' | b')' | b'{' | b'%' | b'"' | b'\\' | b']'
        )
}

fn is_atom_char(c: u8) -> bool {
    c.is_ascii_graphic() && !matches!(c, b'(' | b')' | b'{' | b'%' | b'"' | b'\\' | b']')
}

fn text(input: &[u8]) -> IResult<&[u8], &[u8]> {
    take_while(is_text_char)(input)
}

fn line_end(input: &[u8]) -> IResult<&[u8], &[u8]> {
    alt((tag(b"\r\n"), tag(b"\n")))(input)
}

fn status(input: &[u8]) -> IResult<&[u8], Status> {
    alt((
        value(Status::Ok, tag_no_case(b"OK")),
        value(Status::No, tag_no_case(b"NO")),
        value(Status::Bad, tag_no_case(b"BAD")),
        value(Status::Preauth, tag_no_case(b"PREAUTH")),
        value(Status::Bye, tag_no_case(b"BYE")),
    ))(input)
}

fn continuation(input: &[u8]) -> IResult<&[u8], Response<'_>> {
    map(preceded(pair(tag(b"+"), opt(tag(b" "))), text), |t| {
        Response::Continuation(t)
    })(input)
}

fn untagged(input: &[u8]) -> IResult<&[u8], Response<'_>> {
    map(preceded(tag(b"* "), text), |t| Response::Untagged(t))(input)
}

fn tagged(input: &[u8]) -> IResult<&[u8], Response<'_>> {
    map(
        tuple((
            take_while1(is_tag_char),
            tag(b" "),
            status,
            opt(preceded(tag(b" "), text)),
        )),
        |(tag, _, status, text)| Response::Tagged {
            tag,
            status,
            text: text.unwrap_or(b""),
        },
    )(input)
}

/// A full line, terminator included
pub fn response_line(input: &[u8]) -> IResult<&[u8], Response<'_>> {
    terminated(alt((continuation, untagged, tagged)), line_end)(input)
}

/// Status at the start of an untagged response text (`OK ...`, `BYE ...`)
pub fn untagged_status(input: &[u8]) -> IResult<&[u8], Status> {
    terminated(status, opt(tag(b" ")))(input)
}

/// `CAPABILITY atom atom ...`
pub fn capability_data(input: &[u8]) -> IResult<&[u8], Vec<&[u8]>> {
    preceded(
        pair(tag_no_case(b"CAPABILITY"), tag(b" ")),
        separated_list1(tag(b" "), take_while1(is_atom_char)),
    )(input)
}

/// `[CAPABILITY ...]` response code at the start of a status text
pub fn capability_code(input: &[u8]) -> IResult<&[u8], Vec<&[u8]>> {
    delimited(tag(b"["), capability_data, tag(b"]"))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continuation() {
        assert_eq!(
            response_line(b"+ \r\n").unwrap().1,
            Response::Continuation(b"")
        );
        assert_eq!(response_line(b"+\r\n").unwrap().1, Response::Continuation(b""));
        assert_eq!(
            response_line(b"+ Ready for literal data\r\n").unwrap().1,
            Response::Continuation(b"Ready for literal data")
        );
    }

    #[test]
    fn test_untagged() {
        assert_eq!(
            response_line(b"* 3 EXISTS\r\n").unwrap().1,
            Response::Untagged(b"3 EXISTS")
        );
    }

    #[test]
    fn test_tagged() {
        assert_eq!(
            response_line(b"a0001 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
                .unwrap()
                .1,
            Response::Tagged {
                tag: b"a0001",
                status: Status::No,
                text: b"[AUTHENTICATIONFAILED] Invalid credentials",
            }
        );
        assert_eq!(
            response_line(b"a0002 bad\n").unwrap().1,
            Response::Tagged {
                tag: b"a0002",
                status: Status::Bad,
                text: b"",
            }
        );
    }

    #[test]
    fn test_incomplete_line() {
        assert!(response_line(b"a0001 OK done").is_err());
        assert!(response_line(b"garbage\r\n").is_err());
    }

    #[test]
    fn test_capabilities() {
        let (_, caps) = capability_data(b"CAPABILITY IMAP4rev1 SASL-IR AUTH=PLAIN").unwrap();
        assert_eq!(caps, vec![&b"IMAP4rev1"[..], &b"SASL-IR"[..], &b"AUTH=PLAIN"[..]]);

        let (rest, st) = untagged_status(b"OK [CAPABILITY IMAP4rev1 LITERAL+] Ready").unwrap();
        assert_eq!(st, Status::Ok);
        let (rest, caps) = capability_code(rest).unwrap();
        assert_eq!(caps, vec![&b"IMAP4rev1"[..], &b"LITERAL+"[..]]);
        assert_eq!(rest, &b" Ready"[..]);

        assert!(capability_code(b"[ALERT] hello").is_err());
    }
}
