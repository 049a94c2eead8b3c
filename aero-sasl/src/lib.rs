pub mod decode;
pub mod encode;
pub mod flow;
/// Client side of IMAP `AUTHENTICATE PLAIN`
///
/// ## Trace
///
/// With SASL-IR advertised by the server:
///
/// ```text
/// C: a0002 AUTHENTICATE PLAIN dQB1AHA=
/// S: a0002 OK Logged in
/// ```
///
/// Without it, credentials wait for a continuation request:
///
/// ```text
/// C: a0002 AUTHENTICATE PLAIN
/// S: +
/// C: dQB1AHA=
/// S: a0002 NO [AUTHENTICATIONFAILED] Invalid credentials
/// ```
///
/// A `BAD` answer means the mechanism is not available on this server,
/// a `NO` means the credentials were refused.
///
/// ## RFC References
///
/// PLAIN SASL - https://datatracker.ietf.org/doc/html/rfc4616
/// IMAP AUTHENTICATE - https://datatracker.ietf.org/doc/html/rfc3501#section-6.2.2
/// SASL-IR - https://datatracker.ietf.org/doc/html/rfc4959
pub mod types;
