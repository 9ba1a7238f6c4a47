//! HTTP/1.0 responses: built by the server, interpreted by the client.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::constants::{EOL, HTTP_VERSION, SERVER_NAME};
use crate::core::{Error, Result};

/// Status codes this crate produces or acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// 200
    Ok,
    /// 201
    Created,
    /// 301
    MovedPermanently,
    /// 302
    Found,
    /// 307
    TemporaryRedirect,
    /// 400
    BadRequest,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// 500
    InternalServerError,
}

impl Status {
    /// Numeric code.
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Created => 201,
            Status::MovedPermanently => 301,
            Status::Found => 302,
            Status::TemporaryRedirect => 307,
            Status::BadRequest => 400,
            Status::Forbidden => 403,
            Status::NotFound => 404,
            Status::InternalServerError => 500,
        }
    }

    /// Reason phrase.
    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Created => "Created",
            Status::MovedPermanently => "Moved Permanently",
            Status::Found => "Found",
            Status::TemporaryRedirect => "Temporary Redirect",
            Status::BadRequest => "Bad Request",
            Status::Forbidden => "Forbidden",
            Status::NotFound => "Not Found",
            Status::InternalServerError => "Internal Server Error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

/// A response, either about to be sent or just received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code.
    pub status: u16,
    /// Reason phrase from the status line.
    pub reason: String,
    /// Headers in wire order.
    pub headers: Vec<(String, String)>,
    /// Body bytes; empty when there is none.
    pub body: Vec<u8>,
}

impl Response {
    /// An empty response with `status`.
    pub fn new(status: Status) -> Self {
        Self {
            status: status.code(),
            reason: status.reason().to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// 301, 302 and 307 ask the client to follow `Location`.
    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 307)
    }

    /// Target of a redirect.
    pub fn location(&self) -> Option<&str> {
        self.header("Location").filter(|value| !value.is_empty())
    }

    /// Serialize with the server's own headers.
    ///
    /// `Server` and `Date` always precede the handler's headers;
    /// `Content-Length` is added for 2xx responses. A non-empty body follows a
    /// blank line, and the payload ends with CRLF.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_bytes_at(SystemTime::now())
    }

    fn to_bytes_at(&self, now: SystemTime) -> Vec<u8> {
        let mut head = format!("{HTTP_VERSION} {} {}{EOL}", self.status, self.reason);
        head.push_str(&format!("Server: {SERVER_NAME}{EOL}"));
        head.push_str(&format!("Date: {}{EOL}", http_date(now)));
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}{EOL}"));
        }
        if (200..300).contains(&self.status) {
            head.push_str(&format!("Content-Length: {}{EOL}", self.body.len()));
        }

        let mut bytes = head.into_bytes();
        if !self.body.is_empty() {
            bytes.extend_from_slice(EOL.as_bytes());
            bytes.extend_from_slice(&self.body);
        }
        bytes.extend_from_slice(EOL.as_bytes());
        bytes
    }

    /// Parse a received response payload.
    ///
    /// The body is everything after the first blank line, cut to
    /// `Content-Length` when present, otherwise stripped of the trailing CRLF.
    pub fn interpret(bytes: &[u8]) -> Result<Self> {
        let split = bytes.windows(4).position(|window| window == b"\r\n\r\n");
        let (head, body) = match split {
            Some(at) => (&bytes[..at], &bytes[at + 4..]),
            None => (bytes, &[][..]),
        };
        let head = std::str::from_utf8(head)
            .map_err(|_| Error::MalformedResponse("response head is not UTF-8".into()))?;

        let mut lines = head.split(EOL);
        let status_line = lines.next().unwrap_or_default();
        let mut parts = status_line.trim().splitn(3, ' ');
        let (Some(version), Some(code)) = (parts.next(), parts.next()) else {
            return Err(Error::MalformedResponse(format!("bad status line {status_line:?}")));
        };
        if !version.starts_with("HTTP/") {
            return Err(Error::MalformedResponse(format!("bad status line {status_line:?}")));
        }
        let status = code
            .parse::<u16>()
            .map_err(|_| Error::MalformedResponse(format!("bad status code {code:?}")))?;
        let reason = parts.next().unwrap_or_default().to_string();

        let mut headers = Vec::new();
        for line in lines.filter(|line| !line.is_empty()) {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::MalformedResponse(format!("bad header {line:?}")))?;
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        let mut response = Self {
            status,
            reason,
            headers,
            body: Vec::new(),
        };
        let declared = response
            .header("Content-Length")
            .and_then(|value| value.parse::<usize>().ok());
        response.body = match declared {
            Some(length) => body[..length.min(body.len())].to_vec(),
            None => body.strip_suffix(EOL.as_bytes()).unwrap_or(body).to_vec(),
        };
        Ok(response)
    }
}

/// Format `time` as an IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
fn http_date(time: SystemTime) -> String {
    const DAYS: [&str; 7] = ["Thu", "Fri", "Sat", "Sun", "Mon", "Tue", "Wed"];
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];

    let secs = time
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    let days = (secs / 86_400) as i64;
    let seconds_of_day = secs % 86_400;

    // Civil date from days since 1970-01-01 (proleptic Gregorian).
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);

    format!(
        "{}, {:02} {} {} {:02}:{:02}:{:02} GMT",
        DAYS[days.rem_euclid(7) as usize],
        day,
        MONTHS[(month - 1) as usize],
        year,
        seconds_of_day / 3_600,
        seconds_of_day % 3_600 / 60,
        seconds_of_day % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_http_date() {
        let time = UNIX_EPOCH + Duration::from_secs(784_111_777);
        assert_eq!(http_date(time), "Sun, 06 Nov 1994 08:49:37 GMT");
        assert_eq!(http_date(UNIX_EPOCH), "Thu, 01 Jan 1970 00:00:00 GMT");
        let leap = UNIX_EPOCH + Duration::from_secs(951_782_400);
        assert_eq!(http_date(leap), "Tue, 29 Feb 2000 00:00:00 GMT");
    }

    #[test]
    fn test_server_bytes() {
        let response = Response::new(Status::Ok).with_body("hello");
        let text = String::from_utf8(response.to_bytes_at(UNIX_EPOCH)).unwrap();
        assert_eq!(
            text,
            "HTTP/1.0 200 OK\r\nServer: courier\r\nDate: Thu, 01 Jan 1970 00:00:00 GMT\r\n\
             Content-Length: 5\r\n\r\nhello\r\n"
        );
    }

    #[test]
    fn test_error_has_no_length() {
        let text = String::from_utf8(Response::new(Status::NotFound).to_bytes()).unwrap();
        assert!(text.starts_with("HTTP/1.0 404 Not Found\r\n"));
        assert!(!text.contains("Content-Length"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_interpret_body() {
        let sent = Response::new(Status::Ok).with_body("line 1\r\nline 2\r\n");
        let received = Response::interpret(&sent.to_bytes()).unwrap();

        assert_eq!(received.status, 200);
        assert_eq!(received.reason, "OK");
        assert_eq!(received.header("server"), Some("courier"));
        assert_eq!(received.body, b"line 1\r\nline 2\r\n");
        assert!(!received.is_redirect());
    }

    #[test]
    fn test_interpret_redirect() {
        let raw = b"HTTP/1.0 302 Found\r\nLocation: /elsewhere\r\n\r\n";
        let response = Response::interpret(raw).unwrap();
        assert!(response.is_redirect());
        assert_eq!(response.location(), Some("/elsewhere"));
        assert!(response.body.is_empty());

        let raw = b"HTTP/1.0 307 Temporary Redirect\r\n\r\n";
        let response = Response::interpret(raw).unwrap();
        assert!(response.is_redirect());
        assert_eq!(response.location(), None);
    }

    #[test]
    fn test_interpret_rejects_bad_status_line() {
        assert!(matches!(Response::interpret(b""), Err(Error::MalformedResponse(_))));
        assert!(matches!(
            Response::interpret(b"HTTP/1.0 abc Nope\r\n\r\n"),
            Err(Error::MalformedResponse(_))
        ));
        assert!(matches!(
            Response::interpret(b"SIP/2.0 200 OK\r\n\r\n"),
            Err(Error::MalformedResponse(_))
        ));
    }
}
