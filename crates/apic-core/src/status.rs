//! # HTTP Status Text
//!
//! Fixed lookup table of reason phrases used as default response
//! descriptions. Covers every IANA-registered status plus two framework
//! statuses in the unassigned 59x range:
//!
//! | Code | Text | Used for |
//! |------|------|----------|
//! | 590 | Quiet Internal Server Error | server faults that should not page anyone |
//! | 591 | Bad Response | handler output that violates its declared contract |

/// Server error that is reported without alerting.
pub const QUIET_INTERNAL_SERVER_ERROR: u16 = 590;

/// The handler produced a response that does not match its declaration.
pub const BAD_RESPONSE: u16 = 591;

/// Reason phrase for a status code, if one is registered.
pub fn status_text(code: u16) -> Option<&'static str> {
    let text = match code {
        100 => "Continue",
        101 => "Switching Protocols",
        102 => "Processing",
        103 => "Early Hints",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        207 => "Multi-Status",
        208 => "Already Reported",
        226 => "IM Used",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Content Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        417 => "Expectation Failed",
        418 => "I'm a teapot",
        421 => "Misdirected Request",
        422 => "Unprocessable Content",
        423 => "Locked",
        424 => "Failed Dependency",
        425 => "Too Early",
        426 => "Upgrade Required",
        428 => "Precondition Required",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        451 => "Unavailable For Legal Reasons",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        506 => "Variant Also Negotiates",
        507 => "Insufficient Storage",
        508 => "Loop Detected",
        510 => "Not Extended",
        511 => "Network Authentication Required",
        QUIET_INTERNAL_SERVER_ERROR => "Quiet Internal Server Error",
        BAD_RESPONSE => "Bad Response",
        _ => return None,
    };
    Some(text)
}

/// Default description for a response declared without one.
///
/// Falls back to `"Status NNN"` for codes missing from the table.
pub fn default_description(code: u16) -> String {
    status_text(code)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Status {code}"))
}
