//! Types module for the main runtime, exposing error and result types.
//!
//! Most code in this module is based around coercion of error types into
//! a common error type, to be used as the general "Error" of this crate.
use logger::SetLoggerError;
use quick_xml::events::Event;
use quick_xml::Reader;
use rusoto_core::region::ParseRegionError;
use rusoto_core::request;

use std::fmt::{self, Debug, Display, Formatter};
use std::io;

use crate::reconcile::StageError;

/// Public type alias for a result with a `UtilError` error type.
pub type UtilResult<T> = Result<T, UtilError>;

/// Delegating error wrapper for errors raised by the main runtime.
///
/// The internal `String` representation enables cheap coercion from
/// other error types by binding their error messages through. This
/// is somewhat similar to the `failure` crate, but minimal.
pub struct UtilError(String);

/// Debug implementation for `UtilError`.
impl Debug for UtilError {
    /// Formats an `UtilError` by delegating to `Display`.
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// Display implementation for `UtilError`.
impl Display for UtilError {
    /// Formats an `UtilError` by writing out the inner representation.
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Extracts a readable message from a raw AWS error representation.
///
/// Both the S3 (REST/XML) and ELBv2 (Query) APIs ship their failure
/// detail inside a `Message` tag of an XML body; when one is present
/// it is pulled out and used instead of the full payload.
pub fn error_message<E>(err: E) -> String
where
    E: Display,
{
    // grab the raw conversion
    let msg = err.to_string();

    // XML, look for a message!
    if msg.starts_with('<') {
        // create an XML reader and buffer
        let mut reader = Reader::from_str(&msg);
        let mut buffer = Vec::new();

        loop {
            // parse through each XML node event
            match reader.read_event(&mut buffer) {
                // end, or error, just give up
                Ok(Event::Eof) | Err(_) => break,

                // if we find a message tag, we'll use that as the error
                Ok(Event::Start(ref e)) if e.name() == b"Message" => {
                    if let Ok(text) = reader.read_text(b"Message", &mut Vec::new()) {
                        return text;
                    }
                }

                // skip
                _ => (),
            }
            // empty buffers
            buffer.clear();
        }
    }

    // default msg
    msg
}

/// Macro to implement `From` for provided types.
macro_rules! derive_from {
    ($type:ty) => {
        impl<'a> From<$type> for UtilError {
            fn from(t: $type) -> UtilError {
                UtilError(t.to_string())
            }
        }
    };
}

// Easy derivations of derive_from.
derive_from!(&'a str);
derive_from!(io::Error);
derive_from!(clap::Error);
derive_from!(SetLoggerError);
derive_from!(ParseRegionError);
derive_from!(request::TlsError);
derive_from!(StageError);
derive_from!(String);

#[cfg(test)]
mod tests {
    use super::{error_message, UtilError};
    use std::io::{Error, ErrorKind};

    #[test]
    fn converting_io_to_error() {
        let message = "My fake access key failed message";
        let io_errs = Error::new(ErrorKind::Other, message);
        let convert = UtilError::from(io_errs);

        assert_eq!(convert.0, message);
    }

    #[test]
    fn converting_string_to_error() {
        let message = "My fake access key failed message".to_string();
        let convert = UtilError::from(message.clone());

        assert_eq!(convert.0, message);
    }

    #[test]
    fn converting_str_to_error() {
        let message = "My fake access key failed message";
        let convert = UtilError::from(message);

        assert_eq!(convert.0, message);
    }

    #[test]
    fn extracting_rest_error_messages() {
        let body = "<?xml version=\"1.0\"?><Error><Code>AccessDenied</Code>\
                    <Message>Access Denied</Message></Error>";
        let plain = "connection refused";

        assert_eq!(error_message(body), "Access Denied");
        assert_eq!(error_message(plain), "connection refused");
    }

    #[test]
    fn extracting_query_error_messages() {
        let body = "<ErrorResponse xmlns=\"http://elasticloadbalancing.amazonaws.com/doc/2015-12-01/\">\
                    <Error><Type>Sender</Type><Code>LoadBalancerNotFound</Code>\
                    <Message>Load balancer does not exist</Message></Error></ErrorResponse>";

        assert_eq!(error_message(body), "Load balancer does not exist");
    }
}
