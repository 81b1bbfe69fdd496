//! Wraps the external `hpack` crate with the pseudo-header and
//! regular-header validation rules of spec.md §3/§4.4.
//!
//! Grounded in `carllerche-h2`'s `frame::headers` (the `Pseudo` extraction
//! and the forbidden-header table) and `Atte-http2`'s use of `hpack::{Encoder,
//! Decoder}` as the opaque compression engine (`examples/Atte-http2/src/hpack.rs`,
//! `connection.rs`).

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};

use crate::error::FrameError;
use crate::frame::Pseudo;

/// Header field names that MUST NOT appear in an HTTP/2 header block
/// (connection-specific fields have no meaning when the connection itself
/// is multiplexed). Spec.md §3.
const FORBIDDEN: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "transfer-encoding",
    "upgrade",
];

/// Decodes header blocks, splitting pseudo-headers from regular fields and
/// enforcing ordering/duplication rules as it goes. One instance lives for
/// the life of a connection; its dynamic table must track the peer's
/// HEADER_TABLE_SIZE (see [`Decoder::set_max_dynamic_table_size`]).
pub struct Decoder {
    inner: hpack::Decoder<'static>,
}

impl Decoder {
    pub fn new(max_dynamic_table_size: usize) -> Decoder {
        let mut inner = hpack::Decoder::new();
        inner.set_max_table_size(max_dynamic_table_size);
        Decoder { inner }
    }

    pub fn set_max_dynamic_table_size(&mut self, size: usize) {
        self.inner.set_max_table_size(size);
    }

    /// Decodes one complete header block fragment (already reassembled from
    /// HEADERS + any CONTINUATION frames) into a `Pseudo` + `HeaderMap`.
    ///
    /// This must run even on streams the connection has already decided to
    /// reject, to keep the decoder's dynamic table in sync with the peer's
    /// encoder (spec.md §4.4).
    pub fn decode(&mut self, block: &[u8], is_request: bool) -> Result<(Pseudo, HeaderMap), FrameError> {
        let raw = self
            .inner
            .decode(block)
            .map_err(|_| FrameError::Hpack("HPACK decompression failed"))?;

        let mut pseudo = Pseudo::default();
        let mut fields = HeaderMap::new();
        let mut seen_regular = false;

        for (name, value) in raw {
            if name.first() == Some(&b':') {
                if seen_regular {
                    return Err(FrameError::MalformedHeaders(
                        "pseudo-header field follows a regular header field",
                    ));
                }
                set_pseudo(&mut pseudo, &name, &value, is_request)?;
                continue;
            }

            seen_regular = true;
            validate_regular(&name)?;

            let header_name = HeaderName::from_bytes(&name)
                .map_err(|_| FrameError::MalformedHeaders("invalid header field name"))?;
            let header_value = HeaderValue::from_bytes(&value)
                .map_err(|_| FrameError::MalformedHeaders("invalid header field value"))?;

            if header_name == http::header::TE && header_value != "trailers" {
                return Err(FrameError::MalformedHeaders(
                    "te header field value other than \"trailers\"",
                ));
            }

            fields.append(header_name, header_value);
        }

        if is_request {
            validate_request_pseudo(&pseudo)?;
        }

        Ok((pseudo, fields))
    }
}

/// Encodes a `Pseudo` + `HeaderMap` back into a single header block
/// fragment; `codec::framed_write` splits the result across HEADERS +
/// CONTINUATION frames if it doesn't fit one frame.
pub struct Encoder {
    inner: hpack::Encoder<'static>,
}

impl Encoder {
    pub fn new() -> Encoder {
        Encoder {
            inner: hpack::Encoder::new(),
        }
    }

    pub fn encode(&mut self, pseudo: &Pseudo, fields: &HeaderMap) -> Bytes {
        let mut headers: Vec<(&[u8], &[u8])> = Vec::with_capacity(fields.len() + 1);

        let status_str;
        if let Some(status) = pseudo.status {
            status_str = status.as_str().to_owned();
            headers.push((b":status", status_str.as_bytes()));
        }

        for (name, value) in fields.iter() {
            headers.push((name.as_str().as_bytes(), value.as_bytes()));
        }

        Bytes::from(self.inner.encode(headers))
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Encoder::new()
    }
}

fn set_pseudo(pseudo: &mut Pseudo, name: &[u8], value: &[u8], is_request: bool) -> Result<(), FrameError> {
    match name {
        b":method" if is_request => {
            if pseudo.method.is_some() {
                return Err(FrameError::MalformedHeaders("duplicate :method"));
            }
            let method = Method::from_bytes(value)
                .map_err(|_| FrameError::MalformedHeaders("invalid :method"))?;
            pseudo.method = Some(method);
        }
        b":scheme" if is_request => {
            if pseudo.scheme.is_some() {
                return Err(FrameError::MalformedHeaders("duplicate :scheme"));
            }
            let scheme = std::str::from_utf8(value)
                .map_err(|_| FrameError::MalformedHeaders("invalid :scheme"))?;
            pseudo.scheme = Some(scheme.to_owned());
        }
        b":authority" if is_request => {
            if pseudo.authority.is_some() {
                return Err(FrameError::MalformedHeaders("duplicate :authority"));
            }
            let authority = std::str::from_utf8(value)
                .map_err(|_| FrameError::MalformedHeaders("invalid :authority"))?;
            pseudo.authority = Some(authority.to_owned());
        }
        b":path" if is_request => {
            if pseudo.path.is_some() {
                return Err(FrameError::MalformedHeaders("duplicate :path"));
            }
            let path = std::str::from_utf8(value)
                .map_err(|_| FrameError::MalformedHeaders("invalid :path"))?;
            pseudo.path = Some(path.to_owned());
        }
        b":status" if !is_request => {
            if pseudo.status.is_some() {
                return Err(FrameError::MalformedHeaders("duplicate :status"));
            }
            let code = std::str::from_utf8(value)
                .ok()
                .and_then(|s| s.parse::<u16>().ok())
                .ok_or(FrameError::MalformedHeaders("invalid :status"))?;
            pseudo.status =
                Some(StatusCode::from_u16(code).map_err(|_| FrameError::MalformedHeaders("invalid :status"))?);
        }
        _ => return Err(FrameError::MalformedHeaders("unrecognized or misplaced pseudo-header")),
    }

    Ok(())
}

fn validate_request_pseudo(pseudo: &Pseudo) -> Result<(), FrameError> {
    if pseudo.method.is_none() || pseudo.scheme.is_none() || pseudo.path.is_none() {
        return Err(FrameError::MalformedHeaders("request missing mandatory pseudo-header"));
    }
    Ok(())
}

fn validate_regular(name: &[u8]) -> Result<(), FrameError> {
    if name.iter().any(u8::is_ascii_uppercase) {
        return Err(FrameError::MalformedHeaders("header field name must be lowercase"));
    }

    if FORBIDDEN.iter().any(|forbidden| forbidden.as_bytes() == name) {
        return Err(FrameError::MalformedHeaders("connection-specific header field"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_request(headers: &[(&str, &str)]) -> Bytes {
        let mut encoder = hpack::Encoder::new();
        let raw: Vec<(&[u8], &[u8])> = headers.iter().map(|(n, v)| (n.as_bytes(), v.as_bytes())).collect();
        Bytes::from(encoder.encode(raw))
    }

    fn minimal_request() -> Vec<(&'static str, &'static str)> {
        vec![
            (":method", "GET"),
            (":scheme", "http"),
            (":path", "/"),
        ]
    }

    #[test]
    fn valid_request_decodes_into_pseudo_and_fields() {
        let mut fields = minimal_request();
        fields.push(("x-trace-id", "abc123"));
        let block = encode_request(&fields);

        let (pseudo, headers) = Decoder::new(4096).decode(&block, true).unwrap();
        assert_eq!(pseudo.method.unwrap(), Method::GET);
        assert_eq!(pseudo.scheme.unwrap(), "http");
        assert_eq!(pseudo.path.unwrap(), "/");
        assert_eq!(headers.get("x-trace-id").unwrap(), "abc123");
    }

    #[test]
    fn uppercase_header_name_is_rejected() {
        let mut fields = minimal_request();
        fields.push(("X-Trace-Id", "abc123"));
        let block = encode_request(&fields);

        let err = Decoder::new(4096).decode(&block, true).unwrap_err();
        assert!(matches!(err, FrameError::MalformedHeaders(_)));
    }

    #[test]
    fn duplicate_pseudo_header_is_rejected() {
        let mut fields = minimal_request();
        fields.push((":path", "/again"));
        let block = encode_request(&fields);

        let err = Decoder::new(4096).decode(&block, true).unwrap_err();
        assert!(matches!(err, FrameError::MalformedHeaders(_)));
    }

    #[test]
    fn pseudo_header_after_regular_header_is_rejected() {
        let mut fields = minimal_request();
        fields.push(("x-first", "1"));
        fields.push((":authority", "example.com"));
        let block = encode_request(&fields);

        let err = Decoder::new(4096).decode(&block, true).unwrap_err();
        assert!(matches!(err, FrameError::MalformedHeaders(_)));
    }

    #[test]
    fn missing_mandatory_pseudo_header_is_rejected() {
        let block = encode_request(&[(":method", "GET"), (":scheme", "http")]);
        let err = Decoder::new(4096).decode(&block, true).unwrap_err();
        assert!(matches!(err, FrameError::MalformedHeaders(_)));
    }

    #[test]
    fn forbidden_connection_specific_headers_are_rejected() {
        for name in FORBIDDEN {
            let mut fields = minimal_request();
            fields.push((name, "x"));
            let block = encode_request(&fields);

            let err = Decoder::new(4096).decode(&block, true).unwrap_err();
            assert!(matches!(err, FrameError::MalformedHeaders(_)), "{name} should have been rejected");
        }
    }

    #[test]
    fn te_header_other_than_trailers_is_rejected() {
        let mut fields = minimal_request();
        fields.push(("te", "gzip"));
        let block = encode_request(&fields);

        let err = Decoder::new(4096).decode(&block, true).unwrap_err();
        assert!(matches!(err, FrameError::MalformedHeaders(_)));
    }

    #[test]
    fn te_header_with_trailers_is_accepted() {
        let mut fields = minimal_request();
        fields.push(("te", "trailers"));
        let block = encode_request(&fields);

        assert!(Decoder::new(4096).decode(&block, true).is_ok());
    }

    #[test]
    fn response_decode_does_not_require_request_pseudo_headers() {
        let block = encode_request(&[(":status", "200")]);
        let (pseudo, _) = Decoder::new(4096).decode(&block, false).unwrap();
        assert_eq!(pseudo.status.unwrap().as_u16(), 200);
    }
}
