use crate::{Error, checksum};

use bytes::{BufMut, BytesMut};

/// A source route as carried on the wire: the ordered intermediate hops,
/// borrowed from the frame text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Route<'a>(Vec<&'a str>);

impl<'a> Route<'a> {
    pub fn new(hops: Vec<&'a str>) -> Self {
        Self(hops)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn last(&self) -> Option<&'a str> {
        self.0.last().copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.iter().any(|hop| *hop == id)
    }

    pub fn hops(&self) -> &[&'a str] {
        &self.0
    }

    /// The same hops walked from the other end.
    pub fn reversed(&self) -> Self {
        Self(self.0.iter().rev().copied().collect())
    }

    /// Parses a hyphen-joined hop list. The empty field is the empty route.
    ///
    /// Hop tokens are validated before the list is allocated.
    fn parse(field: &'a str) -> Result<Self, Error> {
        if field.is_empty() {
            return Ok(Self::default());
        }

        for hop in field.split('-') {
            token(hop)?;
        }

        Ok(Self(field.split('-').collect()))
    }

    fn encode(&self, bytes: &mut BytesMut) {
        for (index, hop) in self.0.iter().enumerate() {
            if index > 0 {
                bytes.put_u8(b'-');
            }

            bytes.put(hop.as_bytes());
        }
    }
}

/// The addressing fields shared by every routed kind: who originated the
/// message, who it is for, the originator's stamp, and the source route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routing<'a> {
    pub source: &'a str,
    pub destination: &'a str,
    pub stamp: u64,
    pub route: Route<'a>,
}

/// One wire message, one arm per kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame<'a> {
    Hello {
        source: &'a str,
    },
    RouteRequest(Routing<'a>),
    RouteReply(Routing<'a>),
    Data(Routing<'a>),
    Response {
        routing: Routing<'a>,
        payload: &'a str,
        check: u16,
    },
}

impl<'a> Frame<'a> {
    /// Parses one received frame.
    ///
    /// Structure is validated field by field before the route list is
    /// built, so malformed input is rejected without allocating. Trailing
    /// empty fields are tolerated on every kind.
    ///
    /// # Test
    ///
    /// ```
    /// use mesh_node_codec::frame::Frame;
    ///
    /// let frame = Frame::parse(b"RREQ:A:C:1700000000:").unwrap();
    ///
    /// if let Frame::RouteRequest(routing) = frame {
    ///     assert_eq!(routing.source, "A");
    ///     assert_eq!(routing.destination, "C");
    ///     assert_eq!(routing.stamp, 1700000000);
    ///     assert!(routing.route.is_empty());
    /// } else {
    ///     panic!("expected RREQ");
    /// }
    ///
    /// assert!(Frame::parse(b"RREQ:A::1700000000:").is_err());
    /// assert!(Frame::parse(b"PING:A").is_err());
    /// ```
    pub fn parse(bytes: &'a [u8]) -> Result<Frame<'a>, Error> {
        let text = std::str::from_utf8(bytes)?;
        let mut fields = text.split(':');

        let kind = fields.next().ok_or(Error::MissingField)?;
        let frame = match kind {
            "HELLO" => Frame::Hello {
                source: token(fields.next().ok_or(Error::MissingField)?)?,
            },
            "RREQ" => Frame::RouteRequest(routing(&mut fields)?),
            "RREP" => Frame::RouteReply(routing(&mut fields)?),
            "DATA" => Frame::Data(routing(&mut fields)?),
            "RESP" => {
                let routing = routing_of(
                    fields.next().ok_or(Error::MissingField)?,
                    fields.next().ok_or(Error::MissingField)?,
                    fields.next().ok_or(Error::MissingField)?,
                    fields.next().ok_or(Error::MissingField)?,
                )?;

                Frame::Response {
                    payload: fields.next().ok_or(Error::MissingField)?,
                    check: fields
                        .next()
                        .ok_or(Error::MissingField)?
                        .parse()
                        .map_err(|_| Error::InvalidCheck)?,
                    routing,
                }
            }
            _ => return Err(Error::UnknownKind),
        };

        // Anything after the expected fields must be empty trailers.
        for rest in fields {
            if !rest.is_empty() {
                return Err(Error::InvalidToken);
            }
        }

        Ok(frame)
    }

    /// Serializes the frame into the caller's buffer, clearing it first.
    ///
    /// A RESP is always sealed with the check computed over the bytes
    /// actually written; the `check` carried by the variant only reports
    /// what a parsed frame arrived with.
    ///
    /// # Test
    ///
    /// ```
    /// use bytes::BytesMut;
    /// use mesh_node_codec::frame::{Frame, Route, Routing};
    ///
    /// let mut bytes = BytesMut::with_capacity(256);
    ///
    /// Frame::Data(Routing {
    ///     source: "A",
    ///     destination: "C",
    ///     stamp: 1700000000,
    ///     route: Route::new(vec!["B"]),
    /// })
    /// .encode(&mut bytes);
    ///
    /// assert_eq!(&bytes[..], b"DATA:A:C:1700000000:B");
    /// ```
    pub fn encode(&self, bytes: &mut BytesMut) {
        bytes.clear();

        match self {
            Frame::Hello { source } => {
                bytes.put(&b"HELLO:"[..]);
                bytes.put(source.as_bytes());
            }
            Frame::RouteRequest(routing) => encode_routed(b"RREQ", routing, bytes),
            Frame::RouteReply(routing) => encode_routed(b"RREP", routing, bytes),
            Frame::Data(routing) => encode_routed(b"DATA", routing, bytes),
            Frame::Response {
                routing, payload, ..
            } => {
                encode_routed(b"RESP", routing, bytes);
                bytes.put_u8(b':');
                bytes.put(payload.as_bytes());

                let check = checksum(bytes);
                bytes.put_u8(b':');
                bytes.put(check.to_string().as_bytes());
            }
        }
    }

    /// The wire name of the kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Hello { .. } => "HELLO",
            Frame::RouteRequest(_) => "RREQ",
            Frame::RouteReply(_) => "RREP",
            Frame::Data(_) => "DATA",
            Frame::Response { .. } => "RESP",
        }
    }
}

/// A node identifier token: non-empty, free of the two delimiters.
fn token(field: &str) -> Result<&str, Error> {
    if field.is_empty() {
        return Err(Error::EmptyToken);
    }

    if field.contains('-') || field.contains(':') {
        return Err(Error::InvalidToken);
    }

    Ok(field)
}

fn routing<'a>(fields: &mut std::str::Split<'a, char>) -> Result<Routing<'a>, Error> {
    routing_of(
        fields.next().ok_or(Error::MissingField)?,
        fields.next().ok_or(Error::MissingField)?,
        fields.next().ok_or(Error::MissingField)?,
        // A frame cut short of the trailing colon still has an empty route.
        fields.next().unwrap_or(""),
    )
}

fn routing_of<'a>(
    source: &'a str,
    destination: &'a str,
    stamp: &'a str,
    route: &'a str,
) -> Result<Routing<'a>, Error> {
    Ok(Routing {
        source: token(source)?,
        destination: token(destination)?,
        stamp: stamp.parse().map_err(|_| Error::InvalidStamp)?,
        route: Route::parse(route)?,
    })
}

fn encode_routed(kind: &[u8], routing: &Routing<'_>, bytes: &mut BytesMut) {
    bytes.put(kind);
    bytes.put_u8(b':');
    bytes.put(routing.source.as_bytes());
    bytes.put_u8(b':');
    bytes.put(routing.destination.as_bytes());
    bytes.put_u8(b':');
    bytes.put(routing.stamp.to_string().as_bytes());
    bytes.put_u8(b':');
    routing.route.encode(bytes);
}
