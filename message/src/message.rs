//! The message object: storage, lifecycle, constructors, and accessors.

use std::os::fd::OwnedFd;

use wire::{align_to, Endian, FieldCode, Flags, Header, MessageType, HEADER_SIZE};

use crate::container::Container;
use crate::error::{Error, MessageResult};
use crate::region::Region;
use signature::Type;

/// Credentials of the sending peer, captured by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Credentials {
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub pid: Option<u32>,
    pub tid: Option<u32>,
}

/// The error name and optional message carried by a method-error reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodError<'a> {
    pub name: &'a str,
    pub message: Option<&'a str>,
}

/// A resolved-late reference into one of the message regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldSlice {
    pub(crate) offset: usize,
    pub(crate) len: usize,
}

/// Backing bytes of a message.
///
/// Built messages own two independently growing regions. Received messages
/// own the transport's buffer and view the regions inside it, so parsing
/// never copies payload bytes.
#[derive(Debug)]
pub(crate) enum Storage {
    Built {
        fields: Region,
        body: Region,
    },
    Received {
        raw: Vec<u8>,
        fields: std::ops::Range<usize>,
        body: std::ops::Range<usize>,
    },
}

impl Storage {
    pub(crate) fn fields(&self) -> &[u8] {
        match self {
            Self::Built { fields, .. } => fields.as_slice(),
            Self::Received { raw, fields, .. } => &raw[fields.clone()],
        }
    }

    pub(crate) fn body(&self) -> &[u8] {
        match self {
            Self::Built { body, .. } => body.as_slice(),
            Self::Received { raw, body, .. } => &raw[body.clone()],
        }
    }
}

/// A D-Bus message.
///
/// Built messages go through `append`/`open_container`/`close_container`
/// and become immutable at [`seal`](Self::seal). Received messages are
/// sealed from the start and are traversed with the read cursor.
#[derive(Debug)]
pub struct Message {
    pub(crate) header: Header,
    pub(crate) storage: Storage,
    pub(crate) sealed: bool,
    /// Encoded fixed header, materialized at seal time for built messages.
    pub(crate) sealed_header: Option<[u8; HEADER_SIZE]>,

    /// Read cursor into the body region.
    pub(crate) rindex: usize,
    pub(crate) root: Container,
    pub(crate) containers: Vec<Container>,
    /// Owned buffer backing the contents string of the last `peek_type`.
    pub(crate) peeked_signature: Option<String>,

    // Quick-access references into the fields region (error message points
    // into the body).
    pub(crate) path: Option<FieldSlice>,
    pub(crate) interface: Option<FieldSlice>,
    pub(crate) member: Option<FieldSlice>,
    pub(crate) destination: Option<FieldSlice>,
    pub(crate) sender: Option<FieldSlice>,
    pub(crate) error_name: Option<FieldSlice>,
    pub(crate) error_message: Option<FieldSlice>,
    pub(crate) reply_serial: u32,
    pub(crate) unix_fds: u32,

    /// Replies to calls that expected no reply carry this hint for the
    /// transport; it is never serialized.
    pub(crate) dont_send: bool,

    pub(crate) creds: Credentials,
    pub(crate) label: Option<String>,
    pub(crate) fds: Vec<OwnedFd>,
}

impl Message {
    fn new(kind: MessageType) -> Self {
        Self {
            header: Header::new(kind),
            storage: Storage::Built {
                fields: Region::new(),
                body: Region::new(),
            },
            sealed: false,
            sealed_header: None,
            rindex: 0,
            root: Container::root(),
            containers: Vec::new(),
            peeked_signature: None,
            path: None,
            interface: None,
            member: None,
            destination: None,
            sender: None,
            error_name: None,
            error_message: None,
            reply_serial: 0,
            unix_fds: 0,
            dont_send: false,
            creds: Credentials::default(),
            label: None,
            fds: Vec::new(),
        }
    }

    /// Creates a signal message. All three header fields are required.
    pub fn new_signal(path: &str, interface: &str, member: &str) -> MessageResult<Self> {
        let mut m = Self::new(MessageType::Signal);
        m.header.flags = m.header.flags.with_no_reply_expected();

        m.path = Some(m.append_field_string(FieldCode::Path, Type::ObjectPath, path)?);
        m.interface = Some(m.append_field_string(FieldCode::Interface, Type::String, interface)?);
        m.member = Some(m.append_field_string(FieldCode::Member, Type::String, member)?);
        Ok(m)
    }

    /// Creates a method call. Destination and interface are optional.
    pub fn new_method_call(
        destination: Option<&str>,
        path: &str,
        interface: Option<&str>,
        member: &str,
    ) -> MessageResult<Self> {
        let mut m = Self::new(MessageType::MethodCall);

        m.path = Some(m.append_field_string(FieldCode::Path, Type::ObjectPath, path)?);
        m.member = Some(m.append_field_string(FieldCode::Member, Type::String, member)?);
        if let Some(interface) = interface {
            m.interface =
                Some(m.append_field_string(FieldCode::Interface, Type::String, interface)?);
        }
        if let Some(destination) = destination {
            m.destination =
                Some(m.append_field_string(FieldCode::Destination, Type::String, destination)?);
        }
        Ok(m)
    }

    fn new_reply(call: &Message, kind: MessageType) -> MessageResult<Self> {
        if !call.sealed {
            return Err(Error::PermissionDenied {
                operation: "reply to an unsealed call",
            });
        }
        if call.header.kind != MessageType::MethodCall {
            return Err(Error::InvalidArgument {
                what: "replies require a method call",
            });
        }

        let mut m = Self::new(kind);
        m.header.flags = m.header.flags.with_no_reply_expected();
        m.reply_serial = call.header.serial;
        m.append_field_u32(FieldCode::ReplySerial, m.reply_serial)?;

        if let Some(sender) = call.sender() {
            m.destination =
                Some(m.append_field_string(FieldCode::Destination, Type::String, sender)?);
        }

        m.dont_send = call.header.flags.no_reply_expected();
        Ok(m)
    }

    /// Creates a method return for a sealed method call.
    pub fn new_method_return(call: &Message) -> MessageResult<Self> {
        Self::new_reply(call, MessageType::MethodReturn)
    }

    /// Creates a method error for a sealed method call.
    ///
    /// The error message, if any, becomes the first body argument.
    pub fn new_method_error(
        call: &Message,
        name: &str,
        message: Option<&str>,
    ) -> MessageResult<Self> {
        let mut m = Self::new_reply(call, MessageType::MethodError)?;

        m.error_name = Some(m.append_field_string(FieldCode::ErrorName, Type::String, name)?);
        if let Some(message) = message {
            let stored = m.append_basic_stored(crate::Value::Str(message))?;
            m.error_message = stored;
        }
        Ok(m)
    }

    /// Takes ownership of a received buffer, validates the fixed header and
    /// the region layout, and parses the header fields.
    ///
    /// # Errors
    ///
    /// Any header or field validation failure; the buffer is dropped.
    pub fn from_buffer(
        buffer: Vec<u8>,
        creds: Option<Credentials>,
        label: Option<&str>,
    ) -> MessageResult<Self> {
        let header = Header::decode(&buffer)?;

        let fields_size = header.fields_size as usize;
        let body_size = header.body_size as usize;
        let total =
            HEADER_SIZE as u64 + align_to(fields_size, 8) as u64 + body_size as u64;
        if buffer.len() as u64 != total {
            return Err(wire::HeaderError::LengthMismatch {
                expected: total as usize,
                actual: buffer.len(),
            }
            .into());
        }

        let fields_start = HEADER_SIZE;
        let body_start = HEADER_SIZE + align_to(fields_size, 8);

        let mut m = Self {
            header,
            storage: Storage::Received {
                raw: buffer,
                fields: fields_start..fields_start + fields_size,
                body: body_start..body_start + body_size,
            },
            sealed: true,
            sealed_header: None,
            rindex: 0,
            root: Container::root(),
            containers: Vec::new(),
            peeked_signature: None,
            path: None,
            interface: None,
            member: None,
            destination: None,
            sender: None,
            error_name: None,
            error_message: None,
            reply_serial: 0,
            unix_fds: 0,
            dont_send: false,
            creds: creds.unwrap_or_default(),
            label: label.map(str::to_owned),
            fds: Vec::new(),
        };

        m.parse_fields()?;
        Ok(m)
    }

    // ---- accessors ----

    /// The message type.
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        self.header.kind
    }

    /// Byte order of the serialized form.
    #[must_use]
    pub fn endian(&self) -> Endian {
        self.header.endian
    }

    /// The serial, once assigned by [`seal`](Self::seal) or by the peer.
    #[must_use]
    pub fn serial(&self) -> Option<u32> {
        (self.header.serial != 0).then_some(self.header.serial)
    }

    /// The serial of the call this message replies to.
    #[must_use]
    pub fn reply_serial(&self) -> Option<u32> {
        (self.reply_serial != 0).then_some(self.reply_serial)
    }

    /// Whether the sender of a method call expects no reply.
    #[must_use]
    pub fn no_reply_expected(&self) -> bool {
        self.header.kind == MessageType::MethodCall && self.header.flags.no_reply_expected()
    }

    /// Raw header flags.
    #[must_use]
    pub fn flags(&self) -> Flags {
        self.header.flags
    }

    /// Whether this reply answers a call that asked for no reply.
    #[must_use]
    pub fn dont_send(&self) -> bool {
        self.dont_send
    }

    /// Whether the message has been sealed.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// The body signature.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.root.signature
    }

    fn field_str(&self, slice: Option<FieldSlice>) -> Option<&str> {
        let slice = slice?;
        let bytes = self.storage.fields().get(slice.offset..slice.offset + slice.len)?;
        std::str::from_utf8(bytes).ok()
    }

    fn body_str(&self, slice: Option<FieldSlice>) -> Option<&str> {
        let slice = slice?;
        let bytes = self.storage.body().get(slice.offset..slice.offset + slice.len)?;
        std::str::from_utf8(bytes).ok()
    }

    /// The object path header field.
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        self.field_str(self.path)
    }

    /// The interface header field.
    #[must_use]
    pub fn interface(&self) -> Option<&str> {
        self.field_str(self.interface)
    }

    /// The member header field.
    #[must_use]
    pub fn member(&self) -> Option<&str> {
        self.field_str(self.member)
    }

    /// The destination header field.
    #[must_use]
    pub fn destination(&self) -> Option<&str> {
        self.field_str(self.destination)
    }

    /// The sender header field.
    #[must_use]
    pub fn sender(&self) -> Option<&str> {
        self.field_str(self.sender)
    }

    /// The error carried by a method-error message.
    #[must_use]
    pub fn error(&self) -> Option<MethodError<'_>> {
        let name = self.field_str(self.error_name)?;
        Some(MethodError {
            name,
            message: self.body_str(self.error_message),
        })
    }

    /// Number of file descriptors announced by the UNIX_FDS header field.
    #[must_use]
    pub fn unix_fds(&self) -> u32 {
        self.unix_fds
    }

    /// Sending peer's uid, if the transport provided credentials.
    #[must_use]
    pub fn uid(&self) -> Option<u32> {
        self.creds.uid
    }

    /// Sending peer's gid, if the transport provided credentials.
    #[must_use]
    pub fn gid(&self) -> Option<u32> {
        self.creds.gid
    }

    /// Sending peer's pid, if the transport provided credentials.
    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.creds.pid
    }

    /// Sending peer's tid, if the transport provided credentials.
    #[must_use]
    pub fn tid(&self) -> Option<u32> {
        self.creds.tid
    }

    /// Security label of the sending peer.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Returns `true` for signals, optionally matching interface and
    /// member.
    #[must_use]
    pub fn is_signal(&self, interface: Option<&str>, member: Option<&str>) -> bool {
        self.header.kind == MessageType::Signal
            && interface.is_none_or(|i| self.interface() == Some(i))
            && member.is_none_or(|m| self.member() == Some(m))
    }

    /// Returns `true` for method calls, optionally matching interface and
    /// member.
    #[must_use]
    pub fn is_method_call(&self, interface: Option<&str>, member: Option<&str>) -> bool {
        self.header.kind == MessageType::MethodCall
            && interface.is_none_or(|i| self.interface() == Some(i))
            && member.is_none_or(|m| self.member() == Some(m))
    }

    /// Returns `true` for method errors, optionally matching the error
    /// name.
    #[must_use]
    pub fn is_method_error(&self, name: Option<&str>) -> bool {
        self.header.kind == MessageType::MethodError
            && name.is_none_or(|n| self.error().map(|e| e.name) == Some(n))
    }

    // ---- setters ----

    /// Sets the destination header field.
    ///
    /// # Errors
    ///
    /// Fails on sealed messages and when a destination is already set.
    pub fn set_destination(&mut self, destination: &str) -> MessageResult<()> {
        if self.sealed {
            return Err(Error::PermissionDenied {
                operation: "set the destination of a sealed message",
            });
        }
        if self.destination.is_some() {
            return Err(Error::Exists {
                what: "destination",
            });
        }
        self.destination =
            Some(self.append_field_string(FieldCode::Destination, Type::String, destination)?);
        Ok(())
    }

    /// Sets or clears the no-reply flag on an unsealed method call.
    pub fn set_no_reply(&mut self, no_reply: bool) -> MessageResult<()> {
        if self.sealed {
            return Err(Error::PermissionDenied {
                operation: "change flags of a sealed message",
            });
        }
        if self.header.kind != MessageType::MethodCall {
            return Err(Error::PermissionDenied {
                operation: "set no-reply on a non-call message",
            });
        }
        self.header.flags = if no_reply {
            self.header.flags.with_no_reply_expected()
        } else {
            self.header.flags.without_no_reply_expected()
        };
        Ok(())
    }

    // ---- file descriptors ----

    /// Adds a descriptor to an unsealed message and returns its index,
    /// which is the value `h` arguments carry on the wire.
    pub fn push_fd(&mut self, fd: OwnedFd) -> MessageResult<u32> {
        if self.sealed {
            return Err(Error::PermissionDenied {
                operation: "add descriptors to a sealed message",
            });
        }
        let index = self.fds.len() as u32;
        self.fds.push(fd);
        Ok(index)
    }

    /// Hands descriptors received out-of-band to the message.
    pub fn attach_fds(&mut self, fds: Vec<OwnedFd>) {
        self.fds.extend(fds);
    }

    /// Transfers ownership of the message's descriptors to the caller.
    #[must_use]
    pub fn take_fds(&mut self) -> Vec<OwnedFd> {
        std::mem::take(&mut self.fds)
    }

    /// Number of descriptors currently owned by the message.
    #[must_use]
    pub fn fds_len(&self) -> usize {
        self.fds.len()
    }

    // ---- shared internals ----

    pub(crate) fn current(&self) -> &Container {
        self.containers.last().unwrap_or(&self.root)
    }

    pub(crate) fn current_mut(&mut self) -> &mut Container {
        self.containers.last_mut().unwrap_or(&mut self.root)
    }

    pub(crate) fn body_u32_at(&self, offset: usize) -> u32 {
        let bytes = self.storage.body()[offset..offset + 4].try_into().unwrap();
        self.header.endian.read_u32(bytes)
    }
}
