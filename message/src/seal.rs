//! Sealing and the serialized view: iovec spans and flat blobs.

use std::io::IoSlice;

use wire::FieldCode;

use crate::error::{Error, MessageResult};
use crate::message::{Message, Storage};

/// Zero padding inserted between the fields region and the body.
static PADDING: [u8; 7] = [0; 7];

impl Message {
    /// Seals the message: appends the SIGNATURE and UNIX_FDS header fields
    /// as needed, assigns the serial, and freezes the regions. One-way.
    ///
    /// # Errors
    ///
    /// Fails on already-sealed messages, a zero serial, and open
    /// containers.
    pub fn seal(&mut self, serial: u32) -> MessageResult<()> {
        if self.sealed {
            return Err(Error::PermissionDenied {
                operation: "seal a sealed message",
            });
        }
        if serial == 0 {
            return Err(Error::InvalidArgument {
                what: "serial must be nonzero",
            });
        }
        if !self.containers.is_empty() {
            return Err(Error::InvalidState {
                operation: "seal a message with open containers",
            });
        }

        if !self.root.signature.is_empty() {
            let sig = self.root.signature.clone();
            self.append_field_signature(FieldCode::Signature, &sig)?;
        }
        if !self.fds.is_empty() {
            let count = self.fds.len() as u32;
            self.append_field_u32(FieldCode::UnixFds, count)?;
            self.unix_fds = count;
        }

        self.header.serial = serial;
        self.sealed = true;
        self.sealed_header = Some(self.header.encode());
        Ok(())
    }

    /// The serialized message as an ordered list of byte spans: header,
    /// fields, zero padding to 8, body. Received messages are a single
    /// span.
    ///
    /// # Errors
    ///
    /// Fails on unsealed messages.
    pub fn iovec(&self) -> MessageResult<Vec<IoSlice<'_>>> {
        if !self.sealed {
            return Err(Error::PermissionDenied {
                operation: "serialize an unsealed message",
            });
        }

        match &self.storage {
            Storage::Received { raw, .. } => Ok(vec![IoSlice::new(raw)]),
            Storage::Built { fields, body } => {
                let header = self
                    .sealed_header
                    .as_ref()
                    .ok_or(Error::InvalidState {
                        operation: "serialize before sealing",
                    })?;

                let mut spans = vec![IoSlice::new(header)];
                if fields.len() > 0 {
                    spans.push(IoSlice::new(fields.as_slice()));
                    let tail = fields.len() % 8;
                    if tail != 0 {
                        spans.push(IoSlice::new(&PADDING[..8 - tail]));
                    }
                }
                if body.len() > 0 {
                    spans.push(IoSlice::new(body.as_slice()));
                }
                Ok(spans)
            }
        }
    }

    /// Total size of the serialized message in bytes.
    pub fn wire_size(&self) -> MessageResult<usize> {
        Ok(self.iovec()?.iter().map(|span| span.len()).sum())
    }

    /// The serialized message as one flat buffer, for transports that do
    /// not take vectored writes.
    pub fn to_blob(&self) -> MessageResult<Vec<u8>> {
        let spans = self.iovec()?;
        let total = spans.iter().map(|span| span.len()).sum();
        let mut out = Vec::with_capacity(total);
        for span in spans {
            out.extend_from_slice(&span);
        }
        Ok(out)
    }
}
