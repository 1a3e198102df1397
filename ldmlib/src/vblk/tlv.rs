use crate::LdmError;

/// Read-only walker over a VBLK record body.
///
/// Variable-width fields carry a one-byte length prefix `L` followed by `L`
/// bytes of big-endian integer or string payload; fixed-width fields are
/// read bare. Malformed records may claim lengths past the end of the
/// record, so every read checks the remaining bytes before advancing.
pub(crate) struct Cursor<'a> {
  buf: &'a [u8],
  pos: usize,
}

impl<'a> Cursor<'a> {
  pub(crate) fn new(buf: &'a [u8]) -> Self {
    Self { buf, pos: 0 }
  }

  /// Take the next `n` bytes
  pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], LdmError> {
    if self.buf.len() - self.pos < n {
      return Err(LdmError::Invalid(format!("Record truncated: wanted {} bytes at offset {} of {}", n, self.pos, self.buf.len())));
    }
    let taken = &self.buf[self.pos..self.pos + n];
    self.pos += n;
    Ok(taken)
  }

  /// Advance over `n` bytes of fixed-width fields
  pub(crate) fn skip(&mut self, n: usize) -> Result<(), LdmError> {
    self.take(n).map(|_| ())
  }

  /// Read a bare byte
  pub(crate) fn u8(&mut self) -> Result<u8, LdmError> {
    Ok(self.take(1)?[0])
  }

  /// Read a bare big-endian 64-bit integer
  pub(crate) fn be64(&mut self) -> Result<u64, LdmError> {
    let bytes = self.take(8)?;
    Ok(u64::from_be_bytes(bytes.try_into().unwrap()))
  }

  /// Read a length-prefixed big-endian integer of at most `max_width`
  /// bytes. A wider prefix is a logic violation on our side of the
  /// contract, not input corruption.
  pub(crate) fn var_int(&mut self, max_width: usize) -> Result<u64, LdmError> {
    let width = self.u8()? as usize;
    if width > max_width {
      return Err(LdmError::Internal(format!("Variable integer of {} bytes exceeds {}-byte target", width, max_width)));
    }
    let mut value = 0u64;
    for byte in self.take(width)? {
      value = value << 8 | *byte as u64;
    }
    Ok(value)
  }

  /// Read a length-prefixed integer into a u32 target
  pub(crate) fn var_u32(&mut self) -> Result<u32, LdmError> {
    Ok(self.var_int(4)? as u32)
  }

  /// Read a length-prefixed integer into a u64 target
  pub(crate) fn var_u64(&mut self) -> Result<u64, LdmError> {
    self.var_int(8)
  }

  /// Read a length-prefixed string
  pub(crate) fn var_string(&mut self) -> Result<String, LdmError> {
    let length = self.u8()? as usize;
    let bytes = self.take(length)?;
    match String::from_utf8(bytes.to_vec()) {
      Ok(s) => Ok(s),
      _ => Err(LdmError::Invalid(format!("Record string failed UTF8 conversion: {:?}", bytes))),
    }
  }

  /// Advance over a length-prefixed field without interpreting it
  pub(crate) fn var_skip(&mut self) -> Result<(), LdmError> {
    let length = self.u8()? as usize;
    self.skip(length)
  }
}
