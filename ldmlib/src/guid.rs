use uuid::Uuid;

use crate::LdmError;

/// Parse an ASCII GUID out of a NUL-padded fixed-width field, as found in
/// the private header and in revision 3 disk records. The canonical
/// internal form is the raw 16 bytes; display always goes through
/// [`Uuid`]'s lowercase hyphenated form.
pub(crate) fn parse_ascii(field: &[u8]) -> Result<Uuid, LdmError> {
  let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
  let text = std::str::from_utf8(&field[..end])
    .map_err(|_| LdmError::Invalid("GUID field is not ASCII".to_string()))?;
  Uuid::parse_str(text.trim())
    .map_err(|_| LdmError::Invalid(format!("Unparseable GUID: {:?}", text)))
}
