use thiserror::Error;

pub mod mbr;
pub mod gpt;

/// Partition table reader errors
#[derive(Debug, Error)]
pub enum PtabReadError {
  #[error("Couldn't unpack binary data")]
  Unpack(#[from] deku::DekuError),
  #[error("I/O error")]
  Read(#[from] std::io::Error),
  #[error("No valid partition table")]
  Invalid(String),
  #[error("Unusable partition table entry")]
  InvalidPart(String),
}
