// Path: crates/types/src/error/codes.rs
//! The wire error-code table.
//!
//! Responses carry a small `uint32 err` field; `0` always means success. The
//! table is a bijection between the non-zero codes below and the protocol-declared
//! [`VmError`] kinds, and is used by the adapter when decoding responses and by
//! the proxies when encoding them.

use super::{DatabaseError, VmError};

/// The code meaning "no error".
pub const NO_ERROR: u32 = 0;

/// The non-zero codes understood by both sides of the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum WireCode {
    /// The resource is closed.
    Closed = 1,
    /// The entity was not found.
    NotFound = 2,
    /// The height index is not implemented.
    HeightIndexNotImplemented = 3,
    /// The height index is incomplete.
    HeightIndexIncomplete = 4,
    /// State sync is not implemented.
    StateSyncNotImplemented = 5,
}

impl WireCode {
    /// Every entry of the table, in code order.
    pub const ALL: [WireCode; 5] = [
        WireCode::Closed,
        WireCode::NotFound,
        WireCode::HeightIndexNotImplemented,
        WireCode::HeightIndexIncomplete,
        WireCode::StateSyncNotImplemented,
    ];

    /// Returns the integer carried on the wire.
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Returns the typed error this code denotes.
    pub fn to_error(self) -> VmError {
        match self {
            WireCode::Closed => VmError::Closed,
            WireCode::NotFound => VmError::NotFound,
            WireCode::HeightIndexNotImplemented => VmError::HeightIndexNotImplemented,
            WireCode::HeightIndexIncomplete => VmError::HeightIndexIncomplete,
            WireCode::StateSyncNotImplemented => VmError::StateSyncNotImplemented,
        }
    }
}

impl TryFrom<u32> for WireCode {
    type Error = u32;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        WireCode::ALL
            .into_iter()
            .find(|c| c.as_u32() == code)
            .ok_or(code)
    }
}

/// Translates an embedded response code into a result.
///
/// `0` is success; a known code yields its typed error; any other value is
/// reported as [`VmError::UnknownCode`] so it is never mistaken for success.
pub fn error_from_code(code: u32) -> Result<(), VmError> {
    if code == NO_ERROR {
        return Ok(());
    }
    match WireCode::try_from(code) {
        Ok(known) => Err(known.to_error()),
        Err(unknown) => Err(VmError::UnknownCode(unknown)),
    }
}

/// Returns the wire code for an error, or `None` if the error has no table
/// entry and must travel as an RPC status instead.
pub fn code_from_error(err: &VmError) -> Option<u32> {
    let code = match err {
        VmError::Closed => WireCode::Closed,
        VmError::NotFound => WireCode::NotFound,
        VmError::HeightIndexNotImplemented => WireCode::HeightIndexNotImplemented,
        VmError::HeightIndexIncomplete => WireCode::HeightIndexIncomplete,
        VmError::StateSyncNotImplemented => WireCode::StateSyncNotImplemented,
        _ => return None,
    };
    Some(code.as_u32())
}

/// Returns the wire code for a database error, or `None` for backend failures.
pub fn code_from_db_error(err: &DatabaseError) -> Option<u32> {
    match err {
        DatabaseError::Closed => Some(WireCode::Closed.as_u32()),
        DatabaseError::NotFound => Some(WireCode::NotFound.as_u32()),
        DatabaseError::Backend(_) => None,
    }
}

/// Translates an embedded database response code into a result.
pub fn db_error_from_code(code: u32) -> Result<(), DatabaseError> {
    match code {
        NO_ERROR => Ok(()),
        c if c == WireCode::Closed.as_u32() => Err(DatabaseError::Closed),
        c if c == WireCode::NotFound.as_u32() => Err(DatabaseError::NotFound),
        other => Err(DatabaseError::Backend(format!("unknown wire error code {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_success() {
        assert_eq!(error_from_code(NO_ERROR), Ok(()));
        assert_eq!(db_error_from_code(NO_ERROR), Ok(()));
    }

    #[test]
    fn table_is_a_bijection() {
        for code in WireCode::ALL {
            let err = error_from_code(code.as_u32()).unwrap_err();
            assert_eq!(code_from_error(&err), Some(code.as_u32()));
        }
        let mut seen: Vec<u32> = WireCode::ALL.iter().map(|c| c.as_u32()).collect();
        seen.dedup();
        assert_eq!(seen.len(), WireCode::ALL.len());
        assert!(!seen.contains(&NO_ERROR));
    }

    #[test]
    fn unknown_codes_are_failures() {
        assert_eq!(error_from_code(42), Err(VmError::UnknownCode(42)));
        assert!(matches!(
            db_error_from_code(9),
            Err(DatabaseError::Backend(_))
        ));
    }

    #[test]
    fn capability_signals_are_soft() {
        assert!(error_from_code(5).unwrap_err().is_not_implemented());
        assert!(error_from_code(3).unwrap_err().is_not_implemented());
        assert!(!error_from_code(4).unwrap_err().is_not_implemented());
    }

    #[test]
    fn non_protocol_errors_have_no_code() {
        assert_eq!(code_from_error(&VmError::Transport("eof".into())), None);
        assert_eq!(code_from_db_error(&DatabaseError::Backend("io".into())), None);
        assert_eq!(code_from_db_error(&DatabaseError::NotFound), Some(2));
    }
}
