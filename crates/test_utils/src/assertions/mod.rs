// Path: crates/test_utils/src/assertions/mod.rs
//! Assertions over adapter results.

/// Unwraps an `Ok`, printing the error otherwise.
#[macro_export]
macro_rules! assert_ok {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(err) => panic!("expected Ok, got Err: {:?}", err),
        }
    };
}

/// Asserts that a call failed with an error matching `pattern` and returns the error.
///
/// ```ignore
/// let err = assert_vm_err!(client.initialize(params).await, VmError::Transport(_));
/// ```
#[macro_export]
macro_rules! assert_vm_err {
    ($expr:expr, $pattern:pat) => {
        match $expr {
            Ok(_) => panic!("expected Err({}), got Ok", stringify!($pattern)),
            Err(err) => {
                assert!(
                    matches!(err, $pattern),
                    "expected {}, got {:?}",
                    stringify!($pattern),
                    err
                );
                err
            }
        }
    };
}

/// Asserts that a gRPC call failed with the given `tonic::Code`.
#[macro_export]
macro_rules! assert_grpc_code {
    ($expr:expr, $code:expr) => {
        match $expr {
            Ok(_) => panic!("expected status {:?}, got Ok", $code),
            Err(status) => assert_eq!(status.code(), $code, "{}", status.message()),
        }
    };
}
