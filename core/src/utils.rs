use crate::{EscrowError, Result};

/// Asserts that `res` failed with exactly `expected`.
pub fn assert_err<T: std::fmt::Debug>(res: Result<T>, expected: EscrowError) {
    match res {
        Err(e) => assert_eq!(e, expected),
        Ok(value) => panic!("expected error `{expected}`, got Ok({value:?})"),
    }
}
