//! Test suites, one module per functional area.

pub mod deprecated_api;
pub mod network;
pub mod single_node;
pub mod storage;
pub mod upgrade;
pub mod virt;

use common::error::TestError;

/// Fail with an assertion error unless `condition` holds.
pub(crate) fn ensure(condition: bool, message: impl Into<String>) -> Result<(), TestError> {
    if condition {
        Ok(())
    } else {
        Err(TestError::Assertion(message.into()))
    }
}
