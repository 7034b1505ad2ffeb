// SPDX-License-Identifier: MIT OR Apache-2.0

//! Facilities for dealing with UEFI operation results.

use core::fmt::Debug;

/// The error type that we use, essentially a status code + optional additional data
mod error;
pub use error::Error;

/// Definition of UEFI's standard status codes
mod status;
pub use status::{Status, StatusExt};

/// Return type of most operations in this crate. Both success and error
/// payloads are optional.
///
/// Every operation produces a status code which indicates either success, a
/// warning, or an error. This type alias maps [`Status::SUCCESS`] to the `Ok`
/// variant (with optional `Output` data), and maps both warning and error
/// statuses to the `Err` variant (with optional `ErrData`).
///
/// Warnings are treated as errors by default because they generally indicate
/// an abnormal situation.
///
/// Some convenience methods are provided by the [`ResultExt`] trait.
pub type Result<Output = (), ErrData = ()> = core::result::Result<Output, Error<ErrData>>;

/// Extension trait which provides some convenience methods for [`Result`].
pub trait ResultExt<Output, ErrData: Debug> {
    /// Extract the UEFI status from this result
    fn status(&self) -> Status;

    /// Transform the ErrData value to ()
    fn discard_errdata(self) -> Result<Output>;

    /// Calls `op` if the result contains a warning, otherwise returns
    /// the result unchanged.
    ///
    /// By default warning statuses are treated as errors (i.e. stored in the
    /// `Err` variant) because they generally indicate an abnormal
    /// situation. In rare cases though it may be helpful to handle a
    /// warning. This method is similar to [`Result::or_else`], except that
    /// `op` is called only when the status is a warning.
    ///
    /// # Example
    ///
    /// ```
    /// use efi_netboot::{ResultExt, Status, StatusExt};
    ///
    /// # fn x() -> efi_netboot::Result {
    /// # let some_result = Status::WARN_STALE_DATA.to_result();
    /// // Treat a specific warning as success, propagate others as errors.
    /// some_result.handle_warning(|err| {
    ///     if err.status() == Status::WARN_STALE_DATA {
    ///         Ok(())
    ///     } else {
    ///         Err(err)
    ///     }
    /// })?;
    /// # Status::SUCCESS.to_result()
    /// # }
    /// ```
    fn handle_warning<O>(self, op: O) -> Result<Output, ErrData>
    where
        O: FnOnce(Error<ErrData>) -> Result<Output, ErrData>;
}

impl<Output, ErrData: Debug> ResultExt<Output, ErrData> for Result<Output, ErrData> {
    fn status(&self) -> Status {
        match self {
            Ok(_) => Status::SUCCESS,
            Err(e) => e.status(),
        }
    }

    fn discard_errdata(self) -> Result<Output> {
        match self {
            Ok(o) => Ok(o),
            Err(e) => Err(e.status().into()),
        }
    }

    fn handle_warning<O>(self, op: O) -> Result<Output, ErrData>
    where
        O: FnOnce(Error<ErrData>) -> Result<Output, ErrData>,
    {
        match self {
            Ok(output) => Ok(output),
            Err(err) => {
                if err.status().is_warning() {
                    op(err)
                } else {
                    Err(err)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_warning() {
        let stale = Status::WARN_STALE_DATA.to_result();
        assert!(stale.handle_warning(|_| Ok(())).is_ok());

        let timeout = Status::TIMEOUT.to_result();
        assert_eq!(
            timeout.handle_warning(|_| Ok(())).status(),
            Status::TIMEOUT
        );
    }

    #[test]
    fn test_discard_errdata() {
        let r: Result<(), usize> = Err(Error::new(Status::BUFFER_TOO_SMALL, 1514));
        assert_eq!(r.discard_errdata().status(), Status::BUFFER_TOO_SMALL);
    }
}
