// SPDX-License-Identifier: MIT OR Apache-2.0

//! TFTP client.

use core::net::IpAddr;

use crate::Result;

/// TFTP client used to fetch the boot file.
pub trait Mtftp {
    /// Asks `server` for the size of `file` with the `tsize` option.
    fn get_file_size(&mut self, server: IpAddr, file: &str, block_size: Option<usize>)
    -> Result<u64>;

    /// Downloads `file` into `buffer` and returns its length.
    ///
    /// Fails with `BUFFER_TOO_SMALL` when the file does not fit.
    fn read_file(
        &mut self,
        server: IpAddr,
        file: &str,
        buffer: &mut [u8],
        block_size: Option<usize>,
    ) -> Result<usize>;

    /// Uploads `data` as `file`.
    fn write_file(
        &mut self,
        server: IpAddr,
        file: &str,
        data: &[u8],
        block_size: Option<usize>,
    ) -> Result;

    /// Reads the listing of `directory` into `buffer` and returns its length.
    fn read_directory(
        &mut self,
        server: IpAddr,
        directory: &str,
        buffer: &mut [u8],
        block_size: Option<usize>,
    ) -> Result<usize>;
}
