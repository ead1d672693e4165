//! Storage reads bounded by a timeout.

use embassy_time::{with_timeout, Duration};
use platform::config::LOAD_READ_TIMEOUT_MS;
use platform::storage::{read_full, File};

/// Why a bounded read failed.
pub(crate) enum ReadFault<E> {
    Io(E),
    Timeout,
}

/// [`read_full`] that gives up after [`LOAD_READ_TIMEOUT_MS`].
///
/// A wedged card otherwise hangs the loader forever.
pub(crate) async fn read_chunk<F: File>(
    file: &mut F,
    buf: &mut [u8],
) -> Result<usize, ReadFault<F::Error>> {
    match with_timeout(Duration::from_millis(LOAD_READ_TIMEOUT_MS), read_full(file, buf)).await {
        Ok(Ok(n)) => Ok(n),
        Ok(Err(e)) => Err(ReadFault::Io(e)),
        Err(_) => Err(ReadFault::Timeout),
    }
}
