use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use edgelink_middleware::AdapterMetrics;

/// An encoded document on its way to the broker.
///
/// Move-only.  Creation bumps the adapter's in-flight gauge and dropping the
/// buffer settles it, so whichever path ends the publish attempt releases the
/// payload exactly once.
pub struct PayloadBuffer {
    bytes: Bytes,
    metrics: Arc<AdapterMetrics>,
}

impl PayloadBuffer {
    pub fn new(bytes: Bytes, metrics: Arc<AdapterMetrics>) -> Self {
        metrics.payload_acquired();
        Self { bytes, metrics }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle to the same bytes, for handing to the client.
    pub fn bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Drop for PayloadBuffer {
    fn drop(&mut self) {
        self.metrics.payload_released();
    }
}

impl fmt::Debug for PayloadBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadBuffer")
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauge_follows_buffer_lifetime() {
        let metrics = Arc::new(AdapterMetrics::new());
        let a = PayloadBuffer::new(Bytes::from_static(b"{}"), Arc::clone(&metrics));
        let b = PayloadBuffer::new(Bytes::from_static(b"[]"), Arc::clone(&metrics));
        assert_eq!(metrics.payloads_in_flight(), 2);

        let handle = a.bytes();
        drop(a);
        assert_eq!(metrics.payloads_in_flight(), 1);
        assert_eq!(&handle[..], b"{}");

        let moved = b;
        assert_eq!(moved.len(), 2);
        drop(moved);
        assert_eq!(metrics.payloads_in_flight(), 0);
    }
}
