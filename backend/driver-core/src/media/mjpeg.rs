//! Frame extraction from a multipart MJPEG byte stream.
//!
//! Part headers and boundaries are skipped; a frame is everything from a JPEG
//! start-of-image marker up to and including the next end-of-image marker.

use log::warn;

const START_OF_IMAGE: [u8; 2] = [0xFF, 0xD8];
const END_OF_IMAGE: [u8; 2] = [0xFF, 0xD9];
const MAX_PENDING_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Default)]
pub struct FrameBuffer {
    pending: Vec<u8>,
}

impl FrameBuffer {
    /// Append a chunk and return the newest frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Option<Vec<u8>> {
        self.pending.extend_from_slice(chunk);

        let mut latest = None;
        loop {
            let Some(start) = find_marker(&self.pending, &START_OF_IMAGE) else {
                // A trailing 0xFF may be the first half of the next marker.
                let keep = usize::from(self.pending.last() == Some(&0xFF));
                let drop_to = self.pending.len() - keep;
                self.pending.drain(..drop_to);
                break;
            };

            let body = start + START_OF_IMAGE.len();
            let Some(end) = find_marker(&self.pending[body..], &END_OF_IMAGE) else {
                self.pending.drain(..start);
                break;
            };

            let end = body + end + END_OF_IMAGE.len();
            latest = Some(self.pending[start..end].to_vec());
            self.pending.drain(..end);
        }

        if self.pending.len() > MAX_PENDING_BYTES {
            warn!(
                "Dropping {} buffered media stream bytes without an end-of-image marker",
                self.pending.len()
            );
            self.pending.clear();
        }

        latest
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn find_marker(haystack: &[u8], marker: &[u8; 2]) -> Option<usize> {
    haystack.windows(marker.len()).position(|window| window == marker)
}
