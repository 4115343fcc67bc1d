// Unit tests for MJPEG frame extraction and the host-side stream reader

use crate::error::bridge::BridgeError;
use crate::media::{AdbMediaCapture, FrameBuffer, MediaCapture};

use std::time::Duration;

use reqwest::Client;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::sleep;

const FRAME: [u8; 7] = [0xFF, 0xD8, 0x01, 0x02, 0x03, 0xFF, 0xD9];

/// **VALUE**: Verifies a frame split across chunks is assembled and part headers are dropped.
///
/// **WHY THIS MATTERS**: Network reads never line up with frame boundaries.
///
/// **BUG THIS CATCHES**: Would catch frames being parsed per chunk, or boundary text leaking
/// into the returned image.
#[test]
fn given_frame_split_across_chunks_when_pushed_then_frame_returned_once_complete() {
    // GIVEN: A multipart part whose JPEG spans two chunks
    let mut frames = FrameBuffer::default();
    let mut first = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
    first.extend_from_slice(&FRAME[..4]);

    // WHEN: Pushing both halves
    let partial = frames.push(&first);
    let complete = frames.push(&FRAME[4..]);

    // THEN: Nothing until the end marker arrives, then exactly the JPEG bytes
    assert_eq!(partial, None);
    assert_eq!(complete, Some(FRAME.to_vec()));
    assert_eq!(frames.pending_len(), 0);
}

/// **VALUE**: Verifies only the newest of several frames in one chunk is kept.
///
/// **BUG THIS CATCHES**: Would catch a screenshot lagging behind the stream by returning the
/// first frame of a burst.
#[test]
fn given_two_frames_in_one_chunk_when_pushed_then_newest_returned() {
    // GIVEN: Two frames back to back
    let mut frames = FrameBuffer::default();
    let newer = [0xFF, 0xD8, 0x09, 0xFF, 0xD9];
    let mut chunk = FRAME.to_vec();
    chunk.extend_from_slice(b"\r\n--frame\r\n\r\n");
    chunk.extend_from_slice(&newer);

    // WHEN: Pushing the chunk
    let latest = frames.push(&chunk);

    // THEN: The second frame wins
    assert_eq!(latest, Some(newer.to_vec()));
}

/// **VALUE**: Verifies a start marker split between chunks is not lost.
///
/// **BUG THIS CATCHES**: Would catch the trailing 0xFF being discarded with the part headers.
#[test]
fn given_start_marker_split_between_chunks_when_pushed_then_frame_found() {
    // GIVEN: Headers ending with the first byte of the start marker
    let mut frames = FrameBuffer::default();
    let mut first = b"\r\n\r\n".to_vec();
    first.push(FRAME[0]);

    // WHEN: Pushing the rest of the frame separately
    assert_eq!(frames.push(&first), None);
    let latest = frames.push(&FRAME[1..]);

    // THEN: The whole frame is recovered
    assert_eq!(latest, Some(FRAME.to_vec()));
}

/// **VALUE**: Verifies the reader keeps the newest frame and stops when asked.
///
/// **WHY THIS MATTERS**: A live stream never ends on its own; teardown is the only thing that
/// stops the reader task.
///
/// **BUG THIS CATCHES**: Would catch a reader that is never spawned, never stored for
/// teardown, or that keeps serving a stale frame after the session ended.
#[tokio::test]
async fn given_live_stream_when_reader_started_then_frame_kept_until_stopped() {
    // GIVEN: A stream that sends one frame and then stays open
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("Should bind");
    let address = listener.local_addr().expect("Local address");
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("Should accept");
        let mut request = [0u8; 1024];
        let _ = socket.read(&mut request).await;
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\n\
                  Content-Type: multipart/x-mixed-replace; boundary=frame\r\n\r\n\
                  --frame\r\nContent-Type: image/jpeg\r\n\r\n",
            )
            .await
            .expect("Should write headers");
        socket.write_all(&FRAME).await.expect("Should write frame");
        socket.write_all(b"\r\n").await.expect("Should write boundary");
        sleep(Duration::from_secs(30)).await;
    });
    let media = AdbMediaCapture::new(Client::new());

    // WHEN: Starting the reader and waiting for a frame
    media
        .start_stream_reader(&format!("http://{address}/stream.mjpeg"))
        .await
        .expect("Reader should start");
    let mut frame = None;
    for _ in 0..100 {
        frame = media.latest_frame();
        if frame.is_some() {
            break;
        }
        sleep(Duration::from_millis(20)).await;
    }

    // THEN: The frame arrived while the reader is still running
    assert_eq!(frame, Some(FRAME.to_vec()));
    assert!(media.is_reading());

    // WHEN: Stopping the reader
    media.stop_stream_reader().await.expect("Stop should succeed");

    // THEN: The task is gone and so is the frame
    assert!(!media.is_reading());
    assert_eq!(media.latest_frame(), None);
    server.abort();
}

/// **VALUE**: Verifies a malformed stream URL fails without spawning a reader.
///
/// **BUG THIS CATCHES**: Would catch a reader task spinning on an unusable URL.
#[tokio::test]
async fn given_invalid_url_when_start_stream_reader_then_parse_error() {
    // GIVEN: Media capture and a URL without a scheme
    let media = AdbMediaCapture::new(Client::new());

    // WHEN: Starting the reader
    let result = media.start_stream_reader("not a url").await;

    // THEN: Parse error and nothing running
    assert!(matches!(result, Err(BridgeError::Parse { .. })));
    assert!(!media.is_reading());
}
