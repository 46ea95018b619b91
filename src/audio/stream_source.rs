use crate::error::{AppError, AppResult};
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::{Arc, Condvar, Mutex};

const MAX_BUFFER_SIZE: usize = 8 * 1024 * 1024; // 8MB back-pressure limit

/// Shared state between the download task and the symphonia reader.
struct StreamBuffer {
    /// All downloaded bytes (append-only from writer side).
    data: Vec<u8>,
    /// Read cursor position.
    position: usize,
    /// Whether the writer is done, successfully or not.
    finished: bool,
    /// Download error, if any.
    error: Option<String>,
    /// Reader side dropped; the writer should stop downloading.
    closed: bool,
}

/// Adapter that makes a downloaded byte stream look like a seekable
/// `Read` + `symphonia::core::io::MediaSource`.
/// All downloaded bytes are retained in memory so symphonia can seek backwards.
pub struct HttpStreamSource {
    shared: Arc<(Mutex<StreamBuffer>, Condvar)>,
}

impl HttpStreamSource {
    pub fn new() -> (Self, StreamWriter) {
        let shared = Arc::new((
            Mutex::new(StreamBuffer {
                data: Vec::with_capacity(1024 * 1024), // Pre-allocate 1MB
                position: 0,
                finished: false,
                error: None,
                closed: false,
            }),
            Condvar::new(),
        ));

        let source = Self {
            shared: Arc::clone(&shared),
        };
        let writer = StreamWriter { shared };

        (source, writer)
    }
}

impl Read for HttpStreamSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let (lock, cvar) = &*self.shared;
        let mut state = lock.lock().unwrap();

        // Wait until we have data beyond our position, the stream is finished, or there's an error
        while state.position >= state.data.len() && !state.finished && state.error.is_none() {
            state = cvar.wait(state).unwrap();
        }

        if let Some(ref err) = state.error {
            return Err(io::Error::new(io::ErrorKind::Other, err.clone()));
        }

        let available = state.data.len().saturating_sub(state.position);
        if available == 0 {
            return Ok(0); // EOF
        }

        let to_read = buf.len().min(available);
        buf[..to_read].copy_from_slice(&state.data[state.position..state.position + to_read]);
        state.position += to_read;

        cvar.notify_all();

        Ok(to_read)
    }
}

impl Seek for HttpStreamSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (lock, _cvar) = &*self.shared;
        let mut state = lock.lock().unwrap();

        let new_pos = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(offset) => state.position as i64 + offset,
            SeekFrom::End(offset) => state.data.len() as i64 + offset,
        };

        if new_pos < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Seek to negative position",
            ));
        }

        state.position = new_pos as usize;
        Ok(state.position as u64)
    }
}

impl symphonia::core::io::MediaSource for HttpStreamSource {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        let (lock, _) = &*self.shared;
        let state = lock.lock().unwrap();
        if state.finished && state.error.is_none() {
            Some(state.data.len() as u64)
        } else {
            None
        }
    }
}

impl Drop for HttpStreamSource {
    fn drop(&mut self) {
        let (lock, cvar) = &*self.shared;
        if let Ok(mut state) = lock.lock() {
            state.closed = true;
            cvar.notify_all();
        }
    }
}

/// Writer end that receives bytes from the download task.
pub struct StreamWriter {
    shared: Arc<(Mutex<StreamBuffer>, Condvar)>,
}

impl StreamWriter {
    /// Append bytes, blocking while the reader is far behind. Fails once the
    /// reader has been dropped so the download can stop early.
    pub fn write_bytes(&self, data: &[u8]) -> AppResult<()> {
        let (lock, cvar) = &*self.shared;
        let mut state = lock.lock().unwrap();

        while (state.data.len() - state.position) >= MAX_BUFFER_SIZE
            && !state.finished
            && !state.closed
        {
            state = cvar.wait(state).unwrap();
        }

        if state.closed {
            return Err(AppError::Stream("reader closed".into()));
        }
        if state.finished {
            return Ok(());
        }

        state.data.extend_from_slice(data);
        cvar.notify_all();
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        let (lock, _) = &*self.shared;
        lock.lock().map(|s| s.closed).unwrap_or(true)
    }

    pub fn finish(&self) {
        let (lock, cvar) = &*self.shared;
        let mut state = lock.lock().unwrap();
        state.finished = true;
        cvar.notify_all();
    }

    pub fn set_error(&self, error: String) {
        let (lock, cvar) = &*self.shared;
        let mut state = lock.lock().unwrap();
        state.error = Some(error);
        state.finished = true;
        cvar.notify_all();
    }
}

impl Drop for StreamWriter {
    // An aborted download must not leave the reader waiting forever.
    fn drop(&mut self) {
        let (lock, cvar) = &*self.shared;
        if let Ok(mut state) = lock.lock() {
            if !state.finished {
                state.error = Some("download aborted".into());
                state.finished = true;
            }
            cvar.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_sees_bytes_written_from_another_thread() {
        let (mut source, writer) = HttpStreamSource::new();
        let handle = std::thread::spawn(move || {
            writer.write_bytes(b"hello ").unwrap();
            writer.write_bytes(b"world").unwrap();
            writer.finish();
        });

        let mut out = String::new();
        source.read_to_string(&mut out).unwrap();
        handle.join().unwrap();
        assert_eq!(out, "hello world");
    }

    #[test]
    fn dropped_writer_unblocks_reader_with_error() {
        let (mut source, writer) = HttpStreamSource::new();
        drop(writer);
        let mut buf = [0u8; 4];
        assert!(source.read(&mut buf).is_err());
    }

    #[test]
    fn dropped_reader_stops_writer() {
        let (source, writer) = HttpStreamSource::new();
        drop(source);
        assert!(writer.is_closed());
        assert!(writer.write_bytes(b"x").is_err());
    }

    #[test]
    fn seek_back_rereads_retained_bytes() {
        let (mut source, writer) = HttpStreamSource::new();
        writer.write_bytes(b"abcdef").unwrap();
        writer.finish();

        let mut buf = [0u8; 3];
        source.read_exact(&mut buf).unwrap();
        source.seek(SeekFrom::Start(1)).unwrap();
        source.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"bcd");
    }
}
