//! Capture-file framing.
//!
//! A capture file is a flat sequence of frames, each laid out as
//! `[len: u32 LE][crc32: u32 LE][payload: len bytes]` where the payload is a
//! bincode-encoded [`RecordFrame`]. The first frame must be a
//! [`SessionHeader`]; every following frame is an event. CRC mismatches and
//! mid-frame truncation are hard errors; EOF at a frame boundary is the
//! normal end of file.
use crate::record::{RecordFrame, SessionHeader};
use anyhow::{bail, Context, Result};
use crc32fast::Hasher as Crc32;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

/// Serialize one frame with its length/CRC envelope.
pub fn write_frame<W: Write>(w: &mut W, frame: &RecordFrame) -> Result<()> {
    let payload = bincode::serialize(frame)?;
    let mut hasher = Crc32::new();
    hasher.update(&payload);
    let crc = hasher.finalize();

    let len = payload.len() as u32;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(&crc.to_le_bytes())?;
    w.write_all(&payload)?;
    Ok(())
}

/// Sequential frame reader over any byte stream.
pub struct FrameReader<R: Read> {
    inner: R,
    frames: usize,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, frames: 0 }
    }

    /// Frames successfully decoded so far.
    pub fn frames_read(&self) -> usize {
        self.frames
    }

    /// Read the next frame, or `Ok(None)` at a clean end of file.
    pub fn next_frame(&mut self) -> Result<Option<RecordFrame>> {
        let len = match read_u32(&mut self.inner) {
            Ok(v) => v as usize,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let crc_on_file = read_u32(&mut self.inner)
            .with_context(|| format!("frame {}: truncated envelope", self.frames))?;
        let mut payload = vec![0u8; len];
        self.inner
            .read_exact(&mut payload)
            .with_context(|| format!("frame {}: truncated payload", self.frames))?;

        let mut hasher = Crc32::new();
        hasher.update(&payload);
        let crc_calc = hasher.finalize();
        if crc_calc != crc_on_file {
            bail!(
                "CRC mismatch at frame {}: file={:#x}, calc={:#x}",
                self.frames,
                crc_on_file,
                crc_calc
            );
        }
        let frame: RecordFrame = bincode::deserialize(&payload)
            .with_context(|| format!("frame {}: bincode decode", self.frames))?;
        self.frames += 1;
        Ok(Some(frame))
    }
}

fn read_u32<R: Read>(r: &mut R) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Open a capture file and consume its leading header frame.
pub fn open_capture(path: &Path) -> Result<(SessionHeader, FrameReader<BufReader<File>>)> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = FrameReader::new(BufReader::new(file));
    match reader.next_frame()? {
        Some(RecordFrame::Header(h)) => Ok((h, reader)),
        Some(RecordFrame::Event(_)) => {
            bail!("{}: first frame is not a session header", path.display())
        }
        None => bail!("{}: empty capture file", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Action, Event, Side};
    use std::io::Cursor;

    fn header() -> SessionHeader {
        SessionHeader {
            version: 1,
            dataset: "GLBX.MDP3".into(),
            start_ts: 1_000,
            end_ts: 2_000,
            symbols: Vec::new(),
        }
    }

    fn event(ts: u64) -> Event {
        Event {
            instrument_id: 7,
            ts_recv: ts,
            ts_event: ts,
            action: Action::Add,
            side: Side::Bid,
            size: 1,
            price: 100 * crate::record::FIXED_PRICE_SCALE,
            order_id: 42,
            flags: 0,
        }
    }

    #[test]
    fn frames_roundtrip() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &RecordFrame::Header(header())).unwrap();
        write_frame(&mut buf, &RecordFrame::Event(event(5))).unwrap();

        let mut r = FrameReader::new(Cursor::new(buf));
        match r.next_frame().unwrap() {
            Some(RecordFrame::Header(h)) => assert_eq!(h, header()),
            other => panic!("unexpected frame: {:?}", other),
        }
        match r.next_frame().unwrap() {
            Some(RecordFrame::Event(e)) => assert_eq!(e, event(5)),
            other => panic!("unexpected frame: {:?}", other),
        }
        assert!(r.next_frame().unwrap().is_none());
        assert_eq!(r.frames_read(), 2);
    }

    #[test]
    fn crc_mismatch_is_an_error() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &RecordFrame::Event(event(5))).unwrap();
        // Flip a payload byte after the 8-byte envelope.
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;

        let mut r = FrameReader::new(Cursor::new(buf));
        let err = r.next_frame().unwrap_err();
        assert!(err.to_string().contains("CRC mismatch"), "{err}");
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &RecordFrame::Event(event(5))).unwrap();
        buf.truncate(buf.len() - 3);

        let mut r = FrameReader::new(Cursor::new(buf));
        assert!(r.next_frame().is_err());
    }
}
