//! MPEG audio frame scanning.
//!
//! Merging works on whole frames: each clip is split into its MPEG audio
//! frames, metadata is dropped, and the frames are written back to back.
//! What counts as metadata:
//!
//! - an ID3v2 tag at the start of the file
//! - an ID3v1 `TAG` block in the last 128 bytes
//! - a Xing / Info / VBRI header frame (an audio-frame-shaped block that
//!   describes the *whole* file and would be wrong once clips are joined)
//!
//! Everything else between frames is treated as junk and skipped while
//! resynchronising on the next frame header.

/// MPEG audio version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    V1,
    V2,
    V2_5,
}

/// MPEG audio layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    L1,
    L2,
    L3,
}

/// Decoded 4-byte frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: MpegVersion,
    pub layer: Layer,
    pub has_crc: bool,
    pub bitrate_kbps: u32,
    pub sample_rate: u32,
    pub padding: bool,
    /// Channel mode bits; 3 is mono.
    pub channel_mode: u8,
    /// Total frame length in bytes, header included.
    pub frame_len: usize,
}

const BITRATES_V1: [[u32; 15]; 3] = [
    [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448],
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384],
    [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320],
];

const BITRATES_V2: [[u32; 15]; 2] = [
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256],
    [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160],
];

const SAMPLE_RATES: [[u32; 3]; 3] = [
    [44100, 48000, 32000],
    [22050, 24000, 16000],
    [11025, 12000, 8000],
];

const ID3V1_LEN: usize = 128;

impl FrameHeader {
    /// Parse a frame header. Returns `None` for anything that is not a
    /// valid, fixed-bitrate MPEG audio header.
    pub fn parse(b: [u8; 4]) -> Option<Self> {
        if b[0] != 0xFF || b[1] & 0xE0 != 0xE0 {
            return None;
        }
        let version = match (b[1] >> 3) & 0b11 {
            0 => MpegVersion::V2_5,
            2 => MpegVersion::V2,
            3 => MpegVersion::V1,
            _ => return None,
        };
        let layer = match (b[1] >> 1) & 0b11 {
            1 => Layer::L3,
            2 => Layer::L2,
            3 => Layer::L1,
            _ => return None,
        };
        let has_crc = b[1] & 1 == 0;

        let bitrate_idx = usize::from(b[2] >> 4);
        let sr_idx = usize::from((b[2] >> 2) & 0b11);
        // 0 is "free format", 15 is invalid; 3 is a reserved sample rate.
        if bitrate_idx == 0 || bitrate_idx == 15 || sr_idx == 3 {
            return None;
        }
        let bitrate_kbps = match (version, layer) {
            (MpegVersion::V1, Layer::L1) => BITRATES_V1[0][bitrate_idx],
            (MpegVersion::V1, Layer::L2) => BITRATES_V1[1][bitrate_idx],
            (MpegVersion::V1, Layer::L3) => BITRATES_V1[2][bitrate_idx],
            (_, Layer::L1) => BITRATES_V2[0][bitrate_idx],
            (_, _) => BITRATES_V2[1][bitrate_idx],
        };
        let sample_rate = match version {
            MpegVersion::V1 => SAMPLE_RATES[0][sr_idx],
            MpegVersion::V2 => SAMPLE_RATES[1][sr_idx],
            MpegVersion::V2_5 => SAMPLE_RATES[2][sr_idx],
        };
        let padding = (b[2] >> 1) & 1 == 1;
        let channel_mode = b[3] >> 6;

        let bitrate = bitrate_kbps * 1000;
        let pad = u32::from(padding);
        let frame_len = match (version, layer) {
            (_, Layer::L1) => (12 * bitrate / sample_rate + pad) * 4,
            (MpegVersion::V1, _) | (_, Layer::L2) => 144 * bitrate / sample_rate + pad,
            (_, Layer::L3) => 72 * bitrate / sample_rate + pad,
        } as usize;

        Some(Self {
            version,
            layer,
            has_crc,
            bitrate_kbps,
            sample_rate,
            padding,
            channel_mode,
            frame_len,
        })
    }

    /// PCM samples per channel carried by one frame.
    pub fn samples_per_frame(&self) -> u32 {
        match (self.version, self.layer) {
            (_, Layer::L1) => 384,
            (MpegVersion::V1, _) | (_, Layer::L2) => 1152,
            (_, Layer::L3) => 576,
        }
    }

    pub fn channels(&self) -> u8 {
        if self.channel_mode == 3 {
            1
        } else {
            2
        }
    }

    /// Offset of a Xing/Info tag inside a layer III frame.
    fn xing_offset(&self) -> usize {
        let side_info = match (self.version, self.channels()) {
            (MpegVersion::V1, 1) => 17,
            (MpegVersion::V1, _) => 32,
            (_, 1) => 9,
            (_, _) => 17,
        };
        4 + if self.has_crc { 2 } else { 0 } + side_info
    }
}

/// One MPEG audio frame borrowed from a clip.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub header: FrameHeader,
    pub bytes: &'a [u8],
}

/// The audio frames of one clip, metadata removed.
#[derive(Debug, Default)]
pub struct FrameScan<'a> {
    pub frames: Vec<Frame<'a>>,
    /// Bytes skipped because they were neither frames nor known tags.
    pub junk_bytes: usize,
}

impl FrameScan<'_> {
    /// Playing time in milliseconds, from the frame headers.
    pub fn duration_ms(&self) -> u64 {
        self.frames
            .iter()
            .map(|f| {
                u64::from(f.header.samples_per_frame()) * 1_000_000
                    / u64::from(f.header.sample_rate)
            })
            .sum::<u64>()
            / 1000
    }

    /// Header of the first audio frame.
    pub fn first_header(&self) -> Option<&FrameHeader> {
        self.frames.first().map(|f| &f.header)
    }
}

/// Split an MP3 file into audio frames, dropping ID3 tags and VBR headers.
pub fn scan_frames(data: &[u8]) -> FrameScan<'_> {
    let start = id3v2_len(data).min(data.len());
    let end = if data.len() >= start + ID3V1_LEN && data[data.len() - ID3V1_LEN..].starts_with(b"TAG")
    {
        data.len() - ID3V1_LEN
    } else {
        data.len()
    };
    let body = &data[start..end];

    let mut scan = FrameScan::default();
    let mut pos = 0;
    while pos + 4 <= body.len() {
        let header = FrameHeader::parse([body[pos], body[pos + 1], body[pos + 2], body[pos + 3]]);
        match header {
            Some(h) if h.frame_len >= 4 && pos + h.frame_len <= body.len() => {
                let bytes = &body[pos..pos + h.frame_len];
                if !(scan.frames.is_empty() && is_vbr_header(&h, bytes)) {
                    scan.frames.push(Frame { header: h, bytes });
                }
                pos += h.frame_len;
            }
            _ => {
                scan.junk_bytes += 1;
                pos += 1;
            }
        }
    }
    scan.junk_bytes += body.len() - pos;
    scan
}

/// Length of a leading ID3v2 tag (header, body and optional footer).
fn id3v2_len(data: &[u8]) -> usize {
    if data.len() < 10 || &data[..3] != b"ID3" {
        return 0;
    }
    let size = data[6..10]
        .iter()
        .fold(0usize, |acc, &b| (acc << 7) | usize::from(b & 0x7F));
    let footer = if data[5] & 0x10 != 0 { 10 } else { 0 };
    10 + size + footer
}

fn is_vbr_header(h: &FrameHeader, frame: &[u8]) -> bool {
    let has_tag_at = |offset: usize, tags: &[&[u8; 4]]| {
        frame
            .get(offset..offset + 4)
            .is_some_and(|w| tags.iter().any(|t| w == t.as_slice()))
    };
    h.layer == Layer::L3 && (has_tag_at(h.xing_offset(), &[b"Xing", b"Info"]) || has_tag_at(36, &[b"VBRI"]))
}

/// Silent MPEG-1 layer III frames (128 kbps, 44.1 kHz, joint stereo).
#[cfg(test)]
pub(crate) fn silent_frames(count: usize) -> Vec<u8> {
    const HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x64];
    const FRAME_LEN: usize = 417;
    let mut out = Vec::with_capacity(count * FRAME_LEN);
    for _ in 0..count {
        out.extend_from_slice(&HEADER);
        out.resize(out.len() + FRAME_LEN - HEADER.len(), 0);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mpeg1_layer3_header() {
        let h = FrameHeader::parse([0xFF, 0xFB, 0x90, 0x64]).unwrap();
        assert_eq!(h.version, MpegVersion::V1);
        assert_eq!(h.layer, Layer::L3);
        assert_eq!(h.bitrate_kbps, 128);
        assert_eq!(h.sample_rate, 44100);
        assert_eq!(h.frame_len, 417);
        assert_eq!(h.samples_per_frame(), 1152);
        assert_eq!(h.channels(), 2);
        assert!(!h.has_crc);
    }

    #[test]
    fn parses_mpeg2_layer3_header() {
        // MPEG-2 L3, 64 kbps, 24 kHz, unpadded, mono.
        let h = FrameHeader::parse([0xFF, 0xF3, 0x84, 0xC4]).unwrap();
        assert_eq!(h.version, MpegVersion::V2);
        assert_eq!(h.bitrate_kbps, 64);
        assert_eq!(h.sample_rate, 24000);
        assert!(!h.padding);
        assert_eq!(h.channels(), 1);
        assert_eq!(h.frame_len, 72 * 64_000 / 24_000);
        assert_eq!(h.samples_per_frame(), 576);
    }

    #[test]
    fn rejects_non_headers() {
        assert!(FrameHeader::parse([0x49, 0x44, 0x33, 0x04]).is_none());
        // free-format bitrate
        assert!(FrameHeader::parse([0xFF, 0xFB, 0x00, 0x64]).is_none());
        // reserved sample rate
        assert!(FrameHeader::parse([0xFF, 0xFB, 0x9C, 0x64]).is_none());
        // reserved version
        assert!(FrameHeader::parse([0xFF, 0xEB, 0x90, 0x64]).is_none());
    }

    #[test]
    fn scans_plain_frames() {
        let data = silent_frames(5);
        let scan = scan_frames(&data);
        assert_eq!(scan.frames.len(), 5);
        assert_eq!(scan.junk_bytes, 0);
        assert_eq!(scan.duration_ms(), 5 * 1152 * 1000 / 44100);
    }

    #[test]
    fn skips_id3_tags() {
        let mut data = vec![b'I', b'D', b'3', 4, 0, 0, 0, 0, 0, 20];
        data.extend_from_slice(&[0xAA; 20]);
        data.extend(silent_frames(3));
        let mut v1 = b"TAG".to_vec();
        v1.resize(ID3V1_LEN, b' ');
        data.extend(v1);

        let scan = scan_frames(&data);
        assert_eq!(scan.frames.len(), 3);
        assert_eq!(scan.junk_bytes, 0);
    }

    #[test]
    fn drops_leading_xing_frame() {
        let mut data = silent_frames(4);
        let h = FrameHeader::parse([0xFF, 0xFB, 0x90, 0x64]).unwrap();
        let off = h.xing_offset();
        data[off..off + 4].copy_from_slice(b"Info");

        let scan = scan_frames(&data);
        assert_eq!(scan.frames.len(), 3);
        assert!(scan.frames.iter().all(|f| &f.bytes[off..off + 4] != b"Info"));
    }

    #[test]
    fn garbage_has_no_frames() {
        let data = b"this is definitely not an mp3 file".to_vec();
        let scan = scan_frames(&data);
        assert!(scan.frames.is_empty());
        assert_eq!(scan.junk_bytes, data.len());
    }
}
