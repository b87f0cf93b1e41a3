//! Audio merging: concatenate MP3 clips into one podcast file.
//!
//! Clips are joined in exactly the order given, frame by frame, with no
//! cross-fade, trimming or gain change. Before anything is written, every
//! clip is decoded with symphonia to prove it is playable, and its frame
//! layout is checked against the first clip (a single MP3 stream cannot
//! change sample rate or channel count midway).
//!
//! Because tags and VBR header frames are dropped and nothing else is
//! added, merging is associative at the byte level:
//! `merge([merge([a, b]), c]) == merge([a, b, c])`.

use crate::error::PodcastError;
use crate::output::MergedPodcast;
use crate::pipeline::mp3::{scan_frames, FrameHeader};
use std::io::Write;
use std::path::{Path, PathBuf};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info};

/// Concatenate `clips` into `output`.
///
/// Runs on a blocking thread. The output is written to a sibling temporary
/// file and renamed into place, so on any failure `output` is left as it
/// was (absent, or the previous podcast).
pub async fn merge_clips(clips: &[PathBuf], output: &Path) -> Result<MergedPodcast, PodcastError> {
    let clips = clips.to_vec();
    let output = output.to_path_buf();
    tokio::task::spawn_blocking(move || merge_clips_blocking(&clips, &output))
        .await
        .map_err(|e| PodcastError::Internal(format!("Merge task panicked: {e}")))?
}

/// Blocking implementation of [`merge_clips`].
pub fn merge_clips_blocking(
    clips: &[PathBuf],
    output: &Path,
) -> Result<MergedPodcast, PodcastError> {
    if clips.is_empty() {
        return Err(merge_err("no audio clips to merge"));
    }

    let mut merged: Vec<u8> = Vec::new();
    let mut duration_ms = 0u64;
    let mut layout: Option<(u32, u8)> = None;

    for path in clips {
        let data = std::fs::read(path)
            .map_err(|e| merge_err(format!("cannot read {}: {e}", path.display())))?;

        let decoded = decoded_frame_count(&data)
            .map_err(|e| merge_err(format!("{} is not playable: {e}", path.display())))?;
        if decoded == 0 {
            return Err(merge_err(format!("{} contains no audio", path.display())));
        }

        let scan = scan_frames(&data);
        let first = scan
            .first_header()
            .ok_or_else(|| merge_err(format!("{} has no MPEG audio frames", path.display())))?;
        check_layout(&mut layout, first, path)?;

        for frame in &scan.frames {
            merged.extend_from_slice(frame.bytes);
        }
        duration_ms += scan.duration_ms();
        debug!(
            "Merged {} ({} frames, {} junk bytes skipped)",
            path.display(),
            scan.frames.len(),
            scan.junk_bytes
        );
    }

    write_atomically(output, &merged)?;

    info!(
        "Podcast written to {} ({} clips, {} ms, {} bytes)",
        output.display(),
        clips.len(),
        duration_ms,
        merged.len()
    );

    Ok(MergedPodcast {
        path: output.to_path_buf(),
        clip_count: clips.len(),
        duration_ms,
        size_bytes: merged.len() as u64,
    })
}

/// Playing time of one MP3 file in milliseconds, from its frame headers.
pub fn clip_duration_ms(data: &[u8]) -> u64 {
    scan_frames(data).duration_ms()
}

fn check_layout(
    layout: &mut Option<(u32, u8)>,
    header: &FrameHeader,
    path: &Path,
) -> Result<(), PodcastError> {
    let this = (header.sample_rate, header.channels());
    match layout {
        None => {
            *layout = Some(this);
            Ok(())
        }
        Some(expected) if *expected == this => Ok(()),
        Some((rate, channels)) => Err(merge_err(format!(
            "{} is {} Hz / {} ch but earlier clips are {} Hz / {} ch",
            path.display(),
            this.0,
            this.1,
            rate,
            channels
        ))),
    }
}

/// Decode the whole clip and count PCM frames produced.
///
/// Individual corrupt packets are tolerated; a file symphonia cannot open
/// at all is an error.
fn decoded_frame_count(data: &[u8]) -> Result<u64, String> {
    let cursor = std::io::Cursor::new(data.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());
    let mut hint = Hint::new();
    hint.with_extension("mp3");

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| e.to_string())?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| "no audio track".to_string())?;
    let track_id = track.id;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| e.to_string())?;

    let mut frames = 0u64;
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.to_string()),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(buf) => frames += buf.frames() as u64,
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(e.to_string()),
        }
    }
    Ok(frames)
}

fn write_atomically(output: &Path, bytes: &[u8]) -> Result<(), PodcastError> {
    let write_err = |source: std::io::Error| PodcastError::OutputWriteFailed {
        path: output.to_path_buf(),
        source,
    };
    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(write_err)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".podcast-")
        .suffix(".mp3.tmp")
        .tempfile_in(dir)
        .map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(output).map_err(|e| write_err(e.error))?;
    Ok(())
}

fn merge_err(detail: impl Into<String>) -> PodcastError {
    PodcastError::MergeFailed {
        detail: detail.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::mp3::silent_frames;

    fn write_clip(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let p = dir.join(name);
        std::fs::write(&p, bytes).unwrap();
        p
    }

    /// Clip whose frames are distinguishable by a marker byte in the payload.
    fn marked_clip(frames: usize, marker: u8) -> Vec<u8> {
        let mut data = silent_frames(frames);
        // last byte of each frame lives in the main data region
        for i in 0..frames {
            data[(i + 1) * 417 - 1] = marker;
        }
        data
    }

    #[test]
    fn preserves_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_clip(dir.path(), "a.mp3", &marked_clip(3, 0x01));
        let b = write_clip(dir.path(), "b.mp3", &marked_clip(2, 0x02));
        let out = dir.path().join("out.mp3");

        let merged = merge_clips_blocking(&[b.clone(), a.clone()], &out).unwrap();
        assert_eq!(merged.clip_count, 2);

        let bytes = std::fs::read(&out).unwrap();
        let mut expected = std::fs::read(&b).unwrap();
        expected.extend(std::fs::read(&a).unwrap());
        assert_eq!(bytes, expected);
        assert_eq!(merged.size_bytes, bytes.len() as u64);
    }

    #[test]
    fn merge_is_associative() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_clip(dir.path(), "a.mp3", &marked_clip(2, 0x0A));
        let b = write_clip(dir.path(), "b.mp3", &marked_clip(3, 0x0B));
        let c = write_clip(dir.path(), "c.mp3", &marked_clip(4, 0x0C));

        let ab = dir.path().join("ab.mp3");
        merge_clips_blocking(&[a.clone(), b.clone()], &ab).unwrap();
        let ab_c = dir.path().join("ab_c.mp3");
        merge_clips_blocking(&[ab, c.clone()], &ab_c).unwrap();

        let abc = dir.path().join("abc.mp3");
        merge_clips_blocking(&[a, b, c], &abc).unwrap();

        assert_eq!(std::fs::read(ab_c).unwrap(), std::fs::read(abc).unwrap());
    }

    #[test]
    fn duration_is_sum_of_clip_durations() {
        let dir = tempfile::tempdir().unwrap();
        let a_bytes = silent_frames(40);
        let b_bytes = silent_frames(25);
        let a = write_clip(dir.path(), "a.mp3", &a_bytes);
        let b = write_clip(dir.path(), "b.mp3", &b_bytes);
        let out = dir.path().join("out.mp3");

        let merged = merge_clips_blocking(&[a, b], &out).unwrap();
        assert_eq!(
            merged.duration_ms,
            clip_duration_ms(&a_bytes) + clip_duration_ms(&b_bytes)
        );
        assert!(merged.duration_ms > 1000);
    }

    #[test]
    fn id3_tags_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut tagged = vec![b'I', b'D', b'3', 3, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0];
        tagged.extend(silent_frames(3));
        let a = write_clip(dir.path(), "a.mp3", &tagged);
        let out = dir.path().join("out.mp3");

        merge_clips_blocking(&[a], &out).unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), silent_frames(3));
    }

    #[test]
    fn missing_input_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_clip(dir.path(), "a.mp3", &silent_frames(3));
        let missing = dir.path().join("missing.mp3");
        let out = dir.path().join("out.mp3");

        let err = merge_clips_blocking(&[a, missing], &out).unwrap_err();
        assert!(matches!(err, PodcastError::MergeFailed { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn garbage_input_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let junk = write_clip(dir.path(), "junk.mp3", b"<html>quota exceeded</html>");
        let out = dir.path().join("out.mp3");

        let err = merge_clips_blocking(&[junk], &out).unwrap_err();
        assert!(matches!(err, PodcastError::MergeFailed { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn empty_clip_list_fails() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp3");
        assert!(merge_clips_blocking(&[], &out).is_err());
        assert!(!out.exists());
    }

    #[test]
    fn mismatched_sample_rates_fail() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_clip(dir.path(), "a.mp3", &silent_frames(3));
        // same frames re-labelled 48 kHz (sample-rate index 1, frame length 384)
        let mut b_bytes = Vec::new();
        for _ in 0..3 {
            b_bytes.extend_from_slice(&[0xFF, 0xFB, 0x94, 0x64]);
            b_bytes.resize(b_bytes.len() + 384 - 4, 0);
        }
        let b = write_clip(dir.path(), "b.mp3", &b_bytes);
        let out = dir.path().join("out.mp3");

        let err = merge_clips_blocking(&[a, b], &out).unwrap_err();
        assert!(err.to_string().contains("48000 Hz"), "got: {err}");
        assert!(!out.exists());
    }

    #[test]
    fn existing_output_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_clip(dir.path(), "a.mp3", &silent_frames(2));
        let out = write_clip(dir.path(), "final_podcast.mp3", b"old podcast");

        merge_clips_blocking(&[a], &out).unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), silent_frames(2));
    }

    #[tokio::test]
    async fn async_wrapper_merges() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_clip(dir.path(), "a.mp3", &silent_frames(2));
        let out = dir.path().join("nested").join("out.mp3");

        let merged = merge_clips(&[a], &out).await.unwrap();
        assert_eq!(merged.path, out);
        assert!(out.exists());
    }
}
