//! Minimal WebM (Matroska/EBML) muxer for a single Opus audio track.
//!
//! Only what a one-shot chunk needs is written: the EBML header, segment
//! info, one `A_OPUS` track and clusters of `SimpleBlock`s.  No cues, no
//! seek head, sizes are always known up front.
//!
//! Element layout:
//!
//! ```text
//! EBML            DocType "webm"
//! Segment
//!   Info          TimecodeScale 1 ms, Duration
//!   Tracks
//!     TrackEntry  #1 audio, A_OPUS, OpusHead, 48 kHz mono
//!   Cluster*      Timecode, SimpleBlock*
//! ```

// Element IDs (marker bits included).
const EBML: u32 = 0x1A45_DFA3;
const EBML_VERSION: u32 = 0x4286;
const EBML_READ_VERSION: u32 = 0x42F7;
const EBML_MAX_ID_LENGTH: u32 = 0x42F2;
const EBML_MAX_SIZE_LENGTH: u32 = 0x42F3;
const DOC_TYPE: u32 = 0x4282;
const DOC_TYPE_VERSION: u32 = 0x4287;
const DOC_TYPE_READ_VERSION: u32 = 0x4285;

const SEGMENT: u32 = 0x1853_8067;
const INFO: u32 = 0x1549_A966;
const TIMECODE_SCALE: u32 = 0x2A_D7B1;
const MUXING_APP: u32 = 0x4D80;
const WRITING_APP: u32 = 0x5741;
const DURATION: u32 = 0x4489;

const TRACKS: u32 = 0x1654_AE6B;
const TRACK_ENTRY: u32 = 0xAE;
const TRACK_NUMBER: u32 = 0xD7;
const TRACK_UID: u32 = 0x73C5;
const TRACK_TYPE: u32 = 0x83;
const CODEC_ID: u32 = 0x86;
const CODEC_PRIVATE: u32 = 0x63A2;
const CODEC_DELAY: u32 = 0x56AA;
const SEEK_PRE_ROLL: u32 = 0x56BB;
const AUDIO: u32 = 0xE1;
const SAMPLING_FREQUENCY: u32 = 0xB5;
const CHANNELS: u32 = 0x9F;

const CLUSTER: u32 = 0x1F43_B675;
const TIMECODE: u32 = 0xE7;
const SIMPLE_BLOCK: u32 = 0xA3;

const TRACK_TYPE_AUDIO: u64 = 2;
const KEYFRAME: u8 = 0x80;
/// Block timecodes are signed 16-bit offsets from the cluster timecode.
const MAX_CLUSTER_SPAN_MS: u64 = 30_000;
/// Opus always decodes at 48 kHz.
const OPUS_OUTPUT_RATE: u32 = 48_000;
const SEEK_PRE_ROLL_NS: u64 = 80_000_000;

const APP: &str = concat!("interview-coach ", env!("CARGO_PKG_VERSION"));

/// Parameters of the Opus track, written as the `OpusHead` codec private.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpusTrack {
    pub channels: u8,
    /// Rate of the audio fed to the encoder.
    pub input_rate: u32,
    /// Decoder samples (at 48 kHz) to discard at the start.
    pub pre_skip: u16,
}

impl OpusTrack {
    /// The 19-byte `OpusHead` identification header (RFC 7845 §5.1).
    pub fn opus_head(&self) -> Vec<u8> {
        let mut head = Vec::with_capacity(19);
        head.extend_from_slice(b"OpusHead");
        head.push(1);
        head.push(self.channels);
        head.extend_from_slice(&self.pre_skip.to_le_bytes());
        head.extend_from_slice(&self.input_rate.to_le_bytes());
        head.extend_from_slice(&0i16.to_le_bytes());
        head.push(0);
        head
    }

    fn codec_delay_ns(&self) -> u64 {
        self.pre_skip as u64 * 1_000_000_000 / OPUS_OUTPUT_RATE as u64
    }
}

/// Mux `packets`, each `frame_ms` long, into a complete WebM file.
pub fn mux_opus(track: &OpusTrack, packets: &[Vec<u8>], frame_ms: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(256 + packets.iter().map(|p| p.len() + 8).sum::<usize>());

    master(&mut out, EBML, |b| {
        uint(b, EBML_VERSION, 1);
        uint(b, EBML_READ_VERSION, 1);
        uint(b, EBML_MAX_ID_LENGTH, 4);
        uint(b, EBML_MAX_SIZE_LENGTH, 8);
        bytes(b, DOC_TYPE, b"webm");
        uint(b, DOC_TYPE_VERSION, 4);
        uint(b, DOC_TYPE_READ_VERSION, 2);
    });

    master(&mut out, SEGMENT, |segment| {
        master(segment, INFO, |b| {
            uint(b, TIMECODE_SCALE, 1_000_000);
            bytes(b, MUXING_APP, APP.as_bytes());
            bytes(b, WRITING_APP, APP.as_bytes());
            float(b, DURATION, (packets.len() as u64 * frame_ms) as f64);
        });

        master(segment, TRACKS, |tracks| {
            master(tracks, TRACK_ENTRY, |b| {
                uint(b, TRACK_NUMBER, 1);
                uint(b, TRACK_UID, 1);
                uint(b, TRACK_TYPE, TRACK_TYPE_AUDIO);
                bytes(b, CODEC_ID, b"A_OPUS");
                bytes(b, CODEC_PRIVATE, &track.opus_head());
                uint(b, CODEC_DELAY, track.codec_delay_ns());
                uint(b, SEEK_PRE_ROLL, SEEK_PRE_ROLL_NS);
                master(b, AUDIO, |a| {
                    float(a, SAMPLING_FREQUENCY, OPUS_OUTPUT_RATE as f64);
                    uint(a, CHANNELS, track.channels as u64);
                });
            });
        });

        let per_cluster = (MAX_CLUSTER_SPAN_MS / frame_ms.max(1)).max(1) as usize;
        for (index, group) in packets.chunks(per_cluster).enumerate() {
            let cluster_start = (index * per_cluster) as u64 * frame_ms;
            master(segment, CLUSTER, |cluster| {
                uint(cluster, TIMECODE, cluster_start);
                for (offset, packet) in group.iter().enumerate() {
                    simple_block(cluster, (offset as u64 * frame_ms) as i16, packet);
                }
            });
        }
    });

    out
}

// ---------------------------------------------------------------------------
// EBML primitives
// ---------------------------------------------------------------------------

fn simple_block(out: &mut Vec<u8>, relative_ms: i16, frame: &[u8]) {
    let mut body = Vec::with_capacity(4 + frame.len());
    body.push(0x81); // track number 1 as a one-byte vint
    body.extend_from_slice(&relative_ms.to_be_bytes());
    body.push(KEYFRAME);
    body.extend_from_slice(frame);
    bytes(out, SIMPLE_BLOCK, &body);
}

fn master(out: &mut Vec<u8>, id: u32, build: impl FnOnce(&mut Vec<u8>)) {
    let mut body = Vec::new();
    build(&mut body);
    bytes(out, id, &body);
}

fn uint(out: &mut Vec<u8>, id: u32, value: u64) {
    let be = value.to_be_bytes();
    let skip = be.iter().take_while(|&&b| b == 0).count().min(7);
    bytes(out, id, &be[skip..]);
}

fn float(out: &mut Vec<u8>, id: u32, value: f64) {
    bytes(out, id, &value.to_be_bytes());
}

fn bytes(out: &mut Vec<u8>, id: u32, body: &[u8]) {
    put_id(out, id);
    put_size(out, body.len() as u64);
    out.extend_from_slice(body);
}

fn put_id(out: &mut Vec<u8>, id: u32) {
    let be = id.to_be_bytes();
    let skip = be.iter().take_while(|&&b| b == 0).count().min(3);
    out.extend_from_slice(&be[skip..]);
}

/// Data size as an EBML variable-length integer.  All-ones is reserved
/// for "unknown", so each width holds one less than its full range.
fn put_size(out: &mut Vec<u8>, size: u64) {
    let width = (1..=8u32)
        .find(|w| size < (1u64 << (7 * w)) - 1)
        .unwrap_or(8);
    let marked = size | (1u64 << (7 * width));
    out.extend_from_slice(&marked.to_be_bytes()[(8 - width as usize)..]);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
