// demux/mod.rs
//
// The sampling loop only needs a source of typed packets carrying a DTS
// and a keyframe flag. That capability is modeled as a trait so tests can
// replay a scripted packet sequence without a live FLV server, and the
// production path can swap in `flavors` without `stream::probe` knowing
// the difference.

mod flv;

pub use flv::FlvTagDemuxer;

/// One demuxed elementary-stream packet.
#[derive(Debug, Clone)]
pub struct Packet {
    pub kind: PacketKind,
    pub data: Vec<u8>,
    /// Decoding timestamp in milliseconds, non-decreasing within a track.
    pub dts_ms: i64,
    pub is_keyframe: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Video,
    Audio,
    Metadata,
}

#[derive(Debug, Clone)]
pub struct DemuxError(pub String);

impl std::fmt::Display for DemuxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for DemuxError {}

/// A source of demuxed packets. `next_packet` returns `Ok(None)` on clean
/// end-of-stream and `Err` on any other read/parse failure.
#[async_trait::async_trait]
pub trait Demuxer: Send {
    async fn next_packet(&mut self) -> Result<Option<Packet>, DemuxError>;
}

#[cfg(test)]
pub use test_support::ScriptedDemuxer;
