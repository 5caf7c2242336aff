// demux/flv.rs
//
// Production `Demuxer` backed by the `flavors` FLV tag parser. `flavors`
// parses a byte slice and tells us via `nom::Err::Incomplete` when it needs
// more bytes than we've buffered yet, so this adapter's job is just to keep
// pulling chunks off the HTTP response body until a full header or tag is
// available, then hand back a `Packet`.

use bytes::{Buf, Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use std::pin::Pin;

use super::{DemuxError, Demuxer, Packet, PacketKind};

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

pub struct FlvTagDemuxer {
    stream: ByteStream,
    buf: BytesMut,
    eof: bool,
    header_consumed: bool,
}

impl FlvTagDemuxer {
    pub fn new(stream: impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static) -> Self {
        Self {
            stream: Box::pin(stream),
            buf: BytesMut::new(),
            eof: false,
            header_consumed: false,
        }
    }

    async fn fill(&mut self) -> Result<bool, DemuxError> {
        if self.eof {
            return Ok(false);
        }
        match self.stream.next().await {
            Some(Ok(chunk)) => {
                self.buf.extend_from_slice(&chunk);
                Ok(true)
            }
            Some(Err(e)) => Err(DemuxError(e.to_string())),
            None => {
                self.eof = true;
                Ok(false)
            }
        }
    }

    async fn ensure_header(&mut self) -> Result<(), DemuxError> {
        if self.header_consumed {
            return Ok(());
        }
        loop {
            match flavors::parser::header(&self.buf) {
                Ok((rest, _header)) => {
                    let consumed = self.buf.len() - rest.len();
                    self.buf.advance(consumed);
                    self.header_consumed = true;
                    // The 4-byte "PreviousTagSize0" field (always 0)
                    // immediately follows the header, before the first tag.
                    return self.skip_previous_tag_size().await;
                }
                Err(nom::Err::Incomplete(_)) => {
                    if !self.fill().await? {
                        return Err(DemuxError("truncated FLV header".into()));
                    }
                }
                Err(e) => return Err(DemuxError(format!("invalid FLV header: {e}"))),
            }
        }
    }

    async fn skip_previous_tag_size(&mut self) -> Result<(), DemuxError> {
        const PREV_TAG_SIZE_LEN: usize = 4;
        while self.buf.len() < PREV_TAG_SIZE_LEN {
            if !self.fill().await? {
                // Trailing previous-tag-size omitted at true EOF is tolerated.
                return Ok(());
            }
        }
        self.buf.advance(PREV_TAG_SIZE_LEN);
        Ok(())
    }
}

#[async_trait::async_trait]
impl Demuxer for FlvTagDemuxer {
    async fn next_packet(&mut self) -> Result<Option<Packet>, DemuxError> {
        self.ensure_header().await?;

        let tag_header = loop {
            match flavors::parser::tag_header(&self.buf) {
                Ok((rest, tag_header)) => {
                    let consumed = self.buf.len() - rest.len();
                    self.buf.advance(consumed);
                    break tag_header;
                }
                Err(nom::Err::Incomplete(_)) => {
                    if !self.fill().await? {
                        if self.buf.is_empty() {
                            return Ok(None);
                        }
                        return Err(DemuxError("truncated FLV tag header".into()));
                    }
                }
                Err(e) => return Err(DemuxError(format!("invalid FLV tag header: {e}"))),
            }
        };

        let data_size = tag_header.data_size as usize;
        while self.buf.len() < data_size {
            if !self.fill().await? {
                return Err(DemuxError("truncated FLV tag body".into()));
            }
        }

        let tag_data = loop {
            match flavors::parser::tag_data(&self.buf[..data_size], tag_header.tag_type) {
                Ok((_rest, tag_data)) => break tag_data,
                Err(nom::Err::Incomplete(_)) => {
                    if !self.fill().await? {
                        return Err(DemuxError("truncated FLV tag data".into()));
                    }
                }
                Err(e) => return Err(DemuxError(format!("invalid FLV tag data: {e}"))),
            }
        };
        self.buf.advance(data_size);

        let dts_ms = tag_header.timestamp as i64;
        let packet = match tag_data {
            flavors::parser::TagData::Video(video) => {
                let is_keyframe = matches!(video.frame_type, flavors::parser::FrameType::Key);
                Some(Packet {
                    kind: PacketKind::Video,
                    data: video.data.to_vec(),
                    dts_ms,
                    is_keyframe,
                })
            }
            flavors::parser::TagData::Audio(audio) => Some(Packet {
                kind: PacketKind::Audio,
                data: audio.data.to_vec(),
                dts_ms,
                is_keyframe: false,
            }),
            flavors::parser::TagData::Script => Some(Packet {
                kind: PacketKind::Metadata,
                data: Vec::new(),
                dts_ms,
                is_keyframe: false,
            }),
        };

        self.skip_previous_tag_size().await?;
        Ok(packet)
    }
}
