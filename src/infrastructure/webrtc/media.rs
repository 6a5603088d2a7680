/// Synthetic local media backed by webrtc-rs sample tracks
///
/// Stands in for device capture: it produces one Opus audio track and one
/// VP8 video track on a single local stream. Nothing is written to them
/// here; a capture pipeline would push samples into the handles.
use crate::domain::media::{MediaBundle, MediaConstraints, MediaSource, MediaTrack, TrackKind};
use crate::domain::shared::MediaAcquisitionError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

#[derive(Debug, Clone, Default)]
pub struct SyntheticMediaSource;

impl SyntheticMediaSource {
    pub fn new() -> Self {
        Self
    }

    fn track(mime_type: &str, kind: TrackKind, stream_id: &str) -> MediaTrack {
        let id = format!("{}-{}", kind, Uuid::new_v4());
        let sample = TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: mime_type.to_owned(),
                ..Default::default()
            },
            id.clone(),
            stream_id.to_owned(),
        );
        MediaTrack::new(id, stream_id, kind, Arc::new(sample))
    }
}

#[async_trait]
impl MediaSource for SyntheticMediaSource {
    async fn acquire(
        &self,
        constraints: &MediaConstraints,
    ) -> Result<MediaBundle, MediaAcquisitionError> {
        if !constraints.audio && !constraints.video {
            return Err(MediaAcquisitionError::Unsatisfiable(
                "neither audio nor video requested".to_string(),
            ));
        }

        let stream_id = Uuid::new_v4().to_string();
        let mut bundle = MediaBundle::default();

        if constraints.video {
            bundle.push(Self::track(MIME_TYPE_VP8, TrackKind::Video, &stream_id));
        }
        if constraints.audio {
            bundle.push(Self::track(MIME_TYPE_OPUS, TrackKind::Audio, &stream_id));
        }

        info!("Acquired {} synthetic local tracks", bundle.len());
        Ok(bundle)
    }
}
