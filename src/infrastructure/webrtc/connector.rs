/// Peer connections backed by webrtc-rs
///
/// Every connection relays through the room's TURN server only, using the
/// local identity as username and the configured credential.
use crate::config::Config;
use crate::domain::connection::{
    ConnectionEvent, NewConnection, RtcConnection, RtcConnector, TransportState,
};
use crate::domain::media::{MediaTrack, RemoteTrack, TrackKind};
use crate::domain::shared::{Candidate, NegotiationError, PeerId, SessionDescription};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::policy::ice_transport_policy::RTCIceTransportPolicy;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

/// Creates relay-only peer connections
pub struct WebRtcConnector {
    api: API,
    configuration: RTCConfiguration,
}

impl WebRtcConnector {
    pub fn new(config: &Config) -> Result<Self, NegotiationError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| NegotiationError::Connection(e.to_string()))?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)
            .map_err(|e| NegotiationError::Connection(e.to_string()))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self {
            api,
            configuration: relay_configuration(config),
        })
    }
}

fn relay_configuration(config: &Config) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: vec![RTCIceServer {
            urls: vec![config.turn_url()],
            username: config.identity.to_string(),
            credential: config.credential.clone().unwrap_or_default(),
            ..Default::default()
        }],
        ice_transport_policy: RTCIceTransportPolicy::Relay,
        ..Default::default()
    }
}

#[async_trait]
impl RtcConnector for WebRtcConnector {
    async fn connect(&self, peer: &PeerId) -> Result<NewConnection, NegotiationError> {
        let pc = Arc::new(
            self.api
                .new_peer_connection(self.configuration.clone())
                .await
                .map_err(|e| NegotiationError::Connection(e.to_string()))?,
        );

        let (tx, events) = mpsc::unbounded_channel();

        let candidates = tx.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let candidates = candidates.clone();
            Box::pin(async move {
                let candidate = match candidate {
                    Some(candidate) => match candidate_blob(&candidate) {
                        Ok(blob) => Some(blob),
                        Err(e) => {
                            warn!("Dropping unserializable local candidate: {}", e);
                            return;
                        }
                    },
                    None => None,
                };
                let _ = candidates.send(ConnectionEvent::LocalCandidate(candidate));
            })
        }));

        let tracks = tx.clone();
        pc.on_track(Box::new(move |track, _receiver, _transceiver| {
            let kind = match track.kind() {
                RTPCodecType::Audio => Some(TrackKind::Audio),
                RTPCodecType::Video => Some(TrackKind::Video),
                _ => None,
            };
            if let Some(kind) = kind {
                let _ = tracks.send(ConnectionEvent::TrackAdded(RemoteTrack {
                    id: track.id(),
                    stream_id: track.stream_id(),
                    kind,
                }));
            }
            Box::pin(async {})
        }));

        let states = tx;
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let mapped = match state {
                RTCPeerConnectionState::New => Some(TransportState::New),
                RTCPeerConnectionState::Connecting => Some(TransportState::Connecting),
                RTCPeerConnectionState::Connected => Some(TransportState::Connected),
                RTCPeerConnectionState::Disconnected => Some(TransportState::Disconnected),
                RTCPeerConnectionState::Failed => Some(TransportState::Failed),
                RTCPeerConnectionState::Closed => Some(TransportState::Closed),
                _ => None,
            };
            if let Some(mapped) = mapped {
                let _ = states.send(ConnectionEvent::StateChanged(mapped));
            }
            Box::pin(async {})
        }));

        debug!("Created peer connection for {}", peer);

        Ok(NewConnection {
            connection: Arc::new(WebRtcConnection { pc }),
            events,
        })
    }
}

fn candidate_blob(candidate: &RTCIceCandidate) -> Result<Candidate, String> {
    let init = candidate.to_json().map_err(|e| e.to_string())?;
    serde_json::to_value(init)
        .map(Candidate::new)
        .map_err(|e| e.to_string())
}

fn description_blob(description: &RTCSessionDescription) -> Result<SessionDescription, NegotiationError> {
    serde_json::to_value(description)
        .map(SessionDescription::new)
        .map_err(|e| NegotiationError::DescriptionRejected(e.to_string()))
}

fn parse_description(
    description: SessionDescription,
) -> Result<RTCSessionDescription, NegotiationError> {
    serde_json::from_value(description.into_value())
        .map_err(|e| NegotiationError::DescriptionRejected(e.to_string()))
}

/// One webrtc-rs peer connection
pub struct WebRtcConnection {
    pc: Arc<RTCPeerConnection>,
}

#[async_trait]
impl RtcConnection for WebRtcConnection {
    async fn add_track(&self, track: &MediaTrack) -> Result<(), NegotiationError> {
        let local = track
            .handle()
            .clone()
            .downcast::<TrackLocalStaticSample>()
            .map_err(|_| {
                NegotiationError::TrackAttach(format!("unsupported handle for track {}", track.id()))
            })?;

        let sender = self
            .pc
            .add_track(local as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(|e| NegotiationError::TrackAttach(e.to_string()))?;

        // Drain RTCP so the interceptors keep running
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while sender.read(&mut buf).await.is_ok() {}
        });

        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError> {
        let offer = self
            .pc
            .create_offer(None)
            .await
            .map_err(|e| NegotiationError::DescriptionRejected(e.to_string()))?;
        description_blob(&offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError> {
        let answer = self
            .pc
            .create_answer(None)
            .await
            .map_err(|e| NegotiationError::DescriptionRejected(e.to_string()))?;
        description_blob(&answer)
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError> {
        self.pc
            .set_local_description(parse_description(description)?)
            .await
            .map_err(|e| NegotiationError::DescriptionRejected(e.to_string()))
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), NegotiationError> {
        self.pc
            .set_remote_description(parse_description(description)?)
            .await
            .map_err(|e| NegotiationError::DescriptionRejected(e.to_string()))
    }

    async fn add_ice_candidate(&self, candidate: Candidate) -> Result<(), NegotiationError> {
        let init: RTCIceCandidateInit = serde_json::from_value(candidate.into_value())
            .map_err(|e| NegotiationError::CandidateRejected(e.to_string()))?;

        self.pc
            .add_ice_candidate(init)
            .await
            .map_err(|e| NegotiationError::CandidateRejected(e.to_string()))
    }

    async fn close(&self) -> Result<(), NegotiationError> {
        self.pc
            .close()
            .await
            .map_err(|e| NegotiationError::Connection(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_only_configuration() {
        let config = Config {
            domain: "turn.example.org:3478".to_string(),
            identity: PeerId::from("1700000000000"),
            credential: Some("secret".to_string()),
        };

        let rtc = relay_configuration(&config);

        assert_eq!(rtc.ice_transport_policy, RTCIceTransportPolicy::Relay);
        assert_eq!(rtc.ice_servers.len(), 1);
        assert_eq!(rtc.ice_servers[0].urls, vec!["turn:turn.example.org:3478".to_string()]);
        assert_eq!(rtc.ice_servers[0].username, "1700000000000");
        assert_eq!(rtc.ice_servers[0].credential, "secret");
    }

    #[test]
    fn test_description_blob_shape() {
        let raw = serde_json::json!({ "type": "offer", "sdp": "v=0\r\n" });
        let parsed = parse_description(SessionDescription::new(raw.clone())).unwrap();
        assert_eq!(parsed.sdp, "v=0\r\n");
        assert_eq!(description_blob(&parsed).unwrap().into_value(), raw);
    }

    #[test]
    fn test_garbage_description_is_rejected() {
        let result = parse_description(SessionDescription::new(serde_json::json!("nope")));
        assert!(matches!(result, Err(NegotiationError::DescriptionRejected(_))));
    }
}
