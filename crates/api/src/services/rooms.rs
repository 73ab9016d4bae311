//! Video room provisioning backed by a Jitsi-compatible service.
//!
//! Every call gets a fresh randomly named room under the configured app id.
//! Credentials are RS256 JWTs with the claim shape the conference service
//! expects, one per side so office and device join as distinct users.

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use domain::services::{RoomError, RoomGrant, RoomProvider};
use shared::crypto;

use crate::config::RoomsConfig;

/// Length of the random room name under the app id.
const ROOM_NAME_LENGTH: usize = 10;

/// Claims accepted by the conference service.
///
/// The audience is a bare string rather than the usual array; the service
/// rejects tokens otherwise.
#[derive(Debug, Serialize, Deserialize)]
struct RoomClaims {
    room: String,
    context: RoomContext,
    aud: String,
    iss: String,
    sub: String,
    exp: i64,
    nbf: i64,
    iat: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct RoomContext {
    user: RoomUser,
    features: RoomFeatures,
}

#[derive(Debug, Serialize, Deserialize)]
struct RoomUser {
    id: String,
    name: String,
    avatar: String,
    email: String,
    moderator: bool,
    #[serde(rename = "hidden-from-recorder")]
    hidden_from_recorder: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RoomFeatures {
    livestreaming: bool,
    #[serde(rename = "outbound-call")]
    outbound_call: bool,
    transcription: bool,
    recording: bool,
}

pub struct VideoRoomService {
    app_id: String,
    key_id: String,
    encoding_key: EncodingKey,
    token_expiry_secs: i64,
}

impl VideoRoomService {
    pub fn new(config: &RoomsConfig) -> Result<Self, RoomError> {
        let encoding_key = EncodingKey::from_rsa_pem(config.private_key.as_bytes())
            .map_err(|e| RoomError::Signing(format!("invalid room signing key: {e}")))?;
        Ok(Self {
            app_id: config.app_id.clone(),
            key_id: config.key_id.clone(),
            encoding_key,
            token_expiry_secs: config.token_expiry_secs,
        })
    }

    fn credential(&self, room_name: &str, user_id: &str, user_name: &str) -> Result<String, RoomError> {
        let now = chrono::Utc::now().timestamp();
        let claims = RoomClaims {
            room: room_name.to_string(),
            context: RoomContext {
                user: RoomUser {
                    id: user_id.to_string(),
                    name: user_name.to_string(),
                    avatar: String::new(),
                    email: String::new(),
                    moderator: false,
                    hidden_from_recorder: false,
                },
                features: RoomFeatures::default(),
            },
            aud: "jitsi".to_string(),
            iss: "chat".to_string(),
            sub: self.app_id.clone(),
            exp: now + self.token_expiry_secs,
            nbf: now,
            iat: now,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.key_id.clone());

        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| RoomError::Signing(e.to_string()))
    }
}

impl RoomProvider for VideoRoomService {
    fn new_room(&self) -> Result<RoomGrant, RoomError> {
        let room_name = crypto::random_key(ROOM_NAME_LENGTH);
        let office_credential = self.credential(&room_name, "office", "Office")?;
        let device_credential = self.credential(&room_name, "device", "Device")?;

        Ok(RoomGrant {
            room_id: format!("{}/{}", self.app_id, room_name),
            office_credential,
            device_credential,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    // Test RSA key pair, used only in tests.
    const TEST_PRIVATE_KEY: &str = include_str!("../../../shared/src/testdata/test_key.pem");
    const TEST_PUBLIC_KEY: &str = include_str!("../../../shared/src/testdata/test_key.pub.pem");

    fn service() -> VideoRoomService {
        VideoRoomService::new(&RoomsConfig {
            app_id: "carecall-test".to_string(),
            key_id: "key-1".to_string(),
            private_key: TEST_PRIVATE_KEY.to_string(),
            token_expiry_secs: 7200,
        })
        .unwrap()
    }

    fn decode_claims(token: &str) -> RoomClaims {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&["jitsi"]);
        validation.set_issuer(&["chat"]);
        decode::<RoomClaims>(
            token,
            &DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY.as_bytes()).unwrap(),
            &validation,
        )
        .unwrap()
        .claims
    }

    #[test]
    fn room_id_is_qualified_by_app_id() {
        let grant = service().new_room().unwrap();
        let (app_id, room_name) = grant.room_id.split_once('/').unwrap();
        assert_eq!(app_id, "carecall-test");
        assert_eq!(room_name.len(), ROOM_NAME_LENGTH);
    }

    #[test]
    fn credentials_target_the_same_room_as_distinct_users() {
        let grant = service().new_room().unwrap();
        assert_ne!(grant.office_credential, grant.device_credential);

        let office = decode_claims(&grant.office_credential);
        let device = decode_claims(&grant.device_credential);
        assert_eq!(office.room, device.room);
        assert_eq!(office.context.user.id, "office");
        assert_eq!(device.context.user.id, "device");
        assert_eq!(office.sub, "carecall-test");
    }

    #[test]
    fn fresh_rooms_do_not_collide() {
        let svc = service();
        let a = svc.new_room().unwrap();
        let b = svc.new_room().unwrap();
        assert_ne!(a.room_id, b.room_id);
    }

    #[test]
    fn garbage_key_is_rejected() {
        let result = VideoRoomService::new(&RoomsConfig {
            app_id: "x".to_string(),
            key_id: "k".to_string(),
            private_key: "not a pem".to_string(),
            token_expiry_secs: 7200,
        });
        assert!(result.is_err());
    }
}
