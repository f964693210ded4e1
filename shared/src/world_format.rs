use serde::{Deserialize, Serialize};

use crate::{PathDoc, PointDoc, UserProfile};

pub const WORLD_FILE_MAGIC: [u8; 4] = *b"WMAP";
pub const WORLD_FILE_VERSION: u32 = 1;
const WORLD_HEADER_LEN: usize = WORLD_FILE_MAGIC.len() + std::mem::size_of::<u32>();

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldFileData {
    pub points: Vec<PointDoc>,
    pub paths: Vec<PathDoc>,
    pub users: Vec<UserProfile>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum WorldFileDecodeError {
    UnsupportedVersion(u32),
    InvalidData,
}

impl std::fmt::Display for WorldFileDecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorldFileDecodeError::UnsupportedVersion(version) => {
                write!(f, "unsupported world file version: {version}")
            }
            WorldFileDecodeError::InvalidData => write!(f, "invalid world file data"),
        }
    }
}

pub fn encode_world_file(data: &WorldFileData) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&WORLD_FILE_MAGIC);
    payload.extend_from_slice(&WORLD_FILE_VERSION.to_le_bytes());
    let body =
        bincode::serde::encode_to_vec(data, bincode::config::standard()).unwrap_or_default();
    payload.extend_from_slice(&body);
    payload
}

pub fn decode_world_file(payload: &[u8]) -> Result<WorldFileData, WorldFileDecodeError> {
    if !(payload.len() >= WORLD_HEADER_LEN && payload.starts_with(&WORLD_FILE_MAGIC)) {
        return Err(WorldFileDecodeError::InvalidData);
    }
    let version = u32::from_le_bytes(
        payload[WORLD_FILE_MAGIC.len()..WORLD_HEADER_LEN]
            .try_into()
            .map_err(|_| WorldFileDecodeError::InvalidData)?,
    );
    let body = &payload[WORLD_HEADER_LEN..];
    match version {
        1 => bincode::serde::decode_from_slice(body, bincode::config::standard())
            .map(|(data, _)| data)
            .map_err(|_| WorldFileDecodeError::InvalidData),
        _ => Err(WorldFileDecodeError::UnsupportedVersion(version)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeoPoint;
    use uuid::Uuid;

    #[test]
    fn world_file_round_trips() {
        let data = WorldFileData {
            points: vec![PointDoc {
                id: Uuid::from_u128(1),
                owner: Uuid::from_u128(2),
                position: GeoPoint::new(40.11, -88.04),
                note: String::new(),
                created_at_ms: 5,
            }],
            paths: vec![PathDoc {
                owner: Uuid::from_u128(2),
                coordinates: vec![GeoPoint::new(1.0, 1.0), GeoPoint::new(2.0, 2.0)],
                updated_at_ms: 6,
            }],
            users: vec![UserProfile {
                id: Uuid::from_u128(2),
                name: "Ada".to_string(),
            }],
        };
        let payload = encode_world_file(&data);
        let decoded = decode_world_file(&payload).unwrap();
        assert_eq!(decoded.points, data.points);
        assert_eq!(decoded.paths, data.paths);
        assert_eq!(decoded.users, data.users);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut payload = encode_world_file(&WorldFileData::default());
        payload[0] = b'X';
        assert_eq!(
            decode_world_file(&payload),
            Err(WorldFileDecodeError::InvalidData)
        );
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut payload = encode_world_file(&WorldFileData::default());
        payload[4..8].copy_from_slice(&9u32.to_le_bytes());
        assert_eq!(
            decode_world_file(&payload),
            Err(WorldFileDecodeError::UnsupportedVersion(9))
        );
    }
}
