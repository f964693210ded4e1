use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod world_format;

pub type UserId = Uuid;
pub type PointId = Uuid;

pub const MAX_NOTE_LEN: usize = 500;
pub const MAX_NAME_LEN: usize = 40;
pub const MAX_PATH_COORDINATES: usize = 500;

/// Geographic position in degrees.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_well_formed(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && self.lat.abs() <= 90.0
            && self.lng.abs() <= 180.0
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PointDoc {
    pub id: PointId,
    pub owner: UserId,
    pub position: GeoPoint,
    pub note: String,
    pub created_at_ms: u64,
}

impl PointDoc {
    pub fn is_well_formed(&self) -> bool {
        self.position.is_well_formed() && self.note.len() <= MAX_NOTE_LEN
    }
}

/// One path per user, keyed by the owner id. Whole-sequence overwrite
/// on every write; a stored path always has at least two coordinates.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PathDoc {
    pub owner: UserId,
    pub coordinates: Vec<GeoPoint>,
    pub updated_at_ms: u64,
}

impl PathDoc {
    pub fn is_renderable(&self) -> bool {
        self.coordinates.len() >= 2
            && self.coordinates.len() <= MAX_PATH_COORDINATES
            && self.coordinates.iter().all(GeoPoint::is_well_formed)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Points,
    Paths,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Points => "points",
            Collection::Paths => "paths",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum ClientMessage {
    SignIn { name: String },
    SignOut,
    Subscribe { collection: Collection },
    Unsubscribe { collection: Collection },
    CreatePoint { position: GeoPoint, note: String },
    UpdateNote { id: PointId, note: String },
    DeletePoint { id: PointId },
    SetPath { coordinates: Vec<GeoPoint> },
    DeletePath,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum ServerMessage {
    AuthState { user: Option<UserProfile> },
    UsersSync { users: Vec<UserProfile> },
    UserSeen { user: UserProfile },
    PointsSync { points: Vec<PointDoc> },
    PointAdded { point: PointDoc },
    PointModified { point: PointDoc },
    PointRemoved { id: PointId },
    PathsSync { paths: Vec<PathDoc> },
    PathSet { path: PathDoc },
    PathRemoved { owner: UserId },
    Error { op: String, reason: String },
}

pub fn sanitize_note(mut note: String) -> String {
    if note.len() > MAX_NOTE_LEN {
        let mut cut = MAX_NOTE_LEN;
        while !note.is_char_boundary(cut) {
            cut -= 1;
        }
        note.truncate(cut);
    }
    note
}

pub fn sanitize_name(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return None;
    }
    Some(name.to_string())
}

/// Result of dropping one coordinate from a path after the point that
/// carried it was deleted.
#[derive(Clone, Debug, PartialEq)]
pub enum PathCascade {
    /// The coordinate was not part of the path.
    Untouched,
    /// The path survives with the remaining coordinates.
    Rewritten(Vec<GeoPoint>),
    /// Fewer than two coordinates remain; the path document must go.
    Emptied,
}

/// Coordinate equality is exact: the removed value was copied out of
/// the same document set, never recomputed.
pub fn cascade_after_point_delete(path: &PathDoc, removed: GeoPoint) -> PathCascade {
    if !path.coordinates.contains(&removed) {
        return PathCascade::Untouched;
    }
    let remaining: Vec<GeoPoint> = path
        .coordinates
        .iter()
        .copied()
        .filter(|coordinate| *coordinate != removed)
        .collect();
    if remaining.len() >= 2 {
        PathCascade::Rewritten(remaining)
    } else {
        PathCascade::Emptied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(coordinates: Vec<GeoPoint>) -> PathDoc {
        PathDoc {
            owner: Uuid::from_u128(1),
            coordinates,
            updated_at_ms: 0,
        }
    }

    #[test]
    fn geo_point_rejects_non_finite_and_out_of_range() {
        assert!(GeoPoint::new(40.11, -88.04).is_well_formed());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_well_formed());
        assert!(!GeoPoint::new(0.0, f64::INFINITY).is_well_formed());
        assert!(!GeoPoint::new(90.5, 0.0).is_well_formed());
        assert!(!GeoPoint::new(0.0, -180.5).is_well_formed());
    }

    #[test]
    fn short_paths_are_not_renderable() {
        assert!(!path(vec![]).is_renderable());
        assert!(!path(vec![GeoPoint::new(1.0, 1.0)]).is_renderable());
        assert!(path(vec![GeoPoint::new(1.0, 1.0), GeoPoint::new(2.0, 2.0)]).is_renderable());
    }

    #[test]
    fn malformed_coordinate_poisons_the_path() {
        let bad = path(vec![GeoPoint::new(1.0, 1.0), GeoPoint::new(f64::NAN, 2.0)]);
        assert!(!bad.is_renderable());
    }

    #[test]
    fn cascade_keeps_paths_with_two_survivors() {
        let doc = path(vec![
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(2.0, 2.0),
            GeoPoint::new(3.0, 3.0),
        ]);
        let outcome = cascade_after_point_delete(&doc, GeoPoint::new(2.0, 2.0));
        assert_eq!(
            outcome,
            PathCascade::Rewritten(vec![GeoPoint::new(1.0, 1.0), GeoPoint::new(3.0, 3.0)])
        );
    }

    #[test]
    fn cascade_empties_two_point_paths() {
        let doc = path(vec![GeoPoint::new(1.0, 1.0), GeoPoint::new(2.0, 2.0)]);
        assert_eq!(
            cascade_after_point_delete(&doc, GeoPoint::new(1.0, 1.0)),
            PathCascade::Emptied
        );
    }

    #[test]
    fn cascade_drops_every_occurrence_of_the_coordinate() {
        let doc = path(vec![
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(2.0, 2.0),
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(3.0, 3.0),
        ]);
        assert_eq!(
            cascade_after_point_delete(&doc, GeoPoint::new(1.0, 1.0)),
            PathCascade::Rewritten(vec![GeoPoint::new(2.0, 2.0), GeoPoint::new(3.0, 3.0)])
        );
    }

    #[test]
    fn cascade_ignores_unrelated_coordinates() {
        let doc = path(vec![GeoPoint::new(1.0, 1.0), GeoPoint::new(2.0, 2.0)]);
        assert_eq!(
            cascade_after_point_delete(&doc, GeoPoint::new(9.0, 9.0)),
            PathCascade::Untouched
        );
    }

    #[test]
    fn sanitize_note_truncates_on_char_boundary() {
        let long = "é".repeat(MAX_NOTE_LEN);
        let out = sanitize_note(long);
        assert!(out.len() <= MAX_NOTE_LEN);
        assert!(out.chars().all(|c| c == 'é'));
    }

    #[test]
    fn sanitize_name_trims_and_bounds() {
        assert_eq!(sanitize_name("  Ada  "), Some("Ada".to_string()));
        assert_eq!(sanitize_name("   "), None);
        assert_eq!(sanitize_name(&"x".repeat(MAX_NAME_LEN + 1)), None);
    }

    #[test]
    fn wire_round_trip_binary_and_json() {
        let message = ServerMessage::PointAdded {
            point: PointDoc {
                id: Uuid::from_u128(7),
                owner: Uuid::from_u128(8),
                position: GeoPoint::new(40.11, -88.04),
                note: "silo".to_string(),
                created_at_ms: 1,
            },
        };
        let payload =
            bincode::serde::encode_to_vec(&message, bincode::config::standard()).unwrap();
        let (decoded, _): (ServerMessage, _) =
            bincode::serde::decode_from_slice(&payload, bincode::config::standard()).unwrap();
        match decoded {
            ServerMessage::PointAdded { point } => assert_eq!(point.note, "silo"),
            other => panic!("unexpected message: {other:?}"),
        }

        let text = serde_json::to_string(&ClientMessage::DeletePath).unwrap();
        let back: ClientMessage = serde_json::from_str(&text).unwrap();
        assert!(matches!(back, ClientMessage::DeletePath));
    }
}
