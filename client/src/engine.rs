use std::collections::HashMap;

use waymark_shared::{
    sanitize_note, ClientMessage, GeoPoint, PathDoc, PointDoc, PointId, UserId, UserProfile,
};

use crate::palette::color_for;

/// Per-user display state, created lazily the first time a point or
/// path belonging to that user is observed. Lives until the next full
/// reset; the color seat survives resets so a user keeps their color
/// for the whole process lifetime.
pub struct DisplayMeta {
    pub name: String,
    pub color: &'static str,
    pub visible: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MarkerHandle {
    pub owner: UserId,
    pub position: GeoPoint,
    pub color: &'static str,
    pub note: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PolylineHandle {
    pub coordinates: Vec<GeoPoint>,
    pub color: &'static str,
}

pub enum DrawSession {
    Idle,
    Drawing { accumulated: Vec<GeoPoint> },
}

pub enum IdentityTransition {
    SignedIn(UserProfile),
    SignedOut,
    Unchanged,
}

pub enum MapClick {
    /// Outside a draw session: ask the server for a new point here.
    Create(ClientMessage),
    /// Inside a draw session the map background is inert.
    DrawingGuidance,
    NotSignedIn,
}

pub enum MarkerClick {
    OpenInfo(PointId),
    /// Appended to the draw session; count is the accumulated total.
    PathAppended(usize),
    NotYourPoint,
    Unknown,
}

pub enum DrawingEnd {
    Save(ClientMessage),
    NotEnoughPoints,
}

pub enum WriteRequest {
    Send(ClientMessage),
    NotOwner,
    Unknown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SnapshotReport {
    pub applied: usize,
    pub skipped: usize,
}

/// Client-side reconciliation engine: owns the mirrored documents, the
/// UI handle tables derived from them, per-user display metadata, and
/// the transient path-drawing session. Pure: every side effect is a
/// returned value the caller turns into canvas, DOM, or socket work.
pub struct Engine {
    user: Option<UserProfile>,
    points: HashMap<PointId, PointDoc>,
    paths: HashMap<UserId, PathDoc>,
    pub markers: HashMap<PointId, MarkerHandle>,
    pub polylines: HashMap<UserId, PolylineHandle>,
    meta: HashMap<UserId, DisplayMeta>,
    color_seats: HashMap<UserId, usize>,
    next_seat: usize,
    session: DrawSession,
}

fn fallback_name(user: UserId) -> String {
    let text = user.simple().to_string();
    format!("user-{}", &text[..6])
}

impl Engine {
    pub fn new() -> Self {
        Self {
            user: None,
            points: HashMap::new(),
            paths: HashMap::new(),
            markers: HashMap::new(),
            polylines: HashMap::new(),
            meta: HashMap::new(),
            color_seats: HashMap::new(),
            next_seat: 0,
            session: DrawSession::Idle,
        }
    }

    pub fn current_user(&self) -> Option<&UserProfile> {
        self.user.as_ref()
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.session, DrawSession::Drawing { .. })
    }

    /// The in-progress path, exposed once it can be drawn (two points).
    pub fn transient_path(&self) -> Option<&[GeoPoint]> {
        match &self.session {
            DrawSession::Drawing { accumulated } if accumulated.len() >= 2 => {
                Some(accumulated.as_slice())
            }
            _ => None,
        }
    }

    pub fn point(&self, id: PointId) -> Option<&PointDoc> {
        self.points.get(&id)
    }

    pub fn meta_for(&self, user: UserId) -> Option<&DisplayMeta> {
        self.meta.get(&user)
    }

    /// Legend rows: every known user with their display state, sorted
    /// by name for a stable list.
    pub fn legend_entries(&self) -> Vec<(UserId, String, &'static str, bool)> {
        let mut entries: Vec<_> = self
            .meta
            .iter()
            .map(|(id, meta)| (*id, meta.name.clone(), meta.color, meta.visible))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
        entries
    }

    // --- identity gate -------------------------------------------------

    pub fn set_identity(&mut self, user: Option<UserProfile>) -> IdentityTransition {
        match user {
            Some(profile) => {
                if self.user.as_ref().map(|current| current.id) == Some(profile.id) {
                    self.user = Some(profile);
                    return IdentityTransition::Unchanged;
                }
                self.ensure_meta(profile.id);
                if let Some(meta) = self.meta.get_mut(&profile.id) {
                    meta.name = profile.name.clone();
                }
                self.user = Some(profile.clone());
                IdentityTransition::SignedIn(profile)
            }
            None => {
                if self.user.is_none() {
                    return IdentityTransition::Unchanged;
                }
                self.reset();
                IdentityTransition::SignedOut
            }
        }
    }

    /// Full local reset: every mirror, handle table, display meta and
    /// the draw session go; color seats stay for the process lifetime.
    pub fn reset(&mut self) {
        self.user = None;
        self.points.clear();
        self.paths.clear();
        self.markers.clear();
        self.polylines.clear();
        self.meta.clear();
        self.session = DrawSession::Idle;
    }

    // --- user directory ------------------------------------------------

    pub fn observe_user(&mut self, profile: UserProfile) {
        self.ensure_meta(profile.id);
        if let Some(meta) = self.meta.get_mut(&profile.id) {
            meta.name = profile.name;
        }
    }

    pub fn observe_users(&mut self, users: Vec<UserProfile>) {
        for user in users {
            self.observe_user(user);
        }
    }

    fn ensure_meta(&mut self, user: UserId) {
        if self.meta.contains_key(&user) {
            return;
        }
        let seat = *self.color_seats.entry(user).or_insert_with(|| {
            let seat = self.next_seat;
            self.next_seat += 1;
            seat
        });
        self.meta.insert(
            user,
            DisplayMeta {
                name: fallback_name(user),
                color: color_for(seat),
                visible: true,
            },
        );
    }

    // --- snapshot application -------------------------------------------

    pub fn apply_points_sync(&mut self, points: Vec<PointDoc>) -> SnapshotReport {
        let mut report = SnapshotReport::default();
        self.points.clear();
        for point in points {
            if point.is_well_formed() {
                self.points.insert(point.id, point);
                report.applied += 1;
            } else {
                report.skipped += 1;
            }
        }
        self.reconcile();
        report
    }

    pub fn apply_point_upsert(&mut self, point: PointDoc) -> SnapshotReport {
        let mut report = SnapshotReport::default();
        if point.is_well_formed() {
            self.points.insert(point.id, point);
            report.applied = 1;
        } else {
            // A document that went bad is treated as absent.
            self.points.remove(&point.id);
            report.skipped = 1;
        }
        self.reconcile();
        report
    }

    pub fn apply_point_removed(&mut self, id: PointId) {
        self.points.remove(&id);
        self.reconcile();
    }

    pub fn apply_paths_sync(&mut self, paths: Vec<PathDoc>) -> SnapshotReport {
        let mut report = SnapshotReport::default();
        self.paths.clear();
        for path in paths {
            if path.is_renderable() {
                self.paths.insert(path.owner, path);
                report.applied += 1;
            } else {
                report.skipped += 1;
            }
        }
        self.reconcile();
        report
    }

    pub fn apply_path_set(&mut self, path: PathDoc) -> SnapshotReport {
        let mut report = SnapshotReport::default();
        if path.is_renderable() {
            self.paths.insert(path.owner, path);
            report.applied = 1;
        } else {
            self.paths.remove(&path.owner);
            report.skipped = 1;
        }
        self.reconcile();
        report
    }

    pub fn apply_path_removed(&mut self, owner: UserId) {
        self.paths.remove(&owner);
        self.reconcile();
    }

    /// Rebuild both handle tables from the mirrored documents. Runs
    /// after every mirror change, full or incremental, so the tables
    /// can never drift from the last-applied snapshot. Linear in the
    /// document count and idempotent.
    fn reconcile(&mut self) {
        let owners: Vec<UserId> = self
            .points
            .values()
            .map(|point| point.owner)
            .chain(self.paths.values().map(|path| path.owner))
            .collect();
        for owner in owners {
            self.ensure_meta(owner);
        }

        let mut markers = HashMap::new();
        for (id, point) in &self.points {
            let meta = &self.meta[&point.owner];
            if !meta.visible {
                continue;
            }
            markers.insert(
                *id,
                MarkerHandle {
                    owner: point.owner,
                    position: point.position,
                    color: meta.color,
                    note: point.note.clone(),
                },
            );
        }
        self.markers = markers;

        let mut polylines = HashMap::new();
        for (owner, path) in &self.paths {
            let meta = &self.meta[owner];
            if !meta.visible || !path.is_renderable() {
                continue;
            }
            polylines.insert(
                *owner,
                PolylineHandle {
                    coordinates: path.coordinates.clone(),
                    color: meta.color,
                },
            );
        }
        self.polylines = polylines;
    }

    // --- visibility ------------------------------------------------------

    /// Flip a user's visibility and re-apply it to their markers and
    /// polyline immediately; no snapshot round-trip involved.
    pub fn toggle_visibility(&mut self, user: UserId) -> bool {
        self.ensure_meta(user);
        let Some(meta) = self.meta.get_mut(&user) else {
            return false;
        };
        meta.visible = !meta.visible;
        let now_visible = meta.visible;
        self.reconcile();
        now_visible
    }

    // --- gestures --------------------------------------------------------

    pub fn map_clicked(&mut self, position: GeoPoint) -> MapClick {
        if self.is_drawing() {
            return MapClick::DrawingGuidance;
        }
        if self.user.is_none() {
            return MapClick::NotSignedIn;
        }
        MapClick::Create(ClientMessage::CreatePoint {
            position,
            note: String::new(),
        })
    }

    pub fn marker_clicked(&mut self, id: PointId) -> MarkerClick {
        let Some(point) = self.points.get(&id) else {
            return MarkerClick::Unknown;
        };
        let position = point.position;
        let owner = point.owner;
        match &mut self.session {
            DrawSession::Drawing { accumulated } => {
                if self.user.as_ref().map(|user| user.id) != Some(owner) {
                    return MarkerClick::NotYourPoint;
                }
                accumulated.push(position);
                MarkerClick::PathAppended(accumulated.len())
            }
            DrawSession::Idle => MarkerClick::OpenInfo(id),
        }
    }

    // --- draw session -----------------------------------------------------

    pub fn begin_drawing(&mut self) -> Result<(), ()> {
        if self.user.is_none() {
            return Err(());
        }
        // Each start is a clean slate; any leftover transient is gone.
        self.session = DrawSession::Drawing {
            accumulated: Vec::new(),
        };
        Ok(())
    }

    pub fn end_drawing(&mut self) -> DrawingEnd {
        let accumulated = match std::mem::replace(&mut self.session, DrawSession::Idle) {
            DrawSession::Drawing { accumulated } => accumulated,
            DrawSession::Idle => Vec::new(),
        };
        if accumulated.len() >= 2 {
            DrawingEnd::Save(ClientMessage::SetPath {
                coordinates: accumulated,
            })
        } else {
            DrawingEnd::NotEnoughPoints
        }
    }

    // --- owner-gated writes -----------------------------------------------

    pub fn request_note_update(&mut self, id: PointId, note: String) -> WriteRequest {
        let Some(user) = self.user.as_ref().map(|user| user.id) else {
            return WriteRequest::NotOwner;
        };
        let Some(point) = self.points.get_mut(&id) else {
            return WriteRequest::Unknown;
        };
        if point.owner != user {
            return WriteRequest::NotOwner;
        }
        let note = sanitize_note(note);
        point.note = note.clone();
        self.reconcile();
        WriteRequest::Send(ClientMessage::UpdateNote { id, note })
    }

    /// Optimistic: the marker disappears now, the server echo (or the
    /// next sync) is the backstop. The owner's path cascade is the
    /// server's transactional job.
    pub fn request_delete(&mut self, id: PointId) -> WriteRequest {
        let Some(user) = self.user.as_ref().map(|user| user.id) else {
            return WriteRequest::NotOwner;
        };
        let Some(point) = self.points.get(&id) else {
            return WriteRequest::Unknown;
        };
        if point.owner != user {
            return WriteRequest::NotOwner;
        }
        self.points.remove(&id);
        self.reconcile();
        WriteRequest::Send(ClientMessage::DeletePoint { id })
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::palette::USER_PALETTE;

    fn ada() -> UserProfile {
        UserProfile {
            id: Uuid::from_u128(0xA),
            name: "Ada".to_string(),
        }
    }

    fn grace() -> UserProfile {
        UserProfile {
            id: Uuid::from_u128(0xB),
            name: "Grace".to_string(),
        }
    }

    fn point(id: u128, owner: &UserProfile, lat: f64, lng: f64) -> PointDoc {
        PointDoc {
            id: Uuid::from_u128(id),
            owner: owner.id,
            position: GeoPoint::new(lat, lng),
            note: String::new(),
            created_at_ms: 0,
        }
    }

    fn path(owner: &UserProfile, coordinates: Vec<GeoPoint>) -> PathDoc {
        PathDoc {
            owner: owner.id,
            coordinates,
            updated_at_ms: 0,
        }
    }

    fn signed_in_engine() -> Engine {
        let mut engine = Engine::new();
        engine.set_identity(Some(ada()));
        engine
    }

    #[test]
    fn sync_draws_exactly_the_visible_well_formed_points() {
        let mut engine = Engine::new();
        let good = point(1, &ada(), 10.0, 10.0);
        let bad = point(2, &ada(), f64::NAN, 10.0);
        let report = engine.apply_points_sync(vec![good.clone(), bad]);
        assert_eq!(report.applied, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(engine.markers.len(), 1);
        assert_eq!(engine.markers[&good.id].position, good.position);
    }

    #[test]
    fn reapplying_the_same_sync_is_idempotent() {
        let mut engine = Engine::new();
        let docs = vec![point(1, &ada(), 10.0, 10.0), point(2, &grace(), 20.0, 20.0)];
        engine.apply_points_sync(docs.clone());
        let markers_before = engine.markers.clone();
        engine.apply_points_sync(docs);
        assert_eq!(engine.markers, markers_before);
    }

    #[test]
    fn incremental_changes_converge_like_a_full_sync() {
        let mut full = Engine::new();
        let mut incremental = Engine::new();
        // Same observation order in both engines so the color seats
        // line up.
        full.observe_users(vec![ada(), grace()]);
        incremental.observe_users(vec![ada(), grace()]);
        let a = point(1, &ada(), 10.0, 10.0);
        let b = point(2, &grace(), 20.0, 20.0);

        incremental.apply_point_upsert(a.clone());
        incremental.apply_point_upsert(b.clone());
        incremental.apply_point_removed(a.id);

        full.apply_points_sync(vec![b.clone()]);

        assert_eq!(incremental.markers, full.markers);
        assert_eq!(incremental.markers.len(), 1);
        assert!(incremental.markers.contains_key(&b.id));
    }

    #[test]
    fn modified_document_updates_the_marker_binding() {
        let mut engine = Engine::new();
        let mut doc = point(1, &ada(), 10.0, 10.0);
        engine.apply_point_upsert(doc.clone());
        doc.note = "grain silo".to_string();
        doc.position = GeoPoint::new(11.0, 11.0);
        engine.apply_point_upsert(doc.clone());
        let marker = &engine.markers[&doc.id];
        assert_eq!(marker.note, "grain silo");
        assert_eq!(marker.position, GeoPoint::new(11.0, 11.0));
    }

    #[test]
    fn short_paths_are_never_rendered() {
        let mut engine = Engine::new();
        let report =
            engine.apply_paths_sync(vec![path(&ada(), vec![GeoPoint::new(1.0, 1.0)])]);
        assert_eq!(report.skipped, 1);
        assert!(engine.polylines.is_empty());

        // A later valid overwrite draws; a degraded one erases again.
        engine.apply_path_set(path(
            &ada(),
            vec![GeoPoint::new(1.0, 1.0), GeoPoint::new(2.0, 2.0)],
        ));
        assert_eq!(engine.polylines.len(), 1);
        engine.apply_path_set(path(&ada(), vec![GeoPoint::new(1.0, 1.0)]));
        assert!(engine.polylines.is_empty());
    }

    #[test]
    fn path_removed_drops_the_polyline_and_cache() {
        let mut engine = Engine::new();
        engine.apply_path_set(path(
            &ada(),
            vec![GeoPoint::new(1.0, 1.0), GeoPoint::new(2.0, 2.0)],
        ));
        engine.apply_path_removed(ada().id);
        assert!(engine.polylines.is_empty());
        engine.apply_paths_sync(Vec::new());
        assert!(engine.polylines.is_empty());
    }

    #[test]
    fn colors_are_assigned_by_first_encounter_and_stick() {
        let mut engine = Engine::new();
        engine.apply_points_sync(vec![point(1, &ada(), 1.0, 1.0)]);
        engine.apply_point_upsert(point(2, &grace(), 2.0, 2.0));
        let ada_color = engine.meta_for(ada().id).unwrap().color;
        let grace_color = engine.meta_for(grace().id).unwrap().color;
        assert_eq!(ada_color, USER_PALETTE[0]);
        assert_eq!(grace_color, USER_PALETTE[1]);

        // Re-observing in a different order never reassigns.
        engine.apply_points_sync(vec![point(3, &grace(), 2.0, 2.0), point(4, &ada(), 1.0, 1.0)]);
        assert_eq!(engine.meta_for(ada().id).unwrap().color, ada_color);
        assert_eq!(engine.meta_for(grace().id).unwrap().color, grace_color);
    }

    #[test]
    fn visibility_toggle_hides_markers_and_polyline_immediately() {
        let mut engine = Engine::new();
        engine.apply_points_sync(vec![
            point(1, &ada(), 1.0, 1.0),
            point(2, &ada(), 2.0, 2.0),
            point(3, &grace(), 3.0, 3.0),
        ]);
        engine.apply_path_set(path(
            &ada(),
            vec![GeoPoint::new(1.0, 1.0), GeoPoint::new(2.0, 2.0)],
        ));

        assert!(!engine.toggle_visibility(ada().id));
        assert_eq!(engine.markers.len(), 1);
        assert!(engine.polylines.is_empty());

        assert!(engine.toggle_visibility(ada().id));
        assert_eq!(engine.markers.len(), 3);
        assert_eq!(engine.polylines.len(), 1);
    }

    #[test]
    fn hidden_owner_stays_hidden_across_snapshots() {
        let mut engine = Engine::new();
        engine.apply_points_sync(vec![point(1, &ada(), 1.0, 1.0)]);
        engine.toggle_visibility(ada().id);
        engine.apply_points_sync(vec![point(1, &ada(), 1.0, 1.0), point(2, &ada(), 2.0, 2.0)]);
        assert!(engine.markers.is_empty());
    }

    #[test]
    fn map_click_requires_identity() {
        let mut engine = Engine::new();
        assert!(matches!(
            engine.map_clicked(GeoPoint::new(1.0, 1.0)),
            MapClick::NotSignedIn
        ));
    }

    #[test]
    fn map_click_outside_drawing_requests_a_point() {
        let mut engine = signed_in_engine();
        match engine.map_clicked(GeoPoint::new(10.0, 10.0)) {
            MapClick::Create(ClientMessage::CreatePoint { position, note }) => {
                assert_eq!(position, GeoPoint::new(10.0, 10.0));
                assert!(note.is_empty());
            }
            _ => panic!("expected a create request"),
        }
    }

    #[test]
    fn map_click_while_drawing_creates_nothing() {
        let mut engine = signed_in_engine();
        engine.begin_drawing().unwrap();
        assert!(matches!(
            engine.map_clicked(GeoPoint::new(20.0, 20.0)),
            MapClick::DrawingGuidance
        ));
        assert!(matches!(engine.end_drawing(), DrawingEnd::NotEnoughPoints));
    }

    #[test]
    fn begin_drawing_requires_identity_and_resets_the_list() {
        let mut engine = Engine::new();
        assert!(engine.begin_drawing().is_err());

        let mut engine = signed_in_engine();
        let a = point(1, &ada(), 10.0, 10.0);
        let b = point(2, &ada(), 20.0, 20.0);
        engine.apply_points_sync(vec![a.clone(), b.clone()]);

        engine.begin_drawing().unwrap();
        engine.marker_clicked(a.id);
        engine.marker_clicked(b.id);
        assert!(engine.transient_path().is_some());

        // Restarting wipes the previous accumulation and transient.
        engine.begin_drawing().unwrap();
        assert!(engine.transient_path().is_none());
        assert!(matches!(engine.end_drawing(), DrawingEnd::NotEnoughPoints));
    }

    #[test]
    fn transient_appears_only_at_two_points() {
        let mut engine = signed_in_engine();
        let a = point(1, &ada(), 10.0, 10.0);
        let b = point(2, &ada(), 20.0, 20.0);
        engine.apply_points_sync(vec![a.clone(), b.clone()]);
        engine.begin_drawing().unwrap();

        assert!(matches!(engine.marker_clicked(a.id), MarkerClick::PathAppended(1)));
        assert!(engine.transient_path().is_none());
        assert!(matches!(engine.marker_clicked(b.id), MarkerClick::PathAppended(2)));
        assert_eq!(
            engine.transient_path().unwrap(),
            &[GeoPoint::new(10.0, 10.0), GeoPoint::new(20.0, 20.0)]
        );
    }

    #[test]
    fn other_users_markers_do_not_join_the_path() {
        let mut engine = signed_in_engine();
        let mine = point(1, &ada(), 10.0, 10.0);
        let theirs = point(2, &grace(), 20.0, 20.0);
        engine.apply_points_sync(vec![mine, theirs.clone()]);
        engine.begin_drawing().unwrap();
        assert!(matches!(
            engine.marker_clicked(theirs.id),
            MarkerClick::NotYourPoint
        ));
        assert!(matches!(engine.end_drawing(), DrawingEnd::NotEnoughPoints));
    }

    #[test]
    fn ending_with_two_points_saves_an_overwrite() {
        let mut engine = signed_in_engine();
        let a = point(1, &ada(), 10.0, 10.0);
        let b = point(2, &ada(), 20.0, 20.0);
        engine.apply_points_sync(vec![a.clone(), b.clone()]);
        engine.begin_drawing().unwrap();
        engine.marker_clicked(a.id);
        engine.marker_clicked(b.id);
        match engine.end_drawing() {
            DrawingEnd::Save(ClientMessage::SetPath { coordinates }) => {
                assert_eq!(
                    coordinates,
                    vec![GeoPoint::new(10.0, 10.0), GeoPoint::new(20.0, 20.0)]
                );
            }
            _ => panic!("expected a path save"),
        }
        assert!(!engine.is_drawing());
        assert!(engine.transient_path().is_none());
    }

    #[test]
    fn marker_click_outside_drawing_opens_info() {
        let mut engine = signed_in_engine();
        let a = point(1, &ada(), 10.0, 10.0);
        engine.apply_points_sync(vec![a.clone()]);
        assert!(matches!(
            engine.marker_clicked(a.id),
            MarkerClick::OpenInfo(id) if id == a.id
        ));
    }

    #[test]
    fn note_and_delete_are_owner_gated() {
        let mut engine = signed_in_engine();
        let theirs = point(2, &grace(), 20.0, 20.0);
        engine.apply_points_sync(vec![theirs.clone()]);
        assert!(matches!(
            engine.request_note_update(theirs.id, "mine".to_string()),
            WriteRequest::NotOwner
        ));
        assert!(matches!(
            engine.request_delete(theirs.id),
            WriteRequest::NotOwner
        ));
        assert_eq!(engine.markers.len(), 1);
    }

    #[test]
    fn delete_is_optimistic_and_idempotent() {
        let mut engine = signed_in_engine();
        let mine = point(1, &ada(), 10.0, 10.0);
        engine.apply_points_sync(vec![mine.clone()]);
        assert!(matches!(
            engine.request_delete(mine.id),
            WriteRequest::Send(ClientMessage::DeletePoint { .. })
        ));
        assert!(engine.markers.is_empty());
        // The server echo of the removal changes nothing further.
        engine.apply_point_removed(mine.id);
        assert!(engine.markers.is_empty());
        assert!(matches!(engine.request_delete(mine.id), WriteRequest::Unknown));
    }

    #[test]
    fn note_update_is_applied_optimistically() {
        let mut engine = signed_in_engine();
        let mine = point(1, &ada(), 10.0, 10.0);
        engine.apply_points_sync(vec![mine.clone()]);
        match engine.request_note_update(mine.id, "windmill".to_string()) {
            WriteRequest::Send(ClientMessage::UpdateNote { note, .. }) => {
                assert_eq!(note, "windmill");
            }
            _ => panic!("expected a note write"),
        }
        assert_eq!(engine.markers[&mine.id].note, "windmill");
    }

    #[test]
    fn sign_out_resets_everything_but_color_seats() {
        let mut engine = signed_in_engine();
        engine.apply_points_sync(vec![point(1, &ada(), 1.0, 1.0)]);
        engine.apply_path_set(path(
            &ada(),
            vec![GeoPoint::new(1.0, 1.0), GeoPoint::new(2.0, 2.0)],
        ));
        engine.begin_drawing().unwrap();
        let color_before = engine.meta_for(ada().id).unwrap().color;

        assert!(matches!(
            engine.set_identity(None),
            IdentityTransition::SignedOut
        ));
        assert!(engine.markers.is_empty());
        assert!(engine.polylines.is_empty());
        assert!(engine.meta_for(ada().id).is_none());
        assert!(!engine.is_drawing());
        // Idempotent teardown.
        assert!(matches!(
            engine.set_identity(None),
            IdentityTransition::Unchanged
        ));

        // Same color when the user comes back in this process.
        engine.apply_points_sync(vec![point(1, &ada(), 1.0, 1.0)]);
        assert_eq!(engine.meta_for(ada().id).unwrap().color, color_before);
    }

    #[test]
    fn identity_names_take_precedence_over_fallbacks() {
        let mut engine = Engine::new();
        engine.apply_points_sync(vec![point(1, &ada(), 1.0, 1.0)]);
        assert!(engine.meta_for(ada().id).unwrap().name.starts_with("user-"));
        engine.observe_user(ada());
        assert_eq!(engine.meta_for(ada().id).unwrap().name, "Ada");
    }

    #[test]
    fn scenario_build_a_path_from_two_markers() {
        let mut engine = signed_in_engine();

        // A signs in and clicks the map at (10,10): a create request.
        match engine.map_clicked(GeoPoint::new(10.0, 10.0)) {
            MapClick::Create(_) => {}
            _ => panic!("expected a create request"),
        }
        // The server assigns the id and echoes the document.
        let first = point(1, &ada(), 10.0, 10.0);
        engine.apply_point_upsert(first.clone());
        assert_eq!(engine.markers.len(), 1);

        // Path mode: clicking the marker accumulates, clicking the map
        // background only yields guidance.
        engine.begin_drawing().unwrap();
        assert!(matches!(
            engine.marker_clicked(first.id),
            MarkerClick::PathAppended(1)
        ));
        assert!(engine.transient_path().is_none());
        assert!(matches!(
            engine.map_clicked(GeoPoint::new(20.0, 20.0)),
            MapClick::DrawingGuidance
        ));
        assert!(matches!(engine.end_drawing(), DrawingEnd::NotEnoughPoints));

        // Second point created outside path mode, then both linked.
        let second = point(2, &ada(), 20.0, 20.0);
        engine.apply_point_upsert(second.clone());
        engine.begin_drawing().unwrap();
        engine.marker_clicked(first.id);
        engine.marker_clicked(second.id);
        match engine.end_drawing() {
            DrawingEnd::Save(ClientMessage::SetPath { coordinates }) => assert_eq!(
                coordinates,
                vec![GeoPoint::new(10.0, 10.0), GeoPoint::new(20.0, 20.0)]
            ),
            _ => panic!("expected a path save"),
        }
        engine.apply_path_set(path(
            &ada(),
            vec![GeoPoint::new(10.0, 10.0), GeoPoint::new(20.0, 20.0)],
        ));
        assert_eq!(engine.polylines[&ada().id].coordinates.len(), 2);
    }
}
