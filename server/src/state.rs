use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;
use waymark_shared::world_format::WorldFileData;
use waymark_shared::{Collection, PathDoc, PointDoc, ServerMessage, UserId, UserProfile};

use crate::storage::Storage;

pub const MAX_POINTS: usize = 5000;

pub type ConnId = Uuid;

#[derive(Clone)]
pub struct AppState {
    pub world: Arc<RwLock<World>>,
    pub storage: Arc<dyn Storage>,
}

pub struct Peer {
    pub tx: mpsc::UnboundedSender<ServerMessage>,
    pub user: Option<UserId>,
    pub subscriptions: HashSet<Collection>,
}

pub struct World {
    pub points: HashMap<Uuid, PointDoc>,
    pub paths: HashMap<UserId, PathDoc>,
    pub users: HashMap<UserId, UserProfile>,
    pub names: HashMap<String, UserId>,
    pub peers: HashMap<ConnId, Peer>,
    pub dirty: bool,
}

impl World {
    pub fn new() -> Self {
        Self {
            points: HashMap::new(),
            paths: HashMap::new(),
            users: HashMap::new(),
            names: HashMap::new(),
            peers: HashMap::new(),
            dirty: false,
        }
    }

    /// Rebuild the in-memory world from a snapshot, dropping anything
    /// that no longer passes validation. The name registry is derived
    /// from the user directory.
    pub fn from_file_data(data: WorldFileData) -> Self {
        let mut world = World::new();
        for user in data.users {
            world.names.insert(user.name.clone(), user.id);
            world.users.insert(user.id, user);
        }
        for point in data.points {
            if point.is_well_formed() {
                world.points.insert(point.id, point);
            } else {
                eprintln!("Dropping malformed point {} from snapshot", point.id);
            }
        }
        for path in data.paths {
            if path.is_renderable() {
                world.paths.insert(path.owner, path);
            } else {
                eprintln!("Dropping invalid path for owner {} from snapshot", path.owner);
            }
        }
        world
    }

    pub fn to_file_data(&self) -> WorldFileData {
        let mut points: Vec<PointDoc> = self.points.values().cloned().collect();
        points.sort_by_key(|point| point.created_at_ms);
        let mut paths: Vec<PathDoc> = self.paths.values().cloned().collect();
        paths.sort_by_key(|path| path.updated_at_ms);
        let mut users: Vec<UserProfile> = self.users.values().cloned().collect();
        users.sort_by(|a, b| a.name.cmp(&b.name));
        WorldFileData {
            points,
            paths,
            users,
        }
    }

    /// Stable identity per display name: signing in again with a name
    /// that has been seen before recalls the same user id.
    pub fn ensure_user(&mut self, name: &str) -> UserProfile {
        if let Some(id) = self.names.get(name) {
            if let Some(profile) = self.users.get(id) {
                return profile.clone();
            }
        }
        let profile = UserProfile {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        self.names.insert(profile.name.clone(), profile.id);
        self.users.insert(profile.id, profile.clone());
        self.dirty = true;
        profile
    }
}
