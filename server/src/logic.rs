use uuid::Uuid;
use waymark_shared::{
    cascade_after_point_delete, sanitize_name, sanitize_note, ClientMessage, Collection,
    PathCascade, PathDoc, PointDoc, ServerMessage,
};

use crate::state::{ConnId, World, MAX_POINTS};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Reply to the requesting connection only.
    Sender,
    /// Every connected peer, subscribed or not (user directory).
    All,
    /// Peers holding an active subscription on the collection.
    Subscribers(Collection),
}

#[derive(Debug)]
pub struct Outgoing {
    pub message: ServerMessage,
    pub route: Route,
}

impl Outgoing {
    fn to_sender(message: ServerMessage) -> Self {
        Self {
            message,
            route: Route::Sender,
        }
    }

    fn to_all(message: ServerMessage) -> Self {
        Self {
            message,
            route: Route::All,
        }
    }

    fn to_subscribers(collection: Collection, message: ServerMessage) -> Self {
        Self {
            message,
            route: Route::Subscribers(collection),
        }
    }
}

fn error(op: &str, reason: &str) -> Outgoing {
    Outgoing::to_sender(ServerMessage::Error {
        op: op.to_string(),
        reason: reason.to_string(),
    })
}

fn signed_in_user(world: &World, conn: ConnId) -> Option<Uuid> {
    world.peers.get(&conn).and_then(|peer| peer.user)
}

/// Apply one client message under the world write lock and decide what
/// to send where. All mutations are gated on a signed-in peer and on
/// ownership; the point-deletion path cascade runs here too, so a
/// delete and its path rewrite are atomic with respect to every other
/// message.
pub fn apply_client_message(
    world: &mut World,
    conn: ConnId,
    message: ClientMessage,
    now_ms: u64,
) -> Vec<Outgoing> {
    match message {
        ClientMessage::SignIn { name } => {
            let Some(name) = sanitize_name(&name) else {
                return vec![error("auth:sign-in", "invalid display name")];
            };
            let profile = world.ensure_user(&name);
            if let Some(peer) = world.peers.get_mut(&conn) {
                peer.user = Some(profile.id);
            }
            vec![
                Outgoing::to_sender(ServerMessage::AuthState {
                    user: Some(profile.clone()),
                }),
                Outgoing::to_all(ServerMessage::UserSeen { user: profile }),
            ]
        }
        ClientMessage::SignOut => {
            if let Some(peer) = world.peers.get_mut(&conn) {
                peer.user = None;
            }
            vec![Outgoing::to_sender(ServerMessage::AuthState { user: None })]
        }
        ClientMessage::Subscribe { collection } => {
            if let Some(peer) = world.peers.get_mut(&conn) {
                peer.subscriptions.insert(collection);
            }
            let users: Vec<_> = world.users.values().cloned().collect();
            let sync = match collection {
                Collection::Points => ServerMessage::PointsSync {
                    points: world.points.values().cloned().collect(),
                },
                Collection::Paths => ServerMessage::PathsSync {
                    paths: world.paths.values().cloned().collect(),
                },
            };
            vec![
                Outgoing::to_sender(ServerMessage::UsersSync { users }),
                Outgoing::to_sender(sync),
            ]
        }
        ClientMessage::Unsubscribe { collection } => {
            if let Some(peer) = world.peers.get_mut(&conn) {
                peer.subscriptions.remove(&collection);
            }
            Vec::new()
        }
        ClientMessage::CreatePoint { position, note } => {
            let Some(user) = signed_in_user(world, conn) else {
                return vec![error("point:create", "not signed in")];
            };
            if !position.is_well_formed() {
                return vec![error("point:create", "malformed coordinates")];
            }
            if world.points.len() >= MAX_POINTS {
                return vec![error("point:create", "point limit reached")];
            }
            let point = PointDoc {
                id: Uuid::new_v4(),
                owner: user,
                position,
                note: sanitize_note(note),
                created_at_ms: now_ms,
            };
            world.points.insert(point.id, point.clone());
            world.dirty = true;
            vec![Outgoing::to_subscribers(
                Collection::Points,
                ServerMessage::PointAdded { point },
            )]
        }
        ClientMessage::UpdateNote { id, note } => {
            let Some(user) = signed_in_user(world, conn) else {
                return vec![error("point:note", "not signed in")];
            };
            let Some(point) = world.points.get_mut(&id) else {
                return vec![error("point:note", "unknown point")];
            };
            if point.owner != user {
                return vec![error("point:note", "not the owner")];
            }
            point.note = sanitize_note(note);
            let point = point.clone();
            world.dirty = true;
            vec![Outgoing::to_subscribers(
                Collection::Points,
                ServerMessage::PointModified { point },
            )]
        }
        ClientMessage::DeletePoint { id } => {
            let Some(user) = signed_in_user(world, conn) else {
                return vec![error("point:delete", "not signed in")];
            };
            // Deleting an id that is already gone is a no-op, so two
            // racing deletes both converge.
            match world.points.get(&id) {
                None => return Vec::new(),
                Some(point) if point.owner != user => {
                    return vec![error("point:delete", "not the owner")];
                }
                Some(_) => {}
            }
            let Some(removed) = world.points.remove(&id) else {
                return Vec::new();
            };
            world.dirty = true;
            let mut out = vec![Outgoing::to_subscribers(
                Collection::Points,
                ServerMessage::PointRemoved { id },
            )];
            out.extend(cascade_owner_path(world, user, removed, now_ms));
            out
        }
        ClientMessage::SetPath { coordinates } => {
            let Some(user) = signed_in_user(world, conn) else {
                return vec![error("path:set", "not signed in")];
            };
            let path = PathDoc {
                owner: user,
                coordinates,
                updated_at_ms: now_ms,
            };
            if !path.is_renderable() {
                return vec![error("path:set", "a path needs at least two valid points")];
            }
            world.paths.insert(user, path.clone());
            world.dirty = true;
            vec![Outgoing::to_subscribers(
                Collection::Paths,
                ServerMessage::PathSet { path },
            )]
        }
        ClientMessage::DeletePath => {
            let Some(user) = signed_in_user(world, conn) else {
                return vec![error("path:delete", "not signed in")];
            };
            if world.paths.remove(&user).is_none() {
                return Vec::new();
            }
            world.dirty = true;
            vec![Outgoing::to_subscribers(
                Collection::Paths,
                ServerMessage::PathRemoved { owner: user },
            )]
        }
    }
}

fn cascade_owner_path(
    world: &mut World,
    owner: Uuid,
    removed: PointDoc,
    now_ms: u64,
) -> Vec<Outgoing> {
    let Some(path) = world.paths.get(&owner) else {
        return Vec::new();
    };
    match cascade_after_point_delete(path, removed.position) {
        PathCascade::Untouched => Vec::new(),
        PathCascade::Rewritten(coordinates) => {
            let path = PathDoc {
                owner,
                coordinates,
                updated_at_ms: now_ms,
            };
            world.paths.insert(owner, path.clone());
            vec![Outgoing::to_subscribers(
                Collection::Paths,
                ServerMessage::PathSet { path },
            )]
        }
        PathCascade::Emptied => {
            world.paths.remove(&owner);
            vec![Outgoing::to_subscribers(
                Collection::Paths,
                ServerMessage::PathRemoved { owner },
            )]
        }
    }
}
