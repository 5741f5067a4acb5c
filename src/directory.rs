use std::convert::Infallible;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use warp::Filter;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub password: String,
    pub avatar: String,
    pub groups: Vec<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Group {
    pub id: u64,
    pub name: String,
    pub admin: u64,
    pub channels: Vec<String>,
    pub users: Vec<u64>,
}

#[derive(Default)]
struct State {
    users: Vec<User>,
    groups: Vec<Group>,
    next_group_id: u64,
}

/// In-memory user/group store, built once in `main` and cloned into request
/// handlers. The chat core never reads it; it only resolves identities and
/// room names for the UI before a session starts.
#[derive(Clone, Default)]
pub struct Directory {
    inner: Arc<RwLock<State>>,
}

impl Directory {
    #[must_use]
    pub fn new() -> Self {
        Directory::default()
    }

    /// Demo fixture matching the seed data the UI expects on first run.
    #[must_use]
    pub fn seeded() -> Self {
        let mut users = vec![
            seed_user(1, "ada", "password1"),
            seed_user(2, "bob", "password2"),
            seed_user(3, "carol", "password3"),
        ];
        for user in &mut users {
            user.groups.push(1);
        }
        let groups = vec![Group {
            id: 1,
            name: "general".to_string(),
            admin: 1,
            channels: vec!["main".to_string(), "random".to_string()],
            users: vec![1, 2, 3],
        }];

        Directory {
            inner: Arc::new(RwLock::new(State {
                users,
                groups,
                next_group_id: 2,
            })),
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Option<User> {
        let state = self.inner.read().await;
        state
            .users
            .iter()
            .find(|u| u.username == username && u.password == password)
            .cloned()
    }

    pub async fn find_user(&self, id: u64) -> Option<User> {
        let state = self.inner.read().await;
        state.users.iter().find(|u| u.id == id).cloned()
    }

    pub async fn list_groups(&self) -> Vec<Group> {
        let state = self.inner.read().await;
        state.groups.clone()
    }

    pub async fn group_name_available(&self, name: &str) -> bool {
        let state = self.inner.read().await;
        !state.groups.iter().any(|g| g.name == name)
    }

    /// Creates a group with the given admin and a default channel, returning
    /// the admin's updated record. Fails when the name is taken.
    pub async fn create_group(&self, name: &str, admin_id: u64) -> Option<User> {
        let mut state = self.inner.write().await;
        if state.groups.iter().any(|g| g.name == name) {
            return None;
        }
        // Admin lookup comes first so a failed request leaves no group behind.
        if !state.users.iter().any(|u| u.id == admin_id) {
            return None;
        }

        let id = state.next_group_id;
        state.next_group_id += 1;
        state.groups.push(Group {
            id,
            name: name.to_string(),
            admin: admin_id,
            channels: vec!["main".to_string()],
            users: vec![admin_id],
        });

        let user = state.users.iter_mut().find(|u| u.id == admin_id)?;
        user.groups.push(id);
        Some(user.clone())
    }

    pub async fn delete_user(&self, id: u64) -> bool {
        let mut state = self.inner.write().await;
        let before = state.users.len();
        state.users.retain(|u| u.id != id);
        for group in &mut state.groups {
            group.users.retain(|&uid| uid != id);
        }
        state.users.len() < before
    }

    /// Drops a group from a user's membership list, returning the updated
    /// user. Removing an absent membership is a no-op.
    pub async fn remove_user_from_group(&self, user_id: u64, group_id: u64) -> Option<User> {
        let mut state = self.inner.write().await;
        if let Some(group) = state.groups.iter_mut().find(|g| g.id == group_id) {
            group.users.retain(|&uid| uid != user_id);
        }
        let user = state.users.iter_mut().find(|u| u.id == user_id)?;
        user.groups.retain(|&gid| gid != group_id);
        Some(user.clone())
    }
}

fn seed_user(id: u64, username: &str, password: &str) -> User {
    User {
        id,
        username: username.to_string(),
        password: password.to_string(),
        avatar: format!("assets/avatars/{username}.png"),
        groups: Vec::new(),
    }
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct CreateGroupRequest {
    name: String,
    #[serde(rename = "userId")]
    user_id: u64,
}

#[derive(Deserialize)]
struct DeleteUserRequest {
    id: u64,
}

#[derive(Deserialize)]
struct RemoveUserRequest {
    #[serde(rename = "userId")]
    user_id: u64,
    #[serde(rename = "groupId")]
    group_id: u64,
}

/// REST routes consumed by the dashboard before any socket opens.
pub fn routes(
    directory: Directory,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let login = warp::path("login")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_directory(directory.clone()))
        .and_then(login);

    let groups = warp::path("groups")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_directory(directory.clone()))
        .and_then(list_groups);

    let create_group = warp::path("create-group")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_directory(directory.clone()))
        .and_then(create_group);

    let delete_user = warp::path("delete-user")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_directory(directory.clone()))
        .and_then(delete_user);

    let remove_user = warp::path("remove-user")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_directory(directory))
        .and_then(remove_user);

    login
        .or(groups)
        .or(create_group)
        .or(delete_user)
        .or(remove_user)
}

fn with_directory(
    directory: Directory,
) -> impl Filter<Extract = (Directory,), Error = Infallible> + Clone {
    warp::any().map(move || directory.clone())
}

async fn login(req: LoginRequest, directory: Directory) -> Result<impl warp::Reply, Infallible> {
    let reply = match directory.login(&req.username, &req.password).await {
        Some(user) => json!({ "valid": true, "user": user }),
        None => json!({ "valid": false }),
    };
    Ok(warp::reply::json(&reply))
}

async fn list_groups(directory: Directory) -> Result<impl warp::Reply, Infallible> {
    Ok(warp::reply::json(&directory.list_groups().await))
}

async fn create_group(
    req: CreateGroupRequest,
    directory: Directory,
) -> Result<impl warp::Reply, Infallible> {
    let reply = match directory.create_group(&req.name, req.user_id).await {
        Some(user) => json!({ "status": "OK", "user": user }),
        None => json!({ "status": "fail" }),
    };
    Ok(warp::reply::json(&reply))
}

async fn delete_user(
    req: DeleteUserRequest,
    directory: Directory,
) -> Result<impl warp::Reply, Infallible> {
    directory.delete_user(req.id).await;
    Ok(warp::reply::json(&json!({ "status": "ok" })))
}

async fn remove_user(
    req: RemoveUserRequest,
    directory: Directory,
) -> Result<impl warp::Reply, Infallible> {
    let user = directory.remove_user_from_group(req.user_id, req.group_id).await;
    Ok(warp::reply::json(&json!({ "status": "ok", "user": user })))
}
