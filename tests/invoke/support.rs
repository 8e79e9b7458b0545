//! Test domain: user creation requests.

use serde::{Deserialize, Serialize};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub age: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCreated {
    pub id: String,
}

pub async fn create_user(req: CreateUser) -> Result<UserCreated, eventa_rust::HandlerError> {
    Ok(UserCreated {
        id: format!("{}-{}", req.name, req.age),
    })
}

pub fn alice() -> CreateUser {
    CreateUser {
        name: "alice".to_string(),
        age: 25,
    }
}
