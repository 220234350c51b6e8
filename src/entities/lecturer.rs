use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lecturer {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    /// Staff number issued by the registry
    pub nip: String,
}
