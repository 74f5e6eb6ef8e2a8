//! Discord server the bot plays in, served by `GET /servers`.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    pub name: String,

    /// Icon URL
    pub image: String,
}
