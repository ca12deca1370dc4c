//! Per-target connection state handed over by the host framework after a
//! privileged login: where we are, who we are, and what material
//! authenticated the session.
#[derive(Debug, Clone, Default)]
pub struct Connection {
    pub host: String,
    pub domain: String,
    pub username: String,
    pub kerberos: bool,
    pub password: String,
    pub lmhash: String,
    pub nthash: String,
}

impl Connection {
    /// Combined hash material as `"<lmhash>:<nthash>"`. Both components are
    /// always present; an empty component renders as an empty string.
    pub fn hashes(&self) -> String {
        format!("{}:{}", self.lmhash, self.nthash)
    }
}
