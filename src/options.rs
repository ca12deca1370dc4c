//! Module options parsed from the host framework's string key/value bag.
//!
//! Keys are matched case-insensitively. `CA` names the certificate authority
//! as `CA_SERVER\CA_NAME`, `TEMPLATE` the certificate template allowing user
//! authentication, `DC_IP` the domain controller address. A missing CA is
//! not an error here; the login handler refuses to run without one.
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("invalid CA '{0}': expected CA_SERVER\\CA_NAME")]
    InvalidCa(String),
}

#[derive(Debug, Clone)]
pub struct ModuleOptions {
    pub ca: Option<String>,
    pub template: String,
    pub dc_ip: Option<String>,
}

impl Default for ModuleOptions {
    fn default() -> Self {
        Self {
            ca: None,
            template: Self::DEFAULT_TEMPLATE.to_string(),
            dc_ip: None,
        }
    }
}

impl ModuleOptions {
    pub const DEFAULT_TEMPLATE: &'static str = "User";

    /// Build options from `(key, value)` pairs. Unknown keys are ignored
    /// with a warning. A provided CA must have the `SERVER\NAME` shape;
    /// an absent CA passes through and is rejected later at login time.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, OptionsError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut opts = Self::default();
        for (key, value) in pairs {
            match key.as_ref().to_ascii_uppercase().as_str() {
                "CA" => opts.ca = Some(value.into()),
                "TEMPLATE" => opts.template = value.into(),
                "DC_IP" => opts.dc_ip = Some(value.into()),
                other => log::warn!("ignoring unknown module option '{other}'"),
            }
        }
        if let Some(ca) = &opts.ca {
            match ca.split_once('\\') {
                Some((server, name)) if !server.is_empty() && !name.is_empty() => {}
                _ => return Err(OptionsError::InvalidCa(ca.clone())),
            }
        }
        Ok(opts)
    }
}
