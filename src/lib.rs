pub mod connection;
pub mod context;
pub mod module;
pub mod options;
pub mod replay;
pub mod runner;

pub mod prelude {
    pub use crate::connection::Connection;
    pub use crate::module::CredentialDumpModule;
    pub use crate::options::ModuleOptions;
    pub use crate::runner::AttackRunner;
}
