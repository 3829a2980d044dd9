//! Configuration module

mod site;

pub use site::SiteConfig;
pub use site::ContentConfig;
pub use site::ReadingConfig;
pub use site::ServerConfig;
pub use site::ACCESS_TOKEN_ENV;
