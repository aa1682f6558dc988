use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "campusd",
    version,
    about = "Academic records sidecar (JSON lines on stdin/stdout)"
)]
pub struct Config {
    /// Workspace directory to open at start; otherwise wait for `workspace.select`.
    #[clap(long, env = "CAMPUSD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    #[clap(long, env = "CAMPUSD_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[clap(long, env = "CAMPUSD_ADMIN_DOMAIN_ID", default_value = "admin")]
    pub admin_domain_id: String,

    /// Without a password no management account is seeded.
    #[clap(long, env = "CAMPUSD_ADMIN_PASSWORD")]
    pub admin_password: Option<String>,

    #[clap(long, env = "CAMPUSD_ADMIN_NAME", default_value = "System Administrator")]
    pub admin_name: String,
}

#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub domain_id: String,
    pub password: String,
    pub name: String,
}

impl Config {
    pub fn admin_seed(&self) -> Option<AdminSeed> {
        let password = self.admin_password.clone()?;
        Some(AdminSeed {
            domain_id: self.admin_domain_id.clone(),
            password,
            name: self.admin_name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_seed_requires_password() {
        let cfg = Config::parse_from([
            "campusd",
            "--admin-password",
            "s3cret!",
            "--log-level",
            "debug",
        ]);
        let seed = cfg.admin_seed().expect("seed");
        assert_eq!(seed.password, "s3cret!");
        assert_eq!(cfg.log_level, "debug");
    }
}
