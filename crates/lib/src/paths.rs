use std::env;
use std::path::PathBuf;

/// Get the GnuPG home directory ($GNUPGHOME, else ~/.gnupg)
pub fn gnupg_home() -> Option<PathBuf> {
    match env::var_os("GNUPGHOME") {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::home_dir().map(|home| home.join(".gnupg")),
    }
}

/// Get the gpg-agent configuration file path
pub fn gpg_agent_conf_path() -> Option<PathBuf> {
    gnupg_home().map(|home| home.join("gpg-agent.conf"))
}
