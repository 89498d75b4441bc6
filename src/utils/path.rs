use std::path::{Path, PathBuf};
use uzers::os::unix::UserExt;

/// Numeric identity of the invoking user, passed to containers so files
/// they write into the workspace stay owned by the host user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostUser {
    pub uid: u32,
    pub gid: u32,
}

impl HostUser {
    pub fn current() -> Self {
        Self {
            uid: uzers::get_current_uid(),
            gid: uzers::get_current_gid(),
        }
    }

    /// `uid:gid`, as accepted by `docker --user`.
    pub fn as_user_arg(&self) -> String {
        format!("{}:{}", self.uid, self.gid)
    }
}

/// Expand a leading `~` or `~user` to a home directory.
///
/// Returns `None` when the home directory cannot be determined.
///
/// ```
/// use vibepod::utils::path::expand_tilde;
///
/// let path = expand_tilde("/absolute/path").unwrap();
/// assert_eq!(path, std::path::PathBuf::from("/absolute/path"));
/// ```
pub fn expand_tilde<P: AsRef<Path>>(path: P) -> Option<PathBuf> {
    let path = path.as_ref();
    let path_str = path.to_str()?;

    let Some(after_tilde) = path_str.strip_prefix('~') else {
        return Some(path.to_path_buf());
    };

    let (username, rest) = after_tilde.split_once('/').unwrap_or((after_tilde, ""));

    let home = if username.is_empty() {
        PathBuf::from(std::env::var_os("HOME")?)
    } else {
        uzers::get_user_by_name(username)?.home_dir().to_path_buf()
    };

    Some(if rest.is_empty() { home } else { home.join(rest) })
}
