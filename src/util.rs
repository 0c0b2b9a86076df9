use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

/// Look for an executable named `name` in the working directory, then on `PATH`.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    let mut dirs: Vec<PathBuf> = env::current_dir().into_iter().collect();
    if let Some(path) = env::var_os("PATH") {
        dirs.extend(env::split_paths(&path));
    }
    find_executable_in(name, dirs)
}

pub fn find_executable_in<I, P>(name: &str, dirs: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    debug!(name, "searching path for executable");
    dirs.into_iter()
        .map(|dir| dir.as_ref().to_path_buf())
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
        .inspect(|found| debug!(path = %found.display(), "found executable"))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Write the xterm "set window title" sequence.
pub fn set_window_title<W: Write>(out: &mut W, title: &str) -> io::Result<()> {
    write!(out, "\x1b]2;{title}\x07")?;
    out.flush()
}

/// Add `item` if missing, or remove it if present when `remove` is set.
pub fn list_update<T: PartialEq>(item: T, list: &mut Vec<T>, remove: bool) {
    let pos = list.iter().position(|x| *x == item);
    match (remove, pos) {
        (false, None) => list.push(item),
        (true, Some(i)) => {
            list.remove(i);
        }
        _ => {}
    }
}

/// First name in alphabetical order that starts with `begin`, ignoring case.
/// Falls back to `begin` itself.
pub fn near_name<S: AsRef<str>>(begin: &str, items: &[S]) -> String {
    let prefix = begin.to_lowercase();
    let mut names: Vec<&str> = items.iter().map(AsRef::as_ref).collect();
    names.sort_unstable();
    names
        .into_iter()
        .find(|name| name.to_lowercase().starts_with(&prefix))
        .unwrap_or(begin)
        .to_string()
}
