pub mod analyzer;
pub mod bucket;
pub mod duration;
pub mod pcm;
pub mod precomputed;
pub mod streaming;

use std::path::Path;

/// Renders `path` as a utility argument. Relative paths starting with `-`
/// get a `./` prefix so they are not parsed as options.
pub(crate) fn tool_path_arg(path: &Path) -> String {
    let arg = path.to_string_lossy();
    if arg.starts_with('-') {
        format!("./{arg}")
    } else {
        arg.into_owned()
    }
}
