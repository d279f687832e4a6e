use std::path::{Component, Path, PathBuf};

use crate::error::{StoreError, StoreResult};

/// 将相对项目根目录的路径解析为绝对路径，拒绝任何跳出根目录的结果。
///
/// 解析是纯词法的（不访问文件系统、不跟随符号链接）：
/// `..` 弹出上一级，绝对路径直接替换根目录，然后检查结果是否仍在根目录下。
pub fn resolve_secure_path(root: &Path, relative: impl AsRef<Path>) -> StoreResult<PathBuf> {
    let relative = relative.as_ref();
    let root = normalize(root);
    let resolved = normalize(&root.join(relative));

    if resolved.strip_prefix(&root).is_err() {
        return Err(StoreError::PathTraversal {
            path: relative.display().to_string(),
        });
    }

    Ok(resolved)
}

/// 项目根目录：宿主进程的当前工作目录
pub fn project_root() -> StoreResult<PathBuf> {
    std::env::current_dir().map_err(|source| StoreError::ReadFailure {
        path: PathBuf::from("."),
        source,
    })
}

/// 词法规范化：消除 `.` 和 `..`
///
/// 相对路径开头无法弹出的 `..` 保留下来（`../proj` 不能变成 `proj`）。
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `/..` 仍是 `/`
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            Component::Normal(part) => out.push(part),
        }
    }
    out
}
