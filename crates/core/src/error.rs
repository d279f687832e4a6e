use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// 类名映射存储相关错误
#[derive(Debug, Error)]
pub enum StoreError {
    /// 路径解析后跳出了项目根目录
    #[error("invalid file path: path traversal detected ({path})")]
    PathTraversal { path: String },

    /// 映射文件存在，但不是 JSON 对象
    #[error("invalid class map format in {}: {source}", .path.display())]
    CorruptMap {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read class map {}: {source}", .path.display())]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 写入或创建目录失败。映射是后续样式表处理的依据，不能吞掉
    #[error("failed to write class map {}: {source}", .path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// id 长度过短，生成的 id 无法保证唯一（0 时甚至为空选择器）
    #[error("invalid idLength {length}: must be at least {min}")]
    InvalidIdLength { length: usize, min: usize },

    #[error("failed to serialize class map: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    /// 读取侧错误：样式表处理时可以降级为不改写
    pub fn is_read_error(&self) -> bool {
        matches!(self, StoreError::CorruptMap { .. } | StoreError::ReadFailure { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
