use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// 类名映射表：原始 Tailwind 类 -> 混淆后的 id
///
/// 使用 IndexMap 保持插入顺序，落盘后的 JSON 与首次出现顺序一致。
pub type ClassMap = IndexMap<String, String>;

/// 混淆 id 使用的 52 个字母（不含数字和标点），
/// 保证生成结果始终是无需转义的 CSS 标识符。
pub const ID_ALPHABET: [char; 52] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r',
    's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J',
    'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];

/// 默认 id 长度
pub const DEFAULT_ID_LENGTH: usize = 8;

/// 最小 id 长度：52^4 ≈ 730 万个 id，更短时冲突重试很快会耗尽
pub const MIN_ID_LENGTH: usize = 4;

/// 默认映射文件位置（相对项目根目录）
pub const DEFAULT_MAP_PATH: &str = ".next/class-map.json";

/// id 生成策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IdMode {
    /// 随机生成（每次构建不同）
    #[default]
    Random,
    /// 基于类名内容 hash，跨构建稳定
    Stable,
}

/// 两个不同类名生成了相同 id 时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollisionPolicy {
    /// 丢弃冲突 id 并重新生成
    #[default]
    Regenerate,
    /// 不检查，接受极低概率的冲突
    Allow,
}

/// 判断字符串是否可能是本库生成的 id
#[cfg(test)]
pub(crate) fn is_obfuscated_id(s: &str, length: usize) -> bool {
    s.len() == length && s.bytes().all(|b| b.is_ascii_alphabetic())
}
