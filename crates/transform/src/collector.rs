use indexmap::IndexMap;
use randomizer_core::ClassMapStore;

/// 类名改写器 —— 把类字符串拆成 token，逐个通过映射存储换成混淆 id。
///
/// 同时记录本文件中出现过的映射，作为转换结果返回。
pub struct ClassRewriter<'a> {
    store: &'a ClassMapStore,
    /// 原始类名 -> 混淆 id（仅本文件）
    class_map: IndexMap<String, String>,
}

impl<'a> ClassRewriter<'a> {
    pub fn new(store: &'a ClassMapStore) -> Self {
        Self {
            store,
            class_map: IndexMap::new(),
        }
    }

    /// 改写一个类属性值：按空白拆分，逐个映射，用单个空格连接。
    ///
    /// 没有任何 token 时返回 None（保持原样）。
    pub fn rewrite_classes(&mut self, classes: &str) -> Option<String> {
        let ids: Vec<String> = classes
            .split_whitespace()
            .map(|class| self.map_class(class))
            .collect();

        if ids.is_empty() {
            None
        } else {
            Some(ids.join(" "))
        }
    }

    /// 与 `rewrite_classes` 相同，但保留首尾的一个空格，
    /// 用于表达式内部的片段（如 `"p-4 " + extra`）。
    pub fn rewrite_fragment(&mut self, classes: &str) -> Option<String> {
        let rewritten = self.rewrite_classes(classes)?;
        let lead = if classes.starts_with(char::is_whitespace) { " " } else { "" };
        let trail = if classes.ends_with(char::is_whitespace) { " " } else { "" };
        Some(format!("{lead}{rewritten}{trail}"))
    }

    fn map_class(&mut self, class: &str) -> String {
        if let Some(id) = self.class_map.get(class) {
            return id.clone();
        }
        let id = self.store.get_or_create(class);
        self.class_map.insert(class.to_string(), id.clone());
        id
    }

    /// 返回类名映射表（原始 -> 混淆）
    pub fn class_map(&self) -> &IndexMap<String, String> {
        &self.class_map
    }

    /// 消费 self，返回类名映射表
    pub fn into_class_map(self) -> IndexMap<String, String> {
        self.class_map
    }
}
