use std::collections::HashMap;

use randomizer_core::{class_selector, escape_class, ClassMap};
use swc_core::css::ast::{
    ClassSelector, ComplexSelectorChildren, Ident, QualifiedRule, QualifiedRulePrelude,
    SelectorList, Stylesheet, SubclassSelector,
};
use swc_core::css::visit::{VisitMut, VisitMutWith};
use tracing::debug;

/// 反向索引：转义后的原始选择器 -> 混淆选择器
///
/// `".md\:flex"` -> `".abcDEFgh"`
pub struct ReverseIndex {
    selectors: HashMap<String, String>,
}

impl ReverseIndex {
    pub fn from_map(map: &ClassMap) -> Self {
        let selectors = map
            .iter()
            .map(|(original, obfuscated)| (class_selector(original), format!(".{obfuscated}")))
            .collect();
        Self { selectors }
    }

    pub fn lookup(&self, selector: &str) -> Option<&str> {
        self.selectors.get(selector).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }
}

/// 用映射表改写样式表中的类选择器，返回改写的规则数。
///
/// 只改写整个选择器恰好是单个类选择器的规则（`.flex`）；
/// 复合选择器（`.flex.hidden`、`.a:hover`、`.a .b`、`.a, .b`）保持不变。
pub fn rewrite_with_map(stylesheet: &mut Stylesheet, map: &ClassMap) -> usize {
    let index = ReverseIndex::from_map(map);
    if index.is_empty() {
        return 0;
    }

    let mut rewriter = SelectorRewriter {
        index: &index,
        rewritten: 0,
    };
    stylesheet.visit_mut_with(&mut rewriter);
    debug!(
        selectors = index.len(),
        rewritten = rewriter.rewritten,
        "class selectors rewritten"
    );
    rewriter.rewritten
}

struct SelectorRewriter<'a> {
    index: &'a ReverseIndex,
    rewritten: usize,
}

impl VisitMut for SelectorRewriter<'_> {
    fn visit_mut_qualified_rule(&mut self, rule: &mut QualifiedRule) {
        if let QualifiedRulePrelude::SelectorList(list) = &mut rule.prelude {
            if let Some(class) = single_class_mut(list) {
                // 用同一个转义函数重新转义解析后的标识符，
                // 源码里的转义写法（`\:`、`\3A `）不影响匹配
                let key = format!(".{}", escape_class(&class.text.value));
                if let Some(target) = self.index.lookup(&key) {
                    let id = target.strip_prefix('.').unwrap_or(target);
                    class.text = Ident {
                        span: class.text.span,
                        value: id.into(),
                        raw: None,
                    };
                    self.rewritten += 1;
                }
            }
        }

        // 嵌套规则
        rule.visit_mut_children_with(self);
    }
}

/// 选择器列表恰好是一个只含单个类的复合选择器时，返回该类选择器
fn single_class_mut(list: &mut SelectorList) -> Option<&mut ClassSelector> {
    let [complex] = list.children.as_mut_slice() else {
        return None;
    };
    let [ComplexSelectorChildren::CompoundSelector(compound)] = complex.children.as_mut_slice()
    else {
        return None;
    };
    if compound.nesting_selector.is_some() || compound.type_selector.is_some() {
        return None;
    }
    let [SubclassSelector::Class(class)] = compound.subclass_selectors.as_mut_slice() else {
        return None;
    };
    Some(class)
}
