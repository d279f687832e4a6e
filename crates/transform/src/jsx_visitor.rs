use crate::collector::ClassRewriter;
use swc_core::ecma::ast::*;
use swc_core::ecma::visit::{VisitMut, VisitMutWith};

/// JSX/TSX 遍历器 —— 使用 SWC VisitMut 遍历 AST，
/// 找到类属性（默认 `className`）中的类字符串，逐个 token 替换为混淆 id。
///
/// - `className="p-4 m-2"`：直接改写字面量
/// - `className={...}`：只改写处于“类位置”的字面量，即其值会成为类列表的一部分：
///   条件表达式的两个分支、`&&` 的右侧、`||` / `??` / `+` 的两侧、
///   函数参数、数组元素、对象字面量的字符串键、括号和逗号表达式的结果、
///   无插值模板字面量
/// - 比较运算的操作数、计算属性键（`styles["card"]`）、对象属性值等不改写
/// - 表达式内嵌套的 JSX 元素按它自己的属性规则处理
pub struct JsxClassVisitor<'a, 'r> {
    rewriter: &'a mut ClassRewriter<'r>,
    class_attributes: &'a [String],
}

impl<'a, 'r> JsxClassVisitor<'a, 'r> {
    pub fn new(rewriter: &'a mut ClassRewriter<'r>, class_attributes: &'a [String]) -> Self {
        Self {
            rewriter,
            class_attributes,
        }
    }

    /// 判断 JSX 属性名是否为类属性
    fn is_class_attr(&self, name: &JSXAttrName) -> bool {
        #[allow(unreachable_patterns)]
        match name {
            JSXAttrName::Ident(ident) => {
                let s: &str = &ident.sym;
                self.class_attributes.iter().any(|attr| attr == s)
            }
            JSXAttrName::JSXNamespacedName(_) => false,
            _ => false,
        }
    }

    /// 从 Str 节点提取字符串值
    fn str_value(s: &Str) -> String {
        s.value.as_str().unwrap_or_default().to_string()
    }

    /// 改写表达式内部的字符串片段（保留首尾一个空格）
    fn rewrite_str(&mut self, str_lit: &mut Str) {
        let original = Self::str_value(str_lit);
        if let Some(rewritten) = self.rewriter.rewrite_fragment(&original) {
            str_lit.value = rewritten.into();
            str_lit.raw = None;
        }
    }

    /// 处理一个值会成为类列表的表达式
    fn visit_class_expr(&mut self, expr: &mut Expr) {
        match expr {
            Expr::Lit(Lit::Str(str_lit)) => self.rewrite_str(str_lit),
            Expr::Tpl(tpl) => self.visit_class_tpl(tpl),
            // active ? "a" : "b"
            Expr::Cond(cond) => {
                cond.test.visit_mut_with(self);
                self.visit_class_expr(&mut cond.cons);
                self.visit_class_expr(&mut cond.alt);
            }
            Expr::Bin(bin) => match bin.op {
                // open && "block"
                BinaryOp::LogicalAnd => {
                    bin.left.visit_mut_with(self);
                    self.visit_class_expr(&mut bin.right);
                }
                // base || "p-4"、"p-4 " + extra
                BinaryOp::LogicalOr | BinaryOp::NullishCoalescing | BinaryOp::Add => {
                    self.visit_class_expr(&mut bin.left);
                    self.visit_class_expr(&mut bin.right);
                }
                // 比较等运算的操作数不是类名
                _ => bin.visit_mut_children_with(self),
            },
            // clsx("p-4", ...)
            Expr::Call(call) => {
                call.callee.visit_mut_with(self);
                for arg in &mut call.args {
                    self.visit_class_expr(&mut arg.expr);
                }
            }
            Expr::Array(array) => {
                for elem in array.elems.iter_mut().flatten() {
                    self.visit_class_expr(&mut elem.expr);
                }
            }
            // { "opacity-50": disabled }
            Expr::Object(object) => {
                for prop in &mut object.props {
                    match prop {
                        PropOrSpread::Prop(prop) => match prop.as_mut() {
                            Prop::KeyValue(kv) => {
                                match &mut kv.key {
                                    PropName::Str(key) => self.rewrite_str(key),
                                    key => key.visit_mut_with(self),
                                }
                                kv.value.visit_mut_with(self);
                            }
                            other => other.visit_mut_with(self),
                        },
                        PropOrSpread::Spread(spread) => spread.visit_mut_with(self),
                    }
                }
            }
            Expr::Paren(paren) => self.visit_class_expr(&mut paren.expr),
            Expr::Seq(seq) => {
                if let Some((last, rest)) = seq.exprs.split_last_mut() {
                    for expr in rest {
                        expr.visit_mut_with(self);
                    }
                    self.visit_class_expr(last);
                }
            }
            Expr::TsAs(ts) => self.visit_class_expr(&mut ts.expr),
            Expr::TsSatisfies(ts) => self.visit_class_expr(&mut ts.expr),
            Expr::TsNonNull(ts) => self.visit_class_expr(&mut ts.expr),
            Expr::TsConstAssertion(ts) => self.visit_class_expr(&mut ts.expr),
            other => other.visit_mut_with(self),
        }
    }

    fn visit_class_tpl(&mut self, tpl: &mut Tpl) {
        // `p-4 m-2` —— 无插值模板字面量
        if tpl.exprs.is_empty() && tpl.quasis.len() == 1 {
            if let Some(quasi) = tpl.quasis.first_mut() {
                let original: &str = &quasi.raw;
                if let Some(rewritten) = self.rewriter.rewrite_fragment(original) {
                    quasi.cooked = Some(rewritten.clone().into());
                    quasi.raw = rewritten.into();
                }
            }
            return;
        }

        // 带插值的模板：静态片段可能截断类名（如 `bg-${color}-500`），
        // 只处理插值表达式
        for expr in &mut tpl.exprs {
            self.visit_class_expr(expr);
        }
    }
}

impl<'a, 'r> VisitMut for JsxClassVisitor<'a, 'r> {
    fn visit_mut_jsx_attr(&mut self, attr: &mut JSXAttr) {
        if !self.is_class_attr(&attr.name) {
            attr.visit_mut_children_with(self);
            return;
        }

        match &mut attr.value {
            // className="p-4 m-2"
            Some(JSXAttrValue::Str(str_lit)) => {
                let original = Self::str_value(str_lit);
                if let Some(rewritten) = self.rewriter.rewrite_classes(&original) {
                    str_lit.value = rewritten.into();
                    str_lit.raw = None;
                }
            }
            // className={...}
            Some(JSXAttrValue::JSXExprContainer(container)) => {
                if let JSXExpr::Expr(expr) = &mut container.expr {
                    self.visit_class_expr(expr);
                }
            }
            Some(value) => value.visit_mut_with(self),
            None => {}
        }
    }
}
