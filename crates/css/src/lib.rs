pub mod emit;
pub mod rewrite;

use randomizer_core::{ClassMapStore, StoreError};
use swc_core::common::sync::Lrc;
use swc_core::common::{FileName, SourceMap};
use swc_core::css::parser::{parse_file, parser::ParserConfig};
use thiserror::Error;
use tracing::{error, info, warn};

pub use emit::emit_css;
pub use rewrite::{rewrite_with_map, ReverseIndex};

// Re-export SWC CSS types
pub use swc_core::css::ast::Stylesheet;

#[derive(Debug, Error)]
pub enum CssTransformError {
    #[error("css parse error: {0}")]
    Parse(String),

    #[error("css codegen error: {0}")]
    Codegen(#[from] std::fmt::Error),
}

/// 样式表处理选项
#[derive(Debug, Clone, Default)]
pub struct CssOptions {
    /// 压缩输出
    pub minify: bool,
}

/// 一次样式表处理的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// 映射文件不存在，原样通过
    NoMap,
    /// 映射文件损坏或无法读取，原样通过
    Skipped { reason: String },
    /// 改写了 `rules` 条规则
    Rewritten { rules: usize },
}

impl RewriteOutcome {
    pub fn rewritten_rules(&self) -> usize {
        match self {
            RewriteOutcome::Rewritten { rules } => *rules,
            _ => 0,
        }
    }
}

pub struct CssTransformResult {
    pub css: String,
    pub outcome: RewriteOutcome,
}

/// 样式表钩子：读取映射存储，原地改写样式表中的类选择器。
///
/// 读取失败不会中断构建，只记录诊断并跳过改写。
pub fn rewrite_stylesheet(stylesheet: &mut Stylesheet, store: &ClassMapStore) -> RewriteOutcome {
    let map = match store.load() {
        Ok(Some(map)) => map,
        Ok(None) => return RewriteOutcome::NoMap,
        Err(err) => return skipped(err),
    };

    info!(entries = map.len(), "class map loaded for stylesheet");
    let rules = rewrite_with_map(stylesheet, &map);
    RewriteOutcome::Rewritten { rules }
}

fn skipped(err: StoreError) -> RewriteOutcome {
    if err.is_read_error() {
        warn!(error = %err, "error reading or parsing class map, stylesheet left unchanged");
    } else {
        error!(error = %err, "unexpected class map error, stylesheet left unchanged");
    }
    RewriteOutcome::Skipped {
        reason: err.to_string(),
    }
}

/// 解析 CSS 源码
pub fn parse_stylesheet(source: &str, filename: &str) -> Result<Stylesheet, CssTransformError> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(
        FileName::Custom(filename.to_string()).into(),
        source.to_string(),
    );

    let mut errors = vec![];
    let stylesheet: Stylesheet = parse_file(&fm, None, ParserConfig::default(), &mut errors)
        .map_err(|e| CssTransformError::Parse(format!("{:?}", e)))?;

    if !errors.is_empty() {
        // 可恢复的错误：保留解析结果
        warn!(filename, count = errors.len(), "recoverable css parse errors");
    }

    Ok(stylesheet)
}

/// 转换 CSS 源码：解析、改写、输出。
///
/// 没有任何规则被改写时直接返回原始源码，避免无意义的重新格式化。
pub fn transform_css(
    source: &str,
    filename: &str,
    store: &ClassMapStore,
    options: &CssOptions,
) -> Result<CssTransformResult, CssTransformError> {
    let mut stylesheet = parse_stylesheet(source, filename)?;
    let outcome = rewrite_stylesheet(&mut stylesheet, store);

    let css = if outcome.rewritten_rules() > 0 {
        emit_css(&stylesheet, options.minify)?
    } else {
        source.to_string()
    };

    Ok(CssTransformResult { css, outcome })
}
