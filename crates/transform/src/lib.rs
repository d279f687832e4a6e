pub mod collector;
pub mod html;
pub mod jsx_visitor;

use std::ops::Range;
use std::path::{Component, Path};

use indexmap::IndexMap;
use jsx_visitor::JsxClassVisitor;
use randomizer_core::{ClassMapStore, RandomizerConfig, StoreError};
use swc_core::common::comments::SingleThreadedComments;
use swc_core::common::sync::Lrc;
use swc_core::common::{BytePos, FileName, Globals, SourceMap, Spanned, GLOBALS};
use swc_core::ecma::ast::*;
use swc_core::ecma::codegen::text_writer::JsWriter;
use swc_core::ecma::codegen::{Config as CodegenConfig, Emitter};
use swc_core::ecma::parser::{parse_file_as_module, EsSyntax, Syntax, TsSyntax};
use swc_core::ecma::visit::VisitMutWith;
use thiserror::Error;
use tracing::debug;

// Re-exports
pub use collector::ClassRewriter;
pub use randomizer_core;

/// 参与转换的源码扩展名
const ELIGIBLE_EXTENSIONS: &[&str] = &["tsx", "ts", "jsx", "js", "mjs"];

/// 依赖目录，其中的文件不转换
const DEPENDENCY_DIR: &str = "node_modules";

/// 转换错误
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("codegen error: {0}")]
    Codegen(String),

    /// 映射落盘失败：后续样式表处理依赖这份映射，转换必须失败
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// 转换选项
#[derive(Debug, Clone)]
pub struct TransformOptions {
    /// 视为类属性的 JSX 属性名（默认 `className`）
    pub class_attributes: Vec<String>,
    /// 转换后若有新映射立即落盘（默认 true）。
    /// 关闭时由宿主运行 `DebouncedFlusher` 负责落盘。
    pub flush_after_transform: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            class_attributes: vec!["className".to_string()],
            flush_after_transform: true,
        }
    }
}

impl TransformOptions {
    /// 配置了 `flushDebounceMs` 时不在转换后落盘，交给 `DebouncedFlusher`
    pub fn from_config(config: &RandomizerConfig) -> Self {
        Self {
            flush_after_transform: config.flush_debounce().is_none(),
            ..Default::default()
        }
    }
}

/// 转换结果
pub struct TransformResult {
    /// 转换后的源码
    pub code: String,
    /// 本文件中出现的类名映射（原始类名 -> 混淆 id）
    pub class_map: IndexMap<String, String>,
}

/// 判断文件是否需要转换：扩展名匹配，且不在 `node_modules` 中
pub fn is_eligible_file(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    let in_dependencies = path
        .components()
        .any(|c| matches!(c, Component::Normal(name) if name == DEPENDENCY_DIR));
    if in_dependencies {
        return false;
    }

    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ELIGIBLE_EXTENSIONS.contains(&ext))
}

/// 转换 JSX/TSX 源码
///
/// 遍历 AST，将类属性中的每个类名替换为映射存储中的混淆 id
/// （新类名会写入存储），然后重新输出源码。
///
/// # 示例
///
/// ```no_run
/// use randomizer_core::{ClassMapStore, RandomizerConfig};
/// use randomizer_transform::{transform_jsx, TransformOptions};
///
/// let store = ClassMapStore::open_in_cwd(&RandomizerConfig::default()).unwrap();
/// let source = r#"
///     export default function App() {
///         return <div className="flex min-h-screen items-center">Hello</div>;
///     }
/// "#;
///
/// let result = transform_jsx(source, "App.tsx", &store, &TransformOptions::default()).unwrap();
/// println!("Code:\n{}", result.code);
/// println!("Mappings: {:?}", result.class_map);
/// ```
pub fn transform_jsx(
    source: &str,
    filename: &str,
    store: &ClassMapStore,
    options: &TransformOptions,
) -> Result<TransformResult, TransformError> {
    let syntax = syntax_for(filename);

    // 用占位符注释保留顶层语句之间的空行，防止 SWC parse→emit 吞掉空行。
    // 先解析一次原始源码以确定哪些空行落在语句或注释之外。
    let parsed = parse_module(source.to_string(), filename, syntax)?;
    let Parsed {
        cm,
        mut module,
        comments,
        ..
    } = match preserve_empty_lines(source, &protected_ranges(&parsed)) {
        Some(marked) => parse_module(marked, filename, syntax)?,
        None => parsed,
    };

    // 遍历并替换
    let mut rewriter = ClassRewriter::new(store);
    {
        let mut visitor = JsxClassVisitor::new(&mut rewriter, &options.class_attributes);
        module.visit_mut_with(&mut visitor);
    }

    // 输出代码（携带注释）
    let code = GLOBALS.set(&Globals::new(), || emit_module(&cm, &module, Some(&comments)))?;
    let code = restore_empty_lines(&code);

    finish(filename, code, rewriter, store, options)
}

/// 转换 HTML 源码
///
/// 扫描 HTML 中的 `class="..."` 属性，将每个类名替换为混淆 id。
pub fn transform_html(
    source: &str,
    store: &ClassMapStore,
    options: &TransformOptions,
) -> Result<TransformResult, TransformError> {
    let mut rewriter = ClassRewriter::new(store);
    let code = html::transform_html_source(source, &mut rewriter);
    finish("<html>", code, rewriter, store, options)
}

fn finish(
    filename: &str,
    code: String,
    rewriter: ClassRewriter,
    store: &ClassMapStore,
    options: &TransformOptions,
) -> Result<TransformResult, TransformError> {
    let class_map = rewriter.into_class_map();
    debug!(filename, classes = class_map.len(), "transformed class attributes");

    if options.flush_after_transform && store.is_dirty() {
        store.flush()?;
    }

    Ok(TransformResult { code, class_map })
}

/// 一次解析的结果
struct Parsed {
    cm: Lrc<SourceMap>,
    module: Module,
    comments: SingleThreadedComments,
    start_pos: BytePos,
}

/// 解析模块（保留注释）
fn parse_module(source: String, filename: &str, syntax: Syntax) -> Result<Parsed, TransformError> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(FileName::Custom(filename.to_string()).into(), source);

    let comments = SingleThreadedComments::default();
    let mut errors = vec![];
    let module = parse_file_as_module(&fm, syntax, EsVersion::latest(), Some(&comments), &mut errors)
        .map_err(|e| TransformError::Parse(format!("{:?}", e)))?;

    if !errors.is_empty() {
        return Err(TransformError::Parse(format!("{:?}", errors)));
    }

    Ok(Parsed {
        cm,
        module,
        comments,
        start_pos: fm.start_pos,
    })
}

/// 顶层语句和注释在源码中占据的字节区间。
/// 这些区间内的空行属于字符串、模板或注释内容，不能替换。
fn protected_ranges(parsed: &Parsed) -> Vec<Range<usize>> {
    let offset = |pos: BytePos| pos.0.saturating_sub(parsed.start_pos.0) as usize;
    let (leading, trailing) = parsed.comments.borrow_all();

    let items = parsed.module.body.iter().map(|item| item.span());
    let comments = leading
        .values()
        .chain(trailing.values())
        .flatten()
        .map(|comment| comment.span);

    let ranges = items
        .chain(comments)
        .map(|span| offset(span.lo)..offset(span.hi))
        .collect();
    ranges
}

/// 根据文件名选择语法
fn syntax_for(filename: &str) -> Syntax {
    if filename.ends_with(".tsx") {
        Syntax::Typescript(TsSyntax {
            tsx: true,
            ..Default::default()
        })
    } else if filename.ends_with(".ts") {
        Syntax::Typescript(TsSyntax {
            tsx: false,
            ..Default::default()
        })
    } else {
        // .jsx / .js / .mjs 默认支持 JSX
        Syntax::Es(EsSyntax {
            jsx: true,
            ..Default::default()
        })
    }
}

/// 空行占位符
///
/// SWC 的 AST 不保留空行信息，parse → emit 后空行会被吞掉。
/// 解法：在解析前把空行替换为注释占位符（SWC 会保留注释），
/// 代码生成后再把占位符还原为空行。
const EMPTY_LINE_MARKER: &str = "// __RANDOMIZER_EMPTY_LINE__";

/// 将顶层语句之间的空行替换为占位符注释。没有可替换的空行时返回 None。
fn preserve_empty_lines(source: &str, protected: &[Range<usize>]) -> Option<String> {
    // (行首字节偏移, 行内容)
    let mut lines = Vec::new();
    let mut offset = 0;
    for raw in source.split_inclusive('\n') {
        lines.push((offset, raw.trim_end_matches(['\n', '\r'])));
        offset += raw.len();
    }

    // 最后一个非空行之后的空行不处理
    let last_non_empty = lines.iter().rposition(|(_, l)| !l.trim().is_empty());

    let mut marked = false;
    let preserved = lines
        .iter()
        .enumerate()
        .map(|(i, &(start, line))| {
            let between_items = !protected.iter().any(|range| range.contains(&start));
            if line.trim().is_empty()
                && between_items
                && last_non_empty.is_some_and(|last| i < last)
            {
                marked = true;
                EMPTY_LINE_MARKER
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    marked.then_some(preserved)
}

/// 将占位符注释还原为空行
fn restore_empty_lines(code: &str) -> String {
    code.lines()
        .map(|line| {
            if line.trim() == EMPTY_LINE_MARKER {
                ""
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 使用 SWC codegen 输出 JS/TS 模块代码
fn emit_module(
    cm: &Lrc<SourceMap>,
    module: &Module,
    comments: Option<&SingleThreadedComments>,
) -> Result<String, TransformError> {
    let mut buf = vec![];
    {
        let writer = JsWriter::new(cm.clone(), "\n", &mut buf, None);
        let mut emitter = Emitter {
            cfg: CodegenConfig::default().with_target(EsVersion::latest()),
            cm: cm.clone(),
            comments: comments.map(|c| c as &dyn swc_core::common::comments::Comments),
            wr: writer,
        };
        emitter
            .emit_module(module)
            .map_err(|e| TransformError::Codegen(format!("{:?}", e)))?;
    }
    String::from_utf8(buf).map_err(|e| TransformError::Codegen(format!("{:?}", e)))
}
