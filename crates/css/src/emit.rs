use swc_core::css::ast::Stylesheet;
use swc_core::css::codegen::{
    writer::basic::{BasicCssWriter, BasicCssWriterConfig, IndentType, LineFeed},
    CodeGenerator, CodegenConfig, Emit,
};

/// 使用 swc css codegen 生成 CSS 字符串
pub fn emit_css(stylesheet: &Stylesheet, minify: bool) -> Result<String, std::fmt::Error> {
    let mut output = String::new();

    let writer_config = BasicCssWriterConfig {
        indent_type: IndentType::Space,
        indent_width: 2,
        linefeed: LineFeed::LF,
    };

    let mut wr = BasicCssWriter::new(&mut output, None, writer_config);
    let mut gen = CodeGenerator::new(&mut wr, CodegenConfig { minify });

    gen.emit(stylesheet)?;

    Ok(output)
}
