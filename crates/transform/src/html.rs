use crate::collector::ClassRewriter;

/// 内容按原样输出、不解析标签的元素
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// HTML 转换器 —— 扫描开始标签中的 `class` 属性，
/// 将其中每个类名替换为混淆 id，其余字节原样输出。
///
/// 这是一个轻量扫描器，不是完整的 HTML 解析器：
/// - 只在开始标签内部查找属性，文本内容、注释（`<!-- -->`）
///   以及 `script` / `style` / `textarea` / `title` 的内容不处理
/// - 属性名不区分大小写（`CLASS="..."` 同样匹配）
/// - 支持双引号、单引号和无引号的属性值；不解码字符引用（`&amp;` 等）
/// - 不识别 `<![CDATA[` 和模板语言的定界符
pub fn transform_html_source(source: &str, rewriter: &mut ClassRewriter) -> String {
    let mut result = String::with_capacity(source.len());
    let mut rest = source;

    while let Some(lt) = rest.find('<') {
        result.push_str(&rest[..lt]);
        rest = &rest[lt..];

        if rest.starts_with("<!--") {
            let end = rest.find("-->").map_or(rest.len(), |i| i + 3);
            result.push_str(&rest[..end]);
            rest = &rest[end..];
            continue;
        }

        let Some(name) = tag_name(rest) else {
            // 结束标签、`<!DOCTYPE`、文本中的 `<`
            result.push('<');
            rest = &rest[1..];
            continue;
        };
        let name = name.to_ascii_lowercase();

        let consumed = rewrite_start_tag(rest, name.len(), rewriter, &mut result);
        rest = &rest[consumed..];

        if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            let end = raw_text_end(rest, &name);
            result.push_str(&rest[..end]);
            rest = &rest[end..];
        }
    }

    result.push_str(rest);
    result
}

/// `<` 之后的标签名：字母开头，由字母、数字和 `-` 组成
fn tag_name(tag: &str) -> Option<&str> {
    let body = &tag[1..];
    if !body.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return None;
    }
    let end = body
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .unwrap_or(body.len());
    Some(&body[..end])
}

/// 原样输出开始标签，改写其中的 `class` 属性值。返回消耗的字节数（含 `>`）。
fn rewrite_start_tag(
    tag: &str,
    name_len: usize,
    rewriter: &mut ClassRewriter,
    out: &mut String,
) -> usize {
    let bytes = tag.as_bytes();
    let len = bytes.len();
    let mut i = 1 + name_len;
    out.push_str(&tag[..i]);

    while i < len {
        let b = bytes[i];
        if b == b'>' {
            out.push('>');
            return i + 1;
        }
        if b.is_ascii_whitespace() || b == b'/' {
            out.push(b as char);
            i += 1;
            continue;
        }

        // 属性名
        let name_start = i;
        while i < len && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'=' | b'>' | b'/') {
            i += 1;
        }
        if i == name_start {
            // 孤立的 `=`
            out.push(b as char);
            i += 1;
            continue;
        }
        let attr_name = &tag[name_start..i];
        out.push_str(attr_name);

        // 可选的 `= value`
        let mut j = i;
        while j < len && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if j >= len || bytes[j] != b'=' {
            continue;
        }
        j += 1;
        while j < len && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        out.push_str(&tag[i..j]);
        i = j;

        let is_class = attr_name.eq_ignore_ascii_case("class");
        if i < len && matches!(bytes[i], b'"' | b'\'') {
            let quote = bytes[i] as char;
            let value_start = i + 1;
            let Some(close) = tag[value_start..].find(quote) else {
                // 引号未闭合，剩余部分原样输出
                out.push_str(&tag[i..]);
                return len;
            };
            let value_end = value_start + close;
            let value = &tag[value_start..value_end];
            let rewritten = if is_class { rewriter.rewrite_classes(value) } else { None };

            out.push(quote);
            out.push_str(rewritten.as_deref().unwrap_or(value));
            out.push(quote);
            i = value_end + 1;
        } else {
            // 无引号的值只能包含一个类名
            let value_start = i;
            while i < len && !bytes[i].is_ascii_whitespace() && bytes[i] != b'>' {
                i += 1;
            }
            let value = &tag[value_start..i];
            let rewritten = if is_class { rewriter.rewrite_classes(value) } else { None };
            out.push_str(rewritten.as_deref().unwrap_or(value));
        }
    }

    len
}

/// 原始文本元素内容的结束位置：对应结束标签（不区分大小写）之前
fn raw_text_end(content: &str, name: &str) -> usize {
    // ASCII 小写化不改变字节偏移
    content
        .to_ascii_lowercase()
        .find(&format!("</{name}"))
        .unwrap_or(content.len())
}
